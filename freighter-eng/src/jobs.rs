//  JOBS.rs
//    by Lut99
//
//  Created:
//    08 Feb 2023, 14:39:12
//  Last edited:
//    05 Apr 2023, 10:36:50
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the second stage of the pipeline: the pool of workers
//!   that receives the expanded jobs over the bounded channel and runs
//!   them, parking whatever fails.
//

use std::sync::Arc;

use futures_util::future::join_all;
use log::{debug, error, warn};
use tokio::sync::Mutex;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;

use specifications::transfer::{ImageClient, TransferJob as _};

use crate::queues::WorkQueues;


/***** LIBRARY *****/
/// Defines the pool of job workers.
pub struct JobHandler<C: ImageClient> {
    /// The queues shared with the rule pool and the retry controller.
    queues : Arc<WorkQueues<C::Job>>,
}

impl<C: ImageClient> JobHandler<C> {
    /// Constructor for the JobHandler.
    ///
    /// # Arguments
    /// - `queues`: The queues shared with the rule pool and the retry controller.
    ///
    /// # Returns
    /// A new JobHandler instance.
    #[inline]
    pub fn new(queues: Arc<WorkQueues<C::Job>>) -> Self {
        Self {
            queues,
        }
    }

    /// Runs the pool until the job channel is closed _and_ drained.
    ///
    /// # Arguments
    /// - `jobs`: The receive-side of the job channel. All workers share it behind a mutex.
    /// - `workers`: How many workers to spawn.
    pub async fn run(self, jobs: Receiver<C::Job>, workers: usize) {
        let jobs: Arc<Mutex<Receiver<C::Job>>> = Arc::new(Mutex::new(jobs));

        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(workers);
        for i in 0..workers {
            let queues : Arc<WorkQueues<C::Job>>       = self.queues.clone();
            let jobs   : Arc<Mutex<Receiver<C::Job>>>  = jobs.clone();
            handles.push(tokio::spawn(Self::worker(i, queues, jobs)));
        }

        // Wait for all of them to see the channel close
        for res in join_all(handles).await {
            if let Err(err) = res { error!("Job worker panicked: {}", err); }
        }
    }

    /// Runs a single job worker until the channel is closed and drained.
    async fn worker(id: usize, queues: Arc<WorkQueues<C::Job>>, jobs: Arc<Mutex<Receiver<C::Job>>>) {
        debug!("Job worker {}: started", id);
        loop {
            // The receiver lock is only held while waiting for the next job; it is released again before the job runs
            let job: Option<C::Job> = jobs.lock().await.recv().await;
            let job: C::Job = match job {
                Some(job) => job,
                None      => { break; },
            };

            debug!("Job worker {}: transferring '{}' -> '{}'...", id, job.source(), job.target());
            match job.run().await {
                Ok(_) => {
                    debug!("Job worker {}: transferred '{}'", id, job.target());
                    queues.note_completed();
                },
                Err(err) => {
                    warn!("Failed to transfer '{}' -> '{}': {}", job.source(), job.target(), err);
                    queues.push_failed_job(job);
                },
            }
        }
        debug!("Job worker {}: channel closed and drained, exiting", id);
    }
}
