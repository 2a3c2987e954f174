//  QUEUES.rs
//    by Lut99
//
//  Created:
//    08 Feb 2023, 13:38:02
//  Last edited:
//    04 Apr 2023, 14:22:18
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the shared work queues of the transfer pipeline: the rules
//!   awaiting expansion and the two failure queues that feed the retry
//!   rounds.
//!
//!   Every queue sits behind its own mutex, and no operation ever takes
//!   more than one of them at a time; whenever work moves between two
//!   queues it is staged in a local buffer in between. That rule is what
//!   makes deadlock structurally impossible here.
//

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use specifications::transfer::TransferJob;

use crate::spec::URLPair;


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    /// Jobs are irrelevant for the queue mechanics, so any type will do
    type Queues = WorkQueues<()>;

    /// Test that rules come out in the order they went in
    #[test]
    fn queues_fifo() {
        let queues = Queues::new();
        assert!(queues.pop_pair().is_none());

        queues.push_pairs(vec![ URLPair::new("a", "x"), URLPair::new("b", "y") ]);
        queues.push_pairs(vec![ URLPair::new("c", "z") ]);
        assert_eq!(queues.pop_pair(), Some(URLPair::new("a", "x")));
        assert_eq!(queues.pop_pair(), Some(URLPair::new("b", "y")));
        assert_eq!(queues.pop_pair(), Some(URLPair::new("c", "z")));
        assert!(queues.pop_pair().is_none());
    }

    /// Test that requeueing moves the failed rules back in-order and empties the failure queue
    #[test]
    fn queues_requeue() {
        let queues = Queues::new();
        queues.push_failed_pair(URLPair::new("a", "x"));
        queues.push_failed_pair(URLPair::new("b", "y"));
        assert_eq!(queues.failed_pair_count(), 2);

        assert_eq!(queues.requeue_failed_pairs(), 2);
        assert_eq!(queues.failed_pair_count(), 0);
        assert_eq!(queues.pop_pair(), Some(URLPair::new("a", "x")));
        assert_eq!(queues.pop_pair(), Some(URLPair::new("b", "y")));
    }

    /// Test the failed-job drain and the completion counter
    #[test]
    fn queues_jobs() {
        let queues = Queues::new();
        queues.push_failed_job(());
        queues.push_failed_job(());
        assert_eq!(queues.failed_job_count(), 2);
        assert_eq!(queues.drain_failed_jobs().len(), 2);
        assert_eq!(queues.failed_job_count(), 0);

        queues.note_completed();
        queues.note_completed();
        assert_eq!(queues.completed(), 2);
    }
}





/***** LIBRARY *****/
/// Defines the queues that the two worker pools and the retry controller share.
///
/// Generic over the job type `J` so that the engine can run against any [`specifications::transfer::ImageClient`].
#[derive(Debug)]
pub struct WorkQueues<J> {
    /// The rules that still await expansion.
    pairs        : Mutex<VecDeque<URLPair>>,
    /// The rules whose expansion failed; input for the next retry round.
    failed_pairs : Mutex<VecDeque<URLPair>>,
    /// The jobs whose execution failed; input for the next retry round.
    failed_jobs  : Mutex<VecDeque<J>>,
    /// How many jobs completed successfully, over all rounds.
    completed    : AtomicUsize,
}

impl<J> WorkQueues<J> {
    /// Constructor for the WorkQueues that initializes all of them empty.
    #[inline]
    pub fn new() -> Self {
        Self {
            pairs        : Mutex::new(VecDeque::new()),
            failed_pairs : Mutex::new(VecDeque::new()),
            failed_jobs  : Mutex::new(VecDeque::new()),
            completed    : AtomicUsize::new(0),
        }
    }



    /// Pops the next rule to expand.
    ///
    /// # Returns
    /// The oldest queued rule, or `None` if the queue is currently empty. `None` is the termination signal for rule workers.
    #[inline]
    pub fn pop_pair(&self) -> Option<URLPair> { self.pairs.lock().pop_front() }

    /// Appends the given rules to the expansion queue, in order.
    #[inline]
    pub fn push_pairs(&self, pairs: Vec<URLPair>) {
        let mut queue = self.pairs.lock();
        queue.extend(pairs);
    }

    /// Parks a rule whose expansion failed.
    #[inline]
    pub fn push_failed_pair(&self, pair: URLPair) { self.failed_pairs.lock().push_back(pair); }

    /// Parks a job whose execution failed.
    #[inline]
    pub fn push_failed_job(&self, job: J) { self.failed_jobs.lock().push_back(job); }

    /// Notes that one more job completed successfully.
    #[inline]
    pub fn note_completed(&self) { self.completed.fetch_add(1, Ordering::Relaxed); }



    /// Moves all failed rules back into the expansion queue.
    ///
    /// The failed rules are drained into a local buffer first, so that the two queue mutexes are never held at the same time.
    ///
    /// # Returns
    /// How many rules were moved.
    pub fn requeue_failed_pairs(&self) -> usize {
        let drained: Vec<URLPair> = self.failed_pairs.lock().drain(..).collect();
        let n_drained: usize = drained.len();
        self.pairs.lock().extend(drained);
        n_drained
    }

    /// Takes all failed jobs out of their queue.
    ///
    /// # Returns
    /// The failed jobs, oldest first.
    #[inline]
    pub fn drain_failed_jobs(&self) -> Vec<J> { self.failed_jobs.lock().drain(..).collect() }



    /// Returns how many rules are currently parked as failed.
    #[inline]
    pub fn failed_pair_count(&self) -> usize { self.failed_pairs.lock().len() }

    /// Returns how many jobs are currently parked as failed.
    #[inline]
    pub fn failed_job_count(&self) -> usize { self.failed_jobs.lock().len() }

    /// Returns how many jobs completed successfully so far.
    #[inline]
    pub fn completed(&self) -> usize { self.completed.load(Ordering::Relaxed) }

    /// Returns the (source, target) of every rule currently parked as failed.
    #[inline]
    pub fn failed_pairs_snapshot(&self) -> Vec<(String, String)> {
        self.failed_pairs.lock().iter().map(|p| (p.source.clone(), p.target.clone())).collect()
    }
}

impl<J: TransferJob> WorkQueues<J> {
    /// Returns the (source, target) references of every job currently parked as failed.
    #[inline]
    pub fn failed_jobs_snapshot(&self) -> Vec<(String, String)> {
        self.failed_jobs.lock().iter().map(|j| (j.source(), j.target())).collect()
    }
}

impl<J> Default for WorkQueues<J> {
    #[inline]
    fn default() -> Self { Self::new() }
}
