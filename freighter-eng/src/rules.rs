//  RULES.rs
//    by Lut99
//
//  Created:
//    08 Feb 2023, 14:02:55
//  Last edited:
//    05 Apr 2023, 10:31:26
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the first stage of the pipeline: the pool of workers
//!   that drains the rule queue and expands every rule into concrete
//!   single-tag jobs (and, for multi-tag and all-tags rules, into more
//!   rules).
//

use std::str::FromStr as _;
use std::sync::Arc;

use futures_util::future::join_all;
use log::{debug, error, warn};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

use freighter_cfg::plan::TransferPlan;
use specifications::reference::RepoRef;
use specifications::transfer::{ImageClient, ImageSource as _};

use crate::errors::ExpansionError;
use crate::queues::WorkQueues;
use crate::spec::URLPair;


/***** HELPER STRUCTS *****/
/// The outcome of expanding a single rule: new jobs to execute and/or new rules to queue.
pub(crate) struct Expansion<C: ImageClient> {
    /// The jobs this rule expanded into (at most one, currently).
    pub jobs  : Vec<C::Job>,
    /// The rules this rule expanded into (one per tag for multi-tag and all-tags rules).
    pub pairs : Vec<URLPair>,
}





/***** HELPER FUNCTIONS *****/
/// Expands one rule.
///
/// A rule with a comma-separated tag list becomes one new rule per tag; a rule without any tag asks the source registry for its tags and becomes one new rule per tag found; a rule with a single concrete tag becomes exactly one job.
///
/// # Arguments
/// - `client`: The client with which to open image handles.
/// - `plan`: The transfer plan, for credentials and the default target.
/// - `pair`: The rule to expand.
///
/// # Returns
/// The jobs and/or new rules this rule expanded into.
///
/// # Errors
/// This function errors if the rule is malformed or if the source registry could not be asked for its tags. The caller is expected to park the rule in the failed-rules queue in that case.
pub(crate) async fn expand<C: ImageClient>(client: &C, plan: &TransferPlan, pair: &URLPair) -> Result<Expansion<C>, ExpansionError> {
    // Fail fast on rules without a source
    if pair.source.is_empty() { return Err(ExpansionError::EmptySource); }
    let source: RepoRef = match RepoRef::from_str(&pair.source) {
        Ok(source) => source,
        Err(err)   => { return Err(ExpansionError::SourceParseError{ raw: pair.source.clone(), err }); },
    };

    // Synthesise the target from the configured defaults if the rule has none
    let target_raw: String = if !pair.target.is_empty() {
        pair.target.clone()
    } else {
        if !plan.has_default_target() { return Err(ExpansionError::NoDefaultTarget{ source: pair.source.clone() }); }
        format!(
            "{}/{}/{}{}",
            plan.default_registry, plan.default_namespace, source.repository,
            if !source.tag.is_empty() { format!(":{}", source.tag) } else { String::new() },
        )
    };
    let target: RepoRef = match RepoRef::from_str(&target_raw) {
        Ok(target) => target,
        Err(err)   => { return Err(ExpansionError::TargetParseError{ raw: target_raw, err }); },
    };

    // Case one: the source names a list of tags; split it into one new rule per tag
    if source.is_tag_list() {
        if !target.tag.is_empty() && target.tag != source.tag {
            return Err(ExpansionError::TagListMismatch{ source_tags: source.tag.clone(), target_tag: target.tag.clone() });
        }
        let pairs: Vec<URLPair> = source.tag
            .split(',')
            .filter(|t| !t.is_empty())
            .map(|t| URLPair::new(format!("{}:{}", source.url_without_tag(), t), format!("{}:{}", target.url_without_tag(), t)))
            .collect();
        debug!("Split '{}' into {} single-tag rule(s)", pair.source, pairs.len());
        return Ok(Expansion{ jobs: vec![], pairs });
    }

    // Case two: the source names no tag at all; ask the registry which tags exist
    if source.is_all_tags() {
        if !target.tag.is_empty() {
            return Err(ExpansionError::UnbalancedTags{ source: pair.source.clone(), target_tag: target.tag.clone() });
        }
        let handle: C::Source = match client.open_source(&source, "", plan.auth_for(&source.registry, &source.namespace)).await {
            Ok(handle) => handle,
            Err(err)   => { return Err(ExpansionError::SourceOpenError{ source: source.to_string(), err }); },
        };
        let tags: Vec<String> = match handle.list_tags().await {
            Ok(tags) => tags,
            Err(err) => { return Err(ExpansionError::TagListError{ source: source.to_string(), err }); },
        };
        let pairs: Vec<URLPair> = tags
            .into_iter()
            .map(|t| URLPair::new(format!("{}:{}", source.url_without_tag(), t), format!("{}:{}", target.url_without_tag(), t)))
            .collect();
        debug!("Expanded '{}' into {} single-tag rule(s)", pair.source, pairs.len());
        return Ok(Expansion{ jobs: vec![], pairs });
    }

    // Case three: a single, concrete tag; the rule becomes exactly one job (the target inherits the source's tag if it has none of its own)
    let target_tag: &str = if !target.tag.is_empty() { &target.tag } else { &source.tag };
    let src: C::Source = match client.open_source(&source, &source.tag, plan.auth_for(&source.registry, &source.namespace)).await {
        Ok(src) => src,
        Err(err) => { return Err(ExpansionError::SourceOpenError{ source: source.to_string(), err }); },
    };
    let tgt: C::Target = match client.open_target(&target, target_tag, plan.auth_for(&target.registry, &target.namespace)).await {
        Ok(tgt)  => tgt,
        Err(err) => { return Err(ExpansionError::TargetOpenError{ target: target.to_string(), err }); },
    };
    Ok(Expansion{ jobs: vec![ client.assemble(src, tgt) ], pairs: vec![] })
}





/***** LIBRARY *****/
/// Defines the pool of rule workers.
pub struct RuleHandler<C: ImageClient> {
    /// The client with which to open image handles.
    client : Arc<C>,
    /// The transfer plan, for credentials and the default target.
    plan   : Arc<TransferPlan>,
    /// The queues shared with the job pool and the retry controller.
    queues : Arc<WorkQueues<C::Job>>,
}

impl<C: ImageClient> RuleHandler<C> {
    /// Constructor for the RuleHandler.
    ///
    /// # Arguments
    /// - `client`: The client with which to open image handles.
    /// - `plan`: The transfer plan, for credentials and the default target.
    /// - `queues`: The queues shared with the job pool and the retry controller.
    ///
    /// # Returns
    /// A new RuleHandler instance.
    #[inline]
    pub fn new(client: Arc<C>, plan: Arc<TransferPlan>, queues: Arc<WorkQueues<C::Job>>) -> Self {
        Self {
            client,
            plan,
            queues,
        }
    }

    /// Runs the pool until the rule queue is drained.
    ///
    /// This function consumes the only senders on the job channel. When the last worker exits, the last sender drops with it, which closes the channel; that close is the termination signal for the job pool, and it necessarily happens exactly once, strictly after the last job has been enqueued.
    ///
    /// # Arguments
    /// - `jobs`: The send-side of the (bounded) job channel. Sending blocks while the job pool is saturated, which is what keeps expansion from racing ahead of execution.
    /// - `workers`: How many workers to spawn.
    pub async fn run(self, jobs: Sender<C::Job>, workers: usize) {
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(workers);
        for i in 0..workers {
            let client : Arc<C>                   = self.client.clone();
            let plan   : Arc<TransferPlan>        = self.plan.clone();
            let queues : Arc<WorkQueues<C::Job>>  = self.queues.clone();
            let jobs   : Sender<C::Job>           = jobs.clone();
            handles.push(tokio::spawn(Self::worker(i, client, plan, queues, jobs)));
        }
        drop(jobs);

        // Wait for all of them to run out of work
        for res in join_all(handles).await {
            if let Err(err) = res { error!("Rule worker panicked: {}", err); }
        }
    }

    /// Runs a single rule worker until the rule queue is empty.
    async fn worker(id: usize, client: Arc<C>, plan: Arc<TransferPlan>, queues: Arc<WorkQueues<C::Job>>, jobs: Sender<C::Job>) {
        debug!("Rule worker {}: started", id);
        loop {
            // An empty queue is this worker's cue to leave; a sibling that is still expanding will pick up whatever rules it pushes itself
            let pair: URLPair = match queues.pop_pair() {
                Some(pair) => pair,
                None       => { break; },
            };

            debug!("Rule worker {}: expanding '{}'...", id, pair);
            match expand(client.as_ref(), plan.as_ref(), &pair).await {
                Ok(expansion) => {
                    for job in expansion.jobs {
                        if jobs.send(job).await.is_err() {
                            error!("Rule worker {}: job channel closed while jobs were still pending", id);
                            return;
                        }
                    }
                    if !expansion.pairs.is_empty() { queues.push_pairs(expansion.pairs); }
                },
                Err(err) => {
                    warn!("Failed to expand rule '{}': {}", pair, err);
                    queues.push_failed_pair(pair);
                },
            }
        }
        debug!("Rule worker {}: no more rules, exiting", id);
    }
}
