//  ENGINE.rs
//    by Lut99
//
//  Created:
//    08 Feb 2023, 15:12:33
//  Last edited:
//    05 Apr 2023, 11:58:41
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the transfer engine itself: the orchestrator that seeds
//!   the rule queue, runs the two worker pools against each other over
//!   the bounded job channel, then keeps re-running whatever failed
//!   until the retry budget runs out.
//

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use freighter_cfg::plan::TransferPlan;
use specifications::transfer::ImageClient;

use crate::jobs::JobHandler;
use crate::queues::WorkQueues;
use crate::rules::RuleHandler;
use crate::spec::{TransferReport, URLPair};


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::error::Error;
    use std::fmt::{Display, Formatter, Result as FResult};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use specifications::errors::TransferError;
    use specifications::reference::{RegistryAuth, RepoRef};
    use specifications::transfer::{ImageSource, ImageTarget, TransferJob};

    use crate::errors::ExpansionError;
    use crate::rules::expand;

    use super::*;


    /***** ERRORS *****/
    /// Defines the failures the stub client can be scripted to produce.
    #[derive(Debug)]
    enum StubError {
        /// No tag list was scripted for this repository.
        NoTags{ reference: String },
        /// The repository was scripted to refuse opening handles on it.
        OpenRefused{ reference: String },
        /// The job was scripted to fail.
        ScriptedFailure{ reference: String },
    }

    impl Display for StubError {
        fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
            use StubError::*;
            match self {
                NoTags{ reference }          => write!(f, "No tags scripted for '{}'", reference),
                OpenRefused{ reference }     => write!(f, "Scripted open failure for '{}'", reference),
                ScriptedFailure{ reference } => write!(f, "Scripted failure for '{}'", reference),
            }
        }
    }

    impl Error for StubError {}



    /***** STUB CLIENT *****/
    /// The shared state behind every handle the stub client hands out.
    #[derive(Debug, Default)]
    struct StubState {
        /// The scripted tag lists, per `registry/namespace/repository`.
        tags     : Mutex<HashMap<String, Vec<String>>>,
        /// The `registry/namespace/repository`s that refuse to open handles at all.
        refused  : Mutex<HashSet<String>>,
        /// How many times each source reference should still fail (`usize::MAX` = always).
        failures : Mutex<HashMap<String, usize>>,
        /// Every executed (source, target) pair, in execution order.
        executed : Mutex<Vec<(String, String)>>,
    }

    /// A scriptable stand-in for the registry client.
    #[derive(Clone, Debug)]
    struct StubClient {
        state : Arc<StubState>,
    }

    impl StubClient {
        fn new() -> Self {
            Self{ state: Arc::new(StubState::default()) }
        }

        /// Scripts the tag list that `list_tags()` returns for the given `registry/namespace/repository`.
        fn script_tags(&self, repo: &str, tags: &[&str]) {
            self.state.tags.lock().insert(repo.into(), tags.iter().map(|t| t.to_string()).collect());
        }

        /// Scripts the given `registry/namespace/repository` to refuse opening handles on it, source- and target-side alike.
        fn script_open_failure(&self, repo: &str) {
            self.state.refused.lock().insert(repo.into());
        }

        /// Scripts the given source reference to fail its next `times` executions (`usize::MAX` = always).
        fn script_failures(&self, source: &str, times: usize) {
            self.state.failures.lock().insert(source.into(), times);
        }

        /// Returns every executed (source, target) pair so far, in execution order.
        fn executed(&self) -> Vec<(String, String)> {
            self.state.executed.lock().clone()
        }

        /// Returns the executed pairs as a sorted set, for order-insensitive comparisons.
        fn executed_sorted(&self) -> Vec<(String, String)> {
            let mut executed: Vec<(String, String)> = self.executed();
            executed.sort();
            executed
        }
    }

    #[derive(Debug)]
    struct StubSource {
        reference : String,
        tags      : Option<Vec<String>>,
    }

    #[async_trait]
    impl ImageSource for StubSource {
        fn reference(&self) -> String { self.reference.clone() }

        async fn list_tags(&self) -> Result<Vec<String>, TransferError> {
            match &self.tags {
                Some(tags) => Ok(tags.clone()),
                None       => Err(TransferError::new(StubError::NoTags{ reference: self.reference.clone() })),
            }
        }
    }

    #[derive(Debug)]
    struct StubTarget {
        reference : String,
    }

    impl ImageTarget for StubTarget {
        fn reference(&self) -> String { self.reference.clone() }
    }

    #[derive(Debug)]
    struct StubJob {
        state  : Arc<StubState>,
        source : String,
        target : String,
    }

    #[async_trait]
    impl TransferJob for StubJob {
        fn source(&self) -> String { self.source.clone() }
        fn target(&self) -> String { self.target.clone() }

        async fn run(&self) -> Result<(), TransferError> {
            // Every attempt counts as an execution, also the failing ones
            self.state.executed.lock().push((self.source.clone(), self.target.clone()));

            let fail: bool = {
                let mut failures = self.state.failures.lock();
                match failures.get_mut(&self.source) {
                    Some(left) if *left > 0 => {
                        if *left != usize::MAX { *left -= 1; }
                        true
                    },
                    _ => false,
                }
            };
            if fail { Err(TransferError::new(StubError::ScriptedFailure{ reference: self.source.clone() })) } else { Ok(()) }
        }
    }

    #[async_trait]
    impl ImageClient for StubClient {
        type Source = StubSource;
        type Target = StubTarget;
        type Job    = StubJob;

        async fn open_source(&self, image: &RepoRef, tag: &str, _auth: RegistryAuth) -> Result<Self::Source, TransferError> {
            if self.state.refused.lock().contains(&image.url_without_tag()) {
                return Err(TransferError::new(StubError::OpenRefused{ reference: image.url_without_tag() }));
            }
            Ok(StubSource {
                reference : if !tag.is_empty() { format!("{}:{}", image.url_without_tag(), tag) } else { image.url_without_tag() },
                tags      : self.state.tags.lock().get(&image.url_without_tag()).cloned(),
            })
        }

        async fn open_target(&self, image: &RepoRef, tag: &str, _auth: RegistryAuth) -> Result<Self::Target, TransferError> {
            if self.state.refused.lock().contains(&image.url_without_tag()) {
                return Err(TransferError::new(StubError::OpenRefused{ reference: image.url_without_tag() }));
            }
            Ok(StubTarget {
                reference : format!("{}:{}", image.url_without_tag(), tag),
            })
        }

        fn assemble(&self, source: Self::Source, target: Self::Target) -> Self::Job {
            StubJob {
                state  : self.state.clone(),
                source : source.reference,
                target : target.reference,
            }
        }
    }



    /***** HELPER FUNCTIONS *****/
    /// Builds a plan with the given seed map, worker count and retry budget (and no defaults, no credentials).
    fn plan(images: &[(&str, &str)], routines: usize, retries: usize) -> TransferPlan {
        TransferPlan {
            images            : images.iter().map(|(s, t)| (s.to_string(), t.to_string())).collect(),
            auth              : HashMap::new(),
            routine_nums      : routines,
            retry_nums        : retries,
            default_registry  : String::new(),
            default_namespace : String::new(),
        }
    }

    /// Runs a fresh engine for the given client and plan.
    async fn run(client: &StubClient, plan: TransferPlan) -> TransferReport {
        TransferEngine::new(Arc::new(client.clone()), Arc::new(plan)).run(false).await
    }

    /// Runs a single expansion against the given client and returns the error it must produce.
    async fn expand_err(client: &StubClient, pair: URLPair) -> ExpansionError {
        match expand(client, &plan(&[], 1, 0), &pair).await {
            Err(err) => err,
            Ok(_)    => panic!("Expansion of '{}' unexpectedly succeeded", pair),
        }
    }



    /***** SCENARIOS *****/
    /// A single, concretely tagged rule becomes exactly one executed job
    #[tokio::test]
    async fn engine_single_tag_copy() {
        let client: StubClient = StubClient::new();
        let report: TransferReport = run(&client, plan(&[ ("r1.example/a/b:v1", "r2.example/x/y:v1") ], 2, 0)).await;

        assert!(report.is_clean());
        assert_eq!(report.completed, 1);
        assert_eq!(client.executed(), vec![ ("r1.example/a/b:v1".into(), "r2.example/x/y:v1".into()) ]);
    }

    /// An all-tags rule becomes one job per tag the registry reports
    #[tokio::test]
    async fn engine_all_tags_expansion() {
        let client: StubClient = StubClient::new();
        client.script_tags("r1/a/b", &[ "v1", "v2" ]);
        let report: TransferReport = run(&client, plan(&[ ("r1/a/b", "r2/x/y") ], 2, 0)).await;

        assert!(report.is_clean());
        assert_eq!(client.executed_sorted(), vec![
            ("r1/a/b:v1".into(), "r2/x/y:v1".into()),
            ("r1/a/b:v2".into(), "r2/x/y:v2".into()),
        ]);
    }

    /// A multi-tag rule becomes one job per listed tag
    #[tokio::test]
    async fn engine_multi_tag_inline() {
        let client: StubClient = StubClient::new();
        let report: TransferReport = run(&client, plan(&[ ("r1/a/b:v1,v2", "r2/x/y") ], 2, 0)).await;

        assert!(report.is_clean());
        assert_eq!(client.executed_sorted(), vec![
            ("r1/a/b:v1".into(), "r2/x/y:v1".into()),
            ("r1/a/b:v2".into(), "r2/x/y:v2".into()),
        ]);
    }

    /// A rule without a target falls back to the default registry/namespace
    #[tokio::test]
    async fn engine_default_target() {
        let client: StubClient = StubClient::new();
        let mut plan: TransferPlan = plan(&[ ("r1/a/b:v1", "") ], 2, 0);
        plan.default_registry  = "r2".into();
        plan.default_namespace = "x".into();
        let report: TransferReport = run(&client, plan).await;

        assert!(report.is_clean());
        assert_eq!(client.executed(), vec![ ("r1/a/b:v1".into(), "r2/x/b:v1".into()) ]);
    }

    /// A rule without a target and without defaults is an expansion failure, not a crash
    #[tokio::test]
    async fn engine_missing_defaults() {
        let client: StubClient = StubClient::new();
        let report: TransferReport = run(&client, plan(&[ ("r1/a/b:v1", "") ], 2, 0)).await;

        assert!(client.executed().is_empty());
        assert_eq!(report.failed_pairs, vec![ ("r1/a/b:v1".into(), String::new()) ]);
    }

    /// A job that fails twice succeeds within a two-round retry budget
    #[tokio::test]
    async fn engine_retry_eventually_succeeds() {
        let client: StubClient = StubClient::new();
        client.script_failures("r1/a/b:v1", 2);
        let report: TransferReport = run(&client, plan(&[ ("r1/a/b:v1", "r2/x/y:v1") ], 2, 2)).await;

        assert!(report.is_clean());
        assert_eq!(report.completed, 1);
        assert_eq!(client.executed().len(), 3);
    }

    /// A job that always fails is executed once per round and then reported
    #[tokio::test]
    async fn engine_permanent_failure() {
        let client: StubClient = StubClient::new();
        client.script_failures("r1/a/b:v1", usize::MAX);
        let report: TransferReport = run(&client, plan(&[ ("r1/a/b:v1", "r2/x/y:v1") ], 2, 2)).await;

        assert_eq!(report.completed, 0);
        assert_eq!(report.failed_jobs, vec![ ("r1/a/b:v1".into(), "r2/x/y:v1".into()) ]);
        // One execution in the main round plus one per retry round
        assert_eq!(client.executed().len(), 3);
    }

    /// An empty seed map drains cleanly
    #[tokio::test]
    async fn engine_empty_seed() {
        let client: StubClient = StubClient::new();
        let report: TransferReport = run(&client, plan(&[], 2, 2)).await;

        assert!(report.is_clean());
        assert_eq!(report.completed, 0);
    }

    /// A source reference that does not parse is an expansion failure
    #[tokio::test]
    async fn engine_malformed_source() {
        let client: StubClient = StubClient::new();
        let report: TransferReport = run(&client, plan(&[ ("ubuntu", "r2/x/y:v1") ], 2, 0)).await;

        assert!(client.executed().is_empty());
        assert_eq!(report.failed_pairs, vec![ ("ubuntu".into(), "r2/x/y:v1".into()) ]);
        assert!(matches!(expand_err(&client, URLPair::new("ubuntu", "r2/x/y:v1")).await, ExpansionError::SourceParseError{ .. }));
    }

    /// A target reference that does not parse is an expansion failure
    #[tokio::test]
    async fn engine_malformed_target() {
        let client: StubClient = StubClient::new();
        let report: TransferReport = run(&client, plan(&[ ("r1/a/b:v1", "ubuntu") ], 2, 0)).await;

        assert!(client.executed().is_empty());
        assert_eq!(report.failed_pairs, vec![ ("r1/a/b:v1".into(), "ubuntu".into()) ]);
        assert!(matches!(expand_err(&client, URLPair::new("r1/a/b:v1", "ubuntu")).await, ExpansionError::TargetParseError{ .. }));
    }

    /// An all-tags source whose tags cannot be listed is an expansion failure
    #[tokio::test]
    async fn engine_tag_list_failure() {
        // No tags scripted for the repository, so listing them fails
        let client: StubClient = StubClient::new();
        let report: TransferReport = run(&client, plan(&[ ("r1/a/b", "r2/x/y") ], 2, 1)).await;

        assert!(client.executed().is_empty());
        assert_eq!(report.failed_pairs, vec![ ("r1/a/b".into(), "r2/x/y".into()) ]);
        assert!(matches!(expand_err(&client, URLPair::new("r1/a/b", "r2/x/y")).await, ExpansionError::TagListError{ .. }));
    }

    /// A source that refuses to open is an expansion failure
    #[tokio::test]
    async fn engine_source_open_failure() {
        let client: StubClient = StubClient::new();
        client.script_open_failure("r1/a/b");
        let report: TransferReport = run(&client, plan(&[ ("r1/a/b:v1", "r2/x/y:v1") ], 2, 0)).await;

        assert!(client.executed().is_empty());
        assert_eq!(report.failed_pairs, vec![ ("r1/a/b:v1".into(), "r2/x/y:v1".into()) ]);
        assert!(matches!(expand_err(&client, URLPair::new("r1/a/b:v1", "r2/x/y:v1")).await, ExpansionError::SourceOpenError{ .. }));
    }

    /// A target that refuses to open is an expansion failure (the source side opened fine)
    #[tokio::test]
    async fn engine_target_open_failure() {
        let client: StubClient = StubClient::new();
        client.script_open_failure("r2/x/y");
        let report: TransferReport = run(&client, plan(&[ ("r1/a/b:v1", "r2/x/y:v1") ], 2, 0)).await;

        assert!(client.executed().is_empty());
        assert_eq!(report.failed_pairs, vec![ ("r1/a/b:v1".into(), "r2/x/y:v1".into()) ]);
        assert!(matches!(expand_err(&client, URLPair::new("r1/a/b:v1", "r2/x/y:v1")).await, ExpansionError::TargetOpenError{ .. }));
    }

    /// An all-tags source with a pinned target tag is an expansion failure
    #[tokio::test]
    async fn engine_unbalanced_tags() {
        let client: StubClient = StubClient::new();
        client.script_tags("r1/a/b", &[ "v1" ]);
        let report: TransferReport = run(&client, plan(&[ ("r1/a/b", "r2/x/y:v1") ], 2, 1)).await;

        assert!(client.executed().is_empty());
        assert_eq!(report.failed_pairs.len(), 1);
    }

    /// A multi-tag source with a target tag that names one of its tags is an expansion failure
    #[tokio::test]
    async fn engine_tag_list_mismatch() {
        let client: StubClient = StubClient::new();
        let report: TransferReport = run(&client, plan(&[ ("r1/a/b:a,b,c", "r2/x/y:a") ], 2, 0)).await;

        assert!(client.executed().is_empty());
        assert_eq!(report.failed_pairs.len(), 1);
    }

    /// A rule with an empty source is an expansion failure
    #[tokio::test]
    async fn engine_empty_source() {
        let client: StubClient = StubClient::new();
        let engine: TransferEngine<StubClient> = TransferEngine::new(Arc::new(client.clone()), Arc::new(plan(&[], 2, 0)));
        let report: TransferReport = engine.run_pairs(vec![ URLPair::new("", "r2/x/y:v1") ]).await;

        assert!(client.executed().is_empty());
        assert_eq!(report.failed_pairs.len(), 1);
    }

    /// A single worker terminates even though it has to drain its own expansions
    #[tokio::test]
    async fn engine_single_worker_drains_own_expansions() {
        let client: StubClient = StubClient::new();
        client.script_tags("r1/a/b", &[ "v1", "v2", "v3" ]);
        let report: TransferReport = run(&client, plan(&[ ("r1/a/b", "r2/x/y") ], 1, 0)).await;

        assert!(report.is_clean());
        assert_eq!(client.executed().len(), 3);
    }

    /// Identical rules are not deduplicated: submitting the same rule thrice runs three jobs
    #[tokio::test]
    async fn engine_no_deduplication() {
        let client: StubClient = StubClient::new();
        let engine: TransferEngine<StubClient> = TransferEngine::new(Arc::new(client.clone()), Arc::new(plan(&[], 2, 0)));
        let pair: URLPair = URLPair::new("r1/a/b:v1", "r2/x/y:v1");
        let report: TransferReport = engine.run_pairs(vec![ pair.clone(), pair.clone(), pair ]).await;

        assert!(report.is_clean());
        assert_eq!(report.completed, 3);
        assert_eq!(client.executed().len(), 3);
    }

    /// The set of executed jobs does not depend on the number of workers
    #[tokio::test]
    async fn engine_job_set_independent_of_worker_count() {
        let seed: [(&str, &str); 3] = [
            ("r1/a/b:v1,v2,v3", "r2/x/y"),
            ("r1/a/c", "r2/x/z"),
            ("r1/a/d:solo", "r2/x/w:solo"),
        ];

        let narrow: StubClient = StubClient::new();
        narrow.script_tags("r1/a/c", &[ "t1", "t2" ]);
        run(&narrow, plan(&seed, 1, 0)).await;

        let wide: StubClient = StubClient::new();
        wide.script_tags("r1/a/c", &[ "t1", "t2" ]);
        run(&wide, plan(&seed, 8, 0)).await;

        assert_eq!(narrow.executed_sorted(), wide.executed_sorted());
        assert_eq!(narrow.executed().len(), 6);
    }

    /// Re-running the same seed against a fresh engine executes the identical job set
    #[tokio::test]
    async fn engine_runs_are_idempotent() {
        let seed: [(&str, &str); 2] = [ ("r1/a/b:v1,v2", "r2/x/y"), ("r1/a/d:solo", "r2/x/w") ];

        let first: StubClient = StubClient::new();
        run(&first, plan(&seed, 3, 0)).await;
        let second: StubClient = StubClient::new();
        run(&second, plan(&seed, 3, 0)).await;

        assert_eq!(first.executed_sorted(), second.executed_sorted());
    }

    /// A retry backlog larger than the channel capacity must not deadlock the retry round
    #[tokio::test]
    async fn engine_retry_backlog_exceeds_pool() {
        let client: StubClient = StubClient::new();
        let mut seed: Vec<(String, String)> = Vec::new();
        for i in 0..8 {
            let source: String = format!("r1/a/b:v{}", i);
            client.script_failures(&source, usize::MAX);
            seed.push((source, format!("r2/x/y:v{}", i)));
        }
        let seed: Vec<(&str, &str)> = seed.iter().map(|(s, t)| (s.as_str(), t.as_str())).collect();
        let report: TransferReport = run(&client, plan(&seed, 2, 1)).await;

        assert_eq!(report.failed_jobs.len(), 8);
        // Every job ran in the main round and once more in the single retry round
        assert_eq!(client.executed().len(), 16);
    }

    /// Seeding with `invert` swaps the map's keys and values
    #[tokio::test]
    async fn engine_inverted_seed() {
        let client: StubClient = StubClient::new();
        let report: TransferReport = TransferEngine::new(
            Arc::new(client.clone()),
            Arc::new(plan(&[ ("r2/x/y:v1", "r1/a/b:v1") ], 2, 0)),
        ).run(true).await;

        assert!(report.is_clean());
        assert_eq!(client.executed(), vec![ ("r1/a/b:v1".into(), "r2/x/y:v1".into()) ]);
    }
}





/***** LIBRARY *****/
/// Defines the engine that orchestrates a single transfer run.
pub struct TransferEngine<C: ImageClient> {
    /// The client with which images are opened and transferred.
    client : Arc<C>,
    /// The transfer plan this run executes.
    plan   : Arc<TransferPlan>,
    /// The queues shared by the pools and the retry controller.
    queues : Arc<WorkQueues<C::Job>>,
}

impl<C: ImageClient> TransferEngine<C> {
    /// Constructor for the TransferEngine.
    ///
    /// # Arguments
    /// - `client`: The client with which images are opened and transferred.
    /// - `plan`: The transfer plan to execute.
    ///
    /// # Returns
    /// A new TransferEngine instance, ready for a single [`TransferEngine::run()`].
    #[inline]
    pub fn new(client: Arc<C>, plan: Arc<TransferPlan>) -> Self {
        Self {
            client,
            plan,
            queues : Arc::new(WorkQueues::new()),
        }
    }

    /// Runs the full pipeline over the plan's seed map.
    ///
    /// # Arguments
    /// - `invert`: If true, the seed map is read as `target -> source` instead of `source -> target`. This is the convention of the vendor preset, whose rule generation keys by target.
    ///
    /// # Returns
    /// The end-of-run report. Note that residual failures live in the report; they are not an `Err` of this function.
    pub async fn run(self, invert: bool) -> TransferReport {
        let pairs: Vec<URLPair> = self.plan.images
            .iter()
            .map(|(k, v)| if invert { URLPair::new(v.clone(), k.clone()) } else { URLPair::new(k.clone(), v.clone()) })
            .collect();
        self.run_pairs(pairs).await
    }

    /// Runs the full pipeline over the given, already-built rules.
    ///
    /// # Arguments
    /// - `pairs`: The rules to expand and execute.
    ///
    /// # Returns
    /// The end-of-run report.
    pub async fn run_pairs(self, pairs: Vec<URLPair>) -> TransferReport {
        let workers: usize = self.workers();
        info!("Transferring {} rule(s) on {} worker(s) per pool", pairs.len(), workers);
        self.queues.push_pairs(pairs);

        // The main round: job pool in the background, rule pool in the foreground; the rule pool closes the channel when it is done
        let (tx, rx) = mpsc::channel::<C::Job>(workers);
        let jobs: JoinHandle<()> = tokio::spawn(JobHandler::<C>::new(self.queues.clone()).run(rx, workers));
        RuleHandler::new(self.client.clone(), self.plan.clone(), self.queues.clone()).run(tx, workers).await;
        if let Err(err) = jobs.await { error!("Job pool crashed: {}", err); }

        // Then keep feeding the failures back until the budget runs out
        self.retry().await;

        // Whatever is left in the failure queues is now final
        self.report()
    }



    /// Re-runs the failure queues, up to the configured number of rounds or until both are empty.
    ///
    /// Retry rounds run strictly after the main pools have exited and never overlap each other, so the queues are quiescent when a round starts.
    async fn retry(&self) {
        let workers: usize = self.workers();
        for round in 1..=self.plan.retry_nums {
            let n_jobs  : usize = self.queues.failed_job_count();
            let n_pairs : usize = self.queues.failed_pair_count();
            if n_jobs == 0 && n_pairs == 0 { break; }
            info!("Retry round {}/{}: {} failed job(s), {} failed rule(s)", round, self.plan.retry_nums, n_jobs, n_pairs);

            // Start the consumers _before_ re-feeding the channel; it is bounded, so feeding a backlog larger than its capacity into it first would deadlock
            let (tx, rx) = mpsc::channel::<C::Job>(workers);
            let jobs: JoinHandle<()> = tokio::spawn(JobHandler::<C>::new(self.queues.clone()).run(rx, workers));
            for job in self.queues.drain_failed_jobs() {
                if tx.send(job).await.is_err() {
                    error!("Job channel closed while re-feeding failed jobs");
                    break;
                }
            }

            // Failed rules go back through a fresh rule pool, which also takes over closing the channel; without them, dropping our sender closes it
            if self.queues.failed_pair_count() > 0 {
                let n_requeued: usize = self.queues.requeue_failed_pairs();
                debug!("Retry round {}: re-expanding {} rule(s)", round, n_requeued);
                RuleHandler::new(self.client.clone(), self.plan.clone(), self.queues.clone()).run(tx, workers).await;
            } else {
                drop(tx);
            }

            if let Err(err) = jobs.await { error!("Job pool crashed during retry round {}: {}", round, err); }
        }
    }

    /// Emits the end-of-run summary and returns it.
    fn report(&self) -> TransferReport {
        let report: TransferReport = TransferReport {
            completed    : self.queues.completed(),
            failed_jobs  : self.queues.failed_jobs_snapshot(),
            failed_pairs : self.queues.failed_pairs_snapshot(),
        };

        if report.is_clean() {
            info!("Transferred {} image(s), no residual failures", report.completed);
        } else {
            for (source, target) in &report.failed_jobs {
                warn!("Transfer failed permanently: '{}' -> '{}'", source, target);
            }
            for (source, target) in &report.failed_pairs {
                warn!("Rule failed permanently: '{}' -> '{}'", source, target);
            }
            warn!(
                "Transferred {} image(s); {} transfer(s) and {} rule(s) failed permanently",
                report.completed,
                report.failed_jobs.len(),
                report.failed_pairs.len(),
            );
        }
        report
    }

    /// Returns the effective worker count per pool (at least one).
    fn workers(&self) -> usize {
        if self.plan.routine_nums > 0 {
            self.plan.routine_nums
        } else {
            warn!("Configured worker count is 0; running with 1 worker per pool instead");
            1
        }
    }
}
