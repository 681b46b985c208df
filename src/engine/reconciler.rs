use futures::FutureExt;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, info_span, instrument, warn, Instrument};

use crate::address::CanonicalAddress;
use crate::balances::Category;
use crate::chains::{Chain, ChainDirectory};
use crate::engine::check::run_balance_check;
use crate::engine::handle::ReconcileHandle;
use crate::engine::reporter::CheckReporter;
use crate::engine::result::AggregateResult;
use crate::error::{CheckContext, CheckError, CheckFailure, ReconcileError};
use crate::sources::{BalanceSource, NodeSourceFactory};

pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 32;

/// Schedules one check per (chain, category) and joins them all.
///
/// The node is the reference side ("expected"), the aggregator is the side
/// under validation ("actual"). Checks are isolated from each other: a
/// failure in one pair never aborts or delays another beyond the shared
/// concurrency limit. The limit is engine-wide, so concurrent runs share it.
pub struct ReconciliationEngine {
    directory: ChainDirectory,
    aggregator: Arc<dyn BalanceSource>,
    nodes: Arc<dyn NodeSourceFactory>,
    reporter: Arc<dyn CheckReporter>,
    limiter: Arc<Semaphore>,
}

impl ReconciliationEngine {
    pub fn new(
        directory: ChainDirectory,
        aggregator: Arc<dyn BalanceSource>,
        nodes: Arc<dyn NodeSourceFactory>,
        reporter: Arc<dyn CheckReporter>,
    ) -> Self {
        Self {
            directory,
            aggregator,
            nodes,
            reporter,
            limiter: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_CHECKS)),
        }
    }

    pub fn with_max_concurrent_checks(mut self, limit: usize) -> Self {
        self.limiter = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    pub fn directory(&self) -> &ChainDirectory {
        &self.directory
    }

    #[instrument(skip_all, fields(address = %address))]
    pub async fn reconcile(
        &self,
        address: &CanonicalAddress,
    ) -> Result<AggregateResult, ReconcileError> {
        let chains = self.directory.list_checkable_chains().await?;
        Ok(self.reconcile_chains(&chains, address).await)
    }

    /// Run every check for `chains`. Returns only once all `3 × chains`
    /// checks have completed.
    #[instrument(skip_all, fields(address = %address, chains = chains.len()))]
    pub async fn reconcile_chains(
        &self,
        chains: &[Chain],
        address: &CanonicalAddress,
    ) -> AggregateResult {
        let mut checks = JoinSet::new();

        for chain in chains {
            let node = self.nodes.for_chain(chain);

            for category in Category::ALL {
                let job = CheckJob {
                    category,
                    chain: chain.name.clone(),
                    address: address.clone(),
                    expected: Arc::clone(&node),
                    actual: Arc::clone(&self.aggregator),
                    reporter: Arc::clone(&self.reporter),
                    limiter: Arc::clone(&self.limiter),
                };
                let span = info_span!("check", chain = %chain.name, check = category.check_name());
                checks.spawn(job.run().instrument(span));
            }
        }

        let checks_run = checks.len();
        let mut errors = Vec::new();

        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => errors.push(err),
                Err(e) => warn!(error = %e, "check task did not complete"),
            }
        }

        info!(
            checks = checks_run,
            failures = errors.len(),
            "reconciliation finished"
        );

        AggregateResult::new(address.clone(), chains.len(), checks_run, errors)
    }

    /// Start `reconcile` in the background and return a handle to it.
    pub fn spawn(self: &Arc<Self>, address: CanonicalAddress) -> ReconcileHandle {
        let engine = Arc::clone(self);
        ReconcileHandle::new(tokio::spawn(async move {
            engine.reconcile(&address).await
        }))
    }

    /// Like `spawn`, for chains the caller already resolved.
    pub fn spawn_for_chains(
        self: &Arc<Self>,
        chains: Vec<Chain>,
        address: CanonicalAddress,
    ) -> ReconcileHandle {
        let engine = Arc::clone(self);
        ReconcileHandle::new(tokio::spawn(async move {
            Ok(engine.reconcile_chains(&chains, &address).await)
        }))
    }
}

struct CheckJob {
    category: Category,
    chain: String,
    address: CanonicalAddress,
    expected: Arc<dyn BalanceSource>,
    actual: Arc<dyn BalanceSource>,
    reporter: Arc<dyn CheckReporter>,
    limiter: Arc<Semaphore>,
}

impl CheckJob {
    /// Every way this job can end, panics in the sources or the reporter
    /// included, yields either `Ok` or a `CheckError` for this pair.
    async fn run(self) -> Result<(), CheckError> {
        let reporter = Arc::clone(&self.reporter);
        let context = CheckContext {
            category: self.category,
            chain: self.chain.clone(),
            expected_url: guarded_url(self.expected.as_ref(), self.category, &self.address),
            actual_url: guarded_url(self.actual.as_ref(), self.category, &self.address),
        };

        let outcome = AssertUnwindSafe(self.execute(&context))
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(failure)) => failure,
            Err(payload) => CheckFailure::TaskAborted(panic_message(payload.as_ref())),
        };

        let err = CheckError { context, failure };
        if catch_unwind(AssertUnwindSafe(|| reporter.check_failed(&err))).is_err() {
            warn!(error = %err, "reporter panicked while recording a failed check");
        }
        Err(err)
    }

    async fn execute(self, context: &CheckContext) -> Result<(), CheckFailure> {
        let _permit = self
            .limiter
            .acquire_owned()
            .await
            .map_err(|_| CheckFailure::TaskAborted("check limiter closed".to_string()))?;

        self.reporter.check_started(context);
        run_balance_check(
            self.category,
            &self.address,
            self.expected.as_ref(),
            self.actual.as_ref(),
        )
        .await?;
        self.reporter.check_passed(context);

        Ok(())
    }
}

fn guarded_url(
    source: &dyn BalanceSource,
    category: Category,
    address: &CanonicalAddress,
) -> Option<String> {
    catch_unwind(AssertUnwindSafe(|| source.url(category, address).ok()))
        .ok()
        .flatten()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "check panicked".to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::client::JsonClient;
    use crate::error::{FetchError, SourceError};
    use std::collections::HashSet;
    use std::time::Duration;

    fn address() -> CanonicalAddress {
        CanonicalAddress::from_hex("00443214c74254b635cf84653a56d7c675be77df").unwrap()
    }

    fn directory() -> ChainDirectory {
        // Never queried by `reconcile_chains`.
        ChainDirectory::new(
            JsonClient::new(Duration::from_secs(1)).unwrap(),
            "http://127.0.0.1:9",
        )
    }

    fn engine(
        aggregator: StaticSource,
        nodes: StaticNodes,
        reporter: Arc<RecordingReporter>,
    ) -> ReconciliationEngine {
        ReconciliationEngine::new(directory(), Arc::new(aggregator), Arc::new(nodes), reporter)
    }

    #[tokio::test]
    async fn test_clean_run_schedules_three_checks_per_chain() {
        let reporter = Arc::new(RecordingReporter::default());
        let aggregator = StaticSource::new("aggregator")
            .with(Category::Spendable, &[("uatom", "100")]);
        let nodes = StaticNodes::default()
            .with("cosmos", StaticSource::new("node").with(Category::Spendable, &[("uatom", "100")]))
            .with("osmosis", StaticSource::new("node"));

        let engine = engine(aggregator, nodes, reporter.clone());
        let result = engine
            .reconcile_chains(&[chain("cosmos"), chain("osmosis")], &address())
            .await;

        assert!(result.is_clean());
        assert_eq!(result.chains_checked, 2);
        assert_eq!(result.checks_run, 6);
        assert_eq!(reporter.started.lock().len(), 6);
        assert_eq!(reporter.passed.lock().len(), 6);
    }

    #[tokio::test]
    async fn test_one_node_source_per_chain() {
        let nodes = Arc::new(StaticNodes::default());
        let engine = ReconciliationEngine::new(
            directory(),
            Arc::new(StaticSource::new("aggregator")),
            nodes.clone(),
            Arc::new(RecordingReporter::default()),
        );

        engine
            .reconcile_chains(&[chain("a"), chain("b"), chain("c")], &address())
            .await;
        assert_eq!(nodes.built(), 3);
    }

    #[tokio::test]
    async fn test_failures_are_isolated_and_carry_provenance() {
        let reporter = Arc::new(RecordingReporter::default());
        let aggregator = StaticSource::new("aggregator")
            .with(Category::Spendable, &[("uatom", "99")])
            .failing(Category::Unbonding, || {
                SourceError::Fetch(FetchError::UnexpectedStatus {
                    url: "static://aggregator".to_string(),
                    status: 503,
                })
            });
        let nodes = StaticNodes::default().with(
            "cosmos",
            StaticSource::new("node")
                .with(Category::Spendable, &[("uatom", "100")])
                .with(Category::Staking, &[("val", "5")]),
        );

        let engine = engine(aggregator, nodes, reporter.clone());
        let result = engine.reconcile_chains(&[chain("cosmos")], &address()).await;

        assert_eq!(result.checks_run, 3);
        assert_eq!(result.errors.len(), 3);
        assert_eq!(result.mismatches().count(), 2);
        assert_eq!(result.unverified().count(), 1);

        let categories: HashSet<Category> =
            result.errors.iter().map(|e| e.context.category).collect();
        assert_eq!(categories.len(), 3);

        for err in &result.errors {
            assert_eq!(err.context.chain, "cosmos");
            assert!(err.context.expected_url.as_deref().unwrap().starts_with("static://node"));
            assert!(err.context.actual_url.as_deref().unwrap().starts_with("static://aggregator"));
        }
        assert_eq!(reporter.failed.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_extra_aggregator_balances_do_not_fail() {
        let aggregator = StaticSource::new("aggregator")
            .with(Category::Spendable, &[("uatom", "1"), ("ibc/XYZ", "2")]);
        let nodes = StaticNodes::default().with(
            "cosmos",
            StaticSource::new("node").with(Category::Spendable, &[("uatom", "1")]),
        );

        let engine = engine(aggregator, nodes, Arc::new(RecordingReporter::default()));
        let result = engine.reconcile_chains(&[chain("cosmos")], &address()).await;
        assert!(result.is_clean());
    }

    #[tokio::test]
    async fn test_panicking_check_is_recorded_not_lost() {
        let nodes = StaticNodes::default().with(
            "cosmos",
            StaticSource::new("node").panicking(Category::Staking),
        );

        let engine = engine(
            StaticSource::new("aggregator"),
            nodes,
            Arc::new(RecordingReporter::default()),
        );
        let result = engine.reconcile_chains(&[chain("cosmos")], &address()).await;

        assert_eq!(result.errors.len(), 1);
        let err = &result.errors[0];
        assert_eq!(err.context.category, Category::Staking);
        assert_eq!(err.failure.kind(), "task_aborted");
        assert!(err.failure.to_string().contains("node exploded"));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded_but_every_check_runs() {
        let gauge = Arc::new(InFlight::default());
        let aggregator =
            StaticSource::new("aggregator").slow(Duration::from_millis(20), gauge.clone());
        let aggregator = Arc::new(aggregator);

        let engine = ReconciliationEngine::new(
            directory(),
            aggregator.clone(),
            Arc::new(StaticNodes::default()),
            Arc::new(RecordingReporter::default()),
        )
        .with_max_concurrent_checks(2);

        let chains: Vec<Chain> = (0..5).map(|i| chain(&format!("chain-{}", i))).collect();
        let result = engine.reconcile_chains(&chains, &address()).await;

        assert!(result.is_clean());
        assert_eq!(result.checks_run, 15);
        assert_eq!(aggregator.calls(), 15);
        assert!(gauge.peak() <= 2, "peak in-flight was {}", gauge.peak());
    }

    #[tokio::test]
    async fn test_no_chains_is_a_clean_empty_run() {
        let engine = engine(
            StaticSource::new("aggregator"),
            StaticNodes::default(),
            Arc::new(RecordingReporter::default()),
        );
        let result = engine.reconcile_chains(&[], &address()).await;
        assert!(result.is_clean());
        assert_eq!(result.checks_run, 0);
    }

    #[tokio::test]
    async fn test_rerun_against_unchanged_data_is_idempotent() {
        let aggregator = StaticSource::new("aggregator")
            .with(Category::Spendable, &[("uatom", "1")])
            .with(Category::Staking, &[("val", "7")]);
        let nodes = StaticNodes::default()
            .with("a", StaticSource::new("node").with(Category::Spendable, &[("uatom", "2")]))
            .with("b", StaticSource::new("node").with(Category::Staking, &[("val", "8")]));
        let engine = engine(aggregator, nodes, Arc::new(RecordingReporter::default()));
        let chains = [chain("a"), chain("b")];

        let summarize = |result: &AggregateResult| {
            let mut lines: Vec<String> = result.errors.iter().map(|e| e.to_string()).collect();
            lines.sort();
            lines
        };

        let first = engine.reconcile_chains(&chains, &address()).await;
        let second = engine.reconcile_chains(&chains, &address()).await;
        assert_eq!(first.errors.len(), 2);
        assert_eq!(summarize(&first), summarize(&second));
    }

    #[tokio::test]
    async fn test_spawned_run_can_be_awaited_and_aborted() {
        let gauge = Arc::new(InFlight::default());
        let engine = Arc::new(engine(
            StaticSource::new("aggregator").slow(Duration::from_secs(30), gauge),
            StaticNodes::default(),
            Arc::new(RecordingReporter::default()),
        ));

        let handle = engine.spawn_for_chains(vec![chain("cosmos")], address());
        assert!(!handle.is_finished());
        handle.abort();
        assert!(matches!(handle.join().await, Err(ReconcileError::Cancelled)));

        let fast = Arc::new(engine_with_clean_sources());
        let result = fast
            .spawn_for_chains(vec![chain("cosmos")], address())
            .join()
            .await
            .unwrap();
        assert_eq!(result.checks_run, 3);
    }

    #[tokio::test]
    async fn test_unreachable_directory_fails_the_run() {
        let aggregator = Arc::new(StaticSource::new("aggregator"));
        let engine = ReconciliationEngine::new(
            directory(),
            aggregator.clone(),
            Arc::new(StaticNodes::default()),
            Arc::new(RecordingReporter::default()),
        );

        let err = engine.reconcile(&address()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Directory(_)));
        assert_eq!(aggregator.calls(), 0);
    }

    #[tokio::test]
    async fn test_panicking_reporter_never_yields_a_clean_result() {
        let engine = ReconciliationEngine::new(
            directory(),
            Arc::new(StaticSource::new("aggregator")),
            Arc::new(StaticNodes::default()),
            Arc::new(ExplodingReporter {
                on_started: true,
                on_failed: true,
            }),
        );

        let result = engine.reconcile_chains(&[chain("cosmos")], &address()).await;

        assert!(!result.is_clean());
        assert_eq!(result.checks_run, 3);
        assert_eq!(result.errors.len(), 3);
        for err in &result.errors {
            assert_eq!(err.failure.kind(), "task_aborted");
            assert_eq!(err.context.chain, "cosmos");
            assert!(err.context.expected_url.is_some());
        }
        let categories: HashSet<Category> =
            result.errors.iter().map(|e| e.context.category).collect();
        assert_eq!(categories.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_survives_a_panicking_failure_hook() {
        let nodes = StaticNodes::default().with(
            "cosmos",
            StaticSource::new("node").with(Category::Spendable, &[("uatom", "1")]),
        );
        let engine = ReconciliationEngine::new(
            directory(),
            Arc::new(StaticSource::new("aggregator")),
            Arc::new(nodes),
            Arc::new(ExplodingReporter {
                on_started: false,
                on_failed: true,
            }),
        );

        let result = engine.reconcile_chains(&[chain("cosmos")], &address()).await;

        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].failure.is_mismatch());
    }

    fn engine_with_clean_sources() -> ReconciliationEngine {
        engine(
            StaticSource::new("aggregator"),
            StaticNodes::default(),
            Arc::new(RecordingReporter::default()),
        )
    }
}
