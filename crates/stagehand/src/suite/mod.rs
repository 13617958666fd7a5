//! Discover, filter and run test cases one after another, then report.

pub mod definition;
pub mod discovery;
pub mod hooks;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

pub use definition::{DataSet, ParamKind, ParamSlot, ParamValue, PlayTest, TestCaseDescriptor, TestDefinition};
pub use discovery::{Discovery, Registry, TagFilter, TestSource};
pub use hooks::{CaseProgress, Delivery, HookResult, ReportHandler, ReportHooks};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    error::{Error, Result},
    harness::Harness,
    report::TestReport,
    runner::CaseRunner,
    scope::ExecutionScope,
};

/// Result of one suite run.
#[derive(Debug, Clone)]
pub struct SuiteOutcome {
    /// Aggregated report.
    pub report: TestReport,
    /// Where the report went.
    pub delivery: Delivery,
    /// Cases skipped because the run was aborted.
    pub skipped: usize,
}

impl SuiteOutcome {
    /// Process exit code: the number of failed cases.
    pub fn exit_code(&self) -> i32 {
        i32::try_from(self.report.failed).unwrap_or(i32::MAX)
    }
}

/// Clears the running flag on drop.
struct RunGuard<'a> {
    /// Flag to clear.
    running: &'a AtomicBool,
    /// Abort handle to clear.
    abort: &'a Mutex<Option<CancellationToken>>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.abort.lock() = None;
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Sequential suite orchestrator.
pub struct Suite {
    /// Runtime state.
    harness: Arc<Harness>,
    /// Definition sources.
    discovery: Discovery,
    /// Reporting chain.
    hooks: ReportHooks,
    /// Set while a run is in progress.
    running: AtomicBool,
    /// Root token of the run in progress.
    abort: Mutex<Option<CancellationToken>>,
}

impl Suite {
    /// Orchestrate the definitions found by `discovery`.
    pub fn new(harness: Arc<Harness>, discovery: Discovery) -> Self {
        Self {
            harness,
            discovery,
            hooks: ReportHooks::new(),
            running: AtomicBool::new(false),
            abort: Mutex::new(None),
        }
    }

    /// Use `hooks` for reporting.
    #[must_use]
    pub fn with_hooks(mut self, hooks: ReportHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Runtime state.
    pub fn harness(&self) -> &Arc<Harness> {
        &self.harness
    }

    /// Cases a run with `filter` would execute, in order.
    pub fn cases(&self, filter: Option<&TagFilter>) -> Vec<TestCaseDescriptor> {
        discovery::expand_cases(&self.discovery.discover(), filter)
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Cancel the run in progress. The current case ends as cancelled and
    /// the remaining ones are skipped.
    pub fn abort(&self) {
        if let Some(token) = self.abort.lock().as_ref() {
            info!("suite_abort_requested");
            token.cancel();
        }
    }

    /// Run every case accepted by `filter`.
    pub async fn run(&self, filter: Option<&TagFilter>) -> Result<SuiteOutcome> {
        self.run_cases(self.cases(filter)).await
    }

    /// Run the cases carrying `tag`.
    pub async fn run_with_tag(&self, tag: &str) -> Result<SuiteOutcome> {
        let filter = TagFilter::parse(tag);
        self.run(filter.as_ref()).await
    }

    /// Run every case of the definition called `name`, ignoring ASCII case.
    pub async fn run_by_name(&self, name: &str) -> Result<SuiteOutcome> {
        let cases: Vec<_> = self
            .cases(None)
            .into_iter()
            .filter(|c| c.definition.name.eq_ignore_ascii_case(name))
            .collect();
        if cases.is_empty() {
            warn!(name, "suite_test_not_found");
            return Err(Error::InvalidState(format!("no test named '{name}'")));
        }
        self.run_cases(cases).await
    }

    /// Run `cases` strictly in order and dispatch the report.
    pub async fn run_cases(&self, cases: Vec<TestCaseDescriptor>) -> Result<SuiteOutcome> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("suite_busy");
            return Err(Error::Busy);
        }
        let scope = ExecutionScope::root();
        *self.abort.lock() = Some(scope.token().clone());
        let _guard = RunGuard {
            running: &self.running,
            abort: &self.abort,
        };
        // Each case's context guard falls back to the suite token.
        let _context = self.harness.enter_scope(scope.token().clone());

        let total = cases.len();
        let runner = CaseRunner::new(self.harness.clone());
        info!(cases = total, "suite_started");

        let mut results = Vec::with_capacity(total);
        let mut skipped = 0;
        for (index, case) in cases.iter().enumerate() {
            if scope.is_cancelled() {
                skipped = total - index;
                info!(skipped, "suite_aborted");
                break;
            }
            let run = runner.run(case, &scope).await;
            self.hooks.emit_progress(&CaseProgress {
                name: run.result.name.clone(),
                status: run.status,
                attempts: run.attempts,
                duration_secs: run.result.duration_seconds,
                index,
                total,
            });
            results.push(run.result);
        }

        let duration = results.iter().map(|r| r.duration_seconds).sum();
        let report = TestReport::from_results(results, duration);
        info!(
            total = report.total_tests,
            passed = report.passed,
            failed = report.failed,
            duration = report.duration,
            "suite_finished"
        );
        let delivery = self.hooks.dispatch(&report, &self.harness.config().report_path());
        Ok(SuiteOutcome {
            report,
            delivery,
            skipped,
        })
    }
}

#[cfg(all(test, feature = "mimic"))]
mod tests {
    use std::{sync::atomic::AtomicUsize, time::Duration};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        config::HarnessConfig, error::Outcome, mimic::MimicApp, runner::CaseStatus, tester::Tester, ui::Substrate,
    };

    #[derive(Default)]
    struct Slow;

    #[async_trait]
    impl PlayTest for Slow {
        async fn run(&mut self, t: &Tester) -> Outcome<()> {
            t.wait().seconds(5.0).await
        }
    }

    type Statuses = Arc<Mutex<Vec<CaseStatus>>>;

    fn suite(dir: &TempDir) -> (Arc<Suite>, Statuses) {
        let app = Arc::new(MimicApp::new());
        let harness = Harness::builder(Substrate::from_app(app))
            .with_config(HarnessConfig {
                reports_dir: dir.path().to_path_buf(),
                ..HarnessConfig::default()
            })
            .build()
            .unwrap();
        let registry = Arc::new(Registry::new("unit"));
        for name in ["first", "second", "third"] {
            registry.register(TestDefinition::of::<Slow>(name));
        }
        let progress = Arc::new(Mutex::new(Vec::new()));
        let seen = progress.clone();
        let hooks = ReportHooks::new().on_progress(move |p: &CaseProgress| {
            seen.lock().push(p.status);
            Ok(())
        });
        let suite = Suite::new(harness, Discovery::new(false).with_resources(registry)).with_hooks(hooks);
        (Arc::new(suite), progress)
    }

    #[tokio::test(start_paused = true)]
    async fn abort_skips_remaining_cases_and_rejects_reentry() {
        let dir = TempDir::new().unwrap();
        let (suite, progress) = suite(&dir);
        let stop = CancellationToken::new();
        suite.harness().host().spawn_driver(Duration::from_millis(10), stop.clone());

        let handle = tokio::spawn({
            let suite = suite.clone();
            async move { suite.run(None).await }
        });
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert!(suite.is_running());
        assert!(matches!(suite.run(None).await, Err(Error::Busy)));
        suite.abort();

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.report.total_tests, 2);
        assert_eq!(outcome.report.passed, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.exit_code(), 1);
        assert!(!outcome.report.results[1].passed);
        assert_eq!(*progress.lock(), vec![CaseStatus::Passed, CaseStatus::Cancelled]);
        assert!(!suite.is_running());
        assert!(dir.path().join("test-results.json").exists());
        stop.cancel();
    }

    /// Waits long enough to be aborted and counts its teardowns.
    struct Counted {
        /// Teardowns run so far.
        teardowns: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PlayTest for Counted {
        async fn run(&mut self, t: &Tester) -> Outcome<()> {
            t.wait().seconds(5.0).await
        }

        async fn tear_down(&mut self, t: &Tester) -> Outcome<()> {
            t.wait().frames(2).await?;
            self.teardowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counted_suite(dir: &TempDir, hooks: ReportHooks) -> (Arc<Suite>, Arc<AtomicUsize>) {
        let harness = Harness::builder(Substrate::from_app(Arc::new(MimicApp::new())))
            .with_config(HarnessConfig {
                reports_dir: dir.path().to_path_buf(),
                ..HarnessConfig::default()
            })
            .build()
            .unwrap();
        let teardowns = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(Registry::new("unit"));
        for name in ["first", "second"] {
            let teardowns = teardowns.clone();
            registry.register(TestDefinition::new(name, move || {
                Box::new(Counted {
                    teardowns: teardowns.clone(),
                })
            }));
        }
        let suite = Suite::new(harness, Discovery::new(false).with_resources(registry)).with_hooks(hooks);
        (Arc::new(suite), teardowns)
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_case_still_tears_down() {
        let dir = TempDir::new().unwrap();
        let (suite, teardowns) = counted_suite(&dir, ReportHooks::new());
        let stop = CancellationToken::new();
        suite.harness().host().spawn_driver(Duration::from_millis(10), stop.clone());

        let handle = tokio::spawn({
            let suite = suite.clone();
            async move { suite.run(None).await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        suite.abort();

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.report.total_tests, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
        stop.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn shared_token_falls_back_to_the_suite_scope() {
        let dir = TempDir::new().unwrap();
        let between: Arc<Mutex<Vec<CancellationToken>>> = Arc::new(Mutex::new(Vec::new()));
        let slot: Arc<Mutex<Option<Arc<Harness>>>> = Arc::new(Mutex::new(None));
        let hooks = ReportHooks::new().on_progress({
            let between = between.clone();
            let slot = slot.clone();
            move |_: &CaseProgress| {
                if let Some(h) = slot.lock().as_ref() {
                    between.lock().push(h.current_token());
                }
                Ok(())
            }
        });
        let (suite, _) = counted_suite(&dir, hooks);
        *slot.lock() = Some(suite.harness().clone());
        let idle = suite.harness().current_token();
        let stop = CancellationToken::new();
        suite.harness().host().spawn_driver(Duration::from_millis(10), stop.clone());

        let handle = tokio::spawn({
            let suite = suite.clone();
            async move { suite.run(None).await }
        });
        // First case runs its full five seconds, the second gets aborted.
        tokio::time::sleep(Duration::from_secs(6)).await;
        {
            let seen = between.lock();
            assert_eq!(seen.len(), 1);
            assert!(!seen[0].is_cancelled());
        }
        suite.abort();
        handle.await.unwrap().unwrap();

        let seen = between.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(CancellationToken::is_cancelled));
        assert!(!idle.is_cancelled());
        assert!(!suite.harness().current_token().is_cancelled());
        slot.lock().take();
        stop.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn run_by_name_ignores_case() {
        let dir = TempDir::new().unwrap();
        let (suite, progress) = suite(&dir);
        let stop = CancellationToken::new();
        suite.harness().host().spawn_driver(Duration::from_millis(10), stop.clone());

        let outcome = suite.run_by_name("SECOND").await.unwrap();
        assert_eq!(outcome.report.total_tests, 1);
        assert_eq!(outcome.report.results[0].name, "second");
        assert_eq!(*progress.lock(), vec![CaseStatus::Passed]);
        stop.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn run_by_name_reports_unknown_tests() {
        let dir = TempDir::new().unwrap();
        let (suite, _) = suite(&dir);
        assert!(matches!(
            suite.run_by_name("missing").await,
            Err(Error::InvalidState(_))
        ));
        let names: Vec<_> = suite.cases(None).iter().map(|c| c.display_name()).collect();
        assert_eq!(names, ["first", "second", "third"]);
    }
}
