//! One test case from setup to teardown.
//!
//! `Created → SettingUp → Running → (RetryScheduled → Running)* → TearingDown
//! → Completed`. Only the body is retried; setup and teardown each run once.

use std::{
    any::Any,
    future::Future,
    panic::AssertUnwindSafe,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use futures::FutureExt;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    diagnostics::{
        DiagnosticsContext,
        bundle::{FailureBundle, write_bundle},
    },
    error::{Failure, Outcome},
    harness::Harness,
    report::TestResult,
    scope::ExecutionScope,
    suite::{PlayTest, TestCaseDescriptor},
    tester::Tester,
    ui::hierarchy,
};

/// Lifecycle states of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    /// Instance built, nothing run yet.
    Created,
    /// Running setup.
    SettingUp,
    /// Running the body.
    Running,
    /// The body failed and will run again.
    RetryScheduled,
    /// Running teardown.
    TearingDown,
    /// Done.
    Completed(CaseStatus),
}

/// Terminal status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Body and log check passed.
    Passed,
    /// A check failed or the test returned an error.
    Failed,
    /// The case deadline or a bounded wait elapsed.
    TimedOut,
    /// The suite was aborted while the case ran.
    Cancelled,
}

impl CaseStatus {
    /// Short label for progress lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Passed => "OK",
            Self::Failed => "FAILED",
            Self::TimedOut => "TIMED OUT",
            Self::Cancelled => "CANCELLED",
        }
    }
}

/// Everything the runner learned about one case.
#[derive(Debug, Clone)]
pub struct CaseRun {
    /// The single result recorded for the case.
    pub result: TestResult,
    /// Terminal status.
    pub status: CaseStatus,
    /// Body attempts made; zero when setup failed.
    pub attempts: u32,
    /// States visited, in order.
    pub states: Vec<CaseState>,
    /// Failure bundle written for the case.
    pub bundle: Option<PathBuf>,
}

/// Runs cases against a harness.
pub struct CaseRunner {
    /// Runtime state.
    harness: Arc<Harness>,
    /// Per-case deadline.
    timeout: Duration,
    /// Extra body attempts after a retryable failure.
    max_retries: u32,
}

/// Human readable text of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run one phase of a test, racing it against `token` and catching panics.
async fn phase<F>(token: &CancellationToken, fut: F) -> Outcome<()>
where
    F: Future<Output = Outcome<()>>,
{
    let fut = AssertUnwindSafe(fut).catch_unwind();
    tokio::select! {
        biased;
        () = token.cancelled() => Err(Failure::Cancelled),
        res = fut => match res {
            Ok(outcome) => outcome,
            Err(payload) => Err(Failure::other(format!("test panicked: {}", panic_message(payload.as_ref())))),
        },
    }
}

impl CaseRunner {
    /// Runner using the harness configuration for deadline and retries.
    pub fn new(harness: Arc<Harness>) -> Self {
        let timeout = harness.config().case_timeout();
        let max_retries = harness.config().max_retries;
        Self {
            harness,
            timeout,
            max_retries,
        }
    }

    /// Override the per-case deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the retry bound.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Per-case deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `case` inside a child of `parent`.
    pub async fn run(&self, case: &TestCaseDescriptor, parent: &ExecutionScope) -> CaseRun {
        let name = case.display_name();
        let started = Instant::now();
        let harness = &self.harness;
        let mut states = vec![CaseState::Created];

        let scope = parent.child(self.timeout);
        let _context = harness.enter_scope(scope.token().clone());
        let tester = Tester::current(harness.clone());

        harness.resume();
        harness.diagnostics().begin_test(&name, harness.environment());
        harness.logs().start();
        info!(case = %name, timeout_secs = self.timeout.as_secs_f64(), "case_started");

        let mut test = case.instantiate();
        let (mut outcome, attempts) = self.execute(&name, test.as_mut(), &tester, &mut states).await;
        if outcome.is_ok()
            && let Some(message) = harness.logs().take_failure()
        {
            outcome = Err(harness.asserter().fail(&message));
        }

        // Teardown is detached from the suite scope: an aborted or timed-out
        // case still cleans up, bounded by its own deadline.
        states.push(CaseState::TearingDown);
        {
            let detached = ExecutionScope::root();
            let cleanup = detached.child(self.timeout);
            let _cleanup_context = harness.enter_scope(cleanup.token().clone());
            let cleanup_tester = Tester::current(harness.clone());
            if let Err(f) = phase(cleanup.token(), test.tear_down(&cleanup_tester)).await {
                warn!(case = %name, error = %f, "case_teardown_failed");
            }
        }

        let (status, outcome) = self.classify(&name, &scope, outcome);
        states.push(CaseState::Completed(status));

        let context = harness.diagnostics().end_test();
        harness.keyboard().release_all();
        harness.logs().stop();
        let duration = started.elapsed().as_secs_f64();

        let (result, bundle) = match outcome {
            Ok(()) => (TestResult::passed(&name, duration), None),
            Err(failure) => self.failed(&name, duration, &failure, context.as_ref()),
        };
        debug!(case = %name, status = status.label(), attempts, duration, "case_finished");
        CaseRun {
            result,
            status,
            attempts,
            states,
            bundle,
        }
    }

    /// Setup once, then the body until it passes, fails terminally or runs
    /// out of retries. Returns the outcome and the number of body attempts.
    async fn execute(
        &self,
        name: &str,
        test: &mut dyn PlayTest,
        tester: &Tester,
        states: &mut Vec<CaseState>,
    ) -> (Outcome<()>, u32) {
        let token = tester.token();
        states.push(CaseState::SettingUp);
        if let Err(f) = phase(token, test.set_up(tester)).await {
            warn!(case = name, error = %f, "case_setup_failed");
            return (Err(f), 0);
        }
        let mut attempts = 0;
        loop {
            attempts += 1;
            states.push(CaseState::Running);
            match phase(token, test.run(tester)).await {
                Ok(()) => return (Ok(()), attempts),
                Err(f) if f.is_retryable() && attempts <= self.max_retries => {
                    info!(case = name, attempt = attempts, error = %f, "case_retry");
                    states.push(CaseState::RetryScheduled);
                    self.harness.resume();
                }
                Err(f) => return (Err(f), attempts),
            }
        }
    }

    /// Map the final outcome to a status. A cancellation caused by the case
    /// deadline becomes a timeout.
    fn classify(&self, name: &str, scope: &ExecutionScope, outcome: Outcome<()>) -> (CaseStatus, Outcome<()>) {
        match outcome {
            Ok(()) => (CaseStatus::Passed, Ok(())),
            Err(Failure::Cancelled) if scope.is_expired() => (
                CaseStatus::TimedOut,
                Err(Failure::Timeout {
                    what: format!("case '{name}'"),
                    seconds: self.timeout.as_secs_f64(),
                }),
            ),
            Err(Failure::Cancelled) => (CaseStatus::Cancelled, Err(Failure::Cancelled)),
            Err(f @ Failure::Timeout { .. }) => (CaseStatus::TimedOut, Err(f)),
            Err(f) => (CaseStatus::Failed, Err(f)),
        }
    }

    /// Build the failed result: hierarchy dump appended to the message, plus a
    /// failure bundle when enabled.
    fn failed(
        &self,
        name: &str,
        duration: f64,
        failure: &Failure,
        context: Option<&DiagnosticsContext>,
    ) -> (TestResult, Option<PathBuf>) {
        let config = self.harness.config();
        let dump = hierarchy::dump(self.harness.substrate().ui.as_ref());
        let screenshot = failure.screenshot().map(Path::to_path_buf);
        let mut bundle = None;
        if config.failure_bundles {
            let report = config.report_path();
            let written = write_bundle(
                &config.reports_dir.join("failure-bundles"),
                &FailureBundle {
                    test_name: name,
                    context,
                    screenshot: screenshot.as_deref(),
                    hierarchy: Some(&dump),
                    report: Some(&report),
                    logs: &config.log_files,
                },
            );
            match written {
                Ok(dir) => bundle = Some(dir),
                Err(e) => warn!(case = name, error = %e, "failure_bundle_failed"),
            }
        }
        let message = format!("{failure}\n\n[Hierarchy Dump]\n{dump}");
        (TestResult::failed(name, duration, message, screenshot), bundle)
    }
}

#[cfg(all(test, feature = "mimic"))]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use logging::fmt::RenderedLog;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        config::HarnessConfig,
        mimic::MimicApp,
        suite::{TestDefinition, definition::expand},
        ui::Substrate,
    };

    const FRAME: Duration = Duration::from_millis(10);

    struct Flaky {
        fail_first: u32,
        runs: Arc<AtomicU32>,
        teardowns: Arc<AtomicU32>,
    }

    #[async_trait]
    impl PlayTest for Flaky {
        async fn run(&mut self, t: &Tester) -> Outcome<()> {
            let n = self.runs.fetch_add(1, Ordering::SeqCst);
            t.check().is_true(n >= self.fail_first, Some("not yet"))
        }

        async fn tear_down(&mut self, _t: &Tester) -> Outcome<()> {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Sleeper;

    #[async_trait]
    impl PlayTest for Sleeper {
        async fn run(&mut self, t: &Tester) -> Outcome<()> {
            t.wait().seconds(1_000.0).await
        }
    }

    struct Noisy;

    #[async_trait]
    impl PlayTest for Noisy {
        async fn run(&mut self, t: &Tester) -> Outcome<()> {
            t.logs().sink().push(RenderedLog {
                level: "ERROR".into(),
                target: "game".into(),
                message: "texture missing".into(),
            });
            Ok(())
        }
    }

    fn harness(dir: &TempDir, max_retries: u32) -> Arc<Harness> {
        let app = Arc::new(MimicApp::new());
        let config = HarnessConfig {
            reports_dir: dir.path().to_path_buf(),
            max_retries,
            ..HarnessConfig::default()
        };
        Harness::builder(Substrate::from_app(app))
            .with_config(config)
            .build()
            .unwrap()
    }

    fn flaky(fail_first: u32) -> (TestCaseDescriptor, Arc<AtomicU32>, Arc<AtomicU32>) {
        let runs = Arc::new(AtomicU32::new(0));
        let teardowns = Arc::new(AtomicU32::new(0));
        let (r, d) = (runs.clone(), teardowns.clone());
        let def = Arc::new(TestDefinition::new("flaky", move || {
            Box::new(Flaky {
                fail_first,
                runs: r.clone(),
                teardowns: d.clone(),
            })
        }));
        (expand(&def).remove(0), runs, teardowns)
    }

    #[tokio::test(start_paused = true)]
    async fn retries_only_the_body_within_the_bound() {
        let dir = TempDir::new().unwrap();
        let h = harness(&dir, 2);
        let stop = CancellationToken::new();
        h.host().spawn_driver(FRAME, stop.clone());

        let (case, runs, teardowns) = flaky(10);
        let run = CaseRunner::new(h.clone()).run(&case, &ExecutionScope::root()).await;
        assert_eq!(run.status, CaseStatus::Failed);
        assert_eq!(run.attempts, 3);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
        assert!(!run.result.passed);
        let msg = run.result.error_message.unwrap();
        assert!(msg.starts_with("not yet"));
        assert!(msg.contains("[Hierarchy Dump]"));
        assert_eq!(
            run.states.iter().filter(|s| **s == CaseState::RetryScheduled).count(),
            2
        );
        stop.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn flaky_body_passes_on_retry() {
        let dir = TempDir::new().unwrap();
        let h = harness(&dir, 1);
        let stop = CancellationToken::new();
        h.host().spawn_driver(FRAME, stop.clone());

        let (case, _, teardowns) = flaky(1);
        let run = CaseRunner::new(h.clone()).run(&case, &ExecutionScope::root()).await;
        assert_eq!(run.status, CaseStatus::Passed);
        assert_eq!(run.attempts, 2);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
        assert_eq!(h.host().time_scale(), 1.0);
        assert!(h.diagnostics().current().is_none());
        stop.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_terminal_and_not_retried() {
        let dir = TempDir::new().unwrap();
        let h = harness(&dir, 3);
        let stop = CancellationToken::new();
        h.host().spawn_driver(FRAME, stop.clone());

        let case = expand(&Arc::new(TestDefinition::new("sleeper", || Box::new(Sleeper)))).remove(0);
        let suite = ExecutionScope::root();
        let before = h.current_token();
        let run = CaseRunner::new(h.clone())
            .with_timeout(Duration::from_secs(2))
            .run(&case, &suite)
            .await;
        assert_eq!(run.status, CaseStatus::TimedOut);
        assert_eq!(run.attempts, 1);
        assert!(run.result.error_message.unwrap().contains("timed out after 2.00s"));
        assert!(!suite.is_cancelled());
        assert!(!before.is_cancelled());
        assert!(!h.current_token().is_cancelled());
        stop.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn suite_cancel_maps_to_cancelled() {
        let dir = TempDir::new().unwrap();
        let h = harness(&dir, 3);
        let stop = CancellationToken::new();
        h.host().spawn_driver(FRAME, stop.clone());

        let case = expand(&Arc::new(TestDefinition::new("sleeper", || Box::new(Sleeper)))).remove(0);
        let suite = ExecutionScope::root();
        let abort = suite.token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            abort.cancel();
        });
        let run = CaseRunner::new(h.clone()).run(&case, &suite).await;
        assert_eq!(run.status, CaseStatus::Cancelled);
        assert_eq!(run.attempts, 1);
        stop.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_error_logs_fail_a_passing_body() {
        let dir = TempDir::new().unwrap();
        let h = harness(&dir, 0);
        let stop = CancellationToken::new();
        h.host().spawn_driver(FRAME, stop.clone());

        let case = expand(&Arc::new(TestDefinition::new("noisy", || Box::new(Noisy)))).remove(0);
        let run = CaseRunner::new(h.clone()).run(&case, &ExecutionScope::root()).await;
        assert_eq!(run.status, CaseStatus::Failed);
        let msg = run.result.error_message.unwrap();
        assert!(msg.contains("Found 1 unexpected error(s)"));
        assert!(msg.contains("texture missing"));
        stop.cancel();
    }
}
