//! Tiered reporting.
//!
//! 1. A progress callback after every case.
//! 2. Completion events with the raw results and with the aggregated report.
//! 3. A custom [`ReportHandler`] that, when set, replaces the default JSON
//!    write.
//!
//! Every hook runs isolated: an error or panic is logged and the run carries
//! on with the remaining hooks.

use std::{
    error::Error as StdError,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, warn};

use crate::{
    report::{TestReport, TestResult},
    runner::CaseStatus,
};

/// What hooks return.
pub type HookResult = Result<(), Box<dyn StdError + Send + Sync>>;

/// Progress after one case.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseProgress {
    /// Case display name.
    pub name: String,
    /// Final status.
    pub status: CaseStatus,
    /// Body attempts made.
    pub attempts: u32,
    /// Case duration in seconds.
    pub duration_secs: f64,
    /// Zero-based position in the run.
    pub index: usize,
    /// Cases in the run.
    pub total: usize,
}

/// Replacement for the default report writer.
pub trait ReportHandler: Send + Sync {
    /// Consume the finished report.
    fn handle(&self, report: &TestReport, results: &[TestResult]) -> HookResult;
}

/// Progress callback.
type ProgressHook = Box<dyn Fn(&CaseProgress) -> HookResult + Send + Sync>;
/// Raw results subscriber.
type ResultsHook = Box<dyn Fn(&[TestResult]) -> HookResult + Send + Sync>;
/// Aggregated report subscriber.
type ReportHook = Box<dyn Fn(&TestReport) -> HookResult + Send + Sync>;

/// How the report was delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The custom handler took it.
    Handler,
    /// Written to this path.
    Written(PathBuf),
    /// Neither: the handler or the writer failed.
    Failed,
}

/// Registered reporting hooks.
#[derive(Default)]
pub struct ReportHooks {
    /// Tier 1.
    progress: Vec<ProgressHook>,
    /// Tier 2, raw results.
    results: Vec<ResultsHook>,
    /// Tier 2, aggregated report.
    report: Vec<ReportHook>,
    /// Tier 3.
    handler: Option<Arc<dyn ReportHandler>>,
}

/// Run `f`, logging errors and panics instead of propagating them.
pub fn guarded<F>(hook: &str, f: F) -> bool
where
    F: FnOnce() -> HookResult,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(hook, error = %e, "report_hook_failed");
            false
        }
        Err(_) => {
            warn!(hook, "report_hook_panicked");
            false
        }
    }
}

impl ReportHooks {
    /// No hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a progress callback.
    #[must_use]
    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(&CaseProgress) -> HookResult + Send + Sync + 'static,
    {
        self.progress.push(Box::new(f));
        self
    }

    /// Add a raw-results subscriber.
    #[must_use]
    pub fn on_results<F>(mut self, f: F) -> Self
    where
        F: Fn(&[TestResult]) -> HookResult + Send + Sync + 'static,
    {
        self.results.push(Box::new(f));
        self
    }

    /// Add an aggregated-report subscriber.
    #[must_use]
    pub fn on_report<F>(mut self, f: F) -> Self
    where
        F: Fn(&TestReport) -> HookResult + Send + Sync + 'static,
    {
        self.report.push(Box::new(f));
        self
    }

    /// Replace the default JSON write.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn ReportHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Whether a custom handler is set.
    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Tier 1.
    pub fn emit_progress(&self, progress: &CaseProgress) {
        for hook in &self.progress {
            guarded("progress", || hook(progress));
        }
    }

    /// Tiers 2 and 3, or the default writer to `path`.
    pub fn dispatch(&self, report: &TestReport, path: &Path) -> Delivery {
        for hook in &self.results {
            guarded("results", || hook(&report.results));
        }
        for hook in &self.report {
            guarded("report", || hook(report));
        }
        if let Some(handler) = &self.handler {
            debug!("report_custom_handler");
            return if guarded("handler", || handler.handle(report, &report.results)) {
                Delivery::Handler
            } else {
                Delivery::Failed
            };
        }
        if guarded("default_writer", || report.write(path).map_err(Into::into)) {
            Delivery::Written(path.to_path_buf())
        } else {
            Delivery::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::TempDir;

    use super::*;

    struct Counting(Arc<AtomicUsize>);

    impl ReportHandler for Counting {
        fn handle(&self, report: &TestReport, _results: &[TestResult]) -> HookResult {
            self.0.fetch_add(report.total_tests, Ordering::SeqCst);
            Ok(())
        }
    }

    fn report() -> TestReport {
        TestReport::from_results(vec![TestResult::passed("a", 0.1)], 0.1)
    }

    #[test]
    fn failing_subscribers_do_not_stop_the_rest() {
        let dir = TempDir::new().unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let (s1, s2) = (seen.clone(), seen.clone());
        let hooks = ReportHooks::new()
            .on_results(|_| Err("subscriber broke".into()))
            .on_results(move |r| {
                s1.fetch_add(r.len(), Ordering::SeqCst);
                Ok(())
            })
            .on_report(|_| panic!("subscriber panicked"))
            .on_report(move |r| {
                s2.fetch_add(r.total_tests * 10, Ordering::SeqCst);
                Ok(())
            });
        let path = dir.path().join("out").join("r.json");
        assert_eq!(hooks.dispatch(&report(), &path), Delivery::Written(path.clone()));
        assert!(path.exists());
        assert_eq!(seen.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn handler_replaces_the_default_write() {
        let dir = TempDir::new().unwrap();
        let handled = Arc::new(AtomicUsize::new(0));
        let hooks = ReportHooks::new().with_handler(Arc::new(Counting(handled.clone())));
        let path = dir.path().join("r.json");
        assert_eq!(hooks.dispatch(&report(), &path), Delivery::Handler);
        assert_eq!(handled.load(Ordering::SeqCst), 1);
        assert!(!path.exists());
    }
}
