//! Background visual health scans.
//!
//! The monitor runs next to the test body on its own token. A failing check
//! goes through the regular assertion path (screenshot, overlay, frozen time)
//! and is then logged at error level, so the log assertion fails the case
//! that was running.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{error::Outcome, harness::Harness};

/// One periodic check.
pub trait HealthCheck: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;
    /// Inspect the application; failures must come from the harness asserter.
    fn run(&self, harness: &Harness) -> Outcome<()>;
}

/// Flags active elements whose texture, material or sprite did not resolve.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingAssetCheck;

impl HealthCheck for MissingAssetCheck {
    fn name(&self) -> &str {
        "missing_assets"
    }

    fn run(&self, harness: &Harness) -> Outcome<()> {
        harness.asserter().no_missing_assets(None)
    }
}

/// Handle of a running monitor. Dropping it stops the scans.
pub struct HealthMonitor {
    /// Stops the scan loop.
    stop: CancellationToken,
    /// Scan loop task.
    handle: Option<JoinHandle<()>>,
    /// Failed scans so far.
    alerts: Arc<AtomicUsize>,
}

impl HealthMonitor {
    /// Run `checks` every `interval` of real time.
    pub fn spawn(harness: Arc<Harness>, checks: Vec<Arc<dyn HealthCheck>>, interval: Duration) -> Self {
        let stop = CancellationToken::new();
        let alerts = Arc::new(AtomicUsize::new(0));
        let handle = {
            let waiter = harness.waiter(stop.clone());
            let alerts = alerts.clone();
            tokio::spawn(async move {
                while waiter.seconds_unscaled(interval.as_secs_f64()).await.is_ok() {
                    for check in &checks {
                        if let Err(f) = check.run(&harness) {
                            alerts.fetch_add(1, Ordering::SeqCst);
                            harness.diagnostics().record_event("visual_health", &f.to_string());
                            error!(check = check.name(), "Visual Health Alert: {f}");
                        }
                    }
                }
                debug!("health_monitor_stopped");
            })
        };
        Self {
            stop,
            handle: Some(handle),
            alerts,
        }
    }

    /// Failed scans so far.
    pub fn alerts(&self) -> usize {
        self.alerts.load(Ordering::SeqCst)
    }

    /// Stop scanning and wait for the loop to exit.
    pub async fn stop(mut self) {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            handle.await.ok();
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

#[cfg(all(test, feature = "mimic"))]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        config::HarnessConfig,
        geom::Rect,
        mimic::MimicApp,
        ui::{ElementKind, Substrate},
    };

    #[tokio::test(start_paused = true)]
    async fn missing_asset_raises_alerts_through_the_failure_path() {
        let dir = TempDir::new().unwrap();
        let app = Arc::new(MimicApp::new());
        let logo = app.add_root("Logo", ElementKind::Image, Rect::new(0.0, 0.0, 10.0, 10.0));
        let harness = Harness::builder(Substrate::from_app(app.clone()))
            .with_config(HarnessConfig {
                reports_dir: dir.path().to_path_buf(),
                ..HarnessConfig::default()
            })
            .build()
            .unwrap();
        let stop = CancellationToken::new();
        harness.host().spawn_driver(Duration::from_millis(10), stop.clone());

        let monitor = HealthMonitor::spawn(harness.clone(), vec![Arc::new(MissingAssetCheck)], Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(monitor.alerts(), 0);

        app.set_missing_asset(logo, true);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(monitor.alerts() >= 1);
        assert_eq!(harness.host().time_scale(), 0.0);
        assert!(app.overlay_text().unwrap().contains("Logo"));

        monitor.stop().await;
        stop.cancel();
    }
}
