//! stagehand: run UI test suites headlessly against the demo application.

mod cases;
mod cli;
mod logs;

use std::{process, sync::Arc, time::Duration};

use clap::Parser;
use logging::capture::ErrorSink;
use stagehand::{
    Harness, Result, Suite,
    config::{DEFAULTS, HarnessConfig},
    error::print_hints,
    input::{EventQueueKeyboard, InputDevices, PollingKeyboard},
    mimic::{MimicKeyboard, MimicTextAdapter},
    monitor::{HealthCheck, HealthMonitor, MissingAssetCheck},
    suite::{CaseProgress, Delivery, Discovery, ReportHooks, SuiteOutcome, TagFilter},
    trigger::{self, LaunchRequest},
    ui::Substrate,
};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::Cli;

/// Load the config named on the command line and apply overrides.
fn load_config(cli: &Cli) -> Result<HarnessConfig> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    if let Some(dir) = &cli.reports {
        config.reports_dir = dir.clone();
    }
    Ok(config)
}

/// Print one line per finished case.
fn progress_hooks(quiet: bool) -> ReportHooks {
    ReportHooks::new().on_progress(move |p: &CaseProgress| {
        if !quiet {
            println!(
                "[{}/{}] {}: {} ({:.3}s, attempts={})",
                p.index + 1,
                p.total,
                p.name,
                p.status.label(),
                p.duration_secs,
                p.attempts
            );
        }
        Ok(())
    })
}

/// The assembled demo.
struct Demo {
    /// Suite over the demo registry.
    suite: Arc<Suite>,
    /// Keyboard standing in for the physical device.
    keyboard: Arc<MimicKeyboard>,
}

/// Assemble the demo app, the harness and the suite.
fn build(cli: &Cli, sink: ErrorSink) -> Result<Demo> {
    let config = load_config(cli)?;
    let app = cases::build_app();
    let keyboard = Arc::new(MimicKeyboard::new());
    let polling: Arc<dyn PollingKeyboard> = keyboard.clone();
    let event_queue: Arc<dyn EventQueueKeyboard> = keyboard.clone();
    let harness = Harness::builder(Substrate::from_app(app.clone()))
        .with_config(config)
        .with_devices(InputDevices {
            polling: Some(polling),
            event_queue: Some(event_queue),
        })
        .with_text_adapter(Arc::new(MimicTextAdapter::new(app.clone())))
        .with_error_sink(sink)
        .build()?;
    keyboard.attach(harness.host());
    let discovery = Discovery::new(harness.config().authoring).with_resources(cases::registry(&app));
    let suite = Suite::new(harness, discovery).with_hooks(progress_hooks(cli.quiet));
    Ok(Demo {
        suite: Arc::new(suite),
        keyboard,
    })
}

/// Pick the run the command line asks for.
async fn run(cli: &Cli, suite: &Suite, request: &LaunchRequest) -> Result<SuiteOutcome> {
    if let Some(name) = &cli.name {
        return suite.run_by_name(name).await;
    }
    if let Some(result) = trigger::run_requested(suite, request).await {
        return result;
    }
    let filter = cli.tags.as_deref().and_then(TagFilter::parse);
    suite.run(filter.as_ref()).await
}

/// Rerun the suite whenever the run hotkey goes down, until stdin closes.
async fn watch(demo: &Demo, stop: &CancellationToken) -> Result<()> {
    let key = demo.suite.harness().config().hotkey_key()?;
    let cancel = stop.child_token();
    let watcher = trigger::watch_hotkey(demo.suite.clone(), key, cancel.clone());
    println!("watching: press Enter to send {} to the app, Ctrl-D to quit", key.name());
    let mut lines = BufReader::new(io::stdin()).lines();
    while let Ok(Some(_)) = lines.next_line().await {
        demo.keyboard.press_physical(key);
    }
    cancel.cancel();
    watcher.await.ok();
    Ok(())
}

/// Print the summary line and where the report went.
fn summarize(outcome: &SuiteOutcome) {
    let report = &outcome.report;
    println!(
        "stagehand: {} (total={}, passed={}, failed={}, skipped={}, duration={:.3}s)",
        if report.failed == 0 { "OK" } else { "FAILED" },
        report.total_tests,
        report.passed,
        report.failed,
        outcome.skipped,
        report.duration
    );
    match &outcome.delivery {
        Delivery::Written(path) => println!("report: {}", path.display()),
        Delivery::Handler => println!("report: delivered to handler"),
        Delivery::Failed => eprintln!("report: delivery failed"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let sink = ErrorSink::new();
    logs::init(&cli.log, &sink);

    let demo = match build(&cli, sink) {
        Ok(demo) => demo,
        Err(e) => {
            eprintln!("stagehand: ERROR: {}", e);
            print_hints(&e);
            process::exit(1);
        }
    };
    let suite = demo.suite.clone();

    if cli.list {
        for case in suite.cases(None) {
            println!("{}\t{}", case.display_name(), case.definition.tags.join(","));
        }
        return;
    }

    let harness = suite.harness().clone();
    let request = trigger::parse_launch_args(&cli.host_args);
    let quit_on_finish = request.quit_on_finish || harness.config().quit_on_finish;
    let stop = CancellationToken::new();
    let driver = harness
        .host()
        .spawn_driver(harness.config().frame_interval(), stop.clone());
    let monitor = cli.health.then(|| {
        let checks: Vec<Arc<dyn HealthCheck>> = vec![Arc::new(MissingAssetCheck)];
        HealthMonitor::spawn(
            harness.clone(),
            checks,
            Duration::from_secs_f64(DEFAULTS.health_interval_secs),
        )
    });

    let result = run(&cli, &suite, &request).await;
    if let Ok(outcome) = &result {
        summarize(outcome);
    }
    let watched = if cli.watch && !quit_on_finish {
        watch(&demo, &stop).await
    } else {
        Ok(())
    };

    if let Some(monitor) = monitor {
        info!(alerts = monitor.alerts(), "health_monitor_stopped");
        monitor.stop().await;
    }
    stop.cancel();
    driver.await.ok();

    match result.and_then(|outcome| watched.map(|()| outcome)) {
        Ok(outcome) => {
            let code = outcome.exit_code();
            if code != 0 {
                process::exit(code);
            }
        }
        Err(e) => {
            eprintln!("stagehand: ERROR: {}", e);
            print_hints(&e);
            process::exit(1);
        }
    }
}
