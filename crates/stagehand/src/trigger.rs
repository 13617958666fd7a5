//! Ways a suite run gets started: host arguments and the interactive hotkey.

use std::sync::Arc;

use keysym::LegacyKey;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    suite::{Suite, SuiteOutcome, TagFilter},
};

/// Flag that requests a full run.
pub const RUN_FLAG: &str = "-runSuiteTests";
/// Prefix of the tag filter argument.
pub const TAGS_PREFIX: &str = "--tags=";
/// Flag that asks the host to exit after the run.
pub const QUIT_FLAG: &str = "-quitOnFinish";

/// What the host arguments asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Whether a run was requested.
    pub run: bool,
    /// Tag filter, when one was given.
    pub tags: Option<TagFilter>,
    /// Exit once the run is complete.
    pub quit_on_finish: bool,
}

/// Parse host arguments. Flags match case-insensitively; everything else is
/// ignored.
pub fn parse_launch_args<I, S>(args: I) -> LaunchRequest
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut req = LaunchRequest::default();
    for arg in args {
        let arg = arg.as_ref().trim();
        if arg.eq_ignore_ascii_case(RUN_FLAG) {
            req.run = true;
        } else if arg.eq_ignore_ascii_case(QUIT_FLAG) {
            req.quit_on_finish = true;
        } else if let Some(prefix) = arg.get(..TAGS_PREFIX.len())
            && prefix.eq_ignore_ascii_case(TAGS_PREFIX)
        {
            req.tags = TagFilter::parse(&arg[TAGS_PREFIX.len()..]);
        }
    }
    req
}

/// Run the suite when `req` asks for it.
pub async fn run_requested(suite: &Suite, req: &LaunchRequest) -> Option<Result<SuiteOutcome>> {
    if !req.run {
        return None;
    }
    info!(
        tags = ?req.tags.as_ref().map(|t| t.tags().collect::<Vec<_>>()),
        quit_on_finish = req.quit_on_finish,
        "launch_run_requested"
    );
    Some(suite.run(req.tags.as_ref()).await)
}

/// Start a full run whenever `key` goes down, until `cancel` fires.
///
/// Presses while a run is in progress are ignored.
pub fn watch_hotkey(suite: Arc<Suite>, key: LegacyKey, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let host = suite.harness().host().clone();
        while host.next_frame_or_cancel(&cancel).await.is_ok() {
            if !suite.harness().keyboard().pressed_this_frame(key) {
                continue;
            }
            if suite.is_running() {
                debug!(key = key.name(), "hotkey_ignored_busy");
                continue;
            }
            info!(key = key.name(), "hotkey_run");
            match suite.run(None).await {
                Ok(outcome) => info!(failed = outcome.report.failed, "hotkey_run_finished"),
                Err(e) => warn!(error = %e, "hotkey_run_failed"),
            }
        }
        debug!("hotkey_watcher_stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_case_insensitive() {
        let req = parse_launch_args(["game.exe", "-RUNSUITETESTS", "--TAGS=Smoke, ui", "-quitonfinish"]);
        assert!(req.run);
        assert!(req.quit_on_finish);
        let tags: Vec<_> = req.tags.as_ref().unwrap().tags().collect();
        assert_eq!(tags, ["smoke", "ui"]);
    }

    #[test]
    fn unrelated_arguments_request_nothing() {
        let req = parse_launch_args(["-batchmode", "--tags=", "-logFile"]);
        assert_eq!(req, LaunchRequest::default());
    }
}
