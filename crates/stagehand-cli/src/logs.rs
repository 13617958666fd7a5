//! Tracing subscriber setup for the stagehand binary.

use std::sync::OnceLock;

use logging::{LogArgs, capture::ErrorSink};
use tracing_subscriber::{fmt, prelude::*};

/// Global flag to track if logging has been initialized
static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install the subscriber: the filter computed from `args`, compact output
/// without timestamps, and the error capture layer feeding `sink`.
///
/// The capture layer sees every event that passes the filter, so error-level
/// records from the application reach the log assertion whatever the console
/// level is.
pub fn init(args: &LogArgs, sink: &ErrorSink) {
    LOGGING_INITIALIZED.get_or_init(|| {
        let env_filter = logging::env_filter_from_spec(&args.spec());
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().without_time())
            .with(logging::capture::layer(sink.clone()))
            .try_init()
            .ok();
    });
}
