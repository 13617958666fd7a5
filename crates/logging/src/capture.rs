//! Collect error-level tracing events emitted while a test runs.
//!
//! The harness installs [`layer`] in its subscriber and hands the matching
//! [`ErrorSink`] to its log assertion. The sink only records while listening,
//! so events logged between tests are dropped.
//!
//! Usage:
//! - Create an [`ErrorSink`] and install `layer(sink.clone())`.
//! - Call [`ErrorSink::start`] when a test begins and [`ErrorSink::drain`] when
//!   it ends.

use std::{mem, sync::Arc};

use parking_lot::Mutex;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::fmt::{self, RenderedLog};

/// Recording state shared between the layer and its readers.
#[derive(Debug, Default)]
struct SinkState {
    /// Whether events are currently being recorded.
    listening: bool,
    /// Events recorded since the last `start`.
    lines: Vec<RenderedLog>,
}

/// Shared buffer of captured error events.
#[derive(Debug, Clone, Default)]
pub struct ErrorSink {
    /// Guarded recording state.
    state: Arc<Mutex<SinkState>>,
}

impl ErrorSink {
    /// Create an idle sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear previous lines and begin recording.
    pub fn start(&self) {
        let mut state = self.state.lock();
        state.lines.clear();
        state.listening = true;
    }

    /// Stop recording; lines recorded so far are kept.
    pub fn stop(&self) {
        self.state.lock().listening = false;
    }

    /// Whether the sink is recording.
    pub fn is_listening(&self) -> bool {
        self.state.lock().listening
    }

    /// Record a line if listening.
    pub fn push(&self, line: RenderedLog) {
        let mut state = self.state.lock();
        if state.listening {
            state.lines.push(line);
        }
    }

    /// Copy of the recorded lines.
    pub fn snapshot(&self) -> Vec<RenderedLog> {
        self.state.lock().lines.clone()
    }

    /// Take the recorded lines, leaving the buffer empty.
    pub fn drain(&self) -> Vec<RenderedLog> {
        mem::take(&mut self.state.lock().lines)
    }
}

/// Tracing layer that copies ERROR events into an [`ErrorSink`].
pub struct CaptureLayer {
    /// Destination for captured events.
    sink: ErrorSink,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR || !self.sink.is_listening() {
            return;
        }
        self.sink.push(fmt::render_event(event));
    }
}

/// Create the capture layer feeding `sink`.
pub fn layer(sink: ErrorSink) -> CaptureLayer {
    CaptureLayer { sink }
}

#[cfg(test)]
mod tests {
    use tracing::{error, info, subscriber::with_default, warn};
    use tracing_subscriber::prelude::*;

    use super::*;

    #[test]
    fn records_only_errors_while_listening() {
        let sink = ErrorSink::new();
        let subscriber = tracing_subscriber::registry().with(layer(sink.clone()));
        with_default(subscriber, || {
            error!("before start");
            sink.start();
            info!("not an error");
            warn!("still not an error");
            error!(code = 7, "boom");
            sink.stop();
            error!("after stop");
        });
        let lines = sink.drain();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].level, "ERROR");
        assert_eq!(lines[0].message, "boom code=7");
        assert!(sink.snapshot().is_empty());
    }

    #[test]
    fn start_clears_previous_lines() {
        let sink = ErrorSink::new();
        sink.start();
        sink.push(RenderedLog {
            level: "ERROR".into(),
            target: "t".into(),
            message: "old".into(),
        });
        sink.start();
        assert!(sink.snapshot().is_empty());
    }
}
