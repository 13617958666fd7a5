//! Log-based assertion: unexpected error logs fail the test.

use std::fmt::Write;

use logging::{capture::ErrorSink, fmt::RenderedLog};
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use tracing::warn;

/// Collects error-level events for the running test.
///
/// Events matching a registered expected pattern are ignored. Whatever is left
/// at the end of the test becomes one aggregated failure message.
pub struct LogAssert {
    /// Error events fed by the capture layer.
    sink: ErrorSink,
    /// Case-insensitive patterns of errors the test expects.
    expected: Mutex<Vec<Regex>>,
}

impl LogAssert {
    /// Read events from `sink`.
    pub fn new(sink: ErrorSink) -> Self {
        Self {
            sink,
            expected: Mutex::new(Vec::new()),
        }
    }

    /// The underlying sink.
    pub fn sink(&self) -> &ErrorSink {
        &self.sink
    }

    /// Start listening with a clean slate.
    pub fn start(&self) {
        self.expected.lock().clear();
        self.sink.start();
    }

    /// Stop listening and forget everything.
    pub fn stop(&self) {
        self.sink.stop();
        self.sink.drain();
        self.expected.lock().clear();
    }

    /// Register an expected error pattern. Invalid patterns are logged and
    /// ignored.
    pub fn expect(&self, pattern: &str) -> bool {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => {
                self.expected.lock().push(re);
                true
            }
            Err(e) => {
                warn!(pattern, error = %e, "log_expect_invalid_pattern");
                false
            }
        }
    }

    /// Errors recorded so far that match no expected pattern.
    pub fn unexpected(&self) -> Vec<RenderedLog> {
        let expected = self.expected.lock();
        self.sink
            .snapshot()
            .into_iter()
            .filter(|line| !expected.iter().any(|re| re.is_match(&line.message)))
            .collect()
    }

    /// Drain the recorded errors and aggregate the unexpected ones.
    pub fn take_failure(&self) -> Option<String> {
        let unexpected = self.unexpected();
        self.sink.drain();
        if unexpected.is_empty() {
            return None;
        }
        let mut msg = format!("Found {} unexpected error(s):", unexpected.len());
        for line in &unexpected {
            let _ignored = write!(msg, "\n[{}] {}: {}", line.level, line.target, line.message);
        }
        Some(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(message: &str) -> RenderedLog {
        RenderedLog {
            level: "ERROR".into(),
            target: "game".into(),
            message: message.into(),
        }
    }

    #[test]
    fn expected_patterns_are_filtered() {
        let logs = LogAssert::new(ErrorSink::new());
        logs.start();
        assert!(logs.expect("network .*timeout"));
        logs.sink().push(line("Network request TIMEOUT"));
        logs.sink().push(line("null reference in Player"));
        let msg = logs.take_failure().unwrap();
        assert_eq!(
            msg,
            "Found 1 unexpected error(s):\n[ERROR] game: null reference in Player"
        );
        assert!(logs.take_failure().is_none());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let logs = LogAssert::new(ErrorSink::new());
        assert!(!logs.expect("(unclosed"));
    }

    #[test]
    fn nothing_is_recorded_while_stopped() {
        let logs = LogAssert::new(ErrorSink::new());
        logs.sink().push(line("before start"));
        logs.start();
        logs.stop();
        logs.sink().push(line("after stop"));
        assert!(logs.take_failure().is_none());
    }
}
