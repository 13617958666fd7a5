//! Per-case results and the aggregated JSON report.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// Outcome of one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Case display name.
    pub name: String,
    /// Whether the case passed.
    pub passed: bool,
    /// Wall-clock duration including setup and teardown.
    pub duration_seconds: f64,
    /// Failure detail, including the hierarchy dump.
    pub error_message: Option<String>,
    /// Screenshot captured by a failing check.
    pub screenshot_path: Option<PathBuf>,
}

impl TestResult {
    /// A passing result.
    pub fn passed(name: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            name: name.into(),
            passed: true,
            duration_seconds,
            error_message: None,
            screenshot_path: None,
        }
    }

    /// A failing result.
    pub fn failed(name: impl Into<String>, duration_seconds: f64, message: String, screenshot: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            duration_seconds,
            error_message: Some(message),
            screenshot_path: screenshot,
        }
    }
}

/// Aggregated suite report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    /// Number of results.
    pub total_tests: usize,
    /// Passing results.
    pub passed: usize,
    /// Failing results.
    pub failed: usize,
    /// Summed case duration in seconds.
    pub duration: f64,
    /// Every result in execution order.
    pub results: Vec<TestResult>,
}

impl TestReport {
    /// Aggregate `results`.
    pub fn from_results(results: Vec<TestResult>, duration: f64) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            total_tests: results.len(),
            passed,
            failed: results.len() - passed,
            duration,
            results,
        }
    }

    /// Pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write pretty JSON to `path`, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        serde_json::to_writer_pretty(&mut file, self)?;
        file.write_all(b"\n")?;
        info!(path = %path.display(), total = self.total_tests, failed = self.failed, "report_written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use tempfile::TempDir;

    use super::*;

    fn sample() -> TestReport {
        TestReport::from_results(
            vec![
                TestResult::passed("a", 0.5),
                TestResult::passed("b", 0.25),
                TestResult::failed("c", 1.0, "boom".into(), Some(PathBuf::from("shot.png"))),
            ],
            1.75,
        )
    }

    #[test]
    fn counts_and_field_names() {
        let v: Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(v["totalTests"], 3);
        assert_eq!(v["passed"], 2);
        assert_eq!(v["failed"], 1);
        assert_eq!(v["duration"], 1.75);
        assert_eq!(v["results"].as_array().unwrap().len(), 3);
        assert_eq!(v["results"][2]["errorMessage"], "boom");
        assert_eq!(v["results"][2]["screenshotPath"], "shot.png");
        assert_eq!(v["results"][0]["durationSeconds"], 0.5);
        assert!(v["results"][0]["errorMessage"].is_null());
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("test-results.json");
        sample().write(&path).unwrap();
        let back: TestReport = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, sample());
    }
}
