//! Screenshot baselines with a tolerance policy.
//!
//! Two pixels match when the summed absolute RGB difference stays below
//! [`PIXEL_THRESHOLD`]; an image matches its baseline when the fraction of
//! mismatching pixels is within the tolerance. Differing dimensions never
//! match.

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{Rgba, RgbaImage};
use tracing::{info, warn};

use crate::error::Result;

/// Summed RGB difference at which two pixels count as different.
pub const PIXEL_THRESHOLD: u32 = 30;

/// Whether two pixels are close enough to count as equal.
fn similar(a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
    let d: u32 = (0..3).map(|i| u32::from(a[i].abs_diff(b[i]))).sum();
    d < PIXEL_THRESHOLD
}

/// Fraction of differing pixels in `0..=1`; 1.0 when the sizes differ.
pub fn difference(baseline: &RgbaImage, actual: &RgbaImage) -> f64 {
    if baseline.dimensions() != actual.dimensions() {
        return 1.0;
    }
    let total = u64::from(baseline.width()) * u64::from(baseline.height());
    if total == 0 {
        return 0.0;
    }
    let differing = baseline
        .pixels()
        .zip(actual.pixels())
        .filter(|(a, b)| !similar(a, b))
        .count();
    differing as f64 / total as f64
}

/// Result of checking a capture against its baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum BaselineCheck {
    /// No baseline existed; the capture was saved as the new baseline.
    Created(PathBuf),
    /// Within tolerance.
    Matched {
        /// Fraction of differing pixels.
        difference: f64,
    },
    /// Outside tolerance; the capture was saved next to the failures.
    Mismatched {
        /// Fraction of differing pixels.
        difference: f64,
        /// Where the capture was written.
        actual: PathBuf,
    },
}

impl BaselineCheck {
    /// Whether the check passed.
    pub fn passed(&self) -> bool {
        !matches!(self, Self::Mismatched { .. })
    }
}

/// Baseline images stored by name.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    /// Where baselines live.
    baselines: PathBuf,
    /// Where mismatching captures are written.
    mismatches: PathBuf,
    /// Allowed fraction of differing pixels.
    tolerance: f64,
}

/// Reduce a baseline name to a safe file stem.
pub fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect();
    if stem.is_empty() { "unnamed".into() } else { stem }
}

impl BaselineStore {
    /// Store baselines under `baselines` and mismatches under `mismatches`.
    pub fn new(baselines: impl Into<PathBuf>, mismatches: impl Into<PathBuf>, tolerance: f64) -> Self {
        Self {
            baselines: baselines.into(),
            mismatches: mismatches.into(),
            tolerance,
        }
    }

    /// Allowed fraction of differing pixels.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Path of the baseline for `name`.
    pub fn baseline_path(&self, name: &str) -> PathBuf {
        self.baselines.join(format!("{}.png", file_stem(name)))
    }

    /// Compare `actual` with the baseline for `name` using the store
    /// tolerance.
    pub fn check(&self, name: &str, actual: &RgbaImage) -> Result<BaselineCheck> {
        self.check_with(name, actual, self.tolerance)
    }

    /// Compare with an explicit tolerance.
    pub fn check_with(&self, name: &str, actual: &RgbaImage, tolerance: f64) -> Result<BaselineCheck> {
        let path = self.baseline_path(name);
        if !path.exists() {
            save(&path, actual)?;
            warn!(name, path = %path.display(), "baseline_missing_saved_current");
            return Ok(BaselineCheck::Created(path));
        }
        let baseline = image::open(&path)?.to_rgba8();
        let difference = difference(&baseline, actual);
        if difference <= tolerance {
            info!(name, difference, "baseline_matched");
            return Ok(BaselineCheck::Matched { difference });
        }
        let out = self
            .mismatches
            .join(format!("{}_actual.png", file_stem(name)));
        save(&out, actual)?;
        warn!(
            name,
            difference,
            tolerance,
            actual = %out.display(),
            "baseline_mismatch"
        );
        Ok(BaselineCheck::Mismatched {
            difference,
            actual: out,
        })
    }
}

/// Write a PNG, creating parent directories.
pub(crate) fn save(path: &Path, img: &RgbaImage) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    img.save(path)?;
    Ok(())
}
