//! Standard scaling of numeric fields

use serde::{Deserialize, Serialize};

/// Mean and divisor of one numeric field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: f64,
    /// Population standard deviation, or 1.0 for a constant field
    pub std: f64,
    /// True when the field had zero variance and the divisor was floored
    pub floored: bool,
}

impl ScalerParams {
    /// Population (ddof = 0) mean and standard deviation.
    ///
    /// A standard deviation below `tolerance * max(1, |mean|)` is treated as zero
    /// and replaced with 1.0.
    pub fn fit(values: &[f64], tolerance: f64) -> Self {
        let n = values.len().max(1) as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();

        if !std.is_finite() || std <= tolerance * mean.abs().max(1.0) {
            Self { mean, std: 1.0, floored: true }
        } else {
            Self { mean, std, floored: false }
        }
    }

    #[inline]
    pub fn scale(&self, v: f64) -> f64 {
        (v - self.mean) / self.std
    }

    #[inline]
    pub fn unscale(&self, z: f64) -> f64 {
        z * self.std + self.mean
    }
}
