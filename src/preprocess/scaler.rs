//! Fitted numeric transforms applied before clustering and sequence inference.
//!
//! The parameters come from the training run (exported as JSON from the
//! fitted scaler's `mean_`/`scale_` or `min_`/`scale_` attributes) and are
//! never refitted here. `transform` is pure: repeated calls on the same
//! input give bit-identical output.

use ndarray::{Array2, ArrayView2, Axis};
use serde::Deserialize;

use crate::error::InferenceError;

/// A fitted per-feature transform.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedScaler {
    /// `(x - mean) / scale`. A missing `mean` centers at 0, a missing
    /// `scale` divides by 1 (fit with `with_mean`/`with_std` disabled).
    Standard {
        mean: Option<Vec<f32>>,
        scale: Option<Vec<f32>>,
    },
    /// `x * scale + min`
    MinMax { min: Vec<f32>, scale: Vec<f32> },
}

impl FittedScaler {
    pub fn standard(mean: Vec<f32>, scale: Vec<f32>) -> Self {
        FittedScaler::Standard {
            mean: Some(mean),
            scale: Some(scale),
        }
    }

    pub fn min_max(min: Vec<f32>, scale: Vec<f32>) -> Self {
        FittedScaler::MinMax { min, scale }
    }

    /// Parse a scaler artifact and check its parameter vectors agree.
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let scaler: FittedScaler = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        scaler.validate()?;
        Ok(scaler)
    }

    /// Number of features the scaler was fit on.
    pub fn n_features(&self) -> usize {
        match self {
            FittedScaler::Standard { mean, scale } => mean
                .as_ref()
                .or(scale.as_ref())
                .map(Vec::len)
                .unwrap_or(0),
            FittedScaler::MinMax { min, .. } => min.len(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            FittedScaler::Standard { mean, scale } => {
                if mean.is_none() && scale.is_none() {
                    return Err("standard scaler needs `mean` or `scale`".into());
                }
                if let (Some(m), Some(s)) = (mean, scale) {
                    if m.len() != s.len() {
                        return Err(format!(
                            "mean has {} entries but scale has {}",
                            m.len(),
                            s.len()
                        ));
                    }
                }
            }
            FittedScaler::MinMax { min, scale } => {
                if min.len() != scale.len() {
                    return Err(format!(
                        "min has {} entries but scale has {}",
                        min.len(),
                        scale.len()
                    ));
                }
            }
        }
        if self.n_features() == 0 {
            return Err("scaler has no features".into());
        }
        Ok(())
    }

    /// Apply the transform column-wise to every row of `rows`.
    pub fn transform(&self, rows: ArrayView2<'_, f32>) -> Result<Array2<f32>, InferenceError> {
        let n_features = self.n_features();
        if rows.ncols() != n_features {
            return Err(InferenceError::shape(
                "scaler",
                format!("{n_features} features"),
                format!("{} features", rows.ncols()),
            ));
        }

        let mut out = rows.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for (j, value) in row.iter_mut().enumerate() {
                *value = self.apply(j, *value);
            }
        }
        Ok(out)
    }

    fn apply(&self, column: usize, value: f32) -> f32 {
        match self {
            FittedScaler::Standard { mean, scale } => {
                let centered = value - mean.as_ref().map_or(0.0, |m| m[column]);
                // Constant features are fit with scale 1 upstream; an exported
                // zero is treated the same way.
                let s = scale.as_ref().map_or(1.0, |s| s[column]);
                if s == 0.0 {
                    centered
                } else {
                    centered / s
                }
            }
            FittedScaler::MinMax { min, scale } => value * scale[column] + min[column],
        }
    }
}
