//! Task pipelines: preprocess → invoke model → format.
//!
//! Each pipeline is a pure function of its input and the read-only
//! `ModelRegistry`. No state is carried between calls; the sequence
//! pipeline in particular sees only the window it is handed.

pub mod features;

pub use features::{Disease, DiseaseSet, LengthOfStayFeatures, RiskFeatures, SegmentFeatures};

use ndarray::{aview1, Array2, ArrayD, Axis};
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;
use crate::preprocess::{ImageTensor, MODEL_INPUT_SIZE};
use crate::registry::{ModelHandle, ModelRegistry};

// ═══════════════════════════════════════════════════════════
// Threshold policies
// ═══════════════════════════════════════════════════════════

/// Decision rule turning a positive-class probability into a label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    /// `p >= cut`
    AtLeast(f32),
    /// `p > cut`
    Above(f32),
}

impl Threshold {
    pub fn is_positive(self, probability: f32) -> bool {
        match self {
            Threshold::AtLeast(cut) => probability >= cut,
            Threshold::Above(cut) => probability > cut,
        }
    }
}

/// Imaging calls the boundary case positive.
pub const IMAGING_THRESHOLD: Threshold = Threshold::AtLeast(0.5);

/// Sentiment calls the boundary case negative.
pub const SENTIMENT_THRESHOLD: Threshold = Threshold::Above(0.5);

/// Decimal places reported for a positive imaging probability.
const IMAGING_PROBABILITY_PLACES: i32 = 3;

// ═══════════════════════════════════════════════════════════
// Response shapes
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskPrediction {
    pub risk_class: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LengthOfStayPrediction {
    /// Predicted days, unrounded and unclamped.
    pub length_of_stay: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentPrediction {
    pub cluster: i64,
}

/// Imaging outcome. `Normal` deliberately carries no probability field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Result")]
pub enum ImageDiagnosis {
    Cancer { probability: f64 },
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequencePrediction {
    pub prediction: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentPrediction {
    pub probability: f64,
    pub label: SentimentLabel,
}

// ═══════════════════════════════════════════════════════════
// Formatters
// ═══════════════════════════════════════════════════════════

/// Round an `f32` to `places` decimals, ties to even on the exact binary value.
///
/// An `f32` mantissa has 24 bits, so scaling by `10^places` in `f64` stays
/// exact for `places <= 9` and a tie here is a true decimal tie.
fn round_to(value: f32, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (f64::from(value) * factor).round_ties_even() / factor
}

pub fn format_image(probability: f32) -> ImageDiagnosis {
    if IMAGING_THRESHOLD.is_positive(probability) {
        ImageDiagnosis::Cancer {
            probability: round_to(probability, IMAGING_PROBABILITY_PLACES),
        }
    } else {
        ImageDiagnosis::Normal
    }
}

pub fn format_sentiment(probability: f32) -> SentimentPrediction {
    let label = if SENTIMENT_THRESHOLD.is_positive(probability) {
        SentimentLabel::Positive
    } else {
        SentimentLabel::Negative
    };
    SentimentPrediction {
        probability: f64::from(probability),
        label,
    }
}

/// First element of a model output in row-major order (`[0]`, `[0][0]`, ...).
fn first_value(model: &dyn ModelHandle, output: &ArrayD<f32>) -> Result<f32, InferenceError> {
    let value = output
        .iter()
        .next()
        .copied()
        .ok_or_else(|| InferenceError::EmptyOutput {
            model: model.name().to_string(),
        })?;
    if !value.is_finite() {
        return Err(InferenceError::NonFiniteOutput {
            model: model.name().to_string(),
        });
    }
    Ok(value)
}

/// Class and cluster labels arrive as numbers; coerce toward zero.
fn class_label(value: f32) -> i64 {
    value.trunc() as i64
}

fn invoke_row(model: &dyn ModelHandle, row: &[f32]) -> Result<f32, InferenceError> {
    let batch = aview1(row).insert_axis(Axis(0));
    let output = model.predict(batch.into_dyn())?;
    first_value(model, &output)
}

// ═══════════════════════════════════════════════════════════
// Pipelines
// ═══════════════════════════════════════════════════════════

/// Risk class from the 10 unscaled risk features.
pub fn predict_risk(
    registry: &ModelRegistry,
    features: &RiskFeatures,
) -> Result<RiskPrediction, InferenceError> {
    let value = invoke_row(registry.risk_model(), &features.to_vector())?;
    Ok(RiskPrediction {
        risk_class: class_label(value),
    })
}

/// Length of stay in days from the 22 unscaled features.
pub fn predict_length_of_stay(
    registry: &ModelRegistry,
    features: &LengthOfStayFeatures,
) -> Result<LengthOfStayPrediction, InferenceError> {
    let value = invoke_row(registry.length_of_stay_model(), &features.to_vector())?;
    Ok(LengthOfStayPrediction {
        length_of_stay: f64::from(value),
    })
}

/// Cluster id from the 7 segmentation features after the fitted scaler.
pub fn predict_segment(
    registry: &ModelRegistry,
    features: &SegmentFeatures,
) -> Result<SegmentPrediction, InferenceError> {
    let raw = aview1(&features.to_vector()).insert_axis(Axis(0)).to_owned();
    let scaled = registry.segment_scaler().transform(raw.view())?;

    let model = registry.segmentation_model();
    let output = model.predict(scaled.view().into_dyn())?;
    Ok(SegmentPrediction {
        cluster: class_label(first_value(model, &output)?),
    })
}

/// Cancer/Normal from a decoded 224x224 RGB image.
pub fn predict_image(
    registry: &ModelRegistry,
    image: &ImageTensor,
) -> Result<ImageDiagnosis, InferenceError> {
    let side = MODEL_INPUT_SIZE as usize;
    let expected = (side, side, 3);
    if image.shape() != expected {
        return Err(InferenceError::shape(
            "imaging",
            format!("{expected:?}"),
            format!("{:?}", image.shape()),
        ));
    }

    let batch = image.normalize();
    let model = registry.imaging_model();
    let output = model.predict(batch.view().into_dyn())?;
    Ok(format_image(first_value(model, &output)?))
}

/// Risk probability at the last timestep of `window` (T rows of F features).
///
/// The temporal scaler is applied per feature across all T rows of the
/// flattened window, then the batch axis is restored: `(1, T, F)`.
pub fn predict_sequence(
    registry: &ModelRegistry,
    window: &[Vec<f32>],
) -> Result<SequencePrediction, InferenceError> {
    let scaler = registry.sequence_scaler();
    let n_features = scaler.n_features();

    if window.is_empty() {
        return Err(InferenceError::shape("sequence", "at least 1 timestep", 0));
    }
    if let Some((t, row)) = window
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != n_features)
    {
        return Err(InferenceError::shape(
            "sequence",
            format!("{n_features} features per timestep"),
            format!("{} features at timestep {t}", row.len()),
        ));
    }

    let timesteps = window.len();
    let flat: Vec<f32> = window.iter().flatten().copied().collect();
    let rows = Array2::from_shape_vec((timesteps, n_features), flat)
        .map_err(|e| InferenceError::Preprocess(e.to_string()))?;

    let scaled = scaler.transform(rows.view())?.insert_axis(Axis(0));

    let model = registry.sequence_model();
    let output = model.predict(scaled.view().into_dyn())?;
    Ok(SequencePrediction {
        prediction: f64::from(first_value(model, &output)?),
    })
}

/// Positive/Negative from free text, padded to the classifier's token length.
pub fn predict_sentiment(
    registry: &ModelRegistry,
    text: &str,
) -> Result<SentimentPrediction, InferenceError> {
    let tokens = registry.tokenizer().encode(text);
    let batch = registry.padding().to_batch(&tokens);

    let model = registry.sentiment_model();
    let output = model.predict(batch.view().into_dyn())?;
    Ok(format_sentiment(first_value(model, &output)?))
}
