//! Per-request inference error taxonomy.
//!
//! Shared by preprocessing, pipelines and the dispatcher. The HTTP layer
//! maps these onto status codes in `api::error`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    /// Syntactically valid input whose length or dimensions do not match
    /// what the task's model expects.
    #[error("{task}: expected {expected}, got {actual}")]
    ShapeMismatch {
        task: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Image could not be decoded: {0}")]
    InvalidImage(String),

    #[error("Preprocessing failed: {0}")]
    Preprocess(String),

    #[error("Model '{model}' invocation failed: {reason}")]
    Invocation { model: String, reason: String },

    #[error("Model '{model}' returned an empty output tensor")]
    EmptyOutput { model: String },

    #[error("Model '{model}' returned a non-finite value")]
    NonFiniteOutput { model: String },
}

impl InferenceError {
    pub fn shape(task: &'static str, expected: impl ToString, actual: impl ToString) -> Self {
        InferenceError::ShapeMismatch {
            task,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn invocation(model: impl Into<String>, reason: impl ToString) -> Self {
        InferenceError::Invocation {
            model: model.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the caller sent something the core cannot use (as opposed
    /// to a failure inside the core or the model).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            InferenceError::ShapeMismatch { .. } | InferenceError::InvalidImage(_)
        )
    }
}
