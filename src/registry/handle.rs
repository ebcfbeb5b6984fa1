use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

/// Opaque, read-only inference capability over one fitted model.
///
/// Handles are shared by every in-flight request. Implementations whose
/// backend cannot run concurrently serialize calls internally, per handle.
pub trait ModelHandle: Send + Sync {
    /// Short identifier used in logs and error messages.
    fn name(&self) -> &str;

    /// Run the model on one input tensor and return its first output.
    fn predict(&self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, InferenceError>;
}

/// Element type a model's input tensor is declared with.
///
/// Pipelines always produce `f32`; integer-input graphs (token ids) get a
/// cast at the invocation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorElement {
    #[default]
    F32,
    I64,
    I32,
}

// ═══════════════════════════════════════════════════════════
// ONNX Runtime handle (feature `onnx-runtime`)
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx-runtime")]
mod onnx {
    use super::{ModelHandle, TensorElement};
    use crate::error::InferenceError;
    use crate::registry::RegistryError;
    use ndarray::{ArrayD, ArrayViewD, IxDyn};
    use ort::session::Session;
    use ort::value::{DynValue, Tensor};
    use std::path::Path;
    use std::sync::Mutex;

    /// Fitted model exported to ONNX and executed with ONNX Runtime.
    ///
    /// `Session::run` requires `&mut self`, so each handle owns its own
    /// `Mutex<Session>`. Unrelated tasks never contend on the same lock.
    pub struct OnnxModel {
        name: String,
        input_element: TensorElement,
        session: Mutex<Session>,
    }

    impl OnnxModel {
        pub fn load(
            name: &str,
            path: &Path,
            input_element: TensorElement,
        ) -> Result<Self, RegistryError> {
            if !path.exists() {
                return Err(RegistryError::ArtifactNotFound(path.to_path_buf()));
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| RegistryError::ModelInit(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| RegistryError::ModelInit(e.to_string()))?
                .commit_from_file(path)
                .map_err(|e: ort::Error| {
                    RegistryError::ModelInit(format!("{name}: ONNX load failed: {e}"))
                })?;

            tracing::info!(model = name, path = %path.display(), "ONNX model loaded");

            Ok(Self {
                name: name.to_string(),
                input_element,
                session: Mutex::new(session),
            })
        }

        fn input_value(&self, input: ArrayViewD<'_, f32>) -> Result<DynValue, InferenceError> {
            let value = match self.input_element {
                TensorElement::F32 => Tensor::from_array(input.to_owned()).map(Tensor::into_dyn),
                TensorElement::I64 => {
                    Tensor::from_array(input.mapv(|v| v as i64)).map(Tensor::into_dyn)
                }
                TensorElement::I32 => {
                    Tensor::from_array(input.mapv(|v| v as i32)).map(Tensor::into_dyn)
                }
            };
            value.map_err(|e| InferenceError::invocation(&self.name, format!("input tensor: {e}")))
        }
    }

    impl ModelHandle for OnnxModel {
        fn name(&self) -> &str {
            &self.name
        }

        fn predict(&self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, InferenceError> {
            let value = self.input_value(input)?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| InferenceError::invocation(&self.name, "session lock poisoned"))?;

            let outputs = session
                .run(ort::inputs![value])
                .map_err(|e| InferenceError::invocation(&self.name, e))?;

            // Regressors and neural nets emit float tensors; classifier and
            // clustering graphs emit int64 labels as their first output.
            let output = &outputs[0];
            let (dims, data): (Vec<usize>, Vec<f32>) =
                if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
                    (
                        shape.iter().map(|&d| d.max(0) as usize).collect(),
                        data.to_vec(),
                    )
                } else {
                    let (shape, data) = output.try_extract_tensor::<i64>().map_err(|e| {
                        InferenceError::invocation(&self.name, format!("output extraction: {e}"))
                    })?;
                    (
                        shape.iter().map(|&d| d.max(0) as usize).collect(),
                        data.iter().map(|&v| v as f32).collect(),
                    )
                };

            ArrayD::from_shape_vec(IxDyn(&dims), data)
                .map_err(|e| InferenceError::invocation(&self.name, e))
        }
    }
}

#[cfg(feature = "onnx-runtime")]
pub use onnx::OnnxModel;

type Responder =
    dyn Fn(ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, InferenceError> + Send + Sync;

/// In-process model handle driven by a closure. Used by tests and by
/// embedders that wrap a model not exported to ONNX.
pub struct StubModel {
    name: String,
    input_shape: Option<Vec<usize>>,
    respond: Box<Responder>,
}

impl StubModel {
    pub fn new<F>(name: &str, respond: F) -> Self
    where
        F: Fn(ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, InferenceError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            input_shape: None,
            respond: Box::new(respond),
        }
    }

    /// Model that always answers `[[value]]`, whatever the input.
    pub fn constant(name: &str, value: f32) -> Self {
        Self::new(name, move |_| Ok(ArrayD::from_elem(IxDyn(&[1, 1]), value)))
    }

    /// Reject inputs whose shape differs from `shape`, the way a compiled
    /// graph with fixed input dimensions does.
    pub fn with_input_shape(mut self, shape: &[usize]) -> Self {
        self.input_shape = Some(shape.to_vec());
        self
    }
}

impl ModelHandle for StubModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, InferenceError> {
        if let Some(expected) = &self.input_shape {
            if input.shape() != expected.as_slice() {
                return Err(InferenceError::invocation(
                    &self.name,
                    format!("input shape {:?} does not match {:?}", input.shape(), expected),
                ));
            }
        }
        (self.respond)(input)
    }
}
