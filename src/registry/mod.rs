//! Model registry: every fitted model and preprocessing artifact, loaded
//! once at startup and shared read-only by all requests.
//!
//! Loading is all-or-nothing. A missing or unreadable artifact is a fatal
//! startup error; there is no lazy or partial load.

mod handle;
pub mod layout;

#[cfg(feature = "onnx-runtime")]
pub use handle::OnnxModel;
pub use handle::{ModelHandle, StubModel, TensorElement};
pub use layout::ArtifactLayout;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::pipeline::SegmentFeatures;
use crate::preprocess::{FittedScaler, PaddingConfig, WordIndexTokenizer};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Model artifact not found: {0}")]
    ArtifactNotFound(PathBuf),

    #[error("Model initialization failed: {0}")]
    ModelInit(String),

    #[error("Invalid artifact {path}: {reason}")]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ONNX runtime support not compiled in (enable the `onnx-runtime` feature)")]
    RuntimeUnavailable,
}

/// Already-constructed registry contents.
pub struct RegistryParts {
    pub risk: Box<dyn ModelHandle>,
    pub length_of_stay: Box<dyn ModelHandle>,
    pub segmentation: Box<dyn ModelHandle>,
    pub imaging: Box<dyn ModelHandle>,
    pub sequence: Box<dyn ModelHandle>,
    pub sentiment: Box<dyn ModelHandle>,
    pub segment_scaler: FittedScaler,
    pub sequence_scaler: FittedScaler,
    pub tokenizer: WordIndexTokenizer,
    pub padding: PaddingConfig,
}

/// Six model handles plus the fitted scalers and tokenizer.
pub struct ModelRegistry {
    risk: Box<dyn ModelHandle>,
    length_of_stay: Box<dyn ModelHandle>,
    segmentation: Box<dyn ModelHandle>,
    imaging: Box<dyn ModelHandle>,
    sequence: Box<dyn ModelHandle>,
    sentiment: Box<dyn ModelHandle>,
    segment_scaler: FittedScaler,
    sequence_scaler: FittedScaler,
    tokenizer: WordIndexTokenizer,
    padding: PaddingConfig,
}

impl ModelRegistry {
    pub fn new(parts: RegistryParts) -> Self {
        Self {
            risk: parts.risk,
            length_of_stay: parts.length_of_stay,
            segmentation: parts.segmentation,
            imaging: parts.imaging,
            sequence: parts.sequence,
            sentiment: parts.sentiment,
            segment_scaler: parts.segment_scaler,
            sequence_scaler: parts.sequence_scaler,
            tokenizer: parts.tokenizer,
            padding: parts.padding,
        }
    }

    /// Load every artifact from `models_dir` (see [`ArtifactLayout`]).
    ///
    /// Preprocessing artifacts are parsed before any model session is
    /// created, so a malformed scaler fails fast.
    pub fn load(models_dir: &Path) -> Result<Self, RegistryError> {
        let _span = tracing::info_span!("registry_load", dir = %models_dir.display()).entered();
        let layout = ArtifactLayout::new(models_dir);

        if let Some(missing) = layout.first_missing() {
            return Err(RegistryError::ArtifactNotFound(missing));
        }

        let segment_scaler = read_scaler(&layout.segment_scaler())?;
        if segment_scaler.n_features() != SegmentFeatures::COUNT {
            return Err(RegistryError::InvalidArtifact {
                path: layout.segment_scaler(),
                reason: format!(
                    "fit on {} features, segmentation uses {}",
                    segment_scaler.n_features(),
                    SegmentFeatures::COUNT
                ),
            });
        }
        let sequence_scaler = read_scaler(&layout.sequence_scaler())?;
        let tokenizer = read_tokenizer(&layout.tokenizer())?;
        let padding = read_padding(&layout.padding())?;

        info!(
            sequence_features = sequence_scaler.n_features(),
            vocabulary = tokenizer.vocabulary_size(),
            maxlen = padding.maxlen,
            "Preprocessing artifacts loaded"
        );

        let parts = RegistryParts {
            risk: load_model("risk", &layout.risk_model(), TensorElement::F32)?,
            length_of_stay: load_model(
                "length_of_stay",
                &layout.length_of_stay_model(),
                TensorElement::F32,
            )?,
            segmentation: load_model(
                "segmentation",
                &layout.segmentation_model(),
                TensorElement::F32,
            )?,
            imaging: load_model("imaging", &layout.imaging_model(), TensorElement::F32)?,
            sequence: load_model("sequence", &layout.sequence_model(), TensorElement::F32)?,
            sentiment: load_model("sentiment", &layout.sentiment_model(), padding.dtype)?,
            segment_scaler,
            sequence_scaler,
            tokenizer,
            padding,
        };

        info!("Model registry ready");
        Ok(Self::new(parts))
    }

    pub fn risk_model(&self) -> &dyn ModelHandle {
        self.risk.as_ref()
    }

    pub fn length_of_stay_model(&self) -> &dyn ModelHandle {
        self.length_of_stay.as_ref()
    }

    pub fn segmentation_model(&self) -> &dyn ModelHandle {
        self.segmentation.as_ref()
    }

    pub fn imaging_model(&self) -> &dyn ModelHandle {
        self.imaging.as_ref()
    }

    pub fn sequence_model(&self) -> &dyn ModelHandle {
        self.sequence.as_ref()
    }

    pub fn sentiment_model(&self) -> &dyn ModelHandle {
        self.sentiment.as_ref()
    }

    pub fn segment_scaler(&self) -> &FittedScaler {
        &self.segment_scaler
    }

    pub fn sequence_scaler(&self) -> &FittedScaler {
        &self.sequence_scaler
    }

    pub fn tokenizer(&self) -> &WordIndexTokenizer {
        &self.tokenizer
    }

    pub fn padding(&self) -> &PaddingConfig {
        &self.padding
    }
}

fn read_scaler(path: &Path) -> Result<FittedScaler, RegistryError> {
    let raw = std::fs::read_to_string(path)?;
    FittedScaler::from_json(&raw).map_err(|reason| RegistryError::InvalidArtifact {
        path: path.to_path_buf(),
        reason,
    })
}

fn read_tokenizer(path: &Path) -> Result<WordIndexTokenizer, RegistryError> {
    let raw = std::fs::read_to_string(path)?;
    WordIndexTokenizer::from_json(&raw).map_err(|e| RegistryError::InvalidArtifact {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn read_padding(path: &Path) -> Result<PaddingConfig, RegistryError> {
    if !path.exists() {
        return Ok(PaddingConfig::default());
    }
    let raw = std::fs::read_to_string(path)?;
    let padding: PaddingConfig = serde_json::from_str(&raw)?;
    if padding.maxlen == 0 {
        return Err(RegistryError::InvalidArtifact {
            path: path.to_path_buf(),
            reason: "maxlen must be positive".into(),
        });
    }
    Ok(padding)
}

#[cfg(feature = "onnx-runtime")]
fn load_model(
    name: &str,
    path: &Path,
    input_element: TensorElement,
) -> Result<Box<dyn ModelHandle>, RegistryError> {
    Ok(Box::new(OnnxModel::load(name, path, input_element)?))
}

#[cfg(not(feature = "onnx-runtime"))]
fn load_model(
    _name: &str,
    _path: &Path,
    _input_element: TensorElement,
) -> Result<Box<dyn ModelHandle>, RegistryError> {
    Err(RegistryError::RuntimeUnavailable)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const STANDARD7: &str =
        r#"{"kind":"standard","mean":[0,0,0,0,0,0,0],"scale":[1,1,1,1,1,1,1]}"#;
    const STANDARD3: &str = r#"{"kind":"standard","mean":[0,0,0],"scale":[1,1,1]}"#;
    const TOKENIZER: &str =
        r#"{"class_name":"Tokenizer","config":{"word_index":"{\"good\": 1, \"care\": 2}"}}"#;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    /// Lay out every required artifact; model files are placeholders.
    fn populate(root: &Path) -> ArtifactLayout {
        let layout = ArtifactLayout::new(root);
        for path in [
            layout.risk_model(),
            layout.length_of_stay_model(),
            layout.segmentation_model(),
            layout.imaging_model(),
            layout.sequence_model(),
            layout.sentiment_model(),
        ] {
            write(&path, "onnx");
        }
        write(&layout.segment_scaler(), STANDARD7);
        write(&layout.sequence_scaler(), STANDARD3);
        write(&layout.tokenizer(), TOKENIZER);
        layout
    }

    #[test]
    fn missing_directory_is_artifact_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelRegistry::load(&dir.path().join("nope")).err().unwrap();
        assert!(matches!(err, RegistryError::ArtifactNotFound(_)));
    }

    #[test]
    fn missing_tokenizer_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let layout = populate(dir.path());
        fs::remove_file(layout.tokenizer()).unwrap();

        match ModelRegistry::load(dir.path()) {
            Err(RegistryError::ArtifactNotFound(path)) => assert_eq!(path, layout.tokenizer()),
            other => panic!("expected ArtifactNotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn malformed_scaler_is_invalid_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let layout = populate(dir.path());
        write(&layout.sequence_scaler(), r#"{"kind":"robust"}"#);

        let err = ModelRegistry::load(dir.path()).err().unwrap();
        assert!(matches!(err, RegistryError::InvalidArtifact { .. }));
    }

    #[test]
    fn segment_scaler_width_must_match_features() {
        let dir = tempfile::tempdir().unwrap();
        let layout = populate(dir.path());
        write(&layout.segment_scaler(), STANDARD3);

        let err = ModelRegistry::load(dir.path()).err().unwrap();
        assert!(err.to_string().contains("segmentation uses 7"));
    }

    #[test]
    fn zero_maxlen_padding_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let layout = populate(dir.path());
        write(&layout.padding(), r#"{"maxlen":0}"#);

        let err = ModelRegistry::load(dir.path()).err().unwrap();
        assert!(matches!(err, RegistryError::InvalidArtifact { .. }));
    }

    #[cfg(not(feature = "onnx-runtime"))]
    #[test]
    fn valid_artifacts_without_runtime_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());
        let err = ModelRegistry::load(dir.path()).err().unwrap();
        assert!(matches!(err, RegistryError::RuntimeUnavailable));
    }

    #[test]
    fn stub_registry_exposes_parts() {
        let registry = testing::stub_registry(testing::StubOverrides::default());
        assert_eq!(registry.risk_model().name(), "risk");
        assert_eq!(registry.segment_scaler().n_features(), SegmentFeatures::COUNT);
        assert_eq!(registry.padding().maxlen, 100);
        assert_eq!(registry.tokenizer().encode("the staff"), vec![2, 3]);
    }
}
