use std::path::PathBuf;

/// On-disk locations of every fitted artifact, one folder per task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn risk_model(&self) -> PathBuf {
        self.root
            .join("risk_stratification")
            .join("risk_stratification_model.onnx")
    }

    pub fn length_of_stay_model(&self) -> PathBuf {
        self.root
            .join("length_of_stay")
            .join("length_of_stay_prediction_model.onnx")
    }

    pub fn segmentation_model(&self) -> PathBuf {
        self.root
            .join("patient_segmentation")
            .join("segmentation_kmeans_model.onnx")
    }

    pub fn segment_scaler(&self) -> PathBuf {
        self.root
            .join("patient_segmentation")
            .join("segment_scaler.json")
    }

    pub fn imaging_model(&self) -> PathBuf {
        self.root.join("image_diagnosis").join("lung_cancer_cnn.onnx")
    }

    pub fn sequence_model(&self) -> PathBuf {
        self.root.join("sequence_model").join("sequence_model.onnx")
    }

    pub fn sequence_scaler(&self) -> PathBuf {
        self.root.join("sequence_model").join("sequence_scaler.json")
    }

    pub fn sentiment_model(&self) -> PathBuf {
        self.root
            .join("sentiment_analysis")
            .join("cnn_sentiment_model.onnx")
    }

    pub fn tokenizer(&self) -> PathBuf {
        self.root
            .join("sentiment_analysis")
            .join("cnn_tokenizer.json")
    }

    /// Optional; padding defaults apply when absent.
    pub fn padding(&self) -> PathBuf {
        self.root.join("sentiment_analysis").join("padding.json")
    }

    /// Required artifacts, in load order.
    pub fn required(&self) -> Vec<PathBuf> {
        vec![
            self.risk_model(),
            self.length_of_stay_model(),
            self.segmentation_model(),
            self.segment_scaler(),
            self.imaging_model(),
            self.sequence_model(),
            self.sequence_scaler(),
            self.sentiment_model(),
            self.tokenizer(),
        ]
    }

    /// First required artifact missing from disk, if any.
    pub fn first_missing(&self) -> Option<PathBuf> {
        self.required().into_iter().find(|p| !p.exists())
    }
}
