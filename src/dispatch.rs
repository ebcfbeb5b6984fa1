//! Task dispatch: binds each task to its pipeline and runs it for one request.
//!
//! Stateless per request. The only shared state is the read-only registry,
//! passed in at construction rather than reached as a global.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn};

use crate::error::InferenceError;
use crate::pipeline::{
    self, ImageDiagnosis, LengthOfStayFeatures, LengthOfStayPrediction, RiskFeatures,
    RiskPrediction, SegmentFeatures, SegmentPrediction, SentimentPrediction, SequencePrediction,
};
use crate::preprocess::ImageTensor;
use crate::registry::ModelRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Risk,
    #[serde(rename = "los")]
    LengthOfStay,
    Segment,
    Image,
    Sequence,
    Sentiment,
}

impl Task {
    pub const ALL: [Task; 6] = [
        Task::Risk,
        Task::LengthOfStay,
        Task::Segment,
        Task::Image,
        Task::Sequence,
        Task::Sentiment,
    ];

    /// Wire name, identical to the endpoint path segment.
    pub const fn name(self) -> &'static str {
        match self {
            Task::Risk => "risk",
            Task::LengthOfStay => "los",
            Task::Segment => "segment",
            Task::Image => "image",
            Task::Sequence => "sequence",
            Task::Sentiment => "sentiment",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Task::ALL
            .into_iter()
            .find(|task| task.name() == s)
            .ok_or_else(|| format!("unknown task: {s}"))
    }
}

/// Validated payload for one task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskRequest {
    Risk(RiskFeatures),
    LengthOfStay(LengthOfStayFeatures),
    Segment(SegmentFeatures),
    Image(ImageTensor),
    /// `T` timesteps of `F` features, oldest first.
    Sequence(Vec<Vec<f32>>),
    Sentiment(String),
}

impl TaskRequest {
    pub fn task(&self) -> Task {
        match self {
            TaskRequest::Risk(_) => Task::Risk,
            TaskRequest::LengthOfStay(_) => Task::LengthOfStay,
            TaskRequest::Segment(_) => Task::Segment,
            TaskRequest::Image(_) => Task::Image,
            TaskRequest::Sequence(_) => Task::Sequence,
            TaskRequest::Sentiment(_) => Task::Sentiment,
        }
    }
}

/// One response shape per task. Serializes to exactly that task's body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionResult {
    Risk(RiskPrediction),
    LengthOfStay(LengthOfStayPrediction),
    Segment(SegmentPrediction),
    Image(ImageDiagnosis),
    Sequence(SequencePrediction),
    Sentiment(SentimentPrediction),
}

impl PredictionResult {
    pub fn task(&self) -> Task {
        match self {
            PredictionResult::Risk(_) => Task::Risk,
            PredictionResult::LengthOfStay(_) => Task::LengthOfStay,
            PredictionResult::Segment(_) => Task::Segment,
            PredictionResult::Image(_) => Task::Image,
            PredictionResult::Sequence(_) => Task::Sequence,
            PredictionResult::Sentiment(_) => Task::Sentiment,
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ModelRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    /// Run the request through its task's pipeline. Any failure aborts the
    /// request; nothing is retried.
    pub fn dispatch(&self, request: &TaskRequest) -> Result<PredictionResult, InferenceError> {
        let task = request.task();
        let span = info_span!("dispatch", task = task.name());
        let _enter = span.enter();
        let started = Instant::now();

        let registry = self.registry.as_ref();
        let result = match request {
            TaskRequest::Risk(features) => {
                pipeline::predict_risk(registry, features).map(PredictionResult::Risk)
            }
            TaskRequest::LengthOfStay(features) => {
                pipeline::predict_length_of_stay(registry, features)
                    .map(PredictionResult::LengthOfStay)
            }
            TaskRequest::Segment(features) => {
                pipeline::predict_segment(registry, features).map(PredictionResult::Segment)
            }
            TaskRequest::Image(image) => {
                pipeline::predict_image(registry, image).map(PredictionResult::Image)
            }
            TaskRequest::Sequence(window) => {
                pipeline::predict_sequence(registry, window).map(PredictionResult::Sequence)
            }
            TaskRequest::Sentiment(text) => {
                pipeline::predict_sentiment(registry, text).map(PredictionResult::Sentiment)
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => debug!(elapsed_ms, "Dispatch complete"),
            Err(e) if e.is_client_error() => warn!(elapsed_ms, error = %e, "Request rejected"),
            Err(e) => error!(elapsed_ms, error = %e, "Dispatch failed"),
        }
        result
    }

    /// Sentiment for each text, in input order. The first failure aborts
    /// the batch; no partial results are returned.
    pub fn dispatch_sentiment_bulk(
        &self,
        texts: &[String],
    ) -> Result<Vec<SentimentPrediction>, InferenceError> {
        let span = info_span!("dispatch", task = "sentiment_bulk", count = texts.len());
        let _enter = span.enter();
        let started = Instant::now();

        let results = texts
            .iter()
            .map(|text| pipeline::predict_sentiment(&self.registry, text))
            .collect::<Result<Vec<_>, _>>();

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &results {
            Ok(r) => info!(elapsed_ms, count = r.len(), "Bulk sentiment complete"),
            Err(e) => error!(elapsed_ms, error = %e, "Bulk sentiment failed"),
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testing::{stub_registry, StubOverrides};
    use crate::registry::StubModel;
    use image::{Rgb, RgbImage};
    use ndarray::{ArrayD, IxDyn};
    use serde_json::json;

    fn dispatcher(overrides: StubOverrides) -> Dispatcher {
        Dispatcher::new(Arc::new(stub_registry(overrides)))
    }

    #[test]
    fn task_names_round_trip_through_from_str() {
        for task in Task::ALL {
            assert_eq!(task.name().parse::<Task>().unwrap(), task);
        }
        assert!("diagnosis".parse::<Task>().is_err());
        assert_eq!(serde_json::to_value(Task::LengthOfStay).unwrap(), json!("los"));
    }

    #[test]
    fn request_and_result_agree_on_task() {
        let d = dispatcher(StubOverrides::default());
        let requests = [
            TaskRequest::Risk(RiskFeatures::from_positional(&[0.0; 10]).unwrap()),
            TaskRequest::LengthOfStay(LengthOfStayFeatures::from_positional(&[0.0; 22]).unwrap()),
            TaskRequest::Segment(SegmentFeatures::from_positional(&[0.0; 7]).unwrap()),
            TaskRequest::Image(ImageTensor::from_rgb_image(RgbImage::from_pixel(
                224,
                224,
                Rgb([1, 2, 3]),
            ))
            .unwrap()),
            TaskRequest::Sequence(vec![vec![0.0; 3]]),
            TaskRequest::Sentiment("fine".into()),
        ];
        for request in &requests {
            let result = d.dispatch(request).unwrap();
            assert_eq!(result.task(), request.task());
        }
    }

    // Scenario A
    #[test]
    fn risk_scenario_returns_class_in_range() {
        let d = dispatcher(StubOverrides {
            risk: Some(StubModel::new("risk", |input| {
                // Age drives the class in this stub: <40 low, <60 moderate, else high
                let age = input[[0, 0]];
                let class = if age < 40.0 { 0.0 } else if age < 60.0 { 1.0 } else { 2.0 };
                Ok(ArrayD::from_elem(IxDyn(&[1]), class))
            })),
            ..Default::default()
        });
        let features =
            RiskFeatures::from_positional(&[45.0, 1.0, 0.0, 0.0, 13.5, 7000.0, 250000.0, 90.0, 20.0, 0.9])
                .unwrap();
        let result = d.dispatch(&TaskRequest::Risk(features)).unwrap();
        let body = serde_json::to_value(result).unwrap();
        assert_eq!(body, json!({"risk_class": 1}));
    }

    // Scenario B
    #[test]
    fn sentiment_scenario_label_matches_probability() {
        let d = dispatcher(StubOverrides::default());
        let result = d
            .dispatch(&TaskRequest::Sentiment("The staff were excellent and caring".into()))
            .unwrap();
        let body = serde_json::to_value(result).unwrap();
        let probability = body["probability"].as_f64().unwrap();
        let expected = if probability > 0.5 { "Positive" } else { "Negative" };
        assert_eq!(body["label"], expected);
    }

    // Scenario C
    #[test]
    fn image_scenario_boundary_is_cancer() {
        let d = dispatcher(StubOverrides {
            imaging: Some(StubModel::constant("cnn", 0.5)),
            ..Default::default()
        });
        let image =
            ImageTensor::from_rgb_image(RgbImage::from_pixel(224, 224, Rgb([9, 9, 9]))).unwrap();
        let result = d.dispatch(&TaskRequest::Image(image)).unwrap();
        assert_eq!(
            serde_json::to_value(result).unwrap(),
            json!({"Result": "Cancer", "probability": 0.5})
        );
    }

    // Scenario D
    #[test]
    fn sequence_scenario_has_no_carry_over() {
        let sigmoid_of_sum = || {
            StubModel::new("lstm", |input| {
                let s: f32 = input.sum();
                Ok(ArrayD::from_elem(IxDyn(&[1, 1]), 1.0 / (1.0 + (-s / 10.0).exp())))
            })
        };
        let window = vec![vec![1.0, 2.0, 3.0], vec![0.5, 0.5, 0.5], vec![4.0, 0.0, -1.0]];

        let once = dispatcher(StubOverrides {
            sequence: Some(sigmoid_of_sum()),
            ..Default::default()
        })
        .dispatch(&TaskRequest::Sequence(window.clone()))
        .unwrap();

        let incremental = dispatcher(StubOverrides {
            sequence: Some(sigmoid_of_sum()),
            ..Default::default()
        });
        let mut last = None;
        for t in 1..=window.len() {
            last = Some(
                incremental
                    .dispatch(&TaskRequest::Sequence(window[..t].to_vec()))
                    .unwrap(),
            );
        }
        assert_eq!(last.unwrap(), once);
    }

    #[test]
    fn shape_errors_surface_before_model() {
        let d = dispatcher(StubOverrides {
            sequence: Some(StubModel::new("lstm", |_| panic!("model must not be reached"))),
            ..Default::default()
        });
        let err = d
            .dispatch(&TaskRequest::Sequence(vec![vec![1.0, 2.0]]))
            .unwrap_err();
        assert!(matches!(err, InferenceError::ShapeMismatch { .. }));
    }

    #[test]
    fn invocation_failure_is_not_client_error() {
        let d = dispatcher(StubOverrides {
            length_of_stay: Some(StubModel::new("los", |_| {
                Err(InferenceError::invocation("los", "dtype mismatch"))
            })),
            ..Default::default()
        });
        let features = LengthOfStayFeatures::from_positional(&[0.0; 22]).unwrap();
        let err = d.dispatch(&TaskRequest::LengthOfStay(features)).unwrap_err();
        assert!(!err.is_client_error());
    }

    #[test]
    fn bulk_sentiment_preserves_order() {
        let d = dispatcher(StubOverrides {
            sentiment: Some(StubModel::new("cnn_text", |input| {
                let non_pad = input.iter().filter(|v| **v != 0.0).count() as f32;
                Ok(ArrayD::from_elem(IxDyn(&[1, 1]), non_pad / 4.0))
            })),
            ..Default::default()
        });
        let texts = vec!["the".to_string(), "the staff were excellent".to_string()];
        let results = d.dispatch_sentiment_bulk(&texts).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].probability, 0.25);
        assert_eq!(results[1].probability, 1.0);
    }

    #[test]
    fn bulk_sentiment_aborts_on_first_failure() {
        let d = dispatcher(StubOverrides {
            sentiment: Some(StubModel::constant("cnn_text", f32::INFINITY)),
            ..Default::default()
        });
        let err = d
            .dispatch_sentiment_bulk(&["a".to_string(), "b".to_string()])
            .unwrap_err();
        assert!(matches!(err, InferenceError::NonFiniteOutput { .. }));
    }

    #[test]
    fn empty_bulk_is_empty() {
        let d = dispatcher(StubOverrides::default());
        assert!(d.dispatch_sentiment_bulk(&[]).unwrap().is_empty());
    }
}
