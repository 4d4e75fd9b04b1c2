// src/pipeline/frontend.rs
//
// The two recognition front-ends behind one per-frame call.
//
//   detector tensor  → SignDetector  ─┐
//   hand landmarks   → KnnClassifier ─┼→ Recognition → JutsuSession
//   pre-labelled     ─────────────────┘

use crate::classifier::KnnClassifier;
use crate::sign_detection::{DecodeError, SignDetector};
use crate::types::{LandmarkSet, Recognition};
use serde::Deserialize;

/// What the capture side hands over for one frame
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FrameInput {
    /// Already classified upstream
    Label { label: String },
    Hands { hands: Vec<LandmarkSet> },
    Tensor {
        tensor: Vec<f32>,
        num_anchors: usize,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    Decode(DecodeError),
    /// Input kind arrived but that front-end is not configured
    MissingFrontEnd(&'static str),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "{}", e),
            Self::MissingFrontEnd(name) => write!(f, "no {} configured for this input", name),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<DecodeError> for FrameError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

#[derive(Default)]
pub struct FrontEnds {
    pub detector: Option<SignDetector>,
    pub classifier: Option<KnnClassifier>,
}

impl FrontEnds {
    pub fn new(detector: Option<SignDetector>, classifier: Option<KnnClassifier>) -> Self {
        Self {
            detector,
            classifier,
        }
    }

    pub fn recognize(&self, input: &FrameInput) -> Result<Recognition, FrameError> {
        match input {
            FrameInput::Label { label } => Ok(Recognition::new(label.clone(), 1.0)),
            FrameInput::Hands { hands } => {
                let classifier = self
                    .classifier
                    .as_ref()
                    .ok_or(FrameError::MissingFrontEnd("classifier"))?;
                Ok(classifier.recognize(hands))
            }
            FrameInput::Tensor {
                tensor,
                num_anchors,
                width,
                height,
            } => {
                let detector = self
                    .detector
                    .as_ref()
                    .ok_or(FrameError::MissingFrontEnd("detector"))?;
                Ok(detector.recognize(tensor, *num_anchors, *width, *height)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TrainingExample;
    use crate::landmarks::build_feature_vector;
    use crate::types::{Handedness, Point3, LANDMARKS_PER_HAND};

    fn open_hand(handedness: Handedness) -> LandmarkSet {
        LandmarkSet {
            handedness,
            points: (0..LANDMARKS_PER_HAND)
                .map(|i| Point3::new(0.3 + 0.01 * i as f32, 0.5 - 0.02 * (i % 5) as f32, 0.0))
                .collect(),
        }
    }

    #[test]
    fn test_label_input_passes_through() {
        let frontends = FrontEnds::default();
        let input = FrameInput::Label {
            label: "tiger".to_string(),
        };
        assert_eq!(frontends.recognize(&input).unwrap().label, "tiger");
    }

    #[test]
    fn test_missing_front_end_is_error() {
        let frontends = FrontEnds::default();
        let input = FrameInput::Hands { hands: vec![] };
        assert_eq!(
            frontends.recognize(&input),
            Err(FrameError::MissingFrontEnd("classifier"))
        );
    }

    #[test]
    fn test_hands_classified_against_recorded_shape() {
        let hand = open_hand(Handedness::Right);
        let classifier = KnnClassifier::new(
            vec![TrainingExample {
                features: build_feature_vector(std::slice::from_ref(&hand)),
                label: "boar".to_string(),
            }],
            3,
            1.8,
        );
        let frontends = FrontEnds::new(None, Some(classifier));
        let recognition = frontends
            .recognize(&FrameInput::Hands { hands: vec![hand] })
            .unwrap();
        assert_eq!(recognition.label, "boar");
        assert_eq!(recognition.confidence, 1.0);
    }

    #[test]
    fn test_corrupted_hand_reads_as_idle() {
        let hand = open_hand(Handedness::Left);
        let classifier = KnnClassifier::new(
            vec![TrainingExample {
                features: build_feature_vector(std::slice::from_ref(&hand)),
                label: "tiger".to_string(),
            }],
            3,
            1.8,
        );
        let frontends = FrontEnds::new(None, Some(classifier));

        let mut corrupted = hand;
        corrupted.points[0] = Point3::new(f32::NAN, 0.5, 0.0);
        let recognition = frontends
            .recognize(&FrameInput::Hands {
                hands: vec![corrupted],
            })
            .unwrap();
        assert!(recognition.is_idle());
    }

    #[test]
    fn test_bad_tensor_reports_decode_error() {
        let detector = SignDetector::new(vec!["ox".to_string()], 0.5, 0.45);
        let frontends = FrontEnds::new(Some(detector), None);
        let input = FrameInput::Tensor {
            tensor: vec![0.0; 7],
            num_anchors: 2,
            width: 640.0,
            height: 480.0,
        };
        assert!(matches!(
            frontends.recognize(&input),
            Err(FrameError::Decode(DecodeError::InvalidInputShape { .. }))
        ));
    }

    #[test]
    fn test_frame_input_from_yaml() {
        let label: FrameInput = serde_yaml::from_str("label: ram").unwrap();
        assert_eq!(
            label,
            FrameInput::Label {
                label: "ram".to_string()
            }
        );

        let tensor: FrameInput =
            serde_yaml::from_str("tensor: [0.5, 0.5, 0.1, 0.1, 0.9]\nnum_anchors: 1\nwidth: 640\nheight: 480")
                .unwrap();
        assert!(matches!(tensor, FrameInput::Tensor { num_anchors: 1, .. }));
    }
}
