// src/lib.rs
//
// Hand-sign recognition core.
//
// Signal flow:
//   detector tensor → sign_detection ──────────┐
//   hand landmarks  → landmarks → classifier ──┼→ Recognition → sequence → PipelineEvent
//
// pipeline::JutsuSession owns the per-attempt state and guards it against
// overlapping or stale inference results.

pub mod classifier;
pub mod config;
pub mod geometry;
pub mod jutsu_registry;
pub mod landmarks;
pub mod pipeline;
pub mod replay;
pub mod sequence;
pub mod sign_detection;
pub mod types;

pub use classifier::{parse_reference_set, KnnClassifier, Prediction, TrainingExample};
pub use config::ConfigError;
pub use geometry::BBox;
pub use jutsu_registry::{JutsuDefinition, JutsuRegistry};
pub use landmarks::{build_feature_vector, normalize_hand};
pub use pipeline::{FrameInput, FrontEnds, JutsuSession, PipelineEvent};
pub use sequence::{SequenceEvent, SequenceMatchState, SequenceMatcher, SequenceState};
pub use sign_detection::{DecodeError, DetectionCandidate, SignDetector};
pub use types::{
    Config, DetectedObject, Handedness, LandmarkSet, Point3, Recognition, IDLE_LABEL,
    UNKNOWN_LABEL,
};
