// src/types.rs

use serde::{Deserialize, Serialize};

/// Label fed to the sequence matcher when nothing usable was recognized.
pub const IDLE_LABEL: &str = "Idle";

/// Label returned by a classifier that has no reference data.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Landmarks per tracked hand.
pub const LANDMARKS_PER_HAND: usize = 21;

/// Scalars contributed by one hand slot (21 landmarks x 3 coordinates).
pub const HAND_FEATURES: usize = LANDMARKS_PER_HAND * 3;

/// Two hand slots, Left first, Right second.
pub const FEATURE_LEN: usize = HAND_FEATURES * 2;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub classifier: ClassifierConfig,
    pub sequence: SequenceConfig,
    pub replay: ReplayConfig,
    pub logging: LoggingConfig,
    /// Extra jutsu definitions merged over the built-in registry
    pub jutsus: Vec<crate::jutsu_registry::JutsuDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Class table of the sign detector, indexed by class id
    pub labels: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            labels: [
                "bird", "boar", "dog", "dragon", "hare", "horse", "monkey", "ox", "ram", "rat",
                "snake", "tiger", "clap",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub k: usize,
    /// Nearest-neighbour distance above which a hand shape counts as noise.
    /// Empirically tuned against normalized landmarks.
    pub rejection_distance: f32,
    /// CSV of recorded examples (label + 126 coordinates per row)
    pub reference_set: Option<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            k: 3,
            rejection_distance: 1.8,
            reference_set: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// How long the expected sign must be held before the step is confirmed
    pub confirm_delay_ms: f64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            confirm_delay_ms: 600.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub input_dir: String,
    /// Spacing used for frames whose trace entry has no explicit timestamp
    pub frame_interval_ms: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            input_dir: "traces".to_string(),
            frame_interval_ms: 16.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "jutsu_recognition=info,jutsu_replay=info".to_string(),
        }
    }
}

// ============================================================================
// FRAME DATA
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Point3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Offset of this hand's slot inside the two-hand feature vector
    pub fn slot_offset(&self) -> usize {
        match self {
            Handedness::Left => 0,
            Handedness::Right => HAND_FEATURES,
        }
    }
}

/// Landmarks of one detected hand, in normalized image coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    pub handedness: Handedness,
    pub points: Vec<Point3>,
}

/// One surviving detector output, box in corner form `[x1, y1, x2, y2]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedObject {
    pub label: String,
    pub score: f32,
    pub bbox: [f32; 4],
}

/// The per-frame output both front-ends agree on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recognition {
    pub label: String,
    pub confidence: f32,
}

impl Recognition {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    pub fn idle() -> Self {
        Self::new(IDLE_LABEL, 0.0)
    }

    pub fn is_idle(&self) -> bool {
        self.label.eq_ignore_ascii_case(IDLE_LABEL)
    }
}
