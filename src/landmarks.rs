// src/landmarks.rs
//
// Position/scale normalization of hand landmarks and the two-slot
// feature layout the classifier consumes.

use crate::types::{LandmarkSet, Point3, FEATURE_LEN, HAND_FEATURES};
use tracing::debug;

const WRIST: usize = 0;
const MIDDLE_FINGER_BASE: usize = 9;

/// Below this wrist→middle-base distance the hand is treated as collapsed
const MIN_REFERENCE_SCALE: f32 = 1e-4;

/// Translate to the wrist and divide by the wrist→middle-base length.
///
/// Output is `3 * points.len()` scalars in landmark order. Rotation is
/// left untouched. Empty input gives empty output.
pub fn normalize_hand(points: &[Point3]) -> Vec<f32> {
    let Some(wrist) = points.get(WRIST).copied() else {
        return Vec::new();
    };

    let mut scale = points
        .get(MIDDLE_FINGER_BASE)
        .map(|base| wrist.distance(base))
        .unwrap_or(0.0);
    if !scale.is_finite() || scale < MIN_REFERENCE_SCALE {
        scale = 1.0;
    }

    let mut out = Vec::with_capacity(points.len() * 3);
    for p in points {
        out.push((p.x - wrist.x) / scale);
        out.push((p.y - wrist.y) / scale);
        out.push((p.z - wrist.z) / scale);
    }
    out
}

/// Build the 126-wide vector: Left hand in slot 0, Right hand in slot 1.
///
/// Absent hands stay zero. If two hands report the same handedness the
/// later one wins, matching how the landmark detector's list is consumed.
pub fn build_feature_vector(hands: &[LandmarkSet]) -> Vec<f32> {
    let mut features = vec![0.0f32; FEATURE_LEN];

    for hand in hands {
        let normalized = normalize_hand(&hand.points);
        let offset = hand.handedness.slot_offset();
        let n = normalized.len().min(HAND_FEATURES);
        if normalized.len() > HAND_FEATURES {
            debug!(
                "Hand has {} landmarks, truncating to slot width",
                hand.points.len()
            );
        }
        features[offset..offset + n].copy_from_slice(&normalized[..n]);
    }

    features
}
