// src/sign_detection.rs
//
// Post-processing for the single-shot hand-sign detector.
//
// Raw head output is channel-major: [4 + C, A]
//   rows 0..4  → cx, cy, w, h (normalized to [0, 1])
//   rows 4..   → per-class confidence, one column per anchor

use crate::geometry::BBox;
use crate::types::{DetectedObject, DetectionConfig, Recognition};
use ndarray::ArrayView2;
use tracing::debug;

const BOX_CHANNELS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Tensor length does not match `(4 + classes) * anchors`
    InvalidInputShape { expected: usize, actual: usize },
    /// The label table is empty, so no class channels can exist
    NoClasses,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInputShape { expected, actual } => write!(
                f,
                "invalid detector output shape: expected {} values, got {}",
                expected, actual
            ),
            Self::NoClasses => write!(f, "detector label table is empty"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// An anchor that cleared the confidence threshold, before suppression
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionCandidate {
    pub bbox: BBox,
    pub class_index: usize,
    pub score: f32,
}

pub struct SignDetector {
    labels: Vec<String>,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl SignDetector {
    pub fn new(labels: Vec<String>, confidence_threshold: f32, iou_threshold: f32) -> Self {
        Self {
            labels,
            confidence_threshold,
            iou_threshold,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            config.labels.clone(),
            config.confidence_threshold,
            config.iou_threshold,
        )
    }

    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Decode one frame of detector output into suppressed, score-ordered objects
    pub fn detect(
        &self,
        output: &[f32],
        num_anchors: usize,
        image_width: f32,
        image_height: f32,
    ) -> Result<Vec<DetectedObject>, DecodeError> {
        let candidates = decode_candidates(
            output,
            self.num_classes(),
            num_anchors,
            image_width,
            image_height,
            self.confidence_threshold,
        )?;
        let before = candidates.len();

        let kept = nms(candidates, self.iou_threshold);
        debug!(
            "Decoded {} candidates, {} kept after NMS",
            before,
            kept.len()
        );

        Ok(kept
            .into_iter()
            .map(|c| DetectedObject {
                label: self.labels[c.class_index].clone(),
                score: c.score,
                bbox: c.bbox.corners(),
            })
            .collect())
    }

    /// The frame's sign: best surviving object, or Idle when nothing survived
    pub fn recognize(
        &self,
        output: &[f32],
        num_anchors: usize,
        image_width: f32,
        image_height: f32,
    ) -> Result<Recognition, DecodeError> {
        let objects = self.detect(output, num_anchors, image_width, image_height)?;
        Ok(top_recognition(&objects, self.confidence_threshold))
    }
}

/// Pick the highest-scoring object above `confidence_threshold`.
///
/// The decoder has already thresholded its own output; the filter here is for
/// object lists that come from elsewhere, such as a detector run outside this
/// crate or a recorded frame.
pub fn top_recognition(objects: &[DetectedObject], confidence_threshold: f32) -> Recognition {
    objects
        .iter()
        .filter(|o| o.score > confidence_threshold)
        .fold(None::<&DetectedObject>, |best, o| match best {
            Some(b) if b.score >= o.score => Some(b),
            _ => Some(o),
        })
        .map(|o| Recognition::new(o.label.clone(), o.score))
        .unwrap_or_else(Recognition::idle)
}

/// Per-anchor argmax over class channels, thresholded and scaled to pixels
pub fn decode_candidates(
    output: &[f32],
    num_classes: usize,
    num_anchors: usize,
    image_width: f32,
    image_height: f32,
    confidence_threshold: f32,
) -> Result<Vec<DetectionCandidate>, DecodeError> {
    if num_classes == 0 {
        return Err(DecodeError::NoClasses);
    }

    let channels = BOX_CHANNELS + num_classes;
    let expected = channels * num_anchors;
    if output.len() != expected {
        return Err(DecodeError::InvalidInputShape {
            expected,
            actual: output.len(),
        });
    }

    let view = ArrayView2::from_shape((channels, num_anchors), output).map_err(|_| {
        DecodeError::InvalidInputShape {
            expected,
            actual: output.len(),
        }
    })?;

    let mut candidates = Vec::new();

    for i in 0..num_anchors {
        let mut max_conf = f32::NEG_INFINITY;
        let mut best_class = 0;

        for c in 0..num_classes {
            let conf = view[[BOX_CHANNELS + c, i]];
            if conf > max_conf {
                max_conf = conf;
                best_class = c;
            }
        }

        if max_conf <= confidence_threshold {
            continue;
        }

        let cx = view[[0, i]] * image_width;
        let cy = view[[1, i]] * image_height;
        let w = view[[2, i]] * image_width;
        let h = view[[3, i]] * image_height;

        candidates.push(DetectionCandidate {
            bbox: BBox::from_center(cx, cy, w, h),
            class_index: best_class,
            score: max_conf,
        });
    }

    Ok(candidates)
}

/// Greedy non-maximum suppression.
///
/// Candidates are ordered by descending score; equal scores keep their
/// incoming (anchor) order. A candidate is dropped when its IoU with an
/// already kept box is strictly greater than `iou_threshold`.
pub fn nms(mut candidates: Vec<DetectionCandidate>, iou_threshold: f32) -> Vec<DetectionCandidate> {
    if candidates.is_empty() {
        return candidates;
    }

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<DetectionCandidate> = Vec::new();
    let mut remaining = candidates.into_iter();

    while let Some(current) = remaining.next() {
        let rest: Vec<DetectionCandidate> = remaining
            .filter(|c| current.bbox.iou(&c.bbox) <= iou_threshold)
            .collect();
        keep.push(current);
        remaining = rest.into_iter();
    }

    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pack anchors as (cx, cy, w, h, class scores) into channel-major layout
    fn make_tensor(anchors: &[([f32; 4], Vec<f32>)], num_classes: usize) -> Vec<f32> {
        let n = anchors.len();
        let mut out = vec![0.0; (4 + num_classes) * n];
        for (i, (b, scores)) in anchors.iter().enumerate() {
            for ch in 0..4 {
                out[ch * n + i] = b[ch];
            }
            for (c, s) in scores.iter().enumerate() {
                out[(4 + c) * n + i] = *s;
            }
        }
        out
    }

    fn labels() -> Vec<String> {
        vec!["tiger".to_string(), "snake".to_string()]
    }

    fn candidate(x: f32, y: f32, w: f32, h: f32, score: f32) -> DetectionCandidate {
        DetectionCandidate {
            bbox: BBox::new(x, y, w, h),
            class_index: 0,
            score,
        }
    }

    #[test]
    fn test_wrong_length_is_shape_error() {
        let detector = SignDetector::new(labels(), 0.5, 0.45);
        let result = detector.detect(&[0.0; 11], 2, 640.0, 480.0);
        assert_eq!(
            result,
            Err(DecodeError::InvalidInputShape {
                expected: 12,
                actual: 11
            })
        );
    }

    #[test]
    fn test_empty_label_table_rejected() {
        let detector = SignDetector::new(vec![], 0.5, 0.45);
        assert_eq!(
            detector.detect(&[], 0, 640.0, 480.0),
            Err(DecodeError::NoClasses)
        );
    }

    #[test]
    fn test_decode_scales_and_converts_to_corners() {
        let tensor = make_tensor(&[([0.5, 0.5, 0.25, 0.5], vec![0.1, 0.8])], 2);
        let detector = SignDetector::new(labels(), 0.5, 0.45);
        let objects = detector.detect(&tensor, 1, 640.0, 480.0).unwrap();

        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].label, "snake");
        assert_eq!(objects[0].score, 0.8);
        // w = 160, h = 240, center (320, 240)
        assert_eq!(objects[0].bbox, [240.0, 120.0, 400.0, 360.0]);
    }

    #[test]
    fn test_score_at_threshold_is_dropped() {
        let tensor = make_tensor(&[([0.5, 0.5, 0.2, 0.2], vec![0.5, 0.1])], 2);
        let detector = SignDetector::new(labels(), 0.5, 0.45);
        assert!(detector.detect(&tensor, 1, 100.0, 100.0).unwrap().is_empty());
    }

    #[test]
    fn test_overlapping_same_class_keeps_best() {
        // Same center and height; widths 100 and 90 give IoU 0.9
        let tensor = make_tensor(
            &[
                ([0.5, 0.5, 0.09, 0.1], vec![0.6, 0.0]),
                ([0.5, 0.5, 0.10, 0.1], vec![0.9, 0.0]),
            ],
            2,
        );
        let detector = SignDetector::new(labels(), 0.5, 0.45);
        let objects = detector.detect(&tensor, 2, 1000.0, 1000.0).unwrap();

        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].score, 0.9);
        assert_eq!(objects[0].label, "tiger");
    }

    #[test]
    fn test_disjoint_boxes_both_kept_in_score_order() {
        let tensor = make_tensor(
            &[
                ([0.2, 0.2, 0.1, 0.1], vec![0.7, 0.0]),
                ([0.8, 0.8, 0.1, 0.1], vec![0.0, 0.95]),
            ],
            2,
        );
        let detector = SignDetector::new(labels(), 0.5, 0.45);
        let objects = detector.detect(&tensor, 2, 100.0, 100.0).unwrap();

        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].label, "snake");
        assert_eq!(objects[1].label, "tiger");
    }

    #[test]
    fn test_decode_is_deterministic() {
        let tensor = make_tensor(
            &[
                ([0.3, 0.3, 0.2, 0.2], vec![0.7, 0.2]),
                ([0.31, 0.3, 0.2, 0.2], vec![0.7, 0.1]),
                ([0.7, 0.6, 0.1, 0.3], vec![0.2, 0.65]),
            ],
            2,
        );
        let detector = SignDetector::new(labels(), 0.5, 0.45);
        let first = detector.detect(&tensor, 3, 640.0, 640.0).unwrap();
        let second = detector.detect(&tensor, 3, 640.0, 640.0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_nms_tie_keeps_lower_anchor_index() {
        let kept = nms(
            vec![
                candidate(0.0, 0.0, 10.0, 10.0, 0.8),
                candidate(1.0, 0.0, 10.0, 10.0, 0.8),
            ],
            0.45,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].bbox.x, 0.0);
    }

    #[test]
    fn test_nms_idempotent() {
        let input = vec![
            candidate(0.0, 0.0, 10.0, 10.0, 0.9),
            candidate(1.0, 1.0, 10.0, 10.0, 0.8),
            candidate(30.0, 30.0, 10.0, 10.0, 0.7),
            candidate(6.0, 6.0, 10.0, 10.0, 0.6),
            candidate(31.0, 30.0, 10.0, 10.0, 0.5),
        ];
        let once = nms(input, 0.45);
        let twice = nms(once.clone(), 0.45);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn test_nms_keeps_degenerate_boxes() {
        // Zero-area boxes never overlap anything
        let kept = nms(
            vec![
                candidate(5.0, 5.0, 0.0, 0.0, 0.9),
                candidate(5.0, 5.0, 0.0, 0.0, 0.8),
            ],
            0.45,
        );
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_top_recognition_idle_when_empty() {
        assert!(top_recognition(&[], 0.5).is_idle());
    }

    #[test]
    fn test_top_recognition_filters_external_objects() {
        let objects = vec![
            DetectedObject {
                label: "dog".to_string(),
                score: 0.3,
                bbox: [0.0, 0.0, 10.0, 10.0],
            },
            DetectedObject {
                label: "rat".to_string(),
                score: 0.6,
                bbox: [20.0, 20.0, 30.0, 30.0],
            },
        ];
        let recognition = top_recognition(&objects, 0.5);
        assert_eq!(recognition.label, "rat");
        assert!(top_recognition(&objects[..1], 0.5).is_idle());
    }

    #[test]
    fn test_recognize_picks_best_sign() {
        let tensor = make_tensor(
            &[
                ([0.2, 0.2, 0.1, 0.1], vec![0.7, 0.0]),
                ([0.8, 0.8, 0.1, 0.1], vec![0.0, 0.95]),
            ],
            2,
        );
        let detector = SignDetector::new(labels(), 0.5, 0.45);
        let recognition = detector.recognize(&tensor, 2, 100.0, 100.0).unwrap();
        assert_eq!(recognition, Recognition::new("snake", 0.95));
    }
}
