// src/classifier.rs
//
// k-nearest-neighbour sign classifier over two-hand feature vectors.

use crate::geometry::euclidean_distance;
use crate::landmarks::build_feature_vector;
use crate::types::{ClassifierConfig, LandmarkSet, Recognition, IDLE_LABEL, UNKNOWN_LABEL};
use std::collections::BTreeSet;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub features: Vec<f32>,
    pub label: String,
}

/// Outcome of one classification, before it is collapsed to a label
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    /// Empty input or no reference data
    NoReference,
    /// Nearest example is too far away to trust the vote
    Rejected { nearest_distance: f32 },
    Matched {
        label: String,
        nearest_distance: f32,
        votes: usize,
        neighbours: usize,
    },
}

impl Prediction {
    pub fn label(&self) -> &str {
        match self {
            Prediction::NoReference => UNKNOWN_LABEL,
            Prediction::Rejected { .. } => IDLE_LABEL,
            Prediction::Matched { label, .. } => label,
        }
    }

    /// Share of the k neighbours that voted for the winner; 0 when not matched
    pub fn confidence(&self) -> f32 {
        match self {
            Prediction::Matched {
                votes, neighbours, ..
            } if *neighbours > 0 => *votes as f32 / *neighbours as f32,
            _ => 0.0,
        }
    }
}

/// Borrowing form of `Prediction`, shared by `predict` and `classify`
enum Vote<'a> {
    NoReference,
    Rejected {
        nearest_distance: f32,
    },
    Matched {
        label: &'a str,
        nearest_distance: f32,
        votes: usize,
        neighbours: usize,
    },
}

pub struct KnnClassifier {
    examples: Vec<TrainingExample>,
    k: usize,
    rejection_distance: f32,
    labels: Vec<String>,
}

impl KnnClassifier {
    pub fn new(examples: Vec<TrainingExample>, k: usize, rejection_distance: f32) -> Self {
        let labels: Vec<String> = examples
            .iter()
            .map(|e| e.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let widths: BTreeSet<usize> = examples.iter().map(|e| e.features.len()).collect();
        if widths.len() > 1 {
            // Distances then only cover the shared prefix of each pair
            warn!(
                "Reference set mixes feature widths {:?}; comparisons will be truncated",
                widths
            );
        }

        info!(
            "KNN classifier ready: {} examples, {} labels, k={}",
            examples.len(),
            labels.len(),
            k
        );

        Self {
            examples,
            k: k.max(1),
            rejection_distance,
            labels,
        }
    }

    pub fn from_config(examples: Vec<TrainingExample>, config: &ClassifierConfig) -> Self {
        Self::new(examples, config.k, config.rejection_distance)
    }

    /// Sorted distinct labels in the reference set
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn predict(&self, features: &[f32]) -> &str {
        match self.vote(features) {
            Vote::NoReference => UNKNOWN_LABEL,
            Vote::Rejected { .. } => IDLE_LABEL,
            Vote::Matched { label, .. } => label,
        }
    }

    pub fn classify(&self, features: &[f32]) -> Prediction {
        match self.vote(features) {
            Vote::NoReference => Prediction::NoReference,
            Vote::Rejected { nearest_distance } => Prediction::Rejected { nearest_distance },
            Vote::Matched {
                label,
                nearest_distance,
                votes,
                neighbours,
            } => Prediction::Matched {
                label: label.to_string(),
                nearest_distance,
                votes,
                neighbours,
            },
        }
    }

    /// Classify the hands seen in one frame. No hands reads as Idle.
    pub fn recognize(&self, hands: &[LandmarkSet]) -> Recognition {
        if hands.is_empty() {
            return Recognition::idle();
        }
        let prediction = self.classify(&build_feature_vector(hands));
        Recognition::new(prediction.label(), prediction.confidence())
    }

    fn vote(&self, features: &[f32]) -> Vote<'_> {
        if features.is_empty() || self.examples.is_empty() {
            return Vote::NoReference;
        }

        let ranked = self.rank(features);
        // Non-finite distances were dropped while ranking; nothing left means noise
        let Some(&(nearest_distance, _)) = ranked.first() else {
            return Vote::Rejected {
                nearest_distance: f32::NAN,
            };
        };
        if nearest_distance > self.rejection_distance {
            return Vote::Rejected { nearest_distance };
        }

        let (label, votes) = majority_vote(ranked.iter().map(|&(_, e)| e.label.as_str()));
        Vote::Matched {
            label,
            nearest_distance,
            votes,
            neighbours: ranked.len(),
        }
    }

    /// The k nearest examples, closest first. Equal distances keep insertion order;
    /// examples at a non-finite distance never take part.
    fn rank(&self, features: &[f32]) -> Vec<(f32, &TrainingExample)> {
        let mut scored: Vec<(f32, &TrainingExample)> = self
            .examples
            .iter()
            .map(|e| (euclidean_distance(features, &e.features), e))
            .filter(|(d, _)| d.is_finite())
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(self.k);
        scored
    }
}

/// Most frequent label; a later label only takes the lead on a strictly
/// higher count, so ties go to whichever reached the count first.
fn majority_vote<'a>(labels: impl Iterator<Item = &'a str>) -> (&'a str, usize) {
    let mut tally: Vec<(&str, usize)> = Vec::new();
    let mut leader: (&str, usize) = ("", 0);

    for label in labels {
        let count = match tally.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => {
                entry.1 += 1;
                entry.1
            }
            None => {
                tally.push((label, 1));
                1
            }
        };
        if count > leader.1 {
            leader = (label, count);
        }
    }

    leader
}

// ============================================================================
// REFERENCE SET
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceSetError {
    MissingLabel { line: usize },
    NoFeatures { line: usize },
    BadValue { line: usize, column: usize, value: String },
}

impl std::fmt::Display for ReferenceSetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingLabel { line } => write!(f, "line {}: missing label", line),
            Self::NoFeatures { line } => write!(f, "line {}: row has no feature values", line),
            Self::BadValue {
                line,
                column,
                value,
            } => write!(
                f,
                "line {}: column {} is not a number: '{}'",
                line, column, value
            ),
        }
    }
}

impl std::error::Error for ReferenceSetError {}

/// Parse recorded examples: `label,v0,v1,...` per row.
///
/// A leading `label,...` header, blank lines and `#` comments are skipped.
pub fn parse_reference_set(text: &str) -> Result<Vec<TrainingExample>, ReferenceSetError> {
    let mut examples = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split(',');
        let label = parts.next().unwrap_or("").trim();
        if label.eq_ignore_ascii_case("label") {
            continue;
        }
        if label.is_empty() {
            return Err(ReferenceSetError::MissingLabel { line });
        }

        let mut features = Vec::new();
        for (column, value) in parts.enumerate() {
            let value = value.trim();
            let parsed = value
                .parse::<f32>()
                .map_err(|_| ReferenceSetError::BadValue {
                    line,
                    column: column + 2,
                    value: value.to_string(),
                })?;
            features.push(parsed);
        }
        if features.is_empty() {
            return Err(ReferenceSetError::NoFeatures { line });
        }

        examples.push(TrainingExample {
            features,
            label: label.to_string(),
        });
    }

    Ok(examples)
}
