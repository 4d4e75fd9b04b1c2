// src/config.rs

use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

/// Semantic problems in an otherwise well-formed config file
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    ZeroNeighbours,
    ThresholdOutOfRange { name: &'static str, value: f32 },
    NegativeDelay(f64),
    EmptyLabelTable,
    EmptySequence(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroNeighbours => write!(f, "classifier.k must be at least 1"),
            Self::ThresholdOutOfRange { name, value } => {
                write!(f, "{} must be within [0, 1], got {}", name, value)
            }
            Self::NegativeDelay(ms) => {
                write!(f, "sequence.confirm_delay_ms must not be negative, got {}", ms)
            }
            Self::EmptyLabelTable => write!(f, "detection.labels must not be empty"),
            Self::EmptySequence(name) => write!(f, "jutsu '{}' has an empty sequence", name),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.classifier.k == 0 {
            return Err(ConfigError::ZeroNeighbours);
        }

        for (name, value) in [
            (
                "detection.confidence_threshold",
                self.detection.confidence_threshold,
            ),
            ("detection.iou_threshold", self.detection.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }

        if self.sequence.confirm_delay_ms < 0.0 {
            return Err(ConfigError::NegativeDelay(self.sequence.confirm_delay_ms));
        }

        if self.detection.labels.is_empty() {
            return Err(ConfigError::EmptyLabelTable);
        }

        if let Some(jutsu) = self.jutsus.iter().find(|j| j.sequence.is_empty()) {
            return Err(ConfigError::EmptySequence(jutsu.name.clone()));
        }

        Ok(())
    }
}
