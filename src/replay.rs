// src/replay.rs
//
// Recorded frame traces for offline runs of the recognition pipeline.

use crate::pipeline::FrameInput;
use crate::types::ReplayConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

#[derive(Debug, Clone, Deserialize)]
pub struct Trace {
    /// Registry name of the jutsu being attempted
    pub jutsu: String,
    pub frames: Vec<TraceFrame>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraceFrame {
    /// Frame timestamp; missing entries continue at the configured frame interval
    #[serde(default)]
    pub t_ms: Option<f64>,
    /// Repeat this frame's input for this many consecutive frames
    #[serde(default = "default_repeat")]
    pub repeat: usize,
    #[serde(flatten)]
    pub input: FrameInput,
}

fn default_repeat() -> usize {
    1
}

/// A trace frame expanded to its concrete timestamp
#[derive(Debug, Clone)]
pub struct TimedInput {
    pub timestamp_ms: f64,
    pub input: FrameInput,
}

impl Trace {
    pub fn from_yaml(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Unroll repeats and fill missing timestamps
    pub fn timeline(&self, frame_interval_ms: f64) -> Vec<TimedInput> {
        let mut out = Vec::new();
        let mut next_ms = 0.0;

        for frame in &self.frames {
            let mut t = frame.t_ms.unwrap_or(next_ms);
            for _ in 0..frame.repeat {
                out.push(TimedInput {
                    timestamp_ms: t,
                    input: frame.input.clone(),
                });
                t += frame_interval_ms;
            }
            next_ms = t;
        }

        out
    }
}

pub struct ReplayProcessor {
    config: ReplayConfig,
}

impl ReplayProcessor {
    pub fn new(config: ReplayConfig) -> Self {
        Self { config }
    }

    pub fn frame_interval_ms(&self) -> f64 {
        self.config.frame_interval_ms
    }

    pub fn find_trace_files(&self) -> Result<Vec<PathBuf>> {
        let mut traces = Vec::new();
        let trace_extensions = ["yaml", "yml", "YAML", "YML"];

        for entry in WalkDir::new(&self.config.input_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if trace_extensions.contains(&ext) {
                    traces.push(path.to_path_buf());
                }
            }
        }

        traces.sort();
        info!("Found {} trace files", traces.len());
        Ok(traces)
    }

    pub fn load_trace(&self, path: &Path) -> Result<Trace> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read trace {}", path.display()))?;
        let trace = Trace::from_yaml(&contents)
            .with_context(|| format!("Invalid trace {}", path.display()))?;
        info!(
            "Loaded trace {}: {} ({} entries)",
            path.display(),
            trace.jutsu,
            trace.frames.len()
        );
        Ok(trace)
    }
}
