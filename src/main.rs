// src/main.rs

use anyhow::{Context, Result};
use jutsu_recognition::classifier::{parse_reference_set, KnnClassifier};
use jutsu_recognition::jutsu_registry::JutsuRegistry;
use jutsu_recognition::pipeline::{FrontEnds, JutsuSession, MetricsSummary, PipelineEvent};
use jutsu_recognition::replay::{ReplayProcessor, Trace};
use jutsu_recognition::sign_detection::SignDetector;
use jutsu_recognition::types::Config;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Serialize)]
struct TraceSummary {
    trace: String,
    jutsu: String,
    completed: bool,
    steps_confirmed: usize,
    total_steps: usize,
    elapsed_ms: Option<f64>,
    metrics: MetricsSummary,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = if Path::new(&config_path).exists() {
        Config::load(&config_path)?
    } else {
        Config::default()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🥷 Jutsu replay starting");
    if !Path::new(&config_path).exists() {
        warn!("{} not found, using built-in defaults", config_path);
    }
    info!(
        "Thresholds: confidence={:.2}, iou={:.2}, k={}, rejection={:.2}, confirm={:.0}ms",
        config.detection.confidence_threshold,
        config.detection.iou_threshold,
        config.classifier.k,
        config.classifier.rejection_distance,
        config.sequence.confirm_delay_ms
    );

    let registry = JutsuRegistry::with_overrides(&config.jutsus);
    info!(
        "✓ Jutsu registry: {}",
        registry.names().collect::<Vec<_>>().join(", ")
    );

    let frontends = Arc::new(build_frontends(&config)?);

    let processor = ReplayProcessor::new(config.replay.clone());
    let trace_files = processor.find_trace_files()?;
    if trace_files.is_empty() {
        error!("No trace files found in {}", config.replay.input_dir);
        return Ok(());
    }

    for (idx, path) in trace_files.iter().enumerate() {
        info!("========================================");
        info!(
            "Replaying trace {}/{}: {}",
            idx + 1,
            trace_files.len(),
            path.display()
        );

        let trace = match processor.load_trace(path) {
            Ok(trace) => trace,
            Err(e) => {
                error!("Skipping trace: {:#}", e);
                continue;
            }
        };

        match replay_trace(path, &trace, &registry, &frontends, &config, &processor).await {
            Ok(summary) => {
                if summary.completed {
                    info!(
                        "✅ {} cast in {:.0} ms",
                        summary.jutsu,
                        summary.elapsed_ms.unwrap_or(0.0)
                    );
                } else {
                    info!(
                        "⚠️  {} incomplete: {}/{} signs",
                        summary.jutsu, summary.steps_confirmed, summary.total_steps
                    );
                }
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Err(e) => error!("Failed to replay trace: {:#}", e),
        }
    }

    Ok(())
}

fn build_frontends(config: &Config) -> Result<FrontEnds> {
    let detector = SignDetector::from_config(&config.detection);
    info!(
        "✓ Sign detector ready ({} classes)",
        detector.num_classes()
    );

    let classifier = match &config.classifier.reference_set {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read reference set {}", path))?;
            let examples = parse_reference_set(&text)
                .with_context(|| format!("Invalid reference set {}", path))?;
            Some(KnnClassifier::from_config(examples, &config.classifier))
        }
        None => {
            info!("⚪ No reference set configured, landmark frames will be rejected");
            None
        }
    };

    Ok(FrontEnds::new(Some(detector), classifier))
}

async fn replay_trace(
    path: &Path,
    trace: &Trace,
    registry: &JutsuRegistry,
    frontends: &Arc<FrontEnds>,
    config: &Config,
    processor: &ReplayProcessor,
) -> Result<TraceSummary> {
    let jutsu = registry
        .get(&trace.jutsu)
        .with_context(|| format!("Unknown jutsu '{}'", trace.jutsu))?
        .clone();
    let total_steps = jutsu.sequence.len();

    let mut session = JutsuSession::new(jutsu, config.sequence.confirm_delay_ms);
    let mut elapsed_ms = None;

    for frame in trace.timeline(processor.frame_interval_ms()) {
        let Some(ticket) = session.begin_frame(frame.timestamp_ms) else {
            continue;
        };

        // Inference runs off the loop; only the loop touches the session
        let worker = Arc::clone(frontends);
        let input = frame.input;
        let started = Instant::now();
        let joined = tokio::task::spawn_blocking(move || worker.recognize(&input)).await;

        match joined {
            Ok(result) => {
                let metrics = session.metrics();
                metrics.set_timing(
                    &metrics.last_inference_us,
                    started.elapsed().as_micros() as u64,
                );
                session.finish_frame(ticket, result);
            }
            Err(e) => {
                error!("Inference task failed: {}", e);
                session.abandon_frame(ticket);
            }
        }

        for event in session.drain_events() {
            if let PipelineEvent::JutsuCompleted { elapsed_ms: ms, .. } = &event {
                elapsed_ms = Some(*ms);
            }
            log_event(&event);
        }
    }

    let completed = session.is_complete();
    let steps_confirmed = session.current_step();
    session.end();
    session.drain_events();

    Ok(TraceSummary {
        trace: path.display().to_string(),
        jutsu: session.jutsu().name.clone(),
        completed,
        steps_confirmed,
        total_steps,
        elapsed_ms,
        metrics: session.metrics().summary(),
    })
}

fn log_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::StepAdvanced {
            step,
            total_steps,
            label,
            timestamp_ms,
            ..
        } => info!(
            "  ✋ {} ({}/{}) at {:.0} ms",
            label, step, total_steps, timestamp_ms
        ),
        PipelineEvent::JutsuCompleted {
            jutsu,
            display_text,
            effect,
            ..
        } => info!(
            "  🔥 {}: {} [effect: {}]",
            jutsu,
            display_text,
            effect.as_deref().unwrap_or("none")
        ),
        PipelineEvent::SequenceReset { jutsu } => info!("  ↺ {} reset", jutsu),
        PipelineEvent::JutsuSwitched { from, to } => info!("  ⇄ {} → {}", from, to),
        PipelineEvent::SessionEnded { jutsu } => info!("  ■ {} session ended", jutsu),
    }
}
