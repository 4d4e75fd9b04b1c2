// src/pipeline/mod.rs

pub mod event_bus;
pub mod frontend;
pub mod metrics;
pub mod session;

pub use event_bus::{EventBus, PipelineEvent};
pub use frontend::{FrameError, FrameInput, FrontEnds};
pub use metrics::{MetricsSummary, SessionMetrics};
pub use session::{FrameOutcome, FrameTicket, JutsuSession};
