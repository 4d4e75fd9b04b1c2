// src/pipeline/event_bus.rs
//
// Outbound events for the surrounding application (sound, visual
// effect, leaderboard submission). The session publishes; the caller
// drains once per frame.

use crate::sequence::SequenceEvent;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PipelineEvent {
    StepAdvanced {
        jutsu: String,
        step: usize,
        total_steps: usize,
        label: String,
        timestamp_ms: f64,
    },

    JutsuCompleted {
        jutsu: String,
        display_text: String,
        effect: Option<String>,
        elapsed_ms: f64,
        timestamp_ms: f64,
    },

    SequenceReset {
        jutsu: String,
    },

    JutsuSwitched {
        from: String,
        to: String,
    },

    SessionEnded {
        jutsu: String,
    },
}

impl PipelineEvent {
    /// Lift a matcher event into the jutsu it belongs to
    pub fn from_sequence(
        event: SequenceEvent,
        jutsu: &crate::jutsu_registry::JutsuDefinition,
    ) -> Self {
        match event {
            SequenceEvent::StepAdvanced {
                step,
                label,
                timestamp_ms,
            } => PipelineEvent::StepAdvanced {
                jutsu: jutsu.name.clone(),
                step,
                total_steps: jutsu.sequence.len(),
                label,
                timestamp_ms,
            },
            SequenceEvent::Completed {
                elapsed_ms,
                timestamp_ms,
            } => PipelineEvent::JutsuCompleted {
                jutsu: jutsu.name.clone(),
                display_text: jutsu.display_text.clone(),
                effect: jutsu.effect.clone(),
                elapsed_ms,
                timestamp_ms,
            },
            SequenceEvent::Reset => PipelineEvent::SequenceReset {
                jutsu: jutsu.name.clone(),
            },
        }
    }
}

pub struct EventBus {
    events: VecDeque<PipelineEvent>,
    max_pending: usize,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending: max_pending.max(1),
        }
    }

    pub fn publish(&mut self, event: PipelineEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<PipelineEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }
}
