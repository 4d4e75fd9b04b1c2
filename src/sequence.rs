// src/sequence.rs
//
// Debounced matcher that walks an ordered hand-sign sequence.
//
// A step is confirmed only after the expected sign has been reported
// without interruption for `confirm_delay_ms`. Any change of the
// reported label restarts the hold timer, whether the new label is
// right or wrong.

use crate::types::IDLE_LABEL;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SequenceState {
    AwaitingStep(usize),
    Complete,
}

/// Mutable progress of one run through a sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceMatchState {
    pub current_step: usize,
    pub held_label: String,
    pub held_since_ms: Option<f64>,
}

impl Default for SequenceMatchState {
    fn default() -> Self {
        Self {
            current_step: 0,
            held_label: IDLE_LABEL.to_string(),
            held_since_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SequenceEvent {
    StepAdvanced {
        /// Steps confirmed so far, including this one
        step: usize,
        label: String,
        timestamp_ms: f64,
    },
    Completed {
        /// From the start of the first confirmed hold to completion
        elapsed_ms: f64,
        timestamp_ms: f64,
    },
    Reset,
}

pub struct SequenceMatcher {
    definition: Vec<String>,
    confirm_delay_ms: f64,
    state: SequenceMatchState,
    run_started_ms: Option<f64>,
}

impl SequenceMatcher {
    pub fn new(definition: Vec<String>, confirm_delay_ms: f64) -> Self {
        Self {
            definition,
            confirm_delay_ms,
            state: SequenceMatchState::default(),
            run_started_ms: None,
        }
    }

    pub fn definition(&self) -> &[String] {
        &self.definition
    }

    pub fn state(&self) -> SequenceState {
        if self.is_complete() {
            SequenceState::Complete
        } else {
            SequenceState::AwaitingStep(self.state.current_step)
        }
    }

    pub fn match_state(&self) -> &SequenceMatchState {
        &self.state
    }

    pub fn current_step(&self) -> usize {
        self.state.current_step
    }

    pub fn is_complete(&self) -> bool {
        self.state.current_step >= self.definition.len()
    }

    /// The sign the user should show next, if any
    pub fn expected(&self) -> Option<&str> {
        self.definition
            .get(self.state.current_step)
            .map(String::as_str)
    }

    /// Feed one frame's label. Returns the event this frame produced, if any.
    ///
    /// Completion emits `Completed` (the final `StepAdvanced` is folded into it).
    pub fn update(&mut self, label: &str, timestamp_ms: f64) -> Option<SequenceEvent> {
        let expected = self.expected()?.to_string();

        let same_as_held = label.eq_ignore_ascii_case(&self.state.held_label);
        let went_backwards = self
            .state
            .held_since_ms
            .is_some_and(|since| timestamp_ms < since);

        if !same_as_held || went_backwards {
            if went_backwards {
                debug!(
                    "Timestamp {:.1} precedes hold start, restarting hold",
                    timestamp_ms
                );
            }
            self.start_hold(label, timestamp_ms);
            return None;
        }

        if !label.eq_ignore_ascii_case(&expected) {
            return None;
        }

        // Expected sign equals the resting label, which carries no timer yet
        let Some(since) = self.state.held_since_ms else {
            self.start_hold(label, timestamp_ms);
            return None;
        };
        if timestamp_ms - since < self.confirm_delay_ms {
            return None;
        }

        Some(self.advance(expected, since, timestamp_ms))
    }

    /// Back to the first step with no hold in progress
    pub fn reset(&mut self) -> SequenceEvent {
        self.state = SequenceMatchState::default();
        self.run_started_ms = None;
        info!("Sequence reset");
        SequenceEvent::Reset
    }

    fn start_hold(&mut self, label: &str, timestamp_ms: f64) {
        self.state.held_label = label.to_string();
        self.state.held_since_ms = Some(timestamp_ms);
    }

    fn advance(&mut self, label: String, hold_started_ms: f64, timestamp_ms: f64) -> SequenceEvent {
        if self.state.current_step == 0 {
            self.run_started_ms = Some(hold_started_ms);
        }

        self.state.current_step += 1;
        self.state.held_label = IDLE_LABEL.to_string();
        self.state.held_since_ms = None;

        let step = self.state.current_step;
        if self.is_complete() {
            let elapsed_ms = timestamp_ms - self.run_started_ms.unwrap_or(hold_started_ms);
            info!(
                "✅ Sequence complete: {} signs in {:.0} ms",
                step, elapsed_ms
            );
            SequenceEvent::Completed {
                elapsed_ms,
                timestamp_ms,
            }
        } else {
            info!(
                "✓ Step {}/{} confirmed: {}",
                step,
                self.definition.len(),
                label
            );
            SequenceEvent::StepAdvanced {
                step,
                label,
                timestamp_ms,
            }
        }
    }
}
