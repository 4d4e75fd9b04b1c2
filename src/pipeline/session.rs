// src/pipeline/session.rs
//
// One jutsu attempt driven by the frame loop.
//
// Frame lifecycle:
//   begin_frame()  → ticket (or None while a frame is still in flight)
//   <inference runs, possibly on another thread>
//   finish_frame() → applied to the matcher only if the ticket's
//                    generation is still current
//
// reset / switch_jutsu / end bump the generation, so anything that was
// in flight at that moment is discarded when it comes back.

use super::event_bus::{EventBus, PipelineEvent};
use super::metrics::SessionMetrics;
use crate::jutsu_registry::JutsuDefinition;
use crate::sequence::{SequenceEvent, SequenceMatcher, SequenceState};
use crate::types::Recognition;
use std::fmt::Display;
use tracing::{debug, info, warn};

const EVENT_BUS_CAPACITY: usize = 64;

/// Admission token for one frame's inference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTicket {
    pub frame_id: u64,
    pub generation: u64,
    pub timestamp_ms: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Result reached the matcher
    Applied(Option<SequenceEvent>),
    /// Session moved on while the frame was in flight
    Stale,
    /// Inference failed; matcher untouched
    Failed,
}

pub struct JutsuSession {
    jutsu: JutsuDefinition,
    matcher: SequenceMatcher,
    confirm_delay_ms: f64,
    generation: u64,
    next_frame_id: u64,
    in_flight: Option<u64>,
    ended: bool,
    events: EventBus,
    metrics: SessionMetrics,
}

impl JutsuSession {
    pub fn new(jutsu: JutsuDefinition, confirm_delay_ms: f64) -> Self {
        info!(
            "🥷 Session started: {} ({} signs)",
            jutsu.name,
            jutsu.sequence.len()
        );
        Self {
            matcher: SequenceMatcher::new(jutsu.sequence.clone(), confirm_delay_ms),
            jutsu,
            confirm_delay_ms,
            generation: 0,
            next_frame_id: 0,
            in_flight: None,
            ended: false,
            events: EventBus::new(EVENT_BUS_CAPACITY),
            metrics: SessionMetrics::new(),
        }
    }

    pub fn jutsu(&self) -> &JutsuDefinition {
        &self.jutsu
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> SequenceState {
        self.matcher.state()
    }

    pub fn current_step(&self) -> usize {
        self.matcher.current_step()
    }

    pub fn is_complete(&self) -> bool {
        self.matcher.is_complete()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn drain_events(&mut self) -> Vec<PipelineEvent> {
        self.events.drain()
    }

    /// Admit a new frame, or drop it if the previous one has not resolved
    pub fn begin_frame(&mut self, timestamp_ms: f64) -> Option<FrameTicket> {
        if self.ended {
            return None;
        }
        self.metrics.inc(&self.metrics.frames_seen);

        if let Some(frame_id) = self.in_flight {
            debug!(
                "Frame at {:.1} ms dropped, frame {} still in flight",
                timestamp_ms, frame_id
            );
            self.metrics.inc(&self.metrics.frames_dropped_busy);
            return None;
        }

        let ticket = FrameTicket {
            frame_id: self.next_frame_id,
            generation: self.generation,
            timestamp_ms,
        };
        self.next_frame_id += 1;
        self.in_flight = Some(ticket.frame_id);
        Some(ticket)
    }

    /// Apply a finished inference. Stale or failed results never touch the matcher.
    pub fn finish_frame<E: Display>(
        &mut self,
        ticket: FrameTicket,
        result: Result<Recognition, E>,
    ) -> FrameOutcome {
        if self.in_flight == Some(ticket.frame_id) {
            self.in_flight = None;
        }

        if ticket.generation != self.generation || self.ended {
            debug!(
                "Discarding frame {} from generation {} (current {})",
                ticket.frame_id, ticket.generation, self.generation
            );
            self.metrics.inc(&self.metrics.stale_results);
            return FrameOutcome::Stale;
        }

        let recognition = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Frame {} skipped: {}", ticket.frame_id, e);
                self.metrics.inc(&self.metrics.decode_failures);
                return FrameOutcome::Failed;
            }
        };

        self.metrics.inc(&self.metrics.frames_applied);
        if recognition.is_idle() {
            self.metrics.inc(&self.metrics.idle_frames);
        }

        let event = self
            .matcher
            .update(&recognition.label, ticket.timestamp_ms);

        if let Some(event) = &event {
            match event {
                SequenceEvent::StepAdvanced { .. } => {
                    self.metrics.inc(&self.metrics.steps_advanced);
                }
                SequenceEvent::Completed { .. } => {
                    self.metrics.inc(&self.metrics.steps_advanced);
                    self.metrics.inc(&self.metrics.completions);
                }
                SequenceEvent::Reset => {}
            }
            self.events
                .publish(PipelineEvent::from_sequence(event.clone(), &self.jutsu));
        }

        FrameOutcome::Applied(event)
    }

    /// Give up on an in-flight frame whose result will never arrive
    pub fn abandon_frame(&mut self, ticket: FrameTicket) {
        if self.in_flight == Some(ticket.frame_id) {
            warn!("Frame {} abandoned", ticket.frame_id);
            self.in_flight = None;
        }
    }

    /// Restart the current jutsu from its first sign
    pub fn reset(&mut self) {
        self.generation += 1;
        let event = self.matcher.reset();
        self.metrics.inc(&self.metrics.resets);
        self.events
            .publish(PipelineEvent::from_sequence(event, &self.jutsu));
    }

    pub fn switch_jutsu(&mut self, jutsu: JutsuDefinition) {
        info!("Switching jutsu: {} → {}", self.jutsu.name, jutsu.name);
        self.generation += 1;
        self.events.publish(PipelineEvent::JutsuSwitched {
            from: self.jutsu.name.clone(),
            to: jutsu.name.clone(),
        });
        self.matcher = SequenceMatcher::new(jutsu.sequence.clone(), self.confirm_delay_ms);
        self.jutsu = jutsu;
    }

    /// Stop admitting frames; anything still in flight will be discarded
    pub fn end(&mut self) {
        if self.ended {
            return;
        }
        self.generation += 1;
        self.ended = true;
        info!("Session ended: {}", self.jutsu.name);
        self.events.publish(PipelineEvent::SessionEnded {
            jutsu: self.jutsu.name.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jutsu_registry::JutsuRegistry;

    fn session(name: &str) -> JutsuSession {
        let jutsu = JutsuRegistry::builtin().get(name).unwrap().clone();
        JutsuSession::new(jutsu, 600.0)
    }

    fn run_frame(s: &mut JutsuSession, label: &str, t: f64) -> FrameOutcome {
        let ticket = s.begin_frame(t).expect("session busy");
        s.finish_frame::<String>(ticket, Ok(Recognition::new(label, 0.9)))
    }

    fn hold(s: &mut JutsuSession, label: &str, start: f64, duration: f64) -> f64 {
        let mut t = start;
        while t <= start + duration {
            run_frame(s, label, t);
            t += 16.0;
        }
        t
    }

    #[test]
    fn test_busy_session_drops_frames() {
        let mut s = session("Rasengan");
        let first = s.begin_frame(0.0).unwrap();
        assert!(s.is_busy());
        assert!(s.begin_frame(16.0).is_none());
        assert!(s.begin_frame(32.0).is_none());

        s.finish_frame::<String>(first, Ok(Recognition::idle()));
        assert!(!s.is_busy());
        assert!(s.begin_frame(48.0).is_some());

        let summary = s.metrics().summary();
        assert_eq!(summary.frames_seen, 4);
        assert_eq!(summary.frames_dropped_busy, 2);
    }

    #[test]
    fn test_result_after_reset_is_stale() {
        let mut s = session("Rasengan");
        let start = s.begin_frame(0.0).unwrap();
        s.finish_frame::<String>(start, Ok(Recognition::new("ram", 0.9)));

        let ticket = s.begin_frame(700.0).unwrap();
        s.reset();
        // Would have confirmed "ram" had it been applied
        let outcome = s.finish_frame::<String>(ticket, Ok(Recognition::new("ram", 0.9)));

        assert_eq!(outcome, FrameOutcome::Stale);
        assert_eq!(s.current_step(), 0);
        assert!(!s.is_busy());
        assert_eq!(s.metrics().summary().stale_results, 1);
    }

    #[test]
    fn test_failed_frame_leaves_state_alone() {
        let mut s = session("Chidori");
        run_frame(&mut s, "ox", 0.0);
        let ticket = s.begin_frame(300.0).unwrap();
        let outcome = s.finish_frame(ticket, Err("bad tensor"));
        assert_eq!(outcome, FrameOutcome::Failed);

        // The ox hold started at 0 is still running
        assert!(matches!(
            run_frame(&mut s, "ox", 600.0),
            FrameOutcome::Applied(Some(SequenceEvent::StepAdvanced { step: 1, .. }))
        ));
    }

    #[test]
    fn test_completion_publishes_jutsu_event() {
        let mut s = session("Shadow Clone");
        let mut t = hold(&mut s, "Idle", 0.0, 50.0);
        for sign in ["ram", "snake", "tiger"] {
            t = hold(&mut s, sign, t, 650.0);
        }
        assert!(s.is_complete());
        assert_eq!(s.current_step(), 3);

        let events = s.drain_events();
        assert_eq!(events.len(), 3);
        match events.last().unwrap() {
            PipelineEvent::JutsuCompleted {
                jutsu,
                display_text,
                effect,
                ..
            } => {
                assert_eq!(jutsu, "Shadow Clone");
                assert_eq!(display_text, "Kage Bunshin no Jutsu!");
                assert_eq!(effect.as_deref(), Some("clone"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(s.metrics().summary().completions, 1);
    }

    #[test]
    fn test_switch_jutsu_restarts_progress() {
        let mut s = session("Chidori");
        hold(&mut s, "ox", 0.0, 650.0);
        assert_eq!(s.current_step(), 1);

        let in_flight = s.begin_frame(700.0).unwrap();
        let rasengan = JutsuRegistry::builtin().get("Rasengan").unwrap().clone();
        s.switch_jutsu(rasengan);

        assert_eq!(s.current_step(), 0);
        assert_eq!(s.jutsu().name, "Rasengan");
        assert_eq!(
            s.finish_frame::<String>(in_flight, Ok(Recognition::new("hare", 0.9))),
            FrameOutcome::Stale
        );
    }

    #[test]
    fn test_ended_session_admits_nothing() {
        let mut s = session("Rasengan");
        let ticket = s.begin_frame(0.0).unwrap();
        s.end();
        assert!(s.begin_frame(16.0).is_none());
        assert_eq!(
            s.finish_frame::<String>(ticket, Ok(Recognition::new("ram", 1.0))),
            FrameOutcome::Stale
        );
        assert!(matches!(
            s.drain_events().last(),
            Some(PipelineEvent::SessionEnded { .. })
        ));
    }

    #[test]
    fn test_abandoned_frame_frees_session() {
        let mut s = session("Rasengan");
        let ticket = s.begin_frame(0.0).unwrap();
        s.abandon_frame(ticket);
        assert!(!s.is_busy());
        assert!(s.begin_frame(16.0).is_some());
    }
}
