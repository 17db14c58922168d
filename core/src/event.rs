//! The event log: notable transitions of a run.
//!
//! RULE: events describe what happened, never what will happen.
//! The log is part of the reproducibility contract: two runs with the
//! same parameters and seed must produce identical logs.

use crate::{
    snapshot::Phase,
    types::{PoleSide, RunId, Sister, Step},
};
use serde::{Deserialize, Serialize};

/// Every event emitted during simulation.
/// Variants are only ever appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Engine events ──────────────────────────────
    RunInitialized {
        seed: u64,
        initial_condition: String,
    },
    RunCompleted {
        step: Step,
        phase: Phase,
    },

    // ── Attachment events ──────────────────────────
    LinkAttached {
        step: Step,
        chromosome: usize,
        sister: Sister,
        pole: PoleSide,
    },
    LinkDetached {
        step: Step,
        chromosome: usize,
        sister: Sister,
        pole: PoleSide,
    },

    // ── Checkpoint events ──────────────────────────
    CheckpointSatisfied {
        step: Step,
    },
    CheckpointLost {
        step: Step,
    },
    AnaphaseOnset {
        step: Step,
        time: f64,
        /// Time elapsed past the earliest allowed onset.
        delay: f64,
        /// Merotelic links at the moment of onset.
        merotelic: usize,
    },

    // ── Laser ablation ─────────────────────────────
    AblationPerformed {
        step: Step,
        position: f64,
        detached: usize,
    },
    AblationMissed {
        step: Step,
        position: f64,
    },
}

impl SimEvent {
    /// Step the event belongs to. Setup events belong to step 0.
    pub fn step(&self) -> Step {
        match self {
            Self::RunInitialized { .. } => 0,
            Self::RunCompleted { step, .. }
            | Self::LinkAttached { step, .. }
            | Self::LinkDetached { step, .. }
            | Self::CheckpointSatisfied { step }
            | Self::CheckpointLost { step }
            | Self::AnaphaseOnset { step, .. }
            | Self::AblationPerformed { step, .. }
            | Self::AblationMissed { step, .. } => *step,
        }
    }
}

/// Extract a stable string name from a SimEvent variant.
/// Used for the event_type column in event_log.
pub fn event_type_name(event: &SimEvent) -> &'static str {
    match event {
        SimEvent::RunInitialized { .. }      => "run_initialized",
        SimEvent::RunCompleted { .. }        => "run_completed",
        SimEvent::LinkAttached { .. }        => "link_attached",
        SimEvent::LinkDetached { .. }        => "link_detached",
        SimEvent::CheckpointSatisfied { .. } => "checkpoint_satisfied",
        SimEvent::CheckpointLost { .. }      => "checkpoint_lost",
        SimEvent::AnaphaseOnset { .. }       => "anaphase_onset",
        SimEvent::AblationPerformed { .. }   => "ablation_performed",
        SimEvent::AblationMissed { .. }      => "ablation_missed",
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub run_id: RunId,
    pub step: Step,
    pub event_type: String,
    pub payload: String, // JSON-serialized SimEvent
}

impl EventLogEntry {
    pub fn new(run_id: &str, event: &SimEvent) -> serde_json::Result<Self> {
        Ok(Self {
            id:         None,
            run_id:     run_id.to_string(),
            step:       event.step(),
            event_type: event_type_name(event).to_string(),
            payload:    serde_json::to_string(event)?,
        })
    }

    pub fn decode(&self) -> serde_json::Result<SimEvent> {
        serde_json::from_str(&self.payload)
    }
}
