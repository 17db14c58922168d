use thiserror::Error;

use crate::types::Step;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing parameter '{name}'")]
    MissingParameter { name: String },

    #[error("Invalid parameter '{name}' = {value}: {reason}")]
    InvalidParameter {
        name: String,
        value: f64,
        reason: String,
    },

    #[error("Unknown initial condition '{name}' (expected one of: {expected})")]
    UnknownInitialCondition { name: String, expected: String },

    #[error(
        "Numerically unstable time step: dt = {dt} but {body} needs dt <= {max_dt} \
         (stiffness {stiffness}, drag {drag})"
    )]
    NumericalInstability {
        body: String,
        dt: f64,
        max_dt: f64,
        stiffness: f64,
        drag: f64,
    },

    #[error("Inconsistent attachment state on chromosome {chromosome} at step {step}: {detail}")]
    InconsistentAttachment {
        chromosome: usize,
        step: Step,
        detail: String,
    },

    #[error("Position of {body} became non-finite at step {step}")]
    NonFiniteState { body: String, step: Step },

    #[error("A simulation has already been run on this engine; build a new one")]
    SimulationAlreadyDone,

    #[error("The run was aborted by a failure at step {step}; build a new engine")]
    RunAborted { step: Step },

    #[error("Run '{run_id}' not found")]
    RunNotFound { run_id: String },

    #[error("Stored run '{run_id}' is corrupt: {reason}")]
    CorruptRecord { run_id: String, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SimError {
    pub(crate) fn invalid(name: &str, value: f64, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            value,
            reason: reason.into(),
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
