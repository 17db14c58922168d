//! Overdamped, first-order stochastic integrator.
//!
//!   x_next = x + (F / drag) * dt + kick
//!
//! Stateless: it only sees the positions, forces and kicks it is handed.

use crate::{
    error::{SimError, SimResult},
    forces::ForceModel,
    topology::SpindleTopology,
};

/// Explicit Euler is stable when dt * k / drag stays below this bound for
/// every body, k being the summed stiffness of the springs on it.
pub const STABILITY_LIMIT: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct Integrator {
    dt: f64,
}

impl Integrator {
    pub fn new(dt: f64) -> Self {
        Self { dt }
    }

    /// Reject a time step that the stiffest configuration could not
    /// integrate stably.
    pub fn check_stability(&self, topology: &SpindleTopology, forces: &ForceModel) -> SimResult<()> {
        for body in &topology.bodies {
            let stiffness = forces.max_stiffness(topology, body.kind);
            if stiffness <= 0.0 {
                continue;
            }
            let max_dt = STABILITY_LIMIT * body.drag / stiffness;
            if self.dt > max_dt {
                return Err(SimError::NumericalInstability {
                    body: body.label(),
                    dt: self.dt,
                    max_dt,
                    stiffness,
                    drag: body.drag,
                });
            }
        }
        Ok(())
    }

    /// Positions after one step.
    pub fn advance(
        &self,
        topology: &SpindleTopology,
        positions: &[f64],
        forces: &[f64],
        kicks: &[f64],
    ) -> Vec<f64> {
        topology
            .bodies
            .iter()
            .zip(positions)
            .zip(forces.iter().zip(kicks))
            .map(|((body, x), (f, kick))| x + f / body.drag * self.dt + kick)
            .collect()
    }
}
