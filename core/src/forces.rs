//! Force model for the spindle.
//!
//! Deterministic contributions, summed per body:
//!   - attached links: Hookean kMT spring (metaphase) or saturating
//!     poleward pull (anaphase), equal and opposite on the pole;
//!   - sister cohesion: spring around `d0`, released in anaphase;
//!   - midzone: outward push on each pole.
//! Drag is not a force here; the integrator divides by it.
//!
//! Thermal kicks are displacements sqrt(2 kBT dt / drag) * N(0, 1),
//! one per body, drawn after the attachment sweep.

use crate::{
    config::ModelParams,
    rng::SimRng,
    snapshot::{Phase, SimulationState},
    topology::{BodyKind, SpindleTopology},
    types::{PoleSide, Sister},
};

#[derive(Debug, Clone)]
pub struct ForceModel {
    dt:           f64,
    kappa_k:      f64,
    kappa_c:      f64,
    d0:           f64,
    rest_length:  f64,
    fmz:          f64,
    fmz_anaphase: f64,
    max_length:   f64,
    fk:           f64,
    l_pull:       f64,
    kbt:          f64,
}

impl ForceModel {
    pub fn new(params: &ModelParams) -> Self {
        Self {
            dt:           params.dt,
            kappa_k:      params.kappa_k,
            kappa_c:      params.kappa_c,
            d0:           params.d0,
            rest_length:  params.link_rest_length,
            fmz:          params.fmz,
            fmz_anaphase: params.fmz_anaphase,
            max_length:   params.max_spindle_length,
            fk:           params.fk,
            l_pull:       params.l_pull,
            kbt:          params.kbt,
        }
    }

    /// Force exerted by one bound link on its kinetochore, positive toward
    /// +x. The pole feels the opposite.
    pub fn link_force(&self, phase: Phase, kinetochore: f64, pole: f64) -> f64 {
        let gap = pole - kinetochore;
        let length = gap.abs();
        let toward_pole = gap.signum();
        if length == 0.0 {
            return 0.0;
        }
        match phase {
            Phase::Metaphase => self.kappa_k * (length - self.rest_length) * toward_pole,
            Phase::Anaphase  => self.fk * length / (length + self.l_pull) * toward_pole,
        }
    }

    /// Cohesion force on sister A, positive toward +x. Sister B feels the
    /// opposite. Zero once cohesin is gone.
    pub fn cohesion_force(&self, phase: Phase, xa: f64, xb: f64) -> f64 {
        if phase == Phase::Anaphase {
            return 0.0;
        }
        let gap = xb - xa;
        if gap == 0.0 {
            return 0.0;
        }
        self.kappa_c * (gap.abs() - self.d0) * gap.signum()
    }

    /// Cohesin tension of a chromosome (pN), as reported by the engine.
    /// Detachment reads the matching kinetochore stretch directly.
    pub fn tension(&self, state: &SimulationState, chromosome: usize) -> f64 {
        if state.phase == Phase::Anaphase {
            return 0.0;
        }
        (self.kappa_c * (state.sister_distance(chromosome) - self.d0)).max(0.0)
    }

    /// Outward force on each pole.
    pub fn midzone_force(&self, state: &SimulationState) -> f64 {
        if state.ablated {
            return 0.0;
        }
        match state.phase {
            Phase::Metaphase => self.fmz,
            Phase::Anaphase => {
                let stall = 1.0 - state.spindle_length() / self.max_length;
                self.fmz_anaphase * stall.max(0.0)
            }
        }
    }

    /// Deterministic force on every body, in topology order.
    pub fn deterministic(&self, topology: &SpindleTopology, state: &SimulationState) -> Vec<f64> {
        let mut forces = vec![0.0; topology.body_count()];

        let push = self.midzone_force(state);
        forces[SpindleTopology::pole_index(PoleSide::Left)] -= push;
        forces[SpindleTopology::pole_index(PoleSide::Right)] += push;

        for link in &topology.links {
            if !state.is_bound(link.chromosome, link.sister, link.pole) {
                continue;
            }
            let k = SpindleTopology::kinetochore_index(link.chromosome, link.sister);
            let p = SpindleTopology::pole_index(link.pole);
            let f = self.link_force(state.phase, state.positions[k], state.positions[p]);
            forces[k] += f;
            forces[p] -= f;
        }

        for chromosome in 0..topology.n_chromosomes {
            let a = SpindleTopology::kinetochore_index(chromosome, Sister::A);
            let b = SpindleTopology::kinetochore_index(chromosome, Sister::B);
            let f = self.cohesion_force(state.phase, state.positions[a], state.positions[b]);
            forces[a] += f;
            forces[b] -= f;
        }

        forces
    }

    /// Thermal displacement of every body for one step, in topology order.
    pub fn thermal_kicks(&self, topology: &SpindleTopology, rng: &mut SimRng) -> Vec<f64> {
        topology
            .bodies
            .iter()
            .map(|body| {
                let xi = rng.gaussian();
                (2.0 * self.kbt * self.dt / body.drag).sqrt() * xi
            })
            .collect()
    }

    /// Worst-case summed spring stiffness acting on a body, over both
    /// regimes and every attachment pattern.
    pub fn max_stiffness(&self, topology: &SpindleTopology, kind: BodyKind) -> f64 {
        let link = self.kappa_k.max(self.fk / self.l_pull);
        match kind {
            BodyKind::SpindlePole(_) => {
                topology.kinetochore_count() as f64 * link + self.fmz_anaphase / self.max_length
            }
            BodyKind::Kinetochore { .. } => 2.0 * link + self.kappa_c,
        }
    }
}
