//! The per-step simulation state.
//!
//! A `SimulationState` is a frozen value: each step reads the previous
//! one and builds the next one from scratch. It captures everything
//! needed to resume the run from that step.

use crate::{
    attachment::{ChromosomeAttachment, LinkState},
    topology::SpindleTopology,
    types::{PoleSide, Sister, Step},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Metaphase,
    Anaphase,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Metaphase => "metaphase",
            Self::Anaphase  => "anaphase",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "metaphase" => Some(Self::Metaphase),
            "anaphase"  => Some(Self::Anaphase),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationState {
    pub step: Step,
    pub time: f64,
    /// One position per body, in topology order.
    pub positions: Vec<f64>,
    /// One state per link, in topology order.
    pub links: Vec<LinkState>,
    /// Steps spent in the current link state.
    pub link_ages: Vec<u64>,
    pub phase: Phase,
    /// Set for the rest of the run once a laser ablation has hit.
    pub ablated: bool,
    /// First step of the current run of checkpoint-satisfied snapshots.
    pub checkpoint_since: Option<Step>,
}

impl SimulationState {
    pub fn pole(&self, side: PoleSide) -> f64 {
        self.positions[SpindleTopology::pole_index(side)]
    }

    pub fn kinetochore(&self, chromosome: usize, sister: Sister) -> f64 {
        self.positions[SpindleTopology::kinetochore_index(chromosome, sister)]
    }

    pub fn link(&self, chromosome: usize, sister: Sister, pole: PoleSide) -> LinkState {
        self.links[SpindleTopology::link_index(chromosome, sister, pole)]
    }

    pub fn is_bound(&self, chromosome: usize, sister: Sister, pole: PoleSide) -> bool {
        self.link(chromosome, sister, pole).is_attached()
    }

    /// Bound flags of one chromosome, indexed `[sister][pole]`.
    pub fn bound_flags(&self, chromosome: usize) -> [[bool; 2]; 2] {
        let mut flags = [[false; 2]; 2];
        for sister in Sister::BOTH {
            for pole in PoleSide::BOTH {
                flags[sister.index()][pole.index()] = self.is_bound(chromosome, sister, pole);
            }
        }
        flags
    }

    pub fn spindle_length(&self) -> f64 {
        self.pole(PoleSide::Right) - self.pole(PoleSide::Left)
    }

    /// Derived centromere midpoint; never integrated.
    pub fn centromere(&self, chromosome: usize) -> f64 {
        0.5 * (self.kinetochore(chromosome, Sister::A) + self.kinetochore(chromosome, Sister::B))
    }

    pub fn sister_distance(&self, chromosome: usize) -> f64 {
        (self.kinetochore(chromosome, Sister::B) - self.kinetochore(chromosome, Sister::A)).abs()
    }

    pub fn n_chromosomes(&self) -> usize {
        self.links.len() / 4
    }

    pub fn chromosome_attachment(&self, chromosome: usize) -> ChromosomeAttachment {
        ChromosomeAttachment::from_flags(&self.bound_flags(chromosome))
    }

    /// Fraction of chromosomes that are bioriented (amphitelic).
    pub fn biorientation_fraction(&self) -> f64 {
        let n = self.n_chromosomes();
        if n == 0 {
            return 0.0;
        }
        let bioriented = (0..n)
            .filter(|&c| self.chromosome_attachment(c) == ChromosomeAttachment::Amphitelic)
            .count();
        bioriented as f64 / n as f64
    }

    pub fn count_links(&self, state: LinkState) -> usize {
        self.links.iter().filter(|&&s| s == state).count()
    }
}
