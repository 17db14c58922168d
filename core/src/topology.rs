//! Fixed spindle topology: bodies and attachment links.
//!
//! Body order (stable, part of the RNG consumption contract):
//!   0: left pole, 1: right pole,
//!   then for chromosome c: 2 + 2c = sister A, 3 + 2c = sister B.
//!
//! Link order: for chromosome c, sister s, pole p:
//!   4c + 2s + p   (s: A=0, B=1; p: Left=0, Right=1)

use crate::types::{PoleSide, Sister};
use serde::{Deserialize, Serialize};

pub const POLE_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BodyKind {
    SpindlePole(PoleSide),
    Kinetochore { chromosome: usize, sister: Sister },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Body {
    pub kind: BodyKind,
    /// Drag coefficient (pN.s/um); velocity = force / drag.
    pub drag: f64,
}

impl Body {
    pub fn label(&self) -> String {
        match self.kind {
            BodyKind::SpindlePole(side) => format!("pole {}", side.name()),
            BodyKind::Kinetochore { chromosome, sister } => {
                format!("kinetochore {chromosome}{}", sister.name())
            }
        }
    }
}

/// Static identity of a kinetochore-pole link.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentLink {
    pub chromosome: usize,
    pub sister:     Sister,
    pub pole:       PoleSide,
}

/// All bodies and links of one simulated cell. Never restructured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpindleTopology {
    pub n_chromosomes: usize,
    pub bodies: Vec<Body>,
    pub links:  Vec<AttachmentLink>,
}

impl SpindleTopology {
    pub fn new(n_chromosomes: usize, pole_drag: f64, kinetochore_drag: f64) -> Self {
        let mut bodies = Vec::with_capacity(POLE_COUNT + 2 * n_chromosomes);
        for side in PoleSide::BOTH {
            bodies.push(Body { kind: BodyKind::SpindlePole(side), drag: pole_drag });
        }
        let mut links = Vec::with_capacity(4 * n_chromosomes);
        for chromosome in 0..n_chromosomes {
            for sister in Sister::BOTH {
                bodies.push(Body {
                    kind: BodyKind::Kinetochore { chromosome, sister },
                    drag: kinetochore_drag,
                });
                for pole in PoleSide::BOTH {
                    links.push(AttachmentLink { chromosome, sister, pole });
                }
            }
        }
        Self { n_chromosomes, bodies, links }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn kinetochore_count(&self) -> usize {
        2 * self.n_chromosomes
    }

    pub fn pole_index(side: PoleSide) -> usize {
        side.index()
    }

    pub fn kinetochore_index(chromosome: usize, sister: Sister) -> usize {
        POLE_COUNT + 2 * chromosome + sister.index()
    }

    pub fn link_index(chromosome: usize, sister: Sister, pole: PoleSide) -> usize {
        4 * chromosome + 2 * sister.index() + pole.index()
    }
}
