//! Shared primitive types used across the entire simulation.

use serde::{Deserialize, Serialize};

/// A simulation step index. Step 0 is the initial state.
pub type Step = u64;

/// The canonical run identifier.
pub type RunId = String;

/// One of the two spindle poles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PoleSide {
    Left,
    Right,
}

impl PoleSide {
    pub const BOTH: [PoleSide; 2] = [PoleSide::Left, PoleSide::Right];

    pub fn opposite(self) -> Self {
        match self {
            Self::Left  => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Stable index into per-pole arrays.
    pub fn index(self) -> usize {
        match self {
            Self::Left  => 0,
            Self::Right => 1,
        }
    }

    /// -1 for the left pole, +1 for the right one.
    pub fn sign(self) -> f64 {
        match self {
            Self::Left  => -1.0,
            Self::Right =>  1.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Left  => "left",
            Self::Right => "right",
        }
    }
}

/// One of the two sister kinetochores of a chromosome.
///
/// Sister A starts on the left of its centromere and faces the left pole;
/// sister B mirrors it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Sister {
    A,
    B,
}

impl Sister {
    pub const BOTH: [Sister; 2] = [Sister::A, Sister::B];

    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    /// The pole this sister faces at the start of a run.
    pub fn facing_pole(self) -> PoleSide {
        match self {
            Self::A => PoleSide::Left,
            Self::B => PoleSide::Right,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}
