//! Attachment state machine.
//!
//! Every kinetochore has one link per pole. Each step, every link gets
//! exactly one uniform draw (see rng.rs for the order):
//!   - an unbound link captures its pole with probability
//!     1 - exp(-k_a * w * dt), w being the orientation weight;
//!   - a bound link detaches with probability 1 - exp(-k_d * dt), where
//!     k_d = k_d0 + k_a * d_alpha / max(stretch, d_min) grows as the
//!     sister pair loses tension. This is the error-correction drive.
//!
//! Link states are then reclassified from the bound flags of the whole
//! chromosome, so sister links are coupled only through classification.
//! Transitions read the frozen previous state only.

use crate::{
    config::{InitialCondition, ModelParams},
    error::{SimError, SimResult},
    event::SimEvent,
    rng::SimRng,
    snapshot::SimulationState,
    types::{PoleSide, Sister, Step},
};
use serde::{Deserialize, Serialize};

/// Discrete state of one kinetochore-pole link.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Unattached,
    /// Bound to one pole while the sister is bound only to the other one.
    Correct,
    /// Bound to a pole the sister kinetochore is also bound to (syntelic).
    Incorrect,
    /// The kinetochore is bound to both poles.
    Merotelic,
    /// Bound to one pole while the sister is unattached.
    Monotelic,
}

impl LinkState {
    pub const ALL: [LinkState; 5] = [
        Self::Unattached,
        Self::Correct,
        Self::Incorrect,
        Self::Merotelic,
        Self::Monotelic,
    ];

    pub fn is_attached(self) -> bool {
        self != Self::Unattached
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Unattached => "unattached",
            Self::Correct    => "correct",
            Self::Incorrect  => "incorrect",
            Self::Merotelic  => "merotelic",
            Self::Monotelic  => "monotelic",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.name() == name)
    }
}

/// Biological classification of a whole chromosome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChromosomeAttachment {
    Amphitelic,
    Monotelic,
    Syntelic,
    Merotelic,
    Unattached,
}

impl ChromosomeAttachment {
    pub const ALL: [ChromosomeAttachment; 5] = [
        Self::Amphitelic,
        Self::Monotelic,
        Self::Syntelic,
        Self::Merotelic,
        Self::Unattached,
    ];

    /// Classify from bound flags indexed `[sister][pole]`.
    pub fn from_flags(flags: &[[bool; 2]; 2]) -> Self {
        let count = |s: usize| flags[s].iter().filter(|&&b| b).count();
        let (a, b) = (count(0), count(1));
        match (a, b) {
            (0, 0) => Self::Unattached,
            _ if a == 2 || b == 2 => Self::Merotelic,
            (1, 1) if flags[0] == flags[1] => Self::Syntelic,
            (1, 1) => Self::Amphitelic,
            _ => Self::Monotelic,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Amphitelic => "amphitelic",
            Self::Monotelic  => "monotelic",
            Self::Syntelic   => "syntelic",
            Self::Merotelic  => "merotelic",
            Self::Unattached => "unattached",
        }
    }
}

/// Link states of one chromosome from its bound flags, indexed `[sister][pole]`.
pub fn classify(flags: &[[bool; 2]; 2]) -> [[LinkState; 2]; 2] {
    let mut states = [[LinkState::Unattached; 2]; 2];
    for s in 0..2 {
        for p in 0..2 {
            states[s][p] = if !flags[s][p] {
                LinkState::Unattached
            } else if flags[s][1 - p] {
                LinkState::Merotelic
            } else if flags[1 - s][p] {
                LinkState::Incorrect
            } else if flags[1 - s][1 - p] {
                LinkState::Correct
            } else {
                LinkState::Monotelic
            };
        }
    }
    states
}

/// Flatten per-chromosome link states into topology link order.
pub fn flatten(per_chromosome: &[[[LinkState; 2]; 2]]) -> Vec<LinkState> {
    let mut links = Vec::with_capacity(per_chromosome.len() * 4);
    for states in per_chromosome {
        for sister in Sister::BOTH {
            for pole in PoleSide::BOTH {
                links.push(states[sister.index()][pole.index()]);
            }
        }
    }
    links
}

/// Result of one transition sweep.
pub struct Transition {
    pub links:  Vec<LinkState>,
    pub ages:   Vec<u64>,
    pub events: Vec<SimEvent>,
}

#[derive(Debug, Clone)]
pub struct AttachmentStateMachine {
    dt:             f64,
    k_a:            f64,
    k_d0:           f64,
    d_alpha:        f64,
    d_min:          f64,
    orientation:    f64,
    mero_capture:   f64,
    capture_length: f64,
}

impl AttachmentStateMachine {
    pub fn new(params: &ModelParams) -> Self {
        Self {
            dt:             params.dt,
            k_a:            params.k_a,
            k_d0:           params.k_d0,
            d_alpha:        params.d_alpha,
            d_min:          params.d_min,
            orientation:    params.orientation,
            mero_capture:   params.mero_capture,
            capture_length: params.capture_length,
        }
    }

    /// Bound flags of one chromosome at setup, indexed `[sister][pole]`.
    /// Only `Random` draws from the stream: one draw per sister, A then B.
    pub fn initial_flags(&self, condition: InitialCondition, rng: &mut SimRng) -> [[bool; 2]; 2] {
        let (l, r) = (PoleSide::Left.index(), PoleSide::Right.index());
        let (a, b) = (Sister::A.index(), Sister::B.index());
        let mut flags = [[false; 2]; 2];
        match condition {
            InitialCondition::Null => {}
            InitialCondition::Amphitelic => {
                flags[a][l] = true;
                flags[b][r] = true;
            }
            InitialCondition::Random => {
                for sister in Sister::BOTH {
                    match rng.next_u64_below(3) {
                        0 => {}
                        1 => flags[sister.index()][l] = true,
                        _ => flags[sister.index()][r] = true,
                    }
                }
            }
            InitialCondition::Monotelic => {
                flags[a][l] = true;
            }
            InitialCondition::Syntelic => {
                flags[a][l] = true;
                flags[b][l] = true;
            }
            InitialCondition::Merotelic => {
                flags[a][l] = true;
                flags[a][r] = true;
                flags[b][r] = true;
            }
        }
        flags
    }

    /// The pole a kinetochore currently faces: away from its sister.
    fn facing_pole(state: &SimulationState, chromosome: usize, sister: Sister) -> PoleSide {
        let me = state.kinetochore(chromosome, sister);
        let other = state.kinetochore(chromosome, sister.other());
        if me < other {
            PoleSide::Left
        } else if me > other {
            PoleSide::Right
        } else {
            sister.facing_pole()
        }
    }

    /// Capture rate (1/s) of an unbound link.
    pub fn capture_rate(
        &self,
        state: &SimulationState,
        flags: &[[bool; 2]; 2],
        chromosome: usize,
        sister: Sister,
        pole: PoleSide,
    ) -> f64 {
        if state.ablated {
            return 0.0;
        }
        let weight = if flags[sister.index()][pole.opposite().index()] {
            self.mero_capture
        } else if Self::facing_pole(state, chromosome, sister) == pole {
            0.5 * (1.0 + self.orientation)
        } else {
            0.5 * (1.0 - self.orientation)
        };
        let geometry = if self.capture_length > 0.0 {
            let distance = (state.kinetochore(chromosome, sister) - state.pole(pole)).abs();
            (-distance / self.capture_length).exp()
        } else {
            1.0
        };
        self.k_a * weight * geometry
    }

    /// Detachment rate (1/s) of a bound link. Low sister tension, i.e. a
    /// kinetochore close to its centromere, gives a high rate.
    pub fn detach_rate(&self, state: &SimulationState, chromosome: usize, sister: Sister) -> f64 {
        if state.ablated {
            return 0.0;
        }
        let stretch = (state.kinetochore(chromosome, sister) - state.centromere(chromosome)).abs();
        self.k_d0 + self.k_a * self.d_alpha / stretch.max(self.d_min)
    }

    fn probability(&self, rate: f64) -> f64 {
        1.0 - (-rate * self.dt).exp()
    }

    /// One transition sweep over every link of `prev`, producing the link
    /// states of `step`.
    pub fn transition(&self, prev: &SimulationState, rng: &mut SimRng, step: Step) -> Transition {
        let n = prev.n_chromosomes();
        let mut per_chromosome = Vec::with_capacity(n);
        let mut events = Vec::new();

        for chromosome in 0..n {
            let before = prev.bound_flags(chromosome);
            let mut after = before;
            for sister in Sister::BOTH {
                for pole in PoleSide::BOTH {
                    let roll = rng.next_f64();
                    let (s, p) = (sister.index(), pole.index());
                    if before[s][p] {
                        let rate = self.detach_rate(prev, chromosome, sister);
                        if roll < self.probability(rate) {
                            after[s][p] = false;
                            events.push(SimEvent::LinkDetached { step, chromosome, sister, pole });
                        }
                    } else {
                        let rate = self.capture_rate(prev, &before, chromosome, sister, pole);
                        if roll < self.probability(rate) {
                            after[s][p] = true;
                            events.push(SimEvent::LinkAttached { step, chromosome, sister, pole });
                        }
                    }
                }
            }
            per_chromosome.push(classify(&after));
        }

        let links = flatten(&per_chromosome);
        let ages = links
            .iter()
            .zip(prev.links.iter().zip(prev.link_ages.iter()))
            .map(|(new, (old, age))| if new == old { age + 1 } else { 0 })
            .collect();

        Transition { links, ages, events }
    }

    /// Every stored link state must match the classification of the
    /// chromosome's bound flags.
    pub fn validate(state: &SimulationState) -> SimResult<()> {
        for chromosome in 0..state.n_chromosomes() {
            let expected = classify(&state.bound_flags(chromosome));
            for sister in Sister::BOTH {
                for pole in PoleSide::BOTH {
                    let stored = state.link(chromosome, sister, pole);
                    let wanted = expected[sister.index()][pole.index()];
                    if stored != wanted {
                        return Err(SimError::InconsistentAttachment {
                            chromosome,
                            step: state.step,
                            detail: format!(
                                "link {}{}->{} is {} but its chromosome says {}",
                                chromosome,
                                sister.name(),
                                pole.name(),
                                stored.name(),
                                wanted.name()
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParameterSet;
    use crate::snapshot::Phase;

    fn flags(a: [bool; 2], b: [bool; 2]) -> [[bool; 2]; 2] {
        [a, b]
    }

    fn state_with(flags: [[bool; 2]; 2], xa: f64, xb: f64) -> SimulationState {
        SimulationState {
            step: 0,
            time: 0.0,
            positions: vec![-1.0, 1.0, xa, xb],
            links: flatten(&[classify(&flags)]),
            link_ages: vec![0; 4],
            phase: Phase::Metaphase,
            ablated: false,
            checkpoint_since: None,
        }
    }

    fn machine() -> AttachmentStateMachine {
        let params = ModelParams::resolve(&ParameterSet::default_params()).unwrap();
        AttachmentStateMachine::new(&params)
    }

    #[test]
    fn classification_covers_all_arrangements() {
        use LinkState::*;
        assert_eq!(classify(&flags([true, false], [false, true])), [[Correct, Unattached], [Unattached, Correct]]);
        assert_eq!(classify(&flags([true, false], [true, false])), [[Incorrect, Unattached], [Incorrect, Unattached]]);
        assert_eq!(classify(&flags([true, true], [false, true])), [[Merotelic, Merotelic], [Unattached, Incorrect]]);
        assert_eq!(classify(&flags([true, false], [false, false])), [[Monotelic, Unattached], [Unattached, Unattached]]);
        // A lone sister is monotelic whichever pole it holds.
        assert_eq!(classify(&flags([false, true], [false, false])), [[Unattached, Monotelic], [Unattached, Unattached]]);
        assert_eq!(classify(&flags([false, true], [true, false])), [[Unattached, Correct], [Correct, Unattached]]);
    }

    #[test]
    fn chromosome_classification() {
        use ChromosomeAttachment::*;
        assert_eq!(ChromosomeAttachment::from_flags(&flags([false, false], [false, false])), Unattached);
        assert_eq!(ChromosomeAttachment::from_flags(&flags([true, false], [false, true])), Amphitelic);
        assert_eq!(ChromosomeAttachment::from_flags(&flags([false, true], [true, false])), Amphitelic);
        assert_eq!(ChromosomeAttachment::from_flags(&flags([false, true], [false, true])), Syntelic);
        assert_eq!(ChromosomeAttachment::from_flags(&flags([false, false], [false, true])), Monotelic);
        assert_eq!(ChromosomeAttachment::from_flags(&flags([true, true], [false, false])), Merotelic);
    }

    #[test]
    fn low_tension_detaches_faster() {
        let m = machine();
        let relaxed = state_with(flags([true, false], [true, false]), -0.025, 0.025);
        let stretched = state_with(flags([true, false], [false, true]), -0.2, 0.2);
        assert!(m.detach_rate(&relaxed, 0, Sister::A) > 3.0 * m.detach_rate(&stretched, 0, Sister::A));
    }

    #[test]
    fn facing_pole_is_preferred_and_second_pole_is_rare() {
        let m = machine();
        let s = state_with(flags([false, false], [false, false]), -0.1, 0.1);
        let f = s.bound_flags(0);
        let facing = m.capture_rate(&s, &f, 0, Sister::A, PoleSide::Left);
        let away = m.capture_rate(&s, &f, 0, Sister::A, PoleSide::Right);
        assert!(facing > away);

        let bound = state_with(flags([true, false], [false, false]), -0.1, 0.1);
        let f = bound.bound_flags(0);
        let second = m.capture_rate(&bound, &f, 0, Sister::A, PoleSide::Right);
        assert!(second < away);
    }

    #[test]
    fn ablated_state_freezes_links() {
        let m = machine();
        let mut s = state_with(flags([true, false], [true, false]), -0.01, 0.01);
        s.ablated = true;
        let f = s.bound_flags(0);
        assert_eq!(m.detach_rate(&s, 0, Sister::A), 0.0);
        assert_eq!(m.capture_rate(&s, &f, 0, Sister::A, PoleSide::Right), 0.0);
    }

    #[test]
    fn sweep_draws_one_uniform_per_link() {
        let m = machine();
        let s = state_with(flags([true, false], [false, true]), -0.2, 0.2);
        let mut a = SimRng::new(11);
        let mut b = SimRng::new(11);
        m.transition(&s, &mut a, 1);
        for _ in 0..4 {
            b.next_f64();
        }
        assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
    }

    #[test]
    fn ages_reset_on_change_only() {
        let m = machine();
        let mut s = state_with(flags([false, false], [false, false]), -0.1, 0.1);
        s.ablated = true;
        s.link_ages = vec![3, 3, 3, 3];
        let t = m.transition(&s, &mut SimRng::new(1), 1);
        assert_eq!(t.ages, vec![4, 4, 4, 4]);
        assert!(t.events.is_empty());
    }

    #[test]
    fn validation_catches_mislabelled_merotely() {
        let mut s = state_with(flags([true, false], [false, true]), -0.2, 0.2);
        assert!(AttachmentStateMachine::validate(&s).is_ok());
        s.links[0] = LinkState::Merotelic;
        assert!(matches!(
            AttachmentStateMachine::validate(&s),
            Err(SimError::InconsistentAttachment { chromosome: 0, .. })
        ));
    }
}
