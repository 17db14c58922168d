//! The simulation engine: owns the topology and the time loop.
//!
//! EXECUTION ORDER within a step (fixed, documented, never reordered):
//!   0. Laser ablation, on its scheduled step only
//!   1. Attachment sweep        (reads the frozen previous state)
//!   2. Deterministic forces    (reads the frozen previous state)
//!   3. Thermal kicks
//!   4. Integration
//!   5. Attachment validation
//!   6. Checkpoint evaluation   (may switch the new state to anaphase)
//!   7. Append snapshot and events to the record, report progress
//!
//! RULES:
//!   - Every state is built from the previous one; nothing is mutated
//!     in place once it has been recorded.
//!   - All randomness flows through the one SimRng, in the order
//!     documented in rng.rs.
//!   - The run always covers `span` steps; anaphase does not stop it.
//!   - A failed step aborts the run; the clock only moves past valid states.

use crate::{
    attachment::{classify, flatten, AttachmentStateMachine},
    checkpoint::CheckpointMonitor,
    clock::SimClock,
    config::{InitialCondition, MeasureSet, ModelParams, ParameterSet},
    error::{SimError, SimResult},
    event::SimEvent,
    forces::ForceModel,
    integrator::Integrator,
    progress::ProgressReporter,
    rng::SimRng,
    snapshot::{Phase, SimulationState},
    topology::SpindleTopology,
    trajectory::{Ablation, RunMetadata, TrajectoryRecord},
    types::{PoleSide, Sister, Step},
};
use log::Level;

pub struct SimEngine {
    params:     ModelParams,
    topology:   SpindleTopology,
    attachment: AttachmentStateMachine,
    forces:     ForceModel,
    integrator: Integrator,
    checkpoint: CheckpointMonitor,
    rng:        SimRng,
    clock:      SimClock,
    record:     TrajectoryRecord,
    verbose:    bool,
    completed:  bool,
    /// Step whose failure aborted the run.
    failed:     Option<Step>,
}

impl SimEngine {
    /// Validate the parameters, build the topology and the initial state.
    /// Fails before any step runs on a bad configuration.
    pub fn new(
        params: &ParameterSet,
        measures: &MeasureSet,
        initial: InitialCondition,
        verbose: bool,
    ) -> SimResult<Self> {
        let model = ModelParams::resolve(params)?;
        let topology = SpindleTopology::new(model.n_chromosomes, model.mus, model.muk);
        let forces = ForceModel::new(&model);
        let integrator = Integrator::new(model.dt);
        integrator.check_stability(&topology, &forces)?;

        let attachment = AttachmentStateMachine::new(&model);
        let checkpoint = CheckpointMonitor::new(&model);
        let mut rng = SimRng::new(model.seed);

        let mut initial_state = Self::initial_state(&model, &attachment, initial, &mut rng);
        let mut events = vec![SimEvent::RunInitialized {
            seed: model.seed,
            initial_condition: initial.name().to_string(),
        }];
        events.extend(checkpoint.init(&mut initial_state));

        let record = TrajectoryRecord {
            metadata: RunMetadata {
                seed:               model.seed,
                initial_condition:  initial,
                dt:                 model.dt,
                span:               model.span,
                anaphase_onset:     None,
                anaphase_delay:     None,
                merotelic_at_onset: None,
                ablation:           None,
                final_phase:        Phase::Metaphase,
            },
            params: params.clone(),
            measures: measures.clone(),
            topology: topology.clone(),
            snapshots: vec![initial_state],
            events,
        };

        let engine = Self {
            clock: SimClock::new(model.span, model.dt),
            params: model,
            topology,
            attachment,
            forces,
            integrator,
            checkpoint,
            rng,
            record,
            verbose,
            completed: false,
            failed: None,
        };
        engine.log(format!(
            "Run initialized: seed {}, {} chromosomes, {} steps of {} s, initial condition {}",
            engine.params.seed,
            engine.params.n_chromosomes,
            engine.params.span,
            engine.params.dt,
            initial
        ));
        Ok(engine)
    }

    /// Schedule a laser ablation. Must be set before the run starts.
    pub fn with_ablation(mut self, ablation: Ablation) -> SimResult<Self> {
        if ablation.step == 0 || ablation.step > self.params.span {
            return Err(SimError::invalid(
                "ablation step",
                ablation.step as f64,
                format!("must be within 1..={}", self.params.span),
            ));
        }
        if !ablation.position.is_finite() {
            return Err(SimError::invalid("ablation position", ablation.position, "must be finite"));
        }
        if self.clock.current_step > 0 {
            return Err(SimError::SimulationAlreadyDone);
        }
        self.record.metadata.ablation = Some(ablation);
        Ok(self)
    }

    fn initial_state(
        params: &ModelParams,
        attachment: &AttachmentStateMachine,
        initial: InitialCondition,
        rng: &mut SimRng,
    ) -> SimulationState {
        let n = params.n_chromosomes;
        let half_spread = 0.5 * params.placement_spread * params.spindle_length;
        let half_length = 0.5 * params.spindle_length;

        let mut positions = vec![0.0; 2 + 2 * n];
        positions[SpindleTopology::pole_index(PoleSide::Left)] = -half_length;
        positions[SpindleTopology::pole_index(PoleSide::Right)] = half_length;

        let mut per_chromosome = Vec::with_capacity(n);
        for chromosome in 0..n {
            let centre = if initial == InitialCondition::Random {
                rng.uniform(-half_spread, half_spread)
            } else if n == 1 {
                0.0
            } else {
                -half_spread + 2.0 * half_spread * chromosome as f64 / (n - 1) as f64
            };
            for sister in Sister::BOTH {
                let side = sister.facing_pole().sign();
                positions[SpindleTopology::kinetochore_index(chromosome, sister)] =
                    centre + side * 0.5 * params.d0;
            }
            per_chromosome.push(classify(&attachment.initial_flags(initial, rng)));
        }

        SimulationState {
            step: 0,
            time: 0.0,
            positions,
            links: flatten(&per_chromosome),
            link_ages: vec![0; 4 * n],
            phase: Phase::Metaphase,
            ablated: false,
            checkpoint_since: None,
        }
    }

    /// Advance one step. This is the core simulation step.
    /// A failed step aborts the run: the record keeps every step before
    /// it and all later calls fail with `RunAborted`.
    pub fn step(&mut self) -> SimResult<&SimulationState> {
        if let Some(step) = self.failed {
            return Err(SimError::RunAborted { step });
        }
        if self.clock.finished() {
            return Err(SimError::SimulationAlreadyDone);
        }
        let step = self.clock.current_step + 1;
        if let Err(e) = self.try_step(step) {
            log::warn!("Run aborted at step {step}: {e}");
            self.failed = Some(step);
            return Err(e);
        }
        if self.clock.finished() {
            self.complete();
        }
        Ok(self.state())
    }

    /// Build, validate and record the state of `step`. The clock moves
    /// only once the new state is known to be valid.
    fn try_step(&mut self, step: Step) -> SimResult<()> {
        let mut prev = self.state().clone();
        let mut events = Vec::new();

        if let Some(ablation) = self.record.metadata.ablation {
            if ablation.step == step {
                events.extend(self.ablate(&mut prev, ablation));
            }
        }

        let transition = self.attachment.transition(&prev, &mut self.rng, step);
        let forces = self.forces.deterministic(&self.topology, &prev);
        let kicks = self.forces.thermal_kicks(&self.topology, &mut self.rng);
        let positions = self.integrator.advance(&self.topology, &prev.positions, &forces, &kicks);

        if let Some(body) = positions.iter().position(|x| !x.is_finite()) {
            return Err(SimError::NonFiniteState {
                body: self.topology.bodies[body].label(),
                step,
            });
        }

        let mut next = SimulationState {
            step,
            time: self.clock.time_of(step),
            positions,
            links: transition.links,
            link_ages: transition.ages,
            phase: prev.phase,
            ablated: prev.ablated,
            checkpoint_since: prev.checkpoint_since,
        };
        AttachmentStateMachine::validate(&next)?;
        self.clock.advance();
        events.extend(transition.events);

        let checkpoint_events = self.checkpoint.evaluate(&mut next);
        for event in &checkpoint_events {
            if let SimEvent::AnaphaseOnset { step, time, delay, merotelic } = *event {
                let meta = &mut self.record.metadata;
                meta.anaphase_onset = Some(step);
                meta.anaphase_delay = Some(delay);
                meta.merotelic_at_onset = Some(merotelic);
                self.log(format!(
                    "Anaphase onset at step {step} (t = {time:.1} s, delay {delay:.1} s, {merotelic} merotelic links)"
                ));
            }
        }
        events.extend(checkpoint_events);

        self.record.metadata.final_phase = next.phase;
        self.record.snapshots.push(next);
        self.record.events.extend(events);
        Ok(())
    }

    /// Cut every microtubule crossing the beam. Only links between the
    /// beam and their pole survive; the midzone is severed.
    fn ablate(&self, state: &mut SimulationState, ablation: Ablation) -> Vec<SimEvent> {
        let beam = ablation.position;
        if beam <= state.pole(PoleSide::Left) || beam >= state.pole(PoleSide::Right) {
            log::warn!(
                "Ablation at step {} missed the spindle: beam at {beam} um, poles at {:.3} and {:.3} um",
                ablation.step,
                state.pole(PoleSide::Left),
                state.pole(PoleSide::Right)
            );
            return vec![SimEvent::AblationMissed { step: ablation.step, position: beam }];
        }

        let mut detached = 0;
        let mut per_chromosome = Vec::with_capacity(state.n_chromosomes());
        for chromosome in 0..state.n_chromosomes() {
            let mut flags = state.bound_flags(chromosome);
            for sister in Sister::BOTH {
                let x = state.kinetochore(chromosome, sister);
                for pole in PoleSide::BOTH {
                    let crosses = match pole {
                        PoleSide::Left  => beam < x,
                        PoleSide::Right => beam > x,
                    };
                    let bound = &mut flags[sister.index()][pole.index()];
                    if *bound && crosses {
                        *bound = false;
                        detached += 1;
                    }
                }
            }
            per_chromosome.push(classify(&flags));
        }

        let links = flatten(&per_chromosome);
        for (i, link) in links.iter().enumerate() {
            if *link != state.links[i] {
                state.link_ages[i] = 0;
            }
        }
        state.links = links;
        state.ablated = true;

        self.log(format!("Ablation at step {} ({beam} um) cut {detached} links", ablation.step));
        vec![SimEvent::AblationPerformed { step: ablation.step, position: beam, detached }]
    }

    fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let phase = self.state().phase;
        self.record.events.push(SimEvent::RunCompleted {
            step: self.clock.current_step,
            phase,
        });
        self.log(format!(
            "Run completed after {} steps in {}",
            self.clock.current_step,
            phase.name()
        ));
    }

    /// Run up to `n` more steps. Returns the number actually run; it is
    /// smaller than `n` only when the run reaches its end.
    pub fn advance(&mut self, n: u64, progress: &ProgressReporter) -> SimResult<u64> {
        let todo = n.min(self.clock.remaining());
        for _ in 0..todo {
            self.step()?;
            progress.report(self.progress());
        }
        Ok(todo)
    }

    /// Run every remaining step. A second call fails.
    pub fn run(&mut self) -> SimResult<&TrajectoryRecord> {
        self.run_with_progress(&ProgressReporter::new())
    }

    pub fn run_with_progress(&mut self, progress: &ProgressReporter) -> SimResult<&TrajectoryRecord> {
        if let Some(step) = self.failed {
            return Err(SimError::RunAborted { step });
        }
        if self.completed {
            return Err(SimError::SimulationAlreadyDone);
        }
        let remaining = self.clock.remaining();
        self.advance(remaining, progress)?;
        self.complete();
        progress.report(1.0);
        Ok(&self.record)
    }

    pub fn progress(&self) -> f64 {
        self.clock.progress()
    }

    /// The run so far. Valid after a partial run or a failed step.
    pub fn record(&self) -> &TrajectoryRecord {
        &self.record
    }

    pub fn into_record(self) -> TrajectoryRecord {
        self.record
    }

    pub fn state(&self) -> &SimulationState {
        // The record always holds at least the initial state.
        &self.record.snapshots[self.record.snapshots.len() - 1]
    }

    pub fn phase(&self) -> Phase {
        self.state().phase
    }

    pub fn topology(&self) -> &SpindleTopology {
        &self.topology
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Current cohesin tension of a chromosome, in pN.
    pub fn tension(&self, chromosome: usize) -> f64 {
        self.forces.tension(self.state(), chromosome)
    }

    fn log(&self, message: String) {
        let level = if self.verbose { Level::Info } else { Level::Debug };
        log::log!(level, "{message}");
    }
}
