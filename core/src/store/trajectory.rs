//! Store methods for whole trajectory records.

use crate::{
    attachment::{AttachmentStateMachine, LinkState},
    config::{InitialCondition, MeasureSet, ParameterSet},
    error::{SimError, SimResult},
    event::EventLogEntry,
    snapshot::{Phase, SimulationState},
    topology::SpindleTopology,
    trajectory::{Ablation, RunMetadata, TrajectoryRecord},
};
use rusqlite::{params, Connection, OptionalExtension};

use super::SimStore;

struct RunRow {
    seed:               i64,
    initial_condition:  String,
    dt:                 f64,
    span:               i64,
    n_chromosomes:      i64,
    anaphase_onset:     Option<i64>,
    anaphase_delay:     Option<f64>,
    merotelic_at_onset: Option<i64>,
    ablation_step:      Option<i64>,
    ablation_position:  Option<f64>,
    final_phase:        String,
}

/// Write every row of a record through `conn`. The caller owns the
/// transaction.
pub(super) fn insert_trajectory(
    conn:   &Connection,
    run_id: &str,
    record: &TrajectoryRecord,
    pool:   Option<(&str, usize)>,
) -> SimResult<()> {
    let meta = &record.metadata;

    conn.execute(
        "INSERT INTO run (run_id, pool_id, pool_index, seed, version, saved_at,
                          initial_condition, dt, span, n_chromosomes,
                          anaphase_onset, anaphase_delay, merotelic_at_onset,
                          ablation_step, ablation_position, final_phase)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            run_id,
            pool.map(|(id, _)| id),
            pool.map(|(_, index)| index as i64),
            meta.seed as i64,
            env!("CARGO_PKG_VERSION"),
            chrono::Utc::now().to_rfc3339(),
            meta.initial_condition.name(),
            meta.dt,
            meta.span as i64,
            record.topology.n_chromosomes as i64,
            meta.anaphase_onset.map(|s| s as i64),
            meta.anaphase_delay,
            meta.merotelic_at_onset.map(|m| m as i64),
            meta.ablation.map(|a| a.step as i64),
            meta.ablation.map(|a| a.position),
            meta.final_phase.name(),
        ],
    )?;

    {
        let mut param_stmt = conn.prepare(
            "INSERT INTO parameter (run_id, kind, name, value, unit, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (name, p) in record.params.iter() {
            param_stmt.execute(params![run_id, "param", name, p.value, p.unit, p.description])?;
        }
        for (name, p) in record.measures.iter() {
            param_stmt.execute(params![run_id, "measure", name, p.value, p.unit, p.description])?;
        }

        let mut snapshot_stmt = conn.prepare(
            "INSERT INTO snapshot (run_id, step, time, phase, ablated, checkpoint_since)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let mut position_stmt = conn.prepare(
            "INSERT INTO body_position (run_id, step, body, position) VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut link_stmt = conn.prepare(
            "INSERT INTO link_state (run_id, step, link, state, age) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for state in &record.snapshots {
            let step = state.step as i64;
            snapshot_stmt.execute(params![
                run_id,
                step,
                state.time,
                state.phase.name(),
                state.ablated,
                state.checkpoint_since.map(|s| s as i64),
            ])?;
            for (body, x) in state.positions.iter().enumerate() {
                position_stmt.execute(params![run_id, step, body as i64, x])?;
            }
            for (link, (s, age)) in state.links.iter().zip(&state.link_ages).enumerate() {
                link_stmt.execute(params![run_id, step, link as i64, s.name(), *age as i64])?;
            }
        }

        let mut event_stmt = conn.prepare(
            "INSERT INTO event_log (run_id, step, event_type, payload) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for event in &record.events {
            let entry = EventLogEntry::new(run_id, event)?;
            event_stmt.execute(params![
                entry.run_id,
                entry.step as i64,
                entry.event_type,
                entry.payload
            ])?;
        }
    }
    Ok(())
}

impl SimStore {
    /// Persist a record in one transaction. Saving twice under the same
    /// run id fails.
    pub fn save_trajectory(&self, run_id: &str, record: &TrajectoryRecord) -> SimResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        insert_trajectory(&tx, run_id, record, None)?;
        tx.commit()?;
        log::debug!("Saved run {run_id}: {} steps, {} events", record.len(), record.events.len());
        Ok(())
    }

    /// Load a saved record. Fails without a partial result if any row is
    /// missing or malformed.
    pub fn load_trajectory(&self, run_id: &str) -> SimResult<TrajectoryRecord> {
        let corrupt = |reason: String| SimError::CorruptRecord {
            run_id: run_id.to_string(),
            reason,
        };

        let row = self
            .conn
            .query_row(
                "SELECT seed, initial_condition, dt, span, n_chromosomes,
                        anaphase_onset, anaphase_delay, merotelic_at_onset,
                        ablation_step, ablation_position, final_phase
                 FROM run WHERE run_id = ?1",
                params![run_id],
                |row| {
                    Ok(RunRow {
                        seed:               row.get(0)?,
                        initial_condition:  row.get(1)?,
                        dt:                 row.get(2)?,
                        span:               row.get(3)?,
                        n_chromosomes:      row.get(4)?,
                        anaphase_onset:     row.get(5)?,
                        anaphase_delay:     row.get(6)?,
                        merotelic_at_onset: row.get(7)?,
                        ablation_step:      row.get(8)?,
                        ablation_position:  row.get(9)?,
                        final_phase:        row.get(10)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| SimError::RunNotFound { run_id: run_id.to_string() })?;

        let initial_condition: InitialCondition = row
            .initial_condition
            .parse()
            .map_err(|_| corrupt(format!("unknown initial condition '{}'", row.initial_condition)))?;
        let final_phase = Phase::from_name(&row.final_phase)
            .ok_or_else(|| corrupt(format!("unknown phase '{}'", row.final_phase)))?;
        let count = |name: &str, value: i64| -> SimResult<u64> {
            u64::try_from(value).map_err(|_| corrupt(format!("negative {name} {value}")))
        };
        let seed = count("seed", row.seed)?;
        let span = count("span", row.span)?;
        let anaphase_onset = row.anaphase_onset.map(|s| count("anaphase onset", s)).transpose()?;
        let merotelic_at_onset = row
            .merotelic_at_onset
            .map(|m| count("merotelic count", m).map(|m| m as usize))
            .transpose()?;
        let ablation = match (row.ablation_step, row.ablation_position) {
            (Some(step), Some(position)) => Some(Ablation { step: count("ablation step", step)?, position }),
            (None, None) => None,
            _ => return Err(corrupt("half-recorded ablation".to_string())),
        };

        // ── Parameters and measures ──
        let mut params_set = ParameterSet::new();
        let mut measures = MeasureSet::new();
        let mut stmt = self.conn.prepare(
            "SELECT kind, name, value, unit, description FROM parameter
             WHERE run_id = ?1 ORDER BY kind, name",
        )?;
        let rows = stmt
            .query_map(params![run_id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, f64>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (kind, name, value, unit, description) in rows {
            match kind.as_str() {
                "param"   => params_set.insert(&name, value, &unit, &description),
                "measure" => measures.insert(&name, value, &unit, &description),
                other => return Err(corrupt(format!("unknown parameter kind '{other}'"))),
            }
        }

        // The chromosome count sizes the topology; check it against the
        // stored bodies before trusting it.
        if row.n_chromosomes <= 0 {
            return Err(corrupt(format!("chromosome count {}", row.n_chromosomes)));
        }
        let initial_bodies: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM body_position WHERE run_id = ?1 AND step = 0",
            params![run_id],
            |r| r.get(0),
        )?;
        if row.n_chromosomes.checked_mul(2).and_then(|k| k.checked_add(2)) != Some(initial_bodies) {
            return Err(corrupt(format!(
                "{} chromosomes but {initial_bodies} bodies at step 0",
                row.n_chromosomes
            )));
        }
        let n_chromosomes = row.n_chromosomes as usize;
        let (mus, muk) = match (params_set.get("mus"), params_set.get("muk")) {
            (Ok(mus), Ok(muk)) => (mus, muk),
            _ => return Err(corrupt("drag coefficients missing".to_string())),
        };
        let topology = SpindleTopology::new(n_chromosomes, mus, muk);

        // ── Snapshots ──
        let mut stmt = self.conn.prepare(
            "SELECT step, time, phase, ablated, checkpoint_since FROM snapshot
             WHERE run_id = ?1 ORDER BY step ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, f64>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, bool>(3)?,
                    r.get::<_, Option<i64>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        if rows.is_empty() {
            return Err(corrupt("no snapshots".to_string()));
        }
        let mut snapshots = Vec::with_capacity(rows.len());
        for (i, (step, time, phase, ablated, since)) in rows.into_iter().enumerate() {
            if step != i as i64 {
                return Err(corrupt(format!("snapshot {i} is missing (found step {step})")));
            }
            let phase = Phase::from_name(&phase)
                .ok_or_else(|| corrupt(format!("unknown phase '{phase}' at step {step}")))?;
            snapshots.push(SimulationState {
                step: step as u64,
                time,
                positions: Vec::with_capacity(topology.body_count()),
                links: Vec::with_capacity(topology.link_count()),
                link_ages: Vec::with_capacity(topology.link_count()),
                phase,
                ablated,
                checkpoint_since: since.map(|s| count("checkpoint start", s)).transpose()?,
            });
        }

        let mut stmt = self.conn.prepare(
            "SELECT step, body, position FROM body_position
             WHERE run_id = ?1 ORDER BY step ASC, body ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?, r.get::<_, f64>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (step, body, x) in rows {
            let state = snapshots
                .get_mut(step as usize)
                .ok_or_else(|| corrupt(format!("position for unknown step {step}")))?;
            if body as usize != state.positions.len() {
                return Err(corrupt(format!("body {body} out of order at step {step}")));
            }
            state.positions.push(x);
        }

        let mut stmt = self.conn.prepare(
            "SELECT step, link, state, age FROM link_state
             WHERE run_id = ?1 ORDER BY step ASC, link ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (step, link, name, age) in rows {
            let state = snapshots
                .get_mut(step as usize)
                .ok_or_else(|| corrupt(format!("link state for unknown step {step}")))?;
            if link as usize != state.links.len() {
                return Err(corrupt(format!("link {link} out of order at step {step}")));
            }
            let link_state = LinkState::from_name(&name)
                .ok_or_else(|| corrupt(format!("unknown link state '{name}' at step {step}")))?;
            state.links.push(link_state);
            state.link_ages.push(count("link age", age)?);
        }

        for state in &snapshots {
            if state.positions.len() != topology.body_count() || state.links.len() != topology.link_count() {
                return Err(corrupt(format!(
                    "step {} has {} positions and {} links, expected {} and {}",
                    state.step,
                    state.positions.len(),
                    state.links.len(),
                    topology.body_count(),
                    topology.link_count()
                )));
            }
            AttachmentStateMachine::validate(state).map_err(|e| corrupt(e.to_string()))?;
        }

        // ── Events ──
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, step, event_type, payload FROM event_log
             WHERE run_id = ?1 ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |r| {
                Ok(EventLogEntry {
                    id:         Some(r.get(0)?),
                    run_id:     r.get(1)?,
                    step:       r.get::<_, i64>(2)? as u64,
                    event_type: r.get(3)?,
                    payload:    r.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let events = entries
            .iter()
            .map(|e| e.decode().map_err(|err| corrupt(format!("event {:?}: {err}", e.id))))
            .collect::<SimResult<Vec<_>>>()?;

        Ok(TrajectoryRecord {
            metadata: RunMetadata {
                seed,
                initial_condition,
                dt: row.dt,
                span,
                anaphase_onset,
                anaphase_delay: row.anaphase_delay,
                merotelic_at_onset,
                ablation,
                final_phase,
            },
            params: params_set,
            measures,
            topology,
            snapshots,
            events,
        })
    }
}
