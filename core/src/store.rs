//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The engine never touches it; a finished TrajectoryRecord is saved
//! as a whole and loaded back as a whole.

use crate::{
    error::SimResult,
    event::EventLogEntry,
    types::Step,
};
use rusqlite::{params, Connection};

mod pool;
mod trajectory;

pub use pool::PoolRow;

pub struct SimStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

/// One line of `list_runs`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id:            String,
    pub pool_id:           Option<String>,
    pub seed:              u64,
    pub initial_condition: String,
    pub n_chromosomes:     usize,
    pub span:              Step,
    pub anaphase_onset:    Option<Step>,
    pub final_phase:       String,
    pub saved_at:          String,
}

impl SimStore {
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new, empty database.
    pub fn reopen(&self) -> SimResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn events_for_step(&self, run_id: &str, step: Step) -> SimResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, step, event_type, payload
             FROM event_log WHERE run_id = ?1 AND step = ?2
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id, step as i64], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    run_id:     row.get(1)?,
                    step:       row.get::<_, i64>(2)? as u64,
                    event_type: row.get(3)?,
                    payload:    row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, run_id: &str) -> SimResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ── Runs ───────────────────────────────────────────────────

    /// Every saved run, oldest first.
    pub fn list_runs(&self) -> SimResult<Vec<RunSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, pool_id, seed, initial_condition, n_chromosomes, span,
                    anaphase_onset, final_phase, saved_at
             FROM run ORDER BY saved_at ASC, run_id ASC",
        )?;
        let runs = stmt
            .query_map([], |row| {
                Ok(RunSummary {
                    run_id:            row.get(0)?,
                    pool_id:           row.get(1)?,
                    seed:              row.get::<_, i64>(2)? as u64,
                    initial_condition: row.get(3)?,
                    n_chromosomes:     row.get::<_, i64>(4)? as usize,
                    span:              row.get::<_, i64>(5)? as u64,
                    anaphase_onset:    row.get::<_, Option<i64>>(6)?.map(|s| s as u64),
                    final_phase:       row.get(7)?,
                    saved_at:          row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}
