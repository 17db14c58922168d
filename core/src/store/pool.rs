//! Store methods for pools of runs.

use crate::{
    config::InitialCondition,
    error::{SimError, SimResult},
    trajectory::TrajectoryRecord,
};
use rusqlite::{params, OptionalExtension};

use super::{trajectory::insert_trajectory, SimStore};

/// Pool metadata as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolRow {
    pub pool_id:           String,
    pub master_seed:       u64,
    pub size:              usize,
    pub initial_condition: String,
    pub version:           String,
    pub created_at:        String,
}

impl SimStore {
    /// Persist every run of a pool, in order, under `{pool_id}-{index}`.
    /// All or nothing: one transaction covers the pool and its runs.
    pub fn save_pool(
        &self,
        pool_id:     &str,
        master_seed: u64,
        initial:     InitialCondition,
        records:     &[TrajectoryRecord],
    ) -> SimResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO pool (pool_id, master_seed, size, initial_condition, version, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                pool_id,
                master_seed as i64,
                records.len() as i64,
                initial.name(),
                env!("CARGO_PKG_VERSION"),
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        for (index, record) in records.iter().enumerate() {
            let run_id = format!("{pool_id}-{index:04}");
            insert_trajectory(&tx, &run_id, record, Some((pool_id, index)))?;
        }
        tx.commit()?;
        log::debug!("Saved pool {pool_id} with {} runs", records.len());
        Ok(())
    }

    pub fn pool(&self, pool_id: &str) -> SimResult<PoolRow> {
        self.conn
            .query_row(
                "SELECT pool_id, master_seed, size, initial_condition, version, created_at
                 FROM pool WHERE pool_id = ?1",
                params![pool_id],
                |row| {
                    Ok(PoolRow {
                        pool_id:           row.get(0)?,
                        master_seed:       row.get::<_, i64>(1)? as u64,
                        size:              row.get::<_, i64>(2)? as usize,
                        initial_condition: row.get(3)?,
                        version:           row.get(4)?,
                        created_at:        row.get(5)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| SimError::RunNotFound { run_id: pool_id.to_string() })
    }

    /// Reload every run of a pool, in pool order.
    pub fn load_pool(&self, pool_id: &str) -> SimResult<Vec<TrajectoryRecord>> {
        let pool = self.pool(pool_id)?;
        let mut stmt = self.conn.prepare(
            "SELECT run_id FROM run WHERE pool_id = ?1 ORDER BY pool_index ASC",
        )?;
        let run_ids = stmt
            .query_map(params![pool_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        if run_ids.len() != pool.size {
            return Err(SimError::CorruptRecord {
                run_id: pool_id.to_string(),
                reason: format!("pool lists {} runs but {} are stored", pool.size, run_ids.len()),
            });
        }
        run_ids.iter().map(|id| self.load_trajectory(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{MeasureSet, ParameterSet},
        pool::run_pool,
        progress::ProgressReporter,
    };

    #[test]
    fn failed_pool_save_leaves_nothing_behind() {
        let mut p = ParameterSet::default_params();
        p.set("span", 5.0).unwrap();
        let records = run_pool(
            &p,
            &MeasureSet::default_measures(),
            InitialCondition::Null,
            3,
            &ProgressReporter::new(),
        )
        .unwrap();

        let store = SimStore::in_memory().unwrap();
        store.migrate().unwrap();
        // Occupy the id of the second run so the save fails halfway.
        store.save_trajectory("p-0001", &records[0]).unwrap();

        assert!(matches!(
            store.save_pool("p", 1, InitialCondition::Null, &records),
            Err(SimError::Database(_))
        ));
        assert!(matches!(store.pool("p"), Err(SimError::RunNotFound { .. })));
        let runs = store.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, "p-0001");
        assert_eq!(runs[0].pool_id, None);
    }
}
