use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    helpers::{index_to_i64, parse_optional_datetime, to_u32, to_usize},
    Database,
};
use crate::models::RunProgress;

const LAST_RUN_INDEX_KEY: &str = "last_run_index";

fn row_to_progress(row: &Row) -> Result<RunProgress> {
    let run_index: i64 = row.get("run_index")?;
    let completion_count: i64 = row.get("completion_count")?;
    let last_completed_at: Option<String> = row.get("last_completed_at")?;

    Ok(RunProgress {
        run_index: to_usize(run_index, "run_index")?,
        completion_count: to_u32(completion_count, "completion_count")?,
        last_completed_at: parse_optional_datetime(last_completed_at, "last_completed_at")?,
    })
}

pub(crate) fn record_completion(
    conn: &mut Connection,
    run_index: usize,
    completed_at: DateTime<Utc>,
) -> Result<()> {
    let tx = conn.transaction().context("failed to open transaction")?;
    tx.execute(
        "INSERT INTO run_progress (run_index, completion_count, last_completed_at)
         VALUES (?1, 1, ?2)
         ON CONFLICT(run_index) DO UPDATE SET
             completion_count = completion_count + 1,
             last_completed_at = excluded.last_completed_at",
        params![index_to_i64(run_index)?, completed_at.to_rfc3339()],
    )
    .context("failed to record run completion")?;
    tx.execute(
        "INSERT INTO app_state (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![LAST_RUN_INDEX_KEY, run_index.to_string()],
    )
    .context("failed to update last run index")?;
    tx.commit().context("failed to commit run completion")?;
    Ok(())
}

impl Database {
    pub async fn record_run_completion(
        &self,
        run_index: usize,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.execute(move |conn| record_completion(conn, run_index, completed_at))
            .await
    }

    /// Progress for one run; untouched runs report zero completions.
    pub async fn get_progress(&self, run_index: usize) -> Result<RunProgress> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT run_index, completion_count, last_completed_at
                 FROM run_progress
                 WHERE run_index = ?1",
            )?;
            let row = stmt
                .query_row(params![index_to_i64(run_index)?], |row| {
                    Ok(row_to_progress(row))
                })
                .optional()?;

            match row {
                Some(progress) => progress,
                None => Ok(RunProgress::untouched(run_index)),
            }
        })
        .await
    }

    pub async fn list_progress(&self) -> Result<Vec<RunProgress>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT run_index, completion_count, last_completed_at
                 FROM run_progress
                 ORDER BY run_index ASC",
            )?;
            let rows = stmt
                .query_map([], |row| Ok(row_to_progress(row)))?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().collect()
        })
        .await
    }

    pub async fn last_run_index(&self) -> Result<Option<usize>> {
        self.execute(move |conn| {
            let value: Option<String> = conn
                .query_row(
                    "SELECT value FROM app_state WHERE key = ?1",
                    params![LAST_RUN_INDEX_KEY],
                    |row| row.get(0),
                )
                .optional()?;

            value
                .map(|raw| {
                    raw.parse::<usize>()
                        .with_context(|| format!("invalid last run index '{raw}'"))
                })
                .transpose()
        })
        .await
    }

    /// The workout after the last completed one, capped at the final workout.
    pub async fn recommended_run_index(&self, catalog_len: usize) -> Result<usize> {
        let last = self.last_run_index().await?;
        Ok(match last {
            None => 0,
            Some(index) => (index + 1).min(catalog_len.saturating_sub(1)),
        })
    }

    pub async fn reset_progress(&self) -> Result<()> {
        self.execute(move |conn| {
            conn.execute_batch("DELETE FROM run_progress; DELETE FROM app_state;")
                .context("failed to reset progress")?;
            Ok(())
        })
        .await
    }
}
