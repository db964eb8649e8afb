//! Versioned DDL for the `tasks` table.
//!
//! Step `n` (1-based) takes a database from version `n - 1` to `n`. The
//! version lives in `PRAGMA user_version`; all pending steps commit together.

use super::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

const STEPS: &[&str] = &[include_str!("sql/0001_tasks.sql")];

/// Schema version this build writes.
pub fn target_version() -> u32 {
    u32::try_from(STEPS.len()).unwrap_or(u32::MAX)
}

pub fn stored_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Runs pending steps and returns the version the database started at.
///
/// # Errors
/// `SchemaTooNew` when the stored version is ahead of `target_version()`.
pub fn upgrade(conn: &mut Connection) -> DbResult<u32> {
    let found = stored_version(conn)?;
    let target = target_version();
    if found > target {
        return Err(DbError::SchemaTooNew {
            found,
            supported: target,
        });
    }

    let pending = usize::try_from(found)
        .ok()
        .and_then(|applied| STEPS.get(applied..))
        .unwrap_or_default();
    if pending.is_empty() {
        return Ok(found);
    }

    let tx = conn.transaction()?;
    for (version, ddl) in (found + 1..).zip(pending) {
        tx.execute_batch(ddl)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;

    info!("event=db_upgrade module=db status=ok from_version={found} to_version={target}");
    Ok(found)
}
