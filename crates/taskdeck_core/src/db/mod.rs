//! SQLite connections for `SqliteTaskStorage`.
//!
//! # Invariants
//! - A connection handed out is already on `schema::target_version()`.
//! - A database written by a newer build is refused, never downgraded.

use log::{error, info};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::{Duration, Instant};

pub mod schema;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file carries a schema this build does not know.
    SchemaTooNew { found: u32, supported: u32 },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "task database schema v{found} was written by a newer build (this build reads up to v{supported})"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Where a task database lives.
#[derive(Debug, Clone, Copy)]
pub enum DbLocation<'a> {
    File(&'a Path),
    /// Private, discarded when the connection drops.
    Memory,
}

impl DbLocation<'_> {
    fn label(self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }
}

/// Opens the database at `location` and upgrades its schema.
pub fn connect(location: DbLocation<'_>) -> DbResult<Connection> {
    let started_at = Instant::now();
    let opened = match location {
        DbLocation::File(path) => Connection::open(path),
        DbLocation::Memory => Connection::open_in_memory(),
    };
    let connected = opened.map_err(DbError::from).and_then(prepare);

    match &connected {
        Ok(_) => info!(
            "event=db_connect module=db status=ok location={} duration_ms={}",
            location.label(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_connect module=db status=error location={} duration_ms={} error={err}",
            location.label(),
            started_at.elapsed().as_millis()
        ),
    }
    connected
}

fn prepare(mut conn: Connection) -> DbResult<Connection> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    schema::upgrade(&mut conn)?;
    Ok(conn)
}
