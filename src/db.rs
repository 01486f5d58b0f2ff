use crate::error::{Result, RosterError};
use crate::money::Money;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// One row of the roster.
///
/// `name` is the primary key and never changes once the record exists.
/// Counters are only moved by `RankingEngine` (appearances, goals, points)
/// and `ContributionLedger` (contribution); everything else reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerRecord {
    pub(crate) name: String,
    pub(crate) appearances: u32,
    pub(crate) goals_scored: u32,
    /// May go negative after offence deductions
    pub(crate) points: i64,
    pub(crate) contribution: Money,
    pub(crate) registered_at: DateTime<Utc>,
}

impl PlayerRecord {
    /// Fresh record with every aggregate at zero. Names are trimmed; a blank
    /// name is not a valid key.
    pub fn new(name: &str) -> Result<Self> {
        Ok(PlayerRecord {
            name: normalize_name(name)?,
            appearances: 0,
            goals_scored: 0,
            points: 0,
            contribution: Money::ZERO,
            registered_at: Utc::now(),
        })
    }

    /// Rebuild a record from values held elsewhere (sheet bootstrap).
    pub(crate) fn restore(
        name: &str,
        appearances: u32,
        goals_scored: u32,
        points: i64,
        contribution: Money,
    ) -> Result<Self> {
        let mut record = PlayerRecord::new(name)?;
        record.appearances = appearances;
        record.goals_scored = goals_scored;
        record.points = points;
        record.contribution = contribution;
        Ok(record)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn appearances(&self) -> u32 {
        self.appearances
    }

    pub fn goals_scored(&self) -> u32 {
        self.goals_scored
    }

    pub fn points(&self) -> i64 {
        self.points
    }

    pub fn contribution(&self) -> Money {
        self.contribution
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }
}

impl fmt::Display for PlayerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: appearances {}, goals {}, points {}, contribution {}",
            self.name, self.appearances, self.goals_scored, self.points, self.contribution
        )
    }
}

/// Trim and validate a player name used as a key.
pub fn normalize_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RosterError::InvalidEvent("player name is blank".to_string()));
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// DATABASE
// ============================================================================

/// Owner of the local SQLite connection.
///
/// All writes go through [`Database::transaction`]: the closure runs inside a
/// single SQLite transaction that commits when it returns `Ok` and rolls back
/// on `Err` (or if the closure panics, when the transaction is dropped).
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        debug!(path = %path.display(), "roster database opened");
        Ok(Database { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(Database { conn })
    }

    /// Read-only access for queries outside a transaction.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
    {
        let tx = self.conn.transaction()?;
        // On error `tx` is dropped here, which rolls back.
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Players (one row per player, rowid keeps registration order)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS players (
            name TEXT PRIMARY KEY,
            appearance INTEGER NOT NULL DEFAULT 0,
            goals_scored INTEGER NOT NULL DEFAULT 0,
            point INTEGER NOT NULL DEFAULT 0,
            contribution INTEGER NOT NULL DEFAULT 0,
            registered_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Ledger (append-only)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS contributions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id TEXT UNIQUE NOT NULL,
            player_name TEXT NOT NULL,
            amount INTEGER NOT NULL CHECK (amount > 0),
            recorded_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id TEXT UNIQUE NOT NULL,
            description TEXT NOT NULL,
            amount INTEGER NOT NULL CHECK (amount > 0),
            recorded_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contributions_player ON contributions(player_name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_expenses_recorded_at ON expenses(recorded_at)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_starts_at_zero() {
        let record = PlayerRecord::new("  Alice ").unwrap();

        assert_eq!(record.name(), "Alice");
        assert_eq!(record.appearances(), 0);
        assert_eq!(record.goals_scored(), 0);
        assert_eq!(record.points(), 0);
        assert_eq!(record.contribution(), Money::ZERO);
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(matches!(
            PlayerRecord::new("   "),
            Err(RosterError::InvalidEvent(_))
        ));
    }

    #[test]
    fn test_display_summary() {
        let record = PlayerRecord::restore("Alice", 1, 2, 3, Money::from_units(50)).unwrap();
        assert_eq!(
            record.to_string(),
            "Alice: appearances 1, goals 2, points 3, contribution 50.00"
        );
    }

    #[test]
    fn test_setup_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        setup_database(db.connection()).unwrap();

        let tables: i64 = db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('players', 'contributions', 'expenses')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mut db = Database::open_in_memory().unwrap();

        let result: Result<()> = db.transaction(|tx| {
            tx.execute(
                "INSERT INTO players (name, registered_at) VALUES ('Alice', '2025-01-01T00:00:00Z')",
                [],
            )?;
            Err(RosterError::InvalidEvent("abort".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0, "failed transaction must leave no rows behind");
    }

    #[test]
    fn test_transaction_commits_on_success() {
        let mut db = Database::open_in_memory().unwrap();

        db.transaction(|tx| {
            tx.execute(
                "INSERT INTO players (name, registered_at) VALUES ('Bob', '2025-01-01T00:00:00Z')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_open_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.db");

        {
            let mut db = Database::open(&path).unwrap();
            db.transaction(|tx| {
                tx.execute(
                    "INSERT INTO players (name, registered_at) VALUES ('Cara', '2025-01-01T00:00:00Z')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
