// 🗄️ PlayerStore - keyed collection of PlayerRecord on top of SQLite
//
// The store borrows a connection (usually the open transaction handed out by
// `Database::transaction`) and never commits on its own.

use crate::db::{normalize_name, PlayerRecord};
use crate::error::Result;
use crate::money::Money;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

pub struct PlayerStore<'c> {
    conn: &'c Connection,
}

impl<'c> PlayerStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        PlayerStore { conn }
    }

    /// Exact lookup by name. A missing player is `Ok(None)`, not an error.
    pub fn get(&self, name: &str) -> Result<Option<PlayerRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT name, appearance, goals_scored, point, contribution, registered_at
                 FROM players
                 WHERE name = ?1",
                params![name.trim()],
                map_player_row,
            )
            .optional()?;

        Ok(record)
    }

    /// Insert a new name or overwrite every aggregate of an existing one.
    /// Single statement, so readers never observe a half-written row; the
    /// original rowid (registration order) survives the overwrite.
    pub fn upsert(&self, record: &PlayerRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO players (name, appearance, goals_scored, point, contribution, registered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(name) DO UPDATE SET
                appearance = excluded.appearance,
                goals_scored = excluded.goals_scored,
                point = excluded.point,
                contribution = excluded.contribution",
            params![
                record.name,
                record.appearances,
                record.goals_scored,
                record.points,
                record.contribution.cents(),
                record.registered_at,
            ],
        )?;

        Ok(())
    }

    /// Every player in registration order. Display ordering is the caller's job.
    pub fn list_all(&self) -> Result<Vec<PlayerRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, appearance, goals_scored, point, contribution, registered_at
             FROM players
             ORDER BY rowid",
        )?;

        let players = stmt
            .query_map([], map_player_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(players)
    }

    /// Auto-registration: return the existing record or create a zeroed one.
    /// The returned flag is true when the player was created by this call.
    pub fn get_or_register(&self, name: &str) -> Result<(PlayerRecord, bool)> {
        let name = normalize_name(name)?;

        if let Some(existing) = self.get(&name)? {
            return Ok((existing, false));
        }

        let record = PlayerRecord::new(&name)?;
        self.upsert(&record)?;
        info!(player = %name, "auto-registered player");

        Ok((record, true))
    }

    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))?;

        Ok(count)
    }
}

fn map_player_row(row: &Row<'_>) -> rusqlite::Result<PlayerRecord> {
    Ok(PlayerRecord {
        name: row.get(0)?,
        appearances: row.get(1)?,
        goals_scored: row.get(2)?,
        points: row.get(3)?,
        contribution: Money::from_cents(row.get(4)?),
        registered_at: row.get(5)?,
    })
}
