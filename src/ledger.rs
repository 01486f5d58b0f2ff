// 💰 Contribution Ledger - append-only contributions & expenses
//
// Balance policy (cumulative):
//   balance = sum(contributions) - sum(expenses)
//
// Entries are never updated or deleted. A contribution also bumps the
// player's `contribution` aggregate inside the same transaction.

use crate::admin::AdminAccess;
use crate::db::{normalize_name, Database, PlayerRecord};
use crate::error::{Result, RosterError};
use crate::money::Money;
use crate::store::PlayerStore;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::info;

pub const DEFAULT_EXPENSE_DESCRIPTION: &str = "Expenses";

// ============================================================================
// ENTRIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionEntry {
    pub entry_id: String,
    /// Need not match a registered player at the time of writing
    pub player_name: String,
    pub amount: Money,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseEntry {
    pub entry_id: String,
    pub description: String,
    pub amount: Money,
    pub recorded_at: DateTime<Utc>,
}

/// Everything the projection needs to render the ledger worksheet.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerSummary {
    pub contributions: Vec<ContributionEntry>,
    pub expenses: Vec<ExpenseEntry>,
    pub total_contributions: Money,
    pub total_expenses: Money,
    pub balance: Money,
}

// ============================================================================
// LEDGER
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct ContributionLedger;

impl ContributionLedger {
    pub fn new() -> Self {
        ContributionLedger
    }

    /// Append a contribution and add it to the player's aggregate,
    /// auto-registering unknown names.
    pub fn record_contribution(
        &self,
        db: &mut Database,
        player_name: &str,
        amount: Money,
    ) -> Result<PlayerRecord> {
        let amount = amount.ensure_positive()?;
        let name = normalize_name(player_name)?;

        let record = db.transaction(|tx| {
            let store = PlayerStore::new(tx);
            let (mut record, _) = store.get_or_register(&name)?;

            record.contribution = record.contribution.checked_add(amount).ok_or_else(|| {
                RosterError::InvalidAmount(format!("{}: contribution total overflows", name))
            })?;

            insert_contribution(tx, &name, amount, Utc::now())?;
            store.upsert(&record)?;

            Ok(record)
        })?;

        info!(player = %record.name(), amount = %amount, "contribution recorded");
        Ok(record)
    }

    /// Admin-only. Access is checked before the amount, and nothing is
    /// written when either check fails.
    pub fn record_expense(
        &self,
        db: &mut Database,
        access: AdminAccess,
        amount: Money,
        description: &str,
    ) -> Result<ExpenseEntry> {
        if !access.is_granted() {
            return Err(RosterError::AccessDenied("recording an expense"));
        }
        let amount = amount.ensure_positive()?;

        let description = match description.trim() {
            "" => DEFAULT_EXPENSE_DESCRIPTION.to_string(),
            text => text.to_string(),
        };

        let entry = ExpenseEntry {
            entry_id: uuid::Uuid::new_v4().to_string(),
            description,
            amount,
            recorded_at: Utc::now(),
        };

        db.transaction(|tx| insert_expense(tx, &entry))?;

        info!(amount = %entry.amount, description = %entry.description, "expense recorded");
        Ok(entry)
    }

    /// Recomputed from the entry tables on every call.
    pub fn compute_balance(&self, db: &Database) -> Result<Money> {
        let (contributions, expenses) = self.totals(db)?;
        balance_of(contributions, expenses)
    }

    /// Contributions in recording order
    pub fn contributions(&self, db: &Database) -> Result<Vec<ContributionEntry>> {
        let mut stmt = db.connection().prepare(
            "SELECT entry_id, player_name, amount, recorded_at
             FROM contributions
             ORDER BY id",
        )?;

        let entries = stmt
            .query_map([], |row| {
                Ok(ContributionEntry {
                    entry_id: row.get(0)?,
                    player_name: row.get(1)?,
                    amount: Money::from_cents(row.get(2)?),
                    recorded_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Expenses in timestamp order
    pub fn expenses(&self, db: &Database) -> Result<Vec<ExpenseEntry>> {
        let mut stmt = db.connection().prepare(
            "SELECT entry_id, description, amount, recorded_at
             FROM expenses
             ORDER BY recorded_at, id",
        )?;

        let entries = stmt
            .query_map([], |row| {
                Ok(ExpenseEntry {
                    entry_id: row.get(0)?,
                    description: row.get(1)?,
                    amount: Money::from_cents(row.get(2)?),
                    recorded_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    pub fn summary(&self, db: &Database) -> Result<LedgerSummary> {
        let (total_contributions, total_expenses) = self.totals(db)?;

        Ok(LedgerSummary {
            contributions: self.contributions(db)?,
            expenses: self.expenses(db)?,
            total_contributions,
            total_expenses,
            balance: balance_of(total_contributions, total_expenses)?,
        })
    }

    fn totals(&self, db: &Database) -> Result<(Money, Money)> {
        let conn = db.connection();

        let contributions: i64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM contributions",
            [],
            |row| row.get(0),
        )?;
        let expenses: i64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM expenses",
            [],
            |row| row.get(0),
        )?;

        Ok((Money::from_cents(contributions), Money::from_cents(expenses)))
    }
}

/// Append a contribution row only; the player's aggregate is the caller's job.
pub(crate) fn insert_contribution(
    conn: &Connection,
    player_name: &str,
    amount: Money,
    recorded_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO contributions (entry_id, player_name, amount, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            uuid::Uuid::new_v4().to_string(),
            player_name,
            amount.cents(),
            recorded_at,
        ],
    )?;
    Ok(())
}

pub(crate) fn insert_expense(conn: &Connection, entry: &ExpenseEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO expenses (entry_id, description, amount, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            entry.entry_id,
            entry.description,
            entry.amount.cents(),
            entry.recorded_at,
        ],
    )?;
    Ok(())
}

fn balance_of(contributions: Money, expenses: Money) -> Result<Money> {
    contributions
        .checked_sub(expenses)
        .ok_or_else(|| RosterError::InvalidAmount("balance out of range".to_string()))
}
