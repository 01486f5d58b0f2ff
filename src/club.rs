// ⚽ Club - one command in, store mutation, then a full projection sync
//
// Every mutating command commits locally first. If the sheet push fails the
// local change stays (the store is authoritative) and the command returns
// `ProjectionSyncFailure` so the operator knows the sheet is stale.

use crate::admin::AdminAccess;
use crate::config::Config;
use crate::db::{Database, PlayerRecord};
use crate::error::{Result, RosterError};
use crate::ledger::{ContributionLedger, ExpenseEntry, LedgerSummary};
use crate::money::Money;
use crate::projection::{ProjectionSynchronizer, SyncOutcome};
use crate::ranking::{standings, MatchEvent, MatchReport, RankingEngine};
use crate::sheet::{CsvWorkbook, RetryingSheet, SheetClient};
use crate::store::PlayerStore;
use tracing::warn;

pub struct Club<C> {
    db: Database,
    ranking: RankingEngine,
    ledger: ContributionLedger,
    projection: ProjectionSynchronizer<C>,
}

impl Club<RetryingSheet<CsvWorkbook>> {
    /// Production wiring: SQLite file + CSV workbook behind retries.
    pub fn open(config: &Config) -> Result<Self> {
        let db = Database::open(&config.database_path)?;
        let client = RetryingSheet::new(CsvWorkbook::new(&config.workbook_dir), config.sync);

        Ok(Club::new(
            db,
            RankingEngine::with_points(config.points),
            ProjectionSynchronizer::new(client, config.layout()),
        ))
    }
}

impl<C: SheetClient> Club<C> {
    pub fn new(db: Database, ranking: RankingEngine, projection: ProjectionSynchronizer<C>) -> Self {
        Club {
            db,
            ranking,
            ledger: ContributionLedger::new(),
            projection,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn projection(&self) -> &ProjectionSynchronizer<C> {
        &self.projection
    }

    pub fn projection_mut(&mut self) -> &mut ProjectionSynchronizer<C> {
        &mut self.projection
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    pub fn record_match(&mut self, event: &MatchEvent) -> Result<MatchReport> {
        let report = self.ranking.record_match_result(&mut self.db, event)?;
        self.publish(report)
    }

    pub fn record_offence(&mut self, player_name: &str) -> Result<PlayerRecord> {
        let record = self.ranking.record_offence(&mut self.db, player_name)?;
        self.publish(record)
    }

    pub fn record_contribution(&mut self, player_name: &str, amount: Money) -> Result<PlayerRecord> {
        let record = self.ledger.record_contribution(&mut self.db, player_name, amount)?;
        self.publish(record)
    }

    pub fn record_expense(
        &mut self,
        access: AdminAccess,
        amount: Money,
        description: &str,
    ) -> Result<ExpenseEntry> {
        let entry = self.ledger.record_expense(&mut self.db, access, amount, description)?;
        self.publish(entry)
    }

    /// Push the current state to the sheet.
    pub fn sync(&mut self) -> Result<SyncOutcome> {
        self.projection.sync(&self.db, &self.ledger)
    }

    /// Import the players worksheet into an empty store, then push back the
    /// canonical projection.
    pub fn bootstrap(&mut self) -> Result<usize> {
        let imported = self.projection.bootstrap(&mut self.db)?;
        self.publish(imported)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Players by points, descending; ties in registration order.
    pub fn standings(&self) -> Result<Vec<PlayerRecord>> {
        Ok(standings(PlayerStore::new(self.db.connection()).list_all()?))
    }

    pub fn player(&self, name: &str) -> Result<PlayerRecord> {
        PlayerStore::new(self.db.connection())
            .get(name)?
            .ok_or_else(|| RosterError::PlayerNotFound(name.trim().to_string()))
    }

    pub fn ledger_summary(&self) -> Result<LedgerSummary> {
        self.ledger.summary(&self.db)
    }

    pub fn balance(&self) -> Result<Money> {
        self.ledger.compute_balance(&self.db)
    }

    fn publish<T>(&mut self, value: T) -> Result<T> {
        match self.sync() {
            Ok(_) => Ok(value),
            Err(err) => {
                warn!(error = %err, "local store updated but sheet projection is stale");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::SheetLayout;
    use crate::ranking::MatchResult;
    use crate::sheet::MemorySheet;

    fn club() -> Club<MemorySheet> {
        Club::new(
            Database::open_in_memory().unwrap(),
            RankingEngine::new(),
            ProjectionSynchronizer::new(MemorySheet::new(), SheetLayout::default()),
        )
    }

    #[test]
    fn test_every_command_syncs() {
        let mut club = club();

        let event = MatchEvent::new(["Alice"], MatchResult::Win).with_goals("Alice", 1);
        club.record_match(&event).unwrap();
        club.record_contribution("Alice", Money::from_units(10)).unwrap();
        club.record_offence("Alice").unwrap();
        club
            .record_expense(AdminAccess::Granted, Money::from_units(4), "")
            .unwrap();

        // Two worksheets per command
        assert_eq!(club.projection().client().write_count(), 8);

        let sheet = club.projection().client().worksheet("players").unwrap();
        assert_eq!(sheet[1], vec!["Alice", "1", "1", "1", "10.00"]);
        assert_eq!(club.balance().unwrap(), Money::from_units(6));
    }

    #[test]
    fn test_sync_failure_keeps_local_change() {
        let mut club = club();
        club.projection_mut().client_mut().set_offline(true);

        let err = club
            .record_contribution("Alice", Money::from_units(50))
            .unwrap_err();

        assert!(err.is_stale_projection());
        assert_eq!(club.player("Alice").unwrap().contribution(), Money::from_units(50));

        // Next successful sync catches the sheet up
        club.projection_mut().client_mut().set_offline(false);
        club.sync().unwrap();
        let sheet = club.projection().client().worksheet("players").unwrap();
        assert_eq!(sheet[1][4], "50.00");
    }

    #[test]
    fn test_rejected_command_does_not_sync() {
        let mut club = club();

        assert!(matches!(
            club.record_offence("Ghost"),
            Err(RosterError::PlayerNotFound(_))
        ));
        assert!(matches!(
            club.record_expense(AdminAccess::Denied, Money::from_units(1), ""),
            Err(RosterError::AccessDenied(_))
        ));
        assert_eq!(club.projection().client().write_count(), 0);
    }

    #[test]
    fn test_player_lookup() {
        let club = club();
        assert!(matches!(
            club.player("Nobody"),
            Err(RosterError::PlayerNotFound(ref n)) if n == "Nobody"
        ));
    }
}
