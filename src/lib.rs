// Club Roster - Core Library
// Ranking & reconciliation engine shared by the CLI, the API server and tests

pub mod admin;
pub mod club;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod money;
pub mod projection;
pub mod ranking;
pub mod sheet;
pub mod store;

// Re-export commonly used types
pub use admin::{AdminAccess, AdminCredentials};
pub use club::Club;
pub use config::Config;
pub use db::{Database, PlayerRecord};
pub use error::{Result, RosterError};
pub use ledger::{ContributionEntry, ContributionLedger, ExpenseEntry, LedgerSummary};
pub use money::Money;
pub use projection::{
    ProjectionSynchronizer, SheetLayout, SyncOutcome, SyncReport,
    PLAYER_HEADER, LEDGER_HEADER,
};
pub use ranking::{standings, MatchEvent, MatchReport, MatchResult, PointsTable, RankingEngine};
pub use sheet::{CsvWorkbook, MemorySheet, RetryPolicy, RetryingSheet, SheetClient, SheetError};
pub use store::PlayerStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
