// 🔄 Projection Synchronizer - local store → external sheet
//
// Reconciliation is upsert-by-key on the player name:
//   1. read the worksheet as it is now
//   2. match every current player against the existing rows (update/append)
//   3. rewrite header + all rows, points descending
//
// Step 3 is a full rewrite, so rows edited or added by hand are discarded and
// running the sync twice without a mutation in between writes identical bytes.
// An existing worksheet that cannot be read back is rewritten anyway.
// The sheet is read as a source of truth exactly once: `bootstrap` into an
// empty store, players and ledger together.

use crate::db::{Database, PlayerRecord};
use crate::error::Result;
use crate::ledger::{
    insert_contribution, insert_expense, ContributionLedger, ExpenseEntry, LedgerSummary,
    DEFAULT_EXPENSE_DESCRIPTION,
};
use crate::money::Money;
use crate::ranking::standings;
use crate::sheet::{Row, SheetClient, SheetError};
use crate::store::PlayerStore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

pub const PLAYER_HEADER: [&str; 5] = ["Player", "Appearances", "Goals Scored", "Points", "Contribution"];
pub const LEDGER_HEADER: [&str; 2] = ["Player", "Amount"];
pub const EXPENSES_LABEL: &str = "Expenses";
pub const BALANCE_LABEL: &str = "Balance";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLayout {
    pub players_worksheet: String,
    pub ledger_worksheet: String,
}

impl Default for SheetLayout {
    fn default() -> Self {
        SheetLayout {
            players_worksheet: "players".to_string(),
            ledger_worksheet: "contributions".to_string(),
        }
    }
}

/// What one worksheet rewrite did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub worksheet: String,
    /// Data rows written, header excluded
    pub rows_written: usize,
    /// Existing rows whose values changed
    pub updated: usize,
    /// Existing rows already showing the current values
    pub unchanged: usize,
    /// Players with no row before this sync
    pub appended: usize,
    /// Rows dropped: unknown names, duplicate keys and blank keys
    pub discarded: usize,
    /// The previous worksheet could not be read and was replaced blind
    pub replaced_unreadable: bool,
    /// SHA-256 of the written content
    pub digest: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub players: SyncReport,
    pub ledger: SyncReport,
}

// ============================================================================
// SYNCHRONIZER
// ============================================================================

pub struct ProjectionSynchronizer<C> {
    client: C,
    layout: SheetLayout,
}

impl<C: SheetClient> ProjectionSynchronizer<C> {
    pub fn new(client: C, layout: SheetLayout) -> Self {
        ProjectionSynchronizer { client, layout }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    /// Push the whole current state: standings and ledger.
    pub fn sync(&mut self, db: &Database, ledger: &ContributionLedger) -> Result<SyncOutcome> {
        let players = PlayerStore::new(db.connection()).list_all()?;
        let summary = ledger.summary(db)?;

        Ok(SyncOutcome {
            players: self.sync_players(&players)?,
            ledger: self.sync_ledger(&summary)?,
        })
    }

    /// Reconcile the players worksheet with `players` (registration order).
    pub fn sync_players(&mut self, players: &[PlayerRecord]) -> Result<SyncReport> {
        let worksheet = self.layout.players_worksheet.clone();
        let mut report = SyncReport {
            worksheet: worksheet.clone(),
            ..SyncReport::default()
        };

        // The old rows only feed the report; a sheet we cannot decode is
        // overwritten like any other.
        let existing = match self.client.read_rows(&worksheet) {
            Ok(rows) => rows,
            Err(err) if !err.is_transient() => {
                warn!(worksheet = %worksheet, error = %err, "existing worksheet unreadable, replacing it");
                report.replaced_unreadable = true;
                Vec::new()
            }
            Err(err) => return Err(err.into()),
        };

        // Key -> existing row, first occurrence wins
        let mut by_key: HashMap<&str, &Row> = HashMap::new();
        let mut dropped = 0;
        for row in data_rows(&existing, &PLAYER_HEADER) {
            let Some(key) = row.first().map(|cell| cell.trim()) else {
                continue;
            };
            if key.is_empty() || by_key.insert(key, row).is_some() {
                dropped += 1;
            }
        }

        let mut current_keys = HashSet::new();
        for player in players {
            current_keys.insert(player.name());
            match by_key.get(player.name()) {
                Some(row) if **row == render_player_row(player) => report.unchanged += 1,
                Some(_) => report.updated += 1,
                None => report.appended += 1,
            }
        }
        report.discarded = dropped
            + by_key
                .keys()
                .filter(|key| !current_keys.contains(**key))
                .count();

        let mut rows: Vec<Row> = Vec::with_capacity(players.len() + 1);
        rows.push(header_row(&PLAYER_HEADER));
        rows.extend(standings(players.to_vec()).iter().map(render_player_row));

        self.client.write_rows(&worksheet, &rows)?;

        report.rows_written = rows.len() - 1;
        report.digest = digest_rows(&rows);

        info!(
            worksheet = %worksheet,
            rows = report.rows_written,
            updated = report.updated,
            appended = report.appended,
            discarded = report.discarded,
            "players worksheet synced"
        );
        Ok(report)
    }

    /// Rewrite the ledger worksheet: entries in time order, then the balance.
    pub fn sync_ledger(&mut self, summary: &LedgerSummary) -> Result<SyncReport> {
        let worksheet = self.layout.ledger_worksheet.clone();
        let rows = render_ledger_rows(summary);

        self.client.write_rows(&worksheet, &rows)?;

        let report = SyncReport {
            worksheet: worksheet.clone(),
            rows_written: rows.len() - 1,
            appended: rows.len() - 1,
            digest: digest_rows(&rows),
            ..SyncReport::default()
        };

        debug!(worksheet = %worksheet, rows = report.rows_written, "ledger worksheet synced");
        Ok(report)
    }

    /// Seed an empty store from the sheet: players from the players
    /// worksheet, contribution and expense entries from the ledger worksheet.
    ///
    /// The ledger has to agree with the players: every contribution row names
    /// a known player, each player's contributions add up to the
    /// `Contribution` cell, and the `Balance` row matches the entries. An
    /// empty ledger worksheet turns every non-zero contribution cell into one
    /// opening entry. Nothing is written unless all of it checks out.
    ///
    /// Returns the number of players imported; a store that already has
    /// players is left alone and 0 is returned.
    pub fn bootstrap(&mut self, db: &mut Database) -> Result<usize> {
        if PlayerStore::new(db.connection()).count()? > 0 {
            debug!("store already populated, bootstrap skipped");
            return Ok(0);
        }

        let players_ws = self.layout.players_worksheet.clone();
        let rows = self.client.read_rows(&players_ws)?;
        let players = parse_player_rows(&players_ws, &rows)?;

        let ledger_ws = self.layout.ledger_worksheet.clone();
        let rows = self.client.read_rows(&ledger_ws)?;
        let entries: Vec<LedgerRow> = match parse_ledger_rows(&ledger_ws, &rows)? {
            Some(ledger) => {
                check_ledger(&ledger_ws, &players, &ledger)?;
                ledger.entries.into_iter().map(|(_, entry)| entry).collect()
            }
            None => opening_entries(&players),
        };

        // Spread over the last few microseconds so recording order survives
        let base = Utc::now() - Duration::microseconds(entries.len() as i64);

        db.transaction(|tx| {
            let store = PlayerStore::new(tx);
            for player in &players {
                store.upsert(player)?;
            }

            for (i, entry) in entries.iter().enumerate() {
                let recorded_at = base + Duration::microseconds(i as i64);
                match entry {
                    LedgerRow::Contribution { player, amount } => {
                        insert_contribution(tx, player, *amount, recorded_at)?
                    }
                    LedgerRow::Expense(amount) => insert_expense(
                        tx,
                        &ExpenseEntry {
                            entry_id: uuid::Uuid::new_v4().to_string(),
                            description: DEFAULT_EXPENSE_DESCRIPTION.to_string(),
                            amount: *amount,
                            recorded_at,
                        },
                    )?,
                }
            }
            Ok(())
        })?;

        info!(
            players = players.len(),
            entries = entries.len(),
            "store bootstrapped from sheet"
        );
        Ok(players.len())
    }
}

/// One data row of the ledger worksheet.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LedgerRow {
    Contribution { player: String, amount: Money },
    Expense(Money),
}

#[derive(Debug)]
struct ImportedLedger {
    /// (1-based sheet row, entry)
    entries: Vec<(usize, LedgerRow)>,
    balance: Money,
    balance_row: usize,
}

// ============================================================================
// RENDERING & PARSING
// ============================================================================

pub fn render_player_row(player: &PlayerRecord) -> Row {
    vec![
        player.name().to_string(),
        player.appearances().to_string(),
        player.goals_scored().to_string(),
        player.points().to_string(),
        player.contribution().to_string(),
    ]
}

pub fn render_ledger_rows(summary: &LedgerSummary) -> Vec<Row> {
    let mut entries: Vec<(chrono::DateTime<chrono::Utc>, usize, Row)> = Vec::new();

    for (i, c) in summary.contributions.iter().enumerate() {
        entries.push((c.recorded_at, i, vec![c.player_name.clone(), c.amount.to_string()]));
    }
    let offset = summary.contributions.len();
    for (i, e) in summary.expenses.iter().enumerate() {
        entries.push((
            e.recorded_at,
            offset + i,
            vec![EXPENSES_LABEL.to_string(), e.amount.to_string()],
        ));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut rows = Vec::with_capacity(entries.len() + 2);
    rows.push(header_row(&LEDGER_HEADER));
    rows.extend(entries.into_iter().map(|(_, _, row)| row));
    rows.push(vec![BALANCE_LABEL.to_string(), summary.balance.to_string()]);
    rows
}

fn parse_player_rows(worksheet: &str, rows: &[Row]) -> std::result::Result<Vec<PlayerRecord>, SheetError> {
    let malformed = |row: usize, reason: String| SheetError::Malformed {
        worksheet: worksheet.to_string(),
        row,
        reason,
    };

    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    if !is_header(first, &PLAYER_HEADER) {
        return Err(malformed(1, format!("expected header {:?}", PLAYER_HEADER)));
    }

    let mut seen = HashSet::new();
    let mut players = Vec::new();

    for (idx, row) in rows.iter().enumerate().skip(1) {
        let line = idx + 1;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if row.len() < PLAYER_HEADER.len() {
            return Err(malformed(line, format!("expected {} cells, got {}", PLAYER_HEADER.len(), row.len())));
        }

        let name = row[0].trim();
        if !seen.insert(name.to_string()) {
            return Err(malformed(line, format!("duplicate player {:?}", name)));
        }

        let appearances: u32 = parse_cell(&row[1]).map_err(|reason| malformed(line, reason))?;
        let goals_scored: u32 = parse_cell(&row[2]).map_err(|reason| malformed(line, reason))?;
        let points: i64 = parse_cell(&row[3]).map_err(|reason| malformed(line, reason))?;
        let contribution = Money::parse(&row[4]).map_err(|e| malformed(line, e.to_string()))?;
        if contribution < Money::ZERO {
            return Err(malformed(line, "negative contribution".to_string()));
        }

        let player = PlayerRecord::restore(name, appearances, goals_scored, points, contribution)
            .map_err(|e| malformed(line, e.to_string()))?;
        players.push(player);
    }

    Ok(players)
}

/// `None` when the worksheet has never been written.
fn parse_ledger_rows(worksheet: &str, rows: &[Row]) -> std::result::Result<Option<ImportedLedger>, SheetError> {
    let malformed = |row: usize, reason: String| SheetError::Malformed {
        worksheet: worksheet.to_string(),
        row,
        reason,
    };

    let Some(first) = rows.first() else {
        return Ok(None);
    };
    if !is_header(first, &LEDGER_HEADER) {
        return Err(malformed(1, format!("expected header {:?}", LEDGER_HEADER)));
    }

    let mut entries = Vec::new();
    let mut balance = None;

    for (idx, row) in rows.iter().enumerate().skip(1) {
        let line = idx + 1;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if row.len() < LEDGER_HEADER.len() {
            return Err(malformed(line, format!("expected {} cells, got {}", LEDGER_HEADER.len(), row.len())));
        }

        let label = row[0].trim();
        let amount = Money::parse(&row[1]).map_err(|e| malformed(line, e.to_string()))?;

        if label == BALANCE_LABEL {
            if balance.replace((line, amount)).is_some() {
                return Err(malformed(line, "second Balance row".to_string()));
            }
            continue;
        }
        if !amount.is_positive() {
            return Err(malformed(line, format!("{} is not a positive amount", amount)));
        }
        if label.is_empty() {
            return Err(malformed(line, "blank player".to_string()));
        }

        let entry = if label == EXPENSES_LABEL {
            LedgerRow::Expense(amount)
        } else {
            LedgerRow::Contribution {
                player: label.to_string(),
                amount,
            }
        };
        entries.push((line, entry));
    }

    let (balance_row, balance) =
        balance.ok_or_else(|| malformed(rows.len(), "missing Balance row".to_string()))?;

    Ok(Some(ImportedLedger {
        entries,
        balance,
        balance_row,
    }))
}

fn check_ledger(
    worksheet: &str,
    players: &[PlayerRecord],
    ledger: &ImportedLedger,
) -> std::result::Result<(), SheetError> {
    let malformed = |row: usize, reason: String| SheetError::Malformed {
        worksheet: worksheet.to_string(),
        row,
        reason,
    };
    let overflow = |row: usize| malformed(row, "amounts out of range".to_string());

    let mut paid: HashMap<&str, Money> =
        players.iter().map(|p| (p.name(), Money::ZERO)).collect();
    let mut contributions = Money::ZERO;
    let mut expenses = Money::ZERO;

    for (line, entry) in &ledger.entries {
        match entry {
            LedgerRow::Contribution { player, amount } => {
                let total = paid
                    .get_mut(player.as_str())
                    .ok_or_else(|| malformed(*line, format!("{:?} is not on the players worksheet", player)))?;
                *total = total.checked_add(*amount).ok_or_else(|| overflow(*line))?;
                contributions = contributions.checked_add(*amount).ok_or_else(|| overflow(*line))?;
            }
            LedgerRow::Expense(amount) => {
                expenses = expenses.checked_add(*amount).ok_or_else(|| overflow(*line))?;
            }
        }
    }

    for player in players {
        let total = paid.get(player.name()).copied().unwrap_or(Money::ZERO);
        if total != player.contribution() {
            return Err(malformed(
                ledger.balance_row,
                format!(
                    "contributions for {} add up to {}, players worksheet says {}",
                    player.name(),
                    total,
                    player.contribution()
                ),
            ));
        }
    }

    let expected = contributions
        .checked_sub(expenses)
        .ok_or_else(|| overflow(ledger.balance_row))?;
    if expected != ledger.balance {
        return Err(malformed(
            ledger.balance_row,
            format!("balance {} does not match entries ({})", ledger.balance, expected),
        ));
    }

    Ok(())
}

/// One contribution per player with money on the players worksheet.
fn opening_entries(players: &[PlayerRecord]) -> Vec<LedgerRow> {
    players
        .iter()
        .filter(|p| p.contribution().is_positive())
        .map(|p| LedgerRow::Contribution {
            player: p.name().to_string(),
            amount: p.contribution(),
        })
        .collect()
}

fn parse_cell<T: std::str::FromStr>(cell: &str) -> std::result::Result<T, String> {
    cell.trim()
        .parse::<T>()
        .map_err(|_| format!("{:?} is not a valid count", cell))
}

fn header_row(header: &[&str]) -> Row {
    header.iter().map(|h| h.to_string()).collect()
}

fn is_header(row: &Row, header: &[&str]) -> bool {
    row.len() >= header.len()
        && row
            .iter()
            .zip(header.iter())
            .all(|(cell, expected)| cell.trim() == *expected)
}

/// Rows below the header; a sheet without our header is all data.
fn data_rows<'a>(rows: &'a [Row], header: &[&str]) -> &'a [Row] {
    match rows.first() {
        Some(first) if is_header(first, header) => &rows[1..],
        _ => rows,
    }
}

fn digest_rows(rows: &[Row]) -> String {
    let mut hasher = Sha256::new();
    for row in rows {
        for cell in row {
            hasher.update(cell.as_bytes());
            hasher.update(b"\x1f");
        }
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::AdminAccess;
    use crate::error::RosterError;
    use crate::ranking::{MatchEvent, MatchResult, RankingEngine};
    use crate::sheet::{CsvWorkbook, MemorySheet};

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn player(name: &str, points: i64) -> PlayerRecord {
        PlayerRecord::restore(name, 1, 0, points, Money::ZERO).unwrap()
    }

    fn synchronizer() -> ProjectionSynchronizer<MemorySheet> {
        ProjectionSynchronizer::new(MemorySheet::new(), SheetLayout::default())
    }

    #[test]
    fn test_rows_sorted_by_points_stable() {
        let mut sync = synchronizer();
        let players = vec![player("A", 10), player("B", 15), player("C", 10)];

        let report = sync.sync_players(&players).unwrap();
        assert_eq!(report.appended, 3);
        assert_eq!(report.rows_written, 3);

        let sheet = sync.client().worksheet("players").unwrap();
        assert_eq!(sheet[0], header_row(&PLAYER_HEADER));
        let order: Vec<&str> = sheet[1..].iter().map(|r| r[0].as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_sync_twice_is_identical() {
        let mut sync = synchronizer();
        let players = vec![player("A", 3), player("B", 1)];

        let first = sync.sync_players(&players).unwrap();
        let content = sync.client().worksheet("players").unwrap().to_vec();
        let second = sync.sync_players(&players).unwrap();

        assert_eq!(first.digest, second.digest);
        assert_eq!(sync.client().worksheet("players").unwrap(), content.as_slice());
        assert_eq!(second.unchanged, 2);
        assert_eq!(second.updated, 0);
        assert_eq!(second.appended, 0);
    }

    #[test]
    fn test_upsert_by_key_against_edited_sheet() {
        let mut sync = synchronizer();
        sync.client_mut().put_worksheet(
            "players",
            vec![
                header_row(&PLAYER_HEADER),
                row(&["A", "9", "9", "99", "0.00"]),
                row(&["Stranger", "1", "1", "1", "0.00"]),
                row(&["A", "0", "0", "0", "0.00"]),
                row(&["B", "1", "0", "1", "0.00"]),
            ],
        );

        let report = sync
            .sync_players(&[player("A", 3), player("B", 1), player("C", 0)])
            .unwrap();

        assert_eq!(report.updated, 1, "A had stale values");
        assert_eq!(report.unchanged, 1, "B already current");
        assert_eq!(report.appended, 1, "C is new");
        assert_eq!(report.discarded, 2, "Stranger and the duplicate A row");

        let sheet = sync.client().worksheet("players").unwrap();
        assert_eq!(sheet.len(), 4);
        assert_eq!(sheet[1], row(&["A", "1", "0", "3", "0.00"]));
        assert!(sheet.iter().all(|r| r[0] != "Stranger"));
    }

    #[test]
    fn test_sync_failure_surfaces() {
        let mut sync = synchronizer();
        sync.client_mut().set_offline(true);

        let err = sync.sync_players(&[player("A", 3)]).unwrap_err();
        assert!(matches!(err, RosterError::ProjectionSyncFailure(_)));
    }

    #[test]
    fn test_ledger_rows() {
        let mut db = Database::open_in_memory().unwrap();
        let ledger = ContributionLedger::new();
        ledger.record_contribution(&mut db, "Alice", Money::from_units(10)).unwrap();
        ledger.record_contribution(&mut db, "Bob", Money::from_units(15)).unwrap();
        ledger
            .record_expense(&mut db, AdminAccess::Granted, Money::from_units(5), "balls")
            .unwrap();

        let rows = render_ledger_rows(&ledger.summary(&db).unwrap());
        assert_eq!(
            rows,
            vec![
                row(&["Player", "Amount"]),
                row(&["Alice", "10.00"]),
                row(&["Bob", "15.00"]),
                row(&["Expenses", "5.00"]),
                row(&["Balance", "20.00"]),
            ]
        );
    }

    #[test]
    fn test_full_sync_from_database() {
        let mut db = Database::open_in_memory().unwrap();
        let ledger = ContributionLedger::new();
        let event = MatchEvent::new(["Alice", "Bob"], MatchResult::Win)
            .with_goals("Alice", 2)
            .with_goals("Bob", 0);
        RankingEngine::new().record_match_result(&mut db, &event).unwrap();
        ledger.record_contribution(&mut db, "Cara", Money::from_units(50)).unwrap();

        let mut sync = synchronizer();
        let outcome = sync.sync(&db, &ledger).unwrap();

        assert_eq!(outcome.players.rows_written, 3);
        assert_eq!(outcome.ledger.rows_written, 2);
        let sheet = sync.client().worksheet("players").unwrap();
        assert_eq!(sheet[1], row(&["Alice", "1", "2", "3", "0.00"]));
        assert_eq!(sheet[3], row(&["Cara", "0", "0", "0", "50.00"]));
    }

    #[test]
    fn test_bootstrap_into_empty_store() {
        let mut db = Database::open_in_memory().unwrap();
        let mut sync = synchronizer();
        sync.client_mut().put_worksheet(
            "players",
            vec![
                header_row(&PLAYER_HEADER),
                row(&["Bob", "4", "1", "9", "20.00"]),
                row(&["", "", "", "", ""]),
                row(&["Alice", "2", "3", "-2", "5"]),
            ],
        );

        assert_eq!(sync.bootstrap(&mut db).unwrap(), 2);

        {
            let store = PlayerStore::new(db.connection());
            let bob = store.get("Bob").unwrap().unwrap();
            assert_eq!(bob.points(), 9);
            assert_eq!(bob.contribution(), Money::from_units(20));
            assert_eq!(store.get("Alice").unwrap().unwrap().points(), -2);
        }

        // No ledger worksheet: contribution cells become opening entries
        let ledger = ContributionLedger::new();
        assert_eq!(ledger.contributions(&db).unwrap().len(), 2);
        assert_eq!(ledger.compute_balance(&db).unwrap(), Money::from_units(25));

        // Second bootstrap never re-reads the sheet as a source
        sync.client_mut().put_worksheet("players", vec![header_row(&PLAYER_HEADER)]);
        assert_eq!(sync.bootstrap(&mut db).unwrap(), 0);
        assert_eq!(PlayerStore::new(db.connection()).count().unwrap(), 2);
    }

    #[test]
    fn test_bootstrap_rejects_malformed_rows() {
        let mut db = Database::open_in_memory().unwrap();
        let mut sync = synchronizer();
        sync.client_mut().put_worksheet(
            "players",
            vec![header_row(&PLAYER_HEADER), row(&["Bob", "four", "1", "9", "0"])],
        );

        let err = sync.bootstrap(&mut db).unwrap_err();
        assert!(matches!(
            err,
            RosterError::ProjectionSyncFailure(SheetError::Malformed { row: 2, .. })
        ));
        assert_eq!(PlayerStore::new(db.connection()).count().unwrap(), 0);
    }

    fn seeded_with_ledger(ledger_rows: Vec<Row>) -> ProjectionSynchronizer<MemorySheet> {
        let mut sync = synchronizer();
        sync.client_mut().put_worksheet(
            "players",
            vec![
                header_row(&PLAYER_HEADER),
                row(&["A", "2", "1", "6", "12.00"]),
                row(&["B", "1", "0", "3", "3.00"]),
                row(&["C", "1", "0", "0", "0.00"]),
            ],
        );
        sync.client_mut().put_worksheet("contributions", ledger_rows);
        sync
    }

    #[test]
    fn test_bootstrap_imports_ledger_in_order() {
        let ledger_rows = vec![
            row(&["Player", "Amount"]),
            row(&["A", "10.00"]),
            row(&["Expenses", "2.00"]),
            row(&["B", "3.00"]),
            row(&["A", "2.00"]),
            row(&["Balance", "13.00"]),
        ];
        let mut sync = seeded_with_ledger(ledger_rows.clone());
        let mut db = Database::open_in_memory().unwrap();

        assert_eq!(sync.bootstrap(&mut db).unwrap(), 3);

        let ledger = ContributionLedger::new();
        let summary = ledger.summary(&db).unwrap();
        assert_eq!(summary.contributions.len(), 3);
        assert_eq!(summary.expenses.len(), 1);
        assert_eq!(summary.balance, Money::from_units(13));

        // Re-rendering gives back the sheet it came from
        assert_eq!(render_ledger_rows(&summary), ledger_rows);
        let outcome = sync.sync(&db, &ledger).unwrap();
        assert_eq!(sync.client().worksheet("contributions").unwrap(), ledger_rows.as_slice());
        assert_eq!(outcome.ledger.rows_written, 5);
    }

    #[test]
    fn test_bootstrap_rejects_ledger_disagreeing_with_players() {
        let cases = vec![
            // A's entries add up to 10, the players sheet says 12
            vec![
                row(&["Player", "Amount"]),
                row(&["A", "10.00"]),
                row(&["B", "3.00"]),
                row(&["Balance", "13.00"]),
            ],
            // Balance row off by one
            vec![
                row(&["Player", "Amount"]),
                row(&["A", "12.00"]),
                row(&["B", "3.00"]),
                row(&["Balance", "14.00"]),
            ],
            // Contribution from someone who is not a player
            vec![
                row(&["Player", "Amount"]),
                row(&["A", "12.00"]),
                row(&["B", "3.00"]),
                row(&["Z", "1.00"]),
                row(&["Balance", "16.00"]),
            ],
            // Balance row missing
            vec![row(&["Player", "Amount"]), row(&["A", "12.00"]), row(&["B", "3.00"])],
        ];

        for ledger_rows in cases {
            let mut sync = seeded_with_ledger(ledger_rows);
            let mut db = Database::open_in_memory().unwrap();

            let err = sync.bootstrap(&mut db).unwrap_err();
            assert!(
                matches!(
                    err,
                    RosterError::ProjectionSyncFailure(SheetError::Malformed { ref worksheet, .. })
                        if worksheet == "contributions"
                ),
                "unexpected error: {}",
                err
            );
            assert_eq!(PlayerStore::new(db.connection()).count().unwrap(), 0);
            assert!(ContributionLedger::new().contributions(&db).unwrap().is_empty());
        }
    }

    /// Reads fail with a decode error, writes go through.
    struct Garbled {
        inner: MemorySheet,
    }

    impl SheetClient for Garbled {
        fn read_rows(&mut self, worksheet: &str) -> std::result::Result<Vec<Row>, SheetError> {
            Err(SheetError::Malformed {
                worksheet: worksheet.to_string(),
                row: 1,
                reason: "invalid UTF-8".to_string(),
            })
        }

        fn write_rows(&mut self, worksheet: &str, rows: &[Row]) -> std::result::Result<(), SheetError> {
            self.inner.write_rows(worksheet, rows)
        }
    }

    #[test]
    fn test_unreadable_sheet_is_replaced() {
        let mut sync = ProjectionSynchronizer::new(
            Garbled {
                inner: MemorySheet::new(),
            },
            SheetLayout::default(),
        );

        let report = sync.sync_players(&[player("A", 3)]).unwrap();

        assert!(report.replaced_unreadable);
        assert_eq!(report.appended, 1);
        let sheet = sync.client().inner.worksheet("players").unwrap();
        assert_eq!(sheet[1], row(&["A", "1", "0", "3", "0.00"]));
    }

    #[test]
    fn test_blank_keys_are_discarded() {
        let mut sync = synchronizer();
        sync.client_mut().put_worksheet(
            "players",
            vec![header_row(&PLAYER_HEADER), row(&["  ", "1", "1", "1", "0.00"])],
        );

        let report = sync.sync_players(&[player("A", 3)]).unwrap();
        assert_eq!(report.discarded, 1);
        assert!(!report.replaced_unreadable);
    }

    #[test]
    fn test_csv_workbook_sync_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let mut sync = ProjectionSynchronizer::new(CsvWorkbook::new(dir.path()), SheetLayout::default());
        let players = vec![player("A", 3), player("B, Jr.", 5)];

        sync.sync_players(&players).unwrap();
        let first = std::fs::read(sync.client().worksheet_path("players")).unwrap();
        sync.sync_players(&players).unwrap();
        let second = std::fs::read(sync.client().worksheet_path("players")).unwrap();

        assert_eq!(first, second);
        let text = String::from_utf8(first).unwrap();
        assert_eq!(
            text.lines().next(),
            Some("Player,Appearances,Goals Scored,Points,Contribution")
        );
        assert!(text.contains("\"B, Jr.\",1,0,5,0.00"));
    }
}
