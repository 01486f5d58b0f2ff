// 🏆 Ranking Engine - folds match results and offences into player aggregates
//
// Accounting is exact and linear:
//   points = win_points * wins + draw_points * draws - offence_penalty * offences
//
// Events are NOT idempotent. Replaying a match counts it twice; the caller
// guarantees at-most-once delivery.

use crate::db::{normalize_name, Database, PlayerRecord};
use crate::error::{Result, RosterError};
use crate::store::PlayerStore;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

// ============================================================================
// MATCH RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchResult {
    Win,
    Draw,
    /// Counts the appearance and goals, no points
    Loss,
}

impl MatchResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchResult::Win => "win",
            MatchResult::Draw => "draw",
            MatchResult::Loss => "loss",
        }
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchResult {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "win" | "w" => Ok(MatchResult::Win),
            "draw" | "d" => Ok(MatchResult::Draw),
            "loss" | "l" => Ok(MatchResult::Loss),
            other => Err(RosterError::InvalidEvent(format!(
                "unknown match result {:?} (expected win, draw or loss)",
                other
            ))),
        }
    }
}

// ============================================================================
// POINTS TABLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointsTable {
    pub win: i64,
    pub draw: i64,
    pub loss: i64,
    /// Deducted per offence, no floor at zero
    pub offence_penalty: i64,
}

impl Default for PointsTable {
    fn default() -> Self {
        PointsTable {
            win: 3,
            draw: 1,
            loss: 0,
            offence_penalty: 2,
        }
    }
}

impl PointsTable {
    pub fn for_result(&self, result: MatchResult) -> i64 {
        match result {
            MatchResult::Win => self.win,
            MatchResult::Draw => self.draw,
            MatchResult::Loss => self.loss,
        }
    }
}

// ============================================================================
// EVENTS & REPORTS
// ============================================================================

/// A finished match as reported by the operator.
#[derive(Debug, Clone)]
pub struct MatchEvent {
    /// Players who appeared; duplicates collapse to the first occurrence
    pub players: Vec<String>,
    pub result: MatchResult,
    /// Goals per player. Every player in `players` needs an entry, 0 included.
    pub goals: HashMap<String, u32>,
}

impl MatchEvent {
    pub fn new<I, S>(players: I, result: MatchResult) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MatchEvent {
            players: players.into_iter().map(Into::into).collect(),
            result,
            goals: HashMap::new(),
        }
    }

    pub fn with_goals(mut self, player: &str, goals: u32) -> Self {
        self.goals.insert(player.to_string(), goals);
        self
    }
}

#[derive(Debug, Clone)]
pub struct MatchReport {
    pub result: MatchResult,
    /// Records after the update, in event order
    pub players: Vec<PlayerRecord>,
    /// Names created by this event
    pub registered: Vec<String>,
}

// ============================================================================
// RANKING ENGINE
// ============================================================================

pub struct RankingEngine {
    points: PointsTable,
}

impl Default for RankingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RankingEngine {
    pub fn new() -> Self {
        RankingEngine {
            points: PointsTable::default(),
        }
    }

    pub fn with_points(points: PointsTable) -> Self {
        RankingEngine { points }
    }

    pub fn points_table(&self) -> &PointsTable {
        &self.points
    }

    /// Check the whole event before touching the store.
    ///
    /// Returns `(name, goals)` pairs in event order with names normalized
    /// and duplicates removed.
    pub fn validate(&self, event: &MatchEvent) -> Result<Vec<(String, u32)>> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for raw in &event.players {
            let name = normalize_name(raw)?;
            if seen.insert(name.clone()) {
                names.push(name);
            }
        }

        if names.is_empty() {
            return Err(RosterError::InvalidEvent(
                "match has no players".to_string(),
            ));
        }

        let mut goals = HashMap::new();
        for (raw, count) in &event.goals {
            let name = normalize_name(raw)?;
            if goals.insert(name.clone(), *count).is_some() {
                return Err(RosterError::InvalidEvent(format!(
                    "duplicate goals entry for {}",
                    name
                )));
            }
        }

        let missing: Vec<String> = names
            .iter()
            .filter(|name| !goals.contains_key(*name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(RosterError::MissingGoalData(missing));
        }

        let mut strangers: Vec<&String> = goals.keys().filter(|name| !seen.contains(*name)).collect();
        if !strangers.is_empty() {
            strangers.sort();
            return Err(RosterError::InvalidEvent(format!(
                "goals recorded for players not in the match: {}",
                strangers
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        Ok(names
            .into_iter()
            .map(|name| {
                let scored = goals[&name];
                (name, scored)
            })
            .collect())
    }

    /// Apply one match to every named player.
    ///
    /// Unknown names are auto-registered. The batch runs in one transaction:
    /// either every player is updated or none is.
    pub fn record_match_result(&self, db: &mut Database, event: &MatchEvent) -> Result<MatchReport> {
        let lineup = self.validate(event)?;
        let awarded = self.points.for_result(event.result);

        let (players, registered) = db.transaction(|tx| {
            let store = PlayerStore::new(tx);
            let mut players = Vec::with_capacity(lineup.len());
            let mut registered = Vec::new();

            for (name, scored) in &lineup {
                let (mut record, created) = store.get_or_register(name)?;
                if created {
                    registered.push(name.clone());
                }

                apply_match(&mut record, *scored, awarded)?;
                store.upsert(&record)?;
                debug!(player = %name, goals = scored, points = awarded, "match applied");

                players.push(record);
            }

            Ok((players, registered))
        })?;

        info!(
            result = %event.result,
            players = players.len(),
            registered = registered.len(),
            "match result recorded"
        );

        Ok(MatchReport {
            result: event.result,
            players,
            registered,
        })
    }

    /// Deduct the offence penalty. Unknown players are reported, never created.
    pub fn record_offence(&self, db: &mut Database, player_name: &str) -> Result<PlayerRecord> {
        let name = normalize_name(player_name)?;
        let penalty = self.points.offence_penalty;

        let record = db.transaction(|tx| {
            let store = PlayerStore::new(tx);
            let mut record = store
                .get(&name)?
                .ok_or_else(|| RosterError::PlayerNotFound(name.clone()))?;

            record.points = record.points.checked_sub(penalty).ok_or_else(|| {
                RosterError::InvalidEvent(format!("{}: points underflow", name))
            })?;
            store.upsert(&record)?;

            Ok(record)
        })?;

        info!(player = %record.name(), points = record.points(), "offence recorded");
        Ok(record)
    }
}

fn apply_match(record: &mut PlayerRecord, goals: u32, points: i64) -> Result<()> {
    let overflow = || RosterError::InvalidEvent(format!("{}: aggregate overflow", record.name));

    let appearances = record.appearances.checked_add(1).ok_or_else(overflow)?;
    let goals_scored = record.goals_scored.checked_add(goals).ok_or_else(overflow)?;
    let total = record.points.checked_add(points).ok_or_else(overflow)?;

    record.appearances = appearances;
    record.goals_scored = goals_scored;
    record.points = total;
    Ok(())
}

/// Display order: points descending. The sort is stable, so ties keep the
/// order players were passed in (registration order from `list_all`).
pub fn standings(mut players: Vec<PlayerRecord>) -> Vec<PlayerRecord> {
    players.sort_by(|a, b| b.points.cmp(&a.points));
    players
}
