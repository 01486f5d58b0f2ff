// ⚙️ Configuration - JSON file + environment overrides
//
// Resolution order: built-in defaults < config file < environment.

use crate::admin::AdminCredentials;
use crate::projection::SheetLayout;
use crate::ranking::PointsTable;
use crate::sheet::RetryPolicy;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG: &str = "ROSTER_CONFIG";
pub const ENV_DATABASE: &str = "ROSTER_DB";
pub const ENV_WORKBOOK: &str = "ROSTER_WORKBOOK";
pub const ENV_ADMIN_SHA256: &str = "ROSTER_ADMIN_SHA256";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file holding players and the ledger
    pub database_path: PathBuf,

    /// Directory of the CSV workbook the projection is written to
    pub workbook_dir: PathBuf,

    pub players_worksheet: String,
    pub ledger_worksheet: String,

    /// Hex SHA-256 of the admin password. Unset means nobody is admin.
    pub admin_password_sha256: Option<String>,

    pub points: PointsTable,

    /// Retries around every sheet call
    pub sync: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        let layout = SheetLayout::default();
        Config {
            database_path: PathBuf::from("roster.db"),
            workbook_dir: PathBuf::from("workbook"),
            players_worksheet: layout.players_worksheet,
            ledger_worksheet: layout.ledger_worksheet,
            admin_password_sha256: None,
            points: PointsTable::default(),
            sync: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Load from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse config JSON")
    }

    /// Defaults or the given file, then process environment on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(ENV_CONFIG).map(PathBuf::from);

        let mut config = match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Both worksheets need their own non-blank name; a shared one would have
    /// the ledger overwrite the standings on every sync.
    pub fn validate(&self) -> Result<()> {
        let players = self.players_worksheet.trim();
        let ledger = self.ledger_worksheet.trim();

        if players.is_empty() || ledger.is_empty() {
            bail!("worksheet names must not be blank");
        }
        if players == ledger {
            bail!(
                "players_worksheet and ledger_worksheet are both {:?}",
                players
            );
        }
        Ok(())
    }

    /// Apply overrides from any key lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DATABASE).filter(|v| !v.trim().is_empty()) {
            self.database_path = PathBuf::from(db);
        }
        if let Some(dir) = lookup(ENV_WORKBOOK).filter(|v| !v.trim().is_empty()) {
            self.workbook_dir = PathBuf::from(dir);
        }
        if let Some(digest) = lookup(ENV_ADMIN_SHA256) {
            self.admin_password_sha256 = Some(digest);
        }
    }

    pub fn layout(&self) -> SheetLayout {
        SheetLayout {
            players_worksheet: self.players_worksheet.clone(),
            ledger_worksheet: self.ledger_worksheet.clone(),
        }
    }

    pub fn admin_credentials(&self) -> AdminCredentials {
        match &self.admin_password_sha256 {
            Some(digest) => AdminCredentials::from_digest(digest),
            None => AdminCredentials::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::{hash_password, AdminAccess};
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.players_worksheet, "players");
        assert_eq!(config.ledger_worksheet, "contributions");
        assert_eq!(config.points.draw, 1);
        assert_eq!(config.sync.max_attempts, 3);
        assert!(!config.admin_credentials().is_configured());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json(
            r#"{
                "database_path": "/tmp/club.db",
                "points": { "draw": 2 },
                "sync": { "max_attempts": 5 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/club.db"));
        assert_eq!(config.points.draw, 2);
        assert_eq!(config.points.win, 3);
        assert_eq!(config.sync.max_attempts, 5);
        assert_eq!(config.sync.backoff_ms, 250);
        assert_eq!(config.workbook_dir, PathBuf::from("workbook"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(Config::from_json("{ not json").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(&path, r#"{ "players_worksheet": "table" }"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.layout().players_worksheet, "table");

        assert!(Config::from_file(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_worksheet_names_must_differ() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(
            &path,
            r#"{ "players_worksheet": "club", "ledger_worksheet": " club " }"#,
        )
        .unwrap();

        assert!(Config::load(Some(&path)).is_err());

        let blank = Config {
            ledger_worksheet: "".to_string(),
            ..Config::default()
        };
        assert!(blank.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, String> = [
            (ENV_DATABASE, "/data/roster.db".to_string()),
            (ENV_WORKBOOK, "".to_string()),
            (ENV_ADMIN_SHA256, hash_password("coach")),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| vars.get(key).cloned());

        assert_eq!(config.database_path, PathBuf::from("/data/roster.db"));
        assert_eq!(config.workbook_dir, PathBuf::from("workbook"), "blank override ignored");
        assert_eq!(config.admin_credentials().verify("coach"), AdminAccess::Granted);
    }
}
