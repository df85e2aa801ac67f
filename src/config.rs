//! Runtime settings
//!
//! Settings live in `~/.fundledger/config.toml`. Every key is optional:
//!
//! ```toml
//! database_path = "/data/ledger.db"
//! history_days = 730
//! currency_symbol = "€"
//! ```
//!
//! `FUNDLEDGER_DB` overrides `database_path`; the CLI `--db` flag overrides both.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_HISTORY_DAYS: i64 = 365;
const DEFAULT_CURRENCY_SYMBOL: &str = "$";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    database_path: Option<PathBuf>,
    history_days: Option<i64>,
    currency_symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_path: PathBuf,
    /// Lookback used for history when no transactions exist yet.
    pub history_days: i64,
    pub currency_symbol: String,
}

/// Get the application directory (~/.fundledger), creating it if needed
pub fn app_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let dir = PathBuf::from(home).join(".fundledger");
    std::fs::create_dir_all(&dir).context("Failed to create .fundledger directory")?;
    Ok(dir)
}

impl Settings {
    /// Load settings from the default location, applying env overrides.
    pub fn load() -> Result<Self> {
        let dir = app_dir()?;
        Self::load_from(&dir.join("config.toml"), &dir)
    }

    /// Load settings from an explicit file. A missing file yields defaults.
    pub fn load_from(path: &Path, app_dir: &Path) -> Result<Self> {
        let raw = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config at {:?}", path))?;
            toml::from_str::<RawSettings>(&text)
                .with_context(|| format!("Invalid config at {:?}", path))?
        } else {
            RawSettings::default()
        };

        let env_db = std::env::var("FUNDLEDGER_DB").ok().filter(|v| !v.is_empty());
        Ok(Self::resolve(raw, env_db.map(PathBuf::from), app_dir))
    }

    fn resolve(raw: RawSettings, env_db: Option<PathBuf>, app_dir: &Path) -> Self {
        let database_path = env_db
            .or(raw.database_path)
            .unwrap_or_else(|| app_dir.join("data.db"));

        let history_days = match raw.history_days {
            Some(days) if days > 0 => days,
            Some(days) => {
                tracing::warn!("Ignoring non-positive history_days {}", days);
                DEFAULT_HISTORY_DAYS
            }
            None => DEFAULT_HISTORY_DAYS,
        };

        Settings {
            database_path,
            history_days,
            currency_symbol: raw
                .currency_symbol
                .unwrap_or_else(|| DEFAULT_CURRENCY_SYMBOL.to_string()),
        }
    }

    pub fn with_database_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(p) = path {
            self.database_path = p;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let settings = Settings::resolve(RawSettings::default(), None, Path::new("/tmp/fl"));
        assert_eq!(settings.database_path, PathBuf::from("/tmp/fl/data.db"));
        assert_eq!(settings.history_days, 365);
        assert_eq!(settings.currency_symbol, "$");
    }

    #[test]
    fn test_env_override_wins_over_file() {
        let raw: RawSettings = toml::from_str(
            "database_path = \"/from/file.db\"\nhistory_days = 30\ncurrency_symbol = \"€\"",
        )
        .unwrap();
        let settings = Settings::resolve(raw, Some(PathBuf::from("/from/env.db")), Path::new("/x"));
        assert_eq!(settings.database_path, PathBuf::from("/from/env.db"));
        assert_eq!(settings.history_days, 30);
        assert_eq!(settings.currency_symbol, "€");
    }

    #[test]
    fn test_non_positive_history_days_falls_back() {
        let raw: RawSettings = toml::from_str("history_days = 0").unwrap();
        let settings = Settings::resolve(raw, None, Path::new("/x"));
        assert_eq!(settings.history_days, 365);
    }

    #[test]
    fn test_load_from_file_and_cli_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "history_days = 90\n").unwrap();

        let settings = Settings::load_from(&path, dir.path()).unwrap();
        assert_eq!(settings.history_days, 90);

        let settings = settings.with_database_path(Some(PathBuf::from("/cli.db")));
        assert_eq!(settings.database_path, PathBuf::from("/cli.db"));
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "history_days = \"lots\"\n").unwrap();
        assert!(Settings::load_from(&path, dir.path()).is_err());
    }
}
