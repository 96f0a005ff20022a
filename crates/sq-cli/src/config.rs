//! Configuration loading and management.
//!
//! The `[schedule]` section is the template source: weekly opening hours, an
//! optional lunch break and the day templates. It is read once at startup and
//! handed to every reconciliation explicitly.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use sq_core::{ScheduleConfig, TokenFormat};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Text placed before the short code in every token.
    pub token_prefix: String,

    /// How long a write waits for a busy database, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Weekly hours, lunch break and day templates.
    pub schedule: ScheduleConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("token_prefix", &self.token_prefix)
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .field("lunch_break", &self.schedule.lunch_break)
            .field("templates", &self.schedule.templates.len())
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("sq.db"),
            token_prefix: TokenFormat::default().prefix,
            busy_timeout_ms: 5_000,
            schedule: ScheduleConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (SQ_*, nested keys split on `__`)
        figment = figment.merge(Env::prefixed("SQ_").split("__"));

        figment.extract()
    }

    pub fn token_format(&self) -> TokenFormat {
        TokenFormat::new(self.token_prefix.clone())
    }

    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Returns the platform-specific config directory for sq.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sq"))
}

/// Returns the platform-specific data directory for sq.
///
/// On Linux: `~/.local/share/sq`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("sq"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use chrono::Weekday;

    #[test]
    fn test_dirs_data_path_ends_with_sq() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "sq");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("sq.db"));
        assert_eq!(config.token_prefix, "T-");
        assert!(config.schedule.templates.is_empty());
    }

    #[test]
    fn test_load_schedule_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
database_path = "/tmp/clinic.db"
token_prefix = "Q-"

[schedule.weekly.monday]
is_open = true
start_time = "09:00"
end_time = "17:00"

[schedule.lunch_break]
start = "13:00"
end = "14:00"

[[schedule.templates]]
name = "Morning"
short_code = "M"
start_time = "09:00"
end_time = "13:00"
max_tokens = 30

[[schedule.templates]]
name = "Evening"
short_code = "E"
start_time = "15:00"
end_time = "17:00"
max_tokens = 10
is_active = false
"#
        )
        .unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/clinic.db"));
        assert_eq!(config.token_format().prefix, "Q-");

        let monday = config.schedule.weekly.entry(Weekday::Mon);
        assert!(monday.is_open);
        assert_eq!(monday.start_time, "09:00");
        assert!(!config.schedule.weekly.entry(Weekday::Tue).is_open);

        let lunch = config.schedule.lunch_break.as_ref().unwrap();
        assert_eq!(lunch.start, "13:00");

        assert_eq!(config.schedule.templates.len(), 2);
        assert!(config.schedule.templates[0].is_active);
        assert!(!config.schedule.templates[1].is_active);
        assert_eq!(config.schedule.templates[1].short_code.as_str(), "E");
    }

    #[test]
    fn test_rejects_blank_short_code() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[[schedule.templates]]
name = "Morning"
short_code = ""
start_time = "09:00"
end_time = "13:00"
max_tokens = 30
"#
        )
        .unwrap();

        assert!(Config::load_from(Some(file.path())).is_err());
    }
}
