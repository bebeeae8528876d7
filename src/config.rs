use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Duration;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::tasklet::Error;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    pub upcoming_days: u64,
    pub reminder_interval_secs: u64,
    pub reminder_window_minutes: i64,
}

#[derive(Debug, Deserialize)]
pub struct Configuration {
    pub tasklet: Settings,
}

const DEFAULT_CONFIG: &str = r#"
[tasklet]
# Directory holding tasklet.db and theme.json.
# Empty means the platform data directory.
data_dir = ""
# Days ahead listed as upcoming.
upcoming_days = 3
# Seconds between reminder checks.
reminder_interval_secs = 60
# Minutes before a deadline that its reminder fires.
reminder_window_minutes = 60

"#;

impl Configuration {
    /// Loads `~/.config/tasklet/tasklet.toml`, writing the defaults first
    /// if the file does not exist yet.
    pub fn new() -> Result<Self, Error> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory"))?;
        let config_path = home_dir.join(".config/tasklet/tasklet.toml");

        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&config_path, DEFAULT_CONFIG.trim())?;
        }

        Self::load_from(&config_path)
    }

    /// Layers the built-in defaults, the file at `path` (if present) and
    /// `TASKLET_TASKLET__<KEY>` environment variables.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        Self::load_with_env(path, None)
    }

    fn load_with_env(path: &Path, env: Option<config::Map<String, String>>) -> Result<Self, Error> {
        let settings = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("TASKLET")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        Ok(settings.try_deserialize::<Configuration>()?)
    }

    /// How long before a deadline its reminder fires. Must be a
    /// non-negative number of minutes that fits a `chrono::Duration`.
    pub fn reminder_window(&self) -> Result<Duration, Error> {
        let minutes = self.tasklet.reminder_window_minutes;
        Duration::try_minutes(minutes)
            .filter(|window| *window >= Duration::zero())
            .ok_or_else(|| {
                ConfigError::Message(format!(
                    "reminder_window_minutes out of range: {minutes}"
                ))
                .into()
            })
    }

    pub fn reminder_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tasklet.reminder_interval_secs.max(1))
    }

    pub fn data_dir(&self) -> PathBuf {
        let configured = self.tasklet.data_dir.trim();
        if configured.is_empty() {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("tasklet")
        } else {
            PathBuf::from(configured)
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("tasklet.db")
    }

    pub fn theme_path(&self) -> PathBuf {
        self.data_dir().join("theme.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir().join("tasklet.log")
    }
}
