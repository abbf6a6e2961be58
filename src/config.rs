use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{coordinator::RingOptions, error::Error};

#[inline]
#[must_use]
pub const fn default_wake_lock_minutes() -> u64 {
    5
}

#[inline]
#[must_use]
pub const fn default_duck_level() -> f32 {
    0.1
}

#[inline]
#[must_use]
pub const fn default_duck_hold_millis() -> u64 {
    2_000
}

#[inline]
#[must_use]
pub const fn default_enforce_interval_millis() -> u64 {
    1_000
}

#[inline]
#[must_use]
pub const fn full_volume() -> f32 {
    1.0
}

/// Settings of the ringing session itself (not of single alarms).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// relative alarm sound paths are looked up here
    #[serde(default = "Config::sounds_path")]
    pub sounds_dir: PathBuf,
    #[serde(default = "default_wake_lock_minutes")]
    pub wake_lock_minutes: u64,
    /// level alarm audio drops to while the time is announced
    #[serde(default = "default_duck_level")]
    pub duck_level: f32,
    #[serde(default = "default_duck_hold_millis")]
    pub duck_hold_millis: u64,
    /// how often an enforced volume is put back
    #[serde(default = "default_enforce_interval_millis")]
    pub enforce_interval_millis: u64,
    /// master volume the session starts with
    #[serde(default = "full_volume")]
    pub initial_volume: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sounds_dir: Self::sounds_path(),
            wake_lock_minutes: default_wake_lock_minutes(),
            duck_level: default_duck_level(),
            duck_hold_millis: default_duck_hold_millis(),
            enforce_interval_millis: default_enforce_interval_millis(),
            initial_volume: full_volume(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the config, falling back to the defaults when there is no file.
    ///
    /// # Errors
    /// The file exists but can't be read or parsed.
    pub fn load(path: PathBuf) -> Result<Self, Error> {
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let config = std::fs::read_to_string(&path)?;
        Self::parse(&config)
    }

    /// # Errors
    /// [`Error::ConfigurationMissing`] if `config` is not a valid config document.
    pub fn parse(config: &str) -> Result<Self, Error> {
        toml::from_str(config).map_err(|e| Error::ConfigurationMissing(e.message().to_string()))
    }

    /// # Errors
    /// The config can't be serialized or written.
    pub fn save(&self, path: PathBuf) -> Result<(), Error> {
        let config = toml::to_string(self)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, config)?;
        Ok(())
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("", "", "roosty_ring")
    }

    #[must_use]
    pub fn config_path() -> PathBuf {
        let mut path = Self::project_dirs()
            .map_or_else(|| PathBuf::from("."), |dirs| dirs.config_dir().to_path_buf());
        path.push("config.toml");
        path
    }

    #[must_use]
    pub fn sounds_path() -> PathBuf {
        let mut path = Self::project_dirs()
            .map_or_else(|| PathBuf::from("."), |dirs| dirs.data_dir().to_path_buf());
        path.push("sounds");
        path
    }

    #[must_use]
    pub fn is_config_present() -> bool {
        Self::config_path().exists()
    }

    /// Resolves an alarm sound path against `sounds_dir`.
    #[must_use]
    pub fn sound(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.sounds_dir.join(path)
        }
    }

    #[must_use]
    pub const fn ring_options(&self) -> RingOptions {
        RingOptions {
            wake_lock: Duration::from_secs(self.wake_lock_minutes * 60),
            duck_level: self.duck_level,
        }
    }

    #[must_use]
    pub const fn duck_hold(&self) -> Duration {
        Duration::from_millis(self.duck_hold_millis)
    }

    #[must_use]
    pub const fn enforce_interval(&self) -> Duration {
        Duration::from_millis(self.enforce_interval_millis)
    }
}
