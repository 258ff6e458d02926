use std::{env, path::PathBuf};

use super::schema::AppConfig;
use crate::audio::MIN_RAMP_MS;

/// Configuration loading helpers.
///
/// `AppConfig::load` tries environment variables first (prefix `CADENZA__`), then an
/// optional config file and falls back to struct defaults.
impl AppConfig {
    /// Load configuration from environment and optional config file.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let config_path = resolve_config_path();

        let mut builder = ::config::Config::builder();

        if let Some(path) = &config_path {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("CADENZA")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        let config: AppConfig = cfg.try_deserialize()?;
        Ok(config)
    }

    /// Perform basic validation checks on loaded configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.audio.eq_q > 0.0) {
            return Err("audio.eq_q must be > 0".to_string());
        }
        if self.audio.eq_ramp_ms < MIN_RAMP_MS {
            return Err(format!("audio.eq_ramp_ms must be >= {MIN_RAMP_MS}"));
        }
        if self.audio.graph_sample_rate == 0 {
            return Err("audio.graph_sample_rate must be >= 1".to_string());
        }
        if self.session.checkpoint_interval_secs == 0 {
            return Err("session.checkpoint_interval_secs must be >= 1".to_string());
        }
        if self.resilience.check_interval_ms == 0 {
            return Err("resilience.check_interval_ms must be >= 1".to_string());
        }
        Ok(())
    }

    /// Database path from config or the XDG data default.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.storage
            .database_path
            .clone()
            .or_else(|| xdg_dir("XDG_DATA_HOME", ".local/share").map(|d| d.join("library.db")))
    }
}

/// Resolve the config path from `CADENZA_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("CADENZA_CONFIG_PATH") {
        let p = PathBuf::from(p);
        return Some(p);
    }
    default_config_path()
}

/// Compute the default config path under `$XDG_CONFIG_HOME/cadenza/config.toml`
/// or `~/.config/cadenza/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    xdg_dir("XDG_CONFIG_HOME", ".config").map(|d| d.join("config.toml"))
}

/// `$<var>/cadenza`, or `$HOME/<fallback>/cadenza` when the variable is unset.
pub fn xdg_dir(var: &str, home_fallback: &str) -> Option<PathBuf> {
    let base = if let Some(xdg) = env::var_os(var) {
        Some(PathBuf::from(xdg))
    } else if let Some(home) = env::var_os("HOME") {
        Some(PathBuf::from(home).join(home_fallback))
    } else {
        None
    };

    base.map(|d| d.join("cadenza"))
}
