use tracing::{info, warn};

use crate::config::{self, AppConfig};

/// Load and validate the configuration. Problems are logged and the
/// defaults are used; configuration never prevents the player from starting.
pub fn load_config() -> AppConfig {
    match AppConfig::load() {
        Ok(c) => match c.validate() {
            Ok(()) => {
                info!(path = ?config::resolve_config_path(), "configuration loaded");
                c
            }
            Err(msg) => {
                warn!(%msg, "invalid config, using defaults");
                AppConfig::default()
            }
        },
        Err(e) => {
            warn!(error = %e, "failed to load config, using defaults");
            AppConfig::default()
        }
    }
}
