//! Configuration for a peer instance.
//!
//! Supports JSON configuration files, environment-variable overrides and
//! sensible defaults carrying the protocol constants.

pub mod defaults;
pub mod game;
pub mod loader;
pub mod logging;

pub use game::GameConfig;
pub use loader::load;
pub use logging::{LogFormat, LogLevel, LoggingConfig};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Rejects configurations the protocol cannot run on.
pub fn validate(config: &Config) -> Result<(), String> {
    let game = &config.game;
    if game.game_id.is_empty() {
        return Err("game.game_id must not be empty".to_string());
    }
    if game.party_size < 2 || game.party_size % 2 != 0 {
        return Err(format!(
            "game.party_size must be an even number of at least 2, got {}",
            game.party_size
        ));
    }
    if game.request_lifetime_ms == 0 {
        return Err("game.request_lifetime_ms must be positive".to_string());
    }
    if game.heartbeat_lifetime_ms <= game.heartbeat_frequency_ms {
        return Err(format!(
            "game.heartbeat_lifetime_ms ({}) must exceed game.heartbeat_frequency_ms ({})",
            game.heartbeat_lifetime_ms, game.heartbeat_frequency_ms
        ));
    }
    Ok(())
}
