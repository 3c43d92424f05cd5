//! Default value functions referenced by the serde derives.

use super::logging::LogFormat;

pub fn default_game_id() -> String {
    "maze".to_string()
}

/// Four robots per game.
pub fn default_party_size() -> usize {
    4
}

pub fn default_request_lifetime_ms() -> u64 {
    2000
}

pub fn default_heartbeat_frequency_ms() -> u64 {
    2000
}

pub fn default_heartbeat_lifetime_ms() -> u64 {
    5000
}

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "peer.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub fn default_enable_file_logging() -> bool {
    false
}

pub fn default_log_format() -> LogFormat {
    LogFormat::Text
}
