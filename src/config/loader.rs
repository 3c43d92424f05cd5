//! Configuration loading: file, then environment overrides.

use std::path::Path;

use super::{validate, Config};

/// Environment variable naming an alternative config file.
const CONFIG_PATH_VAR: &str = "HTTTP_PEER_CONFIG";
/// Default config file looked up in the working directory.
const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Loads configuration: `$HTTTP_PEER_CONFIG` or `./config.json` if
/// present, code defaults otherwise, then environment overrides on top.
/// Validation problems are reported to stderr but do not abort loading;
/// callers decide whether to run with them.
#[must_use]
pub fn load() -> Config {
    let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    let mut config = read_file(Path::new(&path)).unwrap_or_default();
    apply_env_overrides(&mut config);

    if let Err(problem) = validate(&config) {
        eprintln!("Configuration problem: {problem}");
    }
    config
}

fn read_file(path: &Path) -> Option<Config> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Failed to parse {}: {e}", path.display());
            None
        }
    }
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(game_id) = std::env::var("HTTTP_PEER_GAME_ID") {
        if !game_id.is_empty() {
            config.game.game_id = game_id;
        }
    }
    if let Ok(level) = std::env::var("HTTTP_PEER_LOG_LEVEL") {
        match serde_json::from_value(serde_json::Value::String(level.clone())) {
            Ok(parsed) => config.logging.level = Some(parsed),
            Err(_) => eprintln!("Ignoring invalid HTTTP_PEER_LOG_LEVEL '{level}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        assert!(read_file(Path::new("definitely-not-here.json")).is_none());
        let config = Config::default();
        assert_eq!(config.game.game_id, "maze");
    }

    #[test]
    fn file_contents_override_defaults() {
        let dir = std::env::temp_dir().join(format!("htttp-peer-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{"game":{"partySize":6}}"#).unwrap();

        let config = read_file(&path).unwrap();
        assert_eq!(config.game.party_size, 6);

        std::fs::remove_dir_all(&dir).ok();
    }
}
