// Server configuration and startup provisioning.
//
// `ServerConfig` is read from an optional JSON file (`--config`) and then
// overridden by command-line flags in `main.rs`. Every field has a default,
// so an empty `{}` file is a valid configuration.
//
// Accounts and games listed in the file are loaded into the in-memory
// identity service and game directory by `provision()` before the listener
// starts. Games are created in file order, so the first listed game gets
// ID 1.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use rookery_protocol::GameId;
use rookery_rules::Color;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::directory::{DirectoryError, MemoryGameDirectory};
use crate::identity::MemoryIdentityService;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// 0 asks the OS for a free port.
    pub port: u16,
    /// How long a game's worker waits for a command before retiring.
    pub worker_idle_timeout_ms: u64,
    /// Upper bound on one blocked write to a client socket.
    pub write_timeout_ms: u64,
    pub accounts: Vec<AccountConfig>,
    pub games: Vec<GameConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".into(),
            port: 7979,
            worker_idle_timeout_ms: 30_000,
            write_timeout_ms: 5_000,
            accounts: Vec::new(),
            games: Vec::new(),
        }
    }
}

/// A login known to the identity service at startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub username: String,
    pub token: String,
}

/// A game created at startup, optionally with seats already claimed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub name: String,
    #[serde(default)]
    pub white: Option<String>,
    #[serde(default)]
    pub black: Option<String>,
}

impl ServerConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn worker_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_idle_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Load the configured accounts and games. Returns the created game IDs in
/// file order.
pub fn provision(
    config: &ServerConfig,
    identity: &MemoryIdentityService,
    directory: &MemoryGameDirectory,
) -> Result<Vec<GameId>, DirectoryError> {
    for account in &config.accounts {
        identity.register(account.token.clone(), account.username.clone());
    }

    let mut created = Vec::with_capacity(config.games.len());
    for game in &config.games {
        let game_id = directory.create_game(game.name.clone());
        if let Some(white) = &game.white {
            directory.claim_seat(game_id, Color::Light, white)?;
        }
        if let Some(black) = &game.black {
            directory.claim_seat(game_id, Color::Dark, black)?;
        }
        info!("provisioned {game_id} ({})", game.name);
        created.push(game_id);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::GameDirectory;
    use crate::identity::IdentityService;

    #[test]
    fn empty_object_is_all_defaults() {
        let config = ServerConfig::from_json("{}").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.listen_addr(), "127.0.0.1:7979");
        assert_eq!(config.worker_idle_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_file_overrides_some_fields() {
        let config = ServerConfig::from_json(
            r#"{
                "port": 0,
                "accounts": [{"username": "alice", "token": "a-tok"}],
                "games": [{"name": "friendly", "white": "alice"}]
            }"#,
        )
        .unwrap();
        assert_eq!(config.port, 0);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.games[0].black, None);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = ServerConfig::from_json(r#"{"port": "high"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ServerConfig::load(Path::new("/nonexistent/rookery.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rookery.json"));
    }

    #[test]
    fn provision_registers_accounts_and_games() {
        let config = ServerConfig::from_json(
            r#"{
                "accounts": [
                    {"username": "alice", "token": "a-tok"},
                    {"username": "bob", "token": "b-tok"}
                ],
                "games": [
                    {"name": "first", "white": "alice", "black": "bob"},
                    {"name": "second"}
                ]
            }"#,
        )
        .unwrap();
        let identity = MemoryIdentityService::new();
        let directory = MemoryGameDirectory::new();

        let ids = provision(&config, &identity, &directory).unwrap();
        assert_eq!(ids, vec![GameId(1), GameId(2)]);
        assert_eq!(identity.username_for("b-tok").as_deref(), Some("bob"));

        let first = directory.load(GameId(1)).unwrap();
        assert_eq!(first.seat(Color::Light), Some("alice"));
        assert_eq!(first.seat(Color::Dark), Some("bob"));
        assert_eq!(directory.load(GameId(2)).unwrap().game_name, "second");
    }
}
