use std::net::SocketAddr;
use std::path::PathBuf;

use kakera_core::{GameRules, RulesError};

pub const DEFAULT_ROOM_PATH_PREFIX: &str = "/ws/";
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_IDLE_ROOM_TTL_MS: u64 = 10 * 60 * 1_000;

#[derive(Debug, Clone, clap::Parser)]
#[command(name = "kakera-room", version, about = "Multiplayer room server for kakera puzzles")]
pub struct ServerConfig {
    #[arg(long, env = "KAKERA_BIND", default_value = "127.0.0.1:8787")]
    pub bind: SocketAddr,
    /// Token admin connections pass as `?admin_token=`; without one nobody can create rooms.
    #[arg(long, env = "ROOM_ADMIN_TOKEN")]
    pub admin_token: Option<String>,
    #[arg(long, env = "ROOM_PATH_PREFIX", default_value = DEFAULT_ROOM_PATH_PREFIX)]
    pub path_prefix: String,
    /// JSON file with the rules new rooms start from.
    #[arg(long, env = "KAKERA_RULES")]
    pub rules: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_SWEEP_INTERVAL_MS)]
    pub sweep_interval_ms: u64,
    /// Rooms nobody has joined for this long are dropped by the sweeper.
    #[arg(long, env = "KAKERA_IDLE_ROOM_TTL_MS", default_value_t = DEFAULT_IDLE_ROOM_TTL_MS)]
    pub idle_room_ttl_ms: u64,
}

impl ServerConfig {
    pub fn local(admin_token: &str) -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            admin_token: Some(admin_token.to_string()),
            path_prefix: DEFAULT_ROOM_PATH_PREFIX.to_string(),
            rules: None,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            idle_room_ttl_ms: DEFAULT_IDLE_ROOM_TTL_MS,
        }
    }

    pub fn room_path_prefix(&self) -> String {
        normalize_room_path_prefix(&self.path_prefix)
    }

    pub fn default_rules(&self) -> Result<GameRules, RulesError> {
        match &self.rules {
            Some(path) => GameRules::load(path),
            None => Ok(GameRules::default()),
        }
    }
}

pub fn normalize_room_path_prefix(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_ROOM_PATH_PREFIX.to_string();
    }
    let mut value = trimmed.to_string();
    if !value.starts_with('/') {
        value.insert(0, '/');
    }
    if !value.ends_with('/') {
        value.push('/');
    }
    value
}
