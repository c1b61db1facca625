//! Server configuration loaded from the environment

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings for the encounter authority and battle actors.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address the websocket gateway listens on
    pub bind_addr: String,
    /// Directory holding one `<zone_id>.json` map per zone
    pub map_dir: PathBuf,
    /// JSON spawn table; the built-in table is used when unset
    pub spawn_table: Option<PathBuf>,
    /// How long a battle waits for actions before defaulting them
    pub turn_timeout: Duration,
    /// Authoritative minimum time between two encounter rolls per player
    pub cooldown_ms: u64,
    /// Bounded inbox size of each session actor
    pub inbox_capacity: usize,
    /// Fixed seed for the authority RNG, for reproducible runs
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7878".to_string(),
            map_dir: PathBuf::from("maps"),
            spawn_table: None,
            turn_timeout: Duration::from_millis(30_000),
            cooldown_ms: 1_000,
            inbox_capacity: 32,
            seed: None,
        }
    }
}

impl ServerConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `TALLGRASS_BIND` - Listen address (default: 127.0.0.1:7878)
    /// - `TALLGRASS_MAP_DIR` - Zone map directory (default: maps)
    /// - `TALLGRASS_SPAWN_TABLE` - Spawn table JSON path (default: built-in)
    /// - `TALLGRASS_TURN_TIMEOUT_MS` - Turn timer (default: 30000)
    /// - `TALLGRASS_COOLDOWN_MS` - Encounter cooldown (default: 1000)
    /// - `TALLGRASS_INBOX_CAPACITY` - Session inbox size (default: 32)
    /// - `TALLGRASS_SEED` - Fixed RNG seed (default: random)
    ///
    /// Values that fail to parse keep their default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(addr) = read_env::<String>("TALLGRASS_BIND") {
            config.bind_addr = addr;
        }
        if let Some(dir) = read_env::<PathBuf>("TALLGRASS_MAP_DIR") {
            config.map_dir = dir;
        }
        if let Some(path) = read_env::<PathBuf>("TALLGRASS_SPAWN_TABLE") {
            config.spawn_table = Some(path);
        }
        if let Some(ms) = read_env::<u64>("TALLGRASS_TURN_TIMEOUT_MS") {
            config.turn_timeout = Duration::from_millis(ms.max(1));
        }
        if let Some(ms) = read_env::<u64>("TALLGRASS_COOLDOWN_MS") {
            config.cooldown_ms = ms;
        }
        if let Some(capacity) = read_env::<usize>("TALLGRASS_INBOX_CAPACITY") {
            config.inbox_capacity = capacity.max(1);
        }
        if let Some(seed) = read_env::<u64>("TALLGRASS_SEED") {
            config.seed = Some(seed);
        }

        config
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    let value = env::var(key).ok()?;
    if value.trim().is_empty() {
        return None;
    }
    value.trim().parse().ok()
}
