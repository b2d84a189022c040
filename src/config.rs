use std::time::Duration;

use serde::Deserialize;

use room::RoomConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    pub ws_addr: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            ws_addr: "0.0.0.0:4040".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbSection {
    pub path: String,
}

impl Default for DbSection {
    fn default() -> Self {
        Self {
            path: "data/tilerealm.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TickSection {
    pub tps: u32,
}

impl Default for TickSection {
    fn default() -> Self {
        Self { tps: room::TICK_RATE }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomSection {
    pub max_party_size: usize,
    pub max_input_queue: usize,
    pub autosave_secs: u64,
    pub idle_check_secs: u64,
    pub idle_warn_secs: u64,
    pub idle_kick_secs: u64,
    pub map_width: u32,
    pub map_height: u32,
}

impl Default for RoomSection {
    fn default() -> Self {
        Self {
            max_party_size: room::MAX_PARTY_SIZE,
            max_input_queue: room::MAX_QUEUE,
            autosave_secs: 60,
            idle_check_secs: 30,
            idle_warn_secs: 14 * 60,
            idle_kick_secs: 15 * 60,
            map_width: 64,
            map_height: 64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    pub max_connections: usize,
    pub max_frame_bytes: usize,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            max_frame_bytes: 4096,
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub net: NetConfig,
    pub db: DbSection,
    pub tick: TickSection,
    pub room: RoomSection,
    pub security: SecuritySection,
}

impl ServerConfig {
    /// Load a TOML config file. An explicitly named file must exist and
    /// parse; only the absence of any `--config` argument means defaults.
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Convert the tick and room sections to the room crate's config.
    pub fn to_room_config(&self) -> RoomConfig {
        RoomConfig {
            tick_period: Duration::from_millis(1000 / self.tick.tps.max(1) as u64),
            autosave_interval: Duration::from_secs(self.room.autosave_secs),
            idle_check_interval: Duration::from_secs(self.room.idle_check_secs),
            idle_warn_after: Duration::from_secs(self.room.idle_warn_secs),
            idle_kick_after: Duration::from_secs(self.room.idle_kick_secs),
            max_party_size: self.room.max_party_size,
            max_queue: self.room.max_input_queue,
            map_width: self.room.map_width,
            map_height: self.room.map_height,
        }
    }
}

/// Resolve the process configuration from argv. `--config <path>` or
/// `--config=<path>` names a TOML file; with neither, defaults apply.
pub fn load_from_args() -> ServerConfig {
    let path = match config_path(std::env::args().skip(1)) {
        Ok(path) => path,
        Err(message) => {
            tracing::error!("{message}");
            std::process::exit(2);
        }
    };
    let Some(path) = path else {
        return ServerConfig::default();
    };
    match ServerConfig::from_file(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %path, "could not load config: {e}");
            std::process::exit(2);
        }
    }
}

fn config_path(mut args: impl Iterator<Item = String>) -> Result<Option<String>, String> {
    let mut path = None;
    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--config=") {
            path = Some(value.to_string());
        } else if arg == "--config" {
            path = Some(
                args.next()
                    .ok_or_else(|| "--config expects a file path".to_string())?,
            );
        } else {
            return Err(format!("unrecognized argument: {arg}"));
        }
    }
    Ok(path)
}
