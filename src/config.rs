//! Runtime configuration: listening address, channel path, origin policy,
//! cooldowns, seed override, generator version.
//!
//! Layered: defaults, then an optional TOML file, then `DUNGEON_WORLD_*`
//! environment variables, then explicit CLI flags — via the `config` crate
//! feeding a typed struct.

use serde::Deserialize;

use crate::chunkgen::GeneratorVersion;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub listen_addr: String,
    pub ws_path: String,
    pub allowed_origins: Vec<String>,
    pub move_cooldown_ms: u64,
    pub turn_cooldown_ms: u64,
    pub world_seed_override: Option<u32>,
    pub generator_version: String,
    pub max_frame_bytes: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            ws_path: "/ws".to_string(),
            allowed_origins: vec!["*".to_string()],
            move_cooldown_ms: 500,
            turn_cooldown_ms: 150,
            world_seed_override: None,
            generator_version: "maze".to_string(),
            max_frame_bytes: 16 * 1024,
        }
    }
}

impl WorldConfig {
    /// Load defaults, then `config/dungeon-world.toml` if present, then
    /// `DUNGEON_WORLD_*` environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = WorldConfig::default();
        let builder = config::Config::builder()
            .set_default("listen_addr", defaults.listen_addr)?
            .set_default("ws_path", defaults.ws_path)?
            .set_default("allowed_origins", defaults.allowed_origins)?
            .set_default("move_cooldown_ms", defaults.move_cooldown_ms)?
            .set_default("turn_cooldown_ms", defaults.turn_cooldown_ms)?
            .set_default("generator_version", defaults.generator_version)?
            .set_default("max_frame_bytes", defaults.max_frame_bytes as i64)?
            .add_source(config::File::with_name("config/dungeon-world").required(false))
            .add_source(
                config::Environment::with_prefix("DUNGEON_WORLD")
                    .try_parsing(true)
                    .list_separator(","),
            );
        builder.build()?.try_deserialize()
    }

    pub fn generator(&self) -> GeneratorVersion {
        GeneratorVersion::parse(&self.generator_version).unwrap_or(GeneratorVersion::Maze)
    }

    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == "*" || o == origin)
    }
}
