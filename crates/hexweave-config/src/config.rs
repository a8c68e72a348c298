//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Tile registry settings.
    pub registry: RegistryConfig,
    /// Map generation scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Headless simulation settings.
    pub sim: SimConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Tile registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    /// First id handed out to custom tiles. Ids below this belong to the host.
    pub first_custom_id: i32,
    /// Built-in type ids that seed every candidate pool, in order.
    pub builtin_pool: Vec<i32>,
}

/// Generation scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Fixed seed for reproducible layouts. `None` draws a fresh seed per run.
    pub seed: Option<u64>,
    /// Chance (0-100) that a standard layout places the mountain first.
    pub mountain_chance_percent: u32,
    /// Number of terrain deformers left active in a standard layout.
    pub kept_deformers: usize,
    /// How long to wait for a spawn confirmation, in milliseconds. 0 waits forever.
    pub confirm_timeout_ms: u64,
    /// Type ids counted against the compact-layout loot quota.
    pub loot_types: Vec<i32>,
    /// Maximum loot tiles in a compact layout.
    pub max_loot: u32,
    /// Compact-layout slot that is forced to a loot tile when the quota is short.
    pub compact_forced_slot: usize,
    /// Loot types tried for the forced slot, most preferred first.
    pub forced_loot_preference: Vec<i32>,
    /// Compact-layout slots marked occupied before placement starts.
    pub compact_reserved_slots: Vec<usize>,
    /// Type id of the dungeon tile.
    pub dungeon_type: i32,
}

/// Headless simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    /// Number of simulated host instances.
    pub instances: u32,
    /// Placement slots per instance.
    pub slots: usize,
    /// Whether the simulated peer holds network authority.
    pub authoritative: bool,
    /// Delay before the simulated host confirms its own placements, in milliseconds.
    pub confirm_delay_ms: u64,
    /// Custom tiles registered before generation, by name.
    pub custom_tiles: Vec<String>,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            first_custom_id: 9,
            builtin_pool: (0..=7).collect(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            seed: None,
            mountain_chance_percent: 33,
            kept_deformers: 4,
            confirm_timeout_ms: 30_000,
            loot_types: vec![0, 3, 5],
            max_loot: 2,
            compact_forced_slot: 5,
            forced_loot_preference: vec![5, 0, 3],
            compact_reserved_slots: vec![0, 6],
            dungeon_type: 3,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            instances: 2,
            slots: 9,
            authoritative: true,
            confirm_delay_ms: 5,
            custom_tiles: vec!["ruins".to_string(), "shrine".to_string()],
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Platform config directory for hexweave (e.g. `~/.config/hexweave`).
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("hexweave"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
