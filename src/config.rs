//! Namespace and manager configuration, loaded from TOML with full
//! `Default` fallbacks — mirrors the teacher's `Config`/`GeneralConfig`
//! nesting in shape and in its load-then-fall-back-with-a-warning behavior.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlconnaConfig {
    pub namespace: NamespaceConfig,
    pub manager: ManagerConfig,
}

impl Default for AlconnaConfig {
    fn default() -> Self {
        Self {
            namespace: NamespaceConfig::default(),
            manager: ManagerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    pub default_separators: String,
    pub fuzzy_match: bool,
    pub fuzzy_threshold: f64,
    pub enable_help: bool,
    pub enable_shortcut: bool,
    pub enable_completion: bool,
    pub filter_crlf: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            default_separators: " ".to_string(),
            fuzzy_match: true,
            fuzzy_threshold: 0.6,
            enable_help: true,
            enable_shortcut: true,
            enable_completion: true,
            filter_crlf: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub max_count: usize,
    pub memoize_parses: bool,
    pub lru_capacity: u64,
    pub lru_ttl_secs: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_count: 200,
            memoize_parses: true,
            lru_capacity: 500,
            lru_ttl_secs: 300,
        }
    }
}

impl AlconnaConfig {
    /// Read `path` as TOML, falling back to defaults (with a `tracing::warn!`)
    /// if the file is missing or fails to parse.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded alconna config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config at {}: {e}, using defaults", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config at {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }
}
