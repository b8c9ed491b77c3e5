//! # Engine Configuration
//!
//! Groups the tunables of the interaction layer by subsystem. Every group has
//! sensible defaults, so a config file only needs the values it overrides:
//!
//! ```toml
//! log_level = "debug"
//!
//! [resources]
//! max_transient_contexts = 2
//!
//! [interaction]
//! apply_wait_timeout_ms = 500
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use crate::config::{Config, ConfigError};

/// # Resource Configuration
///
/// Limits for the texture atlas and the transient context pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Maximum number of transient rendering contexts alive at once
    pub max_transient_contexts: usize,
    /// Edge length in pixels of a texture atlas page
    pub atlas_page_size: u32,
    /// Edge length in pixels of one atlas allocation cell
    pub atlas_cell_size: u32,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            max_transient_contexts: 4,
            atlas_page_size: 2048,
            atlas_cell_size: 16,
        }
    }
}

impl ResourceConfig {
    /// Set the transient context limit
    pub fn with_max_transient_contexts(mut self, count: usize) -> Self {
        self.max_transient_contexts = count;
        self
    }

    /// Set atlas page and cell size
    pub fn with_atlas(mut self, page_size: u32, cell_size: u32) -> Self {
        self.atlas_page_size = page_size;
        self.atlas_cell_size = cell_size;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_transient_contexts == 0 {
            return Err(ConfigError::Invalid(
                "max_transient_contexts must be at least 1".to_string(),
            ));
        }
        if self.atlas_cell_size == 0 || self.atlas_page_size < self.atlas_cell_size {
            return Err(ConfigError::Invalid(format!(
                "atlas page ({}) must hold at least one cell ({})",
                self.atlas_page_size, self.atlas_cell_size
            )));
        }
        if self.atlas_page_size % self.atlas_cell_size != 0 {
            return Err(ConfigError::Invalid(
                "atlas_page_size must be a multiple of atlas_cell_size".to_string(),
            ));
        }
        Ok(())
    }
}

/// # Selection Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Search radius in screen pixels used when a caller gives none
    pub default_screen_distance: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            default_screen_distance: 20.0,
        }
    }
}

/// # Interaction Configuration
///
/// Behavior of the caller-facing layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Upper bound for "wait until applied" calls; `None` waits indefinitely
    pub apply_wait_timeout_ms: Option<u64>,
    /// Added to the draw priority of screen-space objects
    pub screen_draw_priority_offset: i32,
    /// Name given to the background worker thread
    pub worker_thread_name: String,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            apply_wait_timeout_ms: None,
            screen_draw_priority_offset: 1_000_000,
            worker_thread_name: "map-layer".to_string(),
        }
    }
}

impl InteractionConfig {
    /// Wait bound as a [`Duration`]
    pub fn apply_wait_timeout(&self) -> Option<Duration> {
        self.apply_wait_timeout_ms.map(Duration::from_millis)
    }
}

/// # Engine Configuration
///
/// Top-level configuration of the interaction layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Resource limits
    pub resources: ResourceConfig,
    /// Selection defaults
    pub selection: SelectionConfig,
    /// Interaction behavior
    pub interaction: InteractionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            resources: ResourceConfig::default(),
            selection: SelectionConfig::default(),
            interaction: InteractionConfig::default(),
        }
    }
}

impl Config for EngineConfig {}

impl EngineConfig {
    /// Replace the resource group
    pub fn with_resources(mut self, resources: ResourceConfig) -> Self {
        self.resources = resources;
        self
    }

    /// Set the apply-wait timeout
    pub fn with_apply_wait_timeout(mut self, timeout: Duration) -> Self {
        self.interaction.apply_wait_timeout_ms =
            Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Validate every group
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resources.validate()?;
        if !(self.selection.default_screen_distance >= 0.0) {
            return Err(ConfigError::Invalid(
                "default_screen_distance must be non-negative".to_string(),
            ));
        }
        if self.interaction.worker_thread_name.is_empty() {
            return Err(ConfigError::Invalid(
                "worker_thread_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            log_level = "debug"

            [resources]
            max_transient_contexts = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.resources.max_transient_contexts, 2);
        assert_eq!(config.resources.atlas_page_size, 2048);
        assert_eq!(config.interaction, InteractionConfig::default());
    }

    #[test]
    fn test_invalid_atlas_rejected() {
        let config = EngineConfig::default()
            .with_resources(ResourceConfig::default().with_atlas(100, 16));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_contexts_rejected() {
        let resources = ResourceConfig::default().with_max_transient_contexts(0);
        assert!(resources.validate().is_err());
    }

    #[test]
    fn test_save_and_load_ron() {
        let path = std::env::temp_dir().join(format!("map_engine_cfg_{}.ron", std::process::id()));
        let config = EngineConfig::default().with_apply_wait_timeout(Duration::from_millis(250));
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.interaction.apply_wait_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_unknown_extension() {
        let result = EngineConfig::load_from_file("settings.yaml");
        assert!(result.is_err());
    }
}
