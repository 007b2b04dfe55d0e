//! # Sync Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file yields the stock protocol limits.
//!
//! ```toml
//! tick_interval_ms = 600
//! view_distance = 15
//! max_admissions_per_tick = 15
//! sync_npcs = true
//! ```

use std::path::Path;

use emberveil_shared::constants::{
    DEFAULT_NPC_CAPACITY, DEFAULT_PACKET_CAPACITY, DEFAULT_PLAYER_CAPACITY,
    DEFAULT_TICK_INTERVAL_MS, DEFAULT_VIEW_DISTANCE, MAX_ADMISSIONS_PER_TICK, MAX_LOCAL_ENTITIES,
    MAX_NPC_CAPACITY, MAX_PLAYER_CAPACITY, MAX_VIEW_DISTANCE,
};
use serde::Deserialize;

use crate::error::ConfigError;

/// Smallest packet that can hold the header, the own sector and a terminator.
const MIN_PACKET_CAPACITY: usize = 16;

/// Entity synchronization settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Duration of one tick in milliseconds.
    pub tick_interval_ms: u64,
    /// View distance in tiles (at most 15).
    pub view_distance: u8,
    /// Local list cap per observer and kind (at most 255).
    pub max_local_entities: usize,
    /// Admissions per list per tick.
    pub max_admissions_per_tick: usize,
    /// Player registry capacity (at most 2047).
    pub player_capacity: usize,
    /// NPC registry capacity (at most 16383).
    pub npc_capacity: usize,
    /// Hard capacity of one outbound packet in bytes.
    pub packet_capacity: usize,
    /// Bound of the inbound world command queue.
    pub command_queue_capacity: usize,
    /// Bound of the outbound packet queue.
    pub outbound_queue_capacity: usize,
    /// Build the NPC update packet as well.
    pub sync_npcs: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            view_distance: DEFAULT_VIEW_DISTANCE,
            max_local_entities: MAX_LOCAL_ENTITIES,
            max_admissions_per_tick: MAX_ADMISSIONS_PER_TICK,
            player_capacity: DEFAULT_PLAYER_CAPACITY,
            npc_capacity: DEFAULT_NPC_CAPACITY,
            packet_capacity: DEFAULT_PACKET_CAPACITY,
            command_queue_capacity: 8192,
            outbound_queue_capacity: 8192,
            sync_npcs: true,
        }
    }
}

impl SyncConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML or unknown keys, and
    /// [`ConfigError::Invalid`] for values the protocol cannot carry.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks every field against the wire limits.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(invalid("tick_interval_ms", "must be positive"));
        }
        if self.view_distance > MAX_VIEW_DISTANCE {
            return Err(invalid(
                "view_distance",
                format!("{} exceeds {MAX_VIEW_DISTANCE}", self.view_distance),
            ));
        }
        if self.max_local_entities == 0 || self.max_local_entities > MAX_LOCAL_ENTITIES {
            return Err(invalid(
                "max_local_entities",
                format!("must be within 1..={MAX_LOCAL_ENTITIES}"),
            ));
        }
        if self.max_admissions_per_tick == 0
            || self.max_admissions_per_tick > self.max_local_entities
        {
            return Err(invalid(
                "max_admissions_per_tick",
                "must be within 1..=max_local_entities",
            ));
        }
        if self.player_capacity == 0 || self.player_capacity > MAX_PLAYER_CAPACITY {
            return Err(invalid(
                "player_capacity",
                format!("must be within 1..={MAX_PLAYER_CAPACITY}"),
            ));
        }
        if self.npc_capacity > MAX_NPC_CAPACITY {
            return Err(invalid(
                "npc_capacity",
                format!("{} exceeds {MAX_NPC_CAPACITY}", self.npc_capacity),
            ));
        }
        if self.packet_capacity < MIN_PACKET_CAPACITY {
            return Err(invalid(
                "packet_capacity",
                format!("must be at least {MIN_PACKET_CAPACITY}"),
            ));
        }
        if self.command_queue_capacity == 0 || self.outbound_queue_capacity == 0 {
            return Err(invalid("queue capacity", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol_limits() {
        let config = SyncConfig::default();
        assert_eq!(config.tick_interval_ms, 600);
        assert_eq!(config.view_distance, 15);
        assert_eq!(config.max_local_entities, 255);
        assert_eq!(config.max_admissions_per_tick, 15);
        assert_eq!(config.player_capacity, 2000);
        assert!(config.sync_npcs);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(SyncConfig::from_toml_str("").unwrap(), SyncConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = SyncConfig::from_toml_str("view_distance = 8\nsync_npcs = false\n").unwrap();
        assert_eq!(config.view_distance, 8);
        assert!(!config.sync_npcs);
        assert_eq!(config.max_local_entities, 255);
    }

    #[test]
    fn test_rejects_wide_view_distance() {
        let err = SyncConfig::from_toml_str("view_distance = 16").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "view_distance", .. }));
    }

    #[test]
    fn test_rejects_terminator_slot() {
        let err = SyncConfig::from_toml_str("player_capacity = 2048").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "player_capacity", .. }));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let err = SyncConfig::from_toml_str("tick_rate = 60").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = SyncConfig::from_toml_file("/nonexistent/emberveil.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
