//! World construction parameters.

use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};

/// Largest grid side; cell coordinates are `i32`.
pub const MAX_GRID_SIZE: u32 = i32::MAX as u32;

/// Parameters fixed when a [`World`](crate::world::World) is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Root grid width in cells.
    pub root_width: u32,
    /// Root grid height in cells.
    pub root_height: u32,
    /// Side length of every child grid. Must be odd so each wall has a
    /// single midpoint cell.
    pub module_size: u32,
    /// Seconds per tick.
    pub tick_interval: Fixed64,
    /// Floor applied to every interval change.
    pub min_tick_interval: Fixed64,
    /// Ring buffer capacity per event kind.
    pub event_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            root_width: 16,
            root_height: 16,
            module_size: 7,
            tick_interval: Fixed64::from_num(0.5),
            min_tick_interval: Fixed64::from_num(1) / 64,
            event_capacity: 1024,
        }
    }
}

impl WorldConfig {
    pub fn with_root_size(mut self, width: u32, height: u32) -> Self {
        self.root_width = width;
        self.root_height = height;
        self
    }

    pub fn with_module_size(mut self, size: u32) -> Self {
        self.module_size = size;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root_width == 0 || self.root_height == 0 {
            return Err(ConfigError::EmptyRoot {
                width: self.root_width,
                height: self.root_height,
            });
        }
        let largest = self.root_width.max(self.root_height).max(self.module_size);
        if largest > MAX_GRID_SIZE {
            return Err(ConfigError::GridTooLarge(largest));
        }
        if self.module_size < 3 || self.module_size % 2 == 0 {
            return Err(ConfigError::InvalidModuleSize(self.module_size));
        }
        if self.min_tick_interval <= Fixed64::ZERO {
            return Err(ConfigError::NonPositiveInterval);
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroEventCapacity);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("root grid must be non-empty, got {width}x{height}")]
    EmptyRoot { width: u32, height: u32 },
    #[error("grid side {0} exceeds the maximum of {MAX_GRID_SIZE}")]
    GridTooLarge(u32),
    #[error("module size must be odd and at least 3, got {0}")]
    InvalidModuleSize(u32),
    #[error("minimum tick interval must be positive")]
    NonPositiveInterval,
    #[error("event capacity must be positive")]
    ZeroEventCapacity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(WorldConfig::default().validate(), Ok(()));
    }

    #[test]
    fn even_module_size_rejected() {
        let config = WorldConfig::default().with_module_size(6);
        assert_eq!(config.validate(), Err(ConfigError::InvalidModuleSize(6)));
        let config = WorldConfig::default().with_module_size(1);
        assert_eq!(config.validate(), Err(ConfigError::InvalidModuleSize(1)));
    }

    #[test]
    fn empty_root_rejected() {
        let config = WorldConfig::default().with_root_size(0, 4);
        assert!(matches!(config.validate(), Err(ConfigError::EmptyRoot { .. })));
    }

    #[test]
    fn oversized_grid_rejected() {
        let config = WorldConfig::default().with_root_size(MAX_GRID_SIZE + 1, 4);
        assert_eq!(config.validate(), Err(ConfigError::GridTooLarge(MAX_GRID_SIZE + 1)));
        let config = WorldConfig::default().with_module_size(u32::MAX);
        assert_eq!(config.validate(), Err(ConfigError::GridTooLarge(u32::MAX)));
        let config = WorldConfig::default().with_root_size(MAX_GRID_SIZE, 1);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn non_positive_interval_rejected() {
        let config = WorldConfig {
            min_tick_interval: Fixed64::ZERO,
            ..WorldConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveInterval));
    }
}
