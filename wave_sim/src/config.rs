//! Engine configuration
//!
//! `EngineConfig::default()` reproduces the reference behaviour: a 100-entry
//! cache, a femtosecond animation step and a one second compute watchdog.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which compute path evaluates fields off the caller's thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendPreference {
    /// Try the GPU, fall back to the thread pool
    #[default]
    Auto,
    /// Rayon thread pool only
    Cpu,
    /// GPU only; failing to create it is fatal
    Gpu,
}

/// Geometry settings for the probability ribbon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Height of the tallest probability peak in model units
    pub height_scale: f32,
    /// y coordinate of the ribbon's lower edge
    pub baseline: f32,
    /// The domain is mapped onto `[-half_width, half_width]`
    pub half_width: f32,
    /// Capacity multiplier applied when the vertex storage has to grow
    pub growth_factor: f32,
    /// Snapshots closer than this (seconds) to the last build are skipped
    pub min_time_delta: f64,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            height_scale: 1.2,
            baseline: -0.6,
            half_width: 1.6,
            growth_factor: 1.5,
            min_time_delta: 1e-18,
        }
    }
}

/// Top-level engine settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of cached snapshots
    pub cache_capacity: usize,
    /// Animation step in seconds; also the cache key quantum
    pub time_step: f64,
    /// How long a launched computation may run before it is written off
    pub watchdog_timeout: Duration,
    pub backend: BackendPreference,
    pub mesh: MeshConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 100,
            time_step: 1e-15,
            watchdog_timeout: Duration::from_secs(1),
            backend: BackendPreference::Auto,
            mesh: MeshConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_watchdog_timeout(mut self, timeout: Duration) -> Self {
        self.watchdog_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.cache_capacity == 0 {
            return Err(EngineError::InvalidConfig("cache capacity must be at least 1".into()));
        }
        if !(self.time_step.is_finite() && self.time_step > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "time step must be positive, got {}",
                self.time_step
            )));
        }
        if self.watchdog_timeout.is_zero() {
            return Err(EngineError::InvalidConfig("watchdog timeout must be non-zero".into()));
        }
        if self.mesh.growth_factor < 1.5 {
            return Err(EngineError::InvalidConfig(format!(
                "mesh growth factor must be at least 1.5, got {}",
                self.mesh.growth_factor
            )));
        }
        if !(self.mesh.height_scale > 0.0 && self.mesh.half_width > 0.0) {
            return Err(EngineError::InvalidConfig("mesh extents must be positive".into()));
        }
        Ok(())
    }
}
