//! Configuration Module - GC Tuning Parameters
//!
//! A region's behaviour is mostly fixed by the spec it implements (single
//! mutex, conservative stack scan, finaliser-on-sweep), so there is little
//! here to tune. What remains mirrors the rest of this workspace's
//! configuration surface: a `Default` impl, a `validate`, and a
//! `from_env` that layers environment variables over the defaults.

/// Configuration for a [`crate::GcRegion`].
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Initial capacity of the stack-root pointer table.
    ///
    /// Grows by one slot (realloc) whenever a new root pointer is
    /// registered and no free slot remains.
    ///
    /// Default: 10
    pub initial_root_table_capacity: usize,

    /// Enable the page-list consistency audit on every alloc/realloc/free.
    ///
    /// Mirrors the `EyotDebug` environment variable. Walks the full page
    /// list checking `prev`/`next` symmetry; panics with the page list
    /// logged at `debug` level on the first inconsistency found.
    ///
    /// Default: false
    pub consistency_check: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        GcConfig {
            initial_root_table_capacity: 10,
            consistency_check: false,
        }
    }
}

impl GcConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_root_table_capacity == 0 {
            return Err(ConfigError::InvalidRootTableCapacity(
                "initial_root_table_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Build configuration from environment variables.
    ///
    /// - `EyotDebug=y` enables [`GcConfig::consistency_check`].
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("EyotDebug") {
            config.consistency_check = val == "y";
        }

        config
    }
}

/// Error types for configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid root table capacity: {0}")]
    InvalidRootTableCapacity(String),
}
