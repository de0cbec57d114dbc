//! Centralized configuration and builder for the era tools.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - EraConfig::from_env() reads the ERA_* variables; the CLI starts from it.
//! - EraConfigBuilder starts from env (or clean defaults) and allows overrides.
//!
//! Defaults:
//! - data_fsync = true (restore fsyncs nodes before swapping the superblock)
//! - strict_invalidate = false (invalidate reports damage and still emits blocks)
//! - btree_max_entries = None (fill nodes to block capacity)
//! - progress_every = 100_000 description events between progress lines

use std::fmt;

#[derive(Clone, Debug)]
pub struct EraConfig {
    /// Fsync the store before and after writing the superblock on commit.
    /// Env: ERA_DATA_FSYNC (default true; "0|false|off|no" => false)
    pub data_fsync: bool,

    /// Abort invalidate on the first sign of damage instead of reporting it.
    /// Env: ERA_INVALIDATE_STRICT (default false)
    pub strict_invalidate: bool,

    /// Cap on entries per btree node when building the writeset tree.
    /// None means "as many as fit in a metadata block".
    /// Env: ERA_BTREE_MAX_ENTRIES
    pub btree_max_entries: Option<u32>,

    /// Restore progress line every N parsed description events (0 disables).
    /// Env: ERA_PROGRESS_EVERY (default 100000)
    pub progress_every: u64,
}

impl Default for EraConfig {
    fn default() -> Self {
        Self {
            data_fsync: true,
            strict_invalidate: false,
            btree_max_entries: None,
            progress_every: 100_000,
        }
    }
}

#[inline]
fn env_flag(v: &str) -> Option<bool> {
    let s = v.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl EraConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("ERA_DATA_FSYNC") {
            if let Some(on) = env_flag(&v) {
                cfg.data_fsync = on;
            }
        }

        if let Ok(v) = std::env::var("ERA_INVALIDATE_STRICT") {
            if let Some(on) = env_flag(&v) {
                cfg.strict_invalidate = on;
            }
        }

        if let Ok(v) = std::env::var("ERA_BTREE_MAX_ENTRIES") {
            if let Ok(n) = v.trim().parse::<u32>() {
                // узлу нужно хотя бы две записи, иначе дерево не растёт вширь
                if n >= 2 {
                    cfg.btree_max_entries = Some(n);
                }
            }
        }

        if let Ok(v) = std::env::var("ERA_PROGRESS_EVERY") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.progress_every = n;
            }
        }

        cfg
    }

    /// Fluent setters (builder-style) to override specific fields.

    pub fn with_data_fsync(mut self, on: bool) -> Self {
        self.data_fsync = on;
        self
    }

    pub fn with_strict_invalidate(mut self, on: bool) -> Self {
        self.strict_invalidate = on;
        self
    }

    pub fn with_btree_max_entries(mut self, n: Option<u32>) -> Self {
        self.btree_max_entries = n;
        self
    }

    pub fn with_progress_every(mut self, n: u64) -> Self {
        self.progress_every = n;
        self
    }
}

impl fmt::Display for EraConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EraConfig {{ \
             data_fsync: {}, \
             strict_invalidate: {}, \
             btree_max_entries: {}, \
             progress_every: {} \
             }}",
            self.data_fsync,
            self.strict_invalidate,
            self.btree_max_entries
                .map(|v| v.to_string())
                .unwrap_or_else(|| "default(block capacity)".to_string()),
            self.progress_every,
        )
    }
}

/// Lightweight builder that produces an EraConfig.
#[derive(Clone, Debug)]
pub struct EraConfigBuilder {
    cfg: EraConfig,
}

impl Default for EraConfigBuilder {
    fn default() -> Self {
        // Start from env, then allow overrides.
        Self {
            cfg: EraConfig::from_env(),
        }
    }
}

impl EraConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: EraConfig::default(),
        }
    }

    pub fn data_fsync(mut self, on: bool) -> Self {
        self.cfg.data_fsync = on;
        self
    }

    pub fn strict_invalidate(mut self, on: bool) -> Self {
        self.cfg.strict_invalidate = on;
        self
    }

    pub fn btree_max_entries(mut self, n: Option<u32>) -> Self {
        self.cfg.btree_max_entries = n;
        self
    }

    pub fn progress_every(mut self, n: u64) -> Self {
        self.cfg.progress_every = n;
        self
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> EraConfig {
        self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let cfg = EraConfigBuilder::from_default()
            .data_fsync(false)
            .strict_invalidate(true)
            .btree_max_entries(Some(4))
            .progress_every(0)
            .build();
        assert!(!cfg.data_fsync);
        assert!(cfg.strict_invalidate);
        assert_eq!(cfg.btree_max_entries, Some(4));
        assert_eq!(cfg.progress_every, 0);
        assert!(cfg.to_string().contains("btree_max_entries: 4"));
    }

    #[test]
    fn env_flag_parsing() {
        assert_eq!(env_flag(" On "), Some(true));
        assert_eq!(env_flag("0"), Some(false));
        assert_eq!(env_flag("maybe"), None);
    }
}
