use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::models::EntranceStyle;

/// Abstraction build options. Programmatic only; no environment plumbing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Edge length, in tiles, of each square cluster (last row/column may be
    /// truncated). Must be at least 2.
    pub cluster_size: i32,
    pub entrance_style: EntranceStyle,
    /// Reserved for multi-level hierarchies; must be at least 1.
    pub max_level: u8,
    /// Cache intra-edge concrete paths for refinement instead of
    /// recomputing them per query.
    pub store_paths: bool,
    /// Apply the straight-line smoothing pass to query results.
    pub smooth_paths: bool,
    /// Worker threads for the intra-edge stage; `None` uses the global
    /// rayon pool.
    pub threads: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster_size: 8,
            entrance_style: EntranceStyle::End,
            max_level: 1,
            store_paths: true,
            smooth_paths: true,
            threads: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.cluster_size <= 1 {
            bail!("cluster_size must be at least 2, got {}", self.cluster_size);
        }
        if self.max_level < 1 {
            bail!("max_level must be at least 1, got {}", self.max_level);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_options() {
        let mut cfg = Config::default();
        cfg.cluster_size = 1;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.max_level = 0;
        assert!(cfg.validate().is_err());
    }
}
