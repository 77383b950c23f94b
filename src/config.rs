//! Engine configuration stored under `.triad/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Engine configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to values that
/// keep an unconfigured run bounded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Default `max_attempts` for nodes that do not set their own.
    pub max_attempts_default: u32,

    /// Default `max_depth` for nodes that do not set their own.
    pub max_depth_default: u32,

    /// Default per-phase wall-clock budget in seconds.
    pub timeout_seconds_default: u64,

    /// `max_attempts` given to children created by a Decompose decision
    /// when the decision payload does not override it.
    pub decompose_max_attempts: u32,

    /// Hard ceiling on execution cycles per run.
    pub max_iterations: u32,

    /// Assessment perspectives, consulted in this order.
    pub perspectives: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts_default: 3,
            max_depth_default: 5,
            timeout_seconds_default: 300,
            decompose_max_attempts: 2,
            max_iterations: 100,
            perspectives: vec![
                "build".to_string(),
                "requirements".to_string(),
                "integration".to_string(),
                "quality".to_string(),
            ],
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts_default == 0 {
            return Err(anyhow!("max_attempts_default must be >= 1"));
        }
        if self.timeout_seconds_default == 0 {
            return Err(anyhow!("timeout_seconds_default must be > 0"));
        }
        if self.decompose_max_attempts == 0 {
            return Err(anyhow!("decompose_max_attempts must be >= 1"));
        }
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be >= 1"));
        }
        if self.perspectives.is_empty()
            || self.perspectives.iter().any(|p| p.trim().is_empty())
        {
            return Err(anyhow!("perspectives must be a non-empty array of names"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = EngineConfig {
            max_iterations: 7,
            perspectives: vec!["build".to_string()],
            ..EngineConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "max_iterations = 5\n").expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_iterations, 5);
        assert_eq!(cfg.max_attempts_default, 3);
        assert_eq!(cfg.perspectives.len(), 4);
    }

    #[test]
    fn rejects_empty_perspectives() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "perspectives = []\n").expect("write");

        assert!(load_config(&path).is_err());
    }
}
