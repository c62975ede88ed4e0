//! Guard configuration stored at `<route>/guard.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::policy::Thresholds;
use crate::io::process::CommandLimits;

/// Config filename inside a route directory.
pub const CONFIG_FILE: &str = "guard.toml";

/// Guard configuration (TOML).
///
/// Edited by humans; missing fields fall back to defaults so an absent file
/// behaves like an empty one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GuardConfig {
    /// Wall-clock budget per review/judge command, in seconds.
    pub timeout_secs: u64,

    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Blockers tolerated by the policy and by `reviewed?` without flags.
    pub allow_blockers: u32,

    /// Nitpicks tolerated by the policy and by `reviewed?` without flags.
    pub allow_nitpicks: u32,

    /// Program and leading args used to run command templates (e.g. `["sh","-c"]`).
    pub shell: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30 * 60,
            output_limit_bytes: 1_000_000,
            allow_blockers: 0,
            allow_nitpicks: 0,
            shell: vec!["sh".to_string(), "-c".to_string()],
        }
    }
}

impl GuardConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.shell.is_empty() || self.shell[0].trim().is_empty() {
            return Err(anyhow!("shell must be a non-empty array"));
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            allow_blockers: self.allow_blockers,
            allow_nitpicks: self.allow_nitpicks,
        }
    }

    pub fn limits(&self) -> CommandLimits {
        CommandLimits {
            timeout: Duration::from_secs(self.timeout_secs),
            output_limit_bytes: self.output_limit_bytes,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `GuardConfig::default()`.
pub fn load_config(path: &Path) -> Result<GuardConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no guard config, using defaults");
        let cfg = GuardConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: GuardConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Write `cfg` as TOML to `path`, refusing values `load_config` would reject.
pub fn write_config(path: &Path, cfg: &GuardConfig) -> Result<()> {
    cfg.validate()?;
    let body = toml::to_string_pretty(cfg).context("serialize config toml")?;
    fs::write(path, format!("{body}\n")).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, GuardConfig::default());
        assert_eq!(cfg.thresholds(), Thresholds::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        fs::write(&path, "allow_nitpicks = 2\ntimeout_secs = 5\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.allow_nitpicks, 2);
        assert_eq!(cfg.limits().timeout, Duration::from_secs(5));
        assert_eq!(cfg.shell, vec!["sh", "-c"]);
    }

    #[test]
    fn rejects_zero_timeout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        fs::write(&path, "timeout_secs = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("timeout_secs"));
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        let cfg = GuardConfig {
            allow_blockers: 1,
            ..GuardConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        assert_eq!(load_config(&path).expect("load"), cfg);
    }

    #[test]
    fn write_refuses_invalid_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        let cfg = GuardConfig {
            timeout_secs: 0,
            ..GuardConfig::default()
        };
        assert!(write_config(&path, &cfg).is_err());
        assert!(!path.exists());
    }
}
