//! Sweep configuration stored in `exp-runner.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::core::allow_list::AllowList;
use crate::core::types::{ExitPolicy, StreamMode};

pub const DEFAULT_CONFIG_FILE: &str = "exp-runner.toml";

/// Sweep configuration (TOML).
///
/// Missing fields take the values of the classic small-instance sweep:
/// twenty runs of `./mlp` per allow-listed file in `./instances`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SweepConfig {
    /// Directory whose entries are matched against `allow_list`.
    pub instances_dir: PathBuf,

    /// Solver executable, invoked as `<solver> <instances_dir>/<name>`.
    pub solver: PathBuf,

    /// Runs per matched instance.
    pub repetitions: u32,

    pub allow_list: AllowList,

    /// Kill a solver run after this many seconds. Unset means wait forever.
    pub run_timeout_secs: Option<u64>,

    /// Collect solver stdout/stderr instead of passing them through.
    pub capture_output: bool,

    /// Keep at most this many bytes of each captured stream.
    pub capture_limit_bytes: usize,

    pub exit_policy: ExitPolicy,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            instances_dir: PathBuf::from("./instances"),
            solver: PathBuf::from("./mlp"),
            repetitions: 20,
            allow_list: AllowList::default(),
            run_timeout_secs: None,
            capture_output: false,
            capture_limit_bytes: 100_000,
            exit_policy: ExitPolicy::Ignore,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<()> {
        if self.solver.to_string_lossy().trim().is_empty() {
            return Err(anyhow!("solver must be a non-empty path"));
        }
        if self.run_timeout_secs == Some(0) {
            return Err(anyhow!("run_timeout_secs must be > 0 when set"));
        }
        if self.capture_limit_bytes == 0 {
            return Err(anyhow!("capture_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }

    pub fn stream_mode(&self) -> StreamMode {
        if self.capture_output {
            StreamMode::Capture {
                limit_bytes: self.capture_limit_bytes,
            }
        } else {
            StreamMode::Inherit
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SweepConfig::default()`.
pub fn load_config(path: &Path) -> Result<SweepConfig> {
    if !path.exists() {
        let cfg = SweepConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SweepConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
