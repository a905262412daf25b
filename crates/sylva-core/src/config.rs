//! Typed run configuration.
//!
//! Parses the classic `key = value` configuration file into a
//! [`ForestConfig`]: the solver tuning knobs (`w`, `b`, `D` required;
//! `mu`, `g`, `r` optional), the edge-noise magnitude, the worker-pool
//! bound, and the per-invocation solver timeout. Unknown keys are ignored
//! so configuration files shared with companion tools keep working.
//! Malformed or missing required parameters are [`ForestError::Config`]
//! errors, reported before any run starts.

use std::path::Path;
use std::time::Duration;

use crate::engine::errors::ForestError;
use crate::engine::oracle::{DummyMode, SolverParams};

/// Default standard deviation for edge-noise perturbation.
pub const DEFAULT_NOISE_SD: f64 = 0.333;

/// Default per-invocation solver timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// The full typed parameter bundle consumed by the engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForestConfig {
    /// Solver tuning knobs passed through to the oracle.
    pub params: SolverParams,
    /// Standard deviation of edge-noise perturbation.
    pub noise_sd: f64,
    /// Worker-pool bound for randomized runs and folds (0 = library
    /// default).
    pub workers: usize,
    /// Per-invocation solver timeout.
    pub timeout: Duration,
}

impl Default for ForestConfig {
    fn default() -> Self {
        ForestConfig {
            params: SolverParams::default(),
            noise_sd: DEFAULT_NOISE_SD,
            workers: 0,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ForestConfig {
    /// Reads and parses a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ForestError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str_contents(&text)
    }

    /// Parses configuration file contents.
    pub fn from_str_contents(text: &str) -> Result<Self, ForestError> {
        let mut w = None;
        let mut b = None;
        let mut d = None;
        let mut config = ForestConfig::default();

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ForestError::Config(format!(
                    "config line {}: expected 'key = value', got '{}'",
                    lineno + 1,
                    line
                )));
            };
            let key = key.trim();
            let value = value.trim();
            match key {
                "w" => w = Some(parse_float(key, value, lineno)?),
                "b" => b = Some(parse_float(key, value, lineno)?),
                "D" => d = Some(parse_int(key, value, lineno)?),
                "mu" => config.params.mu = parse_float(key, value, lineno)?,
                "g" => config.params.g = parse_float(key, value, lineno)?,
                "r" => config.params.r = parse_float(key, value, lineno)?,
                "noise" => config.noise_sd = parse_float(key, value, lineno)?,
                "threads" => config.workers = parse_int(key, value, lineno)? as usize,
                "timeout" => {
                    config.timeout = Duration::from_secs(u64::from(parse_int(key, value, lineno)?))
                }
                "dummyMode" => {
                    config.params.dummy_mode = match value {
                        "terminals" => DummyMode::Terminals,
                        "others" => DummyMode::Others,
                        "all" => DummyMode::All,
                        other => {
                            return Err(ForestError::Config(format!(
                                "config line {}: dummyMode must be terminals, others, or all; got '{}'",
                                lineno + 1,
                                other
                            )))
                        }
                    }
                }
                // Companion-tool keys (garnetBeta, processes, ...) pass
                // through unread.
                _ => {}
            }
        }

        config.params.w = w.ok_or_else(|| missing("w"))?;
        config.params.b = b.ok_or_else(|| missing("b"))?;
        config.params.d = d.ok_or_else(|| missing("D"))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges once all sources (file, CLI overrides) have
    /// been applied.
    pub fn validate(&self) -> Result<(), ForestError> {
        if !self.params.w.is_finite() || self.params.w < 0.0 {
            return Err(ForestError::Config(format!(
                "w = {} must be finite and non-negative",
                self.params.w
            )));
        }
        if !self.params.b.is_finite() || self.params.b <= 0.0 {
            return Err(ForestError::Config(format!(
                "b = {} must be finite and positive",
                self.params.b
            )));
        }
        if !self.noise_sd.is_finite() || self.noise_sd < 0.0 {
            return Err(ForestError::Config(format!(
                "noise = {} must be finite and non-negative",
                self.noise_sd
            )));
        }
        Ok(())
    }
}

fn missing(key: &str) -> ForestError {
    ForestError::Config(format!("required parameter '{}' is missing", key))
}

fn parse_float(key: &str, value: &str, lineno: usize) -> Result<f64, ForestError> {
    value.parse().map_err(|_| {
        ForestError::Config(format!(
            "config line {}: unparsable value '{}' for '{}'",
            lineno + 1,
            value,
            key
        ))
    })
}

fn parse_int(key: &str, value: &str, lineno: usize) -> Result<u32, ForestError> {
    value.parse().map_err(|_| {
        ForestError::Config(format!(
            "config line {}: unparsable value '{}' for '{}'",
            lineno + 1,
            value,
            key
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_documented_keys() {
        let config = ForestConfig::from_str_contents(
            "# forest parameters\nw = 6.0\nb = 12\nD = 10\nmu = 0.009\nnoise = 0.25\nthreads = 4\ndummyMode = all\n",
        )
        .unwrap();
        assert_eq!(config.params.w, 6.0);
        assert_eq!(config.params.b, 12.0);
        assert_eq!(config.params.d, 10);
        assert_eq!(config.params.mu, 0.009);
        assert_eq!(config.noise_sd, 0.25);
        assert_eq!(config.workers, 4);
        assert_eq!(config.params.dummy_mode, DummyMode::All);
    }

    #[test]
    fn missing_required_keys_are_config_errors() {
        let err = ForestConfig::from_str_contents("w = 6.0\nb = 12\n").unwrap_err();
        assert!(matches!(err, ForestError::Config(_)));
        assert!(err.to_string().contains("'D'"));
    }

    #[test]
    fn malformed_lines_and_values_are_rejected() {
        assert!(ForestConfig::from_str_contents("w 6.0\n").is_err());
        assert!(ForestConfig::from_str_contents("w = six\nb = 1\nD = 5\n").is_err());
        assert!(ForestConfig::from_str_contents("w = 1\nb = 0\nD = 5\n").is_err());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = ForestConfig::from_str_contents(
            "w = 1\nb = 1\nD = 5\ngarnetBeta = 0.5\nprocesses = 8\n",
        )
        .unwrap();
        assert_eq!(config.params.d, 5);
    }
}
