// src/config.rs

//! Runner configuration
//!
//! Everything a run depends on beyond the formulas themselves: where
//! things are installed, where state is kept, which compiler to hand to
//! recipes and which variables to pass through to subprocesses. Nothing in
//! the library reads the process environment on its own; `main` builds a
//! [`Config`] and passes it down.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetch::HTTP_TIMEOUT;

/// Default installation prefix
pub const DEFAULT_PREFIX: &str = "/usr/local";

/// Default directory holding `*.toml` formulas
pub const DEFAULT_FORMULA_DIR: &str = "/usr/local/share/formulary/formulas";

/// Default state database path
pub const DEFAULT_DB_PATH: &str = "/var/lib/formulary/formulary.db";

/// C and C++ compilers handed to recipes as `%(cc)s` / `%(cxx)s`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub cc: String,
    pub cxx: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            cc: "cc".to_string(),
            cxx: "c++".to_string(),
        }
    }
}

impl Toolchain {
    /// Honour `CC` / `CXX` overrides from the environment
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cc: std::env::var("CC")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.cc),
            cxx: std::env::var("CXX")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.cxx),
        }
    }

    /// Environment exported to every step
    pub fn env_vars(&self) -> Vec<(String, String)> {
        vec![
            ("CC".to_string(), self.cc.clone()),
            ("CXX".to_string(), self.cxx.clone()),
        ]
    }
}

/// Configuration for a runner
#[derive(Debug, Clone)]
pub struct Config {
    /// Installation root
    pub prefix: PathBuf,
    /// Directory holding formula declarations
    pub formula_dir: PathBuf,
    /// State database path
    pub db_path: String,
    /// Variables passed through to every subprocess
    pub env: BTreeMap<String, String>,
    /// Extra `%(name)s` substitution variables
    pub vars: BTreeMap<String, String>,
    pub toolchain: Toolchain,
    /// Wall-clock deadline for a single step (None = wait forever)
    pub step_timeout: Option<Duration>,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: PathBuf::from(DEFAULT_PREFIX),
            formula_dir: PathBuf::from(DEFAULT_FORMULA_DIR),
            db_path: DEFAULT_DB_PATH.to_string(),
            env: BTreeMap::new(),
            vars: BTreeMap::new(),
            toolchain: Toolchain::default(),
            step_timeout: None,
            http_timeout: HTTP_TIMEOUT,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_formula_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.formula_dir = dir.into();
        self
    }

    pub fn with_db_path(mut self, path: impl Into<String>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }
}

/// Parse a `KEY=VALUE` command-line pair
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}
