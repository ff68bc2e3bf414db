// src/formula/format.rs

//! Formula data model
//!
//! A formula is a plain immutable record plus ordered step descriptions.
//! The declaration shape ([`FormulaDecl`]) is what TOML deserializes into;
//! [`Formula`] is the validated record the rest of the crate works with.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A validated, immutable package formula
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Formula {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) homepage: Option<String>,
    pub(crate) source_url: String,
    pub(crate) version: String,
    pub(crate) checksum: String,
    pub(crate) dependencies: Vec<String>,
    pub(crate) install_steps: Vec<Step>,
    pub(crate) test_steps: Vec<Invocation>,
}

impl Formula {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn homepage(&self) -> Option<&str> {
        self.homepage.as_deref()
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Direct dependencies in declaration order
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn install_steps(&self) -> &[Step] {
        &self.install_steps
    }

    pub fn test_steps(&self) -> &[Invocation] {
        &self.test_steps
    }

    /// Last path segment of the source URL, used for archive detection
    pub fn archive_filename(&self) -> &str {
        let url = self
            .source_url
            .split(['?', '#'])
            .next()
            .unwrap_or(&self.source_url);
        url.rsplit('/').next().unwrap_or(url)
    }
}

/// One subprocess invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Invocation {
    /// Executable name (looked up on PATH) or path
    pub cmd: String,

    /// Ordered argument list
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory override, relative to the source root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    /// Extra environment for this invocation only
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Expand glob patterns in arguments
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub glob: bool,
}

impl Invocation {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            glob: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn in_dir(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// One install step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Step {
    /// Run a subprocess
    Run(Invocation),

    /// Create a directory under the source root
    Mkdir(MkdirStep),

    /// Copy file(s) from the working directory into a prefix subdirectory
    Place(PlaceStep),
}

/// `mkdir = "dir"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MkdirStep {
    pub mkdir: String,
}

/// `place = "pattern"`, optionally with `into` and `cwd`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaceStep {
    pub place: String,
    #[serde(default = "default_place_dir")]
    pub into: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

impl Step {
    pub fn mkdir(dir: impl Into<String>) -> Self {
        Step::Mkdir(MkdirStep { mkdir: dir.into() })
    }

    pub fn place(pattern: impl Into<String>, into: impl Into<String>) -> Self {
        Step::Place(PlaceStep {
            place: pattern.into(),
            into: into.into(),
            cwd: None,
        })
    }
}

impl Step {
    /// Short label used in logs
    pub fn describe(&self) -> String {
        match self {
            Step::Run(inv) => {
                if inv.args.is_empty() {
                    inv.cmd.clone()
                } else {
                    format!("{} {}", inv.cmd, inv.args.join(" "))
                }
            }
            Step::Mkdir(step) => format!("mkdir {}", step.mkdir),
            Step::Place(step) => format!("place {} -> {}", step.place, step.into),
        }
    }
}

impl From<Invocation> for Step {
    fn from(inv: Invocation) -> Self {
        Step::Run(inv)
    }
}

fn default_place_dir() -> String {
    "bin".to_string()
}

/// Raw declaration as written in a formula file
///
/// Required fields are optional here so that a missing one is reported as
/// a malformed formula rather than a generic TOML error.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FormulaDecl {
    pub name: Option<String>,
    #[serde(default, alias = "desc")]
    pub description: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default, alias = "url", alias = "sourceURL")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, alias = "sha256")]
    pub checksum: Option<String>,
    #[serde(default, alias = "depends_on")]
    pub dependencies: Vec<String>,
    #[serde(default, alias = "install", alias = "installSteps")]
    pub install_steps: Vec<Step>,
    #[serde(default, alias = "test", alias = "testSteps")]
    pub test_steps: Vec<Invocation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_shapes_deserialize() {
        let steps: BTreeMap<String, Vec<Step>> = toml::from_str(
            r#"
[[steps]]
mkdir = "build"

[[steps]]
cmd = "make"
args = ["install"]
cwd = "build"

[[steps]]
place = "objconv"
"#,
        )
        .unwrap();

        let steps = &steps["steps"];
        assert_eq!(steps[0], Step::mkdir("build"));
        assert_eq!(
            steps[1],
            Step::Run(Invocation::new("make").arg("install").in_dir("build"))
        );
        assert_eq!(steps[2], Step::place("objconv", "bin"));
    }

    #[test]
    fn test_run_step_with_env_and_args() {
        let steps: BTreeMap<String, Vec<Step>> = toml::from_str(
            r#"
[[steps]]
cmd = "make"
args = ["-j2", "install"]
env = { DESTDIR = "/tmp/stage" }
"#,
        )
        .unwrap();

        let expected = Invocation::new("make")
            .args(["-j2", "install"])
            .env("DESTDIR", "/tmp/stage");
        assert_eq!(steps["steps"][0], Step::Run(expected));
    }

    #[test]
    fn test_mkdir_with_stray_field_rejected() {
        let parsed: Result<BTreeMap<String, Vec<Step>>, _> = toml::from_str(
            r#"
[[steps]]
mkdir = "obj"
cwd = "build"
"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_place_with_mkdir_field_rejected() {
        let parsed: Result<BTreeMap<String, Vec<Step>>, _> = toml::from_str(
            r#"
[[steps]]
place = "x"
mkdir = "y"
"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_step_describe() {
        let step = Step::from(Invocation::new("make").arg("install"));
        assert_eq!(step.describe(), "make install");
        assert_eq!(Step::mkdir("b").describe(), "mkdir b");
        assert_eq!(Step::place("*.so", "lib").describe(), "place *.so -> lib");
    }
}
