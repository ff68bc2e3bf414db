// src/formula/parser.rs

//! Formula file parsing and validation

use crate::error::{Error, Result};
use crate::fetch::verify::Checksum;
use crate::formula::format::{Formula, FormulaDecl};
use std::path::Path;
use tracing::debug;

/// Version string used when neither the declaration nor the URL carries one
pub const UNVERSIONED: &str = "unversioned";

/// Parse a formula from a TOML string
pub fn parse_formula(content: &str) -> Result<Formula> {
    let decl: FormulaDecl =
        toml::from_str(content).map_err(|e| Error::MalformedFormula(e.to_string()))?;

    validate(decl)
}

/// Parse a formula from a file
pub fn parse_formula_file(path: &Path) -> Result<Formula> {
    debug!("Loading formula from {}", path.display());

    let content = std::fs::read_to_string(path)?;

    parse_formula(&content).map_err(|e| match e {
        Error::MalformedFormula(msg) => {
            Error::MalformedFormula(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

fn validate(decl: FormulaDecl) -> Result<Formula> {
    let name = required(decl.name, "name")?;
    let source_url = required(decl.source_url, "source_url")?;
    let checksum = required(decl.checksum, "checksum")?;

    if name.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(Error::MalformedFormula(format!(
            "Invalid formula name '{}'",
            name
        )));
    }

    // Only the shape is checked here; digest length is left to verification
    Checksum::parse(&checksum)?;

    if decl.dependencies.iter().any(|d| d.trim().is_empty()) {
        return Err(Error::MalformedFormula(format!(
            "Formula '{}' has an empty dependency name",
            name
        )));
    }

    let version = match decl.version.filter(|v| !v.trim().is_empty()) {
        Some(v) => v,
        None => infer_version(&name, &source_url).unwrap_or_else(|| UNVERSIONED.to_string()),
    };

    Ok(Formula {
        name,
        description: decl.description,
        homepage: decl.homepage,
        source_url,
        version,
        checksum,
        dependencies: decl.dependencies,
        install_steps: decl.install_steps,
        test_steps: decl.test_steps,
    })
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(Error::MalformedFormula(format!(
            "Missing required field '{}'",
            field
        ))),
    }
}

/// Infer a version from the archive file name
///
/// `grub-2.02.tar.xz` yields `2.02`. The stem after the last `-` or `_` is
/// taken when it starts with a digit.
fn infer_version(name: &str, source_url: &str) -> Option<String> {
    let filename = source_url.rsplit('/').next()?;

    let stem = [".tar.gz", ".tar.xz", ".tar.zst", ".tar.bz2", ".tgz", ".txz", ".tar", ".zip"]
        .iter()
        .find_map(|ext| filename.strip_suffix(ext))
        .unwrap_or(filename);

    let candidate = stem
        .strip_prefix(name)
        .map(|rest| rest.trim_start_matches(['-', '_']))
        .or_else(|| stem.rsplit(['-', '_']).next())?;

    if candidate.starts_with(|c: char| c.is_ascii_digit()) {
        Some(candidate.to_string())
    } else {
        None
    }
}
