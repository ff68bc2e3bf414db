// src/formula/registry.rs

//! Formula registry and dependency closure
//!
//! The registry owns every loaded formula, keyed by name. Dependency
//! resolution walks declared dependencies depth-first in declaration order
//! and emits each formula after all of its dependencies, so the result is
//! directly usable as an install order.

use crate::error::{Error, Result};
use crate::formula::format::Formula;
use crate::formula::parser::parse_formula_file;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// Loaded formulas keyed by name
#[derive(Debug, Default)]
pub struct Registry {
    formulas: BTreeMap<String, Formula>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.toml` formula in a directory
    pub fn load_dir(dir: &Path) -> Result<Self> {
        info!("Loading formulas from {}", dir.display());

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut registry = Self::new();
        for path in paths {
            registry.insert(parse_formula_file(&path)?)?;
        }

        info!("Loaded {} formula(s)", registry.len());
        Ok(registry)
    }

    /// Add a formula; names must be unique
    pub fn insert(&mut self, formula: Formula) -> Result<()> {
        if self.contains(formula.name()) {
            return Err(Error::MalformedFormula(format!(
                "Duplicate formula name '{}'",
                formula.name()
            )));
        }
        self.formulas.insert(formula.name().to_string(), formula);
        Ok(())
    }

    /// Look up a formula by name
    pub fn get(&self, name: &str) -> Result<&Formula> {
        self.formulas
            .get(name)
            .ok_or_else(|| Error::FormulaNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.formulas.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// All formulas, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &Formula> {
        self.formulas.values()
    }

    /// Resolve the dependency closure of a formula
    ///
    /// Returns every formula exactly once with dependencies first; the
    /// requested formula is last. Every dependency must be known to the
    /// registry.
    pub fn resolve_dependencies<'a>(&'a self, formula: &'a Formula) -> Result<Vec<&'a Formula>> {
        self.resolve_dependencies_with(formula, |_| false)
    }

    /// Resolve the dependency closure, skipping dependencies already present
    ///
    /// A dependency for which `is_present` returns true is not traversed and
    /// does not appear in the result, whether or not the registry knows it.
    pub fn resolve_dependencies_with<'a, F>(
        &'a self,
        formula: &'a Formula,
        is_present: F,
    ) -> Result<Vec<&'a Formula>>
    where
        F: Fn(&str) -> bool,
    {
        let mut walk = Walk {
            registry: self,
            is_present: &is_present,
            done: HashSet::new(),
            path: Vec::new(),
            order: Vec::new(),
        };
        walk.visit(formula)?;

        debug!(
            "Resolved {} to [{}]",
            formula.name(),
            walk.order
                .iter()
                .map(|f| f.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(walk.order)
    }
}

/// Depth-first traversal state
struct Walk<'a, 'p> {
    registry: &'a Registry,
    is_present: &'p dyn Fn(&str) -> bool,
    /// Fully resolved formulas
    done: HashSet<&'a str>,
    /// Formulas on the current traversal path, in order
    path: Vec<&'a str>,
    order: Vec<&'a Formula>,
}

impl<'a> Walk<'a, '_> {
    fn visit(&mut self, formula: &'a Formula) -> Result<()> {
        let name = formula.name();

        if self.done.contains(name) {
            return Ok(());
        }

        if let Some(start) = self.path.iter().position(|n| *n == name) {
            let mut cycle: Vec<String> = self.path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(name.to_string());
            return Err(Error::DependencyCycle(cycle));
        }

        self.path.push(name);

        for dep in formula.dependencies() {
            if (self.is_present)(dep.as_str()) {
                debug!("Dependency {} of {} already present", dep, name);
                continue;
            }
            let dep_formula = self.registry.formulas.get(dep.as_str()).ok_or_else(|| {
                Error::FormulaNotFound(format!("{} (required by {})", dep, name))
            })?;
            self.visit(dep_formula)?;
        }

        self.path.pop();
        self.done.insert(name);
        self.order.push(formula);

        Ok(())
    }
}
