// src/runner.rs

//! End-to-end orchestration
//!
//! The runner ties the pieces together: resolve the dependency closure,
//! then fetch, verify, extract, install and record each formula in order.
//! Every attempt is tracked as a run in the state database.

use crate::config::Config;
use crate::db;
use crate::db::models::{InstalledFormula, Run, RunAction, RunStatus};
use crate::error::{Error, Result};
use crate::fetch::{self, ArchiveKind, Fetcher};
use crate::formula::{Formula, Registry};
use crate::install::Installer;
use rusqlite::Connection;
use std::collections::HashSet;
use tracing::{info, warn};

/// Options for [`Runner::install`]
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Reinstall the requested formula even if it is recorded as installed
    pub force: bool,
    /// Do not run the requested formula's tests afterwards
    pub skip_tests: bool,
}

/// Result of a successful install
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Formulas installed by this call, in install order
    pub installed: Vec<String>,
    /// Formulas left alone because they were already installed
    pub skipped: Vec<String>,
}

pub struct Runner {
    config: Config,
    registry: Registry,
    fetcher: Fetcher,
    conn: Connection,
}

impl Runner {
    /// Load formulas from the configured directory and open the state database
    pub fn new(config: Config) -> Result<Self> {
        let registry = Registry::load_dir(&config.formula_dir)?;
        info!(
            "Loaded {} formulas from {}",
            registry.len(),
            config.formula_dir.display()
        );
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: Config, registry: Registry) -> Result<Self> {
        let conn = db::open_or_init(&config.db_path)?;
        let fetcher = Fetcher::with_timeout(config.http_timeout)?;
        Ok(Self {
            config,
            registry,
            fetcher,
            conn,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Full install order for a formula, ignoring what is installed
    pub fn plan(&self, name: &str) -> Result<Vec<&Formula>> {
        let formula = self.registry.get(name)?;
        self.registry.resolve_dependencies(formula)
    }

    /// Install a formula and whatever it depends on
    ///
    /// Dependencies already recorded as installed are not revisited. The
    /// requested formula's tests run after it is installed; a test failure
    /// is returned but the install stays recorded.
    pub fn install(&mut self, name: &str, options: InstallOptions) -> Result<InstallReport> {
        let installed: HashSet<String> = InstalledFormula::list_all(&self.conn)?
            .into_iter()
            .map(|record| record.name)
            .collect();

        let target = self.registry.get(name)?;
        let order: Vec<Formula> = self
            .registry
            .resolve_dependencies_with(target, |dep| installed.contains(dep))?
            .into_iter()
            .cloned()
            .collect();

        let mut report = InstallReport::default();
        let mut target_installed = false;

        for formula in &order {
            let is_target = formula.name() == name;
            if installed.contains(formula.name()) && !(is_target && options.force) {
                info!(
                    "{} is already installed, skipping",
                    formula.name()
                );
                report.skipped.push(formula.name().to_string());
                continue;
            }

            self.tracked(RunAction::Install, formula.name(), |runner, run_id| {
                runner.install_one(formula, run_id)
            })?;
            report.installed.push(formula.name().to_string());
            target_installed |= is_target;
        }

        if target_installed && !options.skip_tests {
            if let Some(formula) = order.last() {
                self.tracked(RunAction::Test, formula.name(), |runner, _| {
                    Installer::new(&runner.config).run_tests(formula)
                })?;
            }
        }

        Ok(report)
    }

    /// Run the tests of an installed formula
    pub fn test(&mut self, name: &str) -> Result<()> {
        let formula = self.registry.get(name)?.clone();
        if !InstalledFormula::is_installed(&self.conn, name)? {
            return Err(Error::NotInstalled(name.to_string()));
        }

        self.tracked(RunAction::Test, name, |runner, _| {
            Installer::new(&runner.config).run_tests(&formula)
        })
    }

    /// Download and verify a formula's source without installing it
    ///
    /// Returns the archive kind that would be used for extraction.
    pub fn fetch(&mut self, name: &str) -> Result<ArchiveKind> {
        let formula = self.registry.get(name)?.clone();
        self.tracked(RunAction::Fetch, name, |runner, _| {
            let bytes = runner.download(&formula)?;
            ArchiveKind::detect(formula.archive_filename(), &bytes)
        })
    }

    /// Installed formulas, by name
    pub fn installed(&self) -> Result<Vec<InstalledFormula>> {
        InstalledFormula::list_all(&self.conn)
    }

    /// Recorded runs, most recent first
    pub fn history(&self) -> Result<Vec<Run>> {
        Run::list_all(&self.conn)
    }

    fn download(&self, formula: &Formula) -> Result<Vec<u8>> {
        let bytes = self.fetcher.fetch(formula.source_url())?;
        fetch::verify(&bytes, formula.checksum())?;
        info!("Checksum verified for {}", formula.name());
        Ok(bytes)
    }

    fn install_one(&mut self, formula: &Formula, run_id: i64) -> Result<()> {
        let bytes = self.download(formula)?;
        let kind = ArchiveKind::detect(formula.archive_filename(), &bytes)?;
        let source = fetch::extract(&bytes, kind)?;

        Installer::new(&self.config).install(formula, source.root())?;

        let prefix = self.config.prefix.display().to_string();
        db::transaction(&mut self.conn, |tx| {
            let mut record = InstalledFormula::new(
                formula.name(),
                formula.version(),
                formula.checksum(),
                prefix,
            );
            record.run_id = Some(run_id);
            record.upsert(tx)
        })?;

        Ok(())
    }

    /// Record `f` as a run: pending first, then succeeded or failed
    fn tracked<T, F>(&mut self, action: RunAction, formula: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self, i64) -> Result<T>,
    {
        let mut run = Run::new(action, formula);
        let run_id = run.insert(&self.conn)?;

        match f(self, run_id) {
            Ok(value) => {
                run.finish(&self.conn, RunStatus::Succeeded, None)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(db_err) = run.finish(&self.conn, RunStatus::Failed, Some(e.to_string()))
                {
                    warn!("Failed to record run {}: {}", run_id, db_err);
                }
                Err(e)
            }
        }
    }
}
