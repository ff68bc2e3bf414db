// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use formulary::config::{self, Config, Toolchain};
use formulary::formula::{Registry, Step};
use formulary::{InstallOptions, Runner};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "formulary")]
#[command(author, version, about = "Build and install packages from source formulas", long_about = None)]
struct Cli {
    /// Directory holding *.toml formulas
    #[arg(long, global = true, env = "FORMULARY_FORMULA_DIR", default_value = config::DEFAULT_FORMULA_DIR)]
    formula_dir: PathBuf,

    /// Installation prefix
    #[arg(long, global = true, env = "FORMULARY_PREFIX", default_value = config::DEFAULT_PREFIX)]
    prefix: PathBuf,

    /// State database path
    #[arg(short, long, global = true, env = "FORMULARY_DB", default_value = config::DEFAULT_DB_PATH)]
    db_path: String,

    /// Pass KEY=VALUE through to every step's environment (repeatable)
    #[arg(long = "env", global = true, value_name = "KEY=VALUE", value_parser = config::parse_key_value)]
    env: Vec<(String, String)>,

    /// Define a %(KEY)s substitution variable (repeatable)
    #[arg(long = "var", global = true, value_name = "KEY=VALUE", value_parser = config::parse_key_value)]
    vars: Vec<(String, String)>,

    /// Kill any step running longer than this many seconds
    #[arg(long, global = true, env = "FORMULARY_STEP_TIMEOUT", value_name = "SECS")]
    timeout: Option<u64>,

    /// HTTP timeout in seconds for source downloads
    #[arg(long, global = true, value_name = "SECS")]
    http_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a formula and its dependencies, then run its tests
    Install {
        /// Formula name
        name: String,
        /// Reinstall even if already installed
        #[arg(short, long)]
        force: bool,
        /// Do not run the formula's tests after installing
        #[arg(long)]
        skip_tests: bool,
    },
    /// Run the tests of an installed formula
    Test {
        /// Formula name
        name: String,
    },
    /// Download and verify a formula's source archive
    Fetch {
        /// Formula name
        name: String,
    },
    /// Show the install order for a formula
    Deps {
        /// Formula name
        name: String,
    },
    /// Show details about a formula
    Info {
        /// Formula name
        name: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List installed formulas
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show run history
    History,
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::new()
            .with_prefix(&self.prefix)
            .with_formula_dir(&self.formula_dir)
            .with_db_path(&self.db_path)
            .with_toolchain(Toolchain::from_env());

        for (key, value) in &self.env {
            config = config.with_env(key, value);
        }
        for (key, value) in &self.vars {
            config = config.with_var(key, value);
        }
        if let Some(secs) = self.timeout {
            config = config.with_step_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.http_timeout {
            config = config.with_http_timeout(Duration::from_secs(secs));
        }

        config
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<formulary::Error>()
            .map(formulary::Error::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.config();

    match cli.command {
        Commands::Install {
            name,
            force,
            skip_tests,
        } => {
            let mut runner = Runner::new(config)?;
            let report = runner.install(&name, InstallOptions { force, skip_tests })?;

            for skipped in &report.skipped {
                println!("Already installed: {}", skipped);
            }
            for installed in &report.installed {
                println!("Installed: {}", installed);
            }
            Ok(())
        }
        Commands::Test { name } => {
            let mut runner = Runner::new(config)?;
            runner.test(&name)?;
            println!("Tests passed: {}", name);
            Ok(())
        }
        Commands::Fetch { name } => {
            let mut runner = Runner::new(config)?;
            let kind = runner.fetch(&name)?;
            println!("Fetched and verified {} ({:?} archive)", name, kind);
            Ok(())
        }
        Commands::Deps { name } => {
            let runner = Runner::new(config)?;
            let order = runner.plan(&name)?;
            info!("{} requires {} formula(s)", name, order.len());
            for (index, formula) in order.iter().enumerate() {
                println!("{:>3}. {} {}", index + 1, formula.name(), formula.version());
            }
            Ok(())
        }
        Commands::Info { name, json } => {
            let runner = Runner::new(config)?;
            let formula = runner.registry().get(&name)?;

            if json {
                println!("{}", serde_json::to_string_pretty(formula)?);
                return Ok(());
            }

            println!("{} {}", formula.name(), formula.version());
            if let Some(description) = formula.description() {
                println!("  {}", description);
            }
            if let Some(homepage) = formula.homepage() {
                println!("  Homepage: {}", homepage);
            }
            println!("  Source: {}", formula.source_url());
            println!("  Checksum: {}", formula.checksum());
            if !formula.dependencies().is_empty() {
                println!("  Depends on: {}", formula.dependencies().join(", "));
            }
            println!("  Install steps:");
            for step in formula.install_steps() {
                println!("    {}", step.describe());
            }
            if !formula.test_steps().is_empty() {
                println!("  Test steps:");
                for invocation in formula.test_steps() {
                    println!("    {}", Step::Run(invocation.clone()).describe());
                }
            }

            let installed = runner.installed()?;
            match installed.iter().find(|record| record.name == formula.name()) {
                Some(record) => println!(
                    "  Installed: {} in {} ({})",
                    record.version,
                    record.prefix,
                    record.installed_at.as_deref().unwrap_or("unknown")
                ),
                None => println!("  Not installed"),
            }
            Ok(())
        }
        Commands::List { json } => {
            let runner = Runner::with_registry(config, Registry::new())?;
            let installed = runner.installed()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&installed)?);
            } else if installed.is_empty() {
                println!("No formulas installed.");
            } else {
                println!("Installed formulas:");
                for record in &installed {
                    println!("  {} {} [{}]", record.name, record.version, record.prefix);
                }
                println!("\nTotal: {} formula(s)", installed.len());
            }
            Ok(())
        }
        Commands::History => {
            let runner = Runner::with_registry(config, Registry::new())?;
            let runs = runner.history()?;

            if runs.is_empty() {
                println!("No run history.");
                return Ok(());
            }

            println!("Run history:");
            for run in &runs {
                let timestamp = run
                    .finished_at
                    .as_deref()
                    .or(run.started_at.as_deref())
                    .unwrap_or("unknown");
                println!(
                    "  [{}] {} - {} {} ({})",
                    run.id.unwrap_or_default(),
                    timestamp,
                    run.action.as_str(),
                    run.formula,
                    run.status.as_str()
                );
                if let Some(detail) = run.detail.as_deref() {
                    if let Some(first) = detail.lines().next() {
                        println!("      {}", first);
                    }
                }
            }
            println!("\nTotal: {} run(s)", runs.len());
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "formulary", &mut std::io::stdout());
            Ok(())
        }
    }
}
