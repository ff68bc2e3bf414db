// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn name_arg() -> Arg {
    Arg::new("name").required(true).help("Formula name")
}

fn build_cli() -> Command {
    Command::new("formulary")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Formulary Contributors")
        .about("Build and install packages from source formulas")
        .subcommand_required(true)
        .arg(
            Arg::new("formula_dir")
                .long("formula-dir")
                .global(true)
                .env("FORMULARY_FORMULA_DIR")
                .default_value("/usr/local/share/formulary/formulas")
                .help("Directory holding *.toml formulas"),
        )
        .arg(
            Arg::new("prefix")
                .long("prefix")
                .global(true)
                .env("FORMULARY_PREFIX")
                .default_value("/usr/local")
                .help("Installation prefix"),
        )
        .arg(
            Arg::new("db_path")
                .short('d')
                .long("db-path")
                .global(true)
                .env("FORMULARY_DB")
                .default_value("/var/lib/formulary/formulary.db")
                .help("State database path"),
        )
        .arg(
            Arg::new("env")
                .long("env")
                .global(true)
                .value_name("KEY=VALUE")
                .action(ArgAction::Append)
                .help("Pass KEY=VALUE through to every step's environment (repeatable)"),
        )
        .arg(
            Arg::new("var")
                .long("var")
                .global(true)
                .value_name("KEY=VALUE")
                .action(ArgAction::Append)
                .help("Define a %(KEY)s substitution variable (repeatable)"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .global(true)
                .env("FORMULARY_STEP_TIMEOUT")
                .value_name("SECS")
                .help("Kill any step running longer than this many seconds"),
        )
        .arg(
            Arg::new("http_timeout")
                .long("http-timeout")
                .global(true)
                .value_name("SECS")
                .help("HTTP timeout in seconds for source downloads"),
        )
        .subcommand(
            Command::new("install")
                .about("Install a formula and its dependencies, then run its tests")
                .arg(name_arg())
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Reinstall even if already installed"),
                )
                .arg(
                    Arg::new("skip_tests")
                        .long("skip-tests")
                        .action(ArgAction::SetTrue)
                        .help("Do not run the formula's tests after installing"),
                ),
        )
        .subcommand(
            Command::new("test")
                .about("Run the tests of an installed formula")
                .arg(name_arg()),
        )
        .subcommand(
            Command::new("fetch")
                .about("Download and verify a formula's source archive")
                .arg(name_arg()),
        )
        .subcommand(
            Command::new("deps")
                .about("Show the install order for a formula")
                .arg(name_arg()),
        )
        .subcommand(
            Command::new("info")
                .about("Show details about a formula")
                .arg(name_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print as JSON"),
                ),
        )
        .subcommand(
            Command::new("list").about("List installed formulas").arg(
                Arg::new("json")
                    .long("json")
                    .action(ArgAction::SetTrue)
                    .help("Print as JSON"),
            ),
        )
        .subcommand(Command::new("history").about("Show run history"))
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set"));
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("formulary.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
