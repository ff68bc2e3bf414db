// src/lib.rs

//! Formulary
//!
//! A small build-from-source package runner. Each package is a declarative
//! formula: where its source archive lives, the checksum that archive must
//! have, which other formulas it needs, and the commands that build,
//! install and test it.
//!
//! # Architecture
//!
//! - `formula`: declaration parsing, the in-memory registry, dependency resolution
//! - `fetch`: download, checksum verification, archive extraction
//! - `install`: ordered step execution against a prefix with a scoped working directory
//! - `runner`: end-to-end orchestration with run tracking
//! - `db`: SQLite state (installed formulas, run history)

pub mod config;
pub mod db;
mod error;
pub mod fetch;
pub mod formula;
pub mod install;
pub mod runner;

pub use config::Config;
pub use error::{Error, Result};
pub use runner::{InstallOptions, InstallReport, Runner};
