// src/formula/mod.rs

//! Formula declarations
//!
//! A formula describes how to fetch, verify, build and install one package:
//! - Source archive location and its checksum
//! - Dependencies on other formulas
//! - Install steps (directory creation, subprocess invocations, file placement)
//! - Test steps run after a successful install
//!
//! # Example Formula
//!
//! ```toml
//! name = "objconv"
//! desc = "Object file converter and disassembler"
//! url = "http://www.agner.org/optimize/objconv.zip"
//! version = "2.44"
//! sha256 = "f2c0c4cd6ff227e76ffed5796953cd9ae9eb228847ca9a14dba6392c573bb7a4"
//!
//! [[install]]
//! cmd = "unzip"
//! args = ["source.zip", "-dsrc"]
//!
//! [[install]]
//! cmd = "%(cxx)s"
//! args = ["-o", "objconv", "-O2", "src/*.cpp"]
//! glob = true
//!
//! [[install]]
//! place = "objconv"
//! into = "bin"
//!
//! [[test]]
//! cmd = "%(bin)s/objconv"
//! args = ["-h"]
//! ```

mod format;
pub mod parser;
mod registry;

pub use format::{Formula, Invocation, MkdirStep, PlaceStep, Step};
pub use parser::{parse_formula, parse_formula_file};
pub use registry::Registry;
