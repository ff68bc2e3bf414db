// src/install/process.rs

//! Blocking subprocess execution with captured output
//!
//! Child stdout and stderr go to anonymous temporary files rather than
//! pipes, so a child that writes more than a pipe buffer never stalls
//! while we wait on it.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

/// Exit status reported when a child was terminated without an exit code
pub const NO_EXIT_CODE: i32 = -1;

/// Captured result of a finished child process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl StepOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Stdout followed by stderr, for error reports
    pub fn combined(&self) -> String {
        let mut text = String::new();
        for part in [&self.stdout, &self.stderr] {
            let part = part.trim_end();
            if part.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(part);
        }
        text
    }
}

/// How a child process ended
#[derive(Debug)]
pub enum Completion {
    Exited(StepOutput),
    TimedOut,
}

/// A fully substituted command ready to launch
#[derive(Debug, Clone)]
pub struct Spawn<'a> {
    pub program: &'a str,
    pub args: &'a [String],
    pub dir: &'a Path,
    pub env: &'a BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl Spawn<'_> {
    /// Launch the child and block until it exits or the deadline passes
    pub fn run(&self) -> io::Result<Completion> {
        let program = program_path(self.program, self.dir);
        debug!(
            "Spawning {} {:?} in {}",
            program.display(),
            self.args,
            self.dir.display()
        );

        let mut stdout_file = tempfile::tempfile()?;
        let mut stderr_file = tempfile::tempfile()?;

        let mut child = Command::new(&program)
            .args(self.args)
            .current_dir(self.dir)
            .envs(self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file.try_clone()?))
            .stderr(Stdio::from(stderr_file.try_clone()?))
            .spawn()?;

        let status = match self.timeout {
            Some(limit) => match child.wait_timeout(limit)? {
                Some(status) => status,
                None => {
                    // The child may exit on its own between the deadline and the kill
                    let _ = child.kill();
                    child.wait()?;
                    return Ok(Completion::TimedOut);
                }
            },
            None => child.wait()?,
        };

        Ok(Completion::Exited(StepOutput {
            status: status.code().unwrap_or(NO_EXIT_CODE),
            stdout: read_back(&mut stdout_file)?,
            stderr: read_back(&mut stderr_file)?,
        }))
    }
}

/// Relative paths with a separator are taken relative to the step directory
fn program_path(program: &str, dir: &Path) -> PathBuf {
    let path = Path::new(program);
    if path.is_relative() && program.contains('/') {
        dir.join(path)
    } else {
        path.to_path_buf()
    }
}

fn read_back(file: &mut File) -> io::Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
