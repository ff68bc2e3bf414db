// src/install/mod.rs

//! Install and test step execution
//!
//! The installer runs a formula's install steps strictly in order against
//! an extracted source tree, then (on request) its test steps. Each step
//! is either a subprocess invocation, a directory creation or a file
//! placement into the prefix. The first failing step aborts the sequence.
//!
//! The installer keeps a logical working directory. Steps with a `cwd`
//! enter it through [`ScopedDir`], which restores the previous directory on
//! every exit path; the process-wide current directory is never touched.

mod process;
mod workdir;

pub use process::{Completion, NO_EXIT_CODE, Spawn, StepOutput};
pub use workdir::ScopedDir;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::formula::{Formula, Invocation, Step};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Exit status reported when a step's command cannot be spawned
pub const COMMAND_NOT_FOUND: i32 = 127;

/// Installation prefix layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    root: PathBuf,
}

impl Prefix {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn lib(&self) -> PathBuf {
        self.root.join("lib")
    }

    pub fn include(&self) -> PathBuf {
        self.root.join("include")
    }

    pub fn share(&self) -> PathBuf {
        self.root.join("share")
    }

    /// Create the standard subdirectories
    pub fn create_layout(&self) -> Result<()> {
        for dir in [self.bin(), self.lib(), self.include(), self.share()] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

/// Which sequence a step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Install,
    Test,
}

impl Phase {
    fn failure(self, step: usize, status: i32, output: String) -> Error {
        match self {
            Phase::Install => Error::InstallFailed {
                step,
                status,
                output,
            },
            Phase::Test => Error::TestFailed {
                step,
                status,
                output,
            },
        }
    }
}

/// Runs install and test steps for formulas
pub struct Installer<'c> {
    config: &'c Config,
    prefix: Prefix,
    cwd: PathBuf,
}

impl<'c> Installer<'c> {
    /// Create an installer targeting the configured prefix
    pub fn new(config: &'c Config) -> Self {
        let prefix = Prefix::new(&config.prefix);
        let cwd = prefix.root().to_path_buf();
        Self {
            config,
            prefix,
            cwd,
        }
    }

    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    /// The installer's current working directory
    pub fn current_dir(&self) -> &Path {
        &self.cwd
    }

    /// Execute `install_steps` of a formula against an extracted source tree
    pub fn install(&mut self, formula: &Formula, source_root: &Path) -> Result<()> {
        info!(
            "Installing {} {} into {}",
            formula.name(),
            formula.version(),
            self.prefix.root().display()
        );

        self.prefix.create_layout()?;

        let ctx = StepContext::new(self.config, &self.prefix, formula, source_root);
        let mut scope = ScopedDir::enter(&mut self.cwd, source_root.to_path_buf());

        for (index, step) in formula.install_steps().iter().enumerate() {
            info!("[{}] step {}: {}", formula.name(), index, step.describe());
            ctx.install_step(index, step, &mut scope)?;
        }

        info!("Installed {} {}", formula.name(), formula.version());
        Ok(())
    }

    /// Execute `test_steps` of an installed formula
    ///
    /// Tests run in a fresh temporary directory. A failure is reported as
    /// [`Error::TestFailed`]; nothing that was installed is removed.
    pub fn run_tests(&mut self, formula: &Formula) -> Result<()> {
        if formula.test_steps().is_empty() {
            info!("No tests declared for {}", formula.name());
            return Ok(());
        }

        info!("Testing {} {}", formula.name(), formula.version());

        let test_dir = TempDir::new()?;
        let ctx = StepContext::new(self.config, &self.prefix, formula, test_dir.path());
        let mut scope = ScopedDir::enter(&mut self.cwd, test_dir.path().to_path_buf());

        for (index, invocation) in formula.test_steps().iter().enumerate() {
            info!("[{}] test {}: {}", formula.name(), index, invocation.cmd);
            let dir = ctx.step_dir(scope.path(), invocation.cwd.as_deref());
            let inner = scope.enter_child(dir);
            ctx.invoke(Phase::Test, index, invocation, inner.path())?;
        }

        info!("Tests passed for {}", formula.name());
        Ok(())
    }
}

/// Per-formula state shared by every step of one sequence
struct StepContext<'a> {
    prefix: &'a Prefix,
    vars: Variables,
    env: BTreeMap<String, String>,
    timeout: Option<Duration>,
}

impl<'a> StepContext<'a> {
    fn new(config: &Config, prefix: &'a Prefix, formula: &Formula, buildpath: &Path) -> Self {
        let vars = Variables::for_formula(config, prefix, formula, buildpath);

        let mut env = BTreeMap::new();
        env.insert("PATH".to_string(), search_path(&prefix.bin()));
        for (key, value) in config.toolchain.env_vars() {
            env.insert(key, value);
        }
        for (key, value) in &config.env {
            env.insert(key.clone(), vars.substitute(value));
        }

        Self {
            prefix,
            vars,
            env,
            timeout: config.step_timeout,
        }
    }

    fn step_dir(&self, base: &Path, cwd: Option<&str>) -> PathBuf {
        let cwd = cwd.map(|dir| self.vars.substitute(dir));
        workdir::resolve(base, cwd.as_deref())
    }

    fn install_step(&self, index: usize, step: &Step, scope: &mut ScopedDir<'_>) -> Result<()> {
        match step {
            Step::Run(invocation) => {
                let dir = self.step_dir(scope.path(), invocation.cwd.as_deref());
                let inner = scope.enter_child(dir);
                self.invoke(Phase::Install, index, invocation, inner.path())
            }
            Step::Mkdir(step) => {
                let dir = self.step_dir(scope.path(), Some(&step.mkdir));
                debug!("Creating directory {}", dir.display());
                fs::create_dir_all(&dir).map_err(|e| {
                    Phase::Install.failure(
                        index,
                        NO_EXIT_CODE,
                        format!("Failed to create {}: {}", dir.display(), e),
                    )
                })
            }
            Step::Place(step) => {
                let dir = self.step_dir(scope.path(), step.cwd.as_deref());
                let inner = scope.enter_child(dir);
                self.place(index, &step.place, &step.into, inner.path())
            }
        }
    }

    /// Run one subprocess and map its outcome onto the step taxonomy
    fn invoke(&self, phase: Phase, index: usize, invocation: &Invocation, dir: &Path) -> Result<()> {
        let program = self.vars.substitute(&invocation.cmd);

        let mut args = Vec::with_capacity(invocation.args.len());
        for arg in &invocation.args {
            let arg = self.vars.substitute(arg);
            if invocation.glob && is_glob(&arg) {
                let matches = expand_glob(dir, &arg)
                    .map_err(|e| phase.failure(index, NO_EXIT_CODE, e))?;
                args.extend(matches);
            } else {
                args.push(arg);
            }
        }

        let mut env = self.env.clone();
        for (key, value) in &invocation.env {
            env.insert(key.clone(), self.vars.substitute(value));
        }

        let spawn = Spawn {
            program: &program,
            args: &args,
            dir,
            env: &env,
            timeout: self.timeout,
        };

        match spawn.run() {
            Ok(Completion::Exited(output)) => {
                for line in output.stdout.lines() {
                    debug!("[{}] {}", program, line);
                }
                if output.success() {
                    return Ok(());
                }
                for line in output.stderr.lines() {
                    warn!("[{}] {}", program, line);
                }
                Err(phase.failure(index, output.status, output.combined()))
            }
            Ok(Completion::TimedOut) => {
                warn!("{} killed after {:?}", program, self.timeout);
                Err(Error::Timeout {
                    step: index,
                    limit: self.timeout.unwrap_or_default(),
                })
            }
            Err(e) => Err(phase.failure(
                index,
                COMMAND_NOT_FOUND,
                format!("Failed to spawn {} in {}: {}", program, dir.display(), e),
            )),
        }
    }

    /// Copy matching files from `dir` into a prefix subdirectory
    fn place(&self, index: usize, pattern: &str, into: &str, dir: &Path) -> Result<()> {
        let fail = |msg: String| Phase::Install.failure(index, NO_EXIT_CODE, msg);

        let pattern = self.vars.substitute(pattern);
        let dest = self.prefix.root().join(self.vars.substitute(into));

        let sources: Vec<PathBuf> = if is_glob(&pattern) {
            expand_glob(dir, &pattern)
                .map_err(fail)?
                .into_iter()
                .map(|p| dir.join(p))
                .collect()
        } else {
            vec![dir.join(&pattern)]
        };

        if sources.is_empty() || !sources.iter().all(|p| p.exists()) {
            return Err(fail(format!(
                "Nothing to place: {} matches no file in {}",
                pattern,
                dir.display()
            )));
        }

        fs::create_dir_all(&dest)
            .map_err(|e| fail(format!("Failed to create {}: {}", dest.display(), e)))?;

        for source in sources {
            let Some(file_name) = source.file_name() else {
                return Err(fail(format!("Cannot place {}", source.display())));
            };
            let target = dest.join(file_name);
            debug!("Placing {} -> {}", source.display(), target.display());
            copy_tree(&source, &target).map_err(|e| {
                fail(format!(
                    "Failed to place {} into {}: {}",
                    source.display(),
                    dest.display(),
                    e
                ))
            })?;
        }

        Ok(())
    }
}

/// `%(name)s` substitution table
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: BTreeMap<String, String>,
}

impl Variables {
    fn for_formula(config: &Config, prefix: &Prefix, formula: &Formula, buildpath: &Path) -> Self {
        let mut vars = Self::default();

        // User variables first so built-ins cannot be shadowed
        for (key, value) in &config.vars {
            vars.set(key, value.clone());
        }

        vars.set("name", formula.name().to_string());
        vars.set("version", formula.version().to_string());
        vars.set("prefix", prefix.root().display().to_string());
        vars.set("bin", prefix.bin().display().to_string());
        vars.set("lib", prefix.lib().display().to_string());
        vars.set("include", prefix.include().display().to_string());
        vars.set("share", prefix.share().display().to_string());
        vars.set("buildpath", buildpath.display().to_string());
        vars.set("cc", config.toolchain.cc.clone());
        vars.set("cxx", config.toolchain.cxx.clone());

        vars
    }

    pub fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    /// Replace every `%(key)s` whose key is known; unknown ones stay verbatim
    ///
    /// The template is scanned once, left to right. Substituted values are
    /// not rescanned.
    pub fn substitute(&self, template: &str) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("%(") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];

            let known = after
                .find(")s")
                .and_then(|end| self.values.get(&after[..end]).map(|value| (end, value)));
            match known {
                Some((end, value)) => {
                    result.push_str(value);
                    rest = &after[end + 2..];
                }
                None => {
                    result.push_str("%(");
                    rest = after;
                }
            }
        }

        result.push_str(rest);
        result
    }
}

/// `<prefix>/bin` ahead of the inherited PATH
fn search_path(bin: &Path) -> String {
    let mut paths = vec![bin.to_path_buf()];
    if let Some(existing) = std::env::var_os("PATH") {
        paths.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(paths)
        .unwrap_or_else(|_| OsString::from(bin.as_os_str()))
        .to_string_lossy()
        .into_owned()
}

fn is_glob(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Expand a pattern against `dir`, sorted
///
/// Relative patterns yield matches relative to `dir`. Absolute patterns
/// (typically after `%(buildpath)s` substitution) are globbed as written
/// and yield absolute matches.
fn expand_glob(dir: &Path, pattern: &str) -> std::result::Result<Vec<String>, String> {
    let full = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        let base = glob::Pattern::escape(&dir.to_string_lossy());
        format!("{}/{}", base.trim_end_matches('/'), pattern)
    };

    let entries =
        glob::glob(&full).map_err(|e| format!("Invalid glob pattern {}: {}", pattern, e))?;

    let mut matches = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| format!("Failed to expand {}: {}", pattern, e))?;
        let shown = if Path::new(pattern).is_absolute() {
            path.as_path()
        } else {
            path.strip_prefix(dir).unwrap_or(&path)
        };
        matches.push(shown.to_string_lossy().into_owned());
    }
    matches.sort();

    Ok(matches)
}

/// Copy a file or directory tree to `target`
///
/// Symlinks below `source` are recreated as symlinks, never followed, so a
/// link pointing back up the tree cannot recurse.
fn copy_tree(source: &Path, target: &Path) -> io::Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let dest = if relative.as_os_str().is_empty() {
            target.to_path_buf()
        } else {
            target.join(relative)
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&dest)?;
        } else if file_type.is_symlink() {
            if fs::symlink_metadata(&dest).is_ok() {
                fs::remove_file(&dest)?;
            }
            copy_symlink(entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, dest: &Path) -> io::Result<()> {
    let link = fs::read_link(source)?;
    std::os::unix::fs::symlink(link, dest)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(source, dest).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::parse_formula;

    fn formula(steps: &str) -> Formula {
        parse_formula(&format!(
            r#"
name = "hello"
url = "https://example.com/hello-1.0.tar.gz"
sha256 = "00"

{steps}
"#
        ))
        .unwrap()
    }

    struct Fixture {
        _prefix: TempDir,
        source: TempDir,
        config: Config,
    }

    fn fixture() -> Fixture {
        let prefix = TempDir::new().unwrap();
        let source = TempDir::new().unwrap();
        let config = Config::new().with_prefix(prefix.path());
        Fixture {
            _prefix: prefix,
            source,
            config,
        }
    }

    #[test]
    fn test_false_fails_at_step_zero() {
        let fx = fixture();
        let formula = formula(
            r#"
[[install]]
cmd = "false"
"#,
        );

        let mut installer = Installer::new(&fx.config);
        match installer.install(&formula, fx.source.path()) {
            Err(Error::InstallFailed { step, status, .. }) => {
                assert_eq!(step, 0);
                assert_eq!(status, 1);
            }
            other => panic!("expected InstallFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_failure_stops_remaining_steps() {
        let fx = fixture();
        let formula = formula(
            r#"
[[install]]
cmd = "touch"
args = ["first"]

[[install]]
cmd = "sh"
args = ["-c", "echo 'configure: error: C compiler cannot create executables' >&2; exit 77"]

[[install]]
cmd = "touch"
args = ["third"]
"#,
        );

        let mut installer = Installer::new(&fx.config);
        match installer.install(&formula, fx.source.path()) {
            Err(Error::InstallFailed {
                step,
                status,
                output,
            }) => {
                assert_eq!(step, 1);
                assert_eq!(status, 77);
                assert!(output.contains("cannot create executables"));
            }
            other => panic!("expected InstallFailed, got {:?}", other),
        }

        assert!(fx.source.path().join("first").exists());
        assert!(!fx.source.path().join("third").exists());
    }

    #[test]
    fn test_working_directory_restored() {
        let fx = fixture();
        let ok = formula(
            r#"
[[install]]
mkdir = "build"

[[install]]
cmd = "touch"
args = ["built"]
cwd = "build"
"#,
        );
        let failing = formula(
            r#"
[[install]]
cmd = "false"
cwd = "build"
"#,
        );

        let mut installer = Installer::new(&fx.config);
        let before = installer.current_dir().to_path_buf();

        installer.install(&ok, fx.source.path()).unwrap();
        assert_eq!(installer.current_dir(), before);
        assert!(fx.source.path().join("build/built").exists());

        assert!(installer.install(&failing, fx.source.path()).is_err());
        assert_eq!(installer.current_dir(), before);
    }

    #[test]
    fn test_relative_command_in_build_dir() {
        let fx = fixture();
        let configure = fx.source.path().join("configure");
        fs::write(&configure, "#!/bin/sh\necho \"$@\" > config.args\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&configure, fs::Permissions::from_mode(0o755)).unwrap();
        }

        let formula = formula(
            r#"
[[install]]
mkdir = "grub-build"

[[install]]
cmd = "../configure"
args = ["--prefix=%(prefix)s", "--disable-nls"]
cwd = "grub-build"
"#,
        );

        let mut installer = Installer::new(&fx.config);
        installer.install(&formula, fx.source.path()).unwrap();

        let recorded =
            fs::read_to_string(fx.source.path().join("grub-build/config.args")).unwrap();
        assert_eq!(
            recorded.trim(),
            format!("--prefix={} --disable-nls", fx.config.prefix.display())
        );
    }

    #[test]
    fn test_environment_pass_through() {
        let mut fx = fixture();
        fx.config = fx
            .config
            .clone()
            .with_env("TARGET_CC", "i386-elf-gcc")
            .with_toolchain(crate::config::Toolchain {
                cc: "my-cc".to_string(),
                cxx: "my-c++".to_string(),
            });

        let formula = formula(
            r#"
[[install]]
cmd = "sh"
args = ["-c", "echo $TARGET_CC $CXX $STEP_ONLY > env.txt"]
env = { STEP_ONLY = "%(version)s" }
"#,
        );

        let mut installer = Installer::new(&fx.config);
        installer.install(&formula, fx.source.path()).unwrap();

        let recorded = fs::read_to_string(fx.source.path().join("env.txt")).unwrap();
        assert_eq!(recorded.trim(), "i386-elf-gcc my-c++ 1.0");
    }

    #[test]
    fn test_glob_arguments_and_place() {
        let fx = fixture();
        fs::create_dir_all(fx.source.path().join("src")).unwrap();
        fs::write(fx.source.path().join("src/b.cpp"), "").unwrap();
        fs::write(fx.source.path().join("src/a.cpp"), "").unwrap();

        let formula = formula(
            r#"
[[install]]
cmd = "sh"
args = ["-c", "echo \"$@\" > objconv", "sh", "src/*.cpp"]
glob = true

[[install]]
place = "objconv"
into = "bin"
"#,
        );

        let mut installer = Installer::new(&fx.config);
        installer.install(&formula, fx.source.path()).unwrap();

        let placed = installer.prefix().bin().join("objconv");
        assert_eq!(fs::read_to_string(placed).unwrap().trim(), "src/a.cpp src/b.cpp");
    }

    #[test]
    fn test_place_missing_file_fails() {
        let fx = fixture();
        let formula = formula(
            r#"
[[install]]
place = "objconv"
"#,
        );

        let mut installer = Installer::new(&fx.config);
        match installer.install(&formula, fx.source.path()) {
            Err(Error::InstallFailed { step, status, .. }) => {
                assert_eq!(step, 0);
                assert_eq!(status, NO_EXIT_CODE);
            }
            other => panic!("expected InstallFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_mkdir_onto_file_fails() {
        let fx = fixture();
        fs::write(fx.source.path().join("build"), "not a directory").unwrap();
        let formula = formula(
            r#"
[[install]]
mkdir = "build/obj"

[[install]]
cmd = "touch"
args = ["after"]
"#,
        );

        let mut installer = Installer::new(&fx.config);
        match installer.install(&formula, fx.source.path()) {
            Err(Error::InstallFailed { step, status, output }) => {
                assert_eq!(step, 0);
                assert_eq!(status, NO_EXIT_CODE);
                assert!(output.contains("build/obj"));
            }
            other => panic!("expected InstallFailed, got {:?}", other),
        }
        assert!(!fx.source.path().join("after").exists());
    }

    #[test]
    fn test_absolute_glob_after_buildpath_substitution() {
        let fx = fixture();
        fs::create_dir_all(fx.source.path().join("src")).unwrap();
        fs::write(fx.source.path().join("src/a.cpp"), "").unwrap();
        fs::write(fx.source.path().join("notes.txt"), "read me").unwrap();

        let formula = formula(
            r#"
[[install]]
cmd = "sh"
args = ["-c", "echo \"$@\" > args.txt", "sh", "%(buildpath)s/src/*.cpp"]
glob = true

[[install]]
place = "%(buildpath)s/*.txt"
into = "share"
"#,
        );

        let mut installer = Installer::new(&fx.config);
        installer.install(&formula, fx.source.path()).unwrap();

        let recorded = fs::read_to_string(fx.source.path().join("args.txt")).unwrap();
        assert_eq!(
            recorded.trim(),
            fx.source.path().join("src/a.cpp").display().to_string()
        );
        assert!(installer.prefix().share().join("args.txt").exists());
        assert_eq!(
            fs::read_to_string(installer.prefix().share().join("notes.txt")).unwrap(),
            "read me"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_place_directory_keeps_symlink_loop() {
        let fx = fixture();
        let tree = fx.source.path().join("data");
        fs::create_dir_all(tree.join("fonts")).unwrap();
        fs::write(tree.join("fonts/unicode.pf2"), "glyphs").unwrap();
        std::os::unix::fs::symlink(".", tree.join("fonts/self")).unwrap();

        let formula = formula(
            r#"
[[install]]
place = "data"
into = "share"
"#,
        );

        let mut installer = Installer::new(&fx.config);
        installer.install(&formula, fx.source.path()).unwrap();

        let placed = installer.prefix().share().join("data/fonts");
        assert_eq!(
            fs::read_to_string(placed.join("unicode.pf2")).unwrap(),
            "glyphs"
        );
        let link = fs::symlink_metadata(placed.join("self")).unwrap();
        assert!(link.file_type().is_symlink());
        assert_eq!(fs::read_link(placed.join("self")).unwrap(), Path::new("."));
    }

    #[test]
    fn test_missing_command_reports_127() {
        let fx = fixture();
        let formula = formula(
            r#"
[[install]]
cmd = "formulary-no-such-tool"
"#,
        );

        let mut installer = Installer::new(&fx.config);
        assert!(matches!(
            installer.install(&formula, fx.source.path()),
            Err(Error::InstallFailed {
                status: COMMAND_NOT_FOUND,
                ..
            })
        ));
    }

    #[test]
    fn test_step_timeout() {
        let mut fx = fixture();
        fx.config = fx.config.clone().with_step_timeout(Duration::from_millis(200));
        let formula = formula(
            r#"
[[install]]
cmd = "true"

[[install]]
cmd = "sleep"
args = ["5"]
"#,
        );

        let mut installer = Installer::new(&fx.config);
        match installer.install(&formula, fx.source.path()) {
            Err(Error::Timeout { step, limit }) => {
                assert_eq!(step, 1);
                assert_eq!(limit, Duration::from_millis(200));
            }
            other => panic!("expected Timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_run_tests_finds_installed_binary() {
        let fx = fixture();
        let formula = formula(
            r#"
[[install]]
cmd = "sh"
args = ["-c", "printf '#!/bin/sh\nexit 0\n' > %(bin)s/hello-shell && chmod +x %(bin)s/hello-shell"]

[[test]]
cmd = "hello-shell"
args = ["--version"]
"#,
        );

        let mut installer = Installer::new(&fx.config);
        installer.install(&formula, fx.source.path()).unwrap();
        installer.run_tests(&formula).unwrap();
    }

    #[test]
    fn test_failing_test_step() {
        let fx = fixture();
        let formula = formula(
            r#"
[[test]]
cmd = "true"

[[test]]
cmd = "sh"
args = ["-c", "echo broken; exit 4"]
"#,
        );

        let mut installer = Installer::new(&fx.config);
        let before = installer.current_dir().to_path_buf();
        match installer.run_tests(&formula) {
            Err(Error::TestFailed {
                step,
                status,
                output,
            }) => {
                assert_eq!(step, 1);
                assert_eq!(status, 4);
                assert_eq!(output, "broken");
            }
            other => panic!("expected TestFailed, got {:?}", other),
        }
        assert_eq!(installer.current_dir(), before);
    }

    #[test]
    fn test_substitution_leaves_unknown_keys() {
        let mut vars = Variables::default();
        vars.set("prefix", "/usr/local".to_string());
        assert_eq!(
            vars.substitute("--prefix=%(prefix)s %(unknown)s"),
            "--prefix=/usr/local %(unknown)s"
        );
        assert_eq!(vars.substitute("plain"), "plain");
        assert_eq!(vars.substitute("50%(prefix)s"), "50/usr/local");
        assert_eq!(vars.substitute("%(%(prefix)s"), "%(/usr/local");
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        // "a" sorts before "b" and "z" after it; neither value is expanded again
        let mut vars = Variables::default();
        vars.set("a", "%(b)s".to_string());
        vars.set("b", "x".to_string());
        vars.set("z", "%(b)s".to_string());

        assert_eq!(vars.substitute("%(a)s"), "%(b)s");
        assert_eq!(vars.substitute("%(z)s"), "%(b)s");
        assert_eq!(vars.substitute("%(a)s-%(b)s"), "%(b)s-x");
    }

    #[test]
    fn test_user_variables_cannot_shadow_builtins() {
        let config = Config::new()
            .with_prefix("/opt/x")
            .with_var("prefix", "/elsewhere")
            .with_var("target", "i386-elf");
        let prefix = Prefix::new("/opt/x");
        let formula = formula("");
        let vars = Variables::for_formula(&config, &prefix, &formula, Path::new("/src"));

        assert_eq!(vars.substitute("%(prefix)s"), "/opt/x");
        assert_eq!(vars.substitute("--target=%(target)s"), "--target=i386-elf");
    }
}
