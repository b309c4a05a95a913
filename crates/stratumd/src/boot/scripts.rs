//! Boot scripts: the shared `<stage>.d` directories and each module's
//! `<stage>.sh`.
//!
//! Post-fs-data scripts block the stage, each for at most the configured
//! timeout; a script still running after that keeps running unattended.
//! Service scripts are started and left to run.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use strum::Display;
use tracing::{debug, info, warn};

use super::BOOT_TARGET;
use crate::modules::Module;

/// Interpreter used for every boot script.
pub const SYSTEM_SHELL: &str = "/system/bin/sh";

const WAIT_POLL: Duration = Duration::from_millis(50);

/// Script phase of the boot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ScriptStage {
    /// Runs before modules are mounted; blocks the stage.
    PostFsData,
    /// Runs at late start; never waited for.
    Service,
}

impl ScriptStage {
    const fn blocking(self) -> bool {
        matches!(self, Self::PostFsData)
    }
}

/// One script to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// Script file.
    pub path: Utf8PathBuf,
    /// Working directory of the script.
    pub dir: Utf8PathBuf,
    /// Owning module, for module scripts.
    pub module: Option<String>,
}

/// Launches boot scripts.
pub trait ScriptRunner: Send + Sync {
    /// Starts `script`. With `wait`, returns once it exits or the duration
    /// passes, whichever comes first.
    fn run(&self, script: &Script, wait: Option<Duration>) -> io::Result<()>;
}

/// Runs scripts through a shell interpreter.
#[derive(Debug, Clone)]
pub struct ShellScripts {
    shell: Utf8PathBuf,
}

impl ShellScripts {
    /// Runner using `shell` as the interpreter.
    #[must_use]
    pub fn new(shell: impl Into<Utf8PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellScripts {
    fn default() -> Self {
        Self::new(SYSTEM_SHELL)
    }
}

impl ScriptRunner for ShellScripts {
    fn run(&self, script: &Script, wait: Option<Duration>) -> io::Result<()> {
        let child = Command::new(self.shell.as_std_path())
            .arg(script.path.as_std_path())
            .current_dir(script.dir.as_std_path())
            .env("ASH_STANDALONE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        match wait {
            Some(timeout) => wait_with_timeout(child, timeout, &script.path),
            None => {
                reap_in_background(child);
                Ok(())
            }
        }
    }
}

fn wait_with_timeout(mut child: Child, timeout: Duration, path: &Utf8Path) -> io::Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            debug!(target: BOOT_TARGET, script = %path, %status, "boot script finished");
            return Ok(());
        }
        if Instant::now() >= deadline {
            warn!(
                target: BOOT_TARGET,
                script = %path,
                timeout_secs = timeout.as_secs(),
                "boot script still running; continuing without it"
            );
            reap_in_background(child);
            return Ok(());
        }
        thread::sleep(WAIT_POLL);
    }
}

fn reap_in_background(mut child: Child) {
    let spawned = thread::Builder::new()
        .name("stratumd-script".to_owned())
        .spawn(move || child.wait());
    if let Err(error) = spawned {
        warn!(target: BOOT_TARGET, error = %error, "boot script will not be reaped");
    }
}

/// Finds and runs the scripts of a stage.
#[derive(Clone)]
pub struct BootScripts {
    dir: Utf8PathBuf,
    timeout: Duration,
    runner: Arc<dyn ScriptRunner>,
}

impl BootScripts {
    /// Scripts under `dir`, waited on for at most `timeout` when blocking.
    #[must_use]
    pub fn new(
        dir: impl Into<Utf8PathBuf>,
        timeout: Duration,
        runner: Arc<dyn ScriptRunner>,
    ) -> Self {
        Self {
            dir: dir.into(),
            timeout,
            runner,
        }
    }

    /// Executable files of `<dir>/<stage>.d`, by name.
    #[must_use]
    pub fn common(&self, stage: ScriptStage) -> Vec<Script> {
        let stage_dir = self.dir.join(format!("{stage}.d"));
        let Ok(entries) = stage_dir.read_dir_utf8() else {
            return Vec::new();
        };
        let mut paths: Vec<Utf8PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|entry| is_executable_file(entry.path()))
            .map(|entry| entry.path().to_path_buf())
            .collect();
        paths.sort();
        paths
            .into_iter()
            .map(|path| Script {
                path,
                dir: stage_dir.clone(),
                module: None,
            })
            .collect()
    }

    /// `<stage>.sh` of every enabled module that ships one, in module order.
    #[must_use]
    pub fn modules(stage: ScriptStage, modules: &[Module]) -> Vec<Script> {
        modules
            .iter()
            .filter(|module| module.enabled)
            .filter_map(|module| {
                let path = module.entry(&format!("{stage}.sh"));
                path.is_file().then(|| Script {
                    path,
                    dir: module.root.clone(),
                    module: Some(module.name.clone()),
                })
            })
            .collect()
    }

    /// Runs the shared scripts of `stage`, then those of `modules`.
    pub fn run_stage(&self, stage: ScriptStage, modules: &[Module]) {
        let wait = stage.blocking().then_some(self.timeout);
        let scripts: Vec<Script> = self
            .common(stage)
            .into_iter()
            .chain(Self::modules(stage, modules))
            .collect();
        for script in &scripts {
            debug!(
                target: BOOT_TARGET,
                %stage,
                script = %script.path,
                module = script.module.as_deref().unwrap_or("-"),
                "running boot script"
            );
            if let Err(error) = self.runner.run(script, wait) {
                warn!(
                    target: BOOT_TARGET,
                    %stage,
                    script = %script.path,
                    error = %error,
                    "boot script could not be started"
                );
            }
        }
        info!(target: BOOT_TARGET, %stage, count = scripts.len(), "boot scripts started");
    }
}

impl std::fmt::Debug for BootScripts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootScripts")
            .field("dir", &self.dir)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn is_executable_file(path: &Utf8Path) -> bool {
    fs::metadata(path)
        .is_ok_and(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
}


#[cfg(test)]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::time::{Duration, Instant};

    use camino::Utf8PathBuf;
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir")
    }

    fn write_script(path: &Utf8Path, body: &str, mode: u32) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("script dir");
        }
        fs::write(path, body).expect("write script");
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).expect("chmod");
    }

    #[rstest]
    fn common_scripts_are_executable_files_in_name_order() {
        let dir = TempDir::new().expect("temp dir");
        let root = utf8_dir(&dir);
        write_script(&root.join("post-fs-data.d/20-b.sh"), "true", 0o755);
        write_script(&root.join("post-fs-data.d/10-a.sh"), "true", 0o700);
        write_script(&root.join("post-fs-data.d/readme"), "", 0o644);
        fs::create_dir_all(root.join("post-fs-data.d/nested.d")).expect("nested dir");

        let scripts = BootScripts::new(
            root.clone(),
            Duration::from_secs(1),
            Arc::new(ShellScripts::default()),
        );
        let found: Vec<String> = scripts
            .common(ScriptStage::PostFsData)
            .into_iter()
            .map(|script| script.path.file_name().unwrap_or_default().to_owned())
            .collect();
        assert_eq!(found, ["10-a.sh", "20-b.sh"]);
        assert!(scripts.common(ScriptStage::Service).is_empty());
    }

    #[rstest]
    fn shell_runs_the_script_in_its_directory() {
        let dir = TempDir::new().expect("temp dir");
        let root = utf8_dir(&dir);
        let path = root.join("service.sh");
        write_script(&path, "echo ran > marker\n", 0o644);

        ShellScripts::new("/bin/sh")
            .run(
                &Script {
                    path,
                    dir: root.clone(),
                    module: None,
                },
                Some(Duration::from_secs(10)),
            )
            .expect("run script");

        assert_eq!(
            fs::read_to_string(root.join("marker")).expect("marker"),
            "ran\n"
        );
    }

    #[rstest]
    fn a_stuck_script_does_not_hold_the_stage() {
        let dir = TempDir::new().expect("temp dir");
        let root = utf8_dir(&dir);
        let path = root.join("post-fs-data.sh");
        write_script(&path, "sleep 5\n", 0o644);

        let started = Instant::now();
        ShellScripts::new("/bin/sh")
            .run(
                &Script {
                    path,
                    dir: root,
                    module: None,
                },
                Some(Duration::from_millis(100)),
            )
            .expect("run script");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[rstest]
    fn missing_interpreter_is_reported() {
        let dir = TempDir::new().expect("temp dir");
        let root = utf8_dir(&dir);
        let error = ShellScripts::new(root.join("no-shell"))
            .run(
                &Script {
                    path: root.join("x.sh"),
                    dir: root,
                    module: None,
                },
                None,
            )
            .expect_err("spawn must fail");
        assert_eq!(error.kind(), io::ErrorKind::NotFound);
    }
}
