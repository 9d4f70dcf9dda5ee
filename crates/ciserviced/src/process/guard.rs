use std::fs::{self, OpenOptions};
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::{info, warn};

use super::PROCESS_TARGET;
use super::errors::LaunchError;

/// Owns the pid file for the lifetime of the daemon.
///
/// Acquiring refuses to start while the recorded process is alive and clears
/// stale files. The file is removed on drop once this guard has written it.
#[derive(Debug)]
pub(crate) struct PidFileGuard {
    path: Utf8PathBuf,
    pid: Option<u32>,
}

impl PidFileGuard {
    pub(crate) fn acquire(path: Utf8PathBuf) -> Result<Self, LaunchError> {
        if let Some(parent) = path.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| LaunchError::RuntimeDirectory {
                path: parent.to_owned(),
                source,
            })?;
        }
        if let Some(pid) = read_pid(&path) {
            if check_process(pid)? {
                info!(
                    target: PROCESS_TARGET,
                    pid,
                    file = %path,
                    "refusing to start: existing daemon alive"
                );
                return Err(LaunchError::AlreadyRunning { pid });
            }
            warn!(
                target: PROCESS_TARGET,
                pid,
                file = %path,
                "removing stale pid file"
            );
        }
        remove_file(&path)?;
        Ok(Self { path, pid: None })
    }

    pub(crate) fn write_pid(&mut self, pid: u32) -> Result<(), LaunchError> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        let pid_write = |source| LaunchError::PidWrite {
            path: self.path.clone(),
            source,
        };
        let mut file = options.open(&self.path).map_err(pid_write)?;
        writeln!(file, "{pid}").map_err(pid_write)?;
        file.sync_all().map_err(pid_write)?;
        self.pid = Some(pid);
        info!(
            target: PROCESS_TARGET,
            pid,
            file = %self.path,
            "pid file written"
        );
        Ok(())
    }

    pub(crate) fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        if self.pid.is_none() {
            return;
        }
        match fs::remove_file(&self.path) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => {
                warn!(
                    target: PROCESS_TARGET,
                    file = %self.path,
                    error = %error,
                    "failed to remove pid file"
                );
            }
            _ => {}
        }
    }
}

fn read_pid(path: &Utf8Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse::<u32>().ok().filter(|pid| *pid != 0)
}

fn remove_file(path: &Utf8Path) -> Result<(), LaunchError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LaunchError::Cleanup {
            path: path.to_owned(),
            source,
        }),
    }
}

fn check_process(pid: u32) -> Result<bool, LaunchError> {
    let Ok(raw) = i32::try_from(pid) else {
        return Ok(false);
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(errno) => Err(LaunchError::CheckProcess { pid, source: errno }),
    }
}
