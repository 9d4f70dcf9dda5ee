use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

/// Host contacted when neither the file, environment, nor CLI name one.
pub const DEFAULT_HOST: &str = "localhost";

/// Port the call-information server listens on by default.
pub const DEFAULT_PORT: u16 = 63690;

/// Seconds between reconnect attempts after the connection drops.
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 10;

/// Largest payload, in bytes, accepted from the server before a frame is
/// discarded.
pub const DEFAULT_MAX_PAYLOAD_LEN: u32 = 64 * 1024;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// File name used for the pid file inside the runtime directory.
pub const PIDFILE_NAME: &str = "ciserviced.pid";

/// Default log filter expression used by the daemon.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the daemon.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Computes the pid file location used when daemonising without an explicit
/// `pidfile` setting.
#[must_use]
pub fn default_pidfile() -> Utf8PathBuf {
    let mut base = runtime_base_directory();
    base.push("ciservice");
    base.join(PIDFILE_NAME)
}

#[cfg(unix)]
fn runtime_base_directory() -> Utf8PathBuf {
    match runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok()) {
        Some(dir) => dir,
        None => {
            let mut dir = fallback_base_directory();
            dir.push(user_namespace());
            dir
        }
    }
}

#[cfg(not(unix))]
fn runtime_base_directory() -> Utf8PathBuf {
    fallback_base_directory()
}

fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}
