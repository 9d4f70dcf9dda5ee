//! Checks that invalid configuration is rejected at load time.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use ciservice_config::Config;

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct EnvOverride {
    key: &'static str,
    previous: Option<OsString>,
    guard: Option<MutexGuard<'static, ()>>,
}

impl EnvOverride {
    fn set_var(key: &'static str, value: &OsStr) -> Self {
        let guard = ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let previous = std::env::var_os(key);
        unsafe { std::env::set_var(key, value) };
        Self {
            key,
            previous,
            guard: Some(guard),
        }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => unsafe { std::env::set_var(self.key, value) },
            None => unsafe { std::env::remove_var(self.key) },
        }
        drop(self.guard.take());
    }
}

#[test]
fn malformed_configs_return_aggregated_error() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let cli_path = temp_dir.path().join("cli_ciservice.toml");
    let env_path = temp_dir.path().join("env_ciservice.toml");

    fs::write(&cli_path, r#"host = "pbx.local" port = 4000"#).expect("write malformed cli config");
    fs::write(&env_path, "port = not_a_number").expect("write malformed env config");

    let _env = EnvOverride::set_var("CISERVICE_CONFIG_PATH", env_path.as_os_str());

    let args = vec![
        OsString::from("ciserviced"),
        OsString::from("--config-path"),
        cli_path.clone().into_os_string(),
    ];

    let error = Config::load_from_iter(args).expect_err("loading must fail");
    let message = error.to_string();
    assert!(
        message.contains("multiple configuration errors"),
        "expected aggregate message, got {message:?}"
    );

    match error.as_ref() {
        OrthoError::Aggregate(aggregate) => {
            let mut mentioned_paths = aggregate
                .iter()
                .filter_map(|err| match err {
                    OrthoError::File { path, .. } => Some(path.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>();
            mentioned_paths.sort();
            let mut expected = vec![cli_path.clone(), env_path.clone()];
            expected.sort();

            assert_eq!(
                mentioned_paths, expected,
                "each malformed file should be reported exactly once"
            );
        }
        other => panic!("expected aggregated error, got {other:?}"),
    }
}

#[test]
fn service_without_command_is_rejected() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let path = temp_dir.path().join("ciservice.toml");
    fs::write(&path, "[[services]]\nname = \"popup\"\n").expect("write config");

    let args = vec![
        OsString::from("ciserviced"),
        OsString::from("--config-path"),
        path.into_os_string(),
    ];

    let _guard = ENV_MUTEX
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    assert!(Config::load_from_iter(args).is_err());
}
