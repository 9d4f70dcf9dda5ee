//! Supervises daemon launch sequencing and runtime orchestration.

use std::io::{self, Write};
use std::sync::Arc;

use camino::Utf8PathBuf;
use tracing::info;

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::client::{ClientError, Connector, TcpConnector};
use crate::dispatch::{CommandSpawner, DetachedSpawner};
use crate::health::{LifecycleReporter, StructuredLifecycleReporter};
use crate::listing::{write_listing, write_version};

use super::PROCESS_TARGET;
use super::daemonizer::{Daemonizer, SystemDaemonizer};
use super::errors::LaunchError;
use super::guard::PidFileGuard;
use super::shutdown::{ShutdownSignal, SignalListener, StopSignal};

/// How a successful launch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The version banner was printed; no connection was made.
    VersionPrinted,
    /// The service listing was printed; no connection was made.
    Listed,
    /// The client left the server after the given signal.
    Stopped(StopSignal),
}

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<L, D, S> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn LifecycleReporter>,
    pub(crate) daemonizer: D,
    pub(crate) shutdown: S,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) spawner: Arc<dyn CommandSpawner>,
}

/// Runs the daemon using the production collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap, the pid file, daemonisation, the
/// signal listener or the client loop fail.
pub fn run_daemon() -> Result<LaunchOutcome, LaunchError> {
    let plan = LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredLifecycleReporter::new()),
        daemonizer: SystemDaemonizer,
        shutdown: SignalListener,
        connector: Arc::new(TcpConnector::default()),
        spawner: Arc::new(DetachedSpawner),
    };
    run_daemon_with(plan, &mut io::stdout().lock())
}

/// Runs the daemon with injected collaborators, writing the version banner or
/// service listing to `listing`.
pub(crate) fn run_daemon_with<L, D, S>(
    plan: LaunchPlan<L, D, S>,
    listing: &mut dyn Write,
) -> Result<LaunchOutcome, LaunchError>
where
    L: ConfigLoader,
    D: Daemonizer,
    S: ShutdownSignal,
{
    let LaunchPlan {
        loader,
        reporter,
        daemonizer,
        shutdown,
        connector,
        spawner,
    } = plan;

    let daemon = bootstrap_with(&loader, reporter, spawner)?;
    let config = daemon.config();
    if config.print_version() {
        write_version(listing).map_err(|source| LaunchError::Output { source })?;
        return Ok(LaunchOutcome::VersionPrinted);
    }
    if config.list_services() {
        write_listing(listing, daemon.registry().list())
            .map_err(|source| LaunchError::Output { source })?;
        return Ok(LaunchOutcome::Listed);
    }

    let mut guard = if config.daemonize() || config.configured_pidfile().is_some() {
        Some(PidFileGuard::acquire(config.pidfile())?)
    } else {
        None
    };
    if config.daemonize() {
        let work_dir = guard
            .as_ref()
            .and_then(|guard| guard.path().parent())
            .map_or_else(|| Utf8PathBuf::from("/"), ToOwned::to_owned);
        daemonizer.daemonize(&work_dir)?;
    }
    if let Some(guard) = guard.as_mut() {
        guard.write_pid(std::process::id())?;
    }

    let endpoint = config.server_endpoint();
    info!(
        target: PROCESS_TARGET,
        server = %endpoint,
        services = daemon.registry().active().count(),
        "starting client"
    );
    let (client, handle) = daemon.into_client(connector);
    let worker = client.spawn(endpoint.clone())?;

    let stop = shutdown.wait();
    if let Ok(signal) = &stop {
        info!(
            target: PROCESS_TARGET,
            signal = %signal,
            server = %endpoint,
            "leaving server"
        );
    }
    handle.request_shutdown();
    let finished = worker.join().map_err(|_| ClientError::ThreadPanic)?;
    let signal = stop?;
    finished?;
    drop(guard);
    info!(
        target: PROCESS_TARGET,
        signal = %signal,
        "shutdown sequence completed"
    );
    Ok(LaunchOutcome::Stopped(signal))
}
