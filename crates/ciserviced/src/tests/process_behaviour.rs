//! Behavioural tests covering daemon launch, pid file and shutdown.

use std::cell::RefCell;
use std::fs;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use ciservice_config::ServiceEntry;
use cinet::Message;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use crate::process::LaunchError;
use crate::process::daemonizer::{DaemonizeError, Daemonizer};
use crate::process::launch::{LaunchOutcome, LaunchPlan, run_daemon_with};
use crate::process::shutdown::{ShutdownError, ShutdownSignal, StopSignal};

use super::support::{
    FakeConnector, LifecycleEvent, RecordingLifecycleReporter, RecordingSpawner, TestConfigLoader,
};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Thread-portable summary of a daemon run.
#[derive(Debug, PartialEq, Eq)]
enum RunSummary {
    VersionPrinted(String),
    Listed(String),
    Stopped(StopSignal),
    AlreadyRunning(u32),
    Failed(String),
}

impl RunSummary {
    fn from_result(result: Result<LaunchOutcome, LaunchError>, output: &[u8]) -> Self {
        let printed = || String::from_utf8_lossy(output).into_owned();
        match result {
            Ok(LaunchOutcome::VersionPrinted) => Self::VersionPrinted(printed()),
            Ok(LaunchOutcome::Listed) => Self::Listed(printed()),
            Ok(LaunchOutcome::Stopped(signal)) => Self::Stopped(signal),
            Err(LaunchError::AlreadyRunning { pid }) => Self::AlreadyRunning(pid),
            Err(error) => Self::Failed(error.to_string()),
        }
    }
}

#[derive(Clone, Default)]
struct TestDaemonizer {
    calls: Arc<Mutex<Vec<Utf8PathBuf>>>,
}

impl TestDaemonizer {
    fn calls(&self) -> Vec<Utf8PathBuf> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Daemonizer for TestDaemonizer {
    fn daemonize(&self, work_dir: &Utf8Path) -> Result<(), DaemonizeError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(work_dir.to_owned());
        Ok(())
    }
}

#[derive(Clone, Default)]
struct TestShutdownSignal {
    state: Arc<(Mutex<Option<StopSignal>>, Condvar)>,
}

impl TestShutdownSignal {
    fn deliver(&self, signal: StopSignal) {
        let (lock, condvar) = &*self.state;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = Some(signal);
        condvar.notify_all();
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn wait(&self) -> Result<StopSignal, ShutdownError> {
        let (lock, condvar) = &*self.state;
        let mut delivered = lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(signal) = *delivered {
                return Ok(signal);
            }
            delivered = condvar
                .wait(delivered)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

fn stop_signal(name: &str) -> Result<StopSignal, String> {
    StopSignal::from_name(name).ok_or_else(|| format!("{name} is not a stop signal"))
}

struct ProcessWorld {
    runtime: TempDir,
    loader: TestConfigLoader,
    reporter: Arc<RecordingLifecycleReporter>,
    connector: Arc<FakeConnector>,
    daemonizer: TestDaemonizer,
    shutdown: TestShutdownSignal,
    running: Option<thread::JoinHandle<RunSummary>>,
    result: Option<RunSummary>,
}

impl ProcessWorld {
    fn new() -> Self {
        Self {
            runtime: TempDir::new().expect("create runtime directory"),
            loader: TestConfigLoader::default(),
            reporter: Arc::new(RecordingLifecycleReporter::default()),
            connector: Arc::new(FakeConnector::default()),
            daemonizer: TestDaemonizer::default(),
            shutdown: TestShutdownSignal::default(),
            running: None,
            result: None,
        }
    }

    fn pid_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.runtime.path().join("run").join("ciserviced.pid"))
            .expect("temporary path is UTF-8")
    }

    fn start(&mut self) -> Result<(), String> {
        if self.running.is_some() {
            return Err("daemon already running".to_owned());
        }
        let plan = LaunchPlan {
            loader: self.loader.clone(),
            reporter: self.reporter.clone(),
            daemonizer: self.daemonizer.clone(),
            shutdown: self.shutdown.clone(),
            connector: self.connector.clone(),
            spawner: Arc::new(RecordingSpawner::default()),
        };
        self.running = Some(thread::spawn(move || {
            let mut output = Vec::new();
            let result = run_daemon_with(plan, &mut output);
            RunSummary::from_result(result, &output)
        }));
        Ok(())
    }

    fn finish(&mut self) -> Result<(), String> {
        let handle = self
            .running
            .take()
            .ok_or_else(|| "daemon not running".to_owned())?;
        let result = handle
            .join()
            .map_err(|_| "daemon thread panicked".to_owned())?;
        self.result = Some(result);
        Ok(())
    }

    fn wait_for(&self, what: &str, condition: impl Fn(&Self) -> bool) -> Result<(), String> {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while !condition(self) {
            if Instant::now() >= deadline {
                return Err(format!("timed out waiting for {what}"));
            }
            thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }
}

#[fixture]
fn world() -> RefCell<ProcessWorld> {
    RefCell::new(ProcessWorld::new())
}

#[given("the daemon is configured with service \"{name}\" running \"{command}\"")]
fn given_service(world: &RefCell<ProcessWorld>, name: String, command: String) {
    let mut world = world.borrow_mut();
    let loader = std::mem::take(&mut world.loader);
    world.loader = loader.with_service(ServiceEntry::new(name, command));
}

#[given("the service listing is requested")]
fn given_listing(world: &RefCell<ProcessWorld>) {
    world.borrow_mut().loader.config_mut().list = true;
}

#[given("the version banner is requested")]
fn given_version(world: &RefCell<ProcessWorld>) {
    world.borrow_mut().loader.config_mut().print_version = true;
}

#[given("a pid file in the runtime directory")]
fn given_pidfile(world: &RefCell<ProcessWorld>) {
    let mut world = world.borrow_mut();
    let path = world.pid_path();
    world.loader.config_mut().pidfile = Some(path);
}

#[given("daemonisation is enabled")]
fn given_daemonize(world: &RefCell<ProcessWorld>) {
    world.borrow_mut().loader.config_mut().daemonize = true;
}

#[given("the pid file names a running process")]
fn given_live_pidfile(world: &RefCell<ProcessWorld>) -> Result<(), String> {
    let world = world.borrow();
    let path = world.pid_path();
    let parent = path
        .parent()
        .ok_or_else(|| "pid path has no parent".to_owned())?;
    fs::create_dir_all(parent).map_err(|error| error.to_string())?;
    fs::write(&path, format!("{}\n", std::process::id())).map_err(|error| error.to_string())
}

#[when("the daemon starts")]
fn when_daemon_starts(world: &RefCell<ProcessWorld>) -> Result<(), String> {
    world.borrow_mut().start()
}

#[when("the daemon connects")]
fn when_daemon_connects(world: &RefCell<ProcessWorld>) -> Result<(), String> {
    world.borrow().wait_for("connection", |world| {
        world.reporter.count(&LifecycleEvent::Connected) == 1
    })
}

#[when("the daemon receives \"{signal}\"")]
fn when_signal_delivered(world: &RefCell<ProcessWorld>, signal: String) -> Result<(), String> {
    world.borrow().shutdown.deliver(stop_signal(&signal)?);
    Ok(())
}

#[when("the daemon run completes")]
fn when_daemon_completes(world: &RefCell<ProcessWorld>) -> Result<(), String> {
    world.borrow_mut().finish()
}

#[then("the daemon listed \"{expected}\"")]
fn then_listed(world: &RefCell<ProcessWorld>, expected: String) -> Result<(), String> {
    match world.borrow().result.as_ref() {
        Some(RunSummary::Listed(text)) if text.trim_end() == expected => Ok(()),
        other => Err(format!("expected listing {expected:?}, got {other:?}")),
    }
}

#[then("the daemon printed its version banner")]
fn then_version_printed(world: &RefCell<ProcessWorld>) -> Result<(), String> {
    let expected = format!("ciserviced - {}", env!("CARGO_PKG_VERSION"));
    match world.borrow().result.as_ref() {
        Some(RunSummary::VersionPrinted(text)) if text.trim_end() == expected => Ok(()),
        other => Err(format!("expected banner {expected:?}, got {other:?}")),
    }
}

#[then("the daemon stopped on \"{signal}\"")]
fn then_stopped(world: &RefCell<ProcessWorld>, signal: String) -> Result<(), String> {
    let expected = stop_signal(&signal)?;
    match world.borrow().result.as_ref() {
        Some(RunSummary::Stopped(received)) if *received == expected => Ok(()),
        other => Err(format!("expected a stop on {expected}, got {other:?}")),
    }
}

#[then("the daemon refused to start")]
fn then_refused(world: &RefCell<ProcessWorld>) -> Result<(), String> {
    match world.borrow().result.as_ref() {
        Some(RunSummary::AlreadyRunning(pid)) if *pid == std::process::id() => Ok(()),
        other => Err(format!("expected an already-running error, got {other:?}")),
    }
}

#[then("the pid file records this process")]
fn then_pidfile_written(world: &RefCell<ProcessWorld>) -> Result<(), String> {
    let world = world.borrow();
    let path = world.pid_path();
    world.wait_for("pid file", |world| world.pid_path().exists())?;
    let content = fs::read_to_string(&path).map_err(|error| error.to_string())?;
    if content.trim() == std::process::id().to_string() {
        Ok(())
    } else {
        Err(format!("pid file holds {content:?}"))
    }
}

#[then("the pid file is removed")]
fn then_pidfile_removed(world: &RefCell<ProcessWorld>) -> Result<(), String> {
    if world.borrow().pid_path().exists() {
        Err("pid file still exists".to_owned())
    } else {
        Ok(())
    }
}

#[then("the pid file is kept")]
fn then_pidfile_kept(world: &RefCell<ProcessWorld>) -> Result<(), String> {
    if world.borrow().pid_path().exists() {
        Ok(())
    } else {
        Err("pid file was removed".to_owned())
    }
}

#[then("daemonisation was requested in the runtime directory")]
fn then_daemonised(world: &RefCell<ProcessWorld>) -> Result<(), String> {
    let world = world.borrow();
    let calls = world.daemonizer.calls();
    let expected = world
        .pid_path()
        .parent()
        .map(ToOwned::to_owned)
        .ok_or_else(|| "pid path has no parent".to_owned())?;
    if calls == [expected.clone()] {
        Ok(())
    } else {
        Err(format!("expected one daemonisation in {expected}, got {calls:?}"))
    }
}

#[then("daemonisation was not requested")]
fn then_not_daemonised(world: &RefCell<ProcessWorld>) -> Result<(), String> {
    let calls = world.borrow().daemonizer.calls();
    if calls.is_empty() {
        Ok(())
    } else {
        Err(format!("unexpected daemonisation: {calls:?}"))
    }
}

#[then("the server was told the daemon is leaving")]
fn then_leave_sent(world: &RefCell<ProcessWorld>) -> Result<(), String> {
    let received = world.borrow().connector.last_peer().received();
    if received.last() == Some(&Message::Leave) {
        Ok(())
    } else {
        Err(format!("no leave notice in {received:?}"))
    }
}

#[then("no connection was attempted")]
fn then_no_connection(world: &RefCell<ProcessWorld>) -> Result<(), String> {
    let attempts = world.borrow().connector.attempts();
    if attempts == 0 {
        Ok(())
    } else {
        Err(format!("{attempts} connection attempts were made"))
    }
}

#[scenario(
    path = "tests/features/process_lifecycle.feature",
    name = "Printing the version exits without connecting"
)]
fn printing_the_version_exits_without_connecting(world: RefCell<ProcessWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/process_lifecycle.feature",
    name = "Listing services exits without connecting"
)]
fn listing_services_exits_without_connecting(world: RefCell<ProcessWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/process_lifecycle.feature",
    name = "Foreground run writes and removes its pid file"
)]
fn foreground_run_writes_and_removes_its_pid_file(world: RefCell<ProcessWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/process_lifecycle.feature",
    name = "Daemonising detaches into the pid file directory"
)]
fn daemonising_detaches_into_the_pid_file_directory(world: RefCell<ProcessWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/process_lifecycle.feature",
    name = "A live pid file prevents a second daemon"
)]
fn a_live_pid_file_prevents_a_second_daemon(world: RefCell<ProcessWorld>) {
    drop(world);
}
