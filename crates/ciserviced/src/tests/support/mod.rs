//! Shared doubles for the daemon test suites.

mod config_loader;
mod connector;
mod reporter;
mod spawner;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use connector::{FakeConnector, FakePeer, SocketLedger};
pub use reporter::{LifecycleEvent, RecordingLifecycleReporter};
pub use spawner::{RecordingSpawner, StageRecorder, argv};
