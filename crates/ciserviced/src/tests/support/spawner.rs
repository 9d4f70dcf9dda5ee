//! Spawner and message-handler doubles recording what would have run.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use cinet::RingStage;

use crate::dispatch::{CommandSpawner, SpawnError};
use crate::protocol::MessageHandler;

/// Records every argv instead of starting processes.
#[derive(Debug, Default)]
pub struct RecordingSpawner {
    launched: Mutex<Vec<Vec<String>>>,
}

impl RecordingSpawner {
    pub fn launched(&self) -> Vec<Vec<String>> {
        self.launched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Polls until at least `count` commands were recorded or ten seconds
    /// pass.
    pub fn wait_for(&self, count: usize) -> Vec<Vec<String>> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let launched = self.launched();
            if launched.len() >= count || Instant::now() >= deadline {
                return launched;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl CommandSpawner for RecordingSpawner {
    fn spawn(&self, argv: &[String]) -> Result<(), SpawnError> {
        self.launched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(argv.to_vec());
        Ok(())
    }
}

/// Message handler keeping every ring stage it is given.
#[derive(Debug, Clone, Default)]
pub struct StageRecorder {
    stages: Arc<Mutex<Vec<RingStage>>>,
}

impl StageRecorder {
    pub fn stages(&self) -> Vec<RingStage> {
        self.stages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MessageHandler for StageRecorder {
    fn ring_event(&mut self, stage: &RingStage) {
        self.stages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stage.clone());
    }
}

/// Builds an argv from string literals.
pub fn argv(words: &[&str]) -> Vec<String> {
    words.iter().map(|word| (*word).to_owned()).collect()
}
