// src/projector/mock.rs

use super::{Projector, Summary};
use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectorCall {
    Lock,
    Unlock,
}

/// Records every call. Clones share the same log, so a test can keep one
/// handle while the dispatcher owns another.
#[derive(Debug, Clone, Default)]
pub struct MockProjector {
    calls: Arc<Mutex<Vec<ProjectorCall>>>,
    fail: bool,
}

impl MockProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A projector whose every call fails after being recorded.
    pub fn failing() -> Self {
        MockProjector {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ProjectorCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&mut self, call: ProjectorCall) -> Result<Summary> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if self.fail {
            return Err(anyhow!("mock bus error on {:?}", call));
        }
        Ok(Summary::new(format!("mock {:?}", call)))
    }
}

impl Projector for MockProjector {
    fn lock_mirrors(&mut self) -> Result<Summary> {
        self.record(ProjectorCall::Lock)
    }

    fn unlock_mirrors(&mut self) -> Result<Summary> {
        self.record(ProjectorCall::Unlock)
    }
}
