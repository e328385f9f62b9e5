// src/projector/mod.rs

//! The projector controller seam.
//!
//! The bench only ever asks the controller to lock or unlock the mirror
//! array. Each call returns an opaque [`Summary`] that is logged and shown to
//! the operator but never interpreted.

pub mod i2c;
pub mod offline;

#[cfg(test)]
pub mod mock;

use crate::config::{ProjectorBackend, ProjectorConfig};
use anyhow::Result;
use std::fmt;

/// Human-readable outcome of a controller command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary(String);

impl Summary {
    pub fn new(text: impl Into<String>) -> Self {
        Summary(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mirror-lock control on the projector's display controller.
pub trait Projector: Send {
    /// Freezes the mirror array ("DMD interface lock").
    fn lock_mirrors(&mut self) -> Result<Summary>;

    /// Releases the mirror array.
    fn unlock_mirrors(&mut self) -> Result<Summary>;
}

/// Opens the backend selected in `config`.
pub fn open(config: &ProjectorConfig) -> Result<Box<dyn Projector>> {
    match config.backend {
        ProjectorBackend::I2c => Ok(Box::new(i2c::I2cProjector::open(config)?)),
        ProjectorBackend::Offline => Ok(Box::new(offline::OfflineProjector::new(config))),
    }
}
