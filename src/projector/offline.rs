// src/projector/offline.rs

//! A controller stand-in for running the bench without hardware.

use super::{Projector, Summary};
use crate::config::ProjectorConfig;
use anyhow::Result;

#[derive(Debug)]
pub struct OfflineProjector {
    lock_opcode: u8,
    commands_sent: u64,
}

impl OfflineProjector {
    pub fn new(config: &ProjectorConfig) -> Self {
        log::info!("OfflineProjector: no controller attached, commands are logged only");
        OfflineProjector {
            lock_opcode: config.mirror_lock_opcode,
            commands_sent: 0,
        }
    }

    fn record(&mut self, what: &str) -> Summary {
        self.commands_sent += 1;
        log::info!(
            "OfflineProjector: {} (cmd {:#04x}, #{})",
            what,
            self.lock_opcode,
            self.commands_sent
        );
        Summary::new(format!("offline: {}", what))
    }
}

impl Projector for OfflineProjector {
    fn lock_mirrors(&mut self) -> Result<Summary> {
        Ok(self.record("mirrors locked"))
    }

    fn unlock_mirrors(&mut self) -> Result<Summary> {
        Ok(self.record("mirrors unlocked"))
    }
}
