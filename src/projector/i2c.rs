// src/projector/i2c.rs

//! Controller access over Linux i2c-dev.

use super::{Projector, Summary};
use crate::config::ProjectorConfig;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// `I2C_SLAVE` from `<linux/i2c-dev.h>`.
const I2C_SLAVE: libc::c_ulong = 0x0703;

nix::ioctl_write_int_bad!(i2c_set_slave_address, I2C_SLAVE);

#[derive(Debug)]
pub struct I2cProjector {
    bus: File,
    bus_path: PathBuf,
    address: u16,
    command_delay: Duration,
    lock_opcode: u8,
    lock_param: u8,
    unlock_param: u8,
}

impl I2cProjector {
    pub fn open(config: &ProjectorConfig) -> Result<Self> {
        let bus = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.bus)
            .with_context(|| format!("Failed to open I2C bus {}", config.bus.display()))?;

        // SAFETY: `bus` is an open i2c-dev descriptor and I2C_SLAVE takes the
        // address by value.
        unsafe { i2c_set_slave_address(bus.as_raw_fd(), libc::c_int::from(config.address)) }
            .with_context(|| {
                format!(
                    "ioctl(I2C_SLAVE, {:#04x}) failed on {}",
                    config.address,
                    config.bus.display()
                )
            })?;

        log::info!(
            "I2cProjector: controller {:#04x} on {}",
            config.address,
            config.bus.display()
        );
        Ok(I2cProjector {
            bus,
            bus_path: config.bus.clone(),
            address: config.address,
            command_delay: config.command_delay(),
            lock_opcode: config.mirror_lock_opcode,
            lock_param: config.mirror_lock_param,
            unlock_param: config.mirror_unlock_param,
        })
    }

    fn write_command(&mut self, opcode: u8, param: u8) -> Result<Summary> {
        if !self.command_delay.is_zero() {
            thread::sleep(self.command_delay);
        }
        let packet = [opcode, param];
        self.bus.write_all(&packet).with_context(|| {
            format!(
                "I2C write {:02x?} to {:#04x} on {} failed",
                packet,
                self.address,
                self.bus_path.display()
            )
        })?;
        log::trace!("I2cProjector: wrote {:02x?}", packet);
        Ok(Summary::new(format!(
            "cmd {:#04x} param {:#04x} -> {:#04x}",
            opcode, param, self.address
        )))
    }
}

impl Projector for I2cProjector {
    fn lock_mirrors(&mut self) -> Result<Summary> {
        self.write_command(self.lock_opcode, self.lock_param)
    }

    fn unlock_mirrors(&mut self) -> Result<Summary> {
        self.write_command(self.lock_opcode, self.unlock_param)
    }
}
