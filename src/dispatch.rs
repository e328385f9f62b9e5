// src/dispatch.rs

//! Command dispatch: one key in, session or projector changes out.
//!
//! Keys resolve to a closed [`Token`] set. Each token carries static
//! [`CommandTraits`]; while the mirrors are locked only tokens marked
//! `ALLOWED_WHILE_LOCKED` run, so nothing can change the pattern under a
//! frozen DMD. Output meant for the operator is returned as reply lines
//! rather than printed.

use crate::color::Intensity;
use crate::config::ControlConfig;
use crate::keys::Token;
use crate::projector::{Projector, Summary};
use crate::session::{Edge, PatternFamily, Session};
use anyhow::{Context, Result};
use bitflags::bitflags;
use log::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

bitflags! {
    /// Static properties of a command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CommandTraits: u8 {
        /// Runs even while the mirrors are locked.
        const ALLOWED_WHILE_LOCKED = 1 << 0;
        /// Talks to the projector controller.
        const HARDWARE = 1 << 1;
        /// Changes what the streamer renders.
        const PATTERN = 1 << 2;
    }
}

impl Token {
    pub fn traits(self) -> CommandTraits {
        use CommandTraits as T;
        match self {
            Token::Up | Token::Down | Token::Left | Token::Right => T::PATTERN,
            Token::Edge(_) => T::PATTERN | T::HARDWARE,
            Token::Ramp | Token::Knife | Token::Pyramid | Token::Flat => T::PATTERN,
            Token::CycleStep => T::empty(),
            Token::CycleWidth
            | Token::IntensityDown
            | Token::IntensityUp
            | Token::ToggleCorrection => T::PATTERN,
            Token::Lock | Token::Unlock | Token::RetryLock => {
                T::ALLOWED_WHILE_LOCKED | T::HARDWARE
            }
            Token::PrintOffset | Token::Menu | Token::Quit => T::ALLOWED_WHILE_LOCKED,
        }
    }
}

const MENU: &[(&str, &str)] = &[
    ("e", "Ramp edge mode"),
    ("k", "Sequential knife edge mode"),
    ("p", "Sequential pyramid mode"),
    ("f", "Flat field mode"),
    ("1", "Edge / quadrant 1"),
    ("2", "Edge / quadrant 2"),
    ("3", "Edge / quadrant 3"),
    ("4", "Edge / quadrant 4"),
    ("s", "Change step size"),
    ("w", "Change ramp width"),
    ("[", "Flat intensity down"),
    ("]", "Flat intensity up"),
    ("g", "Toggle perceptual correction"),
    ("right", "Move right"),
    ("left", "Move left"),
    ("up", "Move up"),
    ("down", "Move down"),
    ("o", "Print offset"),
    ("l", "Lock mirrors"),
    ("r", "Retry lock"),
    ("u", "Unlock mirrors"),
    ("m", "Display menu"),
    ("q", "Quit"),
];

const RULE: &str = "----------------------------------";

/// The menu, one line per entry.
pub fn menu_lines() -> Vec<String> {
    let mut lines = vec![
        RULE.to_string(),
        format!("{:^34}", "MENU"),
        RULE.to_string(),
    ];
    lines.extend(MENU.iter().map(|(key, help)| format!(" {:<6} {}", key, help)));
    lines.push(RULE.to_string());
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Shutdown,
}

/// What the console should do after a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: Status,
    pub lines: Vec<String>,
}

impl Reply {
    fn running(lines: Vec<String>) -> Self {
        Reply {
            status: Status::Running,
            lines,
        }
    }

    fn line(text: impl Into<String>) -> Self {
        Self::running(vec![text.into()])
    }
}

/// Owns the projector and applies commands to the shared session.
pub struct Dispatcher {
    session: Arc<Session>,
    projector: Box<dyn Projector>,
    step_cycle: Vec<u32>,
    width_cycle: Vec<u32>,
    intensity_step: u8,
    retry_lock_pause: Duration,
    edge_settle: Duration,
}

impl Dispatcher {
    pub fn new(
        session: Arc<Session>,
        projector: Box<dyn Projector>,
        control: &ControlConfig,
    ) -> Self {
        Dispatcher {
            session,
            projector,
            step_cycle: control.step_cycle.clone(),
            width_cycle: control.width_cycle.clone(),
            intensity_step: control.intensity_step,
            retry_lock_pause: control.retry_lock_pause(),
            edge_settle: control.edge_settle(),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Handles one key name from the input source.
    pub fn dispatch(&mut self, key: &str) -> Reply {
        let Some(token) = Token::parse(key) else {
            debug!("Dispatcher: rejected key {:?}", key);
            let mut lines = vec!["Invalid option. Please try again.".to_string()];
            lines.extend(menu_lines());
            return Reply::running(lines);
        };

        if self.session.is_locked() && !token.traits().contains(CommandTraits::ALLOWED_WHILE_LOCKED)
        {
            debug!("Dispatcher: {} refused, mirrors locked", token);
            return Reply::line("Mirrors are locked. Please unlock them first.");
        }

        let traits = token.traits();
        if traits.contains(CommandTraits::HARDWARE) {
            info!("Dispatcher: hardware command {}", token);
        }
        match self.execute(token) {
            Ok(reply) => {
                if traits.contains(CommandTraits::PATTERN) {
                    debug!("Dispatcher: {} -> {:?}", token, self.session.snapshot());
                }
                reply
            }
            Err(e) => {
                error!("Dispatcher: {} failed: {:#}", token, e);
                Reply::line(format!("Projector error: {:#}", e))
            }
        }
    }

    fn execute(&mut self, token: Token) -> Result<Reply> {
        let reply = match token {
            Token::Up => self.shift(0, 1),
            Token::Down => self.shift(0, -1),
            Token::Right => self.shift(1, 0),
            Token::Left => self.shift(-1, 0),
            Token::Edge(id) => return self.select_edge(id),
            Token::Ramp => self.select_family(PatternFamily::Ramp),
            Token::Knife => self.select_family(PatternFamily::Knife),
            Token::Pyramid => self.select_family(PatternFamily::Pyramid),
            Token::Flat => self.select_family(PatternFamily::Flat),
            Token::CycleStep => {
                let step = next_in_cycle(&self.step_cycle, self.session.step());
                self.session.set_step(step);
                debug!("Dispatcher: step size {}", step);
                Reply::line(format!("Step size changed to {}", step))
            }
            Token::CycleWidth => {
                let width = next_in_cycle(&self.width_cycle, self.session.width());
                self.session.set_width(width);
                debug!("Dispatcher: ramp width {}", width);
                let mut lines = vec![format!("Ramp width changed to {}", width)];
                if width % 2 == 1 {
                    lines.push("Odd widths tilt the edge by one mirror.".to_string());
                }
                Reply::running(lines)
            }
            Token::IntensityDown => self.adjust_intensity(-i64::from(self.intensity_step)),
            Token::IntensityUp => self.adjust_intensity(i64::from(self.intensity_step)),
            Token::ToggleCorrection => {
                let enabled = !self.session.correction();
                self.session.set_correction(enabled);
                debug!("Dispatcher: correction {}", enabled);
                Reply::line(format!(
                    "Perceptual correction {}",
                    if enabled { "on" } else { "off" }
                ))
            }
            Token::Lock => Reply::running(self.lock()?),
            Token::Unlock => Reply::running(self.unlock()?),
            Token::RetryLock => return self.retry_lock(),
            Token::PrintOffset => {
                Reply::line(format!("Current offset: {}", self.session.offset()))
            }
            Token::Menu => Reply::running(menu_lines()),
            Token::Quit => {
                info!("Dispatcher: quit requested");
                Reply {
                    status: Status::Shutdown,
                    lines: vec!["Exiting...".to_string()],
                }
            }
        };
        Ok(reply)
    }

    fn shift(&self, steps_right: i32, steps_up: i32) -> Reply {
        let offset = self.session.shift(steps_right, steps_up);
        debug!("Dispatcher: offset {}", offset);
        Reply::line(format!("Offset: {}", offset))
    }

    fn select_family(&self, family: PatternFamily) -> Reply {
        self.session.set_family(family);
        debug!("Dispatcher: family {:?}", family);
        Reply::line(format!("Changing to {}.", family))
    }

    /// Ramp and flat modes switch edges directly. Knife and pyramid modes
    /// bracket the change with unlock and lock so every step of a sequential
    /// measurement starts frozen.
    fn select_edge(&mut self, id: u8) -> Result<Reply> {
        let edge = Edge::from_id(id)?;
        let mut lines = vec![format!("Changing to edge {}.", edge.id())];
        if !self.session.family().is_sequential() {
            self.session.set_edge(edge);
            debug!("Dispatcher: edge {:?}", edge);
            return Ok(Reply::running(lines));
        }

        lines.extend(self.unlock()?);
        self.session.set_edge(edge);
        debug!("Dispatcher: edge {:?}, settling {:?}", edge, self.edge_settle);
        pause(self.edge_settle);
        lines.extend(self.lock()?);
        Ok(Reply::running(lines))
    }

    /// Steps that overshoot land on the nearest bound, so both ends stay
    /// reachable whatever the step size.
    fn adjust_intensity(&self, delta: i64) -> Reply {
        let current = self.session.flat_intensity();
        let bound = if delta < 0 { Intensity::MIN } else { Intensity::MAX };
        if current == bound {
            return Reply::line(format!("Flat intensity stays at {}", current.value()));
        }
        let next = Intensity::new(i64::from(current.value()) + delta).unwrap_or(bound);
        self.session.set_flat_intensity(next);
        debug!("Dispatcher: flat intensity {}", next.value());
        Reply::line(format!("Flat intensity {}", next.value()))
    }

    fn lock(&mut self) -> Result<Vec<String>> {
        let summary = self
            .projector
            .lock_mirrors()
            .context("Mirror lock failed")?;
        self.session.set_locked(true);
        Ok(hardware_lines("Mirrors locked.", &summary))
    }

    fn unlock(&mut self) -> Result<Vec<String>> {
        let summary = self
            .projector
            .unlock_mirrors()
            .context("Mirror unlock failed")?;
        self.session.set_locked(false);
        Ok(hardware_lines("Mirrors unlocked.", &summary))
    }

    /// Re-lock to land on the other phase of the duty cycle.
    fn retry_lock(&mut self) -> Result<Reply> {
        if !self.session.is_locked() {
            let mut lines = vec!["The mirrors were not locked.".to_string()];
            lines.extend(self.lock()?);
            return Ok(Reply::running(lines));
        }
        let mut lines = self.unlock()?;
        pause(self.retry_lock_pause);
        lines.extend(self.lock()?);
        Ok(Reply::running(lines))
    }

    /// Leaves the mirrors free for teardown, whatever the session says.
    pub fn release_mirrors(&mut self) -> Result<Summary> {
        let summary = self.projector.unlock_mirrors()?;
        self.session.set_locked(false);
        info!("Dispatcher: mirrors released ({})", summary);
        Ok(summary)
    }
}

fn hardware_lines(message: &str, summary: &Summary) -> Vec<String> {
    info!("{} {}", message, summary);
    vec![message.to_string()]
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

/// The entry after `current`, wrapping; the first entry when `current` is
/// not in the cycle.
fn next_in_cycle(cycle: &[u32], current: u32) -> u32 {
    match cycle.iter().position(|&v| v == current) {
        Some(i) => cycle[(i + 1) % cycle.len()],
        None => cycle.first().copied().unwrap_or(current),
    }
}
