// src/session.rs

//! Shared bench state: which pattern is on the DMD and where.
//!
//! A [`Session`] is shared between the command loop, which mutates it, and the
//! frame streamer, which reads it once per frame. Every field is an
//! independent atomic scalar. No lock ties the fields together, so a frame may
//! see a half-applied command; the next frame, one poll interval later, sees
//! the finished one. Neither side ever blocks on the other.

use crate::color::{Intensity, PatternError};
use crate::config::Config;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU8, Ordering};

/// Which edge (Ramp/Knife) or quadrant (Pyramid) of the pattern is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Edge {
    /// Transition along x, dark on the left, bright on the right.
    #[default]
    Edge1 = 1,
    /// Mirror of `Edge1`: bright on the left.
    Edge2 = 2,
    /// Transition along y, bright below the center row.
    Edge3 = 3,
    /// Mirror of `Edge3`: bright above the center row.
    Edge4 = 4,
}

impl Edge {
    pub fn from_id(id: u8) -> Result<Edge, PatternError> {
        match id {
            1 => Ok(Edge::Edge1),
            2 => Ok(Edge::Edge2),
            3 => Ok(Edge::Edge3),
            4 => Ok(Edge::Edge4),
            other => Err(PatternError::InvalidEdge(other)),
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// True for the edges whose transition runs along the x-axis.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Edge::Edge1 | Edge::Edge2)
    }
}

/// The pattern family currently streamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PatternFamily {
    /// Knife edge with a linear grey transition band.
    #[default]
    Ramp = 0,
    /// Hard knife edge: one half-plane on.
    Knife = 1,
    /// One quadrant on.
    Pyramid = 2,
    /// Uniform field at the flat intensity.
    Flat = 3,
}

impl PatternFamily {
    fn from_raw(raw: u8) -> PatternFamily {
        match raw {
            1 => PatternFamily::Knife,
            2 => PatternFamily::Pyramid,
            3 => PatternFamily::Flat,
            _ => PatternFamily::Ramp,
        }
    }

    /// Families whose edge changes are bracketed by an unlock/lock cycle.
    pub fn is_sequential(self) -> bool {
        matches!(self, PatternFamily::Knife | PatternFamily::Pyramid)
    }
}

impl fmt::Display for PatternFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PatternFamily::Ramp => "ramp edge",
            PatternFamily::Knife => "knife edge",
            PatternFamily::Pyramid => "pyramid",
            PatternFamily::Flat => "flat field",
        };
        f.write_str(name)
    }
}

/// Pattern center displacement in DMD mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Offset {
    pub right: i32,
    pub up: i32,
}

impl Offset {
    pub const fn new(right: i32, up: i32) -> Self {
        Offset { right, up }
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x={}, y={}", self.right, self.up)
    }
}

/// A plain copy of every session field, taken without locking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSnapshot {
    pub family: PatternFamily,
    pub edge: Edge,
    pub offset: Offset,
    pub step: u32,
    pub width: u32,
    pub flat_intensity: Intensity,
    pub correction: bool,
    pub locked: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        SessionSnapshot {
            family: PatternFamily::Ramp,
            edge: Edge::Edge1,
            offset: Offset::default(),
            step: 100,
            width: 1,
            flat_intensity: Intensity::MIN,
            correction: true,
            locked: false,
        }
    }
}

impl SessionSnapshot {
    /// Start-of-session state from configuration and the operator's offset.
    pub fn initial(config: &Config, offset: Offset) -> Self {
        SessionSnapshot {
            offset,
            step: config.control.initial_step,
            width: config.control.initial_width,
            correction: config.response.correction,
            ..SessionSnapshot::default()
        }
    }
}

#[derive(Debug)]
pub struct Session {
    family: AtomicU8,
    edge: AtomicU8,
    right: AtomicI32,
    up: AtomicI32,
    step: AtomicU32,
    width: AtomicU32,
    flat_intensity: AtomicU8,
    correction: AtomicBool,
    locked: AtomicBool,
}

impl Default for Session {
    fn default() -> Self {
        Session::new(SessionSnapshot::default())
    }
}

impl Session {
    pub fn new(initial: SessionSnapshot) -> Self {
        Session {
            family: AtomicU8::new(initial.family as u8),
            edge: AtomicU8::new(initial.edge.id()),
            right: AtomicI32::new(initial.offset.right),
            up: AtomicI32::new(initial.offset.up),
            step: AtomicU32::new(initial.step),
            width: AtomicU32::new(initial.width),
            flat_intensity: AtomicU8::new(initial.flat_intensity.value()),
            correction: AtomicBool::new(initial.correction),
            locked: AtomicBool::new(initial.locked),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            family: self.family(),
            edge: self.edge(),
            offset: self.offset(),
            step: self.step(),
            width: self.width(),
            flat_intensity: self.flat_intensity(),
            correction: self.correction(),
            locked: self.is_locked(),
        }
    }

    pub fn family(&self) -> PatternFamily {
        PatternFamily::from_raw(self.family.load(Ordering::Relaxed))
    }

    pub fn set_family(&self, family: PatternFamily) {
        self.family.store(family as u8, Ordering::Relaxed);
    }

    pub fn edge(&self) -> Edge {
        // Only valid ids are ever stored.
        Edge::from_id(self.edge.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub fn set_edge(&self, edge: Edge) {
        self.edge.store(edge.id(), Ordering::Relaxed);
    }

    pub fn offset(&self) -> Offset {
        Offset {
            right: self.right.load(Ordering::Relaxed),
            up: self.up.load(Ordering::Relaxed),
        }
    }

    pub fn set_offset(&self, offset: Offset) {
        self.right.store(offset.right, Ordering::Relaxed);
        self.up.store(offset.up, Ordering::Relaxed);
    }

    /// Shifts the center by `steps_right` and `steps_up` multiples of the
    /// current step size. Saturates at the `i32` limits.
    pub fn shift(&self, steps_right: i32, steps_up: i32) -> Offset {
        let step = i32::try_from(self.step()).unwrap_or(i32::MAX);
        let current = self.offset();
        let next = Offset {
            right: current
                .right
                .saturating_add(steps_right.saturating_mul(step)),
            up: current.up.saturating_add(steps_up.saturating_mul(step)),
        };
        self.set_offset(next);
        next
    }

    pub fn step(&self) -> u32 {
        self.step.load(Ordering::Relaxed)
    }

    pub fn set_step(&self, step: u32) {
        self.step.store(step, Ordering::Relaxed);
    }

    pub fn width(&self) -> u32 {
        self.width.load(Ordering::Relaxed)
    }

    pub fn set_width(&self, width: u32) {
        self.width.store(width, Ordering::Relaxed);
    }

    pub fn flat_intensity(&self) -> Intensity {
        Intensity::from(self.flat_intensity.load(Ordering::Relaxed))
    }

    pub fn set_flat_intensity(&self, intensity: Intensity) {
        self.flat_intensity
            .store(intensity.value(), Ordering::Relaxed);
    }

    pub fn correction(&self) -> bool {
        self.correction.load(Ordering::Relaxed)
    }

    pub fn set_correction(&self, enabled: bool) {
        self.correction.store(enabled, Ordering::Relaxed);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    pub fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn it_should_shift_offset_by_whole_steps() {
        let session = Session::default();
        assert_eq!(session.step(), 100);
        session.shift(1, 0);
        session.shift(0, 1);
        assert_eq!(session.offset(), Offset::new(100, 100));
        session.shift(-1, 0);
        session.shift(-1, 0);
        assert_eq!(session.offset(), Offset::new(-100, 100));
    }

    #[test]
    fn it_should_saturate_instead_of_overflowing() {
        let session = Session::new(SessionSnapshot {
            offset: Offset::new(i32::MAX - 5, 0),
            ..SessionSnapshot::default()
        });
        assert_eq!(session.shift(1, 0).right, i32::MAX);
    }

    #[test]
    fn it_should_reflect_every_setter_in_the_snapshot() {
        let session = Session::default();
        session.set_family(PatternFamily::Pyramid);
        session.set_edge(Edge::Edge3);
        session.set_step(10);
        session.set_width(8);
        session.set_flat_intensity(Intensity::from(42));
        session.set_correction(false);
        session.set_locked(true);

        let snap = session.snapshot();
        assert_eq!(snap.family, PatternFamily::Pyramid);
        assert_eq!(snap.edge, Edge::Edge3);
        assert_eq!(snap.step, 10);
        assert_eq!(snap.width, 8);
        assert_eq!(snap.flat_intensity.value(), 42);
        assert!(!snap.correction);
        assert!(snap.locked);
    }

    #[test]
    fn it_should_reject_unknown_edge_ids() {
        assert_eq!(Edge::from_id(0), Err(PatternError::InvalidEdge(0)));
        assert_eq!(Edge::from_id(5), Err(PatternError::InvalidEdge(5)));
        assert_eq!(Edge::from_id(4), Ok(Edge::Edge4));
    }
}
