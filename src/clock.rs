//! Source of the current time.
//!
//! Policies and supervisors never read the wall clock themselves, they are
//! handed a [SharedClock]. Tests substitute a [FixedClock].

use std::fmt;
use std::rc::Rc;

use chrono::{Local, NaiveDateTime, Timelike};

pub trait Clock: fmt::Debug {
    /// Current local time.
    fn now(&self) -> NaiveDateTime;
}

/// Clock shared by every component of one composition.
pub type SharedClock = Rc<dyn Clock>;

/// Wall-clock time in the local timezone, truncated to whole seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now = Local::now().naive_local();
        now.with_nanosecond(0).unwrap_or(now)
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// The production clock.
pub fn system() -> SharedClock {
    Rc::new(SystemClock)
}
