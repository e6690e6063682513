//! Button input: the edge-triggered GPIO source and the debouncer.

pub mod debounce;
pub mod gpio;

pub use debounce::Debouncer;
pub use gpio::GpioPin;

use std::time::{Duration, Instant};

use crate::error::ServiceError;

/// Logical level of the button line.
///
/// The button is wired active-low: a sysfs read of `'0'` means pressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Active,
    Inactive,
}

/// A debounced button press.
#[derive(Clone, Copy, Debug)]
pub struct PressEvent {
    /// When the press was detected; the control loop measures press-to-frame
    /// latency against this.
    pub at: Instant,
}

/// Outcome of one bounded wait on the edge source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
}

/// An edge-triggered readable value source.
///
/// The production implementation is the sysfs GPIO value file, which only
/// re-signals readiness after its read cursor is repositioned — hence the
/// explicit `rewind`.
pub trait EdgeSource {
    /// Blocks until the source signals an edge or `timeout` elapses.
    fn wait_ready(&mut self, timeout: Duration) -> Result<Readiness, ServiceError>;

    /// Reads the current level. A zero-length read yields `None`; the
    /// caller is expected to rewind and wait again.
    fn read_level(&mut self) -> Result<Option<Level>, ServiceError>;

    /// Repositions the read cursor to the start of the source.
    fn rewind(&mut self) -> Result<(), ServiceError>;
}
