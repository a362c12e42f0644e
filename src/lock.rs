//! Door lock actuation with a timed auto-close.
//!
//! The lock is wired active low, as the usual relay boards are:
//! driving the pin low releases the strike.

use embedded_hal::digital::v2::OutputPin;
use log::debug;

/// A lock (or relay) on a digital output, with an optional auto-close
/// deadline serviced by the caller's main loop.
#[derive(Debug)]
pub struct Lock<P> {
    pin: P,
    close_at: Option<u32>,
}

impl<P: OutputPin> Lock<P> {
    pub fn new(pin: P) -> Self {
        Lock {
            pin,
            close_at: None,
        }
    }

    /// Releases the strike until told otherwise. Cancels any pending
    /// auto-close, so an alarm can hold the door open.
    pub fn open(&mut self) -> Result<(), P::Error> {
        self.close_at = None;
        self.pin.set_low()
    }

    /// Engages the strike and forgets any pending auto-close.
    pub fn close(&mut self) -> Result<(), P::Error> {
        self.close_at = None;
        self.pin.set_high()
    }

    /// Releases the strike and schedules [`tick`](Lock::tick) to close
    /// it again `duration_ms` from `now`.
    pub fn open_for(&mut self, duration_ms: u32, now: u32) -> Result<(), P::Error> {
        self.pin.set_low()?;
        self.close_at = Some(now.wrapping_add(duration_ms));
        Ok(())
    }

    /// Runs the auto-close once its deadline passes. Call this from
    /// the main loop; it is free when nothing is scheduled.
    pub fn tick(&mut self, now: u32) -> Result<(), P::Error> {
        if let Some(at) = self.close_at {
            if (now.wrapping_sub(at) as i32) >= 0 {
                debug!("auto-closing the lock");
                return self.close();
            }
        }
        Ok(())
    }
}
