// Copyright 2026 The winjoy Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Joystick and gamepad input for Windows, built on Raw Input and XInput.
//!
//! Connected devices are tracked in a fixed pool of [`MAX_JOYSTICKS`] slots.
//! A slot index is stable for as long as a device stays plugged in; after
//! removal the position is handed out to the next arrival. Reading a slot
//! that nothing is bound to is always valid and reads as disconnected.
//!
//! Generic HID joysticks are decoded from their raw input reports. Devices
//! that identify as XInput-backed report garbage through that interface, so
//! they are polled through XInput instead; both paths land in the same
//! [`State`] representation with buttons as a dense array and axes scaled to
//! `[-100, 100]`.
//!
//! All of the device work happens on a background thread owned by
//! [`Joysticks`]; the public methods are cheap snapshot reads.
//!
//! # Example
//!
//! ```
//! use winjoy::{Joysticks, MAX_JOYSTICKS};
//!
//! let joysticks = Joysticks::new();
//! for index in 0..MAX_JOYSTICKS {
//!     if joysticks.is_connected(index) {
//!         let ident = joysticks.identification(index);
//!         let state = joysticks.update(index);
//!         println!("{}: trigger at {}", ident.name, state.axis(winjoy::Axis::U));
//!     }
//! }
//! ```
//!
//! # Platform support
//!
//! Windows is the only real backend. On other targets the crate compiles
//! against a stub that keeps every slot disconnected, so portable code can
//! link it unconditionally.

mod axis;
mod dispatch;
mod hid;
mod ident;
mod platform;
mod scratch;
mod slot;
mod xinput;

pub use crate::axis::{Axis, AxisSet};
pub use crate::ident::Identification;
pub use crate::slot::{Capabilities, State};

use crate::platform::Worker;
use crate::slot::{lock_slots, shared_slots, SharedSlots};

/// Number of joystick slots.
pub const MAX_JOYSTICKS: usize = 8;

/// Number of buttons a slot can report.
pub const MAX_BUTTONS: usize = 32;

/// Number of axes a slot can report.
pub const AXIS_COUNT: usize = 8;

/// XInput serves at most four pads.
pub(crate) const XINPUT_USER_COUNT: usize = 4;

/// Handle to the joystick backend.
///
/// Creating one spawns the worker thread that owns the hidden input window
/// and keeps the slot pool current; dropping it (or calling
/// [`close`](Joysticks::close)) shuts the worker down. Methods can be called
/// from any thread.
pub struct Joysticks {
    slots: SharedSlots,
    worker: Worker,
}

impl Joysticks {
    /// Starts the backend.
    ///
    /// Never fails: when the worker cannot be brought up, or the platform has
    /// no backend, the problem is logged and every slot reads as
    /// disconnected.
    pub fn new() -> Joysticks {
        let slots = shared_slots();
        let worker = Worker::spawn(slots.clone());
        Joysticks { slots, worker }
    }

    /// Stops the worker thread. Idempotent; later reads see the last
    /// published snapshots.
    pub fn close(&mut self) {
        self.worker.stop();
    }

    /// Returns true if a connected joystick occupies `slot`.
    pub fn is_connected(&self, slot: usize) -> bool {
        lock_slots(&self.slots).connected(slot)
    }

    /// Opens the joystick in `slot` for use, returning whether it is
    /// connected.
    pub fn open(&self, slot: usize) -> bool {
        self.is_connected(slot)
    }

    /// Releases the joystick in `slot`. The worker owns all device
    /// resources, so there is nothing to free here.
    pub fn close_joystick(&self, _slot: usize) {}

    /// Button and axis capabilities of the joystick in `slot`.
    pub fn capabilities(&self, slot: usize) -> Capabilities {
        lock_slots(&self.slots).capabilities(slot)
    }

    /// Identity of the joystick in `slot`.
    ///
    /// Stays readable after a disconnect, until the slot is bound again.
    pub fn identification(&self, slot: usize) -> Identification {
        lock_slots(&self.slots).identification(slot)
    }

    /// Snapshot of the current input state of `slot`.
    pub fn update(&self, slot: usize) -> State {
        lock_slots(&self.slots).state(slot)
    }
}

impl Default for Joysticks {
    fn default() -> Self {
        Joysticks::new()
    }
}

impl Drop for Joysticks {
    fn drop(&mut self) {
        self.worker.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_slots_read_as_defaults() {
        let joysticks = Joysticks::new();
        assert!(!joysticks.is_connected(MAX_JOYSTICKS));
        assert_eq!(joysticks.update(MAX_JOYSTICKS), State::default());
        assert_eq!(joysticks.capabilities(MAX_JOYSTICKS), Capabilities::default());
        assert_eq!(joysticks.identification(MAX_JOYSTICKS).name, "Unknown Joystick");
    }

    #[test]
    fn close_is_idempotent() {
        let mut joysticks = Joysticks::new();
        joysticks.close();
        joysticks.close();
    }
}
