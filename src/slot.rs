// Copyright 2026 The winjoy Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::axis::{Axis, AxisSet};
use crate::ident::Identification;
use crate::{AXIS_COUNT, MAX_BUTTONS, MAX_JOYSTICKS, XINPUT_USER_COUNT};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Kernel handle of a Raw Input device, stored as the integer the window
/// procedure receives so the table stays `Send`. Not stable across reconnects.
pub(crate) type DeviceHandle = isize;

/// Which decode path owns a slot's state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BackingKind {
    #[default]
    Unassigned,
    /// Generic device; state comes from Raw Input report decoding.
    Hid,
    /// XInput-backed device; state comes from the XInput poller.
    XInput,
}

/// Button and axis capabilities of a joystick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Capabilities {
    /// Number of buttons the device reports, capped at [`MAX_BUTTONS`].
    pub button_count: u32,
    /// Axes present on the device.
    pub axes: AxisSet,
}

impl Capabilities {
    /// Returns true if the device has `axis`.
    pub fn has_axis(&self, axis: Axis) -> bool {
        self.axes.contains(axis)
    }
}

/// Snapshot of a joystick's input state.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct State {
    pub connected: bool,
    pub buttons: [bool; MAX_BUTTONS],
    /// Axis values in `[-100, 100]` (`[0, 100]` for triggers), indexed by
    /// usage order.
    pub axes: [f32; AXIS_COUNT],
}

impl State {
    /// Returns the pressed state of button `index`, false when out of range.
    pub fn button(&self, index: usize) -> bool {
        self.buttons.get(index).copied().unwrap_or(false)
    }

    /// Returns the current value of `axis`.
    pub fn axis(&self, axis: Axis) -> f32 {
        self.axes[axis.to_index()]
    }
}

/// One logical joystick slot. Slot identity is the table position; it never
/// changes, only the binding does.
#[derive(Debug, Default)]
pub(crate) struct JoystickSlot {
    pub backing: BackingKind,
    pub device_handle: Option<DeviceHandle>,
    /// Binding to one of the four XInput user indices.
    pub xinput_index: Option<u32>,
    /// Last packet number seen from XInput; `None` until the first reading.
    pub last_packet: Option<u32>,
    pub capabilities: Capabilities,
    pub identification: Identification,
    pub state: State,
}

impl JoystickSlot {
    fn is_free(&self) -> bool {
        self.backing == BackingKind::Unassigned
    }

    /// Clears the binding and state. Identification is left in place until the
    /// slot is bound again, matching what callers observed before removal.
    fn release(&mut self) {
        self.backing = BackingKind::Unassigned;
        self.device_handle = None;
        self.xinput_index = None;
        self.last_packet = None;
        self.capabilities = Capabilities::default();
        self.state = State::default();
    }
}

/// Fixed pool of joystick slots.
///
/// The worker thread writes it, the application thread reads snapshots of it;
/// both go through [`SharedSlots`], one coarse mutex. Critical sections are a
/// handful of field reads or writes.
#[derive(Debug, Default)]
pub(crate) struct SlotTable {
    slots: [JoystickSlot; MAX_JOYSTICKS],
}

pub(crate) type SharedSlots = Arc<Mutex<SlotTable>>;

pub(crate) fn shared_slots() -> SharedSlots {
    Arc::new(Mutex::new(SlotTable::default()))
}

pub(crate) fn lock_slots(slots: &SharedSlots) -> MutexGuard<'_, SlotTable> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SlotTable {
    /// Binds `slot` to the first free table position, picking an unused XInput
    /// user index when the binding is XInput-backed. Returns the position, or
    /// `None` when the pool is full.
    pub fn bind(&mut self, mut slot: JoystickSlot) -> Option<usize> {
        debug_assert!(slot.backing != BackingKind::Unassigned);
        if slot.backing == BackingKind::XInput {
            slot.xinput_index = self.unused_xinput_index();
        }
        let index = self.slots.iter().position(JoystickSlot::is_free)?;
        self.slots[index] = slot;
        Some(index)
    }

    /// Releases the slot bound to `handle`, returning its position.
    pub fn release_by_handle(&mut self, handle: DeviceHandle) -> Option<usize> {
        let index = self
            .slots
            .iter()
            .position(|s| s.device_handle == Some(handle))?;
        self.slots[index].release();
        Some(index)
    }

    pub fn find_by_handle_mut(&mut self, handle: DeviceHandle) -> Option<&mut JoystickSlot> {
        self.slots
            .iter_mut()
            .find(|s| s.device_handle == Some(handle))
    }

    pub fn contains_handle(&self, handle: DeviceHandle) -> bool {
        self.slots.iter().any(|s| s.device_handle == Some(handle))
    }

    pub fn find_by_xinput_mut(&mut self, user_index: u32) -> Option<&mut JoystickSlot> {
        self.slots
            .iter_mut()
            .find(|s| s.backing == BackingKind::XInput && s.xinput_index == Some(user_index))
    }

    /// First XInput user index in `0..4` not bound by any slot.
    fn unused_xinput_index(&self) -> Option<u32> {
        (0..XINPUT_USER_COUNT as u32).find(|i| !self.slots.iter().any(|s| s.xinput_index == Some(*i)))
    }

    pub fn connected(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|s| s.state.connected)
    }

    pub fn capabilities(&self, index: usize) -> Capabilities {
        self.slots
            .get(index)
            .map(|s| s.capabilities)
            .unwrap_or_default()
    }

    pub fn identification(&self, index: usize) -> Identification {
        self.slots
            .get(index)
            .map(|s| s.identification.clone())
            .unwrap_or_default()
    }

    pub fn state(&self, index: usize) -> State {
        self.slots.get(index).map(|s| s.state).unwrap_or_default()
    }

    #[cfg(test)]
    pub fn slot(&self, index: usize) -> &JoystickSlot {
        &self.slots[index]
    }
}
