// Copyright 2026 The winjoy Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! XInput polling and state mapping.
//!
//! XInput-backed devices report garbage through their HID interface, so their
//! state comes from polling the four fixed user slots instead. Readings carry
//! a packet number that only changes when the pad state changes; an unchanged
//! packet skips the whole decode.

use crate::axis::{Axis, AxisSet};
use crate::slot::{Capabilities, SlotTable, State};
use crate::XINPUT_USER_COUNT;

/// One raw XInput state snapshot for a user slot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GamepadReading {
    pub packet: u32,
    pub buttons: u16,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub thumb_rx: i16,
    pub thumb_ry: i16,
    pub left_trigger: u8,
    pub right_trigger: u8,
}

/// The consumed XInput surface: current state of one user slot, or `None`
/// when no pad is plugged in there.
pub(crate) trait GamepadApi {
    fn state(&mut self, user_index: u32) -> Option<GamepadReading>;
}

/// Button bits of an XInput reading, in the order they map to the dense
/// button array: face buttons, d-pad, start/back, shoulders, stick clicks.
pub(crate) const BUTTON_MASKS: [u16; 14] = [
    0x1000, // A
    0x2000, // B
    0x4000, // X
    0x8000, // Y
    0x0001, // d-pad up
    0x0002, // d-pad down
    0x0004, // d-pad left
    0x0008, // d-pad right
    0x0010, // start
    0x0020, // back
    0x0100, // left shoulder
    0x0200, // right shoulder
    0x0040, // left stick click
    0x0080, // right stick click
];

/// Quarter of the documented left-thumb deadzone (7849).
pub(crate) const DEADZONE: i16 = 7849 / 4;

/// Sticks report in `[-32768, 32767]`; this lands them in roughly `[-100, 100]`.
const THUMB_SCALE: f32 = 327.670;

/// Triggers report in `[0, 255]`; this lands them in `[0, 100]`.
const TRIGGER_SCALE: f32 = 2.55;

/// Fixed capability set of an XInput pad: fourteen buttons, both sticks and
/// both triggers, no hat.
pub(crate) fn capabilities() -> Capabilities {
    let mut axes = AxisSet::default();
    for axis in [Axis::X, Axis::Y, Axis::Z, Axis::R, Axis::U, Axis::V] {
        axes.insert(axis);
    }
    Capabilities {
        button_count: BUTTON_MASKS.len() as u32,
        axes,
    }
}

/// Maps one reading into a state snapshot.
pub(crate) fn decode(reading: &GamepadReading) -> State {
    let mut state = State {
        connected: true,
        ..State::default()
    };
    for (button, mask) in BUTTON_MASKS.iter().enumerate() {
        state.buttons[button] = reading.buttons & mask != 0;
    }
    state.axes[Axis::X.to_index()] = thumb_axis(reading.thumb_lx);
    state.axes[Axis::Y.to_index()] = thumb_axis(reading.thumb_ly);
    state.axes[Axis::Z.to_index()] = thumb_axis(reading.thumb_rx);
    state.axes[Axis::R.to_index()] = thumb_axis(reading.thumb_ry);
    state.axes[Axis::U.to_index()] = trigger_axis(reading.left_trigger);
    state.axes[Axis::V.to_index()] = trigger_axis(reading.right_trigger);
    state
}

fn thumb_axis(value: i16) -> f32 {
    if i32::from(value).abs() < i32::from(DEADZONE) {
        0.0
    } else {
        f32::from(value) / THUMB_SCALE
    }
}

fn trigger_axis(value: u8) -> f32 {
    f32::from(value) / TRIGGER_SCALE
}

/// Polls every user slot once and updates the bound slots.
///
/// Slots whose packet number has not moved since the previous tick keep their
/// published state untouched.
pub(crate) fn poll<G: GamepadApi>(api: &mut G, table: &mut SlotTable) {
    for user_index in 0..XINPUT_USER_COUNT as u32 {
        let Some(reading) = api.state(user_index) else {
            continue;
        };
        let Some(slot) = table.find_by_xinput_mut(user_index) else {
            continue;
        };
        if slot.last_packet == Some(reading.packet) {
            continue;
        }
        slot.last_packet = Some(reading.packet);
        slot.state = decode(&reading);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Scripted [`GamepadApi`] that also counts queries.
    pub(crate) struct MockPad {
        pub readings: [Option<GamepadReading>; XINPUT_USER_COUNT],
        pub queries: usize,
    }

    impl MockPad {
        pub fn new() -> MockPad {
            MockPad {
                readings: [None; XINPUT_USER_COUNT],
                queries: 0,
            }
        }
    }

    impl GamepadApi for MockPad {
        fn state(&mut self, user_index: u32) -> Option<GamepadReading> {
            self.queries += 1;
            self.readings[user_index as usize]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockPad;
    use super::*;
    use crate::slot::{BackingKind, JoystickSlot};

    fn xinput_slot(handle: isize) -> JoystickSlot {
        JoystickSlot {
            backing: BackingKind::XInput,
            device_handle: Some(handle),
            ..Default::default()
        }
    }

    #[test]
    fn thumb_deadzone_boundary() {
        assert_eq!(thumb_axis(0), 0.0);
        assert_eq!(thumb_axis(DEADZONE - 1), 0.0);
        assert_eq!(thumb_axis(1 - DEADZONE), 0.0);
        assert!((thumb_axis(DEADZONE) - 5.987_9).abs() < 0.01);
        assert!((thumb_axis(-DEADZONE) + 5.987_9).abs() < 0.01);
        assert!((thumb_axis(32767) - 100.0).abs() < 0.01);
    }

    #[test]
    fn trigger_scaling() {
        assert_eq!(trigger_axis(0), 0.0);
        assert_eq!(trigger_axis(255), 100.0);
        assert!((trigger_axis(128) - 50.196).abs() < 0.01);
    }

    #[test]
    fn button_bits_map_in_order() {
        let reading = GamepadReading {
            buttons: BUTTON_MASKS[0] | BUTTON_MASKS[13],
            ..Default::default()
        };
        let state = decode(&reading);
        assert!(state.buttons[0], "A is the first dense button");
        assert!(state.buttons[13], "right stick click is the last");
        assert_eq!(state.buttons.iter().filter(|&&b| b).count(), 2);
    }

    #[test]
    fn fixed_capability_set() {
        let caps = capabilities();
        assert_eq!(caps.button_count, 14);
        assert_eq!(caps.axes.len(), 6);
        assert!(caps.has_axis(Axis::U));
        assert!(!caps.has_axis(Axis::PovX));
    }

    #[test]
    fn poll_updates_bound_slot() {
        let mut table = SlotTable::default();
        table.bind(xinput_slot(0x10));
        let mut pad = MockPad::new();
        pad.readings[0] = Some(GamepadReading {
            packet: 1,
            buttons: BUTTON_MASKS[0],
            left_trigger: 255,
            ..Default::default()
        });

        poll(&mut pad, &mut table);
        assert_eq!(pad.queries, XINPUT_USER_COUNT);
        let state = table.state(0);
        assert!(state.connected);
        assert!(state.button(0));
        assert_eq!(state.axis(Axis::U), 100.0);
    }

    #[test]
    fn unchanged_packet_skips_decode() {
        let mut table = SlotTable::default();
        table.bind(xinput_slot(0x10));
        let mut pad = MockPad::new();
        pad.readings[0] = Some(GamepadReading {
            packet: 7,
            buttons: BUTTON_MASKS[0],
            ..Default::default()
        });
        poll(&mut pad, &mut table);
        assert!(table.state(0).button(0));

        // Same packet number with different registers behind it: the reading
        // must be ignored wholesale.
        pad.readings[0] = Some(GamepadReading {
            packet: 7,
            buttons: 0,
            ..Default::default()
        });
        poll(&mut pad, &mut table);
        assert!(table.state(0).button(0));

        // A new packet number picks the change up.
        pad.readings[0] = Some(GamepadReading {
            packet: 8,
            buttons: 0,
            ..Default::default()
        });
        poll(&mut pad, &mut table);
        assert!(!table.state(0).button(0));
    }

    #[test]
    fn unplugged_user_slots_are_skipped() {
        let mut table = SlotTable::default();
        table.bind(xinput_slot(0x10));
        let mut pad = MockPad::new();

        poll(&mut pad, &mut table);
        assert_eq!(pad.queries, XINPUT_USER_COUNT);
        assert!(!table.state(0).connected);
    }
}
