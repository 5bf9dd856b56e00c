// Copyright 2026 The winjoy Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! [`GamepadApi`] over `XInputGetState`.

use std::mem;

use windows_sys::Win32::UI::Input::XboxController::{XInputGetState, XINPUT_STATE};

use crate::xinput::{GamepadApi, GamepadReading};

pub(crate) struct XInputApi;

impl GamepadApi for XInputApi {
    fn state(&mut self, user_index: u32) -> Option<GamepadReading> {
        let mut state: XINPUT_STATE = unsafe { mem::zeroed() };
        // Any nonzero result means no pad on this user index.
        if unsafe { XInputGetState(user_index, &mut state) } != 0 {
            return None;
        }
        Some(GamepadReading {
            packet: state.dwPacketNumber,
            buttons: state.Gamepad.wButtons,
            thumb_lx: state.Gamepad.sThumbLX,
            thumb_ly: state.Gamepad.sThumbLY,
            thumb_rx: state.Gamepad.sThumbRX,
            thumb_ry: state.Gamepad.sThumbRY,
            left_trigger: state.Gamepad.bLeftTrigger,
            right_trigger: state.Gamepad.bRightTrigger,
        })
    }
}
