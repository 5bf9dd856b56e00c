// Copyright 2026 The winjoy Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Device lifecycle dispatch.
//!
//! One [`Dispatcher`] lives on the worker thread and handles the four things
//! the message loop can deliver: a device arrived, a device left, a raw input
//! report came in, a poll timer fired. It is the only writer of the slot
//! table; reader threads take snapshots through the shared handle.

use log::{debug, warn};

use crate::hid::{HidSource, ReportDecoder, ReportToken};
use crate::slot::{lock_slots, BackingKind, DeviceHandle, JoystickSlot, SharedSlots, State};
use crate::xinput::{self, GamepadApi};

pub(crate) struct Dispatcher<H, G> {
    hid: H,
    gamepads: G,
    decoder: ReportDecoder,
    slots: SharedSlots,
}

impl<H: HidSource, G: GamepadApi> Dispatcher<H, G> {
    pub fn new(hid: H, gamepads: G, slots: SharedSlots) -> Self {
        Dispatcher {
            hid,
            gamepads,
            decoder: ReportDecoder::new(),
            slots,
        }
    }

    /// Classifies a newly arrived device and binds it to a free slot.
    ///
    /// XInput-backed devices are connected from here on; generic devices
    /// connect once their first report decodes.
    pub fn device_arrived(&mut self, device: DeviceHandle) {
        if lock_slots(&self.slots).contains_handle(device) {
            debug!("device {:#x} is already bound, ignoring arrival", device);
            return;
        }

        let arrival = self.decoder.resolve_arrival(&mut self.hid, device);
        let slot = JoystickSlot {
            backing: if arrival.is_xinput {
                BackingKind::XInput
            } else {
                BackingKind::Hid
            },
            device_handle: Some(device),
            state: State {
                connected: arrival.is_xinput,
                ..State::default()
            },
            capabilities: arrival.capabilities,
            identification: arrival.identification,
            ..Default::default()
        };

        let mut table = lock_slots(&self.slots);
        match table.bind(slot) {
            Some(index) => debug!("device {:#x} bound to slot {}", device, index),
            None => warn!("no free slot for device {:#x}", device),
        }
    }

    /// Releases the slot bound to a removed device.
    pub fn device_removed(&mut self, device: DeviceHandle) {
        let mut table = lock_slots(&self.slots);
        match table.release_by_handle(device) {
            Some(index) => debug!("device {:#x} removed from slot {}", device, index),
            None => debug!("removal of unknown device {:#x}", device),
        }
    }

    /// Decodes one raw input report into the owning slot's state.
    ///
    /// A failing query drops the report and keeps whatever state was last
    /// published for the slot.
    pub fn input_report(&mut self, token: ReportToken) {
        let report = match self.decoder.fetch_report(&mut self.hid, token) {
            Ok(Some(report)) => report,
            // Not a HID report; nothing of ours.
            Ok(None) => return,
            Err(err) => {
                warn!("dropping input report: {}", err);
                return;
            }
        };

        // XInput-backed devices report garbage over this interface; their
        // state comes from the poller. Also skip reports for devices that
        // were never bound or already left.
        {
            let mut table = lock_slots(&self.slots);
            match table.find_by_handle_mut(report.device) {
                Some(slot) if slot.backing == BackingKind::Hid => {}
                _ => return,
            }
        }

        match self.decoder.decode_report(&mut self.hid, report) {
            Ok(state) => {
                let mut table = lock_slots(&self.slots);
                if let Some(slot) = table.find_by_handle_mut(report.device) {
                    slot.state = state;
                }
            }
            Err(err) => {
                warn!("dropping input report for device {:#x}: {}", report.device, err);
            }
        }
    }

    /// Polls the XInput user slots once.
    pub fn poll_tick(&mut self) {
        let mut table = lock_slots(&self.slots);
        xinput::poll(&mut self.gamepads, &mut table);
    }
}
