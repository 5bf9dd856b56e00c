// Copyright 2026 The winjoy Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Fallback backend for platforms without joystick support.

use log::debug;

use crate::slot::SharedSlots;

/// No-op worker; every slot stays disconnected.
pub struct Worker;

impl Worker {
    pub fn spawn(_slots: SharedSlots) -> Worker {
        debug!("no joystick backend on this platform");
        Worker
    }

    pub fn stop(&mut self) {}
}
