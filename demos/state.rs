// Copyright 2026 The winjoy Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::thread;
use std::time::Duration;

use winjoy::{Joysticks, MAX_JOYSTICKS};

fn main() {
    env_logger::init();

    let joysticks = Joysticks::new();
    loop {
        for slot in 0..MAX_JOYSTICKS {
            if !joysticks.is_connected(slot) {
                continue;
            }
            let ident = joysticks.identification(slot);
            let caps = joysticks.capabilities(slot);
            let state = joysticks.update(slot);

            let pressed: Vec<usize> = (0..caps.button_count as usize)
                .filter(|&button| state.button(button))
                .collect();
            let axes: Vec<String> = caps
                .axes
                .iter()
                .map(|axis| format!("{:?} {:6.1}", axis, state.axis(axis)))
                .collect();
            println!(
                "{}: {} [{:04x}:{:04x}] buttons {:?} {}",
                slot,
                ident.name,
                ident.vendor_id,
                ident.product_id,
                pressed,
                axes.join(" ")
            );
        }
        thread::sleep(Duration::from_millis(500));
    }
}
