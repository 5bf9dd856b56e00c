// Copyright 2026 The winjoy Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Module which exports the platform-specific backend.
//!
//! Each backend provides a `Worker`: spawned with the shared slot table and
//! expected to feed it until stopped.

#![allow(clippy::module_inception)]

pub use self::platform::Worker;

#[cfg(target_os = "windows")]
#[path = "windows/mod.rs"]
mod platform;

#[cfg(not(target_os = "windows"))]
#[path = "default/mod.rs"]
mod platform;
