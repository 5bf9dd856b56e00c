// Copyright 2026 The winjoy Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Semantic axis of a joystick.
///
/// `U` and `V` double as the trigger axes on Xbox-class controllers and report
/// in `[0, 100]`; every other axis reports in `[-100, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Axis {
    X,
    Y,
    Z,
    R,
    U,
    V,
    PovX,
    PovY,
}

impl Axis {
    /// All axes, in usage-index order.
    pub const ALL: [Axis; 8] = [
        Axis::X,
        Axis::Y,
        Axis::Z,
        Axis::R,
        Axis::U,
        Axis::V,
        Axis::PovX,
        Axis::PovY,
    ];

    /// Maps a HID value-capability index to its axis.
    ///
    /// The mapping is positional: the n-th declared value capability is taken
    /// to be the n-th axis in `X, Y, Z, R, U, V, PovX, PovY` order. Returns
    /// `None` for indices outside `0..8`.
    pub fn from_usage_index(index: usize) -> Option<Axis> {
        Self::ALL.get(index).copied()
    }

    pub(crate) fn to_index(self) -> usize {
        self as usize
    }
}

/// Set of axes present on a device.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct AxisSet(u8);

impl AxisSet {
    pub(crate) fn insert(&mut self, axis: Axis) {
        self.0 |= 1 << axis as u8;
    }

    /// Returns true if `axis` is in the set.
    pub fn contains(self, axis: Axis) -> bool {
        self.0 & (1 << axis as u8) != 0
    }

    /// Number of axes in the set.
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Returns true if no axis is present.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates over the axes in the set, in usage-index order.
    pub fn iter(self) -> impl Iterator<Item = Axis> {
        Axis::ALL.into_iter().filter(move |a| self.contains(*a))
    }
}
