// Copyright 2026 The winjoy Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Capability and report decoding for generic HID joysticks.
//!
//! The OS describes a device through an opaque preparsed blob that can only be
//! read back through accessor queries: button capabilities come as usage
//! ranges, pressed buttons as a sparse ascending usage list, and axis values as
//! raw integers whose logical bounds are only meaningful in their low
//! `bit_size` bits. [`ReportDecoder`] turns all of that into the dense
//! [`State`] representation, reusing one scratch pool so the per-report path
//! does not allocate.
//!
//! The OS itself enters only through [`HidSource`]; the Windows provider
//! implements it over Raw Input and the HID parser, tests implement it over
//! canned data.

use std::error;
use std::fmt::{Display, Formatter, Result as FmtResult};

use log::warn;

use crate::axis::Axis;
use crate::ident::{extract_vendor_product, Identification};
use crate::scratch::{ensure_len, ScratchBuffers};
use crate::slot::{Capabilities, DeviceHandle, State};
use crate::{xinput, AXIS_COUNT, MAX_BUTTONS};

/// Token identifying one raw input report, as delivered by the message loop.
pub(crate) type ReportToken = isize;

/// An OS query that failed, by calling function and error code.
///
/// Query failures are never fatal: the dispatcher logs them and drops the
/// operation, leaving previously published state in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueryError {
    call: &'static str,
    code: u32,
}

impl QueryError {
    pub fn new(call: &'static str, code: u32) -> Self {
        QueryError { call, code }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} failed with code {:#x}", self.call, self.code)
    }
}

impl error::Error for QueryError {}

/// One input button capability: a run of consecutive usages on one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ButtonRange {
    pub usage_page: u16,
    pub usage_min: u16,
    pub usage_max: u16,
}

impl ButtonRange {
    /// Number of logical buttons the range covers.
    pub fn count(&self) -> usize {
        usize::from(self.usage_max.saturating_sub(self.usage_min)) + 1
    }
}

/// One input value capability (axis).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ValueRange {
    pub usage_page: u16,
    pub usage: u16,
    /// How many low bits of the logical bounds carry meaning.
    pub bit_size: u16,
    pub logical_min: i32,
    pub logical_max: i32,
}

/// Location of one HID payload inside the report scratch buffer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InputReport {
    pub device: DeviceHandle,
    pub offset: usize,
    pub len: usize,
}

/// The consumed OS surface: Raw Input device queries, the device open for the
/// product string, and the HID parser accessors.
///
/// Buffer-filling methods follow the pool contract: they grow the passed
/// buffer as needed and return how many elements were written.
pub(crate) trait HidSource {
    /// Device interface path for `device`, UTF-16, nul included.
    fn device_path(&mut self, device: DeviceHandle, buf: &mut Vec<u16>)
        -> Result<usize, QueryError>;

    /// Human-readable product string of the device at `path`.
    ///
    /// Opens the device for query access internally; an open failure reports
    /// as an error here and the caller keeps the default identification.
    fn product_name(&mut self, path: &[u16], buf: &mut Vec<u16>) -> Result<usize, QueryError>;

    /// Copies the raw report behind `token` into `buf`.
    ///
    /// Returns `None` for non-HID reports, which are not ours to decode.
    fn fetch_report(
        &mut self,
        token: ReportToken,
        buf: &mut Vec<u8>,
    ) -> Result<Option<InputReport>, QueryError>;

    /// Preparsed capability blob for `device`.
    fn preparsed_data(&mut self, device: DeviceHandle, buf: &mut Vec<u8>)
        -> Result<usize, QueryError>;

    /// Input button capability ranges described by `preparsed`.
    fn button_ranges(
        &mut self,
        preparsed: &[u8],
        out: &mut Vec<ButtonRange>,
    ) -> Result<(), QueryError>;

    /// Input value capability ranges described by `preparsed`.
    fn value_ranges(
        &mut self,
        preparsed: &[u8],
        out: &mut Vec<ValueRange>,
    ) -> Result<(), QueryError>;

    /// Currently pressed usages of `range` within `report`, written to
    /// `usages` as a sparse ascending list. Returns how many are pressed.
    fn pressed_usages(
        &mut self,
        preparsed: &[u8],
        range: ButtonRange,
        report: &mut [u8],
        usages: &mut [u16],
    ) -> Result<usize, QueryError>;

    /// Raw integer value of `range` within `report`.
    fn usage_value(
        &mut self,
        preparsed: &[u8],
        range: ValueRange,
        report: &mut [u8],
    ) -> Result<u32, QueryError>;
}

/// What arrival processing resolved for a device.
#[derive(Debug)]
pub(crate) struct Arrival {
    pub identification: Identification,
    pub is_xinput: bool,
    pub capabilities: Capabilities,
}

/// Decodes capability blobs and input reports into slot state.
///
/// Owns the process-wide scratch pool; one instance lives on the worker
/// thread, where arrivals and reports are handled one at a time.
#[derive(Debug)]
pub(crate) struct ReportDecoder {
    scratch: ScratchBuffers,
}

impl ReportDecoder {
    pub fn new() -> Self {
        ReportDecoder {
            scratch: ScratchBuffers::new(),
        }
    }

    /// Resolves identity and capabilities for a newly arrived device.
    ///
    /// Every failure in here is recoverable: the device keeps the default
    /// identification or empty capabilities and stays tracked. XInput-backed
    /// devices get the fixed XInput capability set; their reports come from
    /// the poller, so the blob is not queried.
    pub fn resolve_arrival<H: HidSource>(&mut self, source: &mut H, device: DeviceHandle) -> Arrival {
        let mut identification = Identification::default();
        let mut is_xinput = false;

        let path_len = match source.device_path(device, &mut self.scratch.device_path) {
            Ok(len) => len,
            Err(err) => {
                warn!("could not resolve device path: {}", err);
                0
            }
        };
        let path = utf16_str(&self.scratch.device_path[..path_len]);

        if let Some(vp) = extract_vendor_product(&path) {
            identification.vendor_id = vp.vendor_id;
            identification.product_id = vp.product_id;
            is_xinput = vp.is_xinput;
        }

        match source.product_name(
            &self.scratch.device_path[..path_len],
            &mut self.scratch.product_name,
        ) {
            Ok(len) => {
                let name = utf16_str(&self.scratch.product_name[..len]);
                if !name.is_empty() {
                    identification.name = name;
                }
            }
            // Recoverable: plenty of devices refuse the open. Track them with
            // the default name.
            Err(err) => warn!("could not read product string: {}", err),
        }

        let capabilities = if is_xinput {
            xinput::capabilities()
        } else {
            match self.query_capabilities(source, device) {
                Ok(caps) => caps,
                Err(err) => {
                    warn!("could not resolve capabilities: {}", err);
                    Capabilities::default()
                }
            }
        };

        Arrival {
            identification,
            is_xinput,
            capabilities,
        }
    }

    fn query_capabilities<H: HidSource>(
        &mut self,
        source: &mut H,
        device: DeviceHandle,
    ) -> Result<Capabilities, QueryError> {
        let blob_len = source.preparsed_data(device, &mut self.scratch.preparsed)?;
        source.button_ranges(
            &self.scratch.preparsed[..blob_len],
            &mut self.scratch.button_caps,
        )?;
        source.value_ranges(
            &self.scratch.preparsed[..blob_len],
            &mut self.scratch.value_caps,
        )?;

        let mut caps = Capabilities::default();
        let buttons: usize = self.scratch.button_caps.iter().map(ButtonRange::count).sum();
        caps.button_count = buttons.min(MAX_BUTTONS) as u32;
        for index in 0..self.scratch.value_caps.len().min(AXIS_COUNT) {
            if let Some(axis) = Axis::from_usage_index(index) {
                caps.axes.insert(axis);
            }
        }
        Ok(caps)
    }

    /// Copies the raw report behind `token` into the scratch pool.
    pub fn fetch_report<H: HidSource>(
        &mut self,
        source: &mut H,
        token: ReportToken,
    ) -> Result<Option<InputReport>, QueryError> {
        source.fetch_report(token, &mut self.scratch.report)
    }

    /// Decodes a fetched report into a fresh state snapshot.
    ///
    /// Nothing is published from here; the caller writes the snapshot into the
    /// owning slot only on success, so a failing query leaves the previously
    /// observed state intact.
    pub fn decode_report<H: HidSource>(
        &mut self,
        source: &mut H,
        report: InputReport,
    ) -> Result<State, QueryError> {
        let blob_len = source.preparsed_data(report.device, &mut self.scratch.preparsed)?;

        let mut state = State {
            connected: true,
            ..State::default()
        };

        source.button_ranges(
            &self.scratch.preparsed[..blob_len],
            &mut self.scratch.button_caps,
        )?;
        let mut base = 0;
        for index in 0..self.scratch.button_caps.len() {
            let range = self.scratch.button_caps[index];
            ensure_len(&mut self.scratch.usages, range.count());
            let pressed = source.pressed_usages(
                &self.scratch.preparsed[..blob_len],
                range,
                &mut self.scratch.report[report.offset..report.offset + report.len],
                &mut self.scratch.usages[..range.count()],
            )?;

            // The pressed list is sparse and ascending, so one merge-style
            // pass against the dense button window is enough: a usage match
            // marks the button down and advances the sparse cursor.
            let pressed = &self.scratch.usages[..pressed];
            let mut cursor = 0;
            for offset_in_range in 0..range.count() {
                let button = base + offset_in_range;
                if button >= MAX_BUTTONS {
                    break;
                }
                // Usages are reported raw; UsageMin rebases them to zero.
                let down = cursor < pressed.len()
                    && usize::from(pressed[cursor].saturating_sub(range.usage_min))
                        == offset_in_range;
                state.buttons[button] = down;
                if down {
                    cursor += 1;
                }
            }
            base += range.count();
        }

        source.value_ranges(
            &self.scratch.preparsed[..blob_len],
            &mut self.scratch.value_caps,
        )?;
        for index in 0..self.scratch.value_caps.len().min(AXIS_COUNT) {
            let range = self.scratch.value_caps[index];
            let raw = source.usage_value(
                &self.scratch.preparsed[..blob_len],
                range,
                &mut self.scratch.report[report.offset..report.offset + report.len],
            )?;
            if let Some(axis) = Axis::from_usage_index(index) {
                state.axes[axis.to_index()] = normalize_value(raw, range);
            }
        }

        Ok(state)
    }
}

/// Maps a raw report value into `[-100, 100]` through the capability's
/// declared logical range.
///
/// The logical bounds carry no reliable sign; only the low `bit_size` bits
/// mean anything, so both bounds are masked before use. A degenerate range
/// maps everything to the neutral 0 instead of dividing by zero.
pub(crate) fn normalize_value(raw: u32, range: ValueRange) -> f32 {
    let mask = match 1u32.checked_shl(u32::from(range.bit_size)) {
        Some(bit) => bit - 1,
        None => u32::MAX,
    };
    let min = (range.logical_min as u32 & mask) as f32;
    let max = (range.logical_max as u32 & mask) as f32;
    if min == max {
        return 0.0;
    }
    -100.0 + (raw as f32 - min) * 200.0 / (max - min)
}

fn utf16_str(units: &[u16]) -> String {
    let nul = units.iter().position(|&c| c == 0).unwrap_or(units.len());
    String::from_utf16_lossy(&units[..nul])
}


#[cfg(test)]
mod tests {
    use super::testing::MockHid;
    use super::*;
    use crate::axis::Axis;

    fn range(bit_size: u16, logical_min: i32, logical_max: i32) -> ValueRange {
        ValueRange {
            usage_page: 0x01,
            usage: 0x30,
            bit_size,
            logical_min,
            logical_max,
        }
    }

    #[test]
    fn normalization_endpoints() {
        let caps = range(8, 0, 255);
        assert_eq!(normalize_value(0, caps), -100.0);
        assert_eq!(normalize_value(255, caps), 100.0);
        assert!(normalize_value(127, caps).abs() < 0.5);
        assert!(normalize_value(128, caps).abs() < 0.5);
    }

    #[test]
    fn normalization_degenerate_range_is_neutral() {
        let caps = range(8, 77, 77);
        assert_eq!(normalize_value(0, caps), 0.0);
        assert_eq!(normalize_value(255, caps), 0.0);
    }

    #[test]
    fn normalization_masks_sign_garbage() {
        // An 8-bit axis whose logical max reads back sign-extended: only the
        // low eight bits count, so the range is really 0..=255.
        let caps = range(8, 0, -1);
        assert_eq!(normalize_value(255, caps), 100.0);
        assert_eq!(normalize_value(0, caps), -100.0);
    }

    #[test]
    fn normalization_wide_bit_sizes() {
        let caps = range(32, 0, i32::MAX);
        assert_eq!(normalize_value(0, caps), -100.0);
        assert!((normalize_value(i32::MAX as u32, caps) - 100.0).abs() < f32::EPSILON);

        // Zero-width fields have no usable range at all.
        assert_eq!(normalize_value(12, range(0, 0, 255)), 0.0);
    }

    #[test]
    fn arrival_resolves_identity_and_capabilities() {
        let mut decoder = ReportDecoder::new();
        let mut hid = MockHid::new();

        let arrival = decoder.resolve_arrival(&mut hid, 0x10);
        assert!(!arrival.is_xinput);
        assert_eq!(arrival.identification.name, "Mock Pad");
        assert_eq!(arrival.identification.vendor_id, 0x046d);
        assert_eq!(arrival.identification.product_id, 0xc216);
        assert_eq!(arrival.capabilities.button_count, 5);
        assert!(arrival.capabilities.has_axis(Axis::X));
        assert!(arrival.capabilities.has_axis(Axis::Y));
        assert!(!arrival.capabilities.has_axis(Axis::Z));
    }

    #[test]
    fn arrival_survives_product_string_failure() {
        let mut decoder = ReportDecoder::new();
        let mut hid = MockHid::new();
        hid.fail = Some("product_name");

        let arrival = decoder.resolve_arrival(&mut hid, 0x10);
        assert_eq!(arrival.identification.name, "Unknown Joystick");
        // The path parse still goes through.
        assert_eq!(arrival.identification.vendor_id, 0x046d);
        assert_eq!(arrival.capabilities.button_count, 5);
    }

    #[test]
    fn arrival_classifies_xinput_devices() {
        let mut decoder = ReportDecoder::new();
        let mut hid = MockHid::new();
        hid.path = r"\\?\HID#VID_045E&PID_028E&IG_00#8&0&0000#{guid}".to_owned();

        let arrival = decoder.resolve_arrival(&mut hid, 0x10);
        assert!(arrival.is_xinput);
        assert_eq!(arrival.capabilities.button_count, 14);
        assert!(arrival.capabilities.has_axis(Axis::V));
        assert!(!arrival.capabilities.has_axis(Axis::PovX));
    }

    #[test]
    fn sparse_pressed_list_becomes_dense_buttons() {
        let mut decoder = ReportDecoder::new();
        let mut hid = MockHid::new();

        let report = decoder.fetch_report(&mut hid, 0x10).unwrap().unwrap();
        let state = decoder.decode_report(&mut hid, report).unwrap();
        assert!(state.connected);
        assert_eq!(
            &state.buttons[..5],
            &[false, true, false, true, false],
            "raw usages 2 and 4 with UsageMin 1 are buttons 1 and 3",
        );
        assert!(!state.buttons[5..].iter().any(|&b| b));
    }

    #[test]
    fn no_pressed_usages_clears_every_button() {
        let mut decoder = ReportDecoder::new();
        let mut hid = MockHid::new();
        hid.pressed.clear();

        let report = decoder.fetch_report(&mut hid, 0x10).unwrap().unwrap();
        let state = decoder.decode_report(&mut hid, report).unwrap();
        assert!(!state.buttons.iter().any(|&b| b));
    }

    #[test]
    fn button_ranges_stack_into_one_dense_window() {
        let mut decoder = ReportDecoder::new();
        let mut hid = MockHid::new();
        hid.button_caps = vec![
            ButtonRange {
                usage_page: 0x09,
                usage_min: 1,
                usage_max: 3,
            },
            ButtonRange {
                usage_page: 0x0c,
                usage_min: 1,
                usage_max: 2,
            },
        ];
        // First usage of the second page lands right after the first range.
        hid.pressed = vec![(0x09, 3), (0x0c, 1)];

        let report = decoder.fetch_report(&mut hid, 0x10).unwrap().unwrap();
        let state = decoder.decode_report(&mut hid, report).unwrap();
        assert_eq!(
            &state.buttons[..5],
            &[false, false, true, true, false],
        );
    }

    #[test]
    fn axis_values_land_in_usage_order() {
        let mut decoder = ReportDecoder::new();
        let mut hid = MockHid::new();
        hid.values = vec![255, 0];

        let report = decoder.fetch_report(&mut hid, 0x10).unwrap().unwrap();
        let state = decoder.decode_report(&mut hid, report).unwrap();
        assert_eq!(state.axis(Axis::X), 100.0);
        assert_eq!(state.axis(Axis::Y), -100.0);
        assert_eq!(state.axis(Axis::Z), 0.0);
    }

    #[test]
    fn decode_failure_propagates() {
        let mut decoder = ReportDecoder::new();
        let mut hid = MockHid::new();
        hid.fail = Some("usage_value");

        let report = decoder.fetch_report(&mut hid, 0x10).unwrap().unwrap();
        let err = decoder.decode_report(&mut hid, report).unwrap_err();
        assert_eq!(err, QueryError::new("usage_value", 0x1f));
    }
}
