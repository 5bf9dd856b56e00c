// Copyright 2026 The winjoy Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! [`HidSource`] over Raw Input and the HID parser.
//!
//! Every query either fills a caller-provided buffer through the two-call
//! size-then-fetch pattern or reads the opaque preparsed blob through the
//! `HidP_*` accessors. Failures map to [`QueryError`] with the name of the
//! losing call and `GetLastError` or its `NTSTATUS`.

use std::mem;
use std::ptr;

use windows_sys::Win32::Devices::HumanInterfaceDevice::{
    HidD_GetProductString, HidP_GetButtonCaps, HidP_GetCaps, HidP_GetUsageValue, HidP_GetUsages,
    HidP_GetValueCaps, HidP_Input, HIDP_BUTTON_CAPS, HIDP_CAPS, HIDP_STATUS_SUCCESS,
    HIDP_VALUE_CAPS, PHIDP_PREPARSED_DATA,
};
use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows_sys::Win32::UI::Input::{
    GetRawInputData, GetRawInputDeviceInfoW, HRAWINPUT, RAWHID, RAWINPUT, RAWINPUTHEADER,
    RIDI_DEVICENAME, RIDI_PREPARSEDDATA, RID_INPUT, RIM_TYPEHID,
};

use crate::hid::{ButtonRange, HidSource, InputReport, QueryError, ReportToken, ValueRange};
use crate::scratch::{ensure_len, two_call_query};
use crate::slot::DeviceHandle;

/// Initial entry count of the raw capability arrays; only a device with more
/// capability entries than this grows them.
const INITIAL_CAPS: usize = 16;

fn last_error(call: &'static str) -> QueryError {
    QueryError::new(call, unsafe { GetLastError() })
}

/// Picks the newest complete report in a raw input message.
///
/// Windows coalesces undelivered reports into one message as `dwCount`
/// strides of `dwSizeHid` bytes. The `HidP_*` parsers take a single report,
/// and the strides are in arrival order, so the window is the last stride
/// that fits in the `written` bytes.
fn newest_report(
    written: usize,
    payload: usize,
    size: usize,
    count: usize,
) -> Option<(usize, usize)> {
    if size == 0 {
        return None;
    }
    let complete = written.saturating_sub(payload) / size;
    let index = complete.min(count).checked_sub(1)?;
    Some((payload + index * size, size))
}

/// The real Raw Input implementation.
///
/// Keeps its own buffers for the raw `HIDP_*_CAPS` arrays; the portable
/// [`ButtonRange`]/[`ValueRange`] views land in the shared scratch pool.
pub(crate) struct RawInputSource {
    button_caps_raw: Vec<HIDP_BUTTON_CAPS>,
    value_caps_raw: Vec<HIDP_VALUE_CAPS>,
}

impl RawInputSource {
    pub fn new() -> Self {
        RawInputSource {
            button_caps_raw: vec![unsafe { mem::zeroed() }; INITIAL_CAPS],
            value_caps_raw: vec![unsafe { mem::zeroed() }; INITIAL_CAPS],
        }
    }

    fn parser_caps(&self, preparsed: &[u8]) -> Result<HIDP_CAPS, QueryError> {
        let ppd = preparsed.as_ptr() as PHIDP_PREPARSED_DATA;
        let mut caps: HIDP_CAPS = unsafe { mem::zeroed() };
        let status = unsafe { HidP_GetCaps(ppd, &mut caps) };
        if status != HIDP_STATUS_SUCCESS {
            return Err(QueryError::new("HidP_GetCaps", status as u32));
        }
        Ok(caps)
    }
}

impl HidSource for RawInputSource {
    fn device_path(
        &mut self,
        device: DeviceHandle,
        buf: &mut Vec<u16>,
    ) -> Result<usize, QueryError> {
        // Size and data are counted in UTF-16 units for RIDI_DEVICENAME.
        two_call_query(buf, |chunk| unsafe {
            match chunk {
                None => {
                    let mut size = 0u32;
                    let result = GetRawInputDeviceInfoW(
                        device as HANDLE,
                        RIDI_DEVICENAME,
                        ptr::null_mut(),
                        &mut size,
                    );
                    if result == u32::MAX {
                        return Err(last_error("GetRawInputDeviceInfoW"));
                    }
                    Ok(size as usize)
                }
                Some(chunk) => {
                    let mut size = chunk.len() as u32;
                    let written = GetRawInputDeviceInfoW(
                        device as HANDLE,
                        RIDI_DEVICENAME,
                        chunk.as_mut_ptr().cast(),
                        &mut size,
                    );
                    if written == u32::MAX {
                        return Err(last_error("GetRawInputDeviceInfoW"));
                    }
                    Ok(written as usize)
                }
            }
        })
    }

    fn product_name(&mut self, path: &[u16], buf: &mut Vec<u16>) -> Result<usize, QueryError> {
        let mut wide = path.to_vec();
        if wide.last() != Some(&0) {
            wide.push(0);
        }

        // Zero desired access is enough for the string query and also works
        // on devices that refuse read access.
        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                0,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                ptr::null(),
                OPEN_EXISTING,
                0,
                ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(last_error("CreateFileW"));
        }

        ensure_len(buf, 256);
        let ok = unsafe {
            HidD_GetProductString(
                handle,
                buf.as_mut_ptr().cast(),
                (buf.len() * mem::size_of::<u16>()) as u32,
            )
        };
        let result = if ok == 0 {
            Err(last_error("HidD_GetProductString"))
        } else {
            Ok(buf.iter().position(|&c| c == 0).unwrap_or(buf.len()))
        };
        unsafe { CloseHandle(handle) };
        result
    }

    fn fetch_report(
        &mut self,
        token: ReportToken,
        buf: &mut Vec<u8>,
    ) -> Result<Option<InputReport>, QueryError> {
        let header_size = mem::size_of::<RAWINPUTHEADER>() as u32;
        let written = two_call_query(buf, |chunk| unsafe {
            match chunk {
                None => {
                    let mut size = 0u32;
                    let result = GetRawInputData(
                        token as HRAWINPUT,
                        RID_INPUT,
                        ptr::null_mut(),
                        &mut size,
                        header_size,
                    );
                    if result == u32::MAX {
                        return Err(last_error("GetRawInputData"));
                    }
                    Ok(size as usize)
                }
                Some(chunk) => {
                    let mut size = chunk.len() as u32;
                    let written = GetRawInputData(
                        token as HRAWINPUT,
                        RID_INPUT,
                        chunk.as_mut_ptr().cast(),
                        &mut size,
                        header_size,
                    );
                    if written == u32::MAX {
                        return Err(last_error("GetRawInputData"));
                    }
                    Ok(written as usize)
                }
            }
        })?;

        // The buffer is byte-aligned, so the header has to be read unaligned.
        if written < mem::size_of::<RAWINPUTHEADER>() {
            return Ok(None);
        }
        let header = unsafe { ptr::read_unaligned(buf.as_ptr() as *const RAWINPUTHEADER) };
        if header.dwType != RIM_TYPEHID {
            return Ok(None);
        }

        let data_offset = mem::offset_of!(RAWINPUT, data);
        if written < data_offset + mem::size_of::<RAWHID>() {
            return Ok(None);
        }
        let hid = unsafe { ptr::read_unaligned(buf.as_ptr().add(data_offset) as *const RAWHID) };
        let payload = data_offset + mem::offset_of!(RAWHID, bRawData);
        let Some((offset, len)) =
            newest_report(written, payload, hid.dwSizeHid as usize, hid.dwCount as usize)
        else {
            return Ok(None);
        };
        Ok(Some(InputReport {
            device: header.hDevice as DeviceHandle,
            offset,
            len,
        }))
    }

    fn preparsed_data(
        &mut self,
        device: DeviceHandle,
        buf: &mut Vec<u8>,
    ) -> Result<usize, QueryError> {
        two_call_query(buf, |chunk| unsafe {
            match chunk {
                None => {
                    let mut size = 0u32;
                    let result = GetRawInputDeviceInfoW(
                        device as HANDLE,
                        RIDI_PREPARSEDDATA,
                        ptr::null_mut(),
                        &mut size,
                    );
                    if result == u32::MAX {
                        return Err(last_error("GetRawInputDeviceInfoW"));
                    }
                    Ok(size as usize)
                }
                Some(chunk) => {
                    let mut size = chunk.len() as u32;
                    let written = GetRawInputDeviceInfoW(
                        device as HANDLE,
                        RIDI_PREPARSEDDATA,
                        chunk.as_mut_ptr().cast(),
                        &mut size,
                    );
                    if written == u32::MAX {
                        return Err(last_error("GetRawInputDeviceInfoW"));
                    }
                    Ok(written as usize)
                }
            }
        })
    }

    fn button_ranges(
        &mut self,
        preparsed: &[u8],
        out: &mut Vec<ButtonRange>,
    ) -> Result<(), QueryError> {
        let caps = self.parser_caps(preparsed)?;
        out.clear();
        let mut len = caps.NumberInputButtonCaps;
        if len == 0 {
            return Ok(());
        }
        if self.button_caps_raw.len() < len as usize {
            self.button_caps_raw
                .resize(len as usize, unsafe { mem::zeroed() });
        }

        let ppd = preparsed.as_ptr() as PHIDP_PREPARSED_DATA;
        let status = unsafe {
            HidP_GetButtonCaps(HidP_Input, self.button_caps_raw.as_mut_ptr(), &mut len, ppd)
        };
        if status != HIDP_STATUS_SUCCESS {
            return Err(QueryError::new("HidP_GetButtonCaps", status as u32));
        }

        for raw in &self.button_caps_raw[..len as usize] {
            out.push(unsafe {
                if raw.IsRange != 0 {
                    ButtonRange {
                        usage_page: raw.UsagePage,
                        usage_min: raw.Anonymous.Range.UsageMin,
                        usage_max: raw.Anonymous.Range.UsageMax,
                    }
                } else {
                    ButtonRange {
                        usage_page: raw.UsagePage,
                        usage_min: raw.Anonymous.NotRange.Usage,
                        usage_max: raw.Anonymous.NotRange.Usage,
                    }
                }
            });
        }
        Ok(())
    }

    fn value_ranges(
        &mut self,
        preparsed: &[u8],
        out: &mut Vec<ValueRange>,
    ) -> Result<(), QueryError> {
        let caps = self.parser_caps(preparsed)?;
        out.clear();
        let mut len = caps.NumberInputValueCaps;
        if len == 0 {
            return Ok(());
        }
        if self.value_caps_raw.len() < len as usize {
            self.value_caps_raw
                .resize(len as usize, unsafe { mem::zeroed() });
        }

        let ppd = preparsed.as_ptr() as PHIDP_PREPARSED_DATA;
        let status = unsafe {
            HidP_GetValueCaps(HidP_Input, self.value_caps_raw.as_mut_ptr(), &mut len, ppd)
        };
        if status != HIDP_STATUS_SUCCESS {
            return Err(QueryError::new("HidP_GetValueCaps", status as u32));
        }

        for raw in &self.value_caps_raw[..len as usize] {
            let usage = unsafe {
                if raw.IsRange != 0 {
                    raw.Anonymous.Range.UsageMin
                } else {
                    raw.Anonymous.NotRange.Usage
                }
            };
            out.push(ValueRange {
                usage_page: raw.UsagePage,
                usage,
                bit_size: raw.BitSize,
                logical_min: raw.LogicalMin,
                logical_max: raw.LogicalMax,
            });
        }
        Ok(())
    }

    fn pressed_usages(
        &mut self,
        preparsed: &[u8],
        range: ButtonRange,
        report: &mut [u8],
        usages: &mut [u16],
    ) -> Result<usize, QueryError> {
        let ppd = preparsed.as_ptr() as PHIDP_PREPARSED_DATA;
        let mut len = usages.len() as u32;
        let status = unsafe {
            HidP_GetUsages(
                HidP_Input,
                range.usage_page,
                0,
                usages.as_mut_ptr(),
                &mut len,
                ppd,
                report.as_mut_ptr(),
                report.len() as u32,
            )
        };
        if status != HIDP_STATUS_SUCCESS {
            return Err(QueryError::new("HidP_GetUsages", status as u32));
        }
        Ok(len as usize)
    }

    fn usage_value(
        &mut self,
        preparsed: &[u8],
        range: ValueRange,
        report: &mut [u8],
    ) -> Result<u32, QueryError> {
        let ppd = preparsed.as_ptr() as PHIDP_PREPARSED_DATA;
        let mut value = 0u32;
        let status = unsafe {
            HidP_GetUsageValue(
                HidP_Input,
                range.usage_page,
                0,
                range.usage,
                &mut value,
                ppd,
                report.as_mut_ptr(),
                report.len() as u32,
            )
        };
        if status != HIDP_STATUS_SUCCESS {
            return Err(QueryError::new("HidP_GetUsageValue", status as u32));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_report_spans_its_own_bytes() {
        assert_eq!(newest_report(24 + 6, 24, 6, 1), Some((24, 6)));
    }

    #[test]
    fn coalesced_message_yields_one_stride() {
        // Three 6-byte strides arrived at once; the window is the last one
        // and exactly one report long.
        assert_eq!(newest_report(24 + 18, 24, 6, 3), Some((24 + 12, 6)));
    }

    #[test]
    fn partial_strides_are_dropped() {
        assert_eq!(newest_report(24 + 13, 24, 6, 3), Some((24 + 6, 6)));
        assert_eq!(newest_report(24 + 5, 24, 6, 1), None);
    }

    #[test]
    fn empty_messages_are_rejected() {
        assert_eq!(newest_report(24, 24, 0, 1), None);
        assert_eq!(newest_report(24 + 6, 24, 6, 0), None);
    }

    #[test]
    fn caps_arrays_are_presized() {
        let source = RawInputSource::new();
        assert_eq!(source.button_caps_raw.len(), INITIAL_CAPS);
        assert_eq!(source.value_caps_raw.len(), INITIAL_CAPS);
    }
}
