// Copyright 2026 The winjoy Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use log::warn;
use uuid::Uuid;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Linux input bustype for USB, used in SDL-compatible GUIDs.
const BUS_USB: u32 = 0x03;

/// Identity of a connected joystick.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Identification {
    /// Human-readable product name reported by the device.
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
}

impl Identification {
    /// Returns the SDL-compatible GUID for this device.
    ///
    /// The hardware version field is always zero; Raw Input device paths do
    /// not carry one.
    pub fn uuid(&self) -> Uuid {
        create_uuid(BUS_USB, self.vendor_id, self.product_id, 0)
    }
}

impl Default for Identification {
    fn default() -> Self {
        Identification {
            name: "Unknown Joystick".to_owned(),
            vendor_id: 0,
            product_id: 0,
        }
    }
}

fn create_uuid(bustype: u32, vendor: u16, product: u16, version: u16) -> Uuid {
    let bus = bustype.to_be();
    let vendor = vendor.to_be();
    let product = product.to_be();
    let version = version.to_be();
    Uuid::from_fields(
        bus,
        vendor,
        0,
        &[
            (product >> 8) as u8,
            product as u8,
            0,
            0,
            (version >> 8) as u8,
            version as u8,
            0,
            0,
        ],
    )
}

/// Vendor/product ids parsed from a device interface path, plus whether the
/// path carries the `IG_` marker that tags XInput-backed interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VendorProduct {
    pub vendor_id: u16,
    pub product_id: u16,
    pub is_xinput: bool,
}

/// Parses `VID_xxxx` and `PID_xxxx` out of a device interface path.
///
/// Both markers must be present and followed by exactly four hex digits;
/// anything else yields `None`. Missing markers are silent (plenty of HID
/// paths legitimately have none), a malformed field is logged.
pub(crate) fn extract_vendor_product(path: &str) -> Option<VendorProduct> {
    let vendor_id = parse_marker_field(path, "VID_")?;
    let product_id = parse_marker_field(path, "PID_")?;
    Some(VendorProduct {
        vendor_id,
        product_id,
        is_xinput: path.contains("IG_"),
    })
}

fn parse_marker_field(path: &str, marker: &str) -> Option<u16> {
    let start = path.find(marker)? + marker.len();
    let field = path.get(start..start + 4)?;
    if !field.bytes().all(|b| b.is_ascii_hexdigit()) {
        warn!("failed to parse {}{} as hex", marker, field);
        return None;
    }
    u16::from_str_radix(field, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn vid_pid_round_trip() {
        let path = r"\\?\HID#VID_1234&PID_5678#8&2d9c4c1&0&0000#{guid}";
        let vp = extract_vendor_product(path).unwrap();
        assert_eq!(vp.vendor_id, 0x1234);
        assert_eq!(vp.product_id, 0x5678);
        assert!(!vp.is_xinput);
    }

    #[test]
    fn missing_markers() {
        assert_eq!(extract_vendor_product(r"\\?\HID#PID_5678#"), None);
        assert_eq!(extract_vendor_product(r"\\?\HID#VID_1234#"), None);
        assert_eq!(extract_vendor_product(""), None);
    }

    #[test]
    fn truncated_field() {
        assert_eq!(extract_vendor_product(r"\\?\HID#VID_12"), None);
        assert_eq!(extract_vendor_product(r"\\?\HID#VID_1234&PID_56"), None);
    }

    #[test]
    fn non_hex_field() {
        assert_eq!(extract_vendor_product(r"\\?\HID#VID_12G4&PID_5678#"), None);
        assert_eq!(extract_vendor_product(r"\\?\HID#VID_1234&PID_+678#"), None);
    }

    #[test]
    fn xinput_marker_anywhere() {
        let mid = r"\\?\HID#VID_045E&PID_028E&IG_00#8&0&0000#{guid}";
        assert!(extract_vendor_product(mid).unwrap().is_xinput);

        let end = r"\\?\HID#VID_045E&PID_028E#8&0&0000#IG_01";
        assert!(extract_vendor_product(end).unwrap().is_xinput);
    }

    #[test]
    fn sdl_uuid() {
        let x = Uuid::parse_str("030000005e0400008e02000020200000").unwrap();
        let y = create_uuid(0x3, 0x045e, 0x028e, 0x2020);
        assert_eq!(x, y);
    }

    #[test]
    fn default_identification() {
        let id = Identification::default();
        assert_eq!(id.name, "Unknown Joystick");
        assert_eq!(id.vendor_id, 0);
        assert_eq!(id.product_id, 0);
    }
}
