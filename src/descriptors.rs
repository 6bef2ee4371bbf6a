// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Who we tell the host we are.
//!
//! One configuration, one HID interface, one interrupt IN endpoint carrying
//! the two-byte button report. The IDs are the V-USB shared pair for HID
//! devices, which host software already knows to treat as "some hobbyist
//! gamepad" and match by product string.

use crate::error::{Error, Result};
use crate::hid::REPORT_DESCRIPTOR_LEN;
use crate::usb::{
    le16, UsbConfigurationDescriptor, UsbDescType, UsbDeviceDescriptor, UsbDir,
    UsbEndpointDescriptor, UsbHidDescriptor, UsbInterfaceDescriptor, UsbTransferType,
};

use zerocopy::AsBytes;

pub const VENDOR_ID: u16 = 0x16C0;
pub const PRODUCT_ID: u16 = 0x27DC;

/// Largest control transfer we'll assemble, and EP0's packet size.
pub const EP0_MAX_PACKET: usize = 64;

/// Address of the interrupt endpoint the reports go out on.
pub const REPORT_EP_ADDR: u8 = UsbDir::In.endpoint(1);
pub const REPORT_EP_MAX_PACKET: u16 = 8;
/// Host polling interval for the report endpoint, ms.
pub const REPORT_EP_INTERVAL: u8 = 10;

const CONFIG_TOTAL_LENGTH: usize = core::mem::size_of::<UsbConfigurationDescriptor>()
    + core::mem::size_of::<UsbInterfaceDescriptor>()
    + core::mem::size_of::<UsbHidDescriptor>()
    + core::mem::size_of::<UsbEndpointDescriptor>();

pub static DEVICE_DESCRIPTOR: UsbDeviceDescriptor = UsbDeviceDescriptor {
    length: core::mem::size_of::<UsbDeviceDescriptor>() as u8,
    descriptor_type: UsbDescType::Device,
    bcd_usb: le16(0x0110),
    device_class: 0,
    device_subclass: 0,
    device_protocol: 0,
    max_packet_size0: EP0_MAX_PACKET as u8,
    vendor: le16(VENDOR_ID),
    product: le16(PRODUCT_ID),
    bcd_device: le16(0x0100),
    manufacturer_s: 1,
    product_s: 2,
    serial_s: 0,
    num_configurations: 1,
};

pub static CONFIG_DESCRIPTOR: UsbConfigurationDescriptor = UsbConfigurationDescriptor {
    length: core::mem::size_of::<UsbConfigurationDescriptor>() as u8,
    descriptor_type: UsbDescType::Config,
    total_length: le16(CONFIG_TOTAL_LENGTH as u16),
    num_interfaces: 1,
    configuration_value: 1,
    configuration_s: 0,
    // Bus powered.
    attributes: 0x80,
    // 100mA. The pad itself draws a few mA.
    max_power: 50,
};

pub static INTERFACE_DESCRIPTOR: UsbInterfaceDescriptor = UsbInterfaceDescriptor {
    length: core::mem::size_of::<UsbInterfaceDescriptor>() as u8,
    descriptor_type: UsbDescType::Interface,
    interface_number: 0,
    alternate_setting: 0,
    num_endpoints: 1,
    // HID, no boot subclass, no boot protocol.
    interface_class: 0x03,
    interface_subclass: 0,
    interface_protocol: 0,
    interface_s: 0,
};

pub static HID_DESCRIPTOR: UsbHidDescriptor = UsbHidDescriptor {
    length: core::mem::size_of::<UsbHidDescriptor>() as u8,
    descriptor_type: UsbDescType::Hid,
    bcd_hid: le16(0x0101),
    country_code: 0,
    num_descriptors: 1,
    class_descriptor_type: UsbDescType::Report,
    class_descriptor_length: le16(REPORT_DESCRIPTOR_LEN as u16),
};

pub static REPORT_EP_DESCRIPTOR: UsbEndpointDescriptor = UsbEndpointDescriptor {
    length: core::mem::size_of::<UsbEndpointDescriptor>() as u8,
    descriptor_type: UsbDescType::Endpoint,
    endpoint_address: REPORT_EP_ADDR,
    attributes: UsbTransferType::Interrupt as u8,
    max_packet_size: le16(REPORT_EP_MAX_PACKET),
    interval: REPORT_EP_INTERVAL,
};

/// String descriptor zero: the list of supported languages (just en-US).
pub static LANG_DESCRIPTOR: &[u8] = &[4, 0x03, 0x09, 0x04];

/// UTF-16LE, indexed from 1 (index 0 is `LANG_DESCRIPTOR`).
pub static DESCRIPTOR_STRINGS: &[&[u8]] = &[
    b"s\0n\0e\0s\0-\0u\0s\0b\0",
    b"S\0N\0E\0S\0 \0G\0a\0m\0e\0p\0a\0d\0",
];

/// Composes the configuration descriptor with everything hanging off it, the
/// way hosts ask for it. The transport trims it to whatever the host asked
/// for, which is often just the first nine bytes.
pub fn configuration(tmp: &mut [u8; EP0_MAX_PACKET]) -> &[u8] {
    let mut used = 0;
    for part in [
        CONFIG_DESCRIPTOR.as_bytes(),
        INTERFACE_DESCRIPTOR.as_bytes(),
        HID_DESCRIPTOR.as_bytes(),
        REPORT_EP_DESCRIPTOR.as_bytes(),
    ] {
        tmp[used..used + part.len()].copy_from_slice(part);
        used += part.len();
    }
    &tmp[..used]
}

/// Builds string descriptor `index` in `tmp`.
pub fn string(index: u8, tmp: &mut [u8; EP0_MAX_PACKET]) -> Result<&[u8]> {
    if index == 0 {
        return Ok(LANG_DESCRIPTOR);
    }
    let s = DESCRIPTOR_STRINGS
        .get(usize::from(index) - 1)
        .ok_or(Error::UnknownString { index })?;
    let len = 2 + s.len();
    tmp[0] = len as u8;
    tmp[1] = UsbDescType::String as u8;
    tmp[2..len].copy_from_slice(s);
    Ok(&tmp[..len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_bundle_matches_total_length() {
        let mut tmp = [0; EP0_MAX_PACKET];
        let bundle = configuration(&mut tmp);
        assert_eq!(bundle.len(), 9 + 9 + 9 + 7);
        assert_eq!(usize::from(u16::from_le_bytes([bundle[2], bundle[3]])), bundle.len());
        // Interface, HID, endpoint, in that order.
        assert_eq!(bundle[9 + 1], UsbDescType::Interface as u8);
        assert_eq!(bundle[18 + 1], UsbDescType::Hid as u8);
        assert_eq!(bundle[27 + 1], UsbDescType::Endpoint as u8);
        assert_eq!(bundle[27 + 2], 0x81);
        assert_eq!(bundle[27 + 3], 0x03);
    }

    #[test]
    fn hid_descriptor_points_at_report_descriptor() {
        let bytes = HID_DESCRIPTOR.as_bytes();
        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[6], 0x22);
        assert_eq!(u16::from_le_bytes([bytes[7], bytes[8]]), 27);
    }

    #[test]
    fn device_descriptor_layout() {
        let bytes = DEVICE_DESCRIPTOR.as_bytes();
        assert_eq!(bytes.len(), 18);
        assert_eq!(bytes[0], 18);
        assert_eq!(&bytes[8..12], &[0xC0, 0x16, 0xDC, 0x27]);
    }

    #[test]
    fn strings() {
        let mut tmp = [0; EP0_MAX_PACKET];
        assert_eq!(string(0, &mut tmp).unwrap(), LANG_DESCRIPTOR);
        let product = string(2, &mut tmp).unwrap();
        assert_eq!(product[0] as usize, product.len());
        assert_eq!(product[1], 0x03);
        assert_eq!(&product[2..6], b"S\0N\0");
        assert_eq!(string(3, &mut tmp), Err(Error::UnknownString { index: 3 }));
    }
}
