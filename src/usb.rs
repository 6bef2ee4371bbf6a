// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! USB structure and constant definitions.
//!
//! Everything in here is a byte-exact mirror of something that goes over the
//! wire, so the structs are `repr(C)`, contain only single-byte-aligned
//! fields, and derive `zerocopy` traits so we can send them with `as_bytes()`
//! instead of hand-packing arrays.

use byteorder::LittleEndian;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned, U16};

use crate::error::{Error, Result};

/// Shorthand for building little-endian `U16`s in `const` context.
pub const fn le16(v: u16) -> U16<LittleEndian> {
    U16::from_bytes(v.to_le_bytes())
}

/// USB deals in two different transfer directions, called OUT (host-to-device)
/// and IN (device-to-host). In the vast majority of cases, OUT is represented
/// by a 0 byte, and IN by an `0x80` byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbDir {
    Out = 0,
    In = 0x80,
}

impl UsbDir {
    pub const fn endpoint(self, num: u8) -> u8 {
        num | self as u8
    }

    /// Works on both endpoint addresses and `bmRequestType`, since both keep
    /// the direction in bit 7.
    pub const fn of_endpoint_addr(addr: u8) -> Self {
        if addr & Self::In as u8 != 0 {
            Self::In
        } else {
            Self::Out
        }
    }
}

/// Bits 6:5 of `bmRequestType`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbRequestKind {
    Standard = 0,
    Class = 1,
    Vendor = 2,
}

/// Bits 4:0 of `bmRequestType`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbRecipient {
    Device = 0,
    Interface = 1,
    Endpoint = 2,
    Other = 3,
}

/// Layout of an 8-byte USB SETUP packet.
#[repr(C)]
#[derive(Debug, AsBytes, FromBytes, Unaligned)]
pub struct UsbSetupPacket {
    /// Request type: direction in bit 7, kind (standard / class / vendor) in
    /// bits 6:5, recipient in the bottom five bits.
    pub request_type: u8,
    /// Request. Standard setup requests are in the `UsbSetupRequest` enum,
    /// HID class requests in `hid::HidRequest`.
    pub request: u8,
    /// A simple argument of up to 16 bits, specific to the request.
    pub value: U16<LittleEndian>,
    /// Interface or endpoint number, for requests that target one.
    pub index: U16<LittleEndian>,
    /// If data will be transferred after this request (in the direction given
    /// by `request_type`), this gives the number of bytes (OUT) or maximum
    /// number of bytes (IN).
    pub length: U16<LittleEndian>,
}

impl UsbSetupPacket {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    pub const fn new(request_type: u8, request: u8, value: u16, index: u16, length: u16) -> Self {
        Self {
            request_type,
            request,
            value: le16(value),
            index: le16(index),
            length: le16(length),
        }
    }

    /// Reinterprets raw bytes copied out of the setup buffer.
    pub fn parse(bytes: &[u8]) -> Result<&Self> {
        LayoutVerified::<_, Self>::new_unaligned(bytes)
            .map(|lv| lv.into_ref())
            .ok_or(Error::ShortSetupPacket { len: bytes.len() })
    }

    pub fn direction(&self) -> UsbDir {
        UsbDir::of_endpoint_addr(self.request_type)
    }

    pub fn kind(&self) -> Option<UsbRequestKind> {
        UsbRequestKind::from_u8((self.request_type >> 5) & 0b11)
    }

    pub fn recipient(&self) -> Option<UsbRecipient> {
        UsbRecipient::from_u8(self.request_type & 0x1F)
    }

    /// High byte of `value`. Descriptor type for GET_DESCRIPTOR, the idle
    /// duration for SET_IDLE, report type for GET_REPORT.
    pub fn value_high(&self) -> u8 {
        (self.value.get() >> 8) as u8
    }

    pub fn value_low(&self) -> u8 {
        self.value.get() as u8
    }
}

/// The standard USB SETUP requests that we understand.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbSetupRequest {
    /// Asks the device to send a certain descriptor back to the host. Always
    /// used on an IN request.
    GetDescriptor = 0x06,
    /// Notifies the device that it's being moved to a different address on the
    /// bus. Always an OUT.
    SetAddress = 0x05,
    /// Configures a device by choosing one of the options listed in its
    /// descriptors. Always an OUT.
    SetConfiguration = 0x09,
}

/// Describes a device. This is the most broad description in USB and is
/// typically the first thing the host asks for.
#[repr(C)]
#[derive(Debug, AsBytes)]
pub struct UsbDeviceDescriptor {
    /// Length of this structure, must be 18.
    pub length: u8,
    /// Type of this descriptor, must be `Device`.
    pub descriptor_type: UsbDescType,
    /// Version of the device descriptor / USB protocol, in binary-coded
    /// decimal. This is typically `0x01_10` for USB 1.1.
    pub bcd_usb: U16<LittleEndian>,
    /// Class of device, giving a broad functional area. Zero means "look at
    /// the interfaces", which is how HID devices do it.
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    /// Maximum packet size on EP0.
    pub max_packet_size0: u8,
    pub vendor: U16<LittleEndian>,
    pub product: U16<LittleEndian>,
    /// Device version number, as BCD again.
    pub bcd_device: U16<LittleEndian>,
    /// Indices into the string descriptor table; zero means "none".
    pub manufacturer_s: u8,
    pub product_s: u8,
    pub serial_s: u8,
    pub num_configurations: u8,
}

/// Description of a single available device configuration.
#[repr(C)]
#[derive(Debug, AsBytes)]
pub struct UsbConfigurationDescriptor {
    /// Length of this structure, must be 9.
    pub length: u8,
    /// Type of this descriptor, must be `Config`.
    pub descriptor_type: UsbDescType,
    /// Total length of all descriptors in this configuration, concatenated.
    /// For us that's config + interface + HID + one endpoint.
    pub total_length: U16<LittleEndian>,
    pub num_interfaces: u8,
    /// Number to use when requesting this configuration via a
    /// `SetConfiguration` request.
    pub configuration_value: u8,
    pub configuration_s: u8,
    /// Bit set of device attributes:
    ///
    /// - Bit 7 should be set (indicates that device can be bus powered in USB
    /// 1.0).
    /// - Bit 6 indicates that the device can be self-powered.
    /// - Bit 5 indicates that the device can signal remote wakeup of the host.
    /// - The rest are reserved and should be zero.
    pub attributes: u8,
    /// Maximum device power consumption in units of 2mA.
    pub max_power: u8,
}

/// Description of an interface within a configuration.
#[repr(C)]
#[derive(Debug, AsBytes)]
pub struct UsbInterfaceDescriptor {
    /// Length of this structure, must be 9.
    pub length: u8,
    /// Type of this descriptor, must be `Interface`.
    pub descriptor_type: UsbDescType,
    pub interface_number: u8,
    pub alternate_setting: u8,
    /// Number of endpoint descriptors in this interface, not counting EP0.
    pub num_endpoints: u8,
    pub interface_class: u8,
    pub interface_subclass: u8,
    pub interface_protocol: u8,
    pub interface_s: u8,
}

/// HID class descriptor. Sits between the interface descriptor and its
/// endpoints, and tells the host how long the report descriptor is.
#[repr(C)]
#[derive(Debug, AsBytes)]
pub struct UsbHidDescriptor {
    /// Length of this structure, must be 9 (with one class descriptor).
    pub length: u8,
    /// Type of this descriptor, must be `Hid`.
    pub descriptor_type: UsbDescType,
    /// HID spec release, BCD.
    pub bcd_hid: U16<LittleEndian>,
    pub country_code: u8,
    pub num_descriptors: u8,
    /// Type of the class descriptor that follows, `Report` for us.
    pub class_descriptor_type: UsbDescType,
    pub class_descriptor_length: U16<LittleEndian>,
}

/// Describes an endpoint within an interface.
#[repr(C)]
#[derive(Debug, AsBytes)]
pub struct UsbEndpointDescriptor {
    /// Length of this struct, must be 7.
    pub length: u8,
    /// Type of this descriptor, must be `Endpoint`.
    pub descriptor_type: UsbDescType,
    /// Address of this endpoint, where the bottom 4 bits give the endpoint
    /// number (0..15) and the top bit distinguishes IN (1) from OUT (0).
    pub endpoint_address: u8,
    /// Endpoint attributes; the most relevant part is the bottom 2 bits, which
    /// control the transfer type using the values from `UsbTransferType`.
    pub attributes: u8,
    /// Maximum packet size this endpoint can accept/produce.
    pub max_packet_size: U16<LittleEndian>,
    /// Polling interval for interrupt endpoints, in milliseconds.
    pub interval: u8,
}

/// Types of USB descriptor, including the two HID class ones.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, AsBytes)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum UsbDescType {
    Device = 0x01,
    Config = 0x02,
    String = 0x03,
    Interface = 0x04,
    Endpoint = 0x05,
    Hid = 0x21,
    Report = 0x22,
}

/// Types of transfer that can be indicated by the `attributes` field on
/// `UsbEndpointDescriptor`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, AsBytes)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum UsbTransferType {
    Control = 0,
    Bulk = 2,
    Interrupt = 3,
}
