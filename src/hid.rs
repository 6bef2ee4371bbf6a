// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HID side of the gamepad: the report layout, the report descriptor that
//! tells the host about it, and the class requests the host can make
//! against the live state.

use byteorder::LittleEndian;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use zerocopy::{AsBytes, FromBytes, Unaligned, U16};

use crate::controller::ButtonState;
use crate::transport::ClassHandler;
use crate::usb::{le16, UsbRequestKind, UsbSetupPacket};

pub const REPORT_DESCRIPTOR_LEN: usize = 27;

/// Report descriptor: twelve one-bit buttons plus four bits of padding, so
/// the report is exactly two bytes. Host-side drivers have seen this exact
/// layout for years; don't touch it.
pub static REPORT_DESCRIPTOR: [u8; REPORT_DESCRIPTOR_LEN] = [
    0x05, 0x01, // USAGE_PAGE (Generic Desktop)
    0x09, 0x04, // USAGE (Gamepad)
    0xA1, 0x01, // COLLECTION (Application)
    0x05, 0x09, //   USAGE_PAGE (Button)
    0x19, 0x01, //   USAGE_MINIMUM (Button 1)
    0x29, 0x0C, //   USAGE_MAXIMUM (Button 12)
    0x15, 0x00, //   LOGICAL_MINIMUM (0)
    0x25, 0x01, //   LOGICAL_MAXIMUM (1)
    0x95, 0x0C, //   REPORT_COUNT (12)
    0x75, 0x01, //   REPORT_SIZE (1)
    0x81, 0x02, //   INPUT (Data,Var,Abs)
    0x95, 0x04, //   REPORT_COUNT (4)
    0x81, 0x03, //   INPUT (Cnst,Var,Abs)
    0xC0,       // END_COLLECTION
];

/// HID class-specific requests. We answer the first three; the rest are
/// listed so they show up by name in logs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidRequest {
    GetReport = 0x01,
    GetIdle = 0x02,
    GetProtocol = 0x03,
    SetReport = 0x09,
    SetIdle = 0x0A,
    SetProtocol = 0x0B,
}

/// The input report, as it goes over the wire.
#[repr(C)]
#[derive(Copy, Clone, Debug, AsBytes, FromBytes, Unaligned)]
pub struct GamepadReport {
    buttons: U16<LittleEndian>,
}

impl GamepadReport {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    pub const fn new(buttons: ButtonState) -> Self {
        Self {
            buttons: le16(buttons.bits()),
        }
    }
}

/// Everything the device remembers between loop iterations.
///
/// There's exactly one of these, owned by the main loop. The controller
/// read is the only thing that writes `report` and the SET_IDLE request is
/// the only thing that writes `idle_rate`.
pub struct DeviceState {
    report: GamepadReport,
    /// Stored for GET_IDLE, never enforced. We report on every interrupt
    /// window whether or not anything changed.
    idle_rate: u8,
}

impl DeviceState {
    pub const fn new() -> Self {
        Self {
            report: GamepadReport::new(ButtonState::NONE),
            idle_rate: 0,
        }
    }

    pub fn buttons(&self) -> ButtonState {
        ButtonState::from_bits(self.report.buttons.get())
    }

    pub fn set_buttons(&mut self, buttons: ButtonState) {
        self.report = GamepadReport::new(buttons);
    }

    pub fn report_bytes(&self) -> &[u8] {
        self.report.as_bytes()
    }

    pub fn idle_rate(&self) -> u8 {
        self.idle_rate
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassHandler for DeviceState {
    fn handle_setup(&mut self, setup: &UsbSetupPacket) -> &[u8] {
        if setup.kind() != Some(UsbRequestKind::Class) {
            return &[];
        }
        match HidRequest::from_u8(setup.request) {
            Some(HidRequest::GetReport) => self.report.as_bytes(),
            Some(HidRequest::GetIdle) => core::slice::from_ref(&self.idle_rate),
            Some(HidRequest::SetIdle) => {
                self.idle_rate = setup.value_high();
                debug!("idle rate set to {=u8}", self.idle_rate);
                &[]
            }
            Some(other) => {
                trace!("ignoring HID request {}", other);
                &[]
            }
            None => &[],
        }
    }
}
