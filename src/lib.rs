// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SNES controller to USB HID gamepad adapter.
//!
//! The gamepad side (reading the pad, building reports, answering HID class
//! requests, the main loop) doesn't know what chip it's on. It talks to the
//! hardware through three small traits: `gpio::GpioPort`,
//! `transport::Transport` and `power::Power`, plus `embedded_hal`'s `DelayNs`
//! for waits. That half builds and tests on the host.
//!
//! The other half, `rp2040`, implements those traits with raw register
//! access and only exists when building for the chip.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to everything below.
#[macro_use]
mod fmt;

pub mod controller;
pub mod descriptors;
pub mod error;
pub mod firmware;
pub mod gpio;
pub mod hid;
pub mod power;
pub mod transport;
pub mod usb;

#[cfg(target_arch = "arm")]
pub mod rp2040;

#[cfg(test)]
mod sim;

pub use controller::{Button, ButtonState, ControllerReader, Timing};
pub use error::{Error, Result};
pub use firmware::{Firmware, LoopState};
pub use hid::DeviceState;
