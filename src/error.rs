// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport-level error type.
//!
//! Nothing in the gamepad core is fallible. These only come up inside the
//! USB transport, which logs and drops them in `poll`.

use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A SETUP packet shorter than the fixed 8 bytes.
    ShortSetupPacket { len: usize },
    /// Payload doesn't fit in a single endpoint buffer.
    PayloadTooLarge { len: usize, max: usize },
    /// Buffer-done event for an endpoint we never configured.
    UnknownEndpoint { address: u8 },
    /// Host asked for a string descriptor index we don't have.
    UnknownString { index: u8 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortSetupPacket { len } => {
                write!(f, "setup packet is {len} bytes, expected 8")
            }
            Self::PayloadTooLarge { len, max } => {
                write!(f, "payload of {len} bytes exceeds {max} byte buffer")
            }
            Self::UnknownEndpoint { address } => {
                write!(f, "buffer event for unknown endpoint {address:#04x}")
            }
            Self::UnknownString { index } => {
                write!(f, "no string descriptor at index {index}")
            }
        }
    }
}
