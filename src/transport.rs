// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! What the main loop needs from a USB device stack.

use crate::usb::UsbSetupPacket;

/// Answers class requests arriving on the control endpoint.
///
/// The returned bytes are the data stage of the reply; an empty slice means
/// "nothing to send", which is also how unknown requests are answered. The
/// transport copies the bytes out before the borrow ends, so handlers can
/// point straight at their live state.
pub trait ClassHandler {
    fn handle_setup(&mut self, setup: &UsbSetupPacket) -> &[u8];
}

/// A USB device stack with a single interrupt IN endpoint.
pub trait Transport {
    /// Bring up the controller. The device isn't visible on the bus until
    /// `connect`.
    fn init(&mut self);
    /// Drop off the bus, as though unplugged.
    fn disconnect(&mut self);
    fn connect(&mut self);
    /// Service whatever the bus has been up to. Must be called every loop
    /// iteration; class requests are handed to `handler` from in here.
    fn poll<H: ClassHandler>(&mut self, handler: &mut H);
    /// Can the interrupt endpoint take a new payload? Never blocks.
    fn interrupt_ready(&self) -> bool;
    /// Queue `payload` for the next interrupt transfer. The bytes are copied;
    /// nothing comes back to say when the host picked them up.
    fn submit_interrupt(&mut self, payload: &[u8]);
}
