// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The handful of digital lines the firmware touches, and the port
//! capability used to drive them.

/// Logical lines. The board support decides which GPIO each one lands on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Line {
    /// Output to the pad. High loads the button states into its shift
    /// register.
    Latch,
    /// Output to the pad. A rising edge shifts the next button onto `Data`.
    Clock,
    /// Input from the pad, active-low.
    Data,
    /// Status LED.
    Led,
}

/// Set/clear/read access to the lines above.
///
/// Outputs must already be configured as outputs and `Data` as an input by
/// whoever constructs the port.
pub trait GpioPort {
    fn set_pin(&mut self, line: Line);
    fn clear_pin(&mut self, line: Line);
    fn read_pin(&self, line: Line) -> bool;

    /// Raises several lines. Ports that can do it in a single register write
    /// should override this, since the pad protocol wants latch and clock to
    /// rise together.
    fn set_pins(&mut self, lines: &[Line]) {
        for &line in lines {
            self.set_pin(line);
        }
    }

    fn toggle_pin(&mut self, line: Line) {
        if self.read_pin(line) {
            self.clear_pin(line);
        } else {
            self.set_pin(line);
        }
    }
}
