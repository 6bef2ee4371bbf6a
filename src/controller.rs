// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reading the SNES pad.
//!
//! The pad is a parallel-in, serial-out shift register. Raising latch copies
//! all twelve buttons into the register and puts the first one on the data
//! line; each rising clock edge after that shifts the next button out. Data
//! is active-low: a pressed button pulls the line down.
//!
//! Nintendo's documentation asks for a 12us clock. Scope traces of real pads
//! show them responding within ~100ns, so the default profile runs the clock
//! at about 1us, which cuts a full read from ~160us to ~40us. Nintendo's
//! timing is still available behind the `compatible-timing` feature for pads
//! (or clones) that turn out to be slower.

use embedded_hal::delay::DelayNs;

use crate::gpio::{GpioPort, Line};

/// Number of buttons the pad shifts out.
pub const BUTTON_COUNT: usize = 12;

/// SNES buttons, by their position in the shift register (and so by their
/// bit in `ButtonState`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    B = 0,
    Y = 1,
    Select = 2,
    Start = 3,
    Up = 4,
    Down = 5,
    Left = 6,
    Right = 7,
    A = 8,
    X = 9,
    L = 10,
    R = 11,
}

impl Button {
    pub const ALL: [Button; BUTTON_COUNT] = [
        Button::B,
        Button::Y,
        Button::Select,
        Button::Start,
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::A,
        Button::X,
        Button::L,
        Button::R,
    ];

    pub const fn mask(self) -> u16 {
        1 << self as u16
    }
}

/// One bit per button, 1 = pressed. Bits 12..16 are always zero.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonState(u16);

impl ButtonState {
    pub const MASK: u16 = (1 << BUTTON_COUNT) - 1;
    pub const NONE: Self = Self(0);

    /// Bits above the twelfth are dropped.
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits & Self::MASK)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn is_pressed(self, button: Button) -> bool {
        self.0 & button.mask() != 0
    }

    pub const fn any(self) -> bool {
        self.0 != 0
    }

    pub fn pressed(self) -> impl Iterator<Item = Button> {
        Button::ALL.into_iter().filter(move |&b| self.is_pressed(b))
    }
}

/// How long to hold each phase of the read, in microseconds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Latch high before it drops and the first bit is sampled.
    pub latch_us: u32,
    /// Extra wait at the top of each bit, before sampling.
    pub pre_sample_us: u32,
    /// Clock held low before the rising edge that shifts the next bit.
    pub clock_low_us: u32,
}

impl Timing {
    /// ~1us clock.
    pub const FAST: Self = Self {
        latch_us: 1,
        pre_sample_us: 0,
        clock_low_us: 1,
    };

    /// Nintendo's 12us latch and ~12us clock cycle. The loop body itself eats
    /// about 2us, so two 5us waits get close.
    pub const COMPATIBLE: Self = Self {
        latch_us: 12,
        pre_sample_us: 5,
        clock_low_us: 5,
    };

    /// Whichever profile the firmware was built with.
    pub const BUILD: Self = if cfg!(feature = "compatible-timing") {
        Self::COMPATIBLE
    } else {
        Self::FAST
    };

    /// Sum of all the waits in one read.
    pub const fn total_wait_us(&self) -> u32 {
        self.latch_us + BUTTON_COUNT as u32 * (self.pre_sample_us + self.clock_low_us)
    }
}

/// Bit-bangs the latch/clock/data protocol.
///
/// Holds no state between reads other than the timing profile. There is no
/// way to tell a missing pad from one with nothing pressed, and we don't try:
/// with the data line pulled up, an unplugged pad reads as all-released.
pub struct ControllerReader {
    timing: Timing,
}

impl ControllerReader {
    pub const fn new(timing: Timing) -> Self {
        Self { timing }
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn read<P, D>(&self, port: &mut P, delay: &mut D) -> ButtonState
    where
        P: GpioPort,
        D: DelayNs,
    {
        let mut bits = 0u16;

        // Latch high, clock high. First button available on data.
        port.set_pins(&[Line::Latch, Line::Clock]);
        delay.delay_us(self.timing.latch_us);
        port.clear_pin(Line::Latch);

        for i in 0..BUTTON_COUNT {
            if self.timing.pre_sample_us != 0 {
                delay.delay_us(self.timing.pre_sample_us);
            }
            if !port.read_pin(Line::Data) {
                bits |= 1 << i;
            }
            // Clock low, then high. Next button will be available on data.
            port.clear_pin(Line::Clock);
            delay.delay_us(self.timing.clock_low_us);
            port.set_pin(Line::Clock);
        }

        ButtonState::from_bits(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{RecordingDelay, SimPad};

    #[test]
    fn single_button_lands_on_its_bit() {
        let mut pad = SimPad::new(1 << 3);
        let mut delay = RecordingDelay::default();
        let state = ControllerReader::new(Timing::FAST).read(&mut pad, &mut delay);
        assert_eq!(state.bits(), 1 << 3);
        assert!(state.is_pressed(Button::Start));
        assert_eq!(state.bits() & !ButtonState::MASK, 0);
    }

    #[test]
    fn every_position_maps_in_order() {
        let reader = ControllerReader::new(Timing::FAST);
        let mut delay = RecordingDelay::default();
        for button in Button::ALL {
            let mut pad = SimPad::new(button.mask());
            let state = reader.read(&mut pad, &mut delay);
            assert_eq!(state.bits(), button.mask(), "{:?}", button);
            assert_eq!(state.pressed().collect::<Vec<_>>(), vec![button]);
        }
    }

    #[test]
    fn first_sampled_is_bit_zero_last_is_bit_eleven() {
        let reader = ControllerReader::new(Timing::FAST);
        let mut delay = RecordingDelay::default();
        let mut pad = SimPad::new(Button::B.mask() | Button::R.mask());
        assert_eq!(reader.read(&mut pad, &mut delay).bits(), 0b1000_0000_0001);
    }

    #[test]
    fn all_released_reads_zero_every_time() {
        let reader = ControllerReader::new(Timing::FAST);
        let mut delay = RecordingDelay::default();
        let mut pad = SimPad::new(0);
        for _ in 0..5 {
            assert_eq!(reader.read(&mut pad, &mut delay), ButtonState::NONE);
        }
        assert_eq!(pad.latch_pulses(), 5);
    }

    #[test]
    fn pad_only_reports_its_twelve_buttons() {
        // The simulated register has 16 stages like the real one; the upper
        // four must never make it into the report.
        let mut pad = SimPad::new(0xFFFF);
        let mut delay = RecordingDelay::default();
        let state = ControllerReader::new(Timing::FAST).read(&mut pad, &mut delay);
        assert_eq!(state.bits(), 0x0FFF);
    }

    #[test]
    fn follows_the_pulse_sequence() {
        let mut pad = SimPad::new(0);
        let mut delay = RecordingDelay::default();
        ControllerReader::new(Timing::FAST).read(&mut pad, &mut delay);
        assert_eq!(pad.simultaneous_raises(), 1);
        assert_eq!(pad.latch_pulses(), 1);
        assert_eq!(pad.shift_pulses(), BUTTON_COUNT);
        assert_eq!(pad.samples(), BUTTON_COUNT);
        // Left idle with clock high and latch low, ready for the next read.
        assert!(pad.read_pin(Line::Clock));
        assert!(!pad.read_pin(Line::Latch));
    }

    #[test]
    fn fast_profile_waits() {
        let mut pad = SimPad::new(0);
        let mut delay = RecordingDelay::default();
        ControllerReader::new(Timing::FAST).read(&mut pad, &mut delay);
        assert_eq!(delay.total_us(), 1 + 12);
        assert_eq!(delay.total_us(), u64::from(Timing::FAST.total_wait_us()));
    }

    #[test]
    fn compatible_profile_waits() {
        let mut pad = SimPad::new(Button::A.mask());
        let mut delay = RecordingDelay::default();
        let state = ControllerReader::new(Timing::COMPATIBLE).read(&mut pad, &mut delay);
        assert_eq!(state, ButtonState::from_bits(Button::A.mask()));
        assert_eq!(delay.total_us(), 12 + 12 * 10);
    }

    #[test]
    fn from_bits_drops_padding() {
        assert_eq!(ButtonState::from_bits(0xF001).bits(), 0x0001);
        assert!(!ButtonState::from_bits(0xF000).any());
    }
}
