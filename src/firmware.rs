// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The main loop.
//!
//! Every trip around the loop we kick the watchdog, re-arm the wake source,
//! let the USB stack do its thing, and then look at the interrupt endpoint.
//! If it can take a report, we read the pad and hand it over. If not, there's
//! nothing useful to do until the bus or the wake timer says otherwise, so we
//! sleep.
//!
//! Nothing in here can fail. The worst case is a hang somewhere below us,
//! and the answer to that is the watchdog resetting the whole chip.

use embedded_hal::delay::DelayNs;

use crate::controller::{ControllerReader, Timing};
use crate::gpio::{GpioPort, Line};
use crate::hid::DeviceState;
use crate::power::Power;
use crate::transport::Transport;

/// How long we hold the bus disconnected at startup. Hosts only treat a
/// disconnect as real past 250ms, so this has some margin on top.
pub const REENUMERATION_HOLD_MS: u32 = 260;

/// Where the loop is (or, from `step`, which branch it took).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoopState {
    /// Inside the transport's poll.
    Servicing,
    /// The endpoint was free; a fresh report went out.
    ReadyToReport,
    /// The endpoint was busy; we slept.
    IdleSleep,
}

pub struct Firmware<P, D, T, W> {
    port: P,
    delay: D,
    transport: T,
    power: W,
    reader: ControllerReader,
    state: DeviceState,
    loop_state: LoopState,
}

impl<P, D, T, W> Firmware<P, D, T, W>
where
    P: GpioPort,
    D: DelayNs,
    T: Transport,
    W: Power,
{
    pub fn new(port: P, delay: D, transport: T, power: W, timing: Timing) -> Self {
        Self {
            port,
            delay,
            transport,
            power,
            reader: ControllerReader::new(timing),
            state: DeviceState::new(),
            loop_state: LoopState::Servicing,
        }
    }

    /// Brings the transport up and forces the host to enumerate us from
    /// scratch, in case it still remembers a previous run (say, from before a
    /// watchdog reset).
    pub fn start(&mut self) {
        self.transport.init();
        info!("forcing re-enumeration");
        self.transport.disconnect();
        self.delay.delay_ms(REENUMERATION_HOLD_MS);
        self.transport.connect();
    }

    /// One trip around the loop.
    pub fn step(&mut self) -> LoopState {
        self.power.feed_watchdog();
        self.power.arm_wake();

        self.loop_state = LoopState::Servicing;
        self.transport.poll(&mut self.state);

        // The transport's idea of "ready" can change under us from interrupt
        // context, so ask with interrupts off. The read and submit are slow
        // and happen after they're back on.
        let transport = &self.transport;
        let ready = self.power.interrupt_free(|| transport.interrupt_ready());

        self.loop_state = if ready {
            self.port.set_pin(Line::Led);
            let buttons = self.reader.read(&mut self.port, &mut self.delay);
            if buttons != self.state.buttons() {
                debug!("buttons {=u16:#x}", buttons.bits());
            }
            self.state.set_buttons(buttons);
            self.transport.submit_interrupt(self.state.report_bytes());
            // LED stays lit while anything is held down.
            if !buttons.any() {
                self.port.clear_pin(Line::Led);
            }
            LoopState::ReadyToReport
        } else {
            self.power.sleep();
            // Heartbeat. Fights with the button indication above when the
            // bus is busy, which shows up as a flicker while a button is held.
            self.port.toggle_pin(Line::Led);
            LoopState::IdleSleep
        };
        self.loop_state
    }

    pub fn run(mut self) -> ! {
        self.start();
        info!("running, timing {}", self.reader.timing());
        loop {
            self.step();
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn loop_state(&self) -> LoopState {
        self.loop_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Button;
    use crate::hid::HidRequest;
    use crate::sim::{Event, EventLog, RecordingDelay, RecordingPower, ScriptedTransport, SimPad};
    use crate::usb::UsbSetupPacket;

    type TestFirmware = Firmware<SimPad, RecordingDelay, ScriptedTransport, RecordingPower>;

    fn firmware(pressed: u16, ready: &[bool]) -> (TestFirmware, EventLog) {
        let log = EventLog::default();
        let fw = Firmware::new(
            SimPad::new(pressed),
            RecordingDelay::default(),
            ScriptedTransport::new(log.clone(), ready),
            RecordingPower::new(log.clone()),
            Timing::FAST,
        );
        (fw, log)
    }

    #[test]
    fn start_holds_disconnect_past_250ms() {
        assert!(REENUMERATION_HOLD_MS > 250);
        let (mut fw, log) = firmware(0, &[]);
        fw.start();
        assert_eq!(
            *log.borrow(),
            vec![Event::Init, Event::Disconnect, Event::Connect]
        );
        assert_eq!(fw.delay.total_ms(), u64::from(REENUMERATION_HOLD_MS));
        assert!(fw.delay.total_ms() > 250);
    }

    #[test]
    fn ready_iteration_order() {
        let (mut fw, log) = firmware(Button::Y.mask(), &[true]);
        assert_eq!(fw.step(), LoopState::ReadyToReport);
        assert_eq!(
            *log.borrow(),
            vec![
                Event::FeedWatchdog,
                Event::ArmWake,
                Event::Poll,
                Event::InterruptsOff,
                Event::ReadyQuery(true),
                Event::InterruptsOn,
                Event::Submit(vec![0x02, 0x00]),
            ]
        );
    }

    #[test]
    fn not_ready_only_sleeps() {
        let (mut fw, log) = firmware(0xFFF, &[false, false, false]);
        for _ in 0..3 {
            assert_eq!(fw.step(), LoopState::IdleSleep);
        }
        assert_eq!(fw.port.latch_pulses(), 0);
        assert_eq!(fw.port.samples(), 0);
        let log = log.borrow();
        assert!(!log.iter().any(|e| matches!(e, Event::Submit(_))));
        assert_eq!(log.iter().filter(|e| **e == Event::Sleep).count(), 3);
        assert_eq!(
            &log[..7],
            &[
                Event::FeedWatchdog,
                Event::ArmWake,
                Event::Poll,
                Event::InterruptsOff,
                Event::ReadyQuery(false),
                Event::InterruptsOn,
                Event::Sleep,
            ]
        );
    }

    #[test]
    fn watchdog_and_wake_are_serviced_every_iteration() {
        let (mut fw, log) = firmware(0, &[true, false, true, false]);
        for _ in 0..4 {
            fw.step();
        }
        let log = log.borrow();
        assert_eq!(log.iter().filter(|e| **e == Event::FeedWatchdog).count(), 4);
        assert_eq!(log.iter().filter(|e| **e == Event::ArmWake).count(), 4);
        assert_eq!(log.iter().filter(|e| **e == Event::Poll).count(), 4);
    }

    #[test]
    fn led_tracks_press_state_after_report() {
        let (mut fw, _log) = firmware(Button::A.mask(), &[true, true]);
        fw.step();
        assert!(fw.port.led());
        assert_eq!(fw.state().buttons().bits(), Button::A.mask());

        fw.port.press(0);
        fw.step();
        assert!(!fw.port.led());
        assert_eq!(fw.state().report_bytes(), &[0, 0]);
    }

    #[test]
    fn idle_sleep_toggles_heartbeat() {
        let (mut fw, _log) = firmware(0, &[false, false, false]);
        let before = fw.port.led();
        fw.step();
        assert_eq!(fw.port.led(), !before);
        fw.step();
        assert_eq!(fw.port.led(), before);
        fw.step();
        assert_eq!(fw.port.led(), !before);
    }

    #[test]
    fn report_bytes_are_little_endian() {
        let (mut fw, log) = firmware(Button::R.mask() | Button::B.mask(), &[true]);
        fw.step();
        assert!(log
            .borrow()
            .contains(&Event::Submit(vec![0x01, 0x08])));
    }

    #[test]
    fn control_requests_see_live_state() {
        let (mut fw, _log) = firmware(Button::Select.mask(), &[true, false]);
        fw.step();
        fw.transport
            .queue_setup(UsbSetupPacket::new(0xA1, HidRequest::GetReport as u8, 0x0100, 0, 2));
        fw.transport
            .queue_setup(UsbSetupPacket::new(0x21, HidRequest::SetIdle as u8, 0x4200, 0, 0));
        fw.transport
            .queue_setup(UsbSetupPacket::new(0xA1, HidRequest::GetIdle as u8, 0, 0, 1));
        fw.step();
        assert_eq!(
            fw.transport.replies(),
            &[vec![0x04u8, 0x00], vec![], vec![0x42]]
        );
        assert_eq!(fw.state().idle_rate(), 0x42);
    }

    #[test]
    fn loop_state_follows_branch() {
        let (mut fw, _log) = firmware(0, &[true, false]);
        assert_eq!(fw.loop_state(), LoopState::Servicing);
        fw.step();
        assert_eq!(fw.loop_state(), LoopState::ReadyToReport);
        fw.step();
        assert_eq!(fw.loop_state(), LoopState::IdleSleep);
    }
}
