// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Simulated hardware for host tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;

use crate::gpio::{GpioPort, Line};
use crate::power::Power;
use crate::transport::{ClassHandler, Transport};
use crate::usb::UsbSetupPacket;

/// A SNES pad on the other end of the port, plus the LED.
///
/// Models a 16-stage shift register: latch high loads `pressed` and presents
/// stage 0; each clock rising edge with latch low advances one stage. Past
/// the last stage data reads low, like the real thing.
pub struct SimPad {
    pressed: u16,
    latch: bool,
    clock: bool,
    led: bool,
    stage: usize,
    latch_pulses: usize,
    shift_pulses: usize,
    simultaneous_raises: usize,
    samples: RefCell<usize>,
}

impl SimPad {
    pub fn new(pressed: u16) -> Self {
        Self {
            pressed,
            latch: false,
            clock: false,
            led: false,
            stage: 0,
            latch_pulses: 0,
            shift_pulses: 0,
            simultaneous_raises: 0,
            samples: RefCell::new(0),
        }
    }

    pub fn press(&mut self, pressed: u16) {
        self.pressed = pressed;
    }

    pub fn led(&self) -> bool {
        self.led
    }

    pub fn latch_pulses(&self) -> usize {
        self.latch_pulses
    }

    pub fn shift_pulses(&self) -> usize {
        self.shift_pulses
    }

    pub fn simultaneous_raises(&self) -> usize {
        self.simultaneous_raises
    }

    pub fn samples(&self) -> usize {
        *self.samples.borrow()
    }
}

impl GpioPort for SimPad {
    fn set_pin(&mut self, line: Line) {
        match line {
            Line::Latch => {
                if !self.latch {
                    self.latch_pulses += 1;
                }
                self.latch = true;
                self.stage = 0;
            }
            Line::Clock => {
                if !self.clock && !self.latch {
                    self.shift_pulses += 1;
                    self.stage += 1;
                }
                self.clock = true;
            }
            Line::Led => self.led = true,
            Line::Data => panic!("data is an input"),
        }
    }

    fn clear_pin(&mut self, line: Line) {
        match line {
            Line::Latch => self.latch = false,
            Line::Clock => self.clock = false,
            Line::Led => self.led = false,
            Line::Data => panic!("data is an input"),
        }
    }

    fn read_pin(&self, line: Line) -> bool {
        match line {
            Line::Latch => self.latch,
            Line::Clock => self.clock,
            Line::Led => self.led,
            Line::Data => {
                *self.samples.borrow_mut() += 1;
                if self.stage < 16 {
                    self.pressed & (1 << self.stage) == 0
                } else {
                    false
                }
            }
        }
    }

    fn set_pins(&mut self, lines: &[Line]) {
        if lines.len() > 1 {
            self.simultaneous_raises += 1;
        }
        for &line in lines {
            self.set_pin(line);
        }
    }
}

/// Adds up every wait it's asked for.
#[derive(Default)]
pub struct RecordingDelay {
    total_ns: u64,
}

impl RecordingDelay {
    pub fn total_us(&self) -> u64 {
        self.total_ns / 1_000
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

/// Things the main loop did, in order, across transport and power.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Init,
    Disconnect,
    Connect,
    Poll,
    InterruptsOff,
    InterruptsOn,
    ReadyQuery(bool),
    Submit(Vec<u8>),
    FeedWatchdog,
    ArmWake,
    Sleep,
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

/// Transport whose readiness follows a script, one answer per loop
/// iteration, and which can deliver queued setup packets on `poll`.
pub struct ScriptedTransport {
    log: EventLog,
    ready: VecDeque<bool>,
    setups: VecDeque<UsbSetupPacket>,
    replies: Vec<Vec<u8>>,
    current: bool,
}

impl ScriptedTransport {
    pub fn new(log: EventLog, ready: &[bool]) -> Self {
        Self {
            log,
            ready: ready.iter().copied().collect(),
            setups: VecDeque::new(),
            replies: Vec::new(),
            current: false,
        }
    }

    pub fn queue_setup(&mut self, setup: UsbSetupPacket) {
        self.setups.push_back(setup);
    }

    /// What the handler answered to each delivered setup packet.
    pub fn replies(&self) -> &[Vec<u8>] {
        &self.replies
    }
}

impl Transport for ScriptedTransport {
    fn init(&mut self) {
        self.log.borrow_mut().push(Event::Init);
    }

    fn disconnect(&mut self) {
        self.log.borrow_mut().push(Event::Disconnect);
    }

    fn connect(&mut self) {
        self.log.borrow_mut().push(Event::Connect);
    }

    fn poll<H: ClassHandler>(&mut self, handler: &mut H) {
        self.log.borrow_mut().push(Event::Poll);
        while let Some(setup) = self.setups.pop_front() {
            let reply = handler.handle_setup(&setup).to_vec();
            self.replies.push(reply);
        }
        self.current = self.ready.pop_front().unwrap_or(false);
    }

    fn interrupt_ready(&self) -> bool {
        self.log.borrow_mut().push(Event::ReadyQuery(self.current));
        self.current
    }

    fn submit_interrupt(&mut self, payload: &[u8]) {
        self.log.borrow_mut().push(Event::Submit(payload.to_vec()));
    }
}

/// Records what was asked of it. `interrupt_free` brackets the closure with
/// off/on events so tests can see what ran inside.
pub struct RecordingPower {
    log: EventLog,
    masked: bool,
}

impl RecordingPower {
    pub fn new(log: EventLog) -> Self {
        Self { log, masked: false }
    }
}

impl Power for RecordingPower {
    fn feed_watchdog(&mut self) {
        self.log.borrow_mut().push(Event::FeedWatchdog);
    }

    fn arm_wake(&mut self) {
        self.log.borrow_mut().push(Event::ArmWake);
    }

    fn interrupt_free<R>(&mut self, f: impl FnOnce() -> R) -> R {
        assert!(!self.masked, "interrupt_free is not reentrant");
        self.masked = true;
        self.log.borrow_mut().push(Event::InterruptsOff);
        let r = f();
        self.log.borrow_mut().push(Event::InterruptsOn);
        self.masked = false;
        r
    }

    fn sleep(&mut self) {
        assert!(!self.masked, "sleeping with interrupts masked never wakes");
        self.log.borrow_mut().push(Event::Sleep);
    }
}
