// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RP2040 implementations of the hardware traits.
//!
//! Straight register access through `rp2040_pac`, no HAL. Clocks and resets
//! are main's business; by the time anything in here is constructed the
//! relevant blocks are out of reset and clk_ref is the 12MHz crystal.
//!
//! Nothing here uses interrupt handlers. The USB and timer IRQs stay masked
//! in the NVIC and are only used for their side effect of making an
//! interrupt pending, which (with SEVONPEND set) is an event that ends a
//! `wfe`. Everything else is polled from the main loop.
//!
//! As in most PAC-based code, the `unsafe` inside register `write` closures
//! is there because the PAC marks raw field writes unsafe, not because
//! anything unusual is going on.

use cortex_m::peripheral::{NVIC, SCB};
use embedded_hal::delay::DelayNs;
use rp2040_pac as pac;
use rp2040_pac::Interrupt;
use zerocopy::AsBytes;

use crate::descriptors::{self, EP0_MAX_PACKET, REPORT_EP_ADDR, REPORT_EP_MAX_PACKET};
use crate::error::{Error, Result};
use crate::gpio::{GpioPort, Line};
use crate::hid::REPORT_DESCRIPTOR;
use crate::power::{Power, WAKE_PERIOD_MS, WATCHDOG_PERIOD_MS};
use crate::transport::{ClassHandler, Transport};
use crate::usb::{
    UsbDescType, UsbDir, UsbRequestKind, UsbSetupPacket, UsbSetupRequest, UsbTransferType,
};

use num_traits::FromPrimitive;

cfg_if::cfg_if! {
    // Feather first, so `--features target-feather` wins over the default.
    if #[cfg(feature = "target-feather")] {
        pub const LATCH_PIN: u8 = 2;
        pub const CLOCK_PIN: u8 = 3;
        pub const DATA_PIN: u8 = 4;
        pub const LED_PIN: u8 = 13;
    } else if #[cfg(feature = "target-pico")] {
        pub const LATCH_PIN: u8 = 2;
        pub const CLOCK_PIN: u8 = 3;
        pub const DATA_PIN: u8 = 4;
        pub const LED_PIN: u8 = 25;
    } else {
        compile_error!("missing or unknown target-* feature");
    }
}

////////////////////////////////////////////////////////////////////////////
// GPIO

const fn pin(line: Line) -> u8 {
    match line {
        Line::Latch => LATCH_PIN,
        Line::Clock => CLOCK_PIN,
        Line::Data => DATA_PIN,
        Line::Led => LED_PIN,
    }
}

const fn mask(line: Line) -> u32 {
    1 << pin(line)
}

/// The pad and LED lines, driven through SIO.
pub struct SioPort {
    sio: pac::SIO,
}

impl SioPort {
    /// Routes the four lines to SIO, makes latch/clock/LED outputs (low), and
    /// makes data an input with the pull-up on, so a missing pad reads as
    /// nothing pressed.
    ///
    /// IO_BANK0 and PADS_BANK0 must be out of reset.
    pub fn new(sio: pac::SIO, io: &pac::IO_BANK0, pads: &pac::PADS_BANK0) -> Self {
        for line in [Line::Latch, Line::Clock, Line::Data, Line::Led] {
            io.gpio[usize::from(pin(line))]
                .gpio_ctrl
                .write(|w| w.funcsel().sio());
        }
        pads.gpio[usize::from(DATA_PIN)].modify(|_, w| {
            w.ie().set_bit()
                .od().clear_bit()
                .pue().set_bit()
                .pde().clear_bit()
        });

        let outputs = mask(Line::Latch) | mask(Line::Clock) | mask(Line::Led);
        sio.gpio_out_clr.write(|w| unsafe { w.bits(outputs) });
        sio.gpio_oe_set.write(|w| unsafe { w.bits(outputs) });
        sio.gpio_oe_clr.write(|w| unsafe { w.bits(mask(Line::Data)) });

        Self { sio }
    }
}

impl GpioPort for SioPort {
    #[inline(always)]
    fn set_pin(&mut self, line: Line) {
        self.sio.gpio_out_set.write(|w| unsafe { w.bits(mask(line)) });
    }

    #[inline(always)]
    fn clear_pin(&mut self, line: Line) {
        self.sio.gpio_out_clr.write(|w| unsafe { w.bits(mask(line)) });
    }

    /// Outputs read back what we're driving; only data reads the pad.
    fn read_pin(&self, line: Line) -> bool {
        let bits = match line {
            Line::Data => self.sio.gpio_in.read().bits(),
            _ => self.sio.gpio_out.read().bits(),
        };
        bits & mask(line) != 0
    }

    /// One write to GPIO_OUT_SET, so the edges really are simultaneous.
    fn set_pins(&mut self, lines: &[Line]) {
        let bits = lines.iter().fold(0, |acc, &line| acc | mask(line));
        self.sio.gpio_out_set.write(|w| unsafe { w.bits(bits) });
    }

    fn toggle_pin(&mut self, line: Line) {
        self.sio.gpio_out_xor.write(|w| unsafe { w.bits(mask(line)) });
    }
}

////////////////////////////////////////////////////////////////////////////
// Delay

/// Busy-waits on the 1MHz TIMER counter.
///
/// The counter only ticks once the watchdog tick generator is running, which
/// main sets up along with the clocks.
pub struct TimerDelay<'a> {
    timer: &'a pac::TIMER,
}

impl<'a> TimerDelay<'a> {
    pub fn new(timer: &'a pac::TIMER) -> Self {
        Self { timer }
    }

    fn wait_us(&self, us: u32) {
        let start = self.timer.timerawl.read().bits();
        while self.timer.timerawl.read().bits().wrapping_sub(start) < us {}
    }
}

impl DelayNs for TimerDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        // Round up; we can't wait less than a tick.
        self.wait_us(ns / 1_000 + u32::from(ns % 1_000 != 0));
    }

    fn delay_us(&mut self, us: u32) {
        self.wait_us(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.wait_us(1_000);
        }
    }
}

////////////////////////////////////////////////////////////////////////////
// Power

/// SCB_SCR.SEVONPEND: a newly pending interrupt is a wakeup event, even if
/// it's disabled in the NVIC.
const SCR_SEVONPEND: u32 = 1 << 4;

/// PSM_WDSEL: everything except the oscillators, so a watchdog bite is a full
/// reset without having to restart the crystal.
const WDSEL_ALL_BUT_OSCILLATORS: u32 = 0x0001_fffc;

pub struct Rp2040Power<'a> {
    watchdog: pac::WATCHDOG,
    timer: &'a pac::TIMER,
}

impl<'a> Rp2040Power<'a> {
    /// Enables the watchdog and sets the core up for `wfe`-based sleep.
    pub fn new(
        watchdog: pac::WATCHDOG,
        psm: &pac::PSM,
        timer: &'a pac::TIMER,
        scb: &mut SCB,
    ) -> Self {
        psm.wdsel.write(|w| unsafe { w.bits(WDSEL_ALL_BUT_OSCILLATORS) });

        let this = Self { watchdog, timer };
        this.feed();
        this.watchdog.ctrl.write(|w| {
            w.enable().set_bit()
                .pause_dbg0().set_bit()
                .pause_dbg1().set_bit()
                .pause_jtag().set_bit()
        });

        // Alarm 0 raises TIMER_IRQ_0, which stays masked in the NVIC. We only
        // want it to go pending.
        this.timer.inte.write(|w| w.alarm_0().set_bit());
        NVIC::mask(Interrupt::TIMER_IRQ_0);
        NVIC::mask(Interrupt::USBCTRL_IRQ);

        unsafe {
            scb.scr.modify(|scr| scr | SCR_SEVONPEND);
        }
        // Deep sleep gates whatever main left out of CLOCKS.SLEEP_EN*.
        scb.set_sleepdeep();

        info!("watchdog armed, {=u32}ms", WATCHDOG_PERIOD_MS);
        this
    }

    fn feed(&self) {
        // RP2040-E1: the counter decrements twice per tick.
        let load = WATCHDOG_PERIOD_MS * 1_000 * 2;
        self.watchdog.load.write(|w| unsafe { w.bits(load) });
    }
}

impl Power for Rp2040Power<'_> {
    fn feed_watchdog(&mut self) {
        self.feed();
    }

    fn arm_wake(&mut self) {
        // Clear the last alarm and its pending bit, or the next wfe wakes on
        // something that already happened.
        self.timer.intr.write(|w| w.alarm_0().set_bit());
        NVIC::unpend(Interrupt::TIMER_IRQ_0);

        let target = self
            .timer
            .timerawl
            .read()
            .bits()
            .wrapping_add(WAKE_PERIOD_MS * 1_000);
        self.timer.alarm0.write(|w| unsafe { w.bits(target) });
    }

    fn interrupt_free<R>(&mut self, f: impl FnOnce() -> R) -> R {
        cortex_m::interrupt::free(|_| f())
    }

    /// `wfe` rather than `wfi`: anything that went pending since the last
    /// `wfe` has already latched the event register, so we fall straight
    /// through instead of sleeping on it.
    fn sleep(&mut self) {
        cortex_m::asm::wfe();
    }
}

////////////////////////////////////////////////////////////////////////////
// USB

/// Where an IN endpoint's data buffer lives and which buffer control
/// register drives it.
struct InEndpoint {
    /// Index into `ep_buffer_control`. IN comes before OUT for each endpoint
    /// number, so this is `2 * number`.
    buffer_control_index: usize,
    /// Byte offset of the data buffer from the start of DPRAM.
    buffer_offset: usize,
    max_packet: usize,
}

/// EP0 shares one fixed buffer at 0x100 for both directions.
const EP0_IN: InEndpoint = InEndpoint {
    buffer_control_index: 0,
    buffer_offset: 0x100,
    max_packet: EP0_MAX_PACKET,
};
const EP0_OUT_BUFFER_CONTROL: usize = 1;

/// Right after the EP0 buffers. Must be 64-byte aligned.
const REPORT_IN: InEndpoint = InEndpoint {
    buffer_control_index: 2,
    buffer_offset: 0x180,
    max_packet: REPORT_EP_MAX_PACKET as usize,
};
/// Index into `ep_control`, which starts at EP1 IN.
const REPORT_EP_CONTROL: usize = 0;

const EP0_IN_ADDR: u8 = UsbDir::In.endpoint(0);
const EP0_OUT_ADDR: u8 = UsbDir::Out.endpoint(0);

/// Copies `bytes` into the endpoint's buffer and hands it to the controller.
/// `pid` is the endpoint's next DATA0/DATA1 and is toggled.
fn start_tx(
    dpram: &pac::USBCTRL_DPRAM,
    ep: &InEndpoint,
    pid: &mut bool,
    bytes: &[u8],
) -> Result<()> {
    if bytes.len() > ep.max_packet {
        return Err(Error::PayloadTooLarge {
            len: bytes.len(),
            max: ep.max_packet,
        });
    }

    // Safety: the buffer is ours until we set AVAILABLE below, and it's
    // within DPRAM by construction of the InEndpoint constants.
    unsafe {
        let dst = (pac::USBCTRL_DPRAM::ptr() as *mut u8).add(ep.buffer_offset);
        dst.copy_from_nonoverlapping(bytes.as_ptr(), bytes.len());
    }

    dpram.ep_buffer_control[ep.buffer_control_index].write(|w| unsafe {
        w.pid_0().bit(*pid)
            .full_0().set_bit()
            .available_0().set_bit()
            .length_0().bits(bytes.len() as u16)
    });
    *pid = !*pid;
    Ok(())
}

/// Arms EP0 OUT for the zero-length status stage after an IN data stage.
fn start_status_rx(dpram: &pac::USBCTRL_DPRAM) {
    dpram.ep_buffer_control[EP0_OUT_BUFFER_CONTROL].write(|w| unsafe {
        w.pid_0().set_bit()
            .full_0().clear_bit()
            .available_0().set_bit()
            .length_0().bits(0)
    });
}

/// The RP2040's USB controller as a single-interface HID device.
///
/// Enumeration is handled in here: descriptors, SET_ADDRESS,
/// SET_CONFIGURATION. Class requests go to the `ClassHandler` passed to
/// `poll`. Errors are logged and dropped; the host retries what it cares
/// about.
pub struct UsbTransport {
    regs: pac::USBCTRL_REGS,
    dpram: pac::USBCTRL_DPRAM,
    /// SET_ADDRESS has to be acknowledged from the old address, so the new
    /// one is parked here until the status stage goes out.
    new_address: Option<u8>,
    configured: bool,
    ep0_in_pid: bool,
    report_pid: bool,
    /// Scratch for composing descriptors.
    tmp: [u8; EP0_MAX_PACKET],
}

impl UsbTransport {
    /// USBCTRL must already be out of reset, with clk_usb at 48MHz.
    pub fn new(regs: pac::USBCTRL_REGS, dpram: pac::USBCTRL_DPRAM) -> Self {
        Self {
            regs,
            dpram,
            new_address: None,
            configured: false,
            ep0_in_pid: false,
            report_pid: false,
            tmp: [0; EP0_MAX_PACKET],
        }
    }

    fn acknowledge_out_request(&mut self) -> Result<()> {
        start_tx(&self.dpram, &EP0_IN, &mut self.ep0_in_pid, &[])
    }

    fn handle_setup<H: ClassHandler>(&mut self, handler: &mut H) -> Result<()> {
        self.regs.sie_status.write(|w| w.setup_rec().set_bit());

        let mut raw = [0; UsbSetupPacket::SIZE];
        raw[..4].copy_from_slice(&self.dpram.setup_packet_low.read().bits().to_le_bytes());
        raw[4..].copy_from_slice(&self.dpram.setup_packet_high.read().bits().to_le_bytes());
        let setup = UsbSetupPacket::parse(&raw)?;

        // Every data stage on EP0 starts at DATA1.
        self.ep0_in_pid = true;

        match (setup.kind(), setup.direction()) {
            (Some(UsbRequestKind::Standard), UsbDir::Out) => self.handle_standard_out(setup),
            (Some(UsbRequestKind::Standard), UsbDir::In) => self.handle_standard_in(setup),
            (Some(UsbRequestKind::Class), UsbDir::In) => {
                let reply = handler.handle_setup(setup);
                let len = reply.len().min(usize::from(setup.length.get()));
                start_tx(&self.dpram, &EP0_IN, &mut self.ep0_in_pid, &reply[..len])
            }
            (Some(UsbRequestKind::Class), UsbDir::Out) => {
                handler.handle_setup(setup);
                self.acknowledge_out_request()
            }
            // Anything else OUT gets a status ack so the host doesn't sit
            // there waiting on a NAK.
            (_, UsbDir::Out) => self.acknowledge_out_request(),
            (_, UsbDir::In) => {
                trace!("ignoring IN request {=u8:#x}/{=u8:#x}", setup.request_type, setup.request);
                Ok(())
            }
        }
    }

    fn handle_standard_out(&mut self, setup: &UsbSetupPacket) -> Result<()> {
        match UsbSetupRequest::from_u8(setup.request) {
            Some(UsbSetupRequest::SetAddress) => {
                let address = setup.value_low();
                debug!("SET_ADDRESS {=u8}", address);
                self.new_address = Some(address);
            }
            Some(UsbSetupRequest::SetConfiguration) => {
                self.configured = setup.value_low() != 0;
                // Interrupt endpoint data toggle restarts on configuration.
                self.report_pid = false;
                info!("SET_CONFIGURATION {=u8}", setup.value_low());
            }
            _ => (),
        }
        self.acknowledge_out_request()
    }

    fn handle_standard_in(&mut self, setup: &UsbSetupPacket) -> Result<()> {
        if UsbSetupRequest::from_u8(setup.request) != Some(UsbSetupRequest::GetDescriptor) {
            trace!("ignoring standard IN request {=u8:#x}", setup.request);
            return Ok(());
        }

        let bytes: &[u8] = match UsbDescType::from_u8(setup.value_high()) {
            Some(UsbDescType::Device) => descriptors::DEVICE_DESCRIPTOR.as_bytes(),
            Some(UsbDescType::Config) => descriptors::configuration(&mut self.tmp),
            Some(UsbDescType::String) => descriptors::string(setup.value_low(), &mut self.tmp)?,
            Some(UsbDescType::Hid) => descriptors::HID_DESCRIPTOR.as_bytes(),
            Some(UsbDescType::Report) => &REPORT_DESCRIPTOR,
            // Interface and endpoint descriptors arrive with the
            // configuration; hosts don't ask for them on their own.
            other => {
                trace!("ignoring descriptor request {}", other);
                return Ok(());
            }
        };
        // The host says how much it wants, which is often less than we have
        // (e.g. just the 9-byte config header).
        let len = bytes.len().min(usize::from(setup.length.get()));
        start_tx(&self.dpram, &EP0_IN, &mut self.ep0_in_pid, &bytes[..len])
    }

    fn handle_buffers(&mut self) -> Result<()> {
        let done = self.regs.buff_status.read().bits();
        let mut result = Ok(());

        let mut pending = done;
        while pending != 0 {
            let index = pending.trailing_zeros();
            pending &= !(1 << index);

            // Buffer status bits come in IN/OUT pairs per endpoint number.
            let dir = if index & 1 == 0 { UsbDir::In } else { UsbDir::Out };
            match dir.endpoint((index >> 1) as u8) {
                EP0_IN_ADDR => {
                    if let Some(address) = self.new_address.take() {
                        self.regs
                            .addr_endp
                            .write(|w| unsafe { w.address().bits(address) });
                    } else {
                        start_status_rx(&self.dpram);
                    }
                }
                // Status stage in, or the host picked up a report. Either way
                // there's nothing to do.
                EP0_OUT_ADDR | REPORT_EP_ADDR => (),
                address => result = Err(Error::UnknownEndpoint { address }),
            }
        }

        // Write-one-to-clear everything we saw, handled or not.
        self.regs.buff_status.write(|w| unsafe { w.bits(done) });
        result
    }

    fn handle_bus_reset(&mut self) {
        self.regs.sie_status.write(|w| w.bus_reset().set_bit());
        info!("bus reset");

        self.new_address = None;
        self.configured = false;
        self.report_pid = false;
        self.regs.addr_endp.write(|w| unsafe { w.address().bits(0) });
        // Drop any report still waiting to go out.
        self.dpram.ep_buffer_control[REPORT_IN.buffer_control_index]
            .write(|w| unsafe { w.bits(0) });
    }
}

impl Transport for UsbTransport {
    fn init(&mut self) {
        // Zero the control part of DPRAM.
        self.dpram.setup_packet_low.write(|w| unsafe { w.bits(0) });
        self.dpram.setup_packet_high.write(|w| unsafe { w.bits(0) });
        for epc in &self.dpram.ep_control {
            epc.write(|w| unsafe { w.bits(0) });
        }
        for epb in &self.dpram.ep_buffer_control {
            epb.write(|w| unsafe { w.bits(0) });
        }

        // Onboard PHY, and pretend VBUS is always there since not every board
        // wires up detection.
        self.regs.usb_muxing.write(|w| w.to_phy().set_bit().softcon().set_bit());
        self.regs.usb_pwr.write(|w| {
            w.vbus_detect().set_bit()
                .vbus_detect_override_en().set_bit()
        });
        self.regs.main_ctrl.write(|w| {
            w.controller_en().set_bit()
                .host_ndevice().clear_bit()
        });
        self.regs.sie_ctrl.write(|w| w.ep0_int_1buf().set_bit());
        self.regs.inte.write(|w| {
            w.buff_status().set_bit()
                .bus_reset().set_bit()
                .setup_req().set_bit()
        });

        let attributes = UsbTransferType::Interrupt as u8;
        self.dpram.ep_control[REPORT_EP_CONTROL].write(|w| unsafe {
            w.enable().set_bit()
                .interrupt_per_buff().set_bit()
                .endpoint_type().bits(attributes)
                .buffer_address().bits(REPORT_IN.buffer_offset as u16)
        });

        info!("usb controller up");
    }

    fn disconnect(&mut self) {
        self.regs.sie_ctrl.modify(|_, w| w.pullup_en().clear_bit());
    }

    fn connect(&mut self) {
        self.regs.sie_ctrl.modify(|_, w| w.pullup_en().set_bit());
    }

    fn poll<H: ClassHandler>(&mut self, handler: &mut H) {
        let ints = self.regs.ints.read();

        if ints.setup_req().bit() {
            if let Err(e) = self.handle_setup(handler) {
                warn!("setup request: {}", e);
            }
        }
        if ints.buff_status().bit() {
            if let Err(e) = self.handle_buffers() {
                warn!("buffer status: {}", e);
            }
        }
        if ints.bus_reset().bit() {
            self.handle_bus_reset();
        }

        // Whatever woke us has been dealt with. If the controller still has
        // something to say, the level-triggered line pends it again.
        NVIC::unpend(Interrupt::USBCTRL_IRQ);
    }

    fn interrupt_ready(&self) -> bool {
        self.configured
            && !self.dpram.ep_buffer_control[REPORT_IN.buffer_control_index]
                .read()
                .available_0()
                .bit()
    }

    fn submit_interrupt(&mut self, payload: &[u8]) {
        if let Err(e) = start_tx(&self.dpram, &REPORT_IN, &mut self.report_pid, payload) {
            warn!("report: {}", e);
        }
    }
}
