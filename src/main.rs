// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SNES pad to USB gamepad firmware, RP2040.
//!
//! Brings the chip up from reset in one straight line: clocks, resets, pins,
//! sleep gating. Then it hands the drivers to `Firmware`, which never
//! returns. Everything after bring-up lives in the library.

#![cfg_attr(target_arch = "arm", no_std)]
#![cfg_attr(target_arch = "arm", no_main)]

#[cfg(target_arch = "arm")]
use cortex_m_rt::entry;

#[cfg(target_arch = "arm")]
use snes_usb::rp2040::{Rp2040Power, SioPort, TimerDelay, UsbTransport};
#[cfg(target_arch = "arm")]
use snes_usb::{Firmware, Timing};

#[cfg(target_arch = "arm")]
use panic_halt as _;

#[cfg(all(target_arch = "arm", feature = "defmt"))]
use defmt_rtt as _;

// Lets `cargo build` on the host get through the workspace; the library is
// what gets tested there.
#[cfg(not(target_arch = "arm"))]
fn main() {
    eprintln!("snes-usb is RP2040 firmware; build it with `cargo fw`");
}

/// Clocks left running in deep sleep (CLOCKS.SLEEP_EN0): clocks, busctrl,
/// busfabric, io, vreg, pads, both PLLs, psm, resets, rom, sio, sram0-3.
/// ADC, DMA, I2C, JTAG, PIO, PWM, ROSC, RTC and SPI are gated.
#[cfg(target_arch = "arm")]
const SLEEP_EN0_KEEP: u32 = 0xf08d_cd19;
/// SLEEP_EN1: sram4-5, syscfg, timer, both usbctrl clocks, watchdog, xip,
/// xosc. Sysinfo, tbman and the UARTs are gated.
#[cfg(target_arch = "arm")]
const SLEEP_EN1_KEEP: u32 = 0x0000_7c27;

#[cfg(target_arch = "arm")]
#[entry]
fn main() -> ! {
    // Out of the boot ROM, running from the ring oscillator with every pin
    // tristated.
    let p = rp2040_pac::Peripherals::take().unwrap();
    let mut cp = cortex_m::Peripherals::take().unwrap();

    //////////////////////////////////////////////////////////////////////////
    // Clocks. Crystal, then PLL_SYS to 132MHz for the core and PLL_USB to
    // 48MHz for the USB controller.

    p.XOSC.ctrl.write(|w| unsafe { w.bits(0xfab_aa0) });
    while !p.XOSC.status.read().stable().bit() {}
    p.CLOCKS.clk_ref_ctrl.write(|w| w.src().xosc_clksrc());
    while p.CLOCKS.clk_ref_selected.read().bits() != (1 << 2) {}
    // ROSC off. clk_ref and clk_sys are now the 12MHz crystal.
    p.ROSC.ctrl.write(|w| unsafe { w.bits(0xd1e_fa4) });

    // 12MHz / REFDIV 1 * FBDIV 132 = 1584MHz VCO, / 6 / 2 = 132MHz.
    p.RESETS.reset.modify(|_, w| w.pll_sys().clear_bit());
    while !p.RESETS.reset_done.read().pll_sys().bit() {}
    p.PLL_SYS.cs.write(|w| unsafe { w.refdiv().bits(1) });
    p.PLL_SYS.fbdiv_int.write(|w| unsafe { w.fbdiv_int().bits(132) });
    p.PLL_SYS.pwr.write(|w| w.pd().clear_bit().vcopd().clear_bit());
    while !p.PLL_SYS.cs.read().lock().bit() {}
    p.PLL_SYS.prim.write(|w| unsafe { w.postdiv1().bits(6).postdiv2().bits(2) });
    p.PLL_SYS.pwr.modify(|_, w| w.postdivpd().clear_bit());

    p.CLOCKS.clk_sys_ctrl.write(|w| w.auxsrc().clksrc_pll_sys());
    p.CLOCKS.clk_sys_ctrl.modify(|_, w| w.src().clksrc_clk_sys_aux());
    while p.CLOCKS.clk_sys_selected.read().bits() != (1 << 1) {}

    // 12MHz / REFDIV 1 * FBDIV 100 = 1200MHz VCO, / 5 / 5 = 48MHz.
    p.RESETS.reset.modify(|_, w| w.pll_usb().clear_bit());
    while !p.RESETS.reset_done.read().pll_usb().bit() {}
    p.PLL_USB.cs.write(|w| unsafe { w.refdiv().bits(1) });
    p.PLL_USB.fbdiv_int.write(|w| unsafe { w.fbdiv_int().bits(100) });
    p.PLL_USB.pwr.write(|w| w.pd().clear_bit().vcopd().clear_bit());
    while !p.PLL_USB.cs.read().lock().bit() {}
    p.PLL_USB.prim.write(|w| unsafe { w.postdiv1().bits(5).postdiv2().bits(5) });
    p.PLL_USB.pwr.modify(|_, w| w.postdivpd().clear_bit());

    p.CLOCKS.clk_usb_ctrl.write(|w| w.auxsrc().clksrc_pll_usb().enable().set_bit());

    // The watchdog tick generator also drives the TIMER's microsecond count.
    // clk_ref is 12MHz, so 12 cycles per tick.
    p.WATCHDOG.tick.write(|w| unsafe { w.cycles().bits(12).enable().set_bit() });

    //////////////////////////////////////////////////////////////////////////
    // Resets. Pulse USBCTRL in case we got here by watchdog, release what we
    // use, and make sure the ADC stays held.

    p.RESETS.reset.modify(|_, w| w.usbctrl().set_bit().adc().set_bit());
    p.RESETS.reset.modify(|_, w| {
        w.io_bank0().clear_bit()
            .pads_bank0().clear_bit()
            .timer().clear_bit()
            .usbctrl().clear_bit()
    });
    while {
        let done = p.RESETS.reset_done.read();
        !(done.io_bank0().bit() && done.pads_bank0().bit() && done.timer().bit() && done.usbctrl().bit())
    } {}

    //////////////////////////////////////////////////////////////////////////
    // Deep sleep only keeps what the loop needs to wake up and answer the
    // host.

    p.CLOCKS.sleep_en0.write(|w| unsafe { w.bits(SLEEP_EN0_KEEP) });
    p.CLOCKS.sleep_en1.write(|w| unsafe { w.bits(SLEEP_EN1_KEEP) });

    #[cfg(feature = "defmt")]
    defmt::info!("clocks up, sys 132MHz, usb 48MHz");

    //////////////////////////////////////////////////////////////////////////
    // Drivers, then off we go.

    let timer = p.TIMER;
    let port = SioPort::new(p.SIO, &p.IO_BANK0, &p.PADS_BANK0);
    let delay = TimerDelay::new(&timer);
    let power = Rp2040Power::new(p.WATCHDOG, &p.PSM, &timer, &mut cp.SCB);
    let transport = UsbTransport::new(p.USBCTRL_REGS, p.USBCTRL_DPRAM);

    Firmware::new(port, delay, transport, power, Timing::BUILD).run()
}

#[cfg(target_arch = "arm")]
cfg_if::cfg_if! {
    if #[cfg(feature = "target-feather")] {
        #[link_section = ".boot2"]
        #[used]
        pub static BOOT2_FIRMWARE: [u8; 256] = rp2040_boot2::BOOT_LOADER_GD25Q64CS;
    } else if #[cfg(feature = "target-pico")] {
        #[link_section = ".boot2"]
        #[used]
        pub static BOOT2_FIRMWARE: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;
    } else {
        compile_error!("must include one target-* feature");
    }
}
