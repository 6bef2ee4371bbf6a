// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sleeping, waking and not dying.

/// Liveness window. If the loop doesn't come around to `feed_watchdog`
/// within this long, the chip resets.
pub const WATCHDOG_PERIOD_MS: u32 = 1_000;

/// Period of the wake source armed by `arm_wake`. Bounds how long a sleep
/// can last when the bus is quiet.
pub const WAKE_PERIOD_MS: u32 = 16;

/// Power management as seen by the main loop.
pub trait Power {
    /// Restart the liveness window.
    fn feed_watchdog(&mut self);

    /// (Re)register the periodic wake source. The previous sleep may have
    /// consumed it, so this is done every iteration.
    fn arm_wake(&mut self);

    /// Run `f` with interrupts masked.
    fn interrupt_free<R>(&mut self, f: impl FnOnce() -> R) -> R;

    /// Halt until something wakes us: bus activity or the wake source.
    ///
    /// Implementations must not lose a wake event that lands between the
    /// caller's last check and the halt itself, or the device sleeps through
    /// a full wake period with work pending.
    fn sleep(&mut self);
}
