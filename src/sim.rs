//! In-memory stand-ins for timer registers, the pad mux, and timer clocks.
//!
//! Only built with the `host` feature. Tests and doc examples drive these the
//! way a board support layer drives real hardware, then inspect what was
//! written.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::board::{ClockSource, PinMux};
use crate::timer::{MATCH_INTERRUPT, MAX_TIMERS, PADCONF_SIZE, PWM_ENABLE_MUX, PwmTimer, TimerId};
use crate::{Error, Result};

/// Register file of one simulated timer.
///
/// Every register is an atomic, so a test may drive the control path and the
/// match interrupt from different threads.
#[derive(Debug)]
pub struct SimTimer {
    available: bool,
    pwm_mode: AtomicBool,
    reload: AtomicU32,
    match_value: AtomicU32,
    running: AtomicBool,
    match_interrupt: AtomicBool,
    status: AtomicU32,
    match_writes: AtomicU32,
    starts: AtomicU32,
}

impl SimTimer {
    /// A stopped timer with all registers zero.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_availability(true)
    }

    /// A timer whose registers cannot be reached; `init_pwm` fails.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self::with_availability(false)
    }

    const fn with_availability(available: bool) -> Self {
        Self {
            available,
            pwm_mode: AtomicBool::new(false),
            reload: AtomicU32::new(0),
            match_value: AtomicU32::new(0),
            running: AtomicBool::new(false),
            match_interrupt: AtomicBool::new(false),
            status: AtomicU32::new(0),
            match_writes: AtomicU32::new(0),
            starts: AtomicU32::new(0),
        }
    }

    /// Simulate the counter reaching the match register.
    pub fn raise_match(&self) {
        self.status.fetch_or(MATCH_INTERRUPT, Ordering::AcqRel);
    }

    /// Set arbitrary interrupt status bits, as another event would.
    pub fn raise_status(&self, bits: u32) {
        self.status.fetch_or(bits, Ordering::AcqRel);
    }

    /// Whether `init_pwm` has succeeded.
    #[must_use]
    pub fn is_pwm_mode(&self) -> bool {
        self.pwm_mode.load(Ordering::Acquire)
    }

    /// Auto-reload register.
    #[must_use]
    pub fn reload(&self) -> u32 {
        self.reload.load(Ordering::Acquire)
    }

    /// Match register.
    #[must_use]
    pub fn match_value(&self) -> u32 {
        self.match_value.load(Ordering::Acquire)
    }

    /// Whether the counter is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether the match interrupt is enabled.
    #[must_use]
    pub fn match_interrupt_enabled(&self) -> bool {
        self.match_interrupt.load(Ordering::Acquire)
    }

    /// Interrupt status register.
    #[must_use]
    pub fn status(&self) -> u32 {
        self.status.load(Ordering::Acquire)
    }

    /// Number of writes to the match register so far.
    #[must_use]
    pub fn match_writes(&self) -> u32 {
        self.match_writes.load(Ordering::Acquire)
    }

    /// Number of times the counter was started so far.
    #[must_use]
    pub fn starts(&self) -> u32 {
        self.starts.load(Ordering::Acquire)
    }
}

impl Default for SimTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl PwmTimer for SimTimer {
    fn init_pwm(&self) -> Result<()> {
        if !self.available {
            return Err(Error::HardwareUnavailable);
        }
        self.pwm_mode.store(true, Ordering::Release);
        Ok(())
    }

    fn set_load(&self, reload: u32) {
        self.reload.store(reload, Ordering::Release);
    }

    fn set_match(&self, value: u32) {
        self.match_value.store(value, Ordering::Release);
        self.match_writes.fetch_add(1, Ordering::AcqRel);
    }

    fn start(&self) {
        self.running.store(true, Ordering::Release);
        self.starts.fetch_add(1, Ordering::AcqRel);
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn set_match_interrupt(&self, enabled: bool) {
        self.match_interrupt.store(enabled, Ordering::Release);
    }

    fn read_status(&self) -> u32 {
        self.status()
    }

    fn write_status(&self, status: u32) {
        self.status.fetch_and(!status, Ordering::AcqRel);
    }
}

const PAD_COUNT: usize = PADCONF_SIZE as usize / 2;

/// Pad configuration block of the simulated board.
///
/// One 16-bit register per pad, addressed by [`TimerId::mux_offset`] the way
/// the real block is addressed from [`PADCONF_START`](crate::timer::PADCONF_START).
#[derive(Debug)]
pub struct SimMux {
    pads: [u16; PAD_COUNT],
    fail_on: Option<TimerId>,
}

impl SimMux {
    /// All pads start at 0.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_pads(0)
    }

    /// Every pad starts at `value`.
    #[must_use]
    pub const fn with_pads(value: u16) -> Self {
        Self {
            pads: [value; PAD_COUNT],
            fail_on: None,
        }
    }

    /// A mux that cannot reach the pad of `timer`.
    #[must_use]
    pub const fn failing_on(mut self, timer: TimerId) -> Self {
        self.fail_on = Some(timer);
        self
    }

    /// Current pad setting of `timer`'s output pin.
    #[must_use]
    pub fn pad(&self, timer: TimerId) -> u16 {
        self.pad_at(timer.mux_offset()).unwrap_or_default()
    }

    /// Pad register at a byte offset into the block, if the offset is inside it.
    #[must_use]
    pub fn pad_at(&self, offset: u32) -> Option<u16> {
        self.pads.get(pad_index(offset)?).copied()
    }

    fn pad_mut(&mut self, timer: TimerId) -> Result<&mut u16> {
        if self.fail_on == Some(timer) {
            return Err(Error::HardwareUnavailable);
        }
        pad_index(timer.mux_offset())
            .and_then(|index| self.pads.get_mut(index))
            .ok_or(Error::HardwareUnavailable)
    }
}

impl Default for SimMux {
    fn default() -> Self {
        Self::new()
    }
}

fn pad_index(offset: u32) -> Option<usize> {
    if offset % 2 != 0 {
        return None;
    }
    usize::try_from(offset / 2).ok()
}

impl PinMux for SimMux {
    fn enable_pwm_output(&mut self, timer: TimerId) -> Result<u16> {
        let pad = self.pad_mut(timer)?;
        let previous = *pad;
        *pad = PWM_ENABLE_MUX;
        Ok(previous)
    }

    fn restore(&mut self, timer: TimerId, previous: u16) -> Result<()> {
        *self.pad_mut(timer)? = previous;
        Ok(())
    }
}

/// Functional clocks of the simulated timers.
#[derive(Debug, Default)]
pub struct SimClocks {
    rates: [u32; MAX_TIMERS],
    enabled: [bool; MAX_TIMERS],
    fail_on: Option<TimerId>,
}

impl SimClocks {
    /// Every timer clocked at `rate` Hz, all clocks disabled.
    #[must_use]
    pub const fn new(rate: u32) -> Self {
        Self {
            rates: [rate; MAX_TIMERS],
            enabled: [false; MAX_TIMERS],
            fail_on: None,
        }
    }

    /// A clock source that cannot enable `timer`'s clock.
    #[must_use]
    pub const fn failing_on(mut self, timer: TimerId) -> Self {
        self.fail_on = Some(timer);
        self
    }

    /// Make later `enable` calls for `timer` fail, or clear the failure with `None`.
    pub fn set_failing(&mut self, timer: Option<TimerId>) {
        self.fail_on = timer;
    }

    /// Switch `timer` to a clock running at `rate` Hz.
    pub fn set_rate(&mut self, timer: TimerId, rate: u32) {
        if let Some(slot) = self.rates.get_mut(timer.index()) {
            *slot = rate;
        }
    }

    /// Whether `timer`'s clock is enabled.
    #[must_use]
    pub fn is_enabled(&self, timer: TimerId) -> bool {
        self.enabled.get(timer.index()).copied().unwrap_or_default()
    }
}

impl ClockSource for SimClocks {
    fn enable(&mut self, timer: TimerId) -> Result<u32> {
        if self.fail_on == Some(timer) {
            return Err(Error::HardwareUnavailable);
        }
        let rate = self
            .rates
            .get(timer.index())
            .copied()
            .ok_or(Error::HardwareUnavailable)?;
        if let Some(enabled) = self.enabled.get_mut(timer.index()) {
            *enabled = true;
        }
        Ok(rate)
    }

    fn disable(&mut self, timer: TimerId) {
        if let Some(enabled) = self.enabled.get_mut(timer.index()) {
            *enabled = false;
        }
    }
}
