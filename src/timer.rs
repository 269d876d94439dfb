//! PWM-capable general-purpose timers and the register interface a channel drives.
//!
//! See [`PwmTimer`] for the operations a board support layer must provide.

use crate::{Error, Result};

/// Start of the pad configuration block holding the pin mux registers.
pub const PADCONF_START: u32 = 0x4800_2030;

/// Size of the pad configuration block in bytes.
pub const PADCONF_SIZE: u32 = 0x05cc;

/// Pad mux value routing a timer's PWM output to its pin (IDIS | PTD | DIS | M2).
pub const PWM_ENABLE_MUX: u16 = 0x0002;

/// Match-event bit in the timer interrupt status and enable registers.
pub const MATCH_INTERRUPT: u32 = 1 << 0;

/// Overflow-event bit in the timer interrupt status and enable registers.
pub const OVERFLOW_INTERRUPT: u32 = 1 << 1;

/// Maximum number of PWM-capable timers.
pub const MAX_TIMERS: usize = 4;

/// Identity of a PWM-capable general-purpose timer.
///
/// The identity selects the register base address and the pad mux offset of
/// the timer's output pin.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerId {
    /// General-purpose timer 8.
    Gpt8,
    /// General-purpose timer 9.
    Gpt9,
    /// General-purpose timer 10.
    Gpt10,
    /// General-purpose timer 11.
    Gpt11,
}

impl TimerId {
    /// All PWM-capable timers in hardware order.
    pub const ALL: [Self; MAX_TIMERS] = [Self::Gpt8, Self::Gpt9, Self::Gpt10, Self::Gpt11];

    /// Look up a timer by its hardware number (8 through 11).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTimer`] for any other number.
    pub const fn from_number(number: u8) -> Result<Self> {
        match number {
            8 => Ok(Self::Gpt8),
            9 => Ok(Self::Gpt9),
            10 => Ok(Self::Gpt10),
            11 => Ok(Self::Gpt11),
            _ => Err(Error::UnknownTimer),
        }
    }

    /// Hardware number of the timer.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Gpt8 => 8,
            Self::Gpt9 => 9,
            Self::Gpt10 => 10,
            Self::Gpt11 => 11,
        }
    }

    /// Physical base address of the timer's register page.
    #[must_use]
    pub const fn base_address(self) -> u32 {
        match self {
            Self::Gpt8 => 0x4903_E000,
            Self::Gpt9 => 0x4904_0000,
            Self::Gpt10 => 0x4808_6000,
            Self::Gpt11 => 0x4808_8000,
        }
    }

    /// Offset of the output pin's mux register from [`PADCONF_START`].
    #[must_use]
    pub const fn mux_offset(self) -> u32 {
        match self {
            Self::Gpt8 => 0x4800_217A - PADCONF_START,
            Self::Gpt9 => 0x4800_2174 - PADCONF_START,
            Self::Gpt10 => 0x4800_2176 - PADCONF_START,
            Self::Gpt11 => 0x4800_2178 - PADCONF_START,
        }
    }

    /// Position of the timer in [`TimerId::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Gpt8 => 0,
            Self::Gpt9 => 1,
            Self::Gpt10 => 2,
            Self::Gpt11 => 3,
        }
    }
}

/// Register-level access to one timer running in PWM mode.
///
/// Methods take `&self`: implementations wrap memory-mapped registers, which
/// are written through shared references, so the same timer can be driven from
/// the control path and from its match interrupt. Register writes never block.
///
/// The counter counts up from the reload value to `0xFFFF_FFFF`, wraps, and
/// reloads. The output toggles on overflow and on match.
pub trait PwmTimer {
    /// Put the timer into PWM mode: output low while stopped, pulse-toggle
    /// modulation, trigger on overflow and match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HardwareUnavailable`] if the registers cannot be reached.
    fn init_pwm(&self) -> Result<()>;

    /// Program the auto-reload value the counter restarts from after overflow.
    fn set_load(&self, reload: u32);

    /// Program the match register and enable compare.
    fn set_match(&self, value: u32);

    /// Start counting.
    fn start(&self);

    /// Stop counting. The output returns to its idle level.
    fn stop(&self);

    /// Enable or disable the match interrupt.
    fn set_match_interrupt(&self, enabled: bool);

    /// Read the interrupt status register.
    fn read_status(&self) -> u32;

    /// Write the interrupt status register. Writing a one clears that event.
    fn write_status(&self, status: u32);
}

impl<T: PwmTimer + ?Sized> PwmTimer for &T {
    fn init_pwm(&self) -> Result<()> {
        (**self).init_pwm()
    }

    fn set_load(&self, reload: u32) {
        (**self).set_load(reload);
    }

    fn set_match(&self, value: u32) {
        (**self).set_match(value);
    }

    fn start(&self) {
        (**self).start();
    }

    fn stop(&self) {
        (**self).stop();
    }

    fn set_match_interrupt(&self, enabled: bool) {
        (**self).set_match_interrupt(enabled);
    }

    fn read_status(&self) -> u32 {
        (**self).read_status()
    }

    fn write_status(&self, status: u32) {
        (**self).write_status(status);
    }
}
