//! Board services a channel set depends on but does not implement.
//!
//! The pad mux routes each timer's output to its pin, and the clock source
//! feeds each timer's counter. A [`ChannelSet`](crate::channel_set::ChannelSet)
//! calls these in a fixed order: mux and clock before a channel is configured,
//! and the reverse only after the channel has been stopped.

use crate::Result;
use crate::timer::TimerId;

/// Pin multiplexer that can route a timer's PWM output to its pad.
pub trait PinMux {
    /// Route `timer`'s output to its pad and return the previous pad setting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HardwareUnavailable`](crate::Error::HardwareUnavailable)
    /// if the pad configuration registers cannot be mapped.
    fn enable_pwm_output(&mut self, timer: TimerId) -> Result<u16>;

    /// Put back a pad setting returned by [`enable_pwm_output`](Self::enable_pwm_output).
    ///
    /// # Errors
    ///
    /// Returns [`Error::HardwareUnavailable`](crate::Error::HardwareUnavailable)
    /// if the pad configuration registers cannot be mapped.
    fn restore(&mut self, timer: TimerId, previous: u16) -> Result<()>;
}

/// Functional clock feeding each timer's counter.
///
/// The rate may change if the board switches a timer between clock sources;
/// the affected channel must then be configured again.
pub trait ClockSource {
    /// Enable the timer's functional clock and return its rate in Hz.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HardwareUnavailable`](crate::Error::HardwareUnavailable)
    /// if the clock cannot be enabled.
    fn enable(&mut self, timer: TimerId) -> Result<u32>;

    /// Disable the timer's functional clock.
    fn disable(&mut self, timer: TimerId);
}
