//! Error type shared by every module of the crate.

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors reported by channels and the channel set.
///
/// Every fallible operation returns one of these; none are retried internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The requested target is out of range for the channel's mode.
    ///
    /// Channel state is left untouched.
    #[display("target out of range for this channel mode")]
    InvalidArgument,

    /// Timer registers could not be mapped or accessed while configuring.
    ///
    /// The channel stays unconfigured.
    #[display("timer hardware unavailable")]
    HardwareUnavailable,

    /// The operation needs a configured channel.
    #[display("channel not configured")]
    NotConfigured,

    /// The timer id is not one of the PWM-capable timers.
    #[display("timer is not PWM capable")]
    UnknownTimer,

    /// The same timer was listed more than once.
    #[display("timer listed more than once")]
    DuplicateTimer,

    /// More timers were listed than the hardware provides.
    #[display("too many timers listed")]
    TooManyTimers,
}
