//! Settings shared by every channel of a [`ChannelSet`](crate::channel_set::ChannelSet).
//!
//! See [`Config`] for the defaults and how they combine.

use crate::channel::{ChannelMode, Delivery, SERVO_CENTER, ServoRange};
use crate::register_math::{DEFAULT_FREQUENCY_HZ, SERVO_FREQUENCY_HZ};

/// Settings shared by every channel of a channel set.
///
/// | Setting       | Default                    |
/// |---------------|----------------------------|
/// | `mode`        | [`ChannelMode::DutyCycle`] |
/// | `frequency`   | 0 (1024 Hz)                |
/// | `delivery`    | [`Delivery::Immediate`]    |
/// | `mux`         | `true`                     |
/// | `servo_start` | 15000 (1.5 ms)             |
///
/// Servo mode always runs at 50 Hz and ignores `frequency`.
///
/// # Example
///
/// ```rust
/// use gpt_pwm::channel::{ChannelMode, Delivery, ServoRange};
/// use gpt_pwm::config::Config;
///
/// let config = Config::servo(ServoRange::new(9_000, 21_000))
///     .with_delivery(Delivery::OnMatchInterrupt)
///     .with_servo_start(30_000);
///
/// assert_eq!(config.output_frequency(), 50);
/// assert_eq!(config.start_target(), Some(21_000)); // clamped into the range
/// assert!(matches!(config.mode, ChannelMode::Servo(_)));
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// What target values mean on every channel.
    pub mode: ChannelMode,
    /// Requested output frequency in Hz. 0 selects the default.
    pub frequency: u32,
    /// How new match values reach running timers.
    pub delivery: Delivery,
    /// Whether to route timer outputs through the pad mux. Turn off when the
    /// board has already muxed the pins.
    pub mux: bool,
    /// Servo pulse applied right after bring-up, in tenths of µs.
    pub servo_start: u32,
}

impl Config {
    /// Duty-cycle channels at the default frequency.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: ChannelMode::DutyCycle,
            frequency: 0,
            delivery: Delivery::Immediate,
            mux: true,
            servo_start: SERVO_CENTER,
        }
    }

    /// Servo channels limited to `range`, started at the center pulse.
    #[must_use]
    pub const fn servo(range: ServoRange) -> Self {
        Self::new().with_mode(ChannelMode::Servo(range))
    }

    /// Replace the channel mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: ChannelMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replace the requested output frequency.
    #[must_use]
    pub const fn with_frequency(mut self, frequency: u32) -> Self {
        self.frequency = frequency;
        self
    }

    /// Replace the delivery of new match values.
    #[must_use]
    pub const fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Enable or skip pad muxing.
    #[must_use]
    pub const fn with_mux(mut self, mux: bool) -> Self {
        self.mux = mux;
        self
    }

    /// Replace the servo start pulse.
    #[must_use]
    pub const fn with_servo_start(mut self, servo_start: u32) -> Self {
        self.servo_start = servo_start;
        self
    }

    /// Output frequency requested from each channel at bring-up.
    #[must_use]
    pub const fn output_frequency(&self) -> u32 {
        match self.mode {
            ChannelMode::Servo(_) => SERVO_FREQUENCY_HZ,
            ChannelMode::DutyCycle | ChannelMode::PulseWidth => {
                if self.frequency == 0 {
                    DEFAULT_FREQUENCY_HZ
                } else {
                    self.frequency
                }
            }
        }
    }

    /// Target applied to each channel right after bring-up, if any.
    ///
    /// Servo channels start at `servo_start` clamped into the servo range;
    /// other modes start off.
    #[must_use]
    pub const fn start_target(&self) -> Option<u32> {
        match self.mode {
            ChannelMode::Servo(range) => Some(range.clamp(self.servo_start)),
            ChannelMode::DutyCycle | ChannelMode::PulseWidth => None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
