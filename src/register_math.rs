//! Conversions from output frequency and logical targets to timer register values.
//!
//! Everything here is pure integer arithmetic: no hardware access, no locking,
//! no allocation. The functions are safe to call from interrupt context.
//!
//! The timer counts up from a reload value to [`COUNTER_MAX`] and wraps, so one
//! output cycle is `COUNTER_MAX - reload + 1` ticks. A [`Period`] carries both
//! the reload value and the number of usable match settings within the cycle.
//! Match functions return a tick offset within the period; add it to the
//! reload value with [`Period::match_register`] to get the register value.

use crate::{Error, Result};

/// Value at which the timer counter wraps.
pub const COUNTER_MAX: u32 = 0xFFFF_FFFF;

/// Tenths of a microsecond in one second (pulse widths are given in 0.1 µs).
pub const TENTHS_OF_US_PER_SECOND: u32 = 10_000_000;

/// Output frequency used when none (or zero) is requested.
pub const DEFAULT_FREQUENCY_HZ: u32 = 1024;

/// Output frequency hobby servos expect (one frame every 20 ms).
pub const SERVO_FREQUENCY_HZ: u32 = 50;

/// Timing of one output cycle for a given input clock and output frequency.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Period {
    /// Output frequency actually produced, after clamping the request.
    pub frequency: u32,
    /// Auto-reload register value.
    pub reload: u32,
    /// Number of usable match settings in one cycle. Always at least 1.
    pub count: u32,
}

impl Period {
    /// Absolute match register value for a tick offset within this period.
    #[must_use]
    pub const fn match_register(self, ticks: u32) -> u32 {
        self.reload.saturating_add(ticks)
    }
}

/// Result of mapping a logical target onto a period.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MatchCount {
    /// The target means "turn the output off", not a zero-width pulse.
    Off,
    /// Match at this many ticks into the period, within `1..=period.count`.
    Ticks(u32),
}

/// Clamp a requested output frequency to what the input clock can produce.
///
/// Zero selects [`DEFAULT_FREQUENCY_HZ`]; anything above half the input clock is
/// lowered to half the input clock.
#[must_use]
pub fn effective_frequency(input_freq: u32, requested_freq: u32) -> u32 {
    let requested = if requested_freq == 0 {
        DEFAULT_FREQUENCY_HZ
    } else {
        requested_freq
    };
    requested.min((input_freq / 2).max(1))
}

/// Compute the reload value and period count for an output frequency.
///
/// `reload = COUNTER_MAX - (input_freq / frequency - 1)` and
/// `count = COUNTER_MAX - 1 - reload`, raised to 1 if the frequency leaves no
/// room for a match setting.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `input_freq` is below 2 Hz, which
/// cannot produce any output cycle.
pub fn period_from_frequency(input_freq: u32, requested_freq: u32) -> Result<Period> {
    if input_freq < 2 {
        return Err(Error::InvalidArgument);
    }
    let frequency = effective_frequency(input_freq, requested_freq);
    // frequency <= input_freq / 2, so there are at least 2 ticks per cycle.
    let ticks_per_cycle = input_freq.checked_div(frequency).unwrap_or(2);
    let reload = COUNTER_MAX.saturating_sub(ticks_per_cycle.saturating_sub(1));
    let count = (COUNTER_MAX - 1).saturating_sub(reload).max(1);
    Ok(Period {
        frequency,
        reload,
        count,
    })
}

/// Map a duty cycle in percent onto a period.
///
/// `0` means off. Otherwise `period_count * duty_percent / 100`, clamped to
/// `1..=period_count`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `duty_percent` is above 100.
pub fn match_from_duty(period_count: u32, duty_percent: u32) -> Result<MatchCount> {
    if duty_percent > 100 {
        return Err(Error::InvalidArgument);
    }
    if duty_percent == 0 {
        return Ok(MatchCount::Off);
    }
    let ticks = u64::from(period_count).saturating_mul(u64::from(duty_percent)) / 100;
    Ok(MatchCount::Ticks(clamp_ticks(ticks, period_count)))
}

/// Map a pulse width in tenths of a microsecond onto a period.
///
/// `0` means off. The scaling factor is divided out before multiplying by the
/// period so the intermediate product stays small:
/// `factor = TENTHS_OF_US_PER_SECOND / (output_freq * 2)`,
/// `ticks = pulse * (period_count / 2) / factor`, clamped to `1..=period_count`.
/// The product is accumulated in 64 bits; for any `u32` inputs it cannot
/// overflow.
#[must_use]
pub fn match_from_pulse_width(
    period_count: u32,
    input_freq: u32,
    output_freq: u32,
    pulse_tenths_us: u32,
) -> MatchCount {
    if pulse_tenths_us == 0 {
        return MatchCount::Off;
    }
    let output_freq = u64::from(effective_frequency(input_freq, output_freq));
    let factor = u64::from(TENTHS_OF_US_PER_SECOND) / output_freq.saturating_mul(2);
    let Some(ticks) = u64::from(pulse_tenths_us)
        .saturating_mul(u64::from(period_count) / 2)
        .checked_div(factor)
    else {
        // Cycle shorter than 0.1 µs: any pulse fills it.
        return MatchCount::Ticks(period_count.max(1));
    };
    MatchCount::Ticks(clamp_ticks(ticks, period_count))
}

/// Map a servo pulse in tenths of a microsecond onto a period.
///
/// Uses the pulse-width mapping once the pulse is known to lie within the
/// servo's travel.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the pulse is outside
/// `servo_min..=servo_max`.
pub fn match_from_servo(
    period_count: u32,
    input_freq: u32,
    output_freq: u32,
    servo_min: u32,
    servo_max: u32,
    pulse_tenths_us: u32,
) -> Result<MatchCount> {
    if !(servo_min..=servo_max).contains(&pulse_tenths_us) {
        return Err(Error::InvalidArgument);
    }
    Ok(match_from_pulse_width(
        period_count,
        input_freq,
        output_freq,
        pulse_tenths_us,
    ))
}

fn clamp_ticks(ticks: u64, period_count: u32) -> u32 {
    let upper = period_count.max(1);
    u32::try_from(ticks).map_or(upper, |ticks| ticks.clamp(1, upper))
}
