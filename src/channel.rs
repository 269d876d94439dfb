//! A device abstraction for one PWM output driven by a general-purpose timer.
//!
//! See [`Channel`] for usage and [`MatchHandler`] for interrupt-driven updates.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;

use crate::register_math::{
    DEFAULT_FREQUENCY_HZ, MatchCount, Period, SERVO_FREQUENCY_HZ, match_from_duty,
    match_from_pulse_width, match_from_servo, period_from_frequency,
};
use crate::timer::{MATCH_INTERRUPT, PwmTimer, TimerId};
use crate::{Error, Result};

/// Shortest servo pulse accepted in any configuration (tenths of µs).
pub const SERVO_ABSOLUTE_MIN: u32 = 5_000;

/// Longest servo pulse accepted in any configuration (tenths of µs).
pub const SERVO_ABSOLUTE_MAX: u32 = 25_000;

/// Default shortest servo pulse (tenths of µs).
pub const SERVO_MIN_DEFAULT: u32 = 10_000;

/// Default longest servo pulse (tenths of µs).
pub const SERVO_MAX_DEFAULT: u32 = 20_000;

/// Servo center pulse (tenths of µs).
pub const SERVO_CENTER: u32 = 15_000;

/// Travel limits of a servo, as pulse widths in tenths of a microsecond.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServoRange {
    min: u32,
    max: u32,
}

impl ServoRange {
    /// The widest range any servo channel accepts.
    pub const ABSOLUTE: Self = Self {
        min: SERVO_ABSOLUTE_MIN,
        max: SERVO_ABSOLUTE_MAX,
    };

    /// The range used when none is configured.
    pub const DEFAULT: Self = Self {
        min: SERVO_MIN_DEFAULT,
        max: SERVO_MAX_DEFAULT,
    };

    /// Create a range, limited to [`ServoRange::ABSOLUTE`].
    ///
    /// An empty or inverted range falls back to the absolute range.
    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        let min = if min < SERVO_ABSOLUTE_MIN {
            SERVO_ABSOLUTE_MIN
        } else {
            min
        };
        let max = if max > SERVO_ABSOLUTE_MAX {
            SERVO_ABSOLUTE_MAX
        } else {
            max
        };
        if min >= max {
            Self::ABSOLUTE
        } else {
            Self { min, max }
        }
    }

    /// Shortest accepted pulse.
    #[must_use]
    pub const fn min(self) -> u32 {
        self.min
    }

    /// Longest accepted pulse.
    #[must_use]
    pub const fn max(self) -> u32 {
        self.max
    }

    /// Limit a pulse to this range.
    #[must_use]
    pub const fn clamp(self, pulse: u32) -> u32 {
        if pulse < self.min {
            self.min
        } else if pulse > self.max {
            self.max
        } else {
            pulse
        }
    }

    /// Whether a pulse lies within this range.
    #[must_use]
    pub const fn contains(self, pulse: u32) -> bool {
        pulse >= self.min && pulse <= self.max
    }
}

impl Default for ServoRange {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What a channel's target value means. Fixed for the life of the channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelMode {
    /// Target is a duty cycle in percent, `0..=100`.
    DutyCycle,
    /// Target is a pulse width in tenths of a microsecond.
    PulseWidth,
    /// Target is a servo pulse in tenths of a microsecond, limited to the range.
    Servo(ServoRange),
}

impl ChannelMode {
    /// Output frequency used when a channel is configured with frequency 0.
    #[must_use]
    pub const fn default_frequency(self) -> u32 {
        match self {
            Self::Servo(_) => SERVO_FREQUENCY_HZ,
            Self::DutyCycle | Self::PulseWidth => DEFAULT_FREQUENCY_HZ,
        }
    }

    /// Map a target value onto a period using this mode's scaling and validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `value` is out of range for the mode.
    pub fn match_count(self, period: Period, input_freq: u32, value: u32) -> Result<MatchCount> {
        match self {
            Self::DutyCycle => match_from_duty(period.count, value),
            Self::PulseWidth => Ok(match_from_pulse_width(
                period.count,
                input_freq,
                period.frequency,
                value,
            )),
            Self::Servo(range) => match_from_servo(
                period.count,
                input_freq,
                period.frequency,
                range.min,
                range.max,
                value,
            ),
        }
    }
}

/// How a new match value reaches a running timer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Delivery {
    /// Write the match register as soon as the target changes.
    ///
    /// Simple, but a write landing mid-cycle can produce one malformed pulse.
    Immediate,
    /// Hand the value to the match interrupt, which latches it right after
    /// the timer's own match event so the change lands on a cycle boundary.
    ///
    /// The board must call [`MatchHandler::on_match_interrupt`] from the
    /// timer's interrupt.
    OnMatchInterrupt,
}

/// Snapshot of a channel's observable state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelStatus {
    /// Whether the timer is counting and driving the output.
    pub running: bool,
    /// Last target applied, in the mode's unit. 0 while off.
    pub current_target: u32,
    /// Output frequency in Hz.
    pub output_frequency: u32,
}

#[derive(Clone, Copy)]
struct Timing {
    input_freq: u32,
    period: Period,
}

struct ChannelState {
    timing: Option<Timing>,
    running: bool,
    current_target: u32,
}

/// A device abstraction for one PWM output driven by a general-purpose timer.
///
/// A channel starts unconfigured. [`configure`](Self::configure) programs the
/// output frequency and leaves the output off. [`set_target`](Self::set_target)
/// starts or updates the output, and a target of `0` turns it off.
///
/// Control operations are serialized by a per-channel async lock. A caller
/// waiting for the lock can be cancelled by dropping its future; channel state
/// is only changed once the lock is held, and never across an `.await`.
///
/// # Example
///
/// ```rust
/// use embassy_futures::block_on;
/// use gpt_pwm::channel::{Channel, ChannelMode, Delivery};
/// use gpt_pwm::sim::SimTimer;
/// use gpt_pwm::timer::TimerId;
///
/// let channel = Channel::new(TimerId::Gpt9, SimTimer::new(), ChannelMode::DutyCycle, Delivery::Immediate);
///
/// block_on(async {
///     channel.configure(13_000_000, 1024).await?;
///     channel.set_target(25).await?; // 25% duty cycle
///
///     let status = channel.read_state().await?;
///     assert!(status.running);
///     assert_eq!(status.current_target, 25);
///
///     channel.set_target(0).await?; // off
///     assert!(!channel.read_state().await?.running);
///     Ok::<(), gpt_pwm::Error>(())
/// })?;
/// # Ok::<(), gpt_pwm::Error>(())
/// ```
pub struct Channel<T> {
    id: TimerId,
    mode: ChannelMode,
    delivery: Delivery,
    timer: T,
    state: Mutex<CriticalSectionRawMutex, ChannelState>,
    // Register value handed to the match interrupt. Held only to copy the value.
    pending_match: BlockingMutex<CriticalSectionRawMutex, Cell<u32>>,
}

impl<T: PwmTimer> Channel<T> {
    /// Create an unconfigured channel. Usable in `static` initializers.
    #[must_use]
    pub const fn new(id: TimerId, timer: T, mode: ChannelMode, delivery: Delivery) -> Self {
        Self {
            id,
            mode,
            delivery,
            timer,
            state: Mutex::new(ChannelState {
                timing: None,
                running: false,
                current_target: 0,
            }),
            pending_match: BlockingMutex::new(Cell::new(0)),
        }
    }

    /// Hardware identity of the timer behind this channel.
    #[must_use]
    pub const fn id(&self) -> TimerId {
        self.id
    }

    /// What this channel's target values mean.
    #[must_use]
    pub const fn mode(&self) -> ChannelMode {
        self.mode
    }

    /// How new match values reach the running timer.
    #[must_use]
    pub const fn delivery(&self) -> Delivery {
        self.delivery
    }

    /// The timer this channel drives.
    #[must_use]
    pub const fn timer(&self) -> &T {
        &self.timer
    }

    /// Program the timer for PWM at `output_freq` from an `input_freq` clock.
    ///
    /// An output frequency of 0 selects the mode's default. Frequencies above
    /// half the input clock are lowered. Any running output is stopped first,
    /// since the previous match value no longer fits the new period; the
    /// channel is left off.
    ///
    /// Call again after the input clock changes.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `input_freq` cannot produce a cycle
    ///   (channel state untouched).
    /// - [`Error::HardwareUnavailable`] if the timer cannot be put into PWM
    ///   mode (channel left unconfigured).
    pub async fn configure(&self, input_freq: u32, output_freq: u32) -> Result<()> {
        let mut state = self.state.lock().await;
        self.configure_locked(&mut state, input_freq, output_freq)
    }

    /// Change the output frequency, keeping the current input clock.
    ///
    /// The output is turned off, as with [`configure`](Self::configure).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConfigured`] before the first `configure`, or any
    /// error `configure` can return.
    pub async fn set_output_frequency(&self, output_freq: u32) -> Result<()> {
        let mut state = self.state.lock().await;
        let timing = state.timing.ok_or(Error::NotConfigured)?;
        self.configure_locked(&mut state, timing.input_freq, output_freq)
    }

    /// Apply a new target in the channel's unit.
    ///
    /// `0` turns the output off and succeeds. Otherwise the value is validated
    /// and mapped to a match count, which is written to the timer right away
    /// ([`Delivery::Immediate`]) or handed to the match interrupt
    /// ([`Delivery::OnMatchInterrupt`]). A stopped timer is primed with the
    /// new match value and started directly.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConfigured`] before the first `configure`.
    /// - [`Error::InvalidArgument`] if the value is out of range for the
    ///   mode. Nothing is changed.
    pub async fn set_target(&self, value: u32) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(timing) = state.timing else {
            warn!("pwm{}: set_target before configure", self.id.number());
            return Err(Error::NotConfigured);
        };

        if value == 0 {
            self.turn_off(&mut state);
            return Ok(());
        }

        let ticks = match self.mode.match_count(timing.period, timing.input_freq, value) {
            Ok(MatchCount::Ticks(ticks)) => ticks,
            Ok(MatchCount::Off) => {
                self.turn_off(&mut state);
                return Ok(());
            }
            Err(err) => {
                warn!(
                    "pwm{}: target {} rejected: {}",
                    self.id.number(),
                    value,
                    err
                );
                return Err(err);
            }
        };
        let register = timing.period.match_register(ticks);

        match self.delivery {
            Delivery::Immediate => {
                self.timer.set_match(register);
                if !state.running {
                    self.timer.start();
                }
            }
            Delivery::OnMatchInterrupt => {
                self.pending_match.lock(|pending| pending.set(register));
                if !state.running {
                    // Nothing to glitch while stopped: prime the register directly.
                    self.timer.set_match(register);
                    self.timer.start();
                }
                self.timer.set_match_interrupt(true);
            }
        }

        state.running = true;
        state.current_target = value;
        debug!(
            "pwm{}: target {} -> match {} of {}",
            self.id.number(),
            value,
            ticks,
            timing.period.count
        );
        Ok(())
    }

    /// Snapshot the channel's state. No hardware access.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConfigured`] before the first `configure`.
    pub async fn read_state(&self) -> Result<ChannelStatus> {
        let state = self.state.lock().await;
        let timing = state.timing.ok_or(Error::NotConfigured)?;
        Ok(ChannelStatus {
            running: state.running,
            current_target: state.current_target,
            output_frequency: timing.period.frequency,
        })
    }

    /// Stop the timer and disable its match interrupt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConfigured`] before the first `configure`.
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.timing.is_none() {
            return Err(Error::NotConfigured);
        }
        self.turn_off(&mut state);
        Ok(())
    }

    /// The interrupt-side capability of this channel.
    ///
    /// Returns `None` unless the channel uses [`Delivery::OnMatchInterrupt`].
    #[must_use]
    pub const fn match_handler(&self) -> Option<MatchHandler<'_, T>> {
        match self.delivery {
            Delivery::OnMatchInterrupt => Some(MatchHandler {
                id: self.id,
                timer: &self.timer,
                pending_match: &self.pending_match,
            }),
            Delivery::Immediate => None,
        }
    }

    fn configure_locked(
        &self,
        state: &mut ChannelState,
        input_freq: u32,
        output_freq: u32,
    ) -> Result<()> {
        let requested = if output_freq == 0 {
            self.mode.default_frequency()
        } else {
            output_freq
        };
        let period = period_from_frequency(input_freq, requested).inspect_err(|_| {
            warn!(
                "pwm{}: unusable input clock {} Hz",
                self.id.number(),
                input_freq
            );
        })?;

        if state.timing.is_some() {
            self.turn_off(state);
        }
        if let Err(err) = self.timer.init_pwm() {
            error!("pwm{}: timer registers unavailable", self.id.number());
            state.timing = None;
            return Err(err);
        }
        self.timer.set_load(period.reload);
        state.timing = Some(Timing { input_freq, period });

        info!(
            "pwm{}: input {} Hz, output {} Hz, {} settings",
            self.id.number(),
            input_freq,
            period.frequency,
            period.count
        );
        Ok(())
    }

    fn turn_off(&self, state: &mut ChannelState) {
        if self.delivery == Delivery::OnMatchInterrupt {
            self.timer.set_match_interrupt(false);
        }
        self.timer.stop();
        if state.running {
            debug!("pwm{}: off", self.id.number());
        }
        state.running = false;
        state.current_target = 0;
    }
}

/// Interrupt-side capability of a [`Delivery::OnMatchInterrupt`] channel.
///
/// It can only latch the value the control path last handed over; it never
/// computes targets or touches channel state.
///
/// # Example
///
/// ```rust
/// use embassy_futures::block_on;
/// use gpt_pwm::channel::{Channel, ChannelMode, Delivery};
/// use gpt_pwm::sim::SimTimer;
/// use gpt_pwm::timer::TimerId;
///
/// let channel = Channel::new(
///     TimerId::Gpt11,
///     SimTimer::new(),
///     ChannelMode::DutyCycle,
///     Delivery::OnMatchInterrupt,
/// );
/// let handler = channel.match_handler().expect("interrupt-driven channel");
///
/// block_on(channel.configure(13_000_000, 50))?;
/// block_on(channel.set_target(10))?; // starts the timer with 10%
/// block_on(channel.set_target(90))?; // waits for the next match event
/// let primed = channel.timer().match_value();
///
/// channel.timer().raise_match();
/// assert!(handler.on_match_interrupt());
/// assert_ne!(channel.timer().match_value(), primed);
/// # Ok::<(), gpt_pwm::Error>(())
/// ```
pub struct MatchHandler<'a, T> {
    id: TimerId,
    timer: &'a T,
    pending_match: &'a BlockingMutex<CriticalSectionRawMutex, Cell<u32>>,
}

impl<T> Clone for MatchHandler<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MatchHandler<'_, T> {}

impl<T: PwmTimer> MatchHandler<'_, T> {
    /// Latch the pending match value and acknowledge the match event.
    ///
    /// Call from the timer's interrupt. Runs right after the hardware match,
    /// so the new value takes effect on a cycle boundary. Never blocks.
    ///
    /// Returns `false` without touching the timer if no match event is
    /// pending, as happens on a shared interrupt line.
    pub fn on_match_interrupt(&self) -> bool {
        let status = self.timer.read_status();
        if status & MATCH_INTERRUPT == 0 {
            return false;
        }

        let value = self.pending_match.lock(Cell::get);
        self.timer.set_match(value);
        self.timer.write_status(MATCH_INTERRUPT);

        trace!("pwm{}: latched match {}", self.id.number(), value);
        true
    }
}
