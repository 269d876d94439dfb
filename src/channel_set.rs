//! The set of PWM channels owned by the system initializer.
//!
//! See [`ChannelSet`] for bring-up and teardown order.

use heapless::Vec;

use crate::board::{ClockSource, PinMux};
use crate::channel::{Channel, MatchHandler};
use crate::config::Config;
use crate::timer::{MAX_TIMERS, PwmTimer, TimerId};
use crate::{Error, Result};

struct Slot<T> {
    channel: Channel<T>,
    saved_mux: Option<u16>,
    clock_enabled: bool,
}

/// All PWM channels of the system, indexed by [`TimerId`].
///
/// The set owns the channels together with the pad mux and clock collaborators
/// and brings them up and down in a fixed order:
///
/// - [`init`](Self::init): mux every output, then for each channel enable its
///   clock and configure it. Servo channels are then driven to the start pulse.
///   If any step fails, everything already brought up is torn down and the
///   error is returned.
/// - [`shutdown`](Self::shutdown): for each channel stop the output, then
///   disable its clock, then restore its pad mux.
///
/// After `init`, share the set by reference (for example from a
/// `static_cell::StaticCell`) with control tasks and the timer interrupts.
///
/// # Example
///
/// ```rust
/// use embassy_futures::block_on;
/// use gpt_pwm::channel_set::ChannelSet;
/// use gpt_pwm::config::Config;
/// use gpt_pwm::sim::{SimClocks, SimMux, SimTimer};
/// use gpt_pwm::timer::TimerId;
///
/// let mut set = ChannelSet::new(
///     Config::new().with_frequency(1_000),
///     SimMux::new(),
///     SimClocks::new(13_000_000),
///     [(8, SimTimer::new()), (10, SimTimer::new())],
/// )?;
/// block_on(set.init())?;
///
/// let channel = set.channel(TimerId::Gpt10).expect("timer 10 was listed");
/// block_on(channel.set_target(75))?;
/// assert!(channel.timer().is_running());
///
/// block_on(set.shutdown());
/// assert!(!channel_is_running(&set));
/// # fn channel_is_running(set: &ChannelSet<SimTimer, SimMux, SimClocks>) -> bool {
/// #     set.channel(TimerId::Gpt10).is_some_and(|channel| channel.timer().is_running())
/// # }
/// # Ok::<(), gpt_pwm::Error>(())
/// ```
pub struct ChannelSet<T, M, C> {
    config: Config,
    mux: M,
    clocks: C,
    slots: Vec<Slot<T>, MAX_TIMERS>,
}

impl<T, M, C> ChannelSet<T, M, C>
where
    T: PwmTimer,
    M: PinMux,
    C: ClockSource,
{
    /// Create one unconfigured channel per listed timer.
    ///
    /// Each entry pairs a hardware timer number (8 through 11) with the
    /// registers of that timer.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownTimer`] if a number is not a PWM-capable timer.
    /// - [`Error::TooManyTimers`] if more than [`MAX_TIMERS`] are listed.
    /// - [`Error::DuplicateTimer`] if a timer is listed twice.
    pub fn new(
        config: Config,
        mux: M,
        clocks: C,
        timers: impl IntoIterator<Item = (u8, T)>,
    ) -> Result<Self> {
        let mut slots: Vec<Slot<T>, MAX_TIMERS> = Vec::new();
        for (number, timer) in timers {
            let id = TimerId::from_number(number).inspect_err(|_| {
                error!("invalid timer requested: {}", number);
            })?;
            if slots.is_full() {
                error!("more than {} timers requested", MAX_TIMERS);
                return Err(Error::TooManyTimers);
            }
            if slots.iter().any(|slot| slot.channel.id() == id) {
                error!("timer {} specified more than once", number);
                return Err(Error::DuplicateTimer);
            }
            let channel = Channel::new(id, timer, config.mode, config.delivery);
            slots
                .push(Slot {
                    channel,
                    saved_mux: None,
                    clock_enabled: false,
                })
                .map_err(|_| Error::TooManyTimers)?;
        }
        Ok(Self {
            config,
            mux,
            clocks,
            slots,
        })
    }

    /// Bring every channel up, leaving non-servo outputs off.
    ///
    /// # Errors
    ///
    /// Returns the first mux, clock, or configure error. Channels already
    /// brought up are shut down again before returning.
    pub async fn init(&mut self) -> Result<()> {
        if let Err(err) = self.bring_up().await {
            error!("pwm: bring-up failed: {}", err);
            self.shutdown().await;
            return Err(err);
        }
        info!(
            "pwm: {} channels, frequency={} Hz, mode={}",
            self.slots.len(),
            self.config.output_frequency(),
            self.config.mode
        );
        Ok(())
    }

    /// Stop every channel, then release its clock and pad mux.
    ///
    /// Safe to call on a partially initialized set. Mux restore failures are
    /// logged; teardown continues with the remaining channels.
    pub async fn shutdown(&mut self) {
        for slot in &mut self.slots {
            let id = slot.channel.id();
            // An unconfigured channel never started its timer.
            if slot.channel.stop().await.is_ok() {
                debug!("pwm{}: stopped", id.number());
            }
            if slot.clock_enabled {
                self.clocks.disable(id);
                slot.clock_enabled = false;
            }
            if let Some(previous) = slot.saved_mux.take() {
                if let Err(err) = self.mux.restore(id, previous) {
                    warn!("pwm{}: mux restore failed: {}", id.number(), err);
                }
            }
        }
    }

    /// Re-read a channel's input clock rate and configure it again.
    ///
    /// Use after the board has switched the timer to another clock source.
    /// The channel keeps its output frequency and is left off, also when the
    /// switch fails.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownTimer`] if `id` is not in this set.
    /// - Any error from the clock source or from
    ///   [`Channel::configure`].
    pub async fn switch_clock(&mut self, id: TimerId) -> Result<()> {
        let output_freq = self.config.output_frequency();
        let Some(slot) = self.slots.iter_mut().find(|slot| slot.channel.id() == id) else {
            return Err(Error::UnknownTimer);
        };
        let output_freq = match slot.channel.read_state().await {
            Ok(status) => status.output_frequency,
            Err(_) => output_freq,
        };
        // Stopped before the clock is released; the old match value does not
        // fit the new rate.
        if slot.channel.stop().await.is_ok() {
            debug!("pwm{}: stopped for clock switch", id.number());
        }
        if slot.clock_enabled {
            self.clocks.disable(id);
            slot.clock_enabled = false;
        }
        let input_freq = self.clocks.enable(id)?;
        slot.clock_enabled = true;
        slot.channel.configure(input_freq, output_freq).await
    }

    /// The channel driven by timer `id`, if it is in this set.
    #[must_use]
    pub fn channel(&self, id: TimerId) -> Option<&Channel<T>> {
        self.channels().find(|channel| channel.id() == id)
    }

    /// All channels in the order they were listed.
    pub fn channels(&self) -> impl Iterator<Item = &Channel<T>> {
        self.slots.iter().map(|slot| &slot.channel)
    }

    /// The interrupt-side capability of timer `id`'s channel.
    ///
    /// `None` if the timer is not in this set or its channel does not use
    /// [`Delivery::OnMatchInterrupt`](crate::channel::Delivery::OnMatchInterrupt).
    #[must_use]
    pub fn match_handler(&self, id: TimerId) -> Option<MatchHandler<'_, T>> {
        self.channel(id).and_then(Channel::match_handler)
    }

    /// Settings shared by every channel.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Number of channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the set has no channels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The pad mux collaborator.
    #[must_use]
    pub const fn mux(&self) -> &M {
        &self.mux
    }

    /// The clock collaborator.
    #[must_use]
    pub const fn clocks(&self) -> &C {
        &self.clocks
    }

    /// The clock collaborator, for switching clock sources.
    pub const fn clocks_mut(&mut self) -> &mut C {
        &mut self.clocks
    }

    async fn bring_up(&mut self) -> Result<()> {
        if self.config.mux {
            for slot in &mut self.slots {
                let previous = self.mux.enable_pwm_output(slot.channel.id())?;
                slot.saved_mux = Some(previous);
            }
        }

        let output_freq = self.config.output_frequency();
        for slot in &mut self.slots {
            let id = slot.channel.id();
            let input_freq = self.clocks.enable(id)?;
            slot.clock_enabled = true;
            slot.channel.configure(input_freq, output_freq).await?;
        }

        if let Some(start) = self.config.start_target() {
            for slot in &self.slots {
                slot.channel.set_target(start).await?;
            }
        }
        Ok(())
    }
}
