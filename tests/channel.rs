#![allow(missing_docs)]
//! Host-level tests for the channel state machine with immediate delivery.

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Waker};
use std::thread;

use embassy_futures::block_on;
use gpt_pwm::channel::{Channel, ChannelMode, ChannelStatus, Delivery, ServoRange};
use gpt_pwm::register_math::{COUNTER_MAX, MatchCount, period_from_frequency};
use gpt_pwm::sim::SimTimer;
use gpt_pwm::timer::{PwmTimer, TimerId};
use gpt_pwm::{Error, Result};

const INPUT_HZ: u32 = 13_000_000;

fn channel(mode: ChannelMode) -> Channel<SimTimer> {
    Channel::new(TimerId::Gpt9, SimTimer::new(), mode, Delivery::Immediate)
}

fn configured(mode: ChannelMode, output_hz: u32) -> Channel<SimTimer> {
    let channel = channel(mode);
    block_on(channel.configure(INPUT_HZ, output_hz)).expect("configure");
    channel
}

fn status(channel: &Channel<SimTimer>) -> ChannelStatus {
    block_on(channel.read_state()).expect("configured channel")
}

#[test]
fn unconfigured_channel_rejects_control() {
    let channel = channel(ChannelMode::DutyCycle);
    assert_eq!(block_on(channel.set_target(50)), Err(Error::NotConfigured));
    assert_eq!(block_on(channel.read_state()), Err(Error::NotConfigured));
    assert_eq!(block_on(channel.stop()), Err(Error::NotConfigured));
    assert_eq!(
        block_on(channel.set_output_frequency(100)),
        Err(Error::NotConfigured)
    );
    assert_eq!(channel.timer().match_writes(), 0);
    assert!(!channel.timer().is_pwm_mode());
}

#[test]
fn configure_programs_reload_and_leaves_output_off() {
    let channel = configured(ChannelMode::DutyCycle, 50);
    let period = period_from_frequency(INPUT_HZ, 50).expect("period");

    assert!(channel.timer().is_pwm_mode());
    assert_eq!(channel.timer().reload(), period.reload);
    assert!(!channel.timer().is_running());
    assert_eq!(
        status(&channel),
        ChannelStatus {
            running: false,
            current_target: 0,
            output_frequency: 50,
        }
    );
}

#[test]
fn configure_with_zero_frequency_uses_mode_default() {
    let channel = configured(ChannelMode::DutyCycle, 0);
    assert_eq!(status(&channel).output_frequency, 1_024);

    let servo = configured(ChannelMode::Servo(ServoRange::DEFAULT), 0);
    assert_eq!(status(&servo).output_frequency, 50);
}

#[test]
fn configure_failure_leaves_channel_unconfigured() {
    let channel = Channel::new(
        TimerId::Gpt8,
        SimTimer::unavailable(),
        ChannelMode::DutyCycle,
        Delivery::Immediate,
    );
    assert_eq!(
        block_on(channel.configure(INPUT_HZ, 50)),
        Err(Error::HardwareUnavailable)
    );
    assert_eq!(block_on(channel.read_state()), Err(Error::NotConfigured));
    assert_eq!(block_on(channel.set_target(10)), Err(Error::NotConfigured));
}

#[test]
fn configure_rejects_unusable_input_clock() {
    let channel = configured(ChannelMode::DutyCycle, 50);
    assert_eq!(
        block_on(channel.configure(1, 50)),
        Err(Error::InvalidArgument)
    );
    // The previous configuration is kept.
    assert_eq!(status(&channel).output_frequency, 50);
}

#[test]
fn duty_target_starts_timer_with_match_inside_period() {
    let channel = configured(ChannelMode::DutyCycle, 50);
    let period = period_from_frequency(INPUT_HZ, 50).expect("period");

    block_on(channel.set_target(50)).expect("valid duty");

    assert!(channel.timer().is_running());
    assert_eq!(channel.timer().match_value(), period.reload + 129_999);
    assert!(channel.timer().match_value() < COUNTER_MAX);
    assert_eq!(
        status(&channel),
        ChannelStatus {
            running: true,
            current_target: 50,
            output_frequency: 50,
        }
    );
}

#[test]
fn retarget_updates_match_without_restarting() {
    let channel = configured(ChannelMode::DutyCycle, 1_000);
    block_on(channel.set_target(20)).expect("valid duty");
    let first = channel.timer().match_value();

    block_on(channel.set_target(80)).expect("valid duty");

    assert!(channel.timer().match_value() > first);
    assert_eq!(channel.timer().starts(), 1);
    assert_eq!(status(&channel).current_target, 80);
}

#[test]
fn zero_target_turns_running_channel_off() {
    let channel = configured(ChannelMode::DutyCycle, 50);
    block_on(channel.set_target(40)).expect("valid duty");

    block_on(channel.set_target(0)).expect("off always succeeds");

    assert!(!channel.timer().is_running());
    let status = status(&channel);
    assert!(!status.running);
    assert_eq!(status.current_target, 0);
}

#[test]
fn out_of_range_duty_changes_nothing() {
    let channel = configured(ChannelMode::DutyCycle, 50);
    block_on(channel.set_target(30)).expect("valid duty");
    let register = channel.timer().match_value();
    let writes = channel.timer().match_writes();

    assert_eq!(block_on(channel.set_target(150)), Err(Error::InvalidArgument));

    assert_eq!(channel.timer().match_value(), register);
    assert_eq!(channel.timer().match_writes(), writes);
    assert!(channel.timer().is_running());
    assert_eq!(status(&channel).current_target, 30);
}

#[test]
fn pulse_width_target_scales_to_period() {
    let channel = configured(ChannelMode::PulseWidth, 50);
    let period = period_from_frequency(INPUT_HZ, 50).expect("period");

    block_on(channel.set_target(15_000)).expect("any pulse is accepted");
    assert_eq!(channel.timer().match_value(), period.reload + 19_499);

    block_on(channel.set_target(400_000)).expect("long pulses are clamped");
    assert_eq!(channel.timer().match_value(), period.reload + period.count);
}

#[test]
fn servo_target_is_limited_to_range() {
    let channel = configured(ChannelMode::Servo(ServoRange::new(9_000, 21_000)), 0);

    block_on(channel.set_target(21_000)).expect("upper bound is inclusive");
    let at_max = channel.timer().match_value();

    assert_eq!(
        block_on(channel.set_target(21_001)),
        Err(Error::InvalidArgument)
    );
    assert_eq!(
        block_on(channel.set_target(8_999)),
        Err(Error::InvalidArgument)
    );
    assert_eq!(channel.timer().match_value(), at_max);
    assert_eq!(status(&channel).current_target, 21_000);

    block_on(channel.set_target(0)).expect("zero turns a servo off");
    assert!(!channel.timer().is_running());
}

#[test]
fn servo_range_normalizes_bounds() {
    assert_eq!(ServoRange::new(1_000, 40_000), ServoRange::ABSOLUTE);
    assert_eq!(ServoRange::new(20_000, 10_000), ServoRange::ABSOLUTE);
    let range = ServoRange::new(12_000, 18_000);
    assert_eq!((range.min(), range.max()), (12_000, 18_000));
    assert_eq!(range.clamp(30_000), 18_000);
    assert!(range.contains(12_000));
    assert!(!range.contains(11_999));
}

#[test]
fn set_output_frequency_reconfigures_and_turns_off() {
    let channel = configured(ChannelMode::DutyCycle, 1_000);
    block_on(channel.set_target(50)).expect("valid duty");

    block_on(channel.set_output_frequency(100)).expect("reconfigure");

    let period = period_from_frequency(INPUT_HZ, 100).expect("period");
    assert_eq!(channel.timer().reload(), period.reload);
    assert!(!channel.timer().is_running());
    assert_eq!(
        status(&channel),
        ChannelStatus {
            running: false,
            current_target: 0,
            output_frequency: 100,
        }
    );
}

#[test]
fn stop_turns_output_off() {
    let channel = configured(ChannelMode::DutyCycle, 50);
    block_on(channel.set_target(10)).expect("valid duty");

    block_on(channel.stop()).expect("configured");

    assert!(!channel.timer().is_running());
    assert!(!status(&channel).running);
}

/// A timer whose match register write can be held open, keeping the channel
/// lock taken by whoever is writing.
#[derive(Default)]
struct GatedTimer {
    inner: SimTimer,
    hold: AtomicBool,
    held: AtomicBool,
}

impl GatedTimer {
    fn wait_until_held(&self) {
        while !self.held.load(Ordering::Acquire) {
            thread::yield_now();
        }
    }
}

impl PwmTimer for GatedTimer {
    fn init_pwm(&self) -> Result<()> {
        self.inner.init_pwm()
    }

    fn set_load(&self, reload: u32) {
        self.inner.set_load(reload);
    }

    fn set_match(&self, value: u32) {
        if self.hold.load(Ordering::Acquire) {
            self.held.store(true, Ordering::Release);
            while self.hold.load(Ordering::Acquire) {
                thread::yield_now();
            }
        }
        self.inner.set_match(value);
    }

    fn start(&self) {
        self.inner.start();
    }

    fn stop(&self) {
        self.inner.stop();
    }

    fn set_match_interrupt(&self, enabled: bool) {
        self.inner.set_match_interrupt(enabled);
    }

    fn read_status(&self) -> u32 {
        self.inner.read_status()
    }

    fn write_status(&self, status: u32) {
        self.inner.write_status(status);
    }
}

fn duty_register(duty: u32) -> u32 {
    let period = period_from_frequency(INPUT_HZ, 50).expect("period");
    match ChannelMode::DutyCycle
        .match_count(period, INPUT_HZ, duty)
        .expect("valid duty")
    {
        MatchCount::Ticks(ticks) => period.match_register(ticks),
        MatchCount::Off => panic!("duty {duty} maps to off"),
    }
}

#[test]
fn cancelled_waiter_changes_nothing() {
    let channel = Channel::new(
        TimerId::Gpt9,
        GatedTimer::default(),
        ChannelMode::DutyCycle,
        Delivery::Immediate,
    );
    block_on(channel.configure(INPUT_HZ, 50)).expect("configure");
    block_on(channel.set_target(25)).expect("valid duty");

    channel.timer().hold.store(true, Ordering::Release);
    thread::scope(|scope| {
        let holder = scope.spawn(|| block_on(channel.set_target(60)));
        channel.timer().wait_until_held();

        {
            let mut waiter = pin!(channel.set_target(75));
            let mut cx = Context::from_waker(Waker::noop());
            assert!(waiter.as_mut().poll(&mut cx).is_pending());
            assert!(waiter.as_mut().poll(&mut cx).is_pending());
        }

        channel.timer().hold.store(false, Ordering::Release);
        holder
            .join()
            .expect("holder thread")
            .expect("valid duty");
    });

    assert_eq!(channel.timer().inner.match_value(), duty_register(60));
    assert_eq!(
        block_on(channel.read_state()).expect("configured").current_target,
        60
    );

    block_on(channel.set_target(90)).expect("lock is free again");
    assert_eq!(channel.timer().inner.match_value(), duty_register(90));
    assert_eq!(
        block_on(channel.read_state()).expect("configured").current_target,
        90
    );
}

#[test]
fn unpolled_request_changes_nothing() {
    let channel = configured(ChannelMode::DutyCycle, 50);
    block_on(channel.set_target(25)).expect("valid duty");
    let register = channel.timer().match_value();

    let request = channel.set_target(75);
    drop(request);

    assert_eq!(channel.timer().match_value(), register);
    assert_eq!(status(&channel).current_target, 25);
}

#[test]
fn immediate_channel_has_no_match_handler() {
    let channel = configured(ChannelMode::DutyCycle, 50);
    assert!(channel.match_handler().is_none());
}
