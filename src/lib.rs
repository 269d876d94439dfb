//! Glitch-free PWM signal generators on OMAP general-purpose timers 8 through 11.
//!
//! Each timer drives one output pin. A [`channel::Channel`] turns a logical target
//! (duty cycle, pulse width, or servo position) into timer register values and
//! can defer register updates to the timer's match interrupt, so a change never
//! lands in the middle of an output cycle. A [`channel_set::ChannelSet`] owns all
//! channels of a board and brings them up and down in order.
//!
//! # Glossary
//!
//! - **Period count:** number of usable match settings in one output cycle.
//!   Roughly the input clock divided by the output frequency.
//! - **Match count:** tick offset within the period at which the output toggles.
//!   Added to the reload value to get the match register.
//! - **Duty cycle:** target in percent of the period, `0..=100`.
//! - **Pulse width:** target in tenths of a microsecond.
//! - **Servo mode:** pulse-width mode at 50 Hz, limited to a [`channel::ServoRange`].
//! - **Match event:** the counter reaching the match register. Raises the match
//!   interrupt when enabled.
//!
//! # Features
//!
//! - `host`: build for the host and include the [`sim`] module (default).
//! - `defmt`: log through `defmt`. The firmware must provide a global logger.
//! - `arm`: single-core critical sections for Cortex-A/M targets.
#![cfg_attr(not(any(test, feature = "host")), no_std)]

#[macro_use]
mod fmt;

pub mod board;
pub mod channel;
pub mod channel_set;
pub mod config;
mod error;
pub mod register_math;
#[cfg(feature = "host")]
pub mod sim;
pub mod timer;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};
