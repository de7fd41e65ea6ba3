#![forbid(unsafe_code)]

//! Core domain model and nicotine level calculation for pouch.
//!
//! This crate provides:
//! - Domain types (dose events, absorption configuration, phases)
//! - The pharmacokinetic calculator (absorption ramp + half-life decay)
//! - Per-pouch status snapshots and sampled level curves
//! - Configuration and read-only event loading (JSON Lines, CSV)
//!
//! The calculator is a set of pure functions. Every consumer links this one
//! crate, so all displays compute identical numbers for the same snapshot.

pub mod types;
pub mod error;
pub mod calculator;
pub mod status;
pub mod chart;
pub mod config;
pub mod logging;
pub mod events;
pub mod history;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use calculator::{
    absorption_progress, absorption_rate, calculate_total_nicotine_level, contribution, phase,
};
pub use status::{LevelSnapshot, PouchStatus};
pub use chart::{peak, sample_curve, LevelPoint};
pub use config::Config;
pub use events::{read_events, EventSource, JsonlSource};
pub use history::{load_events, load_recent_events, CsvSource};
