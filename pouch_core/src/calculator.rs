//! Pharmacokinetic model for estimating bloodstream nicotine.
//!
//! Each pouch contributes independently:
//! - **Absorption**: while the pouch is in, the absorbed amount ramps linearly
//!   from 0 to `dose * absorption_fraction` over the full release time, then
//!   holds at that maximum.
//! - **Decay**: once removed, the amount absorbed at removal decays with the
//!   nicotine half-life, `initial * 0.5^(t / half_life)`.
//!
//! The total level is the sum of all contributions. Every function here is
//! total over its inputs: malformed events (no insertion time, removal before
//! insertion, non-finite dose) contribute 0 instead of failing.

use crate::{AbsorptionConfig, DoseEvent, Phase};
use chrono::{DateTime, Utc};

/// Total estimated nicotine level (mg) at `at` for a snapshot of events.
///
/// The sum is order-independent and 0 for an empty snapshot.
pub fn calculate_total_nicotine_level(
    events: &[DoseEvent],
    config: &AbsorptionConfig,
    at: DateTime<Utc>,
) -> f64 {
    events
        .iter()
        .map(|event| contribution(event, config, at))
        .sum()
}

/// Contribution (mg) of a single event at `at`. Never negative or NaN.
pub fn contribution(event: &DoseEvent, config: &AbsorptionConfig, at: DateTime<Utc>) -> f64 {
    let (Some(dose_mg), Some(inserted_at)) = (event.usable_dose(), event.inserted_at) else {
        return 0.0;
    };
    if at < inserted_at {
        return 0.0;
    }

    let level = match event.removed_at {
        Some(removed_at) if removed_at < at => {
            let initial = absorbed_level(dose_mg, config, seconds_between(inserted_at, removed_at));
            decayed_level(initial, config, seconds_between(removed_at, at))
        }
        _ => absorbed_level(dose_mg, config, seconds_between(inserted_at, at)),
    };

    if level.is_finite() {
        level.max(0.0)
    } else {
        0.0
    }
}

/// Amount absorbed after `elapsed_secs` in the mouth.
///
/// Linear ramp capped at `dose_mg * absorption_fraction`. Negative elapsed
/// time is treated as 0.
pub fn absorbed_level(dose_mg: f64, config: &AbsorptionConfig, elapsed_secs: f64) -> f64 {
    let elapsed = elapsed_secs.max(0.0);
    let fractional_time = elapsed / config.effective_full_release_secs();
    let absorbed_fraction =
        (config.absorption_fraction * fractional_time).min(config.absorption_fraction);
    dose_mg * absorbed_fraction
}

/// Level remaining `secs_since_removal` after removal, starting from `initial_mg`.
pub fn decayed_level(initial_mg: f64, config: &AbsorptionConfig, secs_since_removal: f64) -> f64 {
    let t = secs_since_removal.max(0.0);
    let decay_factor = 0.5_f64.powf(t / config.effective_half_life_secs());
    initial_mg * decay_factor
}

/// Which part of its curve an event is on at `at`.
pub fn phase(event: &DoseEvent, config: &AbsorptionConfig, at: DateTime<Utc>) -> Phase {
    let Some(inserted_at) = event.inserted_at else {
        return Phase::Pending;
    };
    if at < inserted_at {
        return Phase::Pending;
    }

    match event.removed_at {
        Some(removed_at) if removed_at < at => Phase::Decaying,
        _ => {
            if seconds_between(inserted_at, at) < config.effective_full_release_secs() {
                Phase::Absorbing
            } else {
                Phase::Saturated
            }
        }
    }
}

/// Instantaneous absorption rate in mg/s.
///
/// This is the slope of the ramp while the event is [`Phase::Absorbing`],
/// and 0 in every other phase.
pub fn absorption_rate(event: &DoseEvent, config: &AbsorptionConfig, at: DateTime<Utc>) -> f64 {
    let Some(dose_mg) = event.usable_dose() else {
        return 0.0;
    };
    match phase(event, config, at) {
        Phase::Absorbing => {
            dose_mg * config.absorption_fraction / config.effective_full_release_secs()
        }
        _ => 0.0,
    }
}

/// Fraction of the absorption window that has elapsed, in `[0, 1]`.
///
/// Elapsed time stops counting at removal. Independent of dose.
pub fn absorption_progress(
    event: &DoseEvent,
    config: &AbsorptionConfig,
    at: DateTime<Utc>,
) -> f64 {
    let Some(inserted_at) = event.inserted_at else {
        return 0.0;
    };
    if at < inserted_at {
        return 0.0;
    }

    let end = event.removed_at.map_or(at, |removed_at| removed_at.min(at));
    let elapsed = seconds_between(inserted_at, end).max(0.0);
    (elapsed / config.effective_full_release_secs()).min(1.0)
}

/// Signed seconds from `from` to `to`, with microsecond resolution.
pub(crate) fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to.signed_duration_since(from);
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}
