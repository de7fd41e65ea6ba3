//! Level curves sampled over a time window.
//!
//! Used for historical charts and for projecting the level forward.

use crate::calculator::calculate_total_nicotine_level;
use crate::{AbsorptionConfig, DoseEvent};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Upper bound on samples per curve
pub const MAX_SAMPLES: usize = 10_000;

/// Total level at one instant
#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct LevelPoint {
    pub at: DateTime<Utc>,
    pub level_mg: f64,
}

/// Sample the total level at `from, from + step, ...` through `to` inclusive.
///
/// Returns an empty curve when `to < from` and a single point when `step` is
/// not positive. At most [`MAX_SAMPLES`] points are produced, and sampling
/// stops if the next instant would leave the representable time range.
pub fn sample_curve(
    events: &[DoseEvent],
    config: &AbsorptionConfig,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    step: Duration,
) -> Vec<LevelPoint> {
    if to < from {
        return Vec::new();
    }

    let point = |at| LevelPoint {
        at,
        level_mg: calculate_total_nicotine_level(events, config, at),
    };

    if step <= Duration::zero() {
        return vec![point(from)];
    }

    let mut points = Vec::new();
    let mut at = from;
    while at <= to && points.len() < MAX_SAMPLES {
        points.push(point(at));
        match at.checked_add_signed(step) {
            Some(next) => at = next,
            None => break,
        }
    }

    if points.len() == MAX_SAMPLES {
        tracing::warn!(
            "Curve from {} to {} truncated at {} samples",
            from,
            to,
            MAX_SAMPLES
        );
    }

    points
}

/// Highest sample in a curve (the earliest one on ties).
pub fn peak(points: &[LevelPoint]) -> Option<&LevelPoint> {
    points.iter().fold(None, |best, p| match best {
        Some(b) if b.level_mg >= p.level_mg => Some(b),
        _ => Some(p),
    })
}
