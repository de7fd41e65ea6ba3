//! Point-in-time status of every pouch, for widget-style displays.
//!
//! A [`LevelSnapshot`] bundles the total level with a per-pouch breakdown
//! (phase, level, progress, rate). It is built entirely from calculator
//! queries, so its total always matches
//! [`calculate_total_nicotine_level`](crate::calculator::calculate_total_nicotine_level)
//! for the same inputs.

use crate::calculator::{absorption_progress, absorption_rate, contribution, phase, seconds_between};
use crate::{AbsorptionConfig, DoseEvent, Phase};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Contributions below this are considered fully eliminated for display.
const NEGLIGIBLE_MG: f64 = 1e-4;

/// Status of a single pouch at a given instant
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PouchStatus {
    pub id: Uuid,
    pub dose_mg: f64,
    pub inserted_at: Option<DateTime<Utc>>,
    pub removed_at: Option<DateTime<Utc>>,
    pub phase: Phase,
    pub level_mg: f64,
    pub progress: f64,
    pub rate_mg_per_sec: f64,
    /// Seconds until the ramp completes; `None` unless absorbing
    pub secs_to_full_absorption: Option<f64>,
}

impl PouchStatus {
    pub fn of(event: &DoseEvent, config: &AbsorptionConfig, at: DateTime<Utc>) -> Self {
        let phase = phase(event, config, at);
        let secs_to_full_absorption = match (phase, event.inserted_at) {
            (Phase::Absorbing, Some(inserted_at)) => Some(
                (config.effective_full_release_secs() - seconds_between(inserted_at, at)).max(0.0),
            ),
            _ => None,
        };

        Self {
            id: event.id,
            dose_mg: event.dose_mg,
            inserted_at: event.inserted_at,
            removed_at: event.removed_at,
            phase,
            level_mg: contribution(event, config, at),
            progress: absorption_progress(event, config, at),
            rate_mg_per_sec: absorption_rate(event, config, at),
            secs_to_full_absorption,
        }
    }

    /// When the ramp completes, if the pouch is still absorbing.
    pub fn full_absorption_at(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.secs_to_full_absorption
            .map(|secs| at + Duration::milliseconds((secs * 1000.0).round() as i64))
    }
}

/// Total level plus the pouches that make it up
#[derive(Clone, Debug, Serialize)]
pub struct LevelSnapshot {
    pub at: DateTime<Utc>,
    pub full_release_secs: f64,
    pub total_mg: f64,
    pub pouches: Vec<PouchStatus>,
}

impl LevelSnapshot {
    /// Capture the state of `events` at `at`.
    ///
    /// Pending pouches and decayed pouches whose contribution has become
    /// negligible are left out of `pouches`, but `total_mg` is always the
    /// full sum. Pouches are ordered by insertion time, then id.
    pub fn capture(events: &[DoseEvent], config: &AbsorptionConfig, at: DateTime<Utc>) -> Self {
        let mut total_mg = 0.0;
        let mut pouches = Vec::new();

        for event in events {
            let status = PouchStatus::of(event, config, at);
            total_mg += status.level_mg;

            let visible = match status.phase {
                Phase::Pending => false,
                Phase::Decaying => status.level_mg >= NEGLIGIBLE_MG,
                Phase::Absorbing | Phase::Saturated => true,
            };
            if visible {
                pouches.push(status);
            }
        }

        pouches.sort_by(|a, b| a.inserted_at.cmp(&b.inserted_at).then(a.id.cmp(&b.id)));

        Self {
            at,
            full_release_secs: config.effective_full_release_secs(),
            total_mg,
            pouches,
        }
    }

    /// Pouches still in the mouth
    pub fn active(&self) -> impl Iterator<Item = &PouchStatus> {
        self.pouches
            .iter()
            .filter(|p| matches!(p.phase, Phase::Absorbing | Phase::Saturated))
    }
}
