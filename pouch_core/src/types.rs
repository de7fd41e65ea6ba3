//! Core domain types for the pouch level engine.
//!
//! This module defines the fundamental types used throughout the system:
//! - Dose events (one pouch inserted, and possibly removed)
//! - Absorption configuration (the model constants plus the user's release time)
//! - Derived pouch phases

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Model Constants
// ============================================================================

/// Fraction of a pouch's nicotine that is ever absorbed into the bloodstream.
pub const ABSORPTION_FRACTION: f64 = 0.30;

/// Nicotine elimination half-life, in seconds (2 hours).
pub const NICOTINE_HALF_LIFE_SECS: f64 = 7200.0;

/// Maximum absolute difference (mg) two calculator implementations may show
/// for the same snapshot, configuration and query time.
pub const PARITY_TOLERANCE_MG: f64 = 5e-4;

/// Shortest absorption window the calculator will divide by.
pub const MIN_FULL_RELEASE_SECS: f64 = 1.0;

// ============================================================================
// Dose Events
// ============================================================================

/// One instance of pouch use.
///
/// `inserted_at` is optional because imported records may lack it; such an
/// event never contributes to the level. `removed_at == None` means the pouch
/// is still in.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DoseEvent {
    pub id: Uuid,
    pub dose_mg: f64,
    #[serde(default)]
    pub inserted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub removed_at: Option<DateTime<Utc>>,
}

impl DoseEvent {
    /// A pouch inserted at `inserted_at` and not yet removed.
    pub fn inserted(dose_mg: f64, inserted_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            dose_mg,
            inserted_at: Some(inserted_at),
            removed_at: None,
        }
    }

    /// The same event with a removal time set.
    pub fn with_removal(mut self, removed_at: DateTime<Utc>) -> Self {
        self.removed_at = Some(removed_at);
        self
    }

    /// The dose if it is usable by the model (finite and positive).
    pub fn usable_dose(&self) -> Option<f64> {
        (self.dose_mg.is_finite() && self.dose_mg > 0.0).then_some(self.dose_mg)
    }

    /// True while the pouch has not been removed.
    pub fn is_active(&self) -> bool {
        self.inserted_at.is_some() && self.removed_at.is_none()
    }
}

// ============================================================================
// Absorption Configuration
// ============================================================================

/// User-selectable length of the absorption phase.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "u32", into = "u32")]
pub enum FullReleaseTime {
    #[default]
    ThirtyMinutes,
    FortyFiveMinutes,
    SixtyMinutes,
}

impl FullReleaseTime {
    pub const ALL: [FullReleaseTime; 3] = [
        FullReleaseTime::ThirtyMinutes,
        FullReleaseTime::FortyFiveMinutes,
        FullReleaseTime::SixtyMinutes,
    ];

    pub fn minutes(self) -> u32 {
        match self {
            FullReleaseTime::ThirtyMinutes => 30,
            FullReleaseTime::FortyFiveMinutes => 45,
            FullReleaseTime::SixtyMinutes => 60,
        }
    }

    pub fn seconds(self) -> f64 {
        f64::from(self.minutes() * 60)
    }
}

impl TryFrom<u32> for FullReleaseTime {
    type Error = crate::Error;

    fn try_from(minutes: u32) -> crate::Result<Self> {
        FullReleaseTime::ALL
            .into_iter()
            .find(|t| t.minutes() == minutes)
            .ok_or_else(|| {
                crate::Error::Config(format!(
                    "unsupported full release time {} min (expected 30, 45 or 60)",
                    minutes
                ))
            })
    }
}

impl From<FullReleaseTime> for u32 {
    fn from(t: FullReleaseTime) -> u32 {
        t.minutes()
    }
}

impl fmt::Display for FullReleaseTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.minutes())
    }
}

/// Parameters of the absorption/decay model.
///
/// Passed explicitly to every calculation. The release time in effect at the
/// call applies to every event, including historical ones.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct AbsorptionConfig {
    pub absorption_fraction: f64,
    pub full_release_secs: f64,
    pub half_life_secs: f64,
}

impl AbsorptionConfig {
    pub fn new(full_release: FullReleaseTime) -> Self {
        Self::with_full_release_secs(full_release.seconds())
    }

    /// Build a config with an arbitrary absorption window.
    pub fn with_full_release_secs(full_release_secs: f64) -> Self {
        Self {
            absorption_fraction: ABSORPTION_FRACTION,
            full_release_secs,
            half_life_secs: NICOTINE_HALF_LIFE_SECS,
        }
    }

    /// Absorption window as used in the formulas, floored at one second.
    pub fn effective_full_release_secs(&self) -> f64 {
        if self.full_release_secs.is_finite() {
            self.full_release_secs.max(MIN_FULL_RELEASE_SECS)
        } else {
            MIN_FULL_RELEASE_SECS
        }
    }

    /// Half-life as used in the formulas, floored at one second.
    pub fn effective_half_life_secs(&self) -> f64 {
        if self.half_life_secs.is_finite() {
            self.half_life_secs.max(1.0)
        } else {
            NICOTINE_HALF_LIFE_SECS
        }
    }
}

impl Default for AbsorptionConfig {
    fn default() -> Self {
        Self::new(FullReleaseTime::default())
    }
}

impl From<FullReleaseTime> for AbsorptionConfig {
    fn from(t: FullReleaseTime) -> Self {
        Self::new(t)
    }
}

// ============================================================================
// Derived State
// ============================================================================

/// Where a pouch sits on its curve at a given instant.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Not inserted yet (or no insertion time recorded)
    Pending,
    /// In the mouth, level still rising
    Absorbing,
    /// In the mouth, fully absorbed
    Saturated,
    /// Removed, level falling
    Decaying,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Pending => "pending",
            Phase::Absorbing => "absorbing",
            Phase::Saturated => "saturated",
            Phase::Decaying => "decaying",
        };
        f.write_str(s)
    }
}
