//! Assembling an event snapshot from the JSON Lines log and CSV export.
//!
//! Events can appear in both files (an export taken while the log was still
//! being written). Ids are used to deduplicate, the JSON Lines copy wins.
//! Removals are appended to the log as a second record for the same id.

use crate::events::{EventSource, JsonlSource};
use crate::{DoseEvent, Result};
use chrono::{DateTime, TimeDelta, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// CSV row format for exported events
#[derive(Debug, Deserialize)]
struct CsvRow {
    id: String,
    dose_mg: f64,
    inserted_at: Option<String>,
    removed_at: Option<String>,
}

fn parse_timestamp(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match value.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| crate::Error::Event(format!("invalid {} {:?}: {}", field, s, e))),
    }
}

impl TryFrom<CsvRow> for DoseEvent {
    type Error = crate::Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let id = Uuid::parse_str(row.id.trim())
            .map_err(|e| crate::Error::Event(format!("invalid id {:?}: {}", row.id, e)))?;

        Ok(DoseEvent {
            id,
            dose_mg: row.dose_mg,
            inserted_at: parse_timestamp("inserted_at", row.inserted_at.as_deref())?,
            removed_at: parse_timestamp("removed_at", row.removed_at.as_deref())?,
        })
    }
}

/// A CSV export with an `id,dose_mg,inserted_at,removed_at` header
pub struct CsvSource<P> {
    path: P,
}

impl<P: AsRef<Path>> CsvSource<P> {
    pub fn new(path: P) -> Self {
        Self { path }
    }
}

impl<P: AsRef<Path>> EventSource for CsvSource<P> {
    fn load(&self) -> Result<Vec<DoseEvent>> {
        let path = self.path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }
        load_events_from_csv(path)
    }
}

/// Load all events from a CSV file, skipping rows that do not parse
fn load_events_from_csv(path: &Path) -> Result<Vec<DoseEvent>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut events = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        match result {
            Ok(row) => match DoseEvent::try_from(row) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!("Failed to parse CSV row: {}", e);
                    // Continue processing other rows
                }
            },
            Err(e) => {
                tracing::warn!("Failed to deserialize CSV row: {}", e);
            }
        }
    }

    tracing::debug!("Read {} events from {:?}", events.len(), path);
    Ok(events)
}

/// Load every event from both files
///
/// Returns events sorted by insertion time (events without one first), then
/// by id. Duplicate ids keep the JSON Lines copy.
pub fn load_events(jsonl_path: &Path, csv_path: &Path) -> Result<Vec<DoseEvent>> {
    merge_sources(&[&JsonlSource::new(jsonl_path), &CsvSource::new(csv_path)])
}

/// Load events that can still matter at `now`
///
/// Keeps pouches still in the mouth and anything removed (or inserted, if
/// never removed) within the last `days` days. Events without an insertion
/// time never contribute and are dropped. A window reaching past the
/// representable time range keeps everything.
pub fn load_recent_events(
    jsonl_path: &Path,
    csv_path: &Path,
    days: i64,
    now: DateTime<Utc>,
) -> Result<Vec<DoseEvent>> {
    let cutoff = TimeDelta::try_days(days).and_then(|window| now.checked_sub_signed(window));
    if cutoff.is_none() {
        tracing::warn!("History window of {} days is out of range, keeping all events", days);
    }
    let mut events = load_events(jsonl_path, csv_path)?;
    let total = events.len();

    events.retain(|event| match (event.inserted_at, event.removed_at) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(_), Some(removed_at)) => cutoff.map_or(true, |cutoff| removed_at >= cutoff),
    });

    tracing::info!(
        "Loaded {} of {} events from the last {} days",
        events.len(),
        total,
        days
    );

    Ok(events)
}

/// Union of several sources in priority order, deduplicated by id
///
/// Within one source the last record for an id wins, so a removal appended
/// after the insert replaces it. Across sources the earlier source wins.
pub fn merge_sources(sources: &[&dyn EventSource]) -> Result<Vec<DoseEvent>> {
    let mut merged: HashMap<Uuid, DoseEvent> = HashMap::new();

    for source in sources {
        let mut latest: HashMap<Uuid, DoseEvent> = HashMap::new();
        for event in source.load()? {
            if let Some(previous) = latest.insert(event.id, event) {
                tracing::debug!("Event {} superseded by a later record", previous.id);
            }
        }

        for (id, event) in latest {
            match merged.entry(id) {
                Entry::Occupied(_) => tracing::debug!("Skipping duplicate event {}", id),
                Entry::Vacant(slot) => {
                    slot.insert(event);
                }
            }
        }
    }

    let mut events: Vec<DoseEvent> = merged.into_values().collect();
    events.sort_by(|a, b| a.inserted_at.cmp(&b.inserted_at).then(a.id.cmp(&b.id)));
    Ok(events)
}
