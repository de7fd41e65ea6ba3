//! Reading dose event snapshots from JSON Lines files.
//!
//! The event store belongs to another process; this side only reads. Files
//! are read under a shared lock so a writer holding an exclusive lock is
//! never observed mid-append.

use crate::{DoseEvent, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Source of dose events for a calculation
pub trait EventSource {
    fn load(&self) -> Result<Vec<DoseEvent>>;
}

/// A JSON Lines file with one [`DoseEvent`] per line
pub struct JsonlSource<P> {
    path: P,
}

impl<P: AsRef<Path>> JsonlSource<P> {
    pub fn new(path: P) -> Self {
        Self { path }
    }
}

impl<P: AsRef<Path>> EventSource for JsonlSource<P> {
    fn load(&self) -> Result<Vec<DoseEvent>> {
        read_events(self.path.as_ref())
    }
}

/// Read all events from a JSON Lines file
///
/// A missing file is an empty snapshot. Blank lines are ignored and lines
/// that are not valid UTF-8 or fail to parse are logged and skipped.
pub fn read_events(path: &Path) -> Result<Vec<DoseEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    // Acquire shared lock for reading
    FileExt::lock_shared(&file)?;

    let reader = BufReader::new(&file);
    let mut events = Vec::new();

    for (line_num, line_result) in reader.split(b'\n').enumerate() {
        let bytes = match line_result {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = FileExt::unlock(&file);
                return Err(e.into());
            }
        };
        let line = match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to parse event at line {}: {}", line_num + 1, e);
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<DoseEvent>(line.trim_end()) {
            Ok(event) => events.push(event),
            Err(e) => {
                tracing::warn!("Failed to parse event at line {}: {}", line_num + 1, e);
                // Continue reading, don't fail completely
            }
        }
    }

    FileExt::unlock(&file)?;
    tracing::debug!("Read {} events from {:?}", events.len(), path);
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::io::Write;

    fn write_lines(path: &Path, events: &[DoseEvent]) {
        let mut file = File::create(path).unwrap();
        for event in events {
            writeln!(file, "{}", serde_json::to_string(event).unwrap()).unwrap();
        }
    }

    #[test]
    fn test_read_events() {
        crate::logging::init_test();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("events.jsonl");

        let now = Utc::now();
        let events = vec![
            DoseEvent::inserted(6.0, now - Duration::hours(1))
                .with_removal(now - Duration::minutes(20)),
            DoseEvent::inserted(4.0, now - Duration::minutes(5)),
        ];
        write_lines(&path, &events);

        let loaded = read_events(&path).unwrap();
        assert_eq!(loaded, events);
    }

    #[test]
    fn test_read_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let events = read_events(&temp_dir.path().join("nonexistent.jsonl")).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        crate::logging::init_test();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("events.jsonl");

        let good = DoseEvent::inserted(6.0, Utc::now());
        let contents = format!(
            "{{ not json }}\n\n{}\n{{\"id\":\"00000000-0000-0000-0000-000000000000\",\"dose_mg\":",
            serde_json::to_string(&good).unwrap()
        );
        std::fs::write(&path, contents).unwrap();

        let loaded = read_events(&path).unwrap();
        assert_eq!(loaded, vec![good]);
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        crate::logging::init_test();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("events.jsonl");

        let good = DoseEvent::inserted(6.0, Utc::now());
        let mut contents = serde_json::to_vec(&good).unwrap();
        contents.extend_from_slice(b"\n\xff\xfe garbage\r\n");
        let removed = good.clone().with_removal(Utc::now());
        contents.extend_from_slice(&serde_json::to_vec(&removed).unwrap());
        contents.extend_from_slice(b"\r\n");
        std::fs::write(&path, contents).unwrap();

        let loaded = read_events(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], good);
    }

    #[test]
    fn test_jsonl_source() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("events.jsonl");
        write_lines(&path, &[DoseEvent::inserted(3.0, Utc::now())]);

        let source = JsonlSource::new(&path);
        assert_eq!(source.load().unwrap().len(), 1);
    }
}
