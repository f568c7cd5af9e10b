use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use hover_core::TransitionEvent;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// `timestamp,from,to,cause`, one row per transition.
pub fn write_events_csv<W: Write>(
    writer: W,
    events: &[TransitionEvent],
) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for ev in events {
        wtr.serialize(ev)?;
    }
    if events.is_empty() {
        wtr.write_record(["timestamp", "from", "to", "cause"])?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_events_json<W: Write>(
    writer: W,
    events: &[TransitionEvent],
) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, events)?;
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>, ExportError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let file = File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufWriter::new(file))
}

pub fn save_events_csv(path: &Path, events: &[TransitionEvent]) -> Result<(), ExportError> {
    write_events_csv(create(path)?, events)?;
    tracing::info!(path = %path.display(), events = events.len(), "events written");
    Ok(())
}

pub fn save_events_json(path: &Path, events: &[TransitionEvent]) -> Result<(), ExportError> {
    let mut out = create(path)?;
    write_events_json(&mut out, events)?;
    out.flush().map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), events = events.len(), "events written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hover_core::{DetectionState, TransitionCause};

    fn events() -> Vec<TransitionEvent> {
        vec![
            TransitionEvent {
                timestamp: 1.02,
                from: DetectionState::Idle,
                to: DetectionState::MotorOn,
                cause: TransitionCause::Threshold,
            },
            TransitionEvent {
                timestamp: 6.5,
                from: DetectionState::FirstRise,
                to: DetectionState::Idle,
                cause: TransitionCause::Timeout,
            },
        ]
    }

    #[test]
    fn csv_rows_use_state_labels() {
        let mut buf = Vec::new();
        write_events_csv(&mut buf, &events()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,from,to,cause");
        assert_eq!(lines[1], "1.02,IDLE,MOTOR_ON,threshold");
        assert_eq!(lines[2], "6.5,FIRST_RISE,IDLE,timeout");
    }

    #[test]
    fn empty_csv_still_has_header() {
        let mut buf = Vec::new();
        write_events_csv(&mut buf, &[]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().trim(), "timestamp,from,to,cause");
    }

    #[test]
    fn json_round_trips_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("events.json");
        save_events_json(&path, &events()).unwrap();
        let back: Vec<TransitionEvent> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, events());
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"cause\": \"timeout\""));
    }
}
