//! Hover Simulation Library
//!
//! Host-side collaborators for `hover-core`: sample sources, synthetic
//! flights, the streaming runner, event export and calibration summaries.

pub mod calibrate;
pub mod export;
pub mod source;
pub mod stream;
pub mod synth;

// Re-export main types
pub use calibrate::{AxisStats, CalibrationSummary};
pub use export::{
    save_events_csv, save_events_json, write_events_csv, write_events_json, ExportError,
};
pub use source::{
    open_source, parse_line, read_table, read_table_from, LineSource, SampleParseError,
    SampleSource, SourceError, DEFAULT_RATE_HZ,
};
pub use stream::{run_stream, EventSink, StreamReport, DEFAULT_QUEUE_CAPACITY};
pub use synth::{generate_flight, FlightPhase, FlightProfile, SensorNoise};
