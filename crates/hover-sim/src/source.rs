//! Sample acquisition: newline-delimited device streams and recorded CSV tables.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use hover_core::Sample;
use nalgebra::Vector3;
use serde::Deserialize;
use thiserror::Error;

/// Sample clock used when lines carry no timestamp.
pub const DEFAULT_RATE_HZ: f64 = 50.0;

#[derive(Debug, Error, PartialEq)]
pub enum SampleParseError {
    #[error("expected 3, 4, 6 or 7 fields, got {0}")]
    FieldCount(usize),
    #[error("field {index} is not a number: {value:?}")]
    NotANumber { index: usize, value: String },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("table has no acc_x/acc_y/acc_z columns")]
    MissingColumns,
    #[error("no sample source: device unavailable and no table given")]
    Unavailable,
}

/// One parsed line, before the clock assigns a timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedLine {
    pub timestamp: Option<f64>,
    pub accel: Vector3<f32>,
    pub gyro: Option<Vector3<f32>>,
}

/// Parse `ax,ay,az[,gx,gy,gz]`, optionally prefixed by a timestamp.
/// Commas and whitespace both separate fields.
pub fn parse_line(line: &str) -> Result<ParsedLine, SampleParseError> {
    let fields: Vec<&str> = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|f| !f.is_empty())
        .collect();

    let (timestamp, rest) = match fields.len() {
        3 | 6 => (None, &fields[..]),
        4 | 7 => (Some(number::<f64>(0, fields[0])?), &fields[1..]),
        n => return Err(SampleParseError::FieldCount(n)),
    };
    let offset = fields.len() - rest.len();

    let mut v = [0.0f32; 6];
    for (i, f) in rest.iter().enumerate() {
        v[i] = number::<f32>(offset + i, f)?;
    }
    let accel = Vector3::new(v[0], v[1], v[2]);
    let gyro = (rest.len() == 6).then(|| Vector3::new(v[3], v[4], v[5]));

    Ok(ParsedLine {
        timestamp,
        accel,
        gyro,
    })
}

fn number<T: std::str::FromStr>(index: usize, field: &str) -> Result<T, SampleParseError> {
    field.parse().map_err(|_| SampleParseError::NotANumber {
        index,
        value: field.to_string(),
    })
}

/// Assigns timestamps: explicit ones win, otherwise the nominal rate advances.
#[derive(Debug, Clone, Copy)]
pub struct SampleClock {
    period: f64,
    next: f64,
}

impl SampleClock {
    pub fn new(rate_hz: f64) -> Self {
        let rate = if rate_hz.is_finite() && rate_hz > 0.0 {
            rate_hz
        } else {
            DEFAULT_RATE_HZ
        };
        Self {
            period: 1.0 / rate,
            next: 0.0,
        }
    }

    pub fn stamp(&mut self, explicit: Option<f64>) -> f64 {
        let t = explicit.unwrap_or(self.next);
        self.next = t + self.period;
        t
    }
}

/// Newline-delimited samples from a device, pipe or file.
pub struct LineSource<R> {
    lines: io::Lines<R>,
    clock: SampleClock,
    line_no: usize,
    malformed: usize,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R, rate_hz: f64) -> Self {
        Self {
            lines: reader.lines(),
            clock: SampleClock::new(rate_hz),
            line_no: 0,
            malformed: 0,
        }
    }

    pub fn malformed(&self) -> usize {
        self.malformed
    }
}

impl<R: BufRead> Iterator for LineSource<R> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(
                        line = self.line_no + 1,
                        error = %e,
                        "read failed, closing stream"
                    );
                    return None;
                }
            };
            self.line_no += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            return Some(match parse_line(line) {
                Ok(p) => {
                    let s = Sample::new(self.clock.stamp(p.timestamp), p.accel);
                    match p.gyro {
                        Some(g) => s.with_gyro(g),
                        None => s,
                    }
                }
                Err(e) => {
                    self.malformed += 1;
                    tracing::warn!(line = self.line_no, error = %e, "malformed sample line");
                    Sample::malformed(self.clock.stamp(None))
                }
            });
        }
    }
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    timestamp: Option<f64>,
    acc_x: f32,
    acc_y: f32,
    acc_z: f32,
    #[serde(default)]
    gyro_x: Option<f32>,
    #[serde(default)]
    gyro_y: Option<f32>,
    #[serde(default)]
    gyro_z: Option<f32>,
}

/// Read a recorded table. Rows that fail to deserialize become malformed
/// samples so the cadence is kept.
pub fn read_table_from<R: Read>(reader: R, rate_hz: f64) -> Result<Vec<Sample>, SourceError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    if !["acc_x", "acc_y", "acc_z"]
        .iter()
        .all(|h| headers.iter().any(|c| c == *h))
    {
        return Err(SourceError::MissingColumns);
    }

    let mut clock = SampleClock::new(rate_hz);
    let mut samples = Vec::new();
    for (row_no, row) in rdr.deserialize::<TableRow>().enumerate() {
        let sample = match row {
            Ok(r) => {
                let accel = Vector3::new(r.acc_x, r.acc_y, r.acc_z);
                let s = Sample::new(clock.stamp(r.timestamp), accel);
                match (r.gyro_x, r.gyro_y, r.gyro_z) {
                    (Some(x), Some(y), Some(z)) => s.with_gyro(Vector3::new(x, y, z)),
                    _ => s,
                }
            }
            Err(e) => {
                tracing::warn!(row = row_no + 1, error = %e, "malformed table row");
                Sample::malformed(clock.stamp(None))
            }
        };
        samples.push(sample);
    }
    Ok(samples)
}

pub fn read_table(path: &Path, rate_hz: f64) -> Result<Vec<Sample>, SourceError> {
    let file = File::open(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let samples = read_table_from(BufReader::new(file), rate_hz)?;
    tracing::info!(path = %path.display(), samples = samples.len(), "recorded table loaded");
    Ok(samples)
}

/// Either a live line stream or a pre-loaded table.
pub enum SampleSource {
    Lines(LineSource<Box<dyn BufRead + Send>>),
    Table(std::vec::IntoIter<Sample>),
}

impl SampleSource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Lines(_) => "line stream",
            Self::Table(_) => "recorded table",
        }
    }
}

impl Iterator for SampleSource {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        match self {
            Self::Lines(l) => l.next(),
            Self::Table(t) => t.next(),
        }
    }
}

/// Open the device as a line stream (`-` is stdin), falling back to the
/// recorded table when the device cannot be opened.
pub fn open_source(
    device: Option<&Path>,
    table: Option<&Path>,
    rate_hz: f64,
) -> Result<SampleSource, SourceError> {
    if let Some(device) = device {
        if device == Path::new("-") {
            let reader: Box<dyn BufRead + Send> = Box::new(BufReader::new(io::stdin()));
            return Ok(SampleSource::Lines(LineSource::new(reader, rate_hz)));
        }
        match File::open(device) {
            Ok(file) => {
                tracing::info!(device = %device.display(), "reading line stream");
                let reader: Box<dyn BufRead + Send> = Box::new(BufReader::new(file));
                return Ok(SampleSource::Lines(LineSource::new(reader, rate_hz)));
            }
            Err(e) => {
                tracing::warn!(
                    device = %device.display(),
                    error = %e,
                    "device unavailable, falling back to recorded table"
                );
            }
        }
    }

    match table {
        Some(path) => Ok(SampleSource::Table(read_table(path, rate_hz)?.into_iter())),
        None => Err(SourceError::Unavailable),
    }
}
