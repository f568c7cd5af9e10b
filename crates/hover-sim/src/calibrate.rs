//! Calibration summary over a recording: per-axis extremes used to pick
//! thresholds and the gravity offset by hand.

use std::fmt;

use hover_core::Sample;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AxisStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    /// Largest absolute value seen.
    pub abs_max: f32,
}

impl AxisStats {
    pub fn peak_to_peak(&self) -> f32 {
        self.max - self.min
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CalibrationSummary {
    pub samples: usize,
    pub malformed: usize,
    pub duration_s: f64,
    pub accel: [AxisStats; 3],
    pub gyro: Option<[AxisStats; 3]>,
}

#[derive(Default)]
struct Accumulator {
    n: usize,
    min: [f32; 3],
    max: [f32; 3],
    sum: [f64; 3],
    abs_max: [f32; 3],
}

impl Accumulator {
    fn push(&mut self, v: [f32; 3]) {
        for i in 0..3 {
            if self.n == 0 {
                self.min[i] = v[i];
                self.max[i] = v[i];
            } else {
                self.min[i] = self.min[i].min(v[i]);
                self.max[i] = self.max[i].max(v[i]);
            }
            self.sum[i] += v[i] as f64;
            self.abs_max[i] = self.abs_max[i].max(v[i].abs());
        }
        self.n += 1;
    }

    fn finish(&self) -> Option<[AxisStats; 3]> {
        if self.n == 0 {
            return None;
        }
        Some(std::array::from_fn(|i| AxisStats {
            min: self.min[i],
            max: self.max[i],
            mean: (self.sum[i] / self.n as f64) as f32,
            abs_max: self.abs_max[i],
        }))
    }
}

impl CalibrationSummary {
    /// Summarise a recording. Malformed samples are counted, not included.
    pub fn from_samples<'a, I>(samples: I) -> Self
    where
        I: IntoIterator<Item = &'a Sample>,
    {
        let mut accel = Accumulator::default();
        let mut gyro = Accumulator::default();
        let mut total = 0;
        let mut malformed = 0;
        let mut first_t = None;
        let mut last_t = 0.0;

        for s in samples {
            total += 1;
            first_t.get_or_insert(s.timestamp);
            last_t = s.timestamp;
            if s.is_malformed() {
                malformed += 1;
                continue;
            }
            accel.push(s.accel.into());
            if let Some(g) = s.gyro.filter(|g| g.iter().all(|v| v.is_finite())) {
                gyro.push(g.into());
            }
        }

        Self {
            samples: total,
            malformed,
            duration_s: first_t.map_or(0.0, |t0| last_t - t0),
            accel: accel.finish().unwrap_or_default(),
            gyro: gyro.finish(),
        }
    }

    /// Mean of the primary accelerometer axis, the usual `gravity_offset`.
    pub fn suggested_gravity_offset(&self, primary: hover_core::Axis) -> f32 {
        self.accel[primary.index()].mean
    }
}

impl fmt::Display for CalibrationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} samples ({} malformed) over {:.2} s",
            self.samples, self.malformed, self.duration_s
        )?;
        writeln!(f, "{:<8}{:>10}{:>10}{:>10}{:>10}", "axis", "abs max", "p2p", "mean", "")?;
        for (axis, st) in hover_core::Axis::ALL.iter().zip(&self.accel) {
            writeln!(
                f,
                "acc_{:<4}{:>10.4}{:>10.4}{:>10.4}",
                axis.label(),
                st.abs_max,
                st.peak_to_peak(),
                st.mean
            )?;
        }
        if let Some(gyro) = &self.gyro {
            for (axis, st) in hover_core::Axis::ALL.iter().zip(gyro) {
                writeln!(
                    f,
                    "gyro_{:<3}{:>10.2}{:>10.2}{:>10.2}",
                    axis.label(),
                    st.abs_max,
                    st.peak_to_peak(),
                    st.mean
                )?;
            }
        }
        Ok(())
    }
}
