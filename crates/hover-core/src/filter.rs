use nalgebra::Vector3;

use crate::config::{CalibrationConfig, FilterMode};
use crate::sample::{fabs, Axis, Sample};

/// A sample after glitch rejection. Always produced, one per input sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilteredSample {
    pub timestamp: f64,
    /// Values fed to the feature windows.
    pub accel: Vector3<f32>,
    pub gyro: Option<Vector3<f32>>,
    /// Offset-corrected, unfiltered accelerometer values used for the
    /// large-movement ceilings.
    pub raw_accel: Vector3<f32>,
    /// Per-axis flag: the accelerometer reading was replaced or clipped.
    pub rejected: [bool; 3],
}

impl FilteredSample {
    pub fn rejected_count(&self) -> usize {
        self.rejected.iter().filter(|r| **r).count()
    }
}

/// Windowed max-magnitude filter.
///
/// Readings above the ceiling (or non-finite) are treated as sensor glitches:
/// held at the last accepted value or clipped, depending on the mode.
#[derive(Debug, Clone)]
pub struct SampleFilter {
    ceiling: f32,
    mode: FilterMode,
    primary: Axis,
    gravity_offset: f32,
    last_accel: Vector3<f32>,
    last_gyro: Vector3<f32>,
}

impl SampleFilter {
    pub fn new(cfg: &CalibrationConfig) -> Self {
        Self {
            ceiling: cfg.filter_ceiling,
            mode: cfg.filter_mode,
            primary: cfg.primary_axis,
            gravity_offset: cfg.gravity_offset,
            last_accel: Vector3::zeros(),
            last_gyro: Vector3::zeros(),
        }
    }

    pub fn reset(&mut self) {
        self.last_accel = Vector3::zeros();
        self.last_gyro = Vector3::zeros();
    }

    pub fn apply(&mut self, sample: &Sample) -> FilteredSample {
        let mut raw = sample.accel;
        raw[self.primary.index()] -= self.gravity_offset;

        let mut accel = raw;
        let mut rejected = [false; 3];
        for axis in Axis::ALL {
            let i = axis.index();
            let v = raw[i];
            let accepted = if !v.is_finite() {
                None
            } else if fabs(v) > self.ceiling {
                match self.mode {
                    FilterMode::Hold => None,
                    FilterMode::Clamp => Some(v.clamp(-self.ceiling, self.ceiling)),
                }
            } else {
                Some(v)
            };

            match accepted {
                Some(clean) => {
                    if clean != v {
                        rejected[i] = true;
                        tracing::debug!(
                            axis = axis.label(),
                            value = v,
                            clipped = clean,
                            "value filtered"
                        );
                    }
                    accel[i] = clean;
                    self.last_accel[i] = clean;
                }
                None => {
                    rejected[i] = true;
                    accel[i] = self.last_accel[i];
                    tracing::debug!(
                        axis = axis.label(),
                        value = v,
                        held = accel[i],
                        "value filtered"
                    );
                }
            }
        }

        let gyro = sample.gyro.map(|g| {
            let mut out = g;
            for i in 0..3 {
                if g[i].is_finite() {
                    self.last_gyro[i] = g[i];
                } else {
                    out[i] = self.last_gyro[i];
                }
            }
            out
        });

        FilteredSample {
            timestamp: sample.timestamp,
            accel,
            gyro,
            raw_accel: raw,
            rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f32, y: f32, z: f32) -> Sample {
        Sample::new(0.0, Vector3::new(x, y, z))
    }

    #[test]
    fn hold_mode_repeats_last_good_value() {
        let mut f = SampleFilter::new(&CalibrationConfig::default());
        let a = f.apply(&sample(0.1, 0.0, 0.4));
        assert_eq!(a.rejected_count(), 0);

        let b = f.apply(&sample(0.1, 0.0, 3.5));
        assert_eq!(b.rejected, [false, false, true]);
        assert!((b.accel.z - 0.4).abs() < 1e-6);
        // raw value is kept for the ceiling check
        assert!((b.raw_accel.z - 3.5).abs() < 1e-6);
    }

    #[test]
    fn clamp_mode_clips_to_ceiling() {
        let cfg = CalibrationConfig {
            filter_mode: FilterMode::Clamp,
            ..Default::default()
        };
        let mut f = SampleFilter::new(&cfg);
        let out = f.apply(&sample(-2.5, 0.0, 0.0));
        assert!((out.accel.x + 2.0).abs() < 1e-6);
        assert!(out.rejected[0]);
    }

    #[test]
    fn malformed_sample_keeps_cadence() {
        let mut f = SampleFilter::new(&CalibrationConfig::default());
        f.apply(&sample(0.01, 0.02, 0.03));
        let out = f.apply(&Sample::malformed(0.02));
        assert_eq!(out.rejected_count(), 3);
        assert!((out.accel.y - 0.02).abs() < 1e-6);
        assert!((out.timestamp - 0.02).abs() < 1e-9);
    }

    #[test]
    fn gravity_offset_applies_to_primary_only() {
        let cfg = CalibrationConfig {
            gravity_offset: 1.0,
            ..Default::default()
        };
        let mut f = SampleFilter::new(&cfg);
        let out = f.apply(&sample(0.0, 0.0, 1.02));
        assert!((out.accel.z - 0.02).abs() < 1e-5);
        assert_eq!(out.accel.x, 0.0);
    }

    #[test]
    fn non_finite_gyro_is_held() {
        let mut f = SampleFilter::new(&CalibrationConfig::default());
        f.apply(&sample(0.0, 0.0, 0.0).with_gyro(Vector3::new(1.0, 2.0, 3.0)));
        let out = f.apply(&sample(0.0, 0.0, 0.0).with_gyro(Vector3::new(f32::NAN, 5.0, 3.0)));
        let g = out.gyro.unwrap();
        assert_eq!(g, Vector3::new(1.0, 5.0, 3.0));
    }
}
