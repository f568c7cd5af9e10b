//! Per-sample motion features: ripple amplitude/variance per axis and the
//! primary-axis trend used by the takeoff pattern.

use core::fmt;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::config::CalibrationConfig;
use crate::filter::FilteredSample;
use crate::ring::RingBuffer;
use crate::sample::{fabs, Axis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    Flat,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Flat => "flat",
        })
    }
}

/// Quantities derived from one sample and the windows it landed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSet {
    pub timestamp: f64,
    pub primary_axis: Axis,
    pub accel: Vector3<f32>,
    pub raw_accel: Vector3<f32>,
    /// Peak-to-peak over the ripple window, per accelerometer axis.
    pub amplitude: [f32; 3],
    pub variance: [f32; 3],
    /// Peak-to-peak over the ripple window, per gyro axis.
    pub gyro_amplitude: Option<[f32; 3]>,
    /// Largest absolute angular rate in this sample.
    pub gyro_abs_max: Option<f32>,
    pub trend: Trend,
    /// Peak-to-peak of the primary trend window.
    pub trend_amplitude: f32,
    pub trend_samples: usize,
    /// Latest primary value (filtered).
    pub primary: f32,
    /// Primary ripple variance above the ripple threshold: props spinning.
    pub rippling: bool,
    /// Set by the motor-activity detector.
    pub motor_active: bool,
}

impl FeatureSet {
    pub fn primary_amplitude(&self) -> f32 {
        self.amplitude[self.primary_axis.index()]
    }

    pub fn lateral_amplitude_max(&self) -> f32 {
        let [a, b] = self.primary_axis.lateral();
        self.amplitude[a.index()].max(self.amplitude[b.index()])
    }

    /// Largest offset-corrected, unfiltered lateral magnitude.
    pub fn lateral_raw_max(&self) -> f32 {
        let [a, b] = self.primary_axis.lateral();
        fabs(self.raw_accel[a.index()]).max(fabs(self.raw_accel[b.index()]))
    }

    pub fn primary_raw_abs(&self) -> f32 {
        fabs(self.raw_accel[self.primary_axis.index()])
    }

    /// True when the trend may drive a transition: enough samples in the
    /// window and an amplitude above the noise floor.
    pub fn trend_qualifies(&self, want: Trend, cfg: &CalibrationConfig) -> bool {
        self.trend == want
            && self.trend_samples >= cfg.min_trend_samples
            && self.trend_amplitude >= cfg.min_amplitude
    }
}

/// Owns every window buffer. Nothing else reads or writes them.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    primary: Axis,
    margin: f32,
    trend_baseline: usize,
    ripple_threshold: f32,
    accel: [RingBuffer; 3],
    gyro: [RingBuffer; 3],
    trend: RingBuffer,
}

impl FeatureExtractor {
    pub fn new(cfg: &CalibrationConfig) -> Self {
        let ripple = || RingBuffer::new(cfg.ripple_window);
        Self {
            primary: cfg.primary_axis,
            margin: cfg.margin,
            trend_baseline: cfg.trend_baseline,
            ripple_threshold: cfg.ripple_threshold,
            accel: [ripple(), ripple(), ripple()],
            gyro: [ripple(), ripple(), ripple()],
            trend: RingBuffer::new(cfg.trend_window),
        }
    }

    /// Start a fresh trend window, e.g. after a state transition.
    pub fn reset_trend(&mut self) {
        self.trend.clear();
    }

    pub fn reset(&mut self) {
        for r in self.accel.iter_mut().chain(self.gyro.iter_mut()) {
            r.clear();
        }
        self.trend.clear();
    }

    pub fn update(&mut self, s: &FilteredSample) -> FeatureSet {
        let p = self.primary.index();

        let mut amplitude = [0.0f32; 3];
        let mut variance = [0.0f32; 3];
        for i in 0..3 {
            self.accel[i].push(s.accel[i]);
            amplitude[i] = self.accel[i].peak_to_peak();
            variance[i] = self.accel[i].variance();
        }

        let (gyro_amplitude, gyro_abs_max) = match s.gyro {
            Some(g) => {
                let mut amp = [0.0f32; 3];
                for i in 0..3 {
                    self.gyro[i].push(g[i]);
                    amp[i] = self.gyro[i].peak_to_peak();
                }
                let abs_max = fabs(g.x).max(fabs(g.y)).max(fabs(g.z));
                (Some(amp), Some(abs_max))
            }
            None => (None, None),
        };

        self.trend.push(s.accel[p]);
        let trend = match (self.trend.latest(), self.trend.oldest_mean(self.trend_baseline)) {
            (Some(latest), Some(baseline)) if self.trend.len() > 1 => {
                if latest - baseline > self.margin {
                    Trend::Rising
                } else if latest - baseline < -self.margin {
                    Trend::Falling
                } else {
                    Trend::Flat
                }
            }
            _ => Trend::Flat,
        };

        FeatureSet {
            timestamp: s.timestamp,
            primary_axis: self.primary,
            accel: s.accel,
            raw_accel: s.raw_accel,
            amplitude,
            variance,
            gyro_amplitude,
            gyro_abs_max,
            trend,
            trend_amplitude: self.trend.peak_to_peak(),
            trend_samples: self.trend.len(),
            primary: s.accel[p],
            rippling: variance[p] > self.ripple_threshold,
            motor_active: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SampleFilter;
    use crate::sample::Sample;

    fn feed(ex: &mut FeatureExtractor, values: &[f32]) -> FeatureSet {
        let cfg = CalibrationConfig::default();
        let mut filter = SampleFilter::new(&cfg);
        let mut last = None;
        for (i, z) in values.iter().enumerate() {
            let s = Sample::new(i as f64 * 0.02, Vector3::new(0.0, 0.0, *z));
            last = Some(ex.update(&filter.apply(&s)));
        }
        last.unwrap()
    }

    #[test]
    fn rising_ramp_is_a_qualified_trend() {
        let cfg = CalibrationConfig::default();
        let mut ex = FeatureExtractor::new(&cfg);
        let ramp: Vec<f32> = (0..15).map(|i| i as f32 * 0.01).collect();
        let f = feed(&mut ex, &ramp);
        assert_eq!(f.trend, Trend::Rising);
        assert!(f.trend_qualifies(Trend::Rising, &cfg));
        assert!(!f.trend_qualifies(Trend::Falling, &cfg));
    }

    #[test]
    fn small_wiggle_is_flat_noise() {
        let cfg = CalibrationConfig::default();
        let mut ex = FeatureExtractor::new(&cfg);
        let wiggle: Vec<f32> = (0..30).map(|i| if i % 2 == 0 { 0.01 } else { -0.01 }).collect();
        let f = feed(&mut ex, &wiggle);
        assert_eq!(f.trend, Trend::Flat);
        assert!((f.primary_amplitude() - 0.02).abs() < 1e-6);
        assert!(f.variance[2] > 0.0);
        assert!(!f.rippling);
    }

    #[test]
    fn amplitude_gate_blocks_short_windows() {
        let cfg = CalibrationConfig::default();
        let mut ex = FeatureExtractor::new(&cfg);
        // large step but only three samples in the trend window
        let f = feed(&mut ex, &[0.0, 0.0, 0.2]);
        assert_eq!(f.trend, Trend::Rising);
        assert!(!f.trend_qualifies(Trend::Rising, &cfg));
    }

    #[test]
    fn trend_reset_keeps_ripple_windows() {
        let cfg = CalibrationConfig::default();
        let mut ex = FeatureExtractor::new(&cfg);
        feed(&mut ex, &[0.0, 0.3, 0.0, 0.3]);
        ex.reset_trend();
        let f = feed(&mut ex, &[0.1]);
        assert_eq!(f.trend_samples, 1);
        assert!(f.primary_amplitude() > 0.25);
        assert!(f.rippling);
    }

    #[test]
    fn gyro_amplitude_tracks_vibration() {
        let cfg = CalibrationConfig::default();
        let mut ex = FeatureExtractor::new(&cfg);
        let mut filter = SampleFilter::new(&cfg);
        let mut last = None;
        for i in 0..4 {
            let g = if i % 2 == 0 { 4.0 } else { -4.0 };
            let s = Sample::new(i as f64 * 0.02, Vector3::zeros())
                .with_gyro(Vector3::new(0.0, g, 0.0));
            last = Some(ex.update(&filter.apply(&s)));
        }
        let f = last.unwrap();
        assert_eq!(f.gyro_amplitude, Some([0.0, 8.0, 0.0]));
        assert_eq!(f.gyro_abs_max, Some(4.0));
    }

    #[test]
    fn ripple_threshold_sets_rippling() {
        let wiggle: Vec<f32> = (0..20).map(|i| if i % 2 == 0 { 0.01 } else { -0.01 }).collect();
        let loose = CalibrationConfig {
            ripple_threshold: 0.00005,
            ..Default::default()
        };
        let mut ex = FeatureExtractor::new(&loose);
        assert!(feed(&mut ex, &wiggle).rippling);

        let mut ex = FeatureExtractor::new(&CalibrationConfig::default());
        assert!(!feed(&mut ex, &wiggle).rippling);
    }
}
