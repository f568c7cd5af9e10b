use core::fmt;

use serde::{Deserialize, Serialize};

use crate::ring::RING_CAPACITY;
use crate::sample::Axis;

// ---------------------------------------------------------------------------
// Enums & Config
// ---------------------------------------------------------------------------

/// What the sample filter does with an axis reading above the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Replace the reading with the last accepted value on that axis.
    Hold,
    /// Clip the reading to +/- ceiling.
    Clamp,
}

/// Calibration constants for one detection run.
///
/// Accelerations in g, angular rates in degrees/s, durations in seconds,
/// windows in samples. Loaded once and never mutated while detecting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub primary_axis: Axis,

    // Idle / large-movement ceilings
    pub idle_thresh: f32,
    pub idle_thresh_lateral: f32,
    /// Ceiling for FIRST_FALL, SECOND_FALL, SECOND_RISE and STEADY.
    pub large_thresh_takeoff: f32,
    /// Ceiling for IDLE, MOTOR_ON and FIRST_RISE.
    pub large_thresh_ground: f32,
    pub large_thresh_lateral: f32,
    pub gyro_large_thresh: f32,

    // Trend detection
    pub margin: f32,
    pub min_amplitude: f32,
    pub trend_window: usize,
    pub trend_baseline: usize,
    pub min_trend_samples: usize,
    pub second_fall_marker: f32,

    // Sample filter
    pub filter_ceiling: f32,
    pub filter_mode: FilterMode,
    pub gravity_offset: f32,

    // Ripple
    pub ripple_window: usize,
    pub ripple_threshold: f32,

    // Motor activity
    pub motor_accel_delta: f32,
    pub motor_gyro_delta: f32,
    pub motor_stop_accel_delta: f32,
    pub motor_stop_gyro_delta: f32,

    // Landing
    pub steady_idle_thresh: f32,
    pub steady_gyro_thresh: f32,
    pub landing_confirm_s: f64,

    // Timeouts
    pub rise_timeout_s: f64,
    pub first_fall_timeout_s: f64,
    pub second_fall_timeout_s: f64,

    /// Emit a feature diagnostic every N samples (0 disables).
    pub diagnostic_interval: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            primary_axis: Axis::Z,
            idle_thresh: 0.05,
            idle_thresh_lateral: 0.09,
            large_thresh_takeoff: 2.0,
            large_thresh_ground: 1.5,
            large_thresh_lateral: 0.9,
            gyro_large_thresh: 300.0,
            margin: 0.05,
            min_amplitude: 0.05,
            trend_window: 20,
            trend_baseline: 3,
            min_trend_samples: 5,
            second_fall_marker: -0.05,
            filter_ceiling: 2.0,
            filter_mode: FilterMode::Hold,
            gravity_offset: 0.0,
            ripple_window: 20,
            ripple_threshold: 0.0005,
            motor_accel_delta: 0.02,
            motor_gyro_delta: 5.0,
            motor_stop_accel_delta: 0.01,
            motor_stop_gyro_delta: 2.5,
            steady_idle_thresh: 0.03,
            steady_gyro_thresh: 10.0,
            landing_confirm_s: 10.0,
            rise_timeout_s: 5.0,
            first_fall_timeout_s: 5.0,
            second_fall_timeout_s: 5.0,
            diagnostic_interval: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// A window length is zero or larger than the ring capacity.
    Window { name: &'static str, value: usize },
    /// A threshold or duration that must be positive is not.
    NonPositive { name: &'static str, value: f64 },
    /// The motor-stop threshold must be stricter than the activity threshold.
    MotorThresholds,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Window { name, value } => write!(
                f,
                "{name} = {value} must be between 1 and {RING_CAPACITY} samples"
            ),
            Self::NonPositive { name, value } => {
                write!(f, "{name} = {value} must be positive")
            }
            Self::MotorThresholds => {
                f.write_str("motor-stop thresholds must be below motor-activity thresholds")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let windows = [
            ("ripple_window", self.ripple_window),
            ("trend_window", self.trend_window),
            ("trend_baseline", self.trend_baseline),
            ("min_trend_samples", self.min_trend_samples),
        ];
        for (name, value) in windows {
            if value == 0 || value > RING_CAPACITY {
                return Err(ConfigError::Window { name, value });
            }
        }
        if self.trend_baseline > self.trend_window {
            return Err(ConfigError::Window {
                name: "trend_baseline",
                value: self.trend_baseline,
            });
        }

        let positive = [
            ("idle_thresh", self.idle_thresh as f64),
            ("idle_thresh_lateral", self.idle_thresh_lateral as f64),
            ("large_thresh_takeoff", self.large_thresh_takeoff as f64),
            ("large_thresh_ground", self.large_thresh_ground as f64),
            ("large_thresh_lateral", self.large_thresh_lateral as f64),
            ("gyro_large_thresh", self.gyro_large_thresh as f64),
            ("margin", self.margin as f64),
            ("min_amplitude", self.min_amplitude as f64),
            ("filter_ceiling", self.filter_ceiling as f64),
            ("motor_accel_delta", self.motor_accel_delta as f64),
            ("motor_gyro_delta", self.motor_gyro_delta as f64),
            ("motor_stop_accel_delta", self.motor_stop_accel_delta as f64),
            ("motor_stop_gyro_delta", self.motor_stop_gyro_delta as f64),
            ("steady_idle_thresh", self.steady_idle_thresh as f64),
            ("steady_gyro_thresh", self.steady_gyro_thresh as f64),
            ("landing_confirm_s", self.landing_confirm_s),
            ("rise_timeout_s", self.rise_timeout_s),
            ("first_fall_timeout_s", self.first_fall_timeout_s),
            ("second_fall_timeout_s", self.second_fall_timeout_s),
        ];
        for (name, value) in positive {
            // NaN fails this comparison as well
            if !(value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }

        if self.motor_stop_accel_delta >= self.motor_accel_delta
            || self.motor_stop_gyro_delta >= self.motor_gyro_delta
        {
            return Err(ConfigError::MotorThresholds);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = CalibrationConfig::default();
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.primary_axis, Axis::Z);
        assert!((cfg.idle_thresh - 0.05).abs() < 1e-6);
        assert!((cfg.large_thresh_takeoff - 2.0).abs() < 1e-6);
        assert!((cfg.large_thresh_ground - 1.5).abs() < 1e-6);
    }

    #[test]
    fn rejects_oversized_window() {
        let cfg = CalibrationConfig {
            ripple_window: RING_CAPACITY + 1,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Window { name: "ripple_window", .. })
        ));
    }

    #[test]
    fn rejects_inverted_motor_thresholds() {
        let cfg = CalibrationConfig {
            motor_stop_accel_delta: 0.05,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::MotorThresholds));
    }

    #[test]
    fn rejects_nan_threshold() {
        let cfg = CalibrationConfig {
            margin: f32::NAN,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NonPositive { name: "margin", .. })
        ));
    }
}
