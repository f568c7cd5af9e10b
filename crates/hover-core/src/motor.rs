use crate::config::CalibrationConfig;
use crate::features::FeatureSet;
use crate::sample::fabs;
use crate::state_machine::DetectionState;

/// Motor-vibration detection from the ripple amplitudes.
///
/// Activity is an OR over accelerometer and gyro deltas: spinning props
/// often show on the gyro before the vertical axis moves.
#[derive(Debug, Clone, Copy)]
pub struct MotorActivityDetector {
    accel_delta: f32,
    gyro_delta: f32,
    stop_accel_delta: f32,
    stop_gyro_delta: f32,
}

/// States in which "motor stopped" is meaningful (an aborted start).
pub fn motor_stop_armed(state: DetectionState) -> bool {
    match state {
        DetectionState::MotorOn | DetectionState::FirstRise => true,
        DetectionState::Idle
        | DetectionState::FirstFall
        | DetectionState::SecondFall
        | DetectionState::SecondRise
        | DetectionState::Steady => false,
    }
}

impl MotorActivityDetector {
    pub fn new(cfg: &CalibrationConfig) -> Self {
        Self {
            accel_delta: cfg.motor_accel_delta,
            gyro_delta: cfg.motor_gyro_delta,
            stop_accel_delta: cfg.motor_stop_accel_delta,
            stop_gyro_delta: cfg.motor_stop_gyro_delta,
        }
    }

    pub fn is_active(&self, f: &FeatureSet) -> bool {
        let accel = f.amplitude.iter().any(|a| *a > self.accel_delta);
        let gyro = f
            .gyro_amplitude
            .is_some_and(|g| g.iter().any(|a| *a > self.gyro_delta));
        accel || gyro || f.rippling
    }

    /// Motors stopped: the sample is back at rest and the ripple is gone.
    ///
    /// At rest means every offset-corrected axis and every angular rate sits
    /// under the strict thresholds. A steady non-zero level is not a stop.
    /// Only reported in the early states; returns false everywhere else.
    pub fn has_stopped(&self, state: DetectionState, f: &FeatureSet) -> bool {
        if !motor_stop_armed(state) || f.rippling {
            return false;
        }
        let accel_rest = f
            .accel
            .iter()
            .zip(f.amplitude.iter())
            .all(|(v, a)| fabs(*v) < self.stop_accel_delta && *a < self.stop_accel_delta);
        let gyro_rest = match (f.gyro_abs_max, f.gyro_amplitude) {
            (Some(g), Some(amp)) => {
                g < self.stop_gyro_delta && amp.iter().all(|a| *a < self.stop_gyro_delta)
            }
            _ => true,
        };
        accel_rest && gyro_rest
    }
}
