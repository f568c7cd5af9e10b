use crate::config::CalibrationConfig;
use crate::features::FeatureSet;
use crate::state_machine::DetectionState;

/// Watches for the steady-idle condition while in STEADY.
///
/// The condition must hold without a single break for `landing_confirm_s`;
/// one disqualifying sample starts the count again from zero.
#[derive(Debug, Clone)]
pub struct LandingMonitor {
    idle_thresh: f32,
    gyro_thresh: f32,
    confirm_s: f64,
    /// Timestamp of the first sample of the current qualifying run.
    since: Option<f64>,
}

impl LandingMonitor {
    pub fn new(cfg: &CalibrationConfig) -> Self {
        Self {
            idle_thresh: cfg.steady_idle_thresh,
            gyro_thresh: cfg.steady_gyro_thresh,
            confirm_s: cfg.landing_confirm_s,
            since: None,
        }
    }

    pub fn reset(&mut self) {
        self.since = None;
    }

    /// Seconds of the current qualifying run at time `now`.
    pub fn held_for(&self, now: f64) -> f64 {
        self.since.map_or(0.0, |t0| now - t0)
    }

    pub fn condition(&self, f: &FeatureSet) -> bool {
        let calm_accel = f.primary_amplitude() < self.idle_thresh;
        // no gyro on the stream: only the accelerometer can disqualify
        let calm_gyro = f.gyro_abs_max.map_or(true, |g| g < self.gyro_thresh);
        calm_accel && calm_gyro
    }

    /// Returns true once the condition has held for the full window.
    pub fn update(&mut self, state: DetectionState, f: &FeatureSet) -> bool {
        if state != DetectionState::Steady {
            self.since = None;
            return false;
        }

        if !self.condition(f) {
            if self.since.is_some() {
                tracing::debug!(
                    held_s = self.held_for(f.timestamp),
                    primary_amp = f.primary_amplitude(),
                    "steady-idle run broken"
                );
            }
            self.since = None;
            return false;
        }

        let t0 = *self.since.get_or_insert(f.timestamp);
        f.timestamp - t0 >= self.confirm_s
    }
}
