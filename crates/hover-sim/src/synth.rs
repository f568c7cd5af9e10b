//! Synthetic IMU recordings of a full hop: idle, spin-up, takeoff wobble,
//! hover and a quiet landing.

use std::f64::consts::TAU;

use hover_core::Sample;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, NormalError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlightPhase {
    Idle,
    SpinUp,
    Takeoff,
    Hover,
    Landed,
}

/// Shape of the generated flight. Durations in seconds, accelerations in g,
/// angular rates in degrees per second.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightProfile {
    pub rate_hz: f64,
    pub idle_s: f64,
    pub spinup_s: f64,
    /// One full sine period on the primary axis: up, down past baseline, back.
    pub takeoff_s: f64,
    pub takeoff_amplitude: f32,
    pub hover_s: f64,
    pub landed_s: f64,
    /// Primary-axis level while sitting on the ground after landing.
    pub landed_level: f32,
    /// Alternating gyro swing while the props spin up.
    pub spin_gyro: f32,
    pub hover_gyro: f32,
    /// Residual angular rate after landing, held constant.
    pub landed_gyro: f32,
    /// Added to the primary axis, e.g. 1.0 for a sensor that reads +1 g at rest.
    pub gravity_offset: f32,
}

impl Default for FlightProfile {
    fn default() -> Self {
        Self {
            rate_hz: 50.0,
            idle_s: 2.0,
            spinup_s: 1.0,
            takeoff_s: 2.0,
            takeoff_amplitude: 0.3,
            hover_s: 4.0,
            landed_s: 12.0,
            landed_level: 0.02,
            spin_gyro: 4.0,
            hover_gyro: 12.0,
            landed_gyro: 4.0,
            gravity_offset: 0.0,
        }
    }
}

impl FlightProfile {
    pub fn duration(&self) -> f64 {
        self.idle_s + self.spinup_s + self.takeoff_s + self.hover_s + self.landed_s
    }

    pub fn phase_at(&self, t: f64) -> FlightPhase {
        let mut edge = self.idle_s;
        if t < edge {
            return FlightPhase::Idle;
        }
        edge += self.spinup_s;
        if t < edge {
            return FlightPhase::SpinUp;
        }
        edge += self.takeoff_s;
        if t < edge {
            return FlightPhase::Takeoff;
        }
        edge += self.hover_s;
        if t < edge {
            return FlightPhase::Hover;
        }
        FlightPhase::Landed
    }

    /// Noise-free primary-axis value and gyro Y rate at sample index `i`.
    fn truth(&self, i: usize, t: f64) -> (f32, f32) {
        let swing = |amp: f32| if i % 2 == 0 { amp } else { -amp };
        match self.phase_at(t) {
            FlightPhase::Idle => (0.0, 0.0),
            FlightPhase::SpinUp => (0.0, swing(self.spin_gyro)),
            FlightPhase::Takeoff => {
                let u = (t - self.idle_s - self.spinup_s) / self.takeoff_s;
                let z = self.takeoff_amplitude as f64 * (TAU * u).sin();
                (z as f32, swing(self.spin_gyro))
            }
            FlightPhase::Hover => (0.0, swing(self.hover_gyro)),
            FlightPhase::Landed => (self.landed_level, self.landed_gyro),
        }
    }
}

pub struct SensorNoise {
    pub noise_scale: f64,
    pub accel_noise_std: f64, // g
    pub gyro_noise_std: f64,  // dps
    pub seed: u64,
}

impl Default for SensorNoise {
    fn default() -> Self {
        Self {
            noise_scale: 1.0,
            accel_noise_std: 0.002,
            gyro_noise_std: 0.2,
            seed: 42,
        }
    }
}

/// Generate the sample stream for `profile`. Same seed, same samples.
pub fn generate_flight(
    profile: &FlightProfile,
    noise: &SensorNoise,
) -> Result<Vec<Sample>, NormalError> {
    let mut rng = StdRng::seed_from_u64(noise.seed);
    let d_accel = Normal::new(0.0, noise.noise_scale * noise.accel_noise_std)?;
    let d_gyro = Normal::new(0.0, noise.noise_scale * noise.gyro_noise_std)?;

    let dt = 1.0 / profile.rate_hz;
    let n = (profile.duration() * profile.rate_hz).round() as usize;
    let mut samples = Vec::with_capacity(n);

    for i in 0..n {
        let t = i as f64 * dt;
        let (z, gy) = profile.truth(i, t);

        let ax = d_accel.sample(&mut rng) as f32;
        let ay = d_accel.sample(&mut rng) as f32;
        let az = z + profile.gravity_offset + d_accel.sample(&mut rng) as f32;

        let gx = d_gyro.sample(&mut rng) as f32;
        let gy = gy + d_gyro.sample(&mut rng) as f32;
        let gz = d_gyro.sample(&mut rng) as f32;

        samples.push(Sample::new(t, Vector3::new(ax, ay, az)).with_gyro(Vector3::new(gx, gy, gz)));
    }

    tracing::debug!(samples = samples.len(), seed = noise.seed, "synthetic flight generated");
    Ok(samples)
}
