use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Axes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The two axes orthogonal to `self`, in index order.
    pub fn lateral(self) -> [Axis; 2] {
        match self {
            Axis::X => [Axis::Y, Axis::Z],
            Axis::Y => [Axis::X, Axis::Z],
            Axis::Z => [Axis::X, Axis::Y],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

// ---------------------------------------------------------------------------
// Sample
// ---------------------------------------------------------------------------

/// One IMU reading as delivered by the acquisition layer.
///
/// Acceleration is in g with gravity already removed from the vertical axis
/// (or removed by the filter's `gravity_offset`), angular rate in degrees/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    pub accel: Vector3<f32>,
    pub gyro: Option<Vector3<f32>>,
}

impl Sample {
    pub fn new(timestamp: f64, accel: Vector3<f32>) -> Self {
        Self {
            timestamp,
            accel,
            gyro: None,
        }
    }

    pub fn with_gyro(mut self, gyro: Vector3<f32>) -> Self {
        self.gyro = Some(gyro);
        self
    }

    /// Placeholder for an input record that could not be decoded. Every
    /// accelerometer axis is NaN so the filter holds the previous values and
    /// the stream keeps its cadence.
    pub fn malformed(timestamp: f64) -> Self {
        Self {
            timestamp,
            accel: Vector3::new(f32::NAN, f32::NAN, f32::NAN),
            gyro: None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.accel.iter().all(|v| v.is_nan())
    }

    #[inline]
    pub fn axis(&self, axis: Axis) -> f32 {
        self.accel[axis.index()]
    }
}

/// `f32::abs` without relying on std.
#[inline]
pub(crate) fn fabs(v: f32) -> f32 {
    if v < 0.0 {
        -v
    } else {
        v
    }
}
