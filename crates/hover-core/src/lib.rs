//! # Hover Core
//!
//! Drone flight-phase detection designed for `no_std` environments.
//! This crate contains only the code that needs to run next to the IMU:
//! - Sample filter and sliding-window features
//! - Motor-activity detection
//! - Takeoff state machine and landing confirmation
//!
//! # Features
//! - `std`: Enable standard library support (host tools)
//! - Default: `no_std` with no allocations (bare metal embedded)

#![cfg_attr(not(any(feature = "std", test)), no_std)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod config;
pub mod detector;
pub mod features;
pub mod filter;
pub mod landing;
pub mod motor;
pub mod ring;
pub mod sample;
pub mod state_machine;

// Re-export core types
pub use config::{CalibrationConfig, ConfigError, FilterMode};
pub use detector::TakeoffDetector;
pub use features::{FeatureSet, Trend};
pub use sample::{Axis, Sample};
pub use state_machine::{
    DetectionState, DroneStatus, Inputs, StateMachine, TransitionCause, TransitionError,
    TransitionEvent, NUM_STATES,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
