// ---------------------------------------------------------------------------
// Enums & Events
// ---------------------------------------------------------------------------

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CalibrationConfig;
use crate::features::{FeatureSet, Trend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum DetectionState {
    Idle = 0,
    MotorOn = 1,
    FirstRise = 2,  // Z climbing as the props bite
    FirstFall = 3,  // Z coming back down from the first peak
    SecondFall = 4, // Z below baseline
    SecondRise = 5, // Z recovering towards hover
    Steady = 6,     // Stabilized flight
}

pub const NUM_STATES: usize = 7;

impl DetectionState {
    pub const ALL: [DetectionState; NUM_STATES] = [
        Self::Idle,
        Self::MotorOn,
        Self::FirstRise,
        Self::FirstFall,
        Self::SecondFall,
        Self::SecondRise,
        Self::Steady,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::MotorOn => "MOTOR_ON",
            Self::FirstRise => "FIRST_RISE",
            Self::FirstFall => "FIRST_FALL",
            Self::SecondFall => "SECOND_FALL",
            Self::SecondRise => "SECOND_RISE",
            Self::Steady => "STEADY",
        }
    }
}

impl fmt::Display for DetectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionCause {
    Threshold,
    Timeout,
    LargeMovement,
    MotorStop,
    Landing,
}

impl TransitionCause {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::Timeout => "timeout",
            Self::LargeMovement => "large-movement",
            Self::MotorStop => "motor-stop",
            Self::Landing => "landing",
        }
    }
}

impl fmt::Display for TransitionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse status published alongside the state: motors started or stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DroneStatus {
    Stop,
    Start,
}

impl DroneStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "STOP",
            Self::Start => "START",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub timestamp: f64,
    pub from: DetectionState,
    pub to: DetectionState,
    pub cause: TransitionCause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    NotAllowed {
        from: DetectionState,
        to: DetectionState,
    },
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAllowed { from, to } => {
                write!(f, "transition {from} -> {to} is not in the transition table")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransitionError {}

// ---------------------------------------------------------------------------
// State-keyed policy tables
// ---------------------------------------------------------------------------

/// The transition table. Every non-idle state may fall back to IDLE.
pub fn is_allowed(from: DetectionState, to: DetectionState) -> bool {
    use DetectionState::*;
    matches!(
        (from, to),
        (Idle, MotorOn)
            | (MotorOn, FirstRise)
            | (FirstRise, FirstFall)
            | (FirstFall, SecondFall)
            | (SecondFall, SecondRise)
            | (SecondRise, Steady)
    ) || (to == Idle && from != Idle)
}

/// Primary-axis magnitude above which a sample is implausible in `state`.
pub fn large_ceiling(state: DetectionState, cfg: &CalibrationConfig) -> f32 {
    match state {
        DetectionState::Idle | DetectionState::MotorOn | DetectionState::FirstRise => {
            cfg.large_thresh_ground
        }
        DetectionState::FirstFall
        | DetectionState::SecondFall
        | DetectionState::SecondRise
        | DetectionState::Steady => cfg.large_thresh_takeoff,
    }
}

/// How long the pattern may stall in `state` before it is abandoned.
pub fn timeout_for(state: DetectionState, cfg: &CalibrationConfig) -> Option<f64> {
    match state {
        DetectionState::FirstRise => Some(cfg.rise_timeout_s),
        DetectionState::FirstFall => Some(cfg.first_fall_timeout_s),
        DetectionState::SecondFall => Some(cfg.second_fall_timeout_s),
        DetectionState::Idle
        | DetectionState::MotorOn
        | DetectionState::SecondRise
        | DetectionState::Steady => None,
    }
}

pub fn large_movement(state: DetectionState, f: &FeatureSet, cfg: &CalibrationConfig) -> bool {
    f.primary_raw_abs() > large_ceiling(state, cfg)
        || f.lateral_raw_max() > cfg.large_thresh_lateral
        || f.gyro_abs_max.is_some_and(|g| g > cfg.gyro_large_thresh)
}

/// Per-sample inputs to the transition decision.
#[derive(Debug, Clone, Copy)]
pub struct Inputs<'a> {
    pub features: &'a FeatureSet,
    /// Motor-stop verdict; only ever true in MOTOR_ON and FIRST_RISE.
    pub motor_stopped: bool,
}

/// Decide the transition for one sample, without side effects.
///
/// Order: large movement, then timeout, then the state's advance condition.
/// Returns `(Idle, LargeMovement)` in IDLE as well; the caller treats that as
/// a window reset rather than a transition.
pub fn evaluate(
    state: DetectionState,
    elapsed: f64,
    inputs: &Inputs,
    cfg: &CalibrationConfig,
) -> Option<(DetectionState, TransitionCause)> {
    use DetectionState::*;
    let f = inputs.features;
    let motor_stopped = inputs.motor_stopped;

    if large_movement(state, f, cfg) {
        return Some((Idle, TransitionCause::LargeMovement));
    }

    if let Some(limit) = timeout_for(state, cfg) {
        if elapsed >= limit {
            return Some((Idle, TransitionCause::Timeout));
        }
    }

    let next = match state {
        Idle => f.motor_active.then_some(MotorOn),
        MotorOn => {
            if motor_stopped {
                return Some((Idle, TransitionCause::MotorStop));
            }
            f.trend_qualifies(Trend::Rising, cfg).then_some(FirstRise)
        }
        FirstRise => {
            if motor_stopped {
                return Some((Idle, TransitionCause::MotorStop));
            }
            f.trend_qualifies(Trend::Falling, cfg).then_some(FirstFall)
        }
        FirstFall => {
            let past_marker = f.primary < cfg.second_fall_marker;
            (f.trend_qualifies(Trend::Falling, cfg) && past_marker).then_some(SecondFall)
        }
        SecondFall => f.trend_qualifies(Trend::Rising, cfg).then_some(SecondRise),
        SecondRise => {
            let settled = f.trend_samples >= cfg.min_trend_samples
                && f.trend_amplitude < cfg.idle_thresh
                && f.lateral_amplitude_max() < cfg.idle_thresh_lateral;
            settled.then_some(Steady)
        }
        // Landing is confirmed by the landing monitor
        Steady => None,
    };

    next.map(|s| (s, TransitionCause::Threshold))
}

// ---------------------------------------------------------------------------
// State Machine
// ---------------------------------------------------------------------------

/// Result of one `update`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub event: Option<TransitionEvent>,
    /// A large movement was seen; the caller should drop its windows.
    pub large_movement: bool,
}

pub struct StateMachine {
    config: CalibrationConfig,
    state: DetectionState,
    status: DroneStatus,

    /// Time when the current state was entered.
    state_start_time: Option<f64>,

    /// Most recent entry time per state, NaN if never reached.
    transition_times: [f64; NUM_STATES],

    transition_count: u32,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new(CalibrationConfig::default())
    }
}

impl StateMachine {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            state: DetectionState::Idle,
            status: DroneStatus::Stop,
            state_start_time: None,
            transition_times: [f64::NAN; NUM_STATES],
            transition_count: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }

    pub fn update(&mut self, inputs: &Inputs) -> Step {
        let f = inputs.features;
        let now = f.timestamp;
        let entered = *self.state_start_time.get_or_insert(now);
        if self.transition_times[DetectionState::Idle as usize].is_nan() {
            self.transition_times[DetectionState::Idle as usize] = entered;
        }

        let decision = evaluate(self.state, now - entered, inputs, &self.config);
        let Some((next, cause)) = decision else {
            return Step {
                event: None,
                large_movement: false,
            };
        };

        let large = cause == TransitionCause::LargeMovement;
        if self.state == DetectionState::Idle && next == DetectionState::Idle {
            tracing::info!(
                primary = f.primary_raw_abs(),
                "large movement while idle, windows cleared"
            );
            return Step {
                event: None,
                large_movement: large,
            };
        }

        Step {
            event: self.request_transition(next, cause, now).ok(),
            large_movement: large,
        }
    }

    /// Apply a transition if the table allows it; otherwise keep the state.
    pub fn request_transition(
        &mut self,
        to: DetectionState,
        cause: TransitionCause,
        time: f64,
    ) -> Result<TransitionEvent, TransitionError> {
        let from = self.state;
        if !is_allowed(from, to) {
            tracing::warn!(
                from = %from,
                to = %to,
                cause = %cause,
                "ignoring transition not in table"
            );
            return Err(TransitionError::NotAllowed { from, to });
        }

        let held_s = time - self.state_start_time.unwrap_or(time);
        self.transition_to(to, time);

        match cause {
            TransitionCause::Timeout => {
                tracing::info!(from = %from, held_s, "pattern abandoned: timeout, back to IDLE")
            }
            TransitionCause::LargeMovement => {
                tracing::info!(from = %from, "large movement, reset to IDLE")
            }
            _ => tracing::info!(from = %from, to = %to, cause = %cause, held_s, "state change"),
        }

        Ok(TransitionEvent {
            timestamp: time,
            from,
            to,
            cause,
        })
    }

    fn transition_to(&mut self, new_state: DetectionState, time: f64) {
        self.state = new_state;
        self.state_start_time = Some(time);
        self.transition_times[new_state as usize] = time;
        self.transition_count += 1;

        let status = match new_state {
            DetectionState::MotorOn => Some(DroneStatus::Start),
            DetectionState::Idle => Some(DroneStatus::Stop),
            _ => None,
        };
        if let Some(status) = status {
            if status != self.status {
                tracing::info!(status = status.as_str(), "drone status");
            }
            self.status = status;
        }
    }

    pub fn current_state(&self) -> DetectionState {
        self.state
    }

    pub fn status(&self) -> DroneStatus {
        self.status
    }

    pub fn transition_time(&self, state: DetectionState) -> f64 {
        self.transition_times[state as usize]
    }

    pub fn transition_count(&self) -> u32 {
        self.transition_count
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }
}
