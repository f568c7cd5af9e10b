use crate::config::CalibrationConfig;
use crate::features::{FeatureExtractor, FeatureSet};
use crate::filter::SampleFilter;
use crate::landing::LandingMonitor;
use crate::motor::MotorActivityDetector;
use crate::sample::Sample;
use crate::state_machine::{
    DetectionState, DroneStatus, Inputs, StateMachine, TransitionCause, TransitionEvent,
};

/// Full per-sample pipeline: filter, features, motor activity, state machine,
/// landing confirmation.
///
/// One instance per stream. Processing is synchronous and allocation-free.
pub struct TakeoffDetector {
    config: CalibrationConfig,
    filter: SampleFilter,
    extractor: FeatureExtractor,
    motor: MotorActivityDetector,
    machine: StateMachine,
    landing: LandingMonitor,
    last: Option<FeatureSet>,
    samples_seen: u64,
    filtered_count: u64,
}

impl Default for TakeoffDetector {
    fn default() -> Self {
        Self::new(CalibrationConfig::default())
    }
}

impl TakeoffDetector {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            filter: SampleFilter::new(&config),
            extractor: FeatureExtractor::new(&config),
            motor: MotorActivityDetector::new(&config),
            machine: StateMachine::new(config),
            landing: LandingMonitor::new(&config),
            last: None,
            samples_seen: 0,
            filtered_count: 0,
        }
    }

    /// Back to IDLE with empty windows, as if freshly constructed.
    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }

    pub fn process(&mut self, sample: &Sample) -> Option<TransitionEvent> {
        self.samples_seen += 1;

        let filtered = self.filter.apply(sample);
        self.filtered_count += filtered.rejected_count() as u64;

        let mut f = self.extractor.update(&filtered);
        f.motor_active = self.motor.is_active(&f);
        let motor_stopped = self.motor.has_stopped(self.machine.current_state(), &f);

        let step = self.machine.update(&Inputs {
            features: &f,
            motor_stopped,
        });
        if step.large_movement {
            self.extractor.reset();
        } else if step.event.is_some() {
            self.extractor.reset_trend();
        }

        let mut event = step.event;
        if event.is_none() && self.landing.update(self.machine.current_state(), &f) {
            if let Ok(ev) = self.machine.request_transition(
                DetectionState::Idle,
                TransitionCause::Landing,
                f.timestamp,
            ) {
                self.extractor.reset_trend();
                event = Some(ev);
            }
        }
        if event.is_some() {
            self.landing.reset();
        }

        if self.config.diagnostic_interval > 0
            && self.samples_seen % u64::from(self.config.diagnostic_interval) == 0
        {
            tracing::debug!(
                t = f.timestamp,
                state = %self.machine.current_state(),
                primary = f.primary,
                primary_amp = f.primary_amplitude(),
                primary_var = f.variance[f.primary_axis.index()],
                rippling = f.rippling,
                lateral_amp = f.lateral_amplitude_max(),
                trend = %f.trend,
                trend_amp = f.trend_amplitude,
                motor = f.motor_active,
                landing_s = self.landing.held_for(f.timestamp),
                "diagnostics"
            );
        }

        self.last = Some(f);
        event
    }

    /// Run a batch of samples, handing each transition to `on_event`.
    pub fn process_all<'a, I, F>(&mut self, samples: I, mut on_event: F)
    where
        I: IntoIterator<Item = &'a Sample>,
        F: FnMut(TransitionEvent),
    {
        for s in samples {
            if let Some(ev) = self.process(s) {
                on_event(ev);
            }
        }
    }

    pub fn state(&self) -> DetectionState {
        self.machine.current_state()
    }

    pub fn status(&self) -> DroneStatus {
        self.machine.status()
    }

    /// Features of the most recent sample.
    pub fn features(&self) -> Option<&FeatureSet> {
        self.last.as_ref()
    }

    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    /// Accelerometer values replaced or clipped by the glitch filter.
    pub fn filtered_count(&self) -> u64 {
        self.filtered_count
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use std::vec::Vec;

    const DT: f64 = 0.02;

    #[derive(Clone, Copy)]
    enum Gyro {
        Still,
        /// Alternating +/- on Y: peak-to-peak is twice the value.
        Vibrate(f32),
        Constant(f32),
    }

    struct Script {
        n: u64,
        samples: Vec<Sample>,
    }

    impl Script {
        fn new() -> Self {
            Self {
                n: 0,
                samples: Vec::new(),
            }
        }

        /// Continue right after `last`.
        fn after(last: &Sample) -> Self {
            Self {
                n: (last.timestamp / DT).round() as u64 + 1,
                samples: Vec::new(),
            }
        }

        fn push(&mut self, z: f32, gyro: Gyro) {
            let gy = match gyro {
                Gyro::Still => 0.0,
                Gyro::Vibrate(a) if self.n % 2 == 0 => a,
                Gyro::Vibrate(a) => -a,
                Gyro::Constant(g) => g,
            };
            let t = self.n as f64 * DT;
            let accel = Vector3::new(0.0, 0.0, z);
            self.samples
                .push(Sample::new(t, accel).with_gyro(Vector3::new(0.0, gy, 0.0)));
            self.n += 1;
        }

        fn hold(mut self, secs: f64, z: f32, gyro: Gyro) -> Self {
            for _ in 0..(secs / DT).round() as usize {
                self.push(z, gyro);
            }
            self
        }

        fn ramp(mut self, secs: f64, z0: f32, z1: f32, gyro: Gyro) -> Self {
            let n = (secs / DT).round() as usize;
            for k in 1..=n {
                self.push(z0 + (z1 - z0) * k as f32 / n as f32, gyro);
            }
            self
        }

        fn build(self) -> Vec<Sample> {
            self.samples
        }
    }

    /// Idle, spin-up, rise, fall below baseline, recover, hover.
    fn takeoff() -> Script {
        Script::new()
            .hold(1.0, 0.0, Gyro::Still)
            .hold(1.0, 0.0, Gyro::Vibrate(4.0))
            .ramp(0.5, 0.0, 0.3, Gyro::Vibrate(4.0))
            .ramp(1.0, 0.3, -0.3, Gyro::Vibrate(4.0))
            .ramp(0.5, -0.3, 0.0, Gyro::Vibrate(4.0))
            .hold(3.0, 0.0, Gyro::Vibrate(12.0))
    }

    fn run(det: &mut TakeoffDetector, samples: &[Sample]) -> Vec<TransitionEvent> {
        let mut events = Vec::new();
        det.process_all(samples, |e| events.push(e));
        events
    }

    /// Feed the takeoff profile until `target` is reached. Returns the last
    /// sample fed.
    fn drive_to(det: &mut TakeoffDetector, target: DetectionState) -> Sample {
        for s in takeoff().build() {
            det.process(&s);
            if det.state() == target {
                return s;
            }
        }
        panic!("profile never reached {target}");
    }

    fn states(events: &[TransitionEvent]) -> Vec<(DetectionState, DetectionState)> {
        events.iter().map(|e| (e.from, e.to)).collect()
    }

    #[test]
    fn gyro_burst_starts_motors() {
        let mut det = TakeoffDetector::default();
        let quiet = Script::new().hold(1.0, 0.01, Gyro::Still).build();
        assert!(run(&mut det, &quiet).is_empty());
        assert_eq!(det.status(), DroneStatus::Stop);

        let burst = Script::after(quiet.last().unwrap())
            .hold(DT, 0.01, Gyro::Constant(8.0))
            .build();
        let ev = det.process(&burst[0]).expect("motor on");
        assert_eq!((ev.from, ev.to), (DetectionState::Idle, DetectionState::MotorOn));
        assert_eq!(ev.cause, TransitionCause::Threshold);
        assert_eq!(det.status(), DroneStatus::Start);
    }

    #[test]
    fn rising_primary_enters_first_rise() {
        let mut det = TakeoffDetector::default();
        let last = drive_to(&mut det, DetectionState::MotorOn);
        let ramp = Script::after(&last)
            .ramp(0.5, 0.0, 0.12, Gyro::Vibrate(4.0))
            .build();
        let events = run(&mut det, &ramp);
        assert_eq!(
            states(&events),
            [(DetectionState::MotorOn, DetectionState::FirstRise)]
        );
        assert_eq!(events[0].cause, TransitionCause::Threshold);
    }

    /// From a fresh detector, spin up and ramp until FIRST_RISE is entered.
    /// Returns the entry sample.
    fn enter_first_rise(det: &mut TakeoffDetector) -> Sample {
        let last = drive_to(det, DetectionState::MotorOn);
        let ramp = Script::after(&last)
            .ramp(0.5, 0.0, 0.12, Gyro::Vibrate(4.0))
            .build();
        for s in &ramp {
            if det.process(s).is_some() {
                assert_eq!(det.state(), DetectionState::FirstRise);
                return *s;
            }
        }
        panic!("ramp never entered FIRST_RISE");
    }

    #[test]
    fn stalled_rise_times_out() {
        let mut det = TakeoffDetector::default();
        let entered = enter_first_rise(&mut det);

        // flat 0.03 g with the rotors quiet: neither a fall nor a stop
        let flat = Script::after(&entered).hold(6.0, 0.03, Gyro::Still).build();
        let events = run(&mut det, &flat);
        let ev = events.first().expect("timeout");
        assert_eq!((ev.from, ev.to), (DetectionState::FirstRise, DetectionState::Idle));
        assert_eq!(ev.cause, TransitionCause::Timeout);
        let held = ev.timestamp - entered.timestamp;
        assert!((5.0 - 1e-6..5.0 + 0.021).contains(&held), "held {held}");
        assert!(!events.iter().any(|e| e.to == DetectionState::FirstFall));
    }

    #[test]
    fn motors_stopping_in_first_rise_return_to_idle() {
        let mut det = TakeoffDetector::default();
        let entered = enter_first_rise(&mut det);

        let rest = Script::after(&entered).hold(1.0, 0.0, Gyro::Still).build();
        let events = run(&mut det, &rest);
        let ev = events.first().expect("motor stop");
        assert_eq!((ev.from, ev.to), (DetectionState::FirstRise, DetectionState::Idle));
        assert_eq!(ev.cause, TransitionCause::MotorStop);
        // the ripple windows have to drain first
        let held = ev.timestamp - entered.timestamp;
        assert!(held > 0.3 && held < 0.5, "held {held}");
        assert_eq!(det.status(), DroneStatus::Stop);
    }

    #[test]
    fn full_takeoff_then_landing() {
        let mut det = TakeoffDetector::default();
        let script = takeoff();
        let quiet_start = script.n as f64 * DT;
        let samples = script.hold(11.0, 0.02, Gyro::Constant(4.0)).build();
        let events = run(&mut det, &samples);

        use DetectionState::*;
        assert_eq!(
            states(&events),
            [
                (Idle, MotorOn),
                (MotorOn, FirstRise),
                (FirstRise, FirstFall),
                (FirstFall, SecondFall),
                (SecondFall, SecondRise),
                (SecondRise, Steady),
                (Steady, Idle),
            ]
        );
        assert!(events[..6].iter().all(|e| e.cause == TransitionCause::Threshold));

        let landing = events[6];
        assert_eq!(landing.cause, TransitionCause::Landing);
        let held = landing.timestamp - quiet_start;
        assert!((10.0 - 1e-6..10.2).contains(&held), "landed after {held}");
        assert_eq!(det.state(), Idle);
        assert_eq!(det.status(), DroneStatus::Stop);
    }

    #[test]
    fn fall_marker_gates_second_fall() {
        let mut det = TakeoffDetector::default();
        let mut events = Vec::new();
        for s in takeoff().build() {
            if let Some(e) = det.process(&s) {
                if e.to == DetectionState::SecondFall {
                    assert!(s.accel.z < -0.05, "second fall at z={}", s.accel.z);
                }
                events.push(e);
            }
        }
        assert!(events.iter().any(|e| e.to == DetectionState::SecondFall));
    }

    #[test]
    fn large_movement_resets_every_state() {
        use DetectionState::*;
        for target in [Idle, MotorOn, FirstRise, FirstFall, SecondFall, SecondRise, Steady] {
            let mut det = TakeoffDetector::default();
            let last = if target == Idle {
                let pre = Script::new().hold(0.5, 0.0, Gyro::Still).build();
                run(&mut det, &pre);
                *pre.last().unwrap()
            } else {
                drive_to(&mut det, target)
            };
            let spike_z = match target {
                Idle | MotorOn | FirstRise => 1.6,
                _ => 2.1,
            };
            let spike = Script::after(&last)
                .hold(DT, spike_z, Gyro::Vibrate(4.0))
                .build();
            let ev = det.process(&spike[0]);
            assert_eq!(det.state(), Idle, "from {target}");
            match target {
                Idle => assert!(ev.is_none()),
                _ => {
                    let ev = ev.expect("reset event");
                    assert_eq!((ev.from, ev.cause), (target, TransitionCause::LargeMovement));
                }
            }
            assert!(det.features().is_some());
        }
    }

    #[test]
    fn takeoff_states_tolerate_ground_ceiling() {
        let mut det = TakeoffDetector::default();
        let last = drive_to(&mut det, DetectionState::FirstFall);
        let spike = Script::after(&last)
            .hold(DT, -1.6, Gyro::Vibrate(4.0))
            .build();
        let ev = det.process(&spike[0]);
        assert!(ev.map_or(true, |e| e.cause != TransitionCause::LargeMovement));
        assert_ne!(det.state(), DetectionState::Idle);
    }

    #[test]
    fn fall_states_time_out() {
        for target in [DetectionState::FirstFall, DetectionState::SecondFall] {
            let mut det = TakeoffDetector::default();
            let last = drive_to(&mut det, target);
            let entered = last.timestamp;
            let flat = Script::after(&last)
                .hold(6.0, last.accel.z, Gyro::Vibrate(4.0))
                .build();
            let mut timeout = None;
            for s in &flat {
                if let Some(e) = det.process(s) {
                    timeout = Some(e);
                    break;
                }
            }
            let ev = timeout.expect("timeout");
            assert_eq!(
                (ev.from, ev.to, ev.cause),
                (target, DetectionState::Idle, TransitionCause::Timeout)
            );
            assert_eq!(det.state(), DetectionState::Idle);
            let held = ev.timestamp - entered;
            assert!((5.0 - 1e-6..5.0 + 0.021).contains(&held), "{target} held {held}");
        }
    }

    #[test]
    fn landing_window_must_be_contiguous() {
        let mut det = TakeoffDetector::default();
        let last = drive_to(&mut det, DetectionState::Steady);
        let mut samples = Script::after(&last).hold(9.9, 0.02, Gyro::Constant(4.0)).build();
        let mut rest = Script::after(samples.last().unwrap());
        let disqualify_at = rest.n as f64 * DT;
        rest.push(0.02, Gyro::Constant(20.0));
        samples.extend(rest.hold(10.5, 0.02, Gyro::Constant(4.0)).build());

        let events = run(&mut det, &samples);
        assert_eq!(events.len(), 1, "{events:?}");
        assert_eq!(events[0].cause, TransitionCause::Landing);
        assert!(events[0].timestamp >= disqualify_at + 10.0 - 1e-6);
    }

    #[test]
    fn reset_replays_identically() {
        let samples = takeoff().hold(11.0, 0.02, Gyro::Constant(4.0)).build();
        let mut det = TakeoffDetector::default();
        let first = run(&mut det, &samples);
        det.reset();
        assert_eq!(det.state(), DetectionState::Idle);
        assert_eq!(det.samples_seen(), 0);
        let second = run(&mut det, &samples);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn malformed_samples_are_counted_not_fatal() {
        let mut det = TakeoffDetector::default();
        det.process(&Sample::new(0.0, Vector3::new(0.0, 0.0, 0.01)));
        assert!(det.process(&Sample::malformed(0.02)).is_none());
        assert_eq!(det.samples_seen(), 2);
        assert_eq!(det.filtered_count(), 3);
        assert_eq!(det.state(), DetectionState::Idle);
    }

    #[test]
    fn hover_without_quiet_never_lands() {
        let mut det = TakeoffDetector::default();
        let last = drive_to(&mut det, DetectionState::Steady);
        let hover = Script::after(&last)
            .hold(15.0, 0.0, Gyro::Vibrate(12.0))
            .build();
        assert!(run(&mut det, &hover).is_empty());
        assert_eq!(det.state(), DetectionState::Steady);
    }
}
