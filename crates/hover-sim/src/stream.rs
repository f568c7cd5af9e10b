//! Streaming runner: a producer thread feeds a bounded queue, the calling
//! thread classifies in arrival order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use hover_core::{DetectionState, DroneStatus, Sample, TakeoffDetector, TransitionEvent};
use serde::Serialize;

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// How often an idle consumer looks at the cancel flag.
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Non-blocking event publisher. A full or closed observer drops the event.
pub struct EventSink {
    tx: Option<Sender<TransitionEvent>>,
    dropped: u64,
}

impl EventSink {
    pub fn none() -> Self {
        Self {
            tx: None,
            dropped: 0,
        }
    }

    /// Sink plus the receiving end for an observer, holding at most
    /// `capacity` undelivered events.
    pub fn channel(capacity: usize) -> (Self, Receiver<TransitionEvent>) {
        let (tx, rx) = bounded(capacity.max(1));
        (
            Self {
                tx: Some(tx),
                dropped: 0,
            },
            rx,
        )
    }

    pub fn publish(&mut self, event: TransitionEvent) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                tracing::warn!(dropped = self.dropped, "observer full, event dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
                tracing::debug!(dropped = self.dropped, "observer gone, event dropped");
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    pub samples: u64,
    pub filtered: u64,
    pub events: Vec<TransitionEvent>,
    pub dropped_events: u64,
    pub final_state: DetectionState,
    pub final_status: DroneStatus,
    pub cancelled: bool,
}

/// Run `source` through `detector` until the source ends or `cancel` is set.
///
/// Sending blocks when the queue is full, so a slow classifier slows the
/// producer instead of losing samples. The flag is checked between samples and
/// while waiting on an empty queue; after a cancel the producer is left
/// detached, since it may be parked in a read that never returns.
pub fn run_stream<I>(
    source: I,
    detector: &mut TakeoffDetector,
    sink: &mut EventSink,
    cancel: Arc<AtomicBool>,
    queue_capacity: usize,
) -> StreamReport
where
    I: IntoIterator<Item = Sample>,
    I::IntoIter: Send + 'static,
{
    let (tx, rx) = bounded::<Sample>(queue_capacity.max(1));
    let samples = source.into_iter();
    let producer_cancel = Arc::clone(&cancel);

    let producer = thread::spawn(move || {
        let mut sent = 0u64;
        for s in samples {
            if producer_cancel.load(Ordering::Relaxed) {
                break;
            }
            // Consumer hung up
            if tx.send(s).is_err() {
                break;
            }
            sent += 1;
        }
        sent
    });

    let start_samples = detector.samples_seen();
    let start_filtered = detector.filtered_count();
    let mut events = Vec::new();

    let cancelled = loop {
        if cancel.load(Ordering::Relaxed) {
            break true;
        }
        match rx.recv_timeout(CANCEL_POLL) {
            Ok(s) => {
                if let Some(ev) = detector.process(&s) {
                    events.push(ev);
                    sink.publish(ev);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break false,
        }
    };
    drop(rx);

    if cancelled {
        tracing::info!("stream cancelled, producer detached");
        drop(producer);
    } else {
        match producer.join() {
            Ok(sent) => tracing::debug!(sent, "producer finished"),
            Err(_) => tracing::warn!("producer thread panicked"),
        }
    }

    let report = StreamReport {
        samples: detector.samples_seen() - start_samples,
        filtered: detector.filtered_count() - start_filtered,
        events,
        dropped_events: sink.dropped(),
        final_state: detector.state(),
        final_status: detector.status(),
        cancelled,
    };
    tracing::info!(
        samples = report.samples,
        events = report.events.len(),
        dropped = report.dropped_events,
        state = %report.final_state,
        "stream finished"
    );
    report
}
