use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use flume::Sender;

use crate::batch::BatchEvent;
use crate::config::THROUGHPUT_WINDOW_MS;
use crate::types::Progress;

/// Point-in-time view of batch progress. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub done_bytes: u64,
    pub total_bytes: u64,
    pub elapsed: Duration,
    /// Moving-average throughput in bytes per second.
    pub rate: f64,
    pub eta: Option<Duration>,
}

/// Aggregate byte counter with a moving-average rate over a short window.
pub struct Throughput {
    total: u64,
    done: AtomicU64,
    started: Instant,
    window: Duration,
    samples: Mutex<VecDeque<(Instant, u64)>>,
}

impl Throughput {
    pub fn new(total: u64) -> Self {
        Self::with_window(total, Duration::from_millis(THROUGHPUT_WINDOW_MS))
    }

    pub fn with_window(total: u64, window: Duration) -> Self {
        let started = Instant::now();
        Self { total, done: AtomicU64::new(0), started, window, samples: Mutex::new(VecDeque::from([(started, 0)])) }
    }

    #[inline]
    pub fn add(&self, bytes: u64) {
        self.done.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_at(Instant::now())
    }

    fn snapshot_at(&self, now: Instant) -> Snapshot {
        let done = self.done();

        let rate = {
            let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
            samples.push_back((now, done));

            while samples.len() > 2 && samples.get(1).is_some_and(|(at, _)| now.saturating_duration_since(*at) >= self.window) {
                samples.pop_front();
            }

            match samples.front() {
                Some(&(at, then)) => {
                    let span = now.saturating_duration_since(at).as_secs_f64();
                    if span > 0.0 { done.saturating_sub(then) as f64 / span } else { 0.0 }
                }
                None => 0.0,
            }
        };

        let remaining = self.total.saturating_sub(done);
        let eta = if remaining == 0 {
            Some(Duration::ZERO)
        } else if rate > 0.0 {
            Some(Duration::from_secs_f64(remaining as f64 / rate))
        } else {
            None
        };

        Snapshot { done_bytes: done, total_bytes: self.total, elapsed: now.saturating_duration_since(self.started), rate, eta }
    }
}

/// Progress sink for one batch item.
///
/// Forwards bytes to the shared [`Throughput`] and remembers how much this
/// item reported so the remainder can be credited when it ends early.
pub struct ItemProgress {
    tracker: Arc<Throughput>,
    events: Option<Sender<BatchEvent>>,
    reported: AtomicU64,
}

impl ItemProgress {
    pub fn new(tracker: Arc<Throughput>, events: Option<Sender<BatchEvent>>) -> Self {
        Self { tracker, events, reported: AtomicU64::new(0) }
    }

    /// Credits whatever part of `expected` this item has not reported yet.
    pub fn top_up(&self, expected: u64) {
        let reported = self.reported.load(Ordering::Relaxed);
        if expected > reported {
            self.advance(expected - reported);
        }
    }
}

impl Progress for ItemProgress {
    fn advance(&self, bytes: u64) {
        self.reported.fetch_add(bytes, Ordering::Relaxed);
        self.tracker.add(bytes);

        if let Some(events) = &self.events {
            let _ = events.send(BatchEvent::Progress(self.tracker.snapshot()));
        }
    }
}
