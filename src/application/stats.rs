use crate::domain::SegmentId;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

const TIMING_WINDOW: usize = 10;
const LISTED_IDS: usize = 5;

#[derive(Debug, Default)]
struct Inner {
    download_times: VecDeque<Duration>,
    transform_times: VecDeque<Duration>,
    recent: VecDeque<SegmentId>,
    /// Newest first.
    ready_window: Vec<SegmentId>,
    discovered: u64,
    ready: u64,
    failed: u64,
}

fn push_bounded<T>(queue: &mut VecDeque<T>, value: T, cap: usize) {
    queue.push_back(value);
    while queue.len() > cap {
        queue.pop_front();
    }
}

fn average_secs(samples: &VecDeque<Duration>) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let total: f64 = samples.iter().map(Duration::as_secs_f64).sum();
    let avg = total / samples.len() as f64;
    (avg * 100.0).round() / 100.0
}

/// Rolling processor counters for the status endpoint.
#[derive(Debug, Default)]
pub struct ProcessingStats {
    inner: Mutex<Inner>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusReport {
    pub running: bool,
    pub recent_segments: Vec<SegmentId>,
    pub ready_segments: Vec<SegmentId>,
    pub total_discovered: u64,
    pub total_ready: u64,
    pub total_failed: u64,
    pub in_flight: usize,
    pub avg_download_time: f64,
    pub avg_processing_time: f64,
    pub avg_total_time: f64,
    pub effect_version: u64,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn record_discovered(&self, id: SegmentId) {
        self.with(|s| {
            s.discovered += 1;
            push_bounded(&mut s.recent, id, LISTED_IDS);
        });
    }

    pub fn record_download(&self, elapsed: Duration) {
        self.with(|s| push_bounded(&mut s.download_times, elapsed, TIMING_WINDOW));
    }

    pub fn record_transform(&self, elapsed: Duration) {
        self.with(|s| push_bounded(&mut s.transform_times, elapsed, TIMING_WINDOW));
    }

    pub fn record_ready(&self) {
        self.with(|s| s.ready += 1);
    }

    pub fn record_failed(&self) {
        self.with(|s| s.failed += 1);
    }

    /// `window` is the ascending ready window after the latest cache change.
    pub fn record_window(&self, window: &[SegmentId]) {
        self.with(|s| s.ready_window = window.iter().rev().take(LISTED_IDS).copied().collect());
    }

    pub fn report(&self, in_flight: usize, effect_version: u64) -> StatusReport {
        self.with(|s| {
            let avg_download_time = average_secs(&s.download_times);
            let avg_processing_time = average_secs(&s.transform_times);
            StatusReport {
                running: true,
                recent_segments: s.recent.iter().rev().copied().collect(),
                ready_segments: s.ready_window.clone(),
                total_discovered: s.discovered,
                total_ready: s.ready,
                total_failed: s.failed,
                in_flight,
                avg_download_time,
                avg_processing_time,
                avg_total_time: ((avg_download_time + avg_processing_time) * 100.0).round() / 100.0,
                effect_version,
            }
        })
    }
}
