use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    pub missed_frames: u32,
}

/// Latest published loop metrics, readable from any thread. A poisoned lock
/// is recovered and reported once per handle family.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Arc<RwLock<LoopMetricsSnapshot>>,
    poison_reported: Arc<AtomicBool>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        let guard = self.latest.read().unwrap_or_else(|poisoned| {
            self.report_poison("read");
            poisoned.into_inner()
        });
        *guard
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        let mut guard = self.latest.write().unwrap_or_else(|poisoned| {
            self.report_poison("write");
            poisoned.into_inner()
        });
        *guard = snapshot;
    }

    fn report_poison(&self, operation: &'static str) {
        if !self.poison_reported.swap(true, Ordering::Relaxed) {
            warn!(operation, "metrics_lock_poisoned");
        }
    }
}

#[derive(Debug, Default)]
struct WindowCounters {
    frames: u32,
    ticks: u32,
    missed_frames: u32,
    frame_time_total: Duration,
}

impl WindowCounters {
    fn summarize(&self, elapsed: Duration) -> LoopMetricsSnapshot {
        let seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = match self.frames {
            0 => 0.0,
            frames => self.frame_time_total.as_secs_f32() * 1000.0 / frames as f32,
        };
        LoopMetricsSnapshot {
            fps: self.frames as f32 / seconds,
            tps: self.ticks as f32 / seconds,
            frame_time_ms,
            missed_frames: self.missed_frames,
        }
    }
}

/// Counts loop activity over fixed wall-clock windows.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    window: Duration,
    window_start: Instant,
    counters: WindowCounters,
}

impl MetricsAccumulator {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            window_start: Instant::now(),
            counters: WindowCounters::default(),
        }
    }

    pub(crate) fn record_frame(&mut self, frame_time: Duration) {
        self.counters.frames = self.counters.frames.saturating_add(1);
        self.counters.frame_time_total = self.counters.frame_time_total.saturating_add(frame_time);
    }

    pub(crate) fn record_tick(&mut self) {
        self.counters.ticks = self.counters.ticks.saturating_add(1);
    }

    pub(crate) fn record_missed_frame(&mut self) {
        self.counters.missed_frames = self.counters.missed_frames.saturating_add(1);
    }

    /// Closes the current window once it has lasted `window`, returning its
    /// summary and starting a fresh one at `now`.
    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }
        let counters = std::mem::take(&mut self.counters);
        self.window_start = now;
        Some(counters.summarize(elapsed))
    }
}
