use std::collections::VecDeque;
use std::time::Duration;

pub(crate) const PERF_WINDOW_LEN: usize = 120;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RollingMsStats {
    pub last_ms: f32,
    pub avg_ms: f32,
    pub max_ms: f32,
}

/// Rolling timings of the two expensive phases of a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTimings {
    pub vm: RollingMsStats,
    pub render: RollingMsStats,
}

#[derive(Debug, Default)]
pub(crate) struct PerfStats {
    vm: RollingWindowMs,
    render: RollingWindowMs,
}

impl PerfStats {
    pub(crate) fn record_tick(&mut self, vm_duration: Duration, render_duration: Duration) {
        self.vm.push_ms(duration_to_ms(vm_duration));
        self.render.push_ms(duration_to_ms(render_duration));
    }

    pub(crate) fn snapshot(&self) -> PhaseTimings {
        PhaseTimings {
            vm: self.vm.snapshot(),
            render: self.render.snapshot(),
        }
    }
}

/// Last `PERF_WINDOW_LEN` samples of one phase, in milliseconds.
#[derive(Debug, Default)]
struct RollingWindowMs {
    samples_ms: VecDeque<f32>,
    sum_ms: f32,
}

impl RollingWindowMs {
    fn push_ms(&mut self, value_ms: f32) {
        if self.samples_ms.len() == PERF_WINDOW_LEN {
            if let Some(evicted) = self.samples_ms.pop_front() {
                self.sum_ms -= evicted;
            }
        }
        self.samples_ms.push_back(value_ms);
        self.sum_ms += value_ms;
    }

    fn snapshot(&self) -> RollingMsStats {
        let Some(last_ms) = self.samples_ms.back().copied() else {
            return RollingMsStats::default();
        };

        RollingMsStats {
            last_ms,
            avg_ms: self.sum_ms / self.samples_ms.len() as f32,
            max_ms: self.samples_ms.iter().copied().fold(f32::MIN, f32::max),
        }
    }
}

fn duration_to_ms(duration: Duration) -> f32 {
    duration.as_secs_f32() * 1000.0
}
