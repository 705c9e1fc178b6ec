use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{FrontendOptions, MAX_VOLUME};

use super::fusion::InputFusionEngine;
use super::host::{Clock, ConsoleVm, HostBackend, HostError, HostEvent};
use super::metrics::{MetricsAccumulator, MetricsHandle};
use super::perf_stats::{PerfStats, PhaseTimings};
use super::rendering::{
    DisplayCompositor, DisplayMode, PostProcessPipeline, Viewport, SHADER_WARNING_TITLE,
};
use super::touch::TouchOverlayRenderer;

pub const SLOW_FRAME_ENV_VAR: &str = "FRONTEND_SLOW_FRAME_MS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub target_tps: u32,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Fantasy Console".to_string(),
            window_width: 768,
            window_height: 432,
            target_tps: 60,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error(transparent)]
    Host(#[from] HostError),
}

/// What the caller should do before the next iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacingDecision {
    /// Clock ticks left until the deadline; zero after a missed frame.
    pub sleep_ticks: u64,
    pub missed_frame: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    Continue(PacingDecision),
    Quit,
}

/// Cooperative stop signal, checked at the top of every iteration.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::Relaxed);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::Relaxed)
    }
}

/// Fixed-cadence deadline tracking in clock ticks. A late tick moves the
/// deadline forward by its overshoot instead of scheduling extra ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePacer {
    interval: u64,
    deadline: Option<u64>,
}

impl FramePacer {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            deadline: None,
        }
    }

    pub fn interval_for(frequency: u64, target_tps: u32) -> u64 {
        (frequency / u64::from(target_tps.max(1))).max(1)
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    pub fn begin_tick(&mut self, now: u64) {
        let base = self.deadline.unwrap_or(now);
        self.deadline = Some(base.saturating_add(self.interval));
    }

    pub fn finish_tick(&mut self, now: u64) -> PacingDecision {
        let deadline = self.deadline.unwrap_or(now);
        if now > deadline {
            let overshoot = now - deadline;
            self.deadline = Some(deadline + overshoot);
            PacingDecision {
                sleep_ticks: 0,
                missed_frame: true,
            }
        } else {
            PacingDecision {
                sleep_ticks: deadline - now,
                missed_frame: false,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PendingControls {
    toggle_crt: bool,
    reload_shader: bool,
    toggle_fullscreen: bool,
}

/// Owns every piece of cross-tick state and drives one tick per iteration:
/// poll, fuse, VM tick, compose, audio, present, pace.
#[derive(Debug)]
pub struct FrameScheduler {
    config: LoopConfig,
    options: FrontendOptions,
    compositor: DisplayCompositor,
    fusion: InputFusionEngine,
    touch: TouchOverlayRenderer,
    postprocess: PostProcessPipeline,
    pacer: FramePacer,
    pending: PendingControls,
    stop: StopHandle,
    volume: u8,
    audio_block: Vec<i16>,
    metrics_handle: MetricsHandle,
    metrics_accumulator: MetricsAccumulator,
    perf: PerfStats,
    slow_frame_delay: Duration,
    last_tick_start: Option<u64>,
    initialized: bool,
    shut_down: bool,
}

impl FrameScheduler {
    pub fn new(config: LoopConfig, options: FrontendOptions) -> Self {
        Self::with_metrics(config, options, MetricsHandle::default())
    }

    pub fn with_metrics(
        config: LoopConfig,
        options: FrontendOptions,
        metrics_handle: MetricsHandle,
    ) -> Self {
        let viewport = Viewport::new(config.window_width, config.window_height);
        let metrics_log_interval =
            normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
        let slow_frame_delay = resolve_slow_frame_delay(config.simulated_slow_frame_ms);

        Self {
            compositor: DisplayCompositor::new(viewport, options.crt_monitor),
            fusion: InputFusionEngine::new(),
            touch: TouchOverlayRenderer::new(
                viewport,
                options.touch_overlay_alpha,
                config.target_tps,
            ),
            postprocess: PostProcessPipeline::new(),
            pacer: FramePacer::new(1),
            pending: PendingControls::default(),
            stop: StopHandle::default(),
            volume: options.volume.min(MAX_VOLUME),
            audio_block: Vec::new(),
            metrics_handle,
            metrics_accumulator: MetricsAccumulator::new(metrics_log_interval),
            perf: PerfStats::default(),
            slow_frame_delay,
            last_tick_start: None,
            initialized: false,
            shut_down: false,
            config,
            options,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn metrics(&self) -> MetricsHandle {
        self.metrics_handle.clone()
    }

    /// Rolling VM and render timings over the last 120 ticks.
    pub fn phase_timings(&self) -> PhaseTimings {
        self.perf.snapshot()
    }

    pub fn crt_requested(&self) -> bool {
        self.compositor.crt_requested()
    }

    pub fn postprocess_active(&self) -> bool {
        self.postprocess.is_active()
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Flips the CRT flag starting with the next tick.
    pub fn toggle_crt_mode(&mut self) {
        self.pending.toggle_crt = !self.pending.toggle_crt;
    }

    /// Recompiles the CRT program and rebuilds the overlay texture next tick.
    pub fn request_shader_reload(&mut self) {
        self.pending.reload_shader = true;
    }

    pub fn toggle_fullscreen(&mut self) {
        self.pending.toggle_fullscreen = !self.pending.toggle_fullscreen;
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(MAX_VOLUME);
        info!(volume = self.volume, "volume_changed");
    }

    /// Runs exactly one tick. The caller owns the pacing sleep: wait
    /// `sleep_ticks` on the same clock before calling again.
    pub fn run_iteration<H, V, C>(
        &mut self,
        host: &mut H,
        vm: &mut V,
        clock: &mut C,
    ) -> Result<IterationOutcome, FrontendError>
    where
        H: HostBackend,
        V: ConsoleVm,
        C: Clock,
    {
        if !self.initialized {
            self.initialize(host, vm, clock);
        }

        let host_quit = self.poll_events(host, vm);
        if let Some(reason) = self.quit_reason(host_quit, vm) {
            info!(reason, "shutdown_requested");
            return Ok(IterationOutcome::Quit);
        }

        self.apply_pending_controls(host, vm);

        let tick_start = clock.counter();
        self.pacer.begin_tick(tick_start);
        if self.slow_frame_delay > Duration::ZERO {
            // Debug perturbation only; counts against this tick's budget.
            clock.sleep(duration_to_ticks(self.slow_frame_delay, clock.frequency()));
        }

        let mode = self.compositor.mode(self.postprocess.is_active());
        let geometry = self.compositor.geometry(mode);
        let touch_zones = self.touch.scan(host);
        let snapshot = self.fusion.fuse(host, geometry, mode, touch_zones);

        let vm_start = clock.counter();
        let frame = vm.tick(&snapshot);
        let render_start = clock.counter();

        self.compositor
            .compose(host, frame.framebuffer, &self.postprocess, mode);
        self.touch
            .render(host, snapshot.gamepad(0), !touch_zones.is_empty());
        queue_scaled_audio(host, frame.samples, self.volume, &mut self.audio_block);
        host.present()?;

        let tick_end = clock.counter();
        self.perf.record_tick(
            clock.ticks_to_duration(render_start.saturating_sub(vm_start)),
            clock.ticks_to_duration(tick_end.saturating_sub(render_start)),
        );
        self.metrics_accumulator.record_tick();
        if let Some(previous) = self.last_tick_start.replace(tick_start) {
            self.metrics_accumulator
                .record_frame(clock.ticks_to_duration(tick_start.saturating_sub(previous)));
        }

        let decision = self.pacer.finish_tick(tick_end);
        if decision.missed_frame {
            self.metrics_accumulator.record_missed_frame();
            debug!(
                tick_ms = clock
                    .ticks_to_duration(tick_end.saturating_sub(tick_start))
                    .as_secs_f32()
                    * 1000.0,
                "missed_frame"
            );
        }

        if let Some(snapshot) = self.metrics_accumulator.maybe_snapshot(Instant::now()) {
            self.metrics_handle.publish(snapshot);
            let timings = self.perf.snapshot();
            info!(
                fps = snapshot.fps,
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                missed_frames = snapshot.missed_frames,
                vm_avg_ms = timings.vm.avg_ms,
                vm_max_ms = timings.vm.max_ms,
                render_avg_ms = timings.render.avg_ms,
                render_max_ms = timings.render.max_ms,
                crt = mode == DisplayMode::Crt,
                "loop_metrics"
            );
        }

        Ok(IterationOutcome::Continue(decision))
    }

    /// Blocking loop: iterates until a quit signal, sleeping on `clock`
    /// between ticks, then releases host resources.
    pub fn run_until_quit<H, V, C>(
        &mut self,
        host: &mut H,
        vm: &mut V,
        clock: &mut C,
    ) -> Result<(), FrontendError>
    where
        H: HostBackend,
        V: ConsoleVm,
        C: Clock,
    {
        let result = loop {
            match self.run_iteration(host, vm, clock) {
                Ok(IterationOutcome::Continue(decision)) => {
                    if decision.sleep_ticks > 0 {
                        clock.sleep(decision.sleep_ticks);
                    }
                }
                Ok(IterationOutcome::Quit) => break Ok(()),
                Err(error) => break Err(error),
            }
        };
        self.shutdown(host);
        result
    }

    /// Releases the shader program and every open joystick. Safe to call
    /// more than once.
    pub fn shutdown<H: HostBackend>(&mut self, host: &mut H) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.postprocess.release(host);
        self.fusion.close_all(host);
        info!("shutdown");
    }

    fn initialize<H, V, C>(&mut self, host: &mut H, vm: &V, clock: &C)
    where
        H: HostBackend,
        V: ConsoleVm,
        C: Clock,
    {
        self.initialized = true;
        let viewport = host.viewport();
        self.compositor.resize(viewport);
        self.touch.resize(viewport);
        self.touch.refresh_texture(host, vm.touch_overlay_sheet());
        self.reload_shader(host);
        if self.options.fullscreen && !host.is_fullscreen() {
            self.apply_fullscreen(host, true);
        }
        self.pacer = FramePacer::new(FramePacer::interval_for(
            clock.frequency(),
            self.config.target_tps,
        ));

        info!(
            target_tps = self.config.target_tps,
            interval_ticks = self.pacer.interval(),
            clock_frequency = clock.frequency(),
            metrics_log_interval_ms = self.config.metrics_log_interval.as_millis() as u64,
            slow_frame_delay_ms = self.slow_frame_delay.as_millis() as u64,
            crt_monitor = self.compositor.crt_requested(),
            postprocess_active = self.postprocess.is_active(),
            volume = self.volume,
            "loop_config"
        );
    }

    /// Drains host events. Returns true when the host asked to quit.
    fn poll_events<H: HostBackend, V: ConsoleVm>(&mut self, host: &mut H, vm: &mut V) -> bool {
        let mut quit = false;
        while let Some(event) = host.poll_event() {
            match event {
                HostEvent::Quit => quit = true,
                HostEvent::Resized(viewport) => {
                    self.compositor.resize(viewport);
                    self.touch.resize(viewport);
                }
                HostEvent::FocusGained => vm.focus_gained(),
                HostEvent::MouseWheel { x, y } => self.fusion.add_scroll(x, y),
                HostEvent::JoystickAdded { device_index } => {
                    self.fusion.attach_joystick(host, device_index);
                }
                HostEvent::JoystickRemoved { device_index } => {
                    self.fusion.detach_joystick(host, device_index);
                }
            }
        }
        quit
    }

    fn quit_reason<V: ConsoleVm>(&self, host_quit: bool, vm: &V) -> Option<&'static str> {
        if host_quit {
            Some("host_quit")
        } else if self.stop.is_stop_requested() {
            Some("stop_requested")
        } else if vm.exit_requested() {
            Some("vm_exit")
        } else {
            None
        }
    }

    fn apply_pending_controls<H: HostBackend, V: ConsoleVm>(&mut self, host: &mut H, vm: &V) {
        let pending = std::mem::take(&mut self.pending);

        if pending.toggle_crt {
            let enabled = !self.compositor.crt_requested();
            self.compositor.set_crt_requested(enabled);
            info!(
                enabled,
                postprocess_active = self.postprocess.is_active(),
                "crt_mode_toggled"
            );
        }
        if pending.reload_shader {
            self.touch.refresh_texture(host, vm.touch_overlay_sheet());
            self.reload_shader(host);
        }
        if pending.toggle_fullscreen {
            let fullscreen = !host.is_fullscreen();
            self.apply_fullscreen(host, fullscreen);
        }
    }

    fn reload_shader<H: HostBackend>(&mut self, host: &mut H) {
        match self.options.crt_fragment_source() {
            Ok(source) => {
                // Failures are reported to the user by the pipeline.
                let _ = self.postprocess.reload(host, &source);
            }
            Err(error) => {
                warn!(error = %error, "shader_source_unavailable");
                host.show_warning(SHADER_WARNING_TITLE, &error.to_string());
            }
        }
    }

    fn apply_fullscreen<H: HostBackend>(&mut self, host: &mut H, fullscreen: bool) {
        host.set_fullscreen(fullscreen);
        info!(fullscreen, "fullscreen_toggled");
    }
}

fn queue_scaled_audio<H: HostBackend>(
    host: &mut H,
    samples: &[i16],
    volume: u8,
    block: &mut Vec<i16>,
) {
    if volume >= MAX_VOLUME {
        host.queue_audio(samples);
        return;
    }

    block.clear();
    block.extend(
        samples
            .iter()
            .map(|sample| (i32::from(*sample) * i32::from(volume) / i32::from(MAX_VOLUME)) as i16),
    );
    host.queue_audio(block);
}

fn duration_to_ticks(duration: Duration, frequency: u64) -> u64 {
    (duration.as_nanos() * u128::from(frequency) / 1_000_000_000) as u64
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn resolve_slow_frame_delay(config_slow_frame_ms: u64) -> Duration {
    match env::var(SLOW_FRAME_ENV_VAR) {
        Ok(value) => match value.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(
                    env_var = SLOW_FRAME_ENV_VAR,
                    value = value.as_str(),
                    "invalid slow-frame env var value; falling back to config"
                );
                Duration::from_millis(config_slow_frame_ms)
            }
        },
        Err(env::VarError::NotPresent) => Duration::from_millis(config_slow_frame_ms),
        Err(err) => {
            warn!(
                env_var = SLOW_FRAME_ENV_VAR,
                error = %err,
                "unable to read slow-frame env var; falling back to config"
            );
            Duration::from_millis(config_slow_frame_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::app::host::{ShaderStage, TextureSlot, TouchDevice, TouchFinger};
    use crate::app::input::{GamepadButton, GamepadMask};
    use crate::app::rendering::{compute_geometry, full_frame_source, BlitRect};
    use crate::app::test_support::{HostCall, ManualClock, MockHost, MockVm};

    const FREQUENCY: u64 = 600;
    const INTERVAL: u64 = 10;

    fn scheduler() -> FrameScheduler {
        scheduler_with(FrontendOptions::default())
    }

    fn scheduler_with(options: FrontendOptions) -> FrameScheduler {
        let config = LoopConfig {
            simulated_slow_frame_ms: 0,
            ..LoopConfig::default()
        };
        FrameScheduler::new(config, options)
    }

    fn host() -> MockHost {
        MockHost::new(Viewport::new(768, 432))
    }

    fn step(
        scheduler: &mut FrameScheduler,
        host: &mut MockHost,
        vm: &mut MockVm,
        clock: &mut ManualClock,
    ) -> PacingDecision {
        match scheduler
            .run_iteration(host, vm, clock)
            .expect("iteration")
        {
            IterationOutcome::Continue(decision) => {
                clock.sleep(decision.sleep_ticks);
                decision
            }
            IterationOutcome::Quit => panic!("unexpected quit"),
        }
    }

    #[test]
    fn pacer_sleeps_until_deadline_when_on_time() {
        let mut pacer = FramePacer::new(INTERVAL);

        pacer.begin_tick(100);
        let decision = pacer.finish_tick(104);

        assert_eq!(
            decision,
            PacingDecision {
                sleep_ticks: 6,
                missed_frame: false
            }
        );
        assert_eq!(pacer.deadline(), Some(110));
    }

    #[test]
    fn pacer_shifts_deadline_by_overshoot() {
        let mut pacer = FramePacer::new(INTERVAL);

        pacer.begin_tick(0);
        let late = pacer.finish_tick(13);
        pacer.begin_tick(13);

        assert!(late.missed_frame);
        assert_eq!(late.sleep_ticks, 0);
        assert_eq!(pacer.deadline(), Some(23));
    }

    #[test]
    fn pacer_interval_never_reaches_zero() {
        assert_eq!(FramePacer::interval_for(600, 60), 10);
        assert_eq!(FramePacer::interval_for(30, 60), 1);
        assert_eq!(FramePacer::interval_for(600, 0), 600);
    }

    #[test]
    fn every_third_slow_tick_is_one_missed_frame_without_skips() {
        let mut clock = ManualClock::new(FREQUENCY);
        let overshoot = 3;
        let mut vm = MockVm::with_costs(&clock, &[4, 6, INTERVAL + overshoot]);
        let mut host = host();
        let mut scheduler = scheduler();
        let iterations = 30;

        let missed: Vec<bool> = (0..iterations)
            .map(|_| step(&mut scheduler, &mut host, &mut vm, &mut clock).missed_frame)
            .collect();

        assert_eq!(vm.ticks, iterations);
        for (index, was_missed) in missed.iter().enumerate() {
            assert_eq!(*was_missed, index % 3 == 2, "tick {index}");
        }
        let missed_count = missed.iter().filter(|flag| **flag).count() as u64;
        assert_eq!(missed_count, iterations as u64 / 3);
        assert_eq!(
            clock.counter(),
            iterations as u64 * INTERVAL + missed_count * overshoot
        );
    }

    #[test]
    fn on_time_ticks_land_one_interval_apart() {
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::with_costs(&clock, &[2, 7, 9]);
        let mut host = host();
        let mut scheduler = scheduler();

        for _ in 0..12 {
            step(&mut scheduler, &mut host, &mut vm, &mut clock);
        }

        assert_eq!(clock.counter(), 12 * INTERVAL);
        assert_eq!(scheduler.metrics().snapshot().missed_frames, 0);
        let timings = scheduler.phase_timings();
        assert!(timings.vm.max_ms > timings.render.max_ms);
    }

    #[test]
    fn tick_phases_run_in_order() {
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::new();
        vm.samples = vec![5, -5];
        let mut host = host();
        let mut scheduler = scheduler();
        scheduler.run_iteration(&mut host, &mut vm, &mut clock).expect("init");
        host.calls.clear();

        step(&mut scheduler, &mut host, &mut vm, &mut clock);

        let clear = host.calls.iter().position(|call| *call == HostCall::Clear);
        let upload = host
            .calls
            .iter()
            .position(|call| *call == HostCall::Upload(TextureSlot::Framebuffer));
        let audio = host
            .calls
            .iter()
            .position(|call| *call == HostCall::Audio(vec![5, -5]));
        let present = host.calls.iter().position(|call| *call == HostCall::Present);
        assert!(clear < upload, "{:?}", host.calls);
        assert!(upload < audio);
        assert!(audio < present);
        assert_eq!(present, Some(host.calls.len() - 1));
        assert_eq!(vm.ticks, 2);
    }

    #[test]
    fn host_quit_stops_before_the_vm_ticks() {
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::new();
        let mut host = host();
        host.events.push_back(HostEvent::Quit);
        let mut scheduler = scheduler();

        let outcome = scheduler
            .run_iteration(&mut host, &mut vm, &mut clock)
            .expect("iteration");

        assert_eq!(outcome, IterationOutcome::Quit);
        assert_eq!(vm.ticks, 0);
    }

    #[test]
    fn stop_handle_is_checked_at_the_next_iteration() {
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::new();
        let mut host = host();
        let mut scheduler = scheduler();
        let stop = scheduler.stop_handle();

        step(&mut scheduler, &mut host, &mut vm, &mut clock);
        stop.request_stop();
        let outcome = scheduler
            .run_iteration(&mut host, &mut vm, &mut clock)
            .expect("iteration");

        assert_eq!(outcome, IterationOutcome::Quit);
        assert_eq!(vm.ticks, 1);
    }

    #[test]
    fn run_until_quit_honours_vm_exit_and_releases_resources() {
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::with_costs(&clock, &[3]);
        vm.exit_after = Some(5);
        let mut host = host();
        host.joysticks.insert(0, Default::default());
        host.events
            .push_back(HostEvent::JoystickAdded { device_index: 0 });
        let mut scheduler = scheduler();

        scheduler
            .run_until_quit(&mut host, &mut vm, &mut clock)
            .expect("run");

        assert_eq!(vm.ticks, 5);
        assert_eq!(clock.sleeps(), vec![INTERVAL - 3; 5]);
        assert!(host.live_programs().is_empty());
        assert_eq!(host.closed_joysticks.len(), 1);
    }

    #[test]
    fn present_failure_propagates_and_still_shuts_down() {
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::new();
        let mut host = host();
        host.fail_present = true;
        let mut scheduler = scheduler();

        let result = scheduler.run_until_quit(&mut host, &mut vm, &mut clock);

        assert!(matches!(result, Err(FrontendError::Host(HostError::Present(_)))));
        assert!(host.live_programs().is_empty());
    }

    #[test]
    fn startup_loads_shader_but_crt_stays_off_by_default() {
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::new();
        let mut host = host();
        let mut scheduler = scheduler();

        step(&mut scheduler, &mut host, &mut vm, &mut clock);

        assert!(scheduler.postprocess_active());
        assert!(!scheduler.crt_requested());
        assert!(host.calls.contains(&HostCall::Activate(None)));
        assert_eq!(host.blits_for(TextureSlot::Framebuffer).len(), 4);
    }

    #[test]
    fn crt_toggle_applies_from_the_next_tick() {
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::new();
        let mut host = MockHost::new(Viewport::new(1024, 576));
        let mut scheduler = scheduler();
        step(&mut scheduler, &mut host, &mut vm, &mut clock);

        scheduler.toggle_crt_mode();
        assert!(!scheduler.crt_requested());
        host.calls.clear();
        step(&mut scheduler, &mut host, &mut vm, &mut clock);

        assert!(scheduler.crt_requested());
        assert_eq!(
            host.blits_for(TextureSlot::Framebuffer),
            vec![(
                full_frame_source(),
                compute_geometry(Viewport::new(1024, 576), DisplayMode::Crt)
            )]
        );
    }

    #[test]
    fn double_toggle_between_ticks_cancels_out() {
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::new();
        let mut host = host();
        let mut scheduler = scheduler();

        scheduler.toggle_crt_mode();
        scheduler.toggle_crt_mode();
        step(&mut scheduler, &mut host, &mut vm, &mut clock);

        assert!(!scheduler.crt_requested());
    }

    #[test]
    fn crt_without_working_shader_falls_back_to_plain_blits() {
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::new();
        let mut host = host();
        host.fail_compile = Some((ShaderStage::Fragment, "syntax error".to_string()));
        let mut scheduler = scheduler_with(FrontendOptions {
            crt_monitor: true,
            ..FrontendOptions::default()
        });

        step(&mut scheduler, &mut host, &mut vm, &mut clock);

        assert!(scheduler.crt_requested());
        assert!(!scheduler.postprocess_active());
        assert_eq!(host.warnings.len(), 1);
        let blits = host.blits_for(TextureSlot::Framebuffer);
        assert_eq!(blits.len(), 4);
        assert_eq!(blits[3].1, BlitRect::new(24, 12, 720, 408));
    }

    #[test]
    fn failed_reload_keeps_crt_output_and_warns_once() {
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::new();
        let mut host = host();
        let mut scheduler = scheduler_with(FrontendOptions {
            crt_monitor: true,
            ..FrontendOptions::default()
        });
        step(&mut scheduler, &mut host, &mut vm, &mut clock);
        let programs = host.live_programs();

        host.fail_link = Some("interface mismatch".to_string());
        scheduler.request_shader_reload();
        host.calls.clear();
        step(&mut scheduler, &mut host, &mut vm, &mut clock);

        assert_eq!(host.warnings.len(), 1);
        assert_eq!(host.live_programs(), programs);
        assert!(scheduler.postprocess_active());
        assert!(host.calls.contains(&HostCall::Activate(Some(programs[0]))));
    }

    #[test]
    fn reload_reads_shader_file_and_refreshes_overlay_texture() {
        let dir = tempfile::tempdir().expect("tempdir");
        let shader = dir.path().join("crt.wgsl");
        fs::write(&shader, "// first").expect("write shader");
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::new();
        let mut host = host();
        let mut scheduler = scheduler_with(FrontendOptions {
            crt_shader_path: Some(shader.clone()),
            ..FrontendOptions::default()
        });
        step(&mut scheduler, &mut host, &mut vm, &mut clock);
        let first = host.live_programs();

        fs::remove_file(&shader).expect("remove shader");
        scheduler.request_shader_reload();
        host.calls.clear();
        step(&mut scheduler, &mut host, &mut vm, &mut clock);

        assert_eq!(host.warnings.len(), 1);
        assert_eq!(host.live_programs(), first);
        assert!(host
            .calls
            .contains(&HostCall::Upload(TextureSlot::TouchOverlay)));
    }

    #[test]
    fn resize_event_recomputes_geometry_before_the_blit() {
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::new();
        let mut host = host();
        let mut scheduler = scheduler();
        step(&mut scheduler, &mut host, &mut vm, &mut clock);

        let resized = Viewport::new(1920, 1080);
        host.viewport = resized;
        host.events.push_back(HostEvent::Resized(resized));
        host.calls.clear();
        step(&mut scheduler, &mut host, &mut vm, &mut clock);

        let blits = host.blits_for(TextureSlot::Framebuffer);
        assert_eq!(blits[3].1, compute_geometry(resized, DisplayMode::Plain));
    }

    #[test]
    fn fullscreen_option_and_toggle_use_the_host() {
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::new();
        let mut host = host();
        let mut scheduler = scheduler_with(FrontendOptions {
            fullscreen: true,
            ..FrontendOptions::default()
        });

        step(&mut scheduler, &mut host, &mut vm, &mut clock);
        assert!(host.fullscreen);

        scheduler.toggle_fullscreen();
        step(&mut scheduler, &mut host, &mut vm, &mut clock);

        assert!(!host.fullscreen);
        assert_eq!(
            host.count_calls(|call| matches!(call, HostCall::SetFullscreen(_))),
            2
        );
    }

    #[test]
    fn volume_scales_queued_audio() {
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::new();
        vm.samples = vec![1500, -1500, 15];
        let mut host = host();
        let mut scheduler = scheduler_with(FrontendOptions {
            volume: 5,
            ..FrontendOptions::default()
        });

        step(&mut scheduler, &mut host, &mut vm, &mut clock);
        scheduler.set_volume(0);
        step(&mut scheduler, &mut host, &mut vm, &mut clock);
        scheduler.set_volume(200);
        step(&mut scheduler, &mut host, &mut vm, &mut clock);

        let blocks: Vec<_> = host
            .calls
            .iter()
            .filter_map(|call| match call {
                HostCall::Audio(samples) => Some(samples.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            blocks,
            vec![vec![500, -500, 5], vec![0, 0, 0], vec![1500, -1500, 15]]
        );
        assert_eq!(scheduler.volume(), MAX_VOLUME);
    }

    #[test]
    fn host_events_reach_fusion_and_vm() {
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::new();
        let mut host = host();
        host.joysticks.insert(
            2,
            crate::app::host::JoystickState {
                axes: vec![0, i16::MIN],
                hats: vec![],
                buttons: vec![true, false],
            },
        );
        host.events.extend([
            HostEvent::FocusGained,
            HostEvent::MouseWheel { x: 0, y: -2 },
            HostEvent::JoystickAdded { device_index: 2 },
        ]);
        let mut scheduler = scheduler();

        step(&mut scheduler, &mut host, &mut vm, &mut clock);
        host.events
            .push_back(HostEvent::JoystickRemoved { device_index: 2 });
        step(&mut scheduler, &mut host, &mut vm, &mut clock);

        assert_eq!(vm.focus_events, 1);
        let first = vm.inputs[0];
        assert_eq!(first.pointer().scroll_y, -2);
        assert_eq!(
            first.gamepad(0),
            GamepadMask::EMPTY
                .with(GamepadButton::Up)
                .with(GamepadButton::A)
        );
        assert!(vm.inputs[1].gamepad(0).is_empty());
        assert_eq!(vm.inputs[1].pointer().scroll_y, 0);
    }

    #[test]
    fn touch_reveals_overlay_and_feeds_player_one() {
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::new();
        let viewport = Viewport::new(750, 432);
        let mut host = MockHost::new(viewport);
        let mut scheduler = scheduler();
        step(&mut scheduler, &mut host, &mut vm, &mut clock);
        assert!(host.blits_for(TextureSlot::TouchOverlay).is_empty());

        // B zone of a 750x432 layout starts at (700, 191) with 50px tiles.
        host.touch_devices = vec![TouchDevice {
            fingers: vec![TouchFinger {
                x: 720.0 / 750.0,
                y: 210.0 / 432.0,
                pressure: 0.5,
            }],
        }];
        step(&mut scheduler, &mut host, &mut vm, &mut clock);

        assert_eq!(
            vm.inputs[1].gamepad(0),
            GamepadMask::EMPTY.with(GamepadButton::B)
        );
        assert_eq!(host.blits_for(TextureSlot::TouchOverlay).len(), 8);
        assert_eq!(
            host.texture_alpha(TextureSlot::TouchOverlay),
            Some(crate::config::DEFAULT_TOUCH_OVERLAY_ALPHA)
        );
    }

    #[test]
    fn metrics_are_published_after_the_log_interval() {
        let mut clock = ManualClock::new(FREQUENCY);
        let mut vm = MockVm::with_costs(&clock, &[INTERVAL + 1]);
        let mut host = host();
        let config = LoopConfig {
            metrics_log_interval: Duration::from_nanos(1),
            ..LoopConfig::default()
        };
        let mut scheduler = FrameScheduler::new(config, FrontendOptions::default());

        std::thread::sleep(Duration::from_millis(2));
        step(&mut scheduler, &mut host, &mut vm, &mut clock);
        std::thread::sleep(Duration::from_millis(2));
        step(&mut scheduler, &mut host, &mut vm, &mut clock);

        let snapshot = scheduler.metrics().snapshot();
        assert!(snapshot.tps > 0.0);
        assert_eq!(snapshot.missed_frames, 1);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut host = host();
        let mut scheduler = scheduler();

        scheduler.shutdown(&mut host);
        scheduler.shutdown(&mut host);

        assert!(host.closed_joysticks.is_empty());
    }

    #[test]
    fn slow_frame_ticks_follow_clock_frequency() {
        assert_eq!(duration_to_ticks(Duration::from_millis(5), 1_000), 5);
        assert_eq!(
            duration_to_ticks(Duration::from_millis(16), 1_000_000_000),
            16_000_000
        );
    }
}
