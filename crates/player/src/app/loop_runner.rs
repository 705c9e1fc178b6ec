use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use frontend::{Clock, FrameScheduler, IterationOutcome, SystemClock};
use thiserror::Error;
use tracing::{error, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use super::bootstrap::AppWiring;
use super::demo_cart::DemoCart;
use super::desktop::DesktopHost;

#[derive(Debug, Error)]
pub(crate) enum PlayerError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] pixels::Error),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

/// Host-level controls handled outside the console's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hotkey {
    ToggleCrt,
    ReloadShader,
    ToggleFullscreen,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    if let Err(err) = run_player(app) {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run_player(app: AppWiring) -> Result<(), PlayerError> {
    let AppWiring { config, options } = app;

    let event_loop = EventLoop::new().map_err(PlayerError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(PlayerError::CreateWindow)?,
    );
    let mut host = DesktopHost::new(Arc::clone(&window)).map_err(PlayerError::CreateRenderer)?;
    let mut scheduler = FrameScheduler::new(config, options);
    let mut cart = DemoCart::new();
    let mut clock = SystemClock::new();
    let mut next_wake = Instant::now();

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => {
                if let WindowEvent::KeyboardInput { event: key_event, .. } = &event {
                    match hotkey_for(key_event) {
                        Some(Hotkey::ToggleCrt) => scheduler.toggle_crt_mode(),
                        Some(Hotkey::ReloadShader) => scheduler.request_shader_reload(),
                        Some(Hotkey::ToggleFullscreen) => scheduler.toggle_fullscreen(),
                        None => {}
                    }
                }
                if let Err(error) = host.handle_window_event(&event) {
                    warn!(error = %error, "renderer_resize_failed");
                    window_target.exit();
                }
            }
            Event::AboutToWait => {
                if Instant::now() >= next_wake {
                    match scheduler.run_iteration(&mut host, &mut cart, &mut clock) {
                        Ok(IterationOutcome::Continue(decision)) => {
                            next_wake =
                                Instant::now() + clock.ticks_to_duration(decision.sleep_ticks);
                        }
                        Ok(IterationOutcome::Quit) => {
                            window_target.exit();
                            return;
                        }
                        Err(error) => {
                            error!(error = %error, "frame_failed");
                            window_target.exit();
                            return;
                        }
                    }
                }
                window_target.set_control_flow(ControlFlow::WaitUntil(next_wake));
            }
            Event::LoopExiting => scheduler.shutdown(&mut host),
            _ => {}
        })
        .map_err(PlayerError::EventLoopRun)
}

/// Fresh presses only; key repeat must not re-toggle.
fn hotkey_for(event: &KeyEvent) -> Option<Hotkey> {
    if event.state != ElementState::Pressed || event.repeat {
        return None;
    }
    hotkey_for_key(event.physical_key)
}

fn hotkey_for_key(key: PhysicalKey) -> Option<Hotkey> {
    match key {
        PhysicalKey::Code(KeyCode::F6) => Some(Hotkey::ToggleCrt),
        PhysicalKey::Code(KeyCode::F7) => Some(Hotkey::ReloadShader),
        PhysicalKey::Code(KeyCode::F11) => Some(Hotkey::ToggleFullscreen),
        _ => None,
    }
}
