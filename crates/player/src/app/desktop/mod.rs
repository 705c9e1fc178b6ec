mod audio;
mod canvas;
mod crt_pass;
mod gamepads;
mod keyboard;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use frontend::{
    BlitRect, HostBackend, HostError, HostEvent, JoystickId, JoystickState, KeyboardState,
    PointerButtons, ProgramId, RawPointer, ShaderStage, ShaderStageId, TextureSlot, TouchDevice,
    TouchFinger, Viewport,
};
use pixels::{wgpu, Pixels, SurfaceTexture, TextureError};
use rfd::{MessageButtons, MessageDialog, MessageLevel};
use tracing::{debug, warn};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, Touch, TouchPhase, WindowEvent};
use winit::keyboard::PhysicalKey;
use winit::window::{Fullscreen, Window};

use self::audio::AudioSink;
use self::canvas::{CpuTexture, CLEAR_COLOR};
use self::crt_pass::{CrtPass, CrtProgram};
use self::gamepads::GamepadHub;

pub(crate) use self::audio::CONSOLE_SAMPLE_RATE;

/// Pixel deltas from touchpads are folded into wheel lines of this height.
const PIXELS_PER_SCROLL_LINE: f64 = 16.0;

/// Desktop host: winit input, a window-sized `pixels` buffer composited on
/// the CPU, CRT programs as wgpu pipelines applied at present time, gilrs
/// joysticks and a cpal audio queue.
pub(crate) struct DesktopHost {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
    events: VecDeque<HostEvent>,
    keyboard: KeyboardState,
    pointer: RawPointer,
    fingers: BTreeMap<u64, TouchFinger>,
    touch_devices: Vec<TouchDevice>,
    textures: HashMap<TextureSlot, CpuTexture>,
    crt: CrtPass,
    shader_modules: HashMap<u32, wgpu::ShaderModule>,
    programs: HashMap<u32, CrtProgram>,
    next_gpu_id: u32,
    active_program: Option<ProgramId>,
    present_program: Option<ProgramId>,
    gamepads: GamepadHub,
    audio: Option<AudioSink>,
}

impl DesktopHost {
    pub(crate) fn new(window: Arc<Window>) -> Result<Self, pixels::Error> {
        let size = window.inner_size();
        let viewport = Viewport::new(size.width.max(1), size.height.max(1));
        let pixels = Self::build_pixels(Arc::clone(&window), viewport)?;
        let crt = CrtPass::new(pixels.device(), pixels.render_texture_format());
        let mut events = VecDeque::new();
        let gamepads = GamepadHub::new(&mut events);

        Ok(Self {
            window,
            pixels,
            viewport,
            events,
            keyboard: KeyboardState::default(),
            pointer: RawPointer::default(),
            fingers: BTreeMap::new(),
            touch_devices: vec![TouchDevice::default()],
            textures: HashMap::new(),
            crt,
            shader_modules: HashMap::new(),
            programs: HashMap::new(),
            next_gpu_id: 1,
            active_program: None,
            present_program: None,
            gamepads,
            audio: AudioSink::open(),
        })
    }

    fn build_pixels(window: Arc<Window>, viewport: Viewport) -> Result<Pixels<'static>, pixels::Error> {
        let surface = SurfaceTexture::new(viewport.width, viewport.height, window);
        Pixels::new(viewport.width, viewport.height, surface)
    }

    /// Folds one window event into host state and the event queue.
    pub(crate) fn handle_window_event(&mut self, event: &WindowEvent) -> Result<(), TextureError> {
        match event {
            WindowEvent::CloseRequested => self.events.push_back(HostEvent::Quit),
            WindowEvent::Resized(size) => self.resize(size.width, size.height)?,
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = self.window.inner_size();
                self.resize(size.width, size.height)?;
            }
            WindowEvent::Focused(true) => self.events.push_back(HostEvent::FocusGained),
            WindowEvent::Focused(false) => {
                self.keyboard.release_all();
                self.pointer.buttons = PointerButtons::default();
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.pointer.x = position.x as i32;
                self.pointer.y = position.y as i32;
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if let Some(mapped) = pointer_button(*button) {
                    self.pointer
                        .buttons
                        .set(mapped, *state == ElementState::Pressed);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let (x, y) = wheel_lines(*delta);
                if x != 0 || y != 0 {
                    self.events.push_back(HostEvent::MouseWheel { x, y });
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    if let Some(scancode) = keyboard::hid_scancode(code) {
                        self.keyboard
                            .set(scancode, event.state == ElementState::Pressed);
                    }
                }
            }
            WindowEvent::Touch(touch) => self.handle_touch(touch),
            _ => {}
        }
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), TextureError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        let viewport = Viewport::new(width, height);
        if viewport == self.viewport {
            return Ok(());
        }
        self.pixels.resize_surface(width, height)?;
        self.pixels.resize_buffer(width, height)?;
        self.viewport = viewport;
        self.events.push_back(HostEvent::Resized(viewport));
        Ok(())
    }

    fn handle_touch(&mut self, touch: &Touch) {
        match touch.phase {
            TouchPhase::Started | TouchPhase::Moved => {
                let pressure = touch.force.map(|force| force.normalized() as f32);
                self.fingers.insert(
                    touch.id,
                    normalized_finger(touch.location.x, touch.location.y, self.viewport, pressure),
                );
            }
            TouchPhase::Ended | TouchPhase::Cancelled => {
                self.fingers.remove(&touch.id);
            }
        }
        self.touch_devices = vec![TouchDevice {
            fingers: self.fingers.values().copied().collect(),
        }];
    }

    fn allocate_gpu_id(&mut self) -> u32 {
        let id = self.next_gpu_id;
        self.next_gpu_id = self.next_gpu_id.wrapping_add(1);
        id
    }
}

impl HostBackend for DesktopHost {
    fn poll_event(&mut self) -> Option<HostEvent> {
        if self.events.is_empty() {
            self.gamepads.pump(&mut self.events);
        }
        self.events.pop_front()
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn keyboard(&self) -> &KeyboardState {
        &self.keyboard
    }

    fn pointer(&self) -> RawPointer {
        self.pointer
    }

    fn touch_devices(&self) -> &[TouchDevice] {
        &self.touch_devices
    }

    fn open_joystick(&mut self, device_index: usize) -> Option<JoystickId> {
        self.gamepads.open(device_index)
    }

    fn close_joystick(&mut self, joystick: JoystickId) {
        self.gamepads.close(joystick);
    }

    fn read_joystick(&mut self, joystick: JoystickId, state: &mut JoystickState) -> bool {
        self.gamepads.read(joystick, state)
    }

    fn clear(&mut self) {
        canvas::clear(self.pixels.frame_mut(), CLEAR_COLOR);
        self.present_program = None;
    }

    fn upload_texture(&mut self, slot: TextureSlot, width: u32, height: u32, rgba: &[u8]) {
        self.textures
            .entry(slot)
            .and_modify(|texture| texture.replace(width, height, rgba))
            .or_insert_with(|| CpuTexture::new(width, height, rgba));
    }

    fn set_texture_alpha(&mut self, slot: TextureSlot, alpha: u8) {
        if let Some(texture) = self.textures.get_mut(&slot) {
            texture.alpha = alpha;
        }
    }

    fn blit(&mut self, slot: TextureSlot, src: BlitRect, dst: BlitRect) {
        let Some(texture) = self.textures.get(&slot) else {
            return;
        };
        canvas::blit(
            self.pixels.frame_mut(),
            self.viewport.width,
            self.viewport.height,
            texture,
            src,
            dst,
        );
        if slot == TextureSlot::Framebuffer && self.active_program.is_some() {
            self.present_program = self.active_program;
        }
    }

    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<ShaderStageId, String> {
        let module = self.crt.compile(self.pixels.device(), stage, source)?;
        let id = self.allocate_gpu_id();
        self.shader_modules.insert(id, module);
        Ok(ShaderStageId(id))
    }

    fn link_program(
        &mut self,
        vertex: ShaderStageId,
        fragment: ShaderStageId,
    ) -> Result<ProgramId, String> {
        let vertex_module = self.shader_modules.remove(&vertex.0);
        let fragment_module = self.shader_modules.remove(&fragment.0);
        let (Some(vertex_module), Some(fragment_module)) = (vertex_module, fragment_module) else {
            return Err("unknown shader stage".to_string());
        };
        let program = self
            .crt
            .link(self.pixels.device(), &vertex_module, &fragment_module)?;
        let id = self.allocate_gpu_id();
        self.programs.insert(id, program);
        Ok(ProgramId(id))
    }

    fn release_shader(&mut self, stage: ShaderStageId) {
        self.shader_modules.remove(&stage.0);
    }

    fn release_program(&mut self, program: ProgramId) {
        self.programs.remove(&program.0);
        if self.active_program == Some(program) {
            self.active_program = None;
        }
    }

    fn activate_program(&mut self, program: Option<ProgramId>) {
        self.active_program = program.filter(|id| self.programs.contains_key(&id.0));
    }

    fn set_uniform(&mut self, program: ProgramId, name: &str, value: f32) {
        let known = self
            .programs
            .get_mut(&program.0)
            .map(|crt| crt.set_uniform(name, value));
        if known == Some(false) {
            debug!(name, "unknown_uniform");
        }
    }

    fn present(&mut self) -> Result<(), HostError> {
        let program = self
            .present_program
            .take()
            .and_then(|id| self.programs.get(&id.0));
        let result = match program {
            Some(program) => {
                let crt = &self.crt;
                self.pixels.render_with(|encoder, render_target, context| {
                    crt.draw(program, encoder, render_target, context);
                    Ok(())
                })
            }
            None => self.pixels.render(),
        };
        result.map_err(|error| HostError::Present(error.to_string()))
    }

    fn queue_audio(&mut self, samples: &[i16]) {
        if let Some(audio) = &self.audio {
            audio.queue(samples);
        }
    }

    fn set_fullscreen(&mut self, fullscreen: bool) {
        self.window
            .set_fullscreen(fullscreen.then_some(Fullscreen::Borderless(None)));
    }

    fn is_fullscreen(&self) -> bool {
        self.window.fullscreen().is_some()
    }

    fn show_warning(&mut self, title: &str, message: &str) {
        warn!(title, "warning_dialog");
        MessageDialog::new()
            .set_level(MessageLevel::Warning)
            .set_title(title)
            .set_description(message)
            .set_buttons(MessageButtons::Ok)
            .show();
    }
}

fn pointer_button(button: MouseButton) -> Option<PointerButtons> {
    match button {
        MouseButton::Left => Some(PointerButtons::LEFT),
        MouseButton::Middle => Some(PointerButtons::MIDDLE),
        MouseButton::Right => Some(PointerButtons::RIGHT),
        _ => None,
    }
}

fn wheel_lines(delta: MouseScrollDelta) -> (i32, i32) {
    match delta {
        MouseScrollDelta::LineDelta(x, y) => (x.round() as i32, y.round() as i32),
        MouseScrollDelta::PixelDelta(position) => (
            (position.x / PIXELS_PER_SCROLL_LINE).round() as i32,
            (position.y / PIXELS_PER_SCROLL_LINE).round() as i32,
        ),
    }
}

/// Window pixel position to normalized device coordinates. Devices without
/// pressure sensing report full pressure.
fn normalized_finger(x: f64, y: f64, viewport: Viewport, pressure: Option<f32>) -> TouchFinger {
    let width = f64::from(viewport.width.max(1));
    let height = f64::from(viewport.height.max(1));
    TouchFinger {
        x: (x / width).clamp(0.0, 1.0) as f32,
        y: (y / height).clamp(0.0, 1.0) as f32,
        pressure: pressure.unwrap_or(1.0),
    }
}
