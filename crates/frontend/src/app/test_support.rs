use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::rc::Rc;

use super::host::{
    Clock, ConsoleVm, HostBackend, HostError, HostEvent, IndexedSheet, JoystickId, JoystickState,
    ProgramId, RawPointer, ShaderStage, ShaderStageId, TextureSlot, TouchDevice, VmFrame,
};
use super::input::CanonicalInputSnapshot;
use super::keymap::KeyboardState;
use super::rendering::{BlitRect, Viewport, FRAMEBUFFER_BYTES};

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Clear,
    Upload(TextureSlot),
    Blit(TextureSlot, BlitRect, BlitRect),
    Activate(Option<ProgramId>),
    Uniform(ProgramId, String, f32),
    Present,
    Audio(Vec<i16>),
    SetFullscreen(bool),
}

/// Recording host backend with scriptable devices and shader failures.
#[derive(Debug)]
pub struct MockHost {
    pub viewport: Viewport,
    pub events: VecDeque<HostEvent>,
    pub keyboard: KeyboardState,
    pub pointer: RawPointer,
    pub touch_devices: Vec<TouchDevice>,
    pub joysticks: BTreeMap<usize, JoystickState>,
    pub closed_joysticks: Vec<JoystickId>,
    pub calls: Vec<HostCall>,
    pub fail_compile: Option<(ShaderStage, String)>,
    pub fail_link: Option<String>,
    pub fail_present: bool,
    pub compiled_stages: Vec<ShaderStage>,
    pub warnings: Vec<(String, String)>,
    pub fullscreen: bool,
    open_joysticks: BTreeMap<JoystickId, usize>,
    textures: HashMap<TextureSlot, (u32, u32, Vec<u8>)>,
    alphas: HashMap<TextureSlot, u8>,
    stages: BTreeSet<u32>,
    programs: BTreeSet<u32>,
    next_id: u32,
}

impl MockHost {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            events: VecDeque::new(),
            keyboard: KeyboardState::default(),
            pointer: RawPointer::default(),
            touch_devices: Vec::new(),
            joysticks: BTreeMap::new(),
            closed_joysticks: Vec::new(),
            calls: Vec::new(),
            fail_compile: None,
            fail_link: None,
            fail_present: false,
            compiled_stages: Vec::new(),
            warnings: Vec::new(),
            fullscreen: false,
            open_joysticks: BTreeMap::new(),
            textures: HashMap::new(),
            alphas: HashMap::new(),
            stages: BTreeSet::new(),
            programs: BTreeSet::new(),
            next_id: 1,
        }
    }

    pub fn blits_for(&self, slot: TextureSlot) -> Vec<(BlitRect, BlitRect)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                HostCall::Blit(blit_slot, src, dst) if *blit_slot == slot => Some((*src, *dst)),
                _ => None,
            })
            .collect()
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<&(u32, u32, Vec<u8>)> {
        self.textures.get(&slot)
    }

    pub fn texture_alpha(&self, slot: TextureSlot) -> Option<u8> {
        self.alphas.get(&slot).copied()
    }

    pub fn live_programs(&self) -> Vec<ProgramId> {
        self.programs.iter().copied().map(ProgramId).collect()
    }

    pub fn live_stages(&self) -> Vec<ShaderStageId> {
        self.stages.iter().copied().map(ShaderStageId).collect()
    }

    pub fn count_calls(&self, predicate: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl HostBackend for MockHost {
    fn poll_event(&mut self) -> Option<HostEvent> {
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
        if !self.joysticks.contains_key(&device_index) {
            return None;
        }
        let id = self.allocate_id();
        self.open_joysticks.insert(id, device_index);
        Some(id)
    }

    fn close_joystick(&mut self, joystick: JoystickId) {
        self.open_joysticks.remove(&joystick);
        self.closed_joysticks.push(joystick);
    }

    fn read_joystick(&mut self, joystick: JoystickId, state: &mut JoystickState) -> bool {
        let Some(source) = self
            .open_joysticks
            .get(&joystick)
            .and_then(|device_index| self.joysticks.get(device_index))
        else {
            return false;
        };
        state.axes.extend_from_slice(&source.axes);
        state.hats.extend_from_slice(&source.hats);
        state.buttons.extend_from_slice(&source.buttons);
        true
    }

    fn clear(&mut self) {
        self.calls.push(HostCall::Clear);
    }

    fn upload_texture(&mut self, slot: TextureSlot, width: u32, height: u32, rgba: &[u8]) {
        self.textures.insert(slot, (width, height, rgba.to_vec()));
        self.calls.push(HostCall::Upload(slot));
    }

    fn set_texture_alpha(&mut self, slot: TextureSlot, alpha: u8) {
        self.alphas.insert(slot, alpha);
    }

    fn blit(&mut self, slot: TextureSlot, src: BlitRect, dst: BlitRect) {
        self.calls.push(HostCall::Blit(slot, src, dst));
    }

    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        _source: &str,
    ) -> Result<ShaderStageId, String> {
        self.compiled_stages.push(stage);
        if let Some((failing_stage, diagnostic)) = &self.fail_compile {
            if *failing_stage == stage {
                return Err(diagnostic.clone());
            }
        }
        let id = self.allocate_id();
        self.stages.insert(id);
        Ok(ShaderStageId(id))
    }

    fn link_program(
        &mut self,
        vertex: ShaderStageId,
        fragment: ShaderStageId,
    ) -> Result<ProgramId, String> {
        self.stages.remove(&vertex.0);
        self.stages.remove(&fragment.0);
        if let Some(diagnostic) = &self.fail_link {
            return Err(diagnostic.clone());
        }
        let id = self.allocate_id();
        self.programs.insert(id);
        Ok(ProgramId(id))
    }

    fn release_shader(&mut self, stage: ShaderStageId) {
        self.stages.remove(&stage.0);
    }

    fn release_program(&mut self, program: ProgramId) {
        self.programs.remove(&program.0);
    }

    fn activate_program(&mut self, program: Option<ProgramId>) {
        self.calls.push(HostCall::Activate(program));
    }

    fn set_uniform(&mut self, program: ProgramId, name: &str, value: f32) {
        self.calls
            .push(HostCall::Uniform(program, name.to_string(), value));
    }

    fn present(&mut self) -> Result<(), HostError> {
        if self.fail_present {
            return Err(HostError::Present("surface lost".to_string()));
        }
        self.calls.push(HostCall::Present);
        Ok(())
    }

    fn queue_audio(&mut self, samples: &[i16]) {
        self.calls.push(HostCall::Audio(samples.to_vec()));
    }

    fn set_fullscreen(&mut self, fullscreen: bool) {
        self.fullscreen = fullscreen;
        self.calls.push(HostCall::SetFullscreen(fullscreen));
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn show_warning(&mut self, title: &str, message: &str) {
        self.warnings.push((title.to_string(), message.to_string()));
    }
}

/// Counter that only moves when a test (or a sleep) advances it. Clones
/// share the same counter.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
    sleeps: Rc<RefCell<Vec<u64>>>,
    frequency: u64,
}

impl ManualClock {
    pub fn new(frequency: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(0)),
            sleeps: Rc::new(RefCell::new(Vec::new())),
            frequency,
        }
    }

    pub fn advance(&self, ticks: u64) {
        self.now.set(self.now.get() + ticks);
    }

    pub fn sleeps(&self) -> Vec<u64> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for ManualClock {
    fn counter(&self) -> u64 {
        self.now.get()
    }

    fn frequency(&self) -> u64 {
        self.frequency
    }

    fn sleep(&mut self, ticks: u64) {
        self.sleeps.borrow_mut().push(ticks);
        self.advance(ticks);
    }
}

/// Scripted VM: fixed frame and audio, optional per-tick cost on a shared
/// clock, optional exit after a number of ticks.
#[derive(Debug)]
pub struct MockVm {
    pub framebuffer: Vec<u8>,
    pub samples: Vec<i16>,
    pub ticks: usize,
    pub inputs: Vec<CanonicalInputSnapshot>,
    pub focus_events: usize,
    pub exit_after: Option<usize>,
    pub clock: Option<ManualClock>,
    pub tick_costs: Vec<u64>,
    pub sheet_pixels: Vec<u8>,
    pub palette: [[u8; 3]; 16],
}

impl MockVm {
    pub fn new() -> Self {
        Self {
            framebuffer: vec![0; FRAMEBUFFER_BYTES],
            samples: vec![1000, -1000, 300, -300],
            ticks: 0,
            inputs: Vec::new(),
            focus_events: 0,
            exit_after: None,
            clock: None,
            tick_costs: Vec::new(),
            sheet_pixels: vec![0x11; 128 * 8 / 2],
            palette: [[255, 255, 255]; 16],
        }
    }

    /// Each tick advances `clock` by the next entry of `costs`, cycling.
    pub fn with_costs(clock: &ManualClock, costs: &[u64]) -> Self {
        Self {
            clock: Some(clock.clone()),
            tick_costs: costs.to_vec(),
            ..Self::new()
        }
    }
}

impl ConsoleVm for MockVm {
    fn tick(&mut self, input: &CanonicalInputSnapshot) -> VmFrame<'_> {
        if let (Some(clock), false) = (&self.clock, self.tick_costs.is_empty()) {
            clock.advance(self.tick_costs[self.ticks % self.tick_costs.len()]);
        }
        self.ticks += 1;
        self.inputs.push(*input);
        VmFrame {
            framebuffer: &self.framebuffer,
            samples: &self.samples,
        }
    }

    fn touch_overlay_sheet(&self) -> Option<IndexedSheet<'_>> {
        Some(IndexedSheet {
            width: 128,
            height: 8,
            pixels: &self.sheet_pixels,
            palette: &self.palette,
        })
    }

    fn exit_requested(&self) -> bool {
        self.exit_after.is_some_and(|limit| self.ticks >= limit)
    }

    fn focus_gained(&mut self) {
        self.focus_events += 1;
    }
}
