use tracing::{debug, info};

use super::host::{HostBackend, JoystickId, JoystickState};
use super::input::{
    CanonicalInputSnapshot, ConsoleKey, GamepadButton, GamepadMask, GamepadSet, PointerState,
    GAMEPAD_COUNT,
};
use super::keymap::keyboard_buffer;
use super::rendering::{pointer_to_logical, DisplayMode, GeometryRect};

/// Axis readings strictly beyond this magnitude count as a digital direction.
pub const AXIS_THRESHOLD: i16 = 16384;

const AXIS_HORIZONTAL: usize = 0;
const AXIS_VERTICAL: usize = 1;
const FIRST_MENU_BUTTON: usize = 5;

/// Hat bits as reported by joystick-class devices.
pub mod hat {
    pub const UP: u8 = 0x01;
    pub const RIGHT: u8 = 0x02;
    pub const DOWN: u8 = 0x04;
    pub const LEFT: u8 = 0x08;
}

pub fn hat_to_mask(bits: u8) -> GamepadMask {
    let mut mask = GamepadMask::EMPTY;
    mask.set(GamepadButton::Up, bits & hat::UP != 0);
    mask.set(GamepadButton::Down, bits & hat::DOWN != 0);
    mask.set(GamepadButton::Left, bits & hat::LEFT != 0);
    mask.set(GamepadButton::Right, bits & hat::RIGHT != 0);
    mask
}

pub fn axis_hat_bits(axes: &[i16]) -> u8 {
    let mut bits = 0;
    if let Some(&x) = axes.get(AXIS_HORIZONTAL) {
        if x > AXIS_THRESHOLD {
            bits |= hat::RIGHT;
        } else if x < -AXIS_THRESHOLD {
            bits |= hat::LEFT;
        }
    }
    if let Some(&y) = axes.get(AXIS_VERTICAL) {
        if y > AXIS_THRESHOLD {
            bits |= hat::DOWN;
        } else if y < -AXIS_THRESHOLD {
            bits |= hat::UP;
        }
    }
    bits
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerReading {
    pub mask: GamepadMask,
    pub menu_presses: usize,
}

/// Converts one joystick's raw state into gamepad bits plus the number of
/// pressed menu-class buttons.
pub fn read_controller(state: &JoystickState) -> ControllerReading {
    let mut hat_bits = axis_hat_bits(&state.axes);
    for bits in &state.hats {
        hat_bits |= bits;
    }
    let mut reading = ControllerReading {
        mask: hat_to_mask(hat_bits),
        menu_presses: 0,
    };

    let buttons = &state.buttons;
    if buttons.len() >= 2 {
        reading.mask.set(GamepadButton::A, buttons[0]);
        reading.mask.set(GamepadButton::B, buttons[1]);
        if buttons.len() >= 4 {
            reading.mask.set(GamepadButton::X, buttons[2]);
            reading.mask.set(GamepadButton::Y, buttons[3]);
        }
        reading.menu_presses = buttons
            .iter()
            .skip(FIRST_MENU_BUTTON)
            .filter(|pressed| **pressed)
            .count();
    }

    reading
}

#[derive(Debug, Default)]
pub struct InputFusionEngine {
    ports: [Option<JoystickId>; GAMEPAD_COUNT],
    joystick: JoystickState,
    scroll_x: i32,
    scroll_y: i32,
}

impl InputFusionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attached_ports(&self) -> usize {
        self.ports.iter().filter(|port| port.is_some()).count()
    }

    pub fn attach_joystick<H: HostBackend>(&mut self, host: &mut H, device_index: usize) {
        let Some(port) = self.ports.get_mut(device_index) else {
            debug!(device_index, "joystick_port_out_of_range");
            return;
        };
        if let Some(previous) = port.take() {
            host.close_joystick(previous);
        }
        *port = host.open_joystick(device_index);
        if port.is_some() {
            info!(device_index, "joystick_attached");
        }
    }

    pub fn detach_joystick<H: HostBackend>(&mut self, host: &mut H, device_index: usize) {
        if let Some(joystick) = self.ports.get_mut(device_index).and_then(Option::take) {
            host.close_joystick(joystick);
            info!(device_index, "joystick_detached");
        }
    }

    pub fn close_all<H: HostBackend>(&mut self, host: &mut H) {
        for joystick in self.ports.iter_mut().filter_map(Option::take) {
            host.close_joystick(joystick);
        }
    }

    pub fn add_scroll(&mut self, x: i32, y: i32) {
        self.scroll_x = self.scroll_x.saturating_add(x);
        self.scroll_y = self.scroll_y.saturating_add(y);
    }

    /// Builds this tick's snapshot. Scroll accumulated since the last call is
    /// consumed.
    pub fn fuse<H: HostBackend>(
        &mut self,
        host: &mut H,
        geometry: GeometryRect,
        mode: DisplayMode,
        touch_zones: GamepadMask,
    ) -> CanonicalInputSnapshot {
        let raw = host.pointer();
        let (x, y) = pointer_to_logical(raw.x, raw.y, geometry, mode);
        let pointer = PointerState {
            x,
            y,
            buttons: raw.buttons,
            scroll_x: std::mem::take(&mut self.scroll_x),
            scroll_y: std::mem::take(&mut self.scroll_y),
        };

        let mut keyboard = keyboard_buffer(host.keyboard());
        let mut gamepads = GamepadSet::default();
        gamepads.merge(0, touch_zones);

        let mut slot = 0;
        for joystick in self.ports.iter().flatten() {
            self.joystick.clear();
            if !host.read_joystick(*joystick, &mut self.joystick) {
                continue;
            }
            let reading = read_controller(&self.joystick);
            gamepads.merge(slot, reading.mask);
            for _ in 0..reading.menu_presses {
                keyboard.push(ConsoleKey::Escape);
            }
            slot += 1;
        }

        CanonicalInputSnapshot::new(pointer, keyboard, gamepads)
    }
}
