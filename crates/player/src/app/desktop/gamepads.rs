use std::collections::{BTreeMap, VecDeque};

use frontend::app::{hat, GAMEPAD_COUNT};
use frontend::{HostEvent, JoystickId, JoystickState};
use gilrs::{Axis, Button, EventType, Gamepad, GamepadId, Gilrs};
use tracing::{debug, info, warn};

/// Reported button order: face buttons first, then one shoulder, then the
/// menu-class buttons the console treats as Escape.
const BUTTON_ORDER: [Button; 8] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::Start,
    Button::Select,
    Button::Mode,
];

/// Fixed set of player ports; a device keeps its port until it disconnects.
#[derive(Debug)]
struct PortTable<T> {
    ports: [Option<T>; GAMEPAD_COUNT],
}

impl<T: Copy + PartialEq> PortTable<T> {
    fn new() -> Self {
        Self {
            ports: [None; GAMEPAD_COUNT],
        }
    }

    fn claim(&mut self, device: T) -> Option<usize> {
        if let Some(port) = self.find(device) {
            return Some(port);
        }
        let port = self.ports.iter().position(Option::is_none)?;
        self.ports[port] = Some(device);
        Some(port)
    }

    fn release(&mut self, device: T) -> Option<usize> {
        let port = self.find(device)?;
        self.ports[port] = None;
        Some(port)
    }

    fn get(&self, port: usize) -> Option<T> {
        self.ports.get(port).copied().flatten()
    }

    fn find(&self, device: T) -> Option<usize> {
        self.ports.iter().position(|slot| *slot == Some(device))
    }
}

/// gilrs-backed joystick source. Connection changes become host events with
/// the port index as the device index.
pub(crate) struct GamepadHub {
    gilrs: Option<Gilrs>,
    ports: PortTable<GamepadId>,
    open: BTreeMap<JoystickId, usize>,
    next_joystick: JoystickId,
}

impl GamepadHub {
    pub(crate) fn new(events: &mut VecDeque<HostEvent>) -> Self {
        let gilrs = match Gilrs::new() {
            Ok(gilrs) => Some(gilrs),
            Err(error) => {
                warn!(error = %error, "gamepad_init_failed");
                None
            }
        };
        let mut hub = Self {
            gilrs,
            ports: PortTable::new(),
            open: BTreeMap::new(),
            next_joystick: 1,
        };

        let connected: Vec<GamepadId> = hub
            .gilrs
            .iter()
            .flat_map(|gilrs| gilrs.gamepads().map(|(id, _)| id))
            .collect();
        for id in connected {
            hub.connect(id, events);
        }
        hub
    }

    /// Drains pending gilrs events. Gilrs also updates its cached button and
    /// axis state here, so this runs before joysticks are read.
    pub(crate) fn pump(&mut self, events: &mut VecDeque<HostEvent>) {
        let mut changes = Vec::new();
        if let Some(gilrs) = self.gilrs.as_mut() {
            while let Some(event) = gilrs.next_event() {
                match event.event {
                    EventType::Connected => changes.push((event.id, true)),
                    EventType::Disconnected => changes.push((event.id, false)),
                    _ => {}
                }
            }
        }

        for (id, connected) in changes {
            if connected {
                self.connect(id, events);
            } else if let Some(port) = self.ports.release(id) {
                debug!(port, "gamepad_disconnected");
                events.push_back(HostEvent::JoystickRemoved { device_index: port });
            }
        }
    }

    pub(crate) fn open(&mut self, port: usize) -> Option<JoystickId> {
        self.ports.get(port)?;
        let joystick = self.next_joystick;
        self.next_joystick = self.next_joystick.wrapping_add(1);
        self.open.insert(joystick, port);
        Some(joystick)
    }

    pub(crate) fn close(&mut self, joystick: JoystickId) {
        self.open.remove(&joystick);
    }

    pub(crate) fn read(&self, joystick: JoystickId, state: &mut JoystickState) -> bool {
        let gamepad = self
            .open
            .get(&joystick)
            .and_then(|port| self.ports.get(*port))
            .zip(self.gilrs.as_ref())
            .and_then(|(id, gilrs)| gilrs.connected_gamepad(id));
        match gamepad {
            Some(gamepad) => {
                read_gamepad(&gamepad, state);
                true
            }
            None => false,
        }
    }

    fn connect(&mut self, id: GamepadId, events: &mut VecDeque<HostEvent>) {
        let name = self
            .gilrs
            .as_ref()
            .and_then(|gilrs| gilrs.connected_gamepad(id))
            .map(|gamepad| gamepad.name().to_string())
            .unwrap_or_default();
        match self.ports.claim(id) {
            Some(port) => {
                info!(port, name = name.as_str(), "gamepad_connected");
                events.push_back(HostEvent::JoystickAdded { device_index: port });
            }
            None => warn!(name = name.as_str(), "gamepad_ports_full"),
        }
    }
}

fn read_gamepad(gamepad: &Gamepad<'_>, state: &mut JoystickState) {
    state.axes.push(axis_to_i16(gamepad.value(Axis::LeftStickX)));
    // gilrs reports stick-up as positive; joystick axes grow downward.
    state.axes.push(axis_to_i16(-gamepad.value(Axis::LeftStickY)));
    state
        .hats
        .push(dpad_bits(|button| gamepad.is_pressed(button)));
    state
        .buttons
        .extend(BUTTON_ORDER.iter().map(|button| gamepad.is_pressed(*button)));
}

fn axis_to_i16(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

fn dpad_bits(is_pressed: impl Fn(Button) -> bool) -> u8 {
    [
        (Button::DPadUp, hat::UP),
        (Button::DPadRight, hat::RIGHT),
        (Button::DPadDown, hat::DOWN),
        (Button::DPadLeft, hat::LEFT),
    ]
    .into_iter()
    .filter(|(button, _)| is_pressed(*button))
    .fold(0, |bits, (_, bit)| bits | bit)
}
