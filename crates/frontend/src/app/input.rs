use std::ops::{BitOr, BitOrAssign};

pub const GAMEPAD_COUNT: usize = 4;
pub const KEY_BUFFER_CAPACITY: usize = 4;
pub const INPUT_REGION_SIZE: usize = GAMEPAD_COUNT + 4 + KEY_BUFFER_CAPACITY;

const SCROLL_MIN: i32 = -32;
const SCROLL_MAX: i32 = 31;
const SCROLL_BITS_MASK: u16 = 0x3f;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamepadButton {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    X,
    Y,
}

impl GamepadButton {
    pub const ALL: [GamepadButton; 8] = [
        GamepadButton::Up,
        GamepadButton::Down,
        GamepadButton::Left,
        GamepadButton::Right,
        GamepadButton::A,
        GamepadButton::B,
        GamepadButton::X,
        GamepadButton::Y,
    ];

    pub const fn index(self) -> usize {
        match self {
            GamepadButton::Up => 0,
            GamepadButton::Down => 1,
            GamepadButton::Left => 2,
            GamepadButton::Right => 3,
            GamepadButton::A => 4,
            GamepadButton::B => 5,
            GamepadButton::X => 6,
            GamepadButton::Y => 7,
        }
    }

    const fn bit(self) -> u8 {
        1 << self.index()
    }
}

/// Eight-bit button state for one player. Bit order matches the VM's
/// memory-mapped gamepad byte: up, down, left, right, A, B, X, Y.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GamepadMask(u8);

impl GamepadMask {
    pub const EMPTY: GamepadMask = GamepadMask(0);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn is_down(self, button: GamepadButton) -> bool {
        self.0 & button.bit() != 0
    }

    pub fn set(&mut self, button: GamepadButton, is_down: bool) {
        if is_down {
            self.0 |= button.bit();
        } else {
            self.0 &= !button.bit();
        }
    }

    pub const fn with(self, button: GamepadButton) -> Self {
        Self(self.0 | button.bit())
    }

    pub fn pressed(self) -> impl Iterator<Item = GamepadButton> {
        GamepadButton::ALL
            .into_iter()
            .filter(move |button| self.is_down(*button))
    }
}

impl BitOr for GamepadMask {
    type Output = GamepadMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        GamepadMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for GamepadMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GamepadSet {
    pads: [GamepadMask; GAMEPAD_COUNT],
}

impl GamepadSet {
    pub fn get(&self, slot: usize) -> GamepadMask {
        self.pads.get(slot).copied().unwrap_or_default()
    }

    pub fn merge(&mut self, slot: usize, mask: GamepadMask) {
        if let Some(pad) = self.pads.get_mut(slot) {
            *pad |= mask;
        }
    }

    pub fn first(&self) -> GamepadMask {
        self.pads[0]
    }

    /// Packs all four players into the little-endian word the VM reads,
    /// player one in the lowest byte.
    pub fn to_bits(&self) -> u32 {
        u32::from_le_bytes([
            self.pads[0].bits(),
            self.pads[1].bits(),
            self.pads[2].bits(),
            self.pads[3].bits(),
        ])
    }
}

/// Canonical console key codes. Zero is reserved for "no key".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConsoleKey {
    A = 1,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    Digit0,
    Digit1,
    Digit2,
    Digit3,
    Digit4,
    Digit5,
    Digit6,
    Digit7,
    Digit8,
    Digit9,
    Minus,
    Equals,
    LeftBracket,
    RightBracket,
    Backslash,
    Semicolon,
    Apostrophe,
    Grave,
    Comma,
    Period,
    Slash,
    Space,
    Tab,
    Return,
    Backspace,
    Delete,
    Insert,
    PageUp,
    PageDown,
    Home,
    End,
    Up,
    Down,
    Left,
    Right,
    CapsLock,
    Ctrl,
    Shift,
    Alt,
    Escape,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

impl ConsoleKey {
    pub const COUNT: usize = 78;

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        use ConsoleKey::*;
        const ALL: [ConsoleKey; ConsoleKey::COUNT] = [
            A, B, C, D, E, F, G, H, I, J, K, L, M, N, O, P, Q, R, S, T, U, V, W, X, Y, Z, Digit0,
            Digit1, Digit2, Digit3, Digit4, Digit5, Digit6, Digit7, Digit8, Digit9, Minus, Equals,
            LeftBracket, RightBracket, Backslash, Semicolon, Apostrophe, Grave, Comma, Period,
            Slash, Space, Tab, Return, Backspace, Delete, Insert, PageUp, PageDown, Home, End, Up,
            Down, Left, Right, CapsLock, Ctrl, Shift, Alt, Escape, F1, F2, F3, F4, F5, F6, F7, F8,
            F9, F10, F11, F12,
        ];
        let index = usize::from(code).checked_sub(1)?;
        ALL.get(index).copied()
    }
}

/// Ordered, fixed-capacity set of pressed keys. Pushing into a full buffer is
/// a silent no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyBuffer {
    codes: [u8; KEY_BUFFER_CAPACITY],
}

impl KeyBuffer {
    pub fn push(&mut self, key: ConsoleKey) -> bool {
        match self.codes.iter_mut().find(|slot| **slot == 0) {
            Some(slot) => {
                *slot = key.code();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.codes.iter().take_while(|code| **code != 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.codes[0] == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == KEY_BUFFER_CAPACITY
    }

    pub fn contains(&self, key: ConsoleKey) -> bool {
        self.codes.contains(&key.code())
    }

    pub fn keys(&self) -> impl Iterator<Item = ConsoleKey> + '_ {
        self.codes
            .iter()
            .take_while(|code| **code != 0)
            .filter_map(|code| ConsoleKey::from_code(*code))
    }

    pub fn as_bytes(&self) -> [u8; KEY_BUFFER_CAPACITY] {
        self.codes
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerButtons(u8);

impl PointerButtons {
    pub const LEFT: PointerButtons = PointerButtons(0b001);
    pub const MIDDLE: PointerButtons = PointerButtons(0b010);
    pub const RIGHT: PointerButtons = PointerButtons(0b100);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: PointerButtons) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn set(&mut self, button: PointerButtons, is_down: bool) {
        if is_down {
            self.0 |= button.0;
        } else {
            self.0 &= !button.0;
        }
    }
}

impl BitOr for PointerButtons {
    type Output = PointerButtons;

    fn bitor(self, rhs: Self) -> Self::Output {
        PointerButtons(self.0 | rhs.0)
    }
}

/// Pointer state in logical framebuffer coordinates. Positions outside the
/// content area are kept as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerState {
    pub x: i32,
    pub y: i32,
    pub buttons: PointerButtons,
    pub scroll_x: i32,
    pub scroll_y: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanonicalInputSnapshot {
    pointer: PointerState,
    keyboard: KeyBuffer,
    gamepads: GamepadSet,
}

impl CanonicalInputSnapshot {
    pub fn new(pointer: PointerState, keyboard: KeyBuffer, gamepads: GamepadSet) -> Self {
        Self {
            pointer,
            keyboard,
            gamepads,
        }
    }

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    pub fn keyboard(&self) -> &KeyBuffer {
        &self.keyboard
    }

    pub fn gamepads(&self) -> &GamepadSet {
        &self.gamepads
    }

    pub fn gamepad(&self, slot: usize) -> GamepadMask {
        self.gamepads.get(slot)
    }

    /// Serializes the snapshot into the VM's memory-mapped input region.
    pub fn encode_input_region(&self) -> [u8; INPUT_REGION_SIZE] {
        let mut region = [0u8; INPUT_REGION_SIZE];
        region[..4].copy_from_slice(&self.gamepads.to_bits().to_le_bytes());
        region[4] = self.pointer.x as u8;
        region[5] = self.pointer.y as u8;

        let scroll_x = u16::from(clamp_scroll(self.pointer.scroll_x)) & SCROLL_BITS_MASK;
        let scroll_y = u16::from(clamp_scroll(self.pointer.scroll_y)) & SCROLL_BITS_MASK;
        let packed = u16::from(self.pointer.buttons.bits() & 0b111) | scroll_x << 3 | scroll_y << 9;
        region[6..8].copy_from_slice(&packed.to_le_bytes());

        region[8..].copy_from_slice(&self.keyboard.as_bytes());
        region
    }
}

fn clamp_scroll(value: i32) -> u8 {
    value.clamp(SCROLL_MIN, SCROLL_MAX) as i8 as u8
}
