use super::input::{ConsoleKey, KeyBuffer};

/// Host scancodes are USB HID keyboard usage IDs.
pub const SCANCODE_COUNT: usize = 256;

pub mod scancode {
    pub const A: u16 = 4;
    pub const Z: u16 = 29;
    pub const DIGIT_1: u16 = 30;
    pub const DIGIT_9: u16 = 38;
    pub const DIGIT_0: u16 = 39;
    pub const RETURN: u16 = 40;
    pub const ESCAPE: u16 = 41;
    pub const BACKSPACE: u16 = 42;
    pub const TAB: u16 = 43;
    pub const SPACE: u16 = 44;
    pub const MINUS: u16 = 45;
    pub const EQUALS: u16 = 46;
    pub const LEFT_BRACKET: u16 = 47;
    pub const RIGHT_BRACKET: u16 = 48;
    pub const BACKSLASH: u16 = 49;
    pub const SEMICOLON: u16 = 51;
    pub const APOSTROPHE: u16 = 52;
    pub const GRAVE: u16 = 53;
    pub const COMMA: u16 = 54;
    pub const PERIOD: u16 = 55;
    pub const SLASH: u16 = 56;
    pub const CAPS_LOCK: u16 = 57;
    pub const F1: u16 = 58;
    pub const F12: u16 = 69;
    pub const INSERT: u16 = 73;
    pub const HOME: u16 = 74;
    pub const PAGE_UP: u16 = 75;
    pub const DELETE: u16 = 76;
    pub const END: u16 = 77;
    pub const PAGE_DOWN: u16 = 78;
    pub const RIGHT: u16 = 79;
    pub const LEFT: u16 = 80;
    pub const DOWN: u16 = 81;
    pub const UP: u16 = 82;
    pub const LEFT_CTRL: u16 = 224;
    pub const LEFT_SHIFT: u16 = 225;
    pub const LEFT_ALT: u16 = 226;
    pub const RIGHT_CTRL: u16 = 228;
    pub const RIGHT_SHIFT: u16 = 229;
    pub const RIGHT_ALT: u16 = 230;
}

pub fn console_key_for_scancode(code: u16) -> Option<ConsoleKey> {
    use scancode as sc;

    let key = match code {
        sc::A..=sc::Z => ConsoleKey::from_code((code - sc::A) as u8 + ConsoleKey::A.code())?,
        sc::DIGIT_1..=sc::DIGIT_9 => {
            ConsoleKey::from_code((code - sc::DIGIT_1) as u8 + ConsoleKey::Digit1.code())?
        }
        sc::DIGIT_0 => ConsoleKey::Digit0,
        sc::RETURN => ConsoleKey::Return,
        sc::ESCAPE => ConsoleKey::Escape,
        sc::BACKSPACE => ConsoleKey::Backspace,
        sc::TAB => ConsoleKey::Tab,
        sc::SPACE => ConsoleKey::Space,
        sc::MINUS => ConsoleKey::Minus,
        sc::EQUALS => ConsoleKey::Equals,
        sc::LEFT_BRACKET => ConsoleKey::LeftBracket,
        sc::RIGHT_BRACKET => ConsoleKey::RightBracket,
        sc::BACKSLASH => ConsoleKey::Backslash,
        sc::SEMICOLON => ConsoleKey::Semicolon,
        sc::APOSTROPHE => ConsoleKey::Apostrophe,
        sc::GRAVE => ConsoleKey::Grave,
        sc::COMMA => ConsoleKey::Comma,
        sc::PERIOD => ConsoleKey::Period,
        sc::SLASH => ConsoleKey::Slash,
        sc::CAPS_LOCK => ConsoleKey::CapsLock,
        sc::F1..=sc::F12 => ConsoleKey::from_code((code - sc::F1) as u8 + ConsoleKey::F1.code())?,
        sc::INSERT => ConsoleKey::Insert,
        sc::HOME => ConsoleKey::Home,
        sc::PAGE_UP => ConsoleKey::PageUp,
        sc::DELETE => ConsoleKey::Delete,
        sc::END => ConsoleKey::End,
        sc::PAGE_DOWN => ConsoleKey::PageDown,
        sc::RIGHT => ConsoleKey::Right,
        sc::LEFT => ConsoleKey::Left,
        sc::DOWN => ConsoleKey::Down,
        sc::UP => ConsoleKey::Up,
        sc::LEFT_CTRL | sc::RIGHT_CTRL => ConsoleKey::Ctrl,
        sc::LEFT_SHIFT | sc::RIGHT_SHIFT => ConsoleKey::Shift,
        sc::LEFT_ALT | sc::RIGHT_ALT => ConsoleKey::Alt,
        _ => return None,
    };
    Some(key)
}

/// Live pressed/released state per host scancode.
#[derive(Debug, Clone)]
pub struct KeyboardState {
    pressed: [bool; SCANCODE_COUNT],
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self {
            pressed: [false; SCANCODE_COUNT],
        }
    }
}

impl KeyboardState {
    pub fn set(&mut self, code: u16, is_pressed: bool) {
        if let Some(slot) = self.pressed.get_mut(usize::from(code)) {
            *slot = is_pressed;
        }
    }

    pub fn is_pressed(&self, code: u16) -> bool {
        self.pressed
            .get(usize::from(code))
            .copied()
            .unwrap_or(false)
    }

    pub fn release_all(&mut self) {
        self.pressed = [false; SCANCODE_COUNT];
    }

    pub fn pressed_scancodes(&self) -> impl Iterator<Item = u16> + '_ {
        self.pressed
            .iter()
            .enumerate()
            .filter(|(_, is_pressed)| **is_pressed)
            .map(|(code, _)| code as u16)
    }
}

/// Fills a key buffer from the pressed scancodes in ascending scancode order,
/// skipping codes with no console key and stopping at capacity.
pub fn keyboard_buffer(state: &KeyboardState) -> KeyBuffer {
    let mut buffer = KeyBuffer::default();
    for key in state
        .pressed_scancodes()
        .filter_map(console_key_for_scancode)
    {
        if !buffer.push(key) {
            break;
        }
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_digits_and_function_keys_map_in_order() {
        assert_eq!(console_key_for_scancode(scancode::A), Some(ConsoleKey::A));
        assert_eq!(console_key_for_scancode(scancode::Z), Some(ConsoleKey::Z));
        assert_eq!(
            console_key_for_scancode(scancode::DIGIT_1),
            Some(ConsoleKey::Digit1)
        );
        assert_eq!(
            console_key_for_scancode(scancode::DIGIT_9),
            Some(ConsoleKey::Digit9)
        );
        assert_eq!(
            console_key_for_scancode(scancode::DIGIT_0),
            Some(ConsoleKey::Digit0)
        );
        assert_eq!(console_key_for_scancode(scancode::F1), Some(ConsoleKey::F1));
        assert_eq!(console_key_for_scancode(scancode::F12), Some(ConsoleKey::F12));
    }

    #[test]
    fn modifier_variants_share_one_console_key() {
        assert_eq!(
            console_key_for_scancode(scancode::LEFT_SHIFT),
            console_key_for_scancode(scancode::RIGHT_SHIFT)
        );
        assert_eq!(
            console_key_for_scancode(scancode::RIGHT_CTRL),
            Some(ConsoleKey::Ctrl)
        );
    }

    #[test]
    fn unmapped_scancodes_are_ignored() {
        assert_eq!(console_key_for_scancode(0), None);
        assert_eq!(console_key_for_scancode(50), None);
        assert_eq!(console_key_for_scancode(100), None);
        assert_eq!(console_key_for_scancode(255), None);
    }

    #[test]
    fn buffer_keeps_first_keys_by_scancode_order() {
        let mut state = KeyboardState::default();
        state.set(scancode::LEFT_SHIFT, true);
        state.set(scancode::SPACE, true);
        state.set(100, true);
        state.set(scancode::Z, true);
        state.set(scancode::A, true);
        state.set(scancode::UP, true);

        let buffer = keyboard_buffer(&state);

        assert_eq!(
            buffer.keys().collect::<Vec<_>>(),
            vec![
                ConsoleKey::A,
                ConsoleKey::Z,
                ConsoleKey::Space,
                ConsoleKey::Up
            ]
        );
    }

    #[test]
    fn released_keys_leave_the_buffer_next_read() {
        let mut state = KeyboardState::default();
        state.set(scancode::A, true);
        assert!(keyboard_buffer(&state).contains(ConsoleKey::A));

        state.set(scancode::A, false);
        assert!(keyboard_buffer(&state).is_empty());
    }
}
