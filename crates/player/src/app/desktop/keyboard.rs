use frontend::app::scancode;
use winit::keyboard::KeyCode;

const LETTERS: [KeyCode; 26] = [
    KeyCode::KeyA,
    KeyCode::KeyB,
    KeyCode::KeyC,
    KeyCode::KeyD,
    KeyCode::KeyE,
    KeyCode::KeyF,
    KeyCode::KeyG,
    KeyCode::KeyH,
    KeyCode::KeyI,
    KeyCode::KeyJ,
    KeyCode::KeyK,
    KeyCode::KeyL,
    KeyCode::KeyM,
    KeyCode::KeyN,
    KeyCode::KeyO,
    KeyCode::KeyP,
    KeyCode::KeyQ,
    KeyCode::KeyR,
    KeyCode::KeyS,
    KeyCode::KeyT,
    KeyCode::KeyU,
    KeyCode::KeyV,
    KeyCode::KeyW,
    KeyCode::KeyX,
    KeyCode::KeyY,
    KeyCode::KeyZ,
];

const DIGITS: [KeyCode; 9] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
    KeyCode::Digit5,
    KeyCode::Digit6,
    KeyCode::Digit7,
    KeyCode::Digit8,
    KeyCode::Digit9,
];

const FUNCTION_KEYS: [KeyCode; 12] = [
    KeyCode::F1,
    KeyCode::F2,
    KeyCode::F3,
    KeyCode::F4,
    KeyCode::F5,
    KeyCode::F6,
    KeyCode::F7,
    KeyCode::F8,
    KeyCode::F9,
    KeyCode::F10,
    KeyCode::F11,
    KeyCode::F12,
];

/// USB HID usage ID for a physical winit key, for the keys the console knows.
pub(crate) fn hid_scancode(key: KeyCode) -> Option<u16> {
    let offset_in = |table: &[KeyCode], base: u16| {
        table
            .iter()
            .position(|candidate| *candidate == key)
            .map(|offset| base + offset as u16)
    };
    if let Some(code) = offset_in(&LETTERS, scancode::A)
        .or_else(|| offset_in(&DIGITS, scancode::DIGIT_1))
        .or_else(|| offset_in(&FUNCTION_KEYS, scancode::F1))
    {
        return Some(code);
    }

    let code = match key {
        KeyCode::Digit0 => scancode::DIGIT_0,
        KeyCode::Enter | KeyCode::NumpadEnter => scancode::RETURN,
        KeyCode::Escape => scancode::ESCAPE,
        KeyCode::Backspace => scancode::BACKSPACE,
        KeyCode::Tab => scancode::TAB,
        KeyCode::Space => scancode::SPACE,
        KeyCode::Minus => scancode::MINUS,
        KeyCode::Equal => scancode::EQUALS,
        KeyCode::BracketLeft => scancode::LEFT_BRACKET,
        KeyCode::BracketRight => scancode::RIGHT_BRACKET,
        KeyCode::Backslash => scancode::BACKSLASH,
        KeyCode::Semicolon => scancode::SEMICOLON,
        KeyCode::Quote => scancode::APOSTROPHE,
        KeyCode::Backquote => scancode::GRAVE,
        KeyCode::Comma => scancode::COMMA,
        KeyCode::Period => scancode::PERIOD,
        KeyCode::Slash => scancode::SLASH,
        KeyCode::CapsLock => scancode::CAPS_LOCK,
        KeyCode::Insert => scancode::INSERT,
        KeyCode::Home => scancode::HOME,
        KeyCode::PageUp => scancode::PAGE_UP,
        KeyCode::Delete => scancode::DELETE,
        KeyCode::End => scancode::END,
        KeyCode::PageDown => scancode::PAGE_DOWN,
        KeyCode::ArrowRight => scancode::RIGHT,
        KeyCode::ArrowLeft => scancode::LEFT,
        KeyCode::ArrowDown => scancode::DOWN,
        KeyCode::ArrowUp => scancode::UP,
        KeyCode::ControlLeft => scancode::LEFT_CTRL,
        KeyCode::ShiftLeft => scancode::LEFT_SHIFT,
        KeyCode::AltLeft => scancode::LEFT_ALT,
        KeyCode::ControlRight => scancode::RIGHT_CTRL,
        KeyCode::ShiftRight => scancode::RIGHT_SHIFT,
        KeyCode::AltRight => scancode::RIGHT_ALT,
        _ => return None,
    };
    Some(code)
}
