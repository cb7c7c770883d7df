//! Keyboard map for synthesized key events.
//!
//! A [`Key`] pairs the DOM key name with its Windows virtual key code,
//! which `Input.dispatchKeyEvent` expects alongside the physical `code`
//! value. Shifted punctuation has its own virtual key codes, and
//! modifier keys report their left-variant physical codes.

/// A named key with its Windows virtual key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    pub name: &'static str,
    pub code: i32,
}

impl Key {
    #[must_use]
    pub const fn new(name: &'static str, code: i32) -> Self {
        Self { name, code }
    }
}

pub const BACKSPACE: Key = Key::new("Backspace", 8);
pub const TAB: Key = Key::new("Tab", 9);
pub const ENTER: Key = Key::new("Enter", 13);
pub const SHIFT: Key = Key::new("Shift", 16);
pub const CONTROL: Key = Key::new("Control", 17);
pub const ALT: Key = Key::new("Alt", 18);
pub const PAUSE: Key = Key::new("Pause", 19);
pub const CAPS_LOCK: Key = Key::new("CapsLock", 20);
pub const ESCAPE: Key = Key::new("Escape", 27);
pub const SPACE: Key = Key::new(" ", 32);
pub const PAGE_UP: Key = Key::new("PageUp", 33);
pub const PAGE_DOWN: Key = Key::new("PageDown", 34);
pub const END: Key = Key::new("End", 35);
pub const HOME: Key = Key::new("Home", 36);
pub const ARROW_LEFT: Key = Key::new("ArrowLeft", 37);
pub const ARROW_UP: Key = Key::new("ArrowUp", 38);
pub const ARROW_RIGHT: Key = Key::new("ArrowRight", 39);
pub const ARROW_DOWN: Key = Key::new("ArrowDown", 40);
pub const INSERT: Key = Key::new("Insert", 45);
pub const DELETE: Key = Key::new("Delete", 46);
pub const META: Key = Key::new("Meta", 91);
pub const F1: Key = Key::new("F1", 112);
pub const F2: Key = Key::new("F2", 113);
pub const F3: Key = Key::new("F3", 114);
pub const F4: Key = Key::new("F4", 115);
pub const F5: Key = Key::new("F5", 116);
pub const F6: Key = Key::new("F6", 117);
pub const F7: Key = Key::new("F7", 118);
pub const F8: Key = Key::new("F8", 119);
pub const F9: Key = Key::new("F9", 120);
pub const F10: Key = Key::new("F10", 121);
pub const F11: Key = Key::new("F11", 122);
pub const F12: Key = Key::new("F12", 123);

/// Modifier bitmask values for `Input.dispatchKeyEvent`.
pub mod modifiers {
    pub const NONE: u8 = 0;
    pub const ALT: u8 = 1;
    pub const CONTROL: u8 = 2;
    pub const META: u8 = 4;
    pub const SHIFT: u8 = 8;
}

const MODIFIER_NAMES: [&str; 4] = ["Alt", "Control", "Meta", "Shift"];

/// Shift-translated character for US-layout punctuation and digits.
fn shift_translate(key: &str) -> Option<&'static str> {
    Some(match key {
        "1" => "!",
        "2" => "@",
        "3" => "#",
        "4" => "$",
        "5" => "%",
        "6" => "^",
        "7" => "&",
        "8" => "*",
        "9" => "(",
        "0" => ")",
        "-" => "_",
        "=" => "+",
        "[" => "{",
        "]" => "}",
        "\\" => "|",
        ";" => ":",
        "'" => "\"",
        "," => "<",
        "." => ">",
        "/" => "?",
        _ => return None,
    })
}

/// Physical code name for punctuation that shares a key with a shifted
/// sibling.
fn punctuation_code(key: &str) -> Option<&'static str> {
    Some(match key {
        "\\" | "|" => "Backslash",
        "[" => "BracketLeft",
        "]" => "BracketRight",
        ";" | ":" => "Semicolon",
        "/" | "?" => "Slash",
        "." => "Period",
        "," => "Comma",
        "-" => "Minus",
        "+" | "=" => "Equal",
        _ => return None,
    })
}

/// Virtual key code override for characters produced with shift held.
#[must_use]
pub fn shift_special_vk(text: &str) -> Option<i32> {
    Some(match text {
        "?" => 63,
        "|" => 124,
        "~" => 126,
        "+" => 43,
        "_" => 95,
        ":" => 58,
        "!" => 33,
        "*" => 42,
        "(" => 57,
        ")" => 41,
        "<" => 60,
        ">" => 62,
        "." => 190,
        _ => return None,
    })
}

/// Text payload for a key event: space and enter have fixed values,
/// shifted keys translate through the US layout, printable characters
/// pass through, everything else produces no text.
#[must_use]
pub fn key_text(key_name: &str, modifiers: u8, key_code: i32) -> String {
    if key_code == SPACE.code {
        return " ".into();
    }
    if key_code == ENTER.code {
        return "\r".into();
    }
    if modifiers & modifiers::SHIFT != 0 && key_name != "Shift" {
        return shift_translate(key_name)
            .map_or_else(|| key_name.to_uppercase(), ToOwned::to_owned);
    }
    let mut chars = key_name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_control() => key_name.to_owned(),
        _ => String::new(),
    }
}

/// Physical `code` value for a key name: letters map to `Key<X>`, digits
/// to `Digit<n>`, modifiers to their left variant, shared punctuation to
/// its code name, and named keys pass through.
#[must_use]
pub fn key_code_name(key_name: &str) -> String {
    let mut chars = key_name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_digit() {
            return format!("Digit{c}");
        }
        if c.is_ascii_alphabetic() {
            return format!("Key{}", c.to_ascii_uppercase());
        }
        if let Some(code) = punctuation_code(key_name) {
            return code.to_owned();
        }
        return key_name.to_owned();
    }
    if MODIFIER_NAMES.contains(&key_name) {
        return format!("{key_name}Left");
    }
    key_name.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_and_enter_have_fixed_text() {
        assert_eq!(key_text(" ", modifiers::NONE, SPACE.code), " ");
        assert_eq!(key_text("Enter", modifiers::NONE, ENTER.code), "\r");
    }

    #[test]
    fn shift_translates_digits_and_punctuation() {
        assert_eq!(key_text("1", modifiers::SHIFT, 49), "!");
        assert_eq!(key_text("/", modifiers::SHIFT, 191), "?");
        assert_eq!(key_text("a", modifiers::SHIFT, 65), "A");
    }

    #[test]
    fn shift_key_itself_produces_no_text() {
        assert_eq!(key_text("Shift", modifiers::SHIFT, SHIFT.code), "");
    }

    #[test]
    fn named_keys_produce_no_text() {
        assert_eq!(key_text("ArrowDown", modifiers::NONE, ARROW_DOWN.code), "");
    }

    #[test]
    fn printable_characters_pass_through() {
        assert_eq!(key_text("x", modifiers::NONE, 88), "x");
    }

    #[test]
    fn code_names_for_letters_and_digits() {
        assert_eq!(key_code_name("a"), "KeyA");
        assert_eq!(key_code_name("Z"), "KeyZ");
        assert_eq!(key_code_name("7"), "Digit7");
    }

    #[test]
    fn modifiers_use_left_variant_codes() {
        assert_eq!(key_code_name("Shift"), "ShiftLeft");
        assert_eq!(key_code_name("Control"), "ControlLeft");
        assert_eq!(key_code_name("Meta"), "MetaLeft");
        assert_eq!(key_code_name("Alt"), "AltLeft");
    }

    #[test]
    fn punctuation_maps_to_shared_code_names() {
        assert_eq!(key_code_name("/"), "Slash");
        assert_eq!(key_code_name(";"), "Semicolon");
        assert_eq!(key_code_name("="), "Equal");
    }

    #[test]
    fn named_keys_keep_their_code() {
        assert_eq!(key_code_name("Enter"), "Enter");
        assert_eq!(key_code_name("PageDown"), "PageDown");
    }

    #[test]
    fn shift_special_vk_overrides() {
        assert_eq!(shift_special_vk("?"), Some(63));
        assert_eq!(shift_special_vk("("), Some(57));
        assert_eq!(shift_special_vk("a"), None);
    }
}
