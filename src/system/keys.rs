//! Native key code to [`Key`] translation.
//!
//! A [`KeyTable`] lists exact codes plus ranges of contiguous codes for
//! letters, digits and function keys. [`KeyTranslator`] sorts it once and
//! answers lookups by binary search.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Key {
    #[default]
    NoKey,

    Control,
    Shift,
    Left,
    Right,
    Up,
    Down,
    Escape,
    Back,
    Tab,
    Delete,
    Insert,
    Home,
    End,
    Pause,
    Return,
    Space,

    Key0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,

    A,
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
    F13,
    F14,
    F15,
    F16,
    F17,
    F18,
    F19,
    F20,
    F21,
    F22,
    F23,
    F24,
}

pub static DIGITS: [Key; 10] = [
    Key::Key0,
    Key::Key1,
    Key::Key2,
    Key::Key3,
    Key::Key4,
    Key::Key5,
    Key::Key6,
    Key::Key7,
    Key::Key8,
    Key::Key9,
];

pub static LETTERS: [Key; 26] = [
    Key::A,
    Key::B,
    Key::C,
    Key::D,
    Key::E,
    Key::F,
    Key::G,
    Key::H,
    Key::I,
    Key::J,
    Key::K,
    Key::L,
    Key::M,
    Key::N,
    Key::O,
    Key::P,
    Key::Q,
    Key::R,
    Key::S,
    Key::T,
    Key::U,
    Key::V,
    Key::W,
    Key::X,
    Key::Y,
    Key::Z,
];

pub static FUNCTION_KEYS: [Key; 24] = [
    Key::F1,
    Key::F2,
    Key::F3,
    Key::F4,
    Key::F5,
    Key::F6,
    Key::F7,
    Key::F8,
    Key::F9,
    Key::F10,
    Key::F11,
    Key::F12,
    Key::F13,
    Key::F14,
    Key::F15,
    Key::F16,
    Key::F17,
    Key::F18,
    Key::F19,
    Key::F20,
    Key::F21,
    Key::F22,
    Key::F23,
    Key::F24,
];

#[derive(Debug, Clone, Copy)]
enum Mapping {
    Exact(Key),
    /// `keys[code - first]`.
    Range(&'static [Key]),
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    first: u32,
    last: u32,
    mapping: Mapping,
}

impl Entry {
    fn lookup(&self, code: u32) -> Option<Key> {
        if code < self.first || code > self.last {
            return None;
        }
        match self.mapping {
            Mapping::Exact(key) => Some(key),
            Mapping::Range(keys) => keys.get((code - self.first) as usize).copied(),
        }
    }
}

/// Unsorted description of a platform's key codes.
#[derive(Debug, Clone, Default)]
pub struct KeyTable {
    entries: Vec<Entry>,
}

impl KeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, code: u32, key: Key) -> Self {
        self.entries.push(Entry {
            first: code,
            last: code,
            mapping: Mapping::Exact(key),
        });
        self
    }

    /// Map `keys.len()` contiguous codes starting at `first`.
    pub fn range(mut self, first: u32, keys: &'static [Key]) -> Self {
        assert!(!keys.is_empty(), "key range must not be empty");
        let last = u32::try_from(keys.len() - 1)
            .ok()
            .and_then(|span| first.checked_add(span));
        let Some(last) = last else {
            panic!("key range starting at {:#x} runs past u32::MAX", first);
        };
        self.entries.push(Entry {
            first,
            last,
            mapping: Mapping::Range(keys),
        });
        self
    }

    /// Win32 virtual-key codes.
    pub fn win32() -> Self {
        Self::new()
            .key(0xA2, Key::Control) // VK_LCONTROL
            .key(0xA3, Key::Control) // VK_RCONTROL
            .key(0x11, Key::Control) // VK_CONTROL
            .key(0x25, Key::Left)
            .key(0x27, Key::Right)
            .key(0x26, Key::Up)
            .key(0x28, Key::Down)
            .key(0x1B, Key::Escape)
            .key(0x08, Key::Back)
            .key(0x09, Key::Tab)
            .key(0x10, Key::Shift)
            .key(0x2E, Key::Delete)
            .key(0x2D, Key::Insert)
            .key(0x24, Key::Home)
            .key(0x23, Key::End)
            .key(0x13, Key::Pause)
            .key(0x0D, Key::Return)
            .key(0x20, Key::Space)
            .range(0x30, &DIGITS)
            .range(0x41, &LETTERS)
            .range(0x70, &FUNCTION_KEYS) // VK_F1
    }

    /// `winit` virtual key codes. `Key0` follows `Key9` there, so it is an
    /// exact entry.
    #[cfg(feature = "fresco-winit")]
    pub fn winit() -> Self {
        use winit::event::VirtualKeyCode as Vk;
        Self::new()
            .key(Vk::LControl as u32, Key::Control)
            .key(Vk::RControl as u32, Key::Control)
            .key(Vk::LShift as u32, Key::Shift)
            .key(Vk::RShift as u32, Key::Shift)
            .key(Vk::Left as u32, Key::Left)
            .key(Vk::Right as u32, Key::Right)
            .key(Vk::Up as u32, Key::Up)
            .key(Vk::Down as u32, Key::Down)
            .key(Vk::Escape as u32, Key::Escape)
            .key(Vk::Back as u32, Key::Back)
            .key(Vk::Tab as u32, Key::Tab)
            .key(Vk::Delete as u32, Key::Delete)
            .key(Vk::Insert as u32, Key::Insert)
            .key(Vk::Home as u32, Key::Home)
            .key(Vk::End as u32, Key::End)
            .key(Vk::Pause as u32, Key::Pause)
            .key(Vk::Return as u32, Key::Return)
            .key(Vk::Space as u32, Key::Space)
            .key(Vk::Key0 as u32, Key::Key0)
            .range(Vk::Key1 as u32, &DIGITS[1..])
            .range(Vk::A as u32, &LETTERS)
            .range(Vk::F1 as u32, &FUNCTION_KEYS)
    }
}

#[derive(Debug, Clone)]
pub struct KeyTranslator {
    entries: Vec<Entry>,
}

impl KeyTranslator {
    /// Sorts the table. Panics when two entries claim the same code.
    pub fn new(table: KeyTable) -> Self {
        let mut entries = table.entries;
        entries.sort_by_key(|e| e.first);
        for pair in entries.windows(2) {
            assert!(
                pair[0].last < pair[1].first,
                "key codes {:#x}..={:#x} and {:#x}..={:#x} overlap",
                pair[0].first,
                pair[0].last,
                pair[1].first,
                pair[1].last
            );
        }
        Self { entries }
    }

    pub fn translate(&self, code: u32) -> Key {
        let idx = self.entries.partition_point(|e| e.first <= code);
        if idx == 0 {
            return Key::NoKey;
        }
        self.entries[idx - 1].lookup(code).unwrap_or(Key::NoKey)
    }
}
