use std::collections::HashSet;

/// Toolkit-independent key identity.
///
/// The desktop app translates `winit` physical keys into these; tests
/// construct them directly. Arrow keys and WASD are distinct here and
/// merged by the mapper where the bindings treat them as synonyms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    S,
    D,
    Up,
    Down,
    Left,
    Right,
    Q,
    M,
    P,
    R,
    L,
    Z,
    X,
    I,
    G,
    V,
    B,
    N,
    H,
    K,
    J,
    Comma,
    Period,
    Slash,
    Minus,
    Equals,
    Space,
    Tab,
    Backquote,
    Backspace,
    Escape,
    F1,
    Digit(u8),
    Shift,
    Ctrl,
}

impl Key {
    /// Short label for help text.
    pub fn label(self) -> String {
        match self {
            Key::Comma => ",".to_string(),
            Key::Period => ".".to_string(),
            Key::Slash => "/".to_string(),
            Key::Minus => "-".to_string(),
            Key::Equals => "=".to_string(),
            Key::Backquote => "`".to_string(),
            Key::Digit(n) => n.to_string(),
            Key::Escape => "ESC".to_string(),
            Key::Backspace => "Backspace".to_string(),
            Key::Space => "Space".to_string(),
            Key::Tab => "TAB".to_string(),
            other => format!("{other:?}"),
        }
    }
}

/// Active modifier keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mods {
    pub ctrl: bool,
    pub shift: bool,
}

impl Mods {
    pub const NONE: Mods = Mods {
        ctrl: false,
        shift: false,
    };
    pub const CTRL: Mods = Mods {
        ctrl: true,
        shift: false,
    };
    pub const SHIFT: Mods = Mods {
        ctrl: false,
        shift: true,
    };
    pub const CTRL_SHIFT: Mods = Mods {
        ctrl: true,
        shift: true,
    };

    /// True when every modifier this value requires is held in `held`.
    pub fn satisfied_by(self, held: Mods) -> bool {
        (!self.ctrl || held.ctrl) && (!self.shift || held.shift)
    }

    /// Number of modifiers required; used to prefer the most specific binding.
    pub fn count(self) -> u32 {
        self.ctrl as u32 + self.shift as u32
    }
}

/// Set of currently held keys, maintained from press/release events.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    held: HashSet<Key>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: Key) {
        self.held.insert(key);
    }

    pub fn release(&mut self, key: Key) {
        self.held.remove(&key);
    }

    pub fn is_down(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    pub fn any_down(&self, keys: &[Key]) -> bool {
        keys.iter().any(|k| self.held.contains(k))
    }

    /// Modifier state derived from the held set.
    pub fn mods(&self) -> Mods {
        Mods {
            ctrl: self.is_down(Key::Ctrl),
            shift: self.is_down(Key::Shift),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_release_tracks_held_state() {
        let mut keys = KeySet::new();
        keys.press(Key::W);
        assert!(keys.is_down(Key::W));
        keys.release(Key::W);
        assert!(!keys.is_down(Key::W));
    }

    #[test]
    fn mods_follow_modifier_keys() {
        let mut keys = KeySet::new();
        assert_eq!(keys.mods(), Mods::NONE);
        keys.press(Key::Ctrl);
        keys.press(Key::Shift);
        assert_eq!(keys.mods(), Mods::CTRL_SHIFT);
    }

    #[test]
    fn requirement_satisfaction_ignores_extra_mods() {
        assert!(Mods::NONE.satisfied_by(Mods::CTRL));
        assert!(Mods::CTRL.satisfied_by(Mods::CTRL_SHIFT));
        assert!(!Mods::CTRL_SHIFT.satisfied_by(Mods::CTRL));
    }
}
