//! Declarative key bindings.
//!
//! One static table maps key-up events (plus required modifiers) to
//! discrete actions; `dispatch` is the only consumer. Held-key behavior
//! (throttle, brake, steer, hand-brake) lives in the mapper, not here.

use crate::keys::{Key, Mods};

/// Explicit light toggles, applied on top of the automatic brake/reverse
/// derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightToggle {
    /// Cycle off -> position -> low beam -> fog -> off.
    NextGroup,
    HighBeam,
    LeftBlinker,
    RightBlinker,
    Interior,
    Special1,
}

/// A discrete action fired by a key-up event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    RestartActor,
    ToggleHudInfo,
    ToggleHelp,
    NextCameraTransform,
    NextSensor,
    SetSensor(usize),
    ToggleRadar,
    NextMapLayer { reverse: bool },
    LoadMapLayer { unload: bool },
    ToggleFrameRecording,
    ToggleServerRecorder,
    ReplayRecording,
    AdjustReplayStart(i32),
    ToggleConstantVelocity,
    EnableCarsim,
    ToggleCarsimRoad,
    ToggleReverse,
    ToggleManualShift,
    GearUp,
    GearDown,
    ToggleAutopilot,
    Light(LightToggle),
}

/// One row of the binding table.
#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub key: Key,
    pub mods: Mods,
    pub action: Action,
    pub help: &'static str,
}

const fn bind(key: Key, mods: Mods, action: Action, help: &'static str) -> Binding {
    Binding {
        key,
        mods,
        action,
        help,
    }
}

/// The full key-up binding table. Order is irrelevant to dispatch; when a
/// key has both plain and modified rows, the row requiring the most held
/// modifiers wins.
pub static BINDINGS: &[Binding] = &[
    bind(Key::Escape, Mods::NONE, Action::Quit, "quit"),
    bind(Key::Q, Mods::CTRL, Action::Quit, "quit"),
    bind(Key::Backspace, Mods::NONE, Action::RestartActor, "restart actor"),
    bind(Key::F1, Mods::NONE, Action::ToggleHudInfo, "toggle HUD"),
    bind(Key::H, Mods::NONE, Action::ToggleHelp, "toggle help"),
    bind(Key::Slash, Mods::SHIFT, Action::ToggleHelp, "toggle help"),
    bind(Key::Tab, Mods::NONE, Action::NextCameraTransform, "change camera position"),
    bind(Key::Backquote, Mods::NONE, Action::NextSensor, "next sensor"),
    bind(Key::N, Mods::NONE, Action::NextSensor, "next sensor"),
    bind(Key::Digit(1), Mods::NONE, Action::SetSensor(0), "change to sensor 1"),
    bind(Key::Digit(2), Mods::NONE, Action::SetSensor(1), "change to sensor 2"),
    bind(Key::Digit(3), Mods::NONE, Action::SetSensor(2), "change to sensor 3"),
    bind(Key::Digit(4), Mods::NONE, Action::SetSensor(3), "change to sensor 4"),
    bind(Key::Digit(5), Mods::NONE, Action::SetSensor(4), "change to sensor 5"),
    bind(Key::Digit(6), Mods::NONE, Action::SetSensor(5), "change to sensor 6"),
    bind(Key::Digit(7), Mods::NONE, Action::SetSensor(6), "change to sensor 7"),
    bind(Key::Digit(8), Mods::NONE, Action::SetSensor(7), "change to sensor 8"),
    bind(Key::Digit(9), Mods::NONE, Action::SetSensor(8), "change to sensor 9"),
    bind(Key::G, Mods::NONE, Action::ToggleRadar, "toggle radar visualization"),
    bind(Key::V, Mods::NONE, Action::NextMapLayer { reverse: false }, "next map layer"),
    bind(Key::V, Mods::SHIFT, Action::NextMapLayer { reverse: true }, "previous map layer"),
    bind(Key::B, Mods::NONE, Action::LoadMapLayer { unload: false }, "load map layer"),
    bind(Key::B, Mods::SHIFT, Action::LoadMapLayer { unload: true }, "unload map layer"),
    bind(Key::R, Mods::NONE, Action::ToggleFrameRecording, "toggle recording images to disk"),
    bind(Key::R, Mods::CTRL, Action::ToggleServerRecorder, "toggle recording of simulation"),
    bind(Key::P, Mods::CTRL, Action::ReplayRecording, "start replaying last recorded simulation"),
    bind(Key::Minus, Mods::CTRL, Action::AdjustReplayStart(-1), "decrement replay start by 1 second"),
    bind(Key::Minus, Mods::CTRL_SHIFT, Action::AdjustReplayStart(-10), "decrement replay start by 10 seconds"),
    bind(Key::Equals, Mods::CTRL, Action::AdjustReplayStart(1), "increment replay start by 1 second"),
    bind(Key::Equals, Mods::CTRL_SHIFT, Action::AdjustReplayStart(10), "increment replay start by 10 seconds"),
    bind(Key::W, Mods::CTRL, Action::ToggleConstantVelocity, "toggle constant velocity mode at 60 km/h"),
    bind(Key::K, Mods::CTRL, Action::EnableCarsim, "enable carsim"),
    bind(Key::J, Mods::CTRL, Action::ToggleCarsimRoad, "toggle carsim road"),
    bind(Key::Q, Mods::NONE, Action::ToggleReverse, "toggle reverse"),
    bind(Key::M, Mods::NONE, Action::ToggleManualShift, "toggle manual transmission"),
    bind(Key::Comma, Mods::NONE, Action::GearDown, "gear down"),
    bind(Key::Period, Mods::NONE, Action::GearUp, "gear up"),
    bind(Key::P, Mods::NONE, Action::ToggleAutopilot, "toggle autopilot"),
    bind(Key::L, Mods::NONE, Action::Light(LightToggle::NextGroup), "toggle next light type"),
    bind(Key::L, Mods::SHIFT, Action::Light(LightToggle::HighBeam), "toggle high beam"),
    bind(Key::L, Mods::CTRL, Action::Light(LightToggle::Special1), "toggle special light"),
    bind(Key::Z, Mods::NONE, Action::Light(LightToggle::RightBlinker), "toggle right blinker"),
    bind(Key::X, Mods::NONE, Action::Light(LightToggle::LeftBlinker), "toggle left blinker"),
    bind(Key::I, Mods::NONE, Action::Light(LightToggle::Interior), "toggle interior light"),
];

/// Resolves a key-up event against the table.
///
/// Entries whose required modifiers are a subset of the held modifiers are
/// candidates; the one requiring the most modifiers wins, so `Ctrl+R`
/// shadows `R` while `Ctrl` is down.
pub fn dispatch(key: Key, held: Mods) -> Option<Action> {
    BINDINGS
        .iter()
        .filter(|b| b.key == key && b.mods.satisfied_by(held))
        .max_by_key(|b| b.mods.count())
        .map(|b| b.action)
}

/// Help text for the held-key (state, not event) controls.
pub static HELD_KEY_HELP: &[(&str, &str)] = &[
    ("W / Up", "throttle (walk forward as pedestrian)"),
    ("S / Down", "brake"),
    ("A / Left", "steer left"),
    ("D / Right", "steer right"),
    ("Space", "hand-brake (jump as pedestrian)"),
    ("Shift + W", "walk faster as pedestrian"),
];

/// Renders the complete help panel text from the binding table.
pub fn help_text() -> String {
    let mut out = String::from("Use ARROWS or WASD keys for control.\n\n");
    for (label, help) in HELD_KEY_HELP {
        out.push_str(&format!("    {label:<12} : {help}\n"));
    }
    out.push('\n');
    for b in BINDINGS {
        let mut label = String::new();
        if b.mods.ctrl {
            label.push_str("CTRL + ");
        }
        if b.mods.shift {
            label.push_str("SHIFT + ");
        }
        label.push_str(&b.key.label());
        out.push_str(&format!("    {label:<12} : {help}\n", help = b.help));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_q_toggles_reverse() {
        assert_eq!(dispatch(Key::Q, Mods::NONE), Some(Action::ToggleReverse));
    }

    #[test]
    fn ctrl_q_quits() {
        assert_eq!(dispatch(Key::Q, Mods::CTRL), Some(Action::Quit));
    }

    #[test]
    fn most_specific_modifier_row_wins() {
        assert_eq!(
            dispatch(Key::Minus, Mods::CTRL),
            Some(Action::AdjustReplayStart(-1))
        );
        assert_eq!(
            dispatch(Key::Minus, Mods::CTRL_SHIFT),
            Some(Action::AdjustReplayStart(-10))
        );
        assert_eq!(dispatch(Key::Minus, Mods::NONE), None);
    }

    #[test]
    fn shift_v_reverses_map_layer_cycle() {
        assert_eq!(
            dispatch(Key::V, Mods::SHIFT),
            Some(Action::NextMapLayer { reverse: true })
        );
        assert_eq!(
            dispatch(Key::V, Mods::NONE),
            Some(Action::NextMapLayer { reverse: false })
        );
    }

    #[test]
    fn autopilot_requires_no_ctrl() {
        assert_eq!(dispatch(Key::P, Mods::NONE), Some(Action::ToggleAutopilot));
        assert_eq!(dispatch(Key::P, Mods::CTRL), Some(Action::ReplayRecording));
    }

    #[test]
    fn digit_keys_select_sensors() {
        assert_eq!(dispatch(Key::Digit(1), Mods::NONE), Some(Action::SetSensor(0)));
        assert_eq!(dispatch(Key::Digit(9), Mods::NONE), Some(Action::SetSensor(8)));
    }

    #[test]
    fn unbound_key_dispatches_nothing() {
        assert_eq!(dispatch(Key::Space, Mods::NONE), None);
    }

    #[test]
    fn help_text_covers_every_binding() {
        let help = help_text();
        assert!(help.contains("toggle reverse"));
        assert!(help.contains("CTRL + R"));
        assert!(help.contains("SHIFT + L"));
        assert!(help.contains("hand-brake"));
    }
}
