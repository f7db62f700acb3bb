//! Per-frame input mapping.
//!
//! One mapper per controlled actor, chosen at session start from the
//! actor's capability and fixed for the session. The mapper owns the
//! steering cache, the pending light word, and (for walkers) the yaw
//! accumulator.

use drivekit_common::{
    ActorCapability, ControlCommand, LightState, Rotation, VehicleControl, WalkerControl, round1,
};
use tracing::debug;

use crate::bindings::LightToggle;
use crate::keys::{Key, KeySet};

/// Steering saturates here, not at the command range limit of 1.
pub const STEER_LIMIT: f32 = 0.7;
/// Per-frame throttle ramp. Release drops to zero instantly.
const THROTTLE_STEP: f32 = 0.01;
/// Per-frame brake ramp, five times steeper than throttle.
const BRAKE_STEP: f32 = 0.2;
/// Steering ramp per elapsed millisecond.
const STEER_RATE: f32 = 5e-4;
/// Walker yaw rate, degrees per elapsed millisecond.
const WALKER_TURN_RATE: f32 = 0.08;
/// Creep speed while a walker turns in place.
const WALKER_TURN_SPEED: f32 = 0.01;
/// Walker speeds in m/s; fast is selected with Shift.
pub const WALKER_SPEED: f32 = 1.589;
pub const WALKER_SPEED_FAST: f32 = 3.713;

const ACCEL_KEYS: &[Key] = &[Key::W, Key::Up];
const BRAKE_KEYS: &[Key] = &[Key::S, Key::Down];
const LEFT_KEYS: &[Key] = &[Key::A, Key::Left];
const RIGHT_KEYS: &[Key] = &[Key::D, Key::Right];

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("actor type not supported for keyboard control")]
    UnsupportedActor,
}

/// Output of one mapping pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappedFrame {
    pub command: ControlCommand,
    /// The light word to push, present only on the frame it changed.
    pub lights: Option<LightState>,
}

#[derive(Debug)]
pub struct VehicleState {
    control: VehicleControl,
    steer_cache: f32,
    /// Light word as toggled/derived so far this session.
    pending_lights: LightState,
    /// Light word last handed out for pushing.
    pushed_lights: LightState,
    autopilot: bool,
}

#[derive(Debug)]
pub struct WalkerState {
    control: WalkerControl,
    rotation: Rotation,
}

/// Unified input mapper over the `{Vehicle, Walker}` capability set.
#[derive(Debug)]
pub enum InputMapper {
    Vehicle(VehicleState),
    Walker(WalkerState),
}

impl InputMapper {
    /// Builds the mapper variant for the actor's capability.
    ///
    /// `spawn_rotation` seeds the walker yaw accumulator and is ignored
    /// for vehicles. Unsupported capabilities are a fatal startup error.
    pub fn new(
        capability: ActorCapability,
        start_in_autopilot: bool,
        spawn_rotation: Rotation,
    ) -> Result<Self, ControlError> {
        match capability {
            ActorCapability::Vehicle => Ok(InputMapper::Vehicle(VehicleState {
                control: VehicleControl::default(),
                steer_cache: 0.0,
                pending_lights: LightState::NONE,
                pushed_lights: LightState::NONE,
                autopilot: start_in_autopilot,
            })),
            ActorCapability::Walker => Ok(InputMapper::Walker(WalkerState {
                control: WalkerControl::default(),
                rotation: spawn_rotation,
            })),
            ActorCapability::Other => Err(ControlError::UnsupportedActor),
        }
    }

    pub fn is_vehicle(&self) -> bool {
        matches!(self, InputMapper::Vehicle(_))
    }

    /// Whether the external autopilot currently owns the actor.
    /// Always false for walkers.
    pub fn autopilot_enabled(&self) -> bool {
        match self {
            InputMapper::Vehicle(v) => v.autopilot,
            InputMapper::Walker(_) => false,
        }
    }

    /// Flips autopilot; returns the new state, or `None` for walkers.
    pub fn toggle_autopilot(&mut self) -> Option<bool> {
        match self {
            InputMapper::Vehicle(v) => {
                v.autopilot = !v.autopilot;
                Some(v.autopilot)
            }
            InputMapper::Walker(_) => None,
        }
    }

    /// Forces autopilot off (used when a replay takes over the actor).
    pub fn disable_autopilot(&mut self) {
        if let InputMapper::Vehicle(v) = self {
            v.autopilot = false;
        }
    }

    /// Swaps between forward first gear and reverse.
    pub fn toggle_reverse(&mut self) {
        if let InputMapper::Vehicle(v) = self {
            v.control.gear = if v.control.reverse { 1 } else { -1 };
        }
    }

    /// Flips manual transmission, adopting the actor's currently engaged
    /// gear. Returns the new mode, or `None` for walkers.
    pub fn toggle_manual_shift(&mut self, engaged_gear: i32) -> Option<bool> {
        match self {
            InputMapper::Vehicle(v) => {
                v.control.manual_gear_shift = !v.control.manual_gear_shift;
                v.control.gear = engaged_gear;
                Some(v.control.manual_gear_shift)
            }
            InputMapper::Walker(_) => None,
        }
    }

    /// Down-shift, clamped at reverse. Only meaningful in manual mode.
    pub fn gear_down(&mut self) {
        if let InputMapper::Vehicle(v) = self {
            if v.control.manual_gear_shift {
                v.control.gear = (v.control.gear - 1).max(-1);
            }
        }
    }

    /// Up-shift. Only meaningful in manual mode.
    pub fn gear_up(&mut self) {
        if let InputMapper::Vehicle(v) = self {
            if v.control.manual_gear_shift {
                v.control.gear += 1;
            }
        }
    }

    /// Applies an explicit light toggle. The new word reaches the server
    /// on the next mapping pass that detects a change.
    pub fn toggle_light(&mut self, toggle: LightToggle) {
        let InputMapper::Vehicle(v) = self else {
            return;
        };
        v.pending_lights = match toggle {
            LightToggle::NextGroup => v.pending_lights.next_group(),
            LightToggle::HighBeam => v.pending_lights ^ LightState::HIGH_BEAM,
            LightToggle::LeftBlinker => v.pending_lights ^ LightState::LEFT_BLINKER,
            LightToggle::RightBlinker => v.pending_lights ^ LightState::RIGHT_BLINKER,
            LightToggle::Interior => v.pending_lights ^ LightState::INTERIOR,
            LightToggle::Special1 => v.pending_lights ^ LightState::SPECIAL_1,
        };
        debug!(lights = ?v.pending_lights, "light toggle");
    }

    /// Current command, for the HUD.
    pub fn command(&self) -> ControlCommand {
        match self {
            InputMapper::Vehicle(v) => ControlCommand::Vehicle(v.control),
            InputMapper::Walker(w) => ControlCommand::Walker(w.control),
        }
    }

    /// Maps one frame of held-key state into a command.
    ///
    /// Returns `None` while autopilot owns the actor: nothing is computed
    /// and nothing may be pushed.
    pub fn map_frame(&mut self, keys: &KeySet, elapsed_ms: f32) -> Option<MappedFrame> {
        match self {
            InputMapper::Vehicle(v) => {
                if v.autopilot {
                    return None;
                }
                Some(v.map_frame(keys, elapsed_ms))
            }
            InputMapper::Walker(w) => Some(w.map_frame(keys, elapsed_ms)),
        }
    }
}

impl VehicleState {
    fn map_frame(&mut self, keys: &KeySet, elapsed_ms: f32) -> MappedFrame {
        // Linear ramp while held, instant release.
        if keys.any_down(ACCEL_KEYS) {
            self.control.throttle = (self.control.throttle + THROTTLE_STEP).min(1.0);
        } else {
            self.control.throttle = 0.0;
        }

        if keys.any_down(BRAKE_KEYS) {
            self.control.brake = (self.control.brake + BRAKE_STEP).min(1.0);
        } else {
            self.control.brake = 0.0;
        }

        // Opposite steer cancels instantly, same-side steer ramps, release
        // self-centers.
        let increment = STEER_RATE * elapsed_ms;
        if keys.any_down(LEFT_KEYS) {
            if self.steer_cache > 0.0 {
                self.steer_cache = 0.0;
            } else {
                self.steer_cache -= increment;
            }
        } else if keys.any_down(RIGHT_KEYS) {
            if self.steer_cache < 0.0 {
                self.steer_cache = 0.0;
            } else {
                self.steer_cache += increment;
            }
        } else {
            self.steer_cache = 0.0;
        }
        self.steer_cache = self.steer_cache.clamp(-STEER_LIMIT, STEER_LIMIT);
        self.control.steer = round1(self.steer_cache);

        self.control.hand_brake = keys.is_down(Key::Space);
        self.control.reverse = self.control.gear < 0;

        // Brake/Reverse bits mirror the control state; everything else is
        // whatever explicit toggles left in the pending word.
        self.pending_lights.set(LightState::BRAKE, self.control.brake > 0.0);
        self.pending_lights
            .set(LightState::REVERSE, self.control.reverse);

        let lights = if self.pending_lights != self.pushed_lights {
            self.pushed_lights = self.pending_lights;
            Some(self.pushed_lights)
        } else {
            None
        };

        MappedFrame {
            command: ControlCommand::Vehicle(self.control),
            lights,
        }
    }
}

impl WalkerState {
    fn map_frame(&mut self, keys: &KeySet, elapsed_ms: f32) -> MappedFrame {
        let mut speed = 0.0;
        if keys.any_down(LEFT_KEYS) {
            speed = WALKER_TURN_SPEED;
            self.rotation.yaw -= WALKER_TURN_RATE * elapsed_ms;
        }
        if keys.any_down(RIGHT_KEYS) {
            speed = WALKER_TURN_SPEED;
            self.rotation.yaw += WALKER_TURN_RATE * elapsed_ms;
        }
        if keys.any_down(ACCEL_KEYS) {
            speed = if keys.mods().shift {
                WALKER_SPEED_FAST
            } else {
                WALKER_SPEED
            };
        }

        self.rotation.yaw = round1(self.rotation.yaw);
        self.control.speed = speed;
        self.control.jump = keys.is_down(Key::Space);
        self.control.direction = self.rotation.forward();

        MappedFrame {
            command: ControlCommand::Walker(self.control),
            lights: None,
        }
    }
}
