use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Round to one decimal place, the precision the server expects for steer
/// and walker yaw values.
pub fn round1(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

/// Control command for a vehicle actor.
///
/// `throttle` and `brake` live in `[0, 1]`, `steer` in `[-1, 1]`.
/// `reverse` is derived state: it must equal `gear < 0` after every
/// input-mapping pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleControl {
    pub throttle: f32,
    pub steer: f32,
    pub brake: f32,
    pub hand_brake: bool,
    pub reverse: bool,
    pub manual_gear_shift: bool,
    pub gear: i32,
}

impl Default for VehicleControl {
    fn default() -> Self {
        Self {
            throttle: 0.0,
            steer: 0.0,
            brake: 0.0,
            hand_brake: false,
            reverse: false,
            manual_gear_shift: false,
            gear: 0,
        }
    }
}

/// Control command for a pedestrian actor.
///
/// `direction` is a unit vector derived from the walker's yaw; `speed` is
/// meters per second and never negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalkerControl {
    pub direction: Vec3,
    pub speed: f32,
    pub jump: bool,
}

impl Default for WalkerControl {
    fn default() -> Self {
        Self {
            direction: Vec3::X,
            speed: 0.0,
            jump: false,
        }
    }
}

/// Tagged control command, one variant per controllable actor kind.
///
/// A session owns exactly one of these, chosen at startup from the actor's
/// capability, and mutates it in place every frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ControlCommand {
    Vehicle(VehicleControl),
    Walker(WalkerControl),
}

impl ControlCommand {
    pub fn as_vehicle(&self) -> Option<&VehicleControl> {
        match self {
            ControlCommand::Vehicle(v) => Some(v),
            ControlCommand::Walker(_) => None,
        }
    }

    pub fn as_walker(&self) -> Option<&WalkerControl> {
        match self {
            ControlCommand::Vehicle(_) => None,
            ControlCommand::Walker(w) => Some(w),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_default_is_neutral() {
        let c = VehicleControl::default();
        assert_eq!(c.throttle, 0.0);
        assert_eq!(c.brake, 0.0);
        assert_eq!(c.gear, 0);
        assert!(!c.reverse);
    }

    #[test]
    fn round1_half_rounds_away_from_zero() {
        assert_eq!(round1(0.25), 0.3);
        assert_eq!(round1(-0.25), -0.3);
        assert_eq!(round1(0.649), 0.6);
        assert_eq!(round1(0.7), 0.7);
    }

    #[test]
    fn command_accessors_match_variant() {
        let v = ControlCommand::Vehicle(VehicleControl::default());
        assert!(v.as_vehicle().is_some());
        assert!(v.as_walker().is_none());
        let w = ControlCommand::Walker(WalkerControl::default());
        assert!(w.as_walker().is_some());
    }
}
