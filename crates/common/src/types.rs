use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Handle for a simulator-owned actor (vehicle, pedestrian, or sensor).
///
/// Ids are assigned by the server; the client never invents one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u32);

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// What kind of control an actor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorCapability {
    Vehicle,
    Walker,
    /// Anything else (props, sensors, traffic infrastructure).
    Other,
}

/// Orientation in degrees, matching the simulator's convention.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Rotation {
    /// Rotation about the vertical axis only.
    pub fn from_yaw(yaw: f32) -> Self {
        Self {
            pitch: 0.0,
            yaw,
            roll: 0.0,
        }
    }

    /// Unit vector pointing along the rotation's facing direction.
    pub fn forward(&self) -> Vec3 {
        let (sp, cp) = self.pitch.to_radians().sin_cos();
        let (sy, cy) = self.yaw.to_radians().sin_cos();
        Vec3::new(cp * cy, cp * sy, sp)
    }
}

/// Spatial pose: location plus orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub location: Vec3,
    pub rotation: Rotation,
}

impl Transform {
    pub fn new(location: Vec3, rotation: Rotation) -> Self {
        Self { location, rotation }
    }

    /// Pose at the given offset with no rotation.
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self {
            location: Vec3::new(x, y, z),
            rotation: Rotation::default(),
        }
    }
}

/// How a spawned sensor follows its parent actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attachment {
    /// Fixed offset from the parent.
    Rigid,
    /// Eased follow with collision avoidance, for chase cameras.
    SpringArm,
}

/// Per-frame actor telemetry sampled from the server for the HUD.
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    pub server_fps: f32,
    pub client_fps: f32,
    pub actor_name: String,
    pub map_name: String,
    pub velocity: Vec3,
    pub transform: Transform,
}

impl Telemetry {
    /// Ground speed in km/h.
    pub fn speed_kmh(&self) -> f32 {
        3.6 * self.velocity.length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_is_unit_length() {
        for yaw in [-180.0, -90.5, 0.0, 33.3, 90.0, 179.9] {
            let f = Rotation::from_yaw(yaw).forward();
            assert!((f.length() - 1.0).abs() < 1e-6, "yaw={yaw} len={}", f.length());
        }
    }

    #[test]
    fn forward_matches_axes() {
        let east = Rotation::from_yaw(0.0).forward();
        assert!((east - Vec3::X).length() < 1e-6);
        let south = Rotation::from_yaw(90.0).forward();
        assert!((south - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn speed_converts_to_kmh() {
        let t = Telemetry {
            velocity: Vec3::new(10.0, 0.0, 0.0),
            ..Telemetry::default()
        };
        assert!((t.speed_kmh() - 36.0).abs() < 1e-4);
    }
}
