//! Shared types for the drivekit client.
//!
//! # Invariants
//! - Control fields stay inside their documented ranges after every mutation.
//! - `Rotation::forward()` always returns a unit vector.

pub mod control;
pub mod lights;
pub mod types;

pub use control::{ControlCommand, VehicleControl, WalkerControl, round1};
pub use lights::LightState;
pub use types::{ActorCapability, ActorId, Attachment, Rotation, Telemetry, Transform};
