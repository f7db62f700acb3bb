//! Camera and sensor attachment management.
//!
//! Owns the table of attachment poses, the active sensor, and the shared
//! frame surface the renderer reads. The frame handler registered with the
//! simulator holds only a `Weak` reference to the surface: if the session
//! is torn down while the server still pushes frames, the handler upgrades,
//! fails, and returns instead of touching freed state.

pub mod manager;
pub mod surface;

pub use manager::{CameraManager, SensorSpec};
pub use surface::FrameSurface;
