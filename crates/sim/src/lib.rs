//! Client abstraction over the external vehicle simulator.
//!
//! The simulator owns all physics, world state, actor lifecycles, and 3D
//! rendering. This crate exposes the narrow facet of it the driving client
//! needs: actor queries, control application, recorder management, sensor
//! spawning, and tick advancement.
//!
//! # Invariants
//! - Every call is a synchronous round-trip; nothing here suspends mid-frame.
//! - Camera frame handlers are invoked only between calls, never concurrently
//!   with session code.

pub mod config;
pub mod link;
pub mod mock;
pub mod proto;

use drivekit_common::{ActorId, Attachment, ControlCommand, LightState, Transform};
use glam::Vec3;

pub use config::SimConfig;
pub use link::ServerLink;
pub use mock::{MockCall, MockSimulator};

/// Errors from simulator communication.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("failed to connect to simulator at {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },
    #[error("IO error talking to simulator: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed simulator message: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("simulator rejected request: {0}")]
    Rejected(String),
    #[error("no actor matched filter {filter:?} with role {role:?}")]
    NoSuchActor { filter: String, role: String },
    #[error("simulator closed the connection")]
    Disconnected,
}

pub use drivekit_common::types::ActorCapability;

/// Static facts about an actor, queried once at session start.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ActorInfo {
    pub capability: ActorCapability,
    /// Human-readable type description, e.g. "Mustang Mach-E".
    pub display_name: String,
    /// Half-width of the bounding box, used to place the low side camera.
    pub half_width: f32,
    /// Gear currently engaged, adopted when switching to manual shift.
    pub gear: i32,
}

/// Instantaneous actor state sampled each frame for the HUD.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySample {
    pub velocity: Vec3,
    pub transform: Transform,
    pub map_name: String,
}

/// One decoded camera image pushed by a sensor.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub frame: u64,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 pixels, row-major.
    pub rgba: Vec<u8>,
}

/// Callback invoked for every frame a spawned camera produces.
pub type FrameHandler = Box<dyn FnMut(CameraFrame) + Send>;

/// The facet of the simulator the driving client talks to.
///
/// `ServerLink` implements this over a live connection; `MockSimulator`
/// implements it in memory for tests.
pub trait SimulatorClient {
    /// Finds the actor to control by blueprint filter and role name.
    fn find_actor(&mut self, filter: &str, role_name: &str) -> Result<ActorId, SimError>;

    fn actor_info(&mut self, actor: ActorId) -> Result<ActorInfo, SimError>;

    /// Samples velocity, pose, and map name for the HUD.
    fn actor_telemetry(&mut self, actor: ActorId) -> Result<TelemetrySample, SimError>;

    /// Pushes a control command to the actor.
    fn apply_control(&mut self, actor: ActorId, command: &ControlCommand) -> Result<(), SimError>;

    fn set_autopilot(&mut self, actor: ActorId, enabled: bool) -> Result<(), SimError>;

    /// Pushes a vehicle light word. Callers are expected to do this only
    /// when the word changed; the link does not deduplicate.
    fn set_light_state(&mut self, actor: ActorId, lights: LightState) -> Result<(), SimError>;

    /// `Some(v)` pins the actor to a constant velocity; `None` releases it.
    fn set_constant_velocity(
        &mut self,
        actor: ActorId,
        velocity: Option<Vec3>,
    ) -> Result<(), SimError>;

    fn enable_carsim(&mut self, actor: ActorId, simfile: &str) -> Result<(), SimError>;

    fn use_carsim_road(&mut self, actor: ActorId, enabled: bool) -> Result<(), SimError>;

    /// Selects the previous/next map layer; returns the layer name for the HUD.
    fn next_map_layer(&mut self, reverse: bool) -> Result<String, SimError>;

    /// Loads (or unloads) the currently selected map layer.
    fn load_map_layer(&mut self, unload: bool) -> Result<String, SimError>;

    /// Destroys and respawns the controlled actor; returns the new handle.
    fn restart_actor(&mut self, actor: ActorId) -> Result<ActorId, SimError>;

    fn set_radar_visualization(&mut self, enabled: bool) -> Result<(), SimError>;

    /// Starts the server-side recorder writing the named file.
    fn start_recorder(&mut self, path: &str) -> Result<(), SimError>;

    fn stop_recorder(&mut self) -> Result<(), SimError>;

    /// Replays a recorded file from `start` seconds, following `actor`.
    fn replay_file(&mut self, path: &str, start: i32, actor: ActorId) -> Result<(), SimError>;

    /// Spawns an RGB camera attached to `parent` and registers its frame
    /// handler. Returns the sensor's actor id.
    #[allow(clippy::too_many_arguments)]
    fn spawn_camera(
        &mut self,
        parent: ActorId,
        transform: Transform,
        attachment: Attachment,
        gamma: f32,
        width: u32,
        height: u32,
        handler: FrameHandler,
    ) -> Result<ActorId, SimError>;

    /// Destroys an owned actor (sensor or player handle).
    fn destroy_actor(&mut self, actor: ActorId) -> Result<(), SimError>;

    /// Advances the simulation one step and returns the server frame number.
    fn tick(&mut self) -> Result<u64, SimError>;

    /// Server-reported simulation rate, for the HUD.
    fn server_fps(&self) -> f32;
}
