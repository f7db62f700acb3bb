use std::sync::{Arc, Mutex, Weak};

use drivekit_common::{ActorId, Attachment, Rotation, Transform};
use drivekit_sim::{SimError, SimulatorClient};
use glam::vec3;
use tracing::{debug, info};

use crate::surface::FrameSurface;

/// One selectable sensor definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSpec {
    pub name: &'static str,
}

/// Default sensor table: the RGB driving camera.
pub const DEFAULT_SENSORS: &[SensorSpec] = &[SensorSpec {
    name: "Camera RGB",
}];

/// Cycles attachment poses and sensors for the driving camera.
pub struct CameraManager {
    parent: ActorId,
    sensor: Option<ActorId>,
    transforms: Vec<(Transform, Attachment)>,
    transform_index: usize,
    sensors: Vec<SensorSpec>,
    sensor_index: usize,
    surface: Arc<Mutex<FrameSurface>>,
    gamma: f32,
    width: u32,
    height: u32,
}

impl CameraManager {
    /// `half_width` is the parent's bounding-box half-width, which places
    /// the low side camera just outside the body.
    pub fn new(parent: ActorId, half_width: f32, width: u32, height: u32, gamma: f32) -> Self {
        Self::with_sensors(
            parent,
            half_width,
            width,
            height,
            gamma,
            DEFAULT_SENSORS.to_vec(),
        )
    }

    pub fn with_sensors(
        parent: ActorId,
        half_width: f32,
        width: u32,
        height: u32,
        gamma: f32,
        sensors: Vec<SensorSpec>,
    ) -> Self {
        let bound_y = 0.5 + half_width;
        let transforms = vec![
            (
                Transform::new(vec3(-5.5, 0.0, 2.5), Rotation {
                    pitch: 8.0,
                    yaw: 0.0,
                    roll: 0.0,
                }),
                Attachment::SpringArm,
            ),
            (Transform::at(1.6, 0.0, 1.7), Attachment::Rigid),
            (Transform::at(5.5, 1.5, 1.5), Attachment::SpringArm),
            (
                Transform::new(vec3(-8.0, 0.0, 6.0), Rotation {
                    pitch: 6.0,
                    yaw: 0.0,
                    roll: 0.0,
                }),
                Attachment::SpringArm,
            ),
            (Transform::at(-1.0, -bound_y, 0.5), Attachment::Rigid),
        ];

        Self {
            parent,
            sensor: None,
            transforms,
            // Hood view by default.
            transform_index: 1,
            sensors,
            sensor_index: 0,
            surface: Arc::new(Mutex::new(FrameSurface::new("_out"))),
            gamma,
            width,
            height,
        }
    }

    pub fn surface(&self) -> Arc<Mutex<FrameSurface>> {
        self.surface.clone()
    }

    pub fn sensor_id(&self) -> Option<ActorId> {
        self.sensor
    }

    pub fn sensor_index(&self) -> usize {
        self.sensor_index
    }

    pub fn transform_index(&self) -> usize {
        self.transform_index
    }

    /// Name of the active sensor, for HUD notifications.
    pub fn sensor_name(&self) -> Option<&'static str> {
        self.sensors.get(self.sensor_index).map(|s| s.name)
    }

    /// Advances to the next attachment pose and respawns the sensor there.
    pub fn toggle_camera(&mut self, sim: &mut dyn SimulatorClient) -> Result<(), SimError> {
        self.transform_index = (self.transform_index + 1) % self.transforms.len();
        self.respawn(sim)
    }

    /// Selects the next sensor in the table.
    pub fn next_sensor(&mut self, sim: &mut dyn SimulatorClient) -> Result<(), SimError> {
        self.set_sensor(sim, self.sensor_index + 1)
    }

    /// Selects a sensor by index, wrapping out-of-range values. A no-op
    /// when the sensor table is empty.
    pub fn set_sensor(
        &mut self,
        sim: &mut dyn SimulatorClient,
        index: usize,
    ) -> Result<(), SimError> {
        if self.sensors.is_empty() {
            debug!(index, "ignoring sensor selection: no sensors configured");
            return Ok(());
        }
        self.sensor_index = index % self.sensors.len();
        self.respawn(sim)
    }

    /// Destroys the current sensor (if any) and spawns the active one at
    /// the active pose, registering the liveness-guarded frame handler.
    pub fn respawn(&mut self, sim: &mut dyn SimulatorClient) -> Result<(), SimError> {
        self.destroy(sim)?;

        let (transform, attachment) = self.transforms[self.transform_index];
        let weak: Weak<Mutex<FrameSurface>> = Arc::downgrade(&self.surface);
        let handler = Box::new(move |frame: drivekit_sim::CameraFrame| {
            // The session may already be gone; never touch freed state.
            if let Some(surface) = weak.upgrade() {
                surface.lock().expect("frame surface poisoned").accept(frame);
            }
        });

        let sensor = sim.spawn_camera(
            self.parent,
            transform,
            attachment,
            self.gamma,
            self.width,
            self.height,
            handler,
        )?;
        info!(%sensor, pose = self.transform_index, "camera sensor spawned");
        self.sensor = Some(sensor);
        Ok(())
    }

    /// Re-attaches the rig to a new parent actor, keeping the selected
    /// sensor and pose. Used after the controlled actor is respawned.
    pub fn retarget(
        &mut self,
        sim: &mut dyn SimulatorClient,
        parent: ActorId,
    ) -> Result<(), SimError> {
        self.parent = parent;
        self.respawn(sim)
    }

    /// Flips frame-to-disk recording; returns the new state.
    pub fn toggle_recording(&mut self) -> bool {
        self.surface
            .lock()
            .expect("frame surface poisoned")
            .toggle_recording()
    }

    /// Destroys the owned sensor. Idempotent; run on every teardown path.
    pub fn destroy(&mut self, sim: &mut dyn SimulatorClient) -> Result<(), SimError> {
        if let Some(sensor) = self.sensor.take() {
            sim.destroy_actor(sensor)?;
            self.surface
                .lock()
                .expect("frame surface poisoned")
                .clear();
            debug!(%sensor, "camera sensor destroyed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivekit_sim::{CameraFrame, MockCall, MockSimulator};

    fn test_frame(n: u64) -> CameraFrame {
        CameraFrame {
            frame: n,
            width: 1,
            height: 1,
            rgba: vec![1, 2, 3, 255],
        }
    }

    #[test]
    fn toggle_camera_cycles_all_five_poses() {
        let mut sim = MockSimulator::vehicle();
        let mut cam = CameraManager::new(ActorId(1), 0.9, 320, 240, 2.2);
        assert_eq!(cam.transform_index(), 1);
        for expected in [2, 3, 4, 0, 1] {
            cam.toggle_camera(&mut sim).unwrap();
            assert_eq!(cam.transform_index(), expected);
        }
    }

    #[test]
    fn respawn_destroys_the_previous_sensor() {
        let mut sim = MockSimulator::vehicle();
        let mut cam = CameraManager::new(ActorId(1), 0.9, 320, 240, 2.2);
        cam.respawn(&mut sim).unwrap();
        let first = cam.sensor_id().unwrap();
        cam.toggle_camera(&mut sim).unwrap();
        let second = cam.sensor_id().unwrap();
        assert_ne!(first, second);
        assert!(sim.calls.contains(&MockCall::DestroyActor(first)));
        assert!(!sim.has_handler(first));
        assert!(sim.has_handler(second));
    }

    #[test]
    fn out_of_range_sensor_selection_wraps() {
        let mut sim = MockSimulator::vehicle();
        let mut cam = CameraManager::new(ActorId(1), 0.9, 320, 240, 2.2);
        cam.set_sensor(&mut sim, 7).unwrap();
        assert_eq!(cam.sensor_index(), 0);
        assert!(cam.sensor_id().is_some());
    }

    #[test]
    fn empty_sensor_table_makes_selection_a_noop() {
        let mut sim = MockSimulator::vehicle();
        let mut cam = CameraManager::with_sensors(ActorId(1), 0.9, 320, 240, 2.2, Vec::new());
        cam.set_sensor(&mut sim, 3).unwrap();
        assert!(cam.sensor_id().is_none());
        assert!(sim.calls.is_empty());
    }

    #[test]
    fn frames_reach_the_shared_surface() {
        let mut sim = MockSimulator::vehicle();
        let mut cam = CameraManager::new(ActorId(1), 0.9, 320, 240, 2.2);
        cam.respawn(&mut sim).unwrap();
        let sensor = cam.sensor_id().unwrap();
        sim.emit_frame(sensor, test_frame(5));
        assert_eq!(cam.surface().lock().unwrap().latest().unwrap().frame, 5);
    }

    #[test]
    fn late_frames_after_teardown_are_dropped_safely() {
        let mut sim = MockSimulator::vehicle();
        let sensor;
        {
            let mut cam = CameraManager::new(ActorId(1), 0.9, 320, 240, 2.2);
            cam.respawn(&mut sim).unwrap();
            sensor = cam.sensor_id().unwrap();
            // Manager (and its surface) dropped without destroy: simulates a
            // session torn down while the server still pushes frames.
        }
        assert!(sim.has_handler(sensor));
        sim.emit_frame(sensor, test_frame(9));
        // Reaching here without a panic is the property under test.
    }

    #[test]
    fn retarget_respawns_on_the_new_parent() {
        let mut sim = MockSimulator::vehicle();
        let mut cam = CameraManager::new(ActorId(1), 0.9, 320, 240, 2.2);
        cam.respawn(&mut sim).unwrap();
        cam.retarget(&mut sim, ActorId(2)).unwrap();
        assert!(sim.calls.contains(&MockCall::SpawnCamera(ActorId(2))));
        assert_eq!(sim.handler_count(), 1);
    }

    #[test]
    fn destroy_clears_surface_and_is_idempotent() {
        let mut sim = MockSimulator::vehicle();
        let mut cam = CameraManager::new(ActorId(1), 0.9, 320, 240, 2.2);
        cam.respawn(&mut sim).unwrap();
        let sensor = cam.sensor_id().unwrap();
        sim.emit_frame(sensor, test_frame(1));

        cam.destroy(&mut sim).unwrap();
        assert!(cam.sensor_id().is_none());
        assert!(cam.surface().lock().unwrap().latest().is_none());
        cam.destroy(&mut sim).unwrap();
        let destroys = sim
            .calls
            .iter()
            .filter(|c| matches!(c, MockCall::DestroyActor(_)))
            .count();
        assert_eq!(destroys, 1);
    }
}
