//! In-memory simulator double for tests.
//!
//! Records every call so tests can assert on push behavior (most
//! importantly: how often the light word was actually written).

use std::collections::HashMap;

use drivekit_common::{ActorId, Attachment, ControlCommand, LightState, Transform};
use glam::Vec3;

use crate::{
    ActorCapability, ActorInfo, CameraFrame, FrameHandler, SimError, SimulatorClient,
    TelemetrySample,
};

/// One recorded call against the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    ApplyControl(ActorId, ControlCommand),
    SetAutopilot(ActorId, bool),
    SetLightState(ActorId, LightState),
    SetConstantVelocity(ActorId, Option<Vec3>),
    EnableCarsim(ActorId, String),
    UseCarsimRoad(ActorId, bool),
    NextMapLayer(bool),
    LoadMapLayer(bool),
    RestartActor(ActorId),
    SetRadarVisualization(bool),
    StartRecorder(String),
    StopRecorder,
    ReplayFile(String, i32, ActorId),
    SpawnCamera(ActorId),
    DestroyActor(ActorId),
    Tick,
}

/// Scriptable in-memory `SimulatorClient`.
pub struct MockSimulator {
    pub info: ActorInfo,
    pub telemetry: TelemetrySample,
    pub calls: Vec<MockCall>,
    handlers: HashMap<ActorId, FrameHandler>,
    next_actor: u32,
    frame: u64,
}

impl MockSimulator {
    pub fn new(capability: ActorCapability) -> Self {
        Self {
            info: ActorInfo {
                capability,
                display_name: "Mock Actor".to_string(),
                half_width: 0.9,
                gear: 0,
            },
            telemetry: TelemetrySample {
                map_name: "MockTown".to_string(),
                ..TelemetrySample::default()
            },
            calls: Vec::new(),
            handlers: HashMap::new(),
            next_actor: 100,
            frame: 0,
        }
    }

    pub fn vehicle() -> Self {
        Self::new(ActorCapability::Vehicle)
    }

    pub fn walker() -> Self {
        Self::new(ActorCapability::Walker)
    }

    /// Number of light-word writes seen so far.
    pub fn light_pushes(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, MockCall::SetLightState(..)))
            .count()
    }

    /// Most recent light word written, if any.
    pub fn last_lights(&self) -> Option<LightState> {
        self.calls.iter().rev().find_map(|c| match c {
            MockCall::SetLightState(_, lights) => Some(*lights),
            _ => None,
        })
    }

    /// Most recent control command pushed, if any.
    pub fn last_control(&self) -> Option<ControlCommand> {
        self.calls.iter().rev().find_map(|c| match c {
            MockCall::ApplyControl(_, cmd) => Some(*cmd),
            _ => None,
        })
    }

    pub fn has_handler(&self, sensor: ActorId) -> bool {
        self.handlers.contains_key(&sensor)
    }

    /// Number of live frame handlers, across all sensors.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Delivers a frame to the sensor's registered handler, as the live
    /// link would when the server pushes one.
    pub fn emit_frame(&mut self, sensor: ActorId, frame: CameraFrame) {
        if let Some(handler) = self.handlers.get_mut(&sensor) {
            handler(frame);
        }
    }
}

impl SimulatorClient for MockSimulator {
    fn find_actor(&mut self, filter: &str, role_name: &str) -> Result<ActorId, SimError> {
        if filter.is_empty() {
            return Err(SimError::NoSuchActor {
                filter: filter.to_string(),
                role: role_name.to_string(),
            });
        }
        Ok(ActorId(1))
    }

    fn actor_info(&mut self, _actor: ActorId) -> Result<ActorInfo, SimError> {
        Ok(self.info.clone())
    }

    fn actor_telemetry(&mut self, _actor: ActorId) -> Result<TelemetrySample, SimError> {
        Ok(self.telemetry.clone())
    }

    fn apply_control(&mut self, actor: ActorId, command: &ControlCommand) -> Result<(), SimError> {
        self.calls.push(MockCall::ApplyControl(actor, *command));
        Ok(())
    }

    fn set_autopilot(&mut self, actor: ActorId, enabled: bool) -> Result<(), SimError> {
        self.calls.push(MockCall::SetAutopilot(actor, enabled));
        Ok(())
    }

    fn set_light_state(&mut self, actor: ActorId, lights: LightState) -> Result<(), SimError> {
        self.calls.push(MockCall::SetLightState(actor, lights));
        Ok(())
    }

    fn set_constant_velocity(
        &mut self,
        actor: ActorId,
        velocity: Option<Vec3>,
    ) -> Result<(), SimError> {
        self.calls
            .push(MockCall::SetConstantVelocity(actor, velocity));
        Ok(())
    }

    fn enable_carsim(&mut self, actor: ActorId, simfile: &str) -> Result<(), SimError> {
        self.calls
            .push(MockCall::EnableCarsim(actor, simfile.to_string()));
        Ok(())
    }

    fn use_carsim_road(&mut self, actor: ActorId, enabled: bool) -> Result<(), SimError> {
        self.calls.push(MockCall::UseCarsimRoad(actor, enabled));
        Ok(())
    }

    fn next_map_layer(&mut self, reverse: bool) -> Result<String, SimError> {
        self.calls.push(MockCall::NextMapLayer(reverse));
        Ok("Buildings".to_string())
    }

    fn load_map_layer(&mut self, unload: bool) -> Result<String, SimError> {
        self.calls.push(MockCall::LoadMapLayer(unload));
        Ok("Buildings".to_string())
    }

    fn restart_actor(&mut self, actor: ActorId) -> Result<ActorId, SimError> {
        self.calls.push(MockCall::RestartActor(actor));
        self.next_actor += 1;
        Ok(ActorId(self.next_actor))
    }

    fn set_radar_visualization(&mut self, enabled: bool) -> Result<(), SimError> {
        self.calls.push(MockCall::SetRadarVisualization(enabled));
        Ok(())
    }

    fn start_recorder(&mut self, path: &str) -> Result<(), SimError> {
        self.calls.push(MockCall::StartRecorder(path.to_string()));
        Ok(())
    }

    fn stop_recorder(&mut self) -> Result<(), SimError> {
        self.calls.push(MockCall::StopRecorder);
        Ok(())
    }

    fn replay_file(&mut self, path: &str, start: i32, actor: ActorId) -> Result<(), SimError> {
        self.calls
            .push(MockCall::ReplayFile(path.to_string(), start, actor));
        Ok(())
    }

    fn spawn_camera(
        &mut self,
        parent: ActorId,
        _transform: Transform,
        _attachment: Attachment,
        _gamma: f32,
        _width: u32,
        _height: u32,
        handler: FrameHandler,
    ) -> Result<ActorId, SimError> {
        self.calls.push(MockCall::SpawnCamera(parent));
        self.next_actor += 1;
        let sensor = ActorId(self.next_actor);
        self.handlers.insert(sensor, handler);
        Ok(sensor)
    }

    fn destroy_actor(&mut self, actor: ActorId) -> Result<(), SimError> {
        self.handlers.remove(&actor);
        self.calls.push(MockCall::DestroyActor(actor));
        Ok(())
    }

    fn tick(&mut self) -> Result<u64, SimError> {
        self.calls.push(MockCall::Tick);
        self.frame += 1;
        Ok(self.frame)
    }

    fn server_fps(&self) -> f32 {
        60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_in_order() {
        let mut sim = MockSimulator::vehicle();
        let actor = sim.find_actor("vehicle.*", "hero").unwrap();
        sim.set_autopilot(actor, true).unwrap();
        sim.tick().unwrap();
        assert_eq!(
            sim.calls,
            vec![MockCall::SetAutopilot(actor, true), MockCall::Tick]
        );
    }

    #[test]
    fn spawned_camera_receives_emitted_frames() {
        let mut sim = MockSimulator::vehicle();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(0u64));
        let sink = seen.clone();
        let sensor = sim
            .spawn_camera(
                ActorId(1),
                Transform::default(),
                Attachment::Rigid,
                2.2,
                4,
                4,
                Box::new(move |f| *sink.lock().unwrap() = f.frame),
            )
            .unwrap();
        sim.emit_frame(
            sensor,
            CameraFrame {
                frame: 99,
                width: 4,
                height: 4,
                rgba: vec![0; 64],
            },
        );
        assert_eq!(*seen.lock().unwrap(), 99);
    }

    #[test]
    fn destroy_deregisters_handler() {
        let mut sim = MockSimulator::vehicle();
        let sensor = sim
            .spawn_camera(
                ActorId(1),
                Transform::default(),
                Attachment::Rigid,
                2.2,
                4,
                4,
                Box::new(|_| {}),
            )
            .unwrap();
        assert!(sim.has_handler(sensor));
        sim.destroy_actor(sensor).unwrap();
        assert!(!sim.has_handler(sensor));
    }
}
