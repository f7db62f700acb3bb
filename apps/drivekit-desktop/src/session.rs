//! A driving session against one simulator connection.
//!
//! `Session` owns the controlled actor, the input mapper, the HUD state,
//! and the camera rig, and routes discrete key actions to simulator
//! calls. It is generic over [`SimulatorClient`] so the whole action
//! surface is testable against `MockSimulator`.

use anyhow::{Context, Result};
use drivekit_camera::CameraManager;
use drivekit_common::lights::LightState;
use drivekit_common::types::Telemetry;
use drivekit_common::ActorId;
use drivekit_control::{dispatch, Action, InputMapper, Key, KeySet, LightToggle};
use drivekit_hud::Hud;
use drivekit_sim::{CameraFrame, SimulatorClient};
use glam::Vec3;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Server-side recorder output, fixed by convention.
const RECORDER_FILE: &str = "manual_recording.rec";
/// CarSim vehicle dynamics definition shipped alongside the simulator.
const CARSIM_FILE: &str = "ue4simfile.sim";
/// 60 km/h, applied along the actor's forward axis.
const CONSTANT_VELOCITY: Vec3 = Vec3::new(17.0, 0.0, 0.0);

/// Startup knobs taken from the command line.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub filter: String,
    pub rolename: String,
    pub width: u32,
    pub height: u32,
    pub gamma: f32,
    pub autopilot: bool,
}

/// Whether the run loop should keep going after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Quit,
}

pub struct Session<S: SimulatorClient> {
    sim: S,
    player: ActorId,
    mapper: InputMapper,
    pub hud: Hud,
    camera: CameraManager,
    keys: KeySet,
    telemetry: Telemetry,
    radar_on: bool,
    recorder_on: bool,
    constant_velocity_on: bool,
    carsim_road: bool,
    replay_start: i32,
    last_frame: Instant,
    /// Raised by the process signal handler; checked every frame so an
    /// interrupt still goes through the orderly shutdown path.
    interrupt: Arc<AtomicBool>,
    finished: bool,
}

impl<S: SimulatorClient> Session<S> {
    /// Connects the session to its actor and brings up the camera rig.
    pub fn start(mut sim: S, opts: &SessionOptions) -> Result<Self> {
        let player = sim
            .find_actor(&opts.filter, &opts.rolename)
            .with_context(|| {
                format!(
                    "no controllable actor for filter '{}' role '{}'",
                    opts.filter, opts.rolename
                )
            })?;
        let info = sim.actor_info(player)?;
        let sample = sim.actor_telemetry(player)?;
        tracing::info!(%player, name = %info.display_name, "controlling actor");

        let mapper = InputMapper::new(info.capability, opts.autopilot, sample.transform.rotation)?;
        if mapper.is_vehicle() {
            sim.set_autopilot(player, opts.autopilot)?;
            sim.set_light_state(player, LightState::NONE)?;
        }

        let mut camera =
            CameraManager::new(player, info.half_width, opts.width, opts.height, opts.gamma);
        camera.respawn(&mut sim)?;

        let mut hud = Hud::new(opts.width, opts.height);
        hud.notify_for("Press 'H' or '?' for help.", 4.0);

        let telemetry = Telemetry {
            server_fps: sim.server_fps(),
            client_fps: 0.0,
            actor_name: info.display_name,
            map_name: sample.map_name,
            velocity: sample.velocity,
            transform: sample.transform,
        };

        Ok(Self {
            sim,
            player,
            mapper,
            hud,
            camera,
            keys: KeySet::new(),
            telemetry,
            radar_on: false,
            recorder_on: false,
            constant_velocity_on: false,
            carsim_road: false,
            replay_start: 0,
            last_frame: Instant::now(),
            interrupt: Arc::new(AtomicBool::new(false)),
            finished: false,
        })
    }

    /// Shared flag for a signal handler to request session teardown.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn mapper(&self) -> &InputMapper {
        &self.mapper
    }

    /// Clones out the most recent camera frame, if any arrived yet.
    pub fn take_frame(&self) -> Option<CameraFrame> {
        let surface = self.camera.surface();
        let guard = surface.lock().expect("frame surface poisoned");
        guard.latest().cloned()
    }

    pub fn key_pressed(&mut self, key: Key) {
        self.keys.press(key);
    }

    /// Releases a key and fires its bound action, if any.
    pub fn key_released(&mut self, key: Key) -> Result<LoopControl> {
        let mods = self.keys.mods();
        self.keys.release(key);
        match dispatch(key, mods) {
            Some(action) => self.apply(action),
            None => Ok(LoopControl::Continue),
        }
    }

    /// Routes one discrete action to the mapper, HUD, camera, or server.
    pub fn apply(&mut self, action: Action) -> Result<LoopControl> {
        match action {
            Action::Quit => return Ok(LoopControl::Quit),
            Action::RestartActor => self.restart_actor()?,
            Action::ToggleHudInfo => self.hud.toggle_info(),
            Action::ToggleHelp => self.hud.help.toggle(),
            Action::NextCameraTransform => self.camera.toggle_camera(&mut self.sim)?,
            Action::NextSensor => {
                self.camera.next_sensor(&mut self.sim)?;
                if let Some(name) = self.camera.sensor_name() {
                    self.hud.notify(name);
                }
            }
            Action::SetSensor(index) => {
                self.camera.set_sensor(&mut self.sim, index)?;
                if let Some(name) = self.camera.sensor_name() {
                    self.hud.notify(name);
                }
            }
            Action::ToggleRadar => {
                self.radar_on = !self.radar_on;
                self.sim.set_radar_visualization(self.radar_on)?;
            }
            Action::NextMapLayer { reverse } => {
                let layer = self.sim.next_map_layer(reverse)?;
                self.hud.notify(format!("LayerMap selected: {layer}"));
            }
            Action::LoadMapLayer { unload } => {
                let layer = self.sim.load_map_layer(unload)?;
                if unload {
                    self.hud.notify(format!("Unloading map layer: {layer}"));
                } else {
                    self.hud.notify(format!("Loading map layer: {layer}"));
                }
            }
            Action::ToggleFrameRecording => {
                let on = self.camera.toggle_recording();
                self.hud
                    .notify(format!("Recording {}", if on { "On" } else { "Off" }));
            }
            Action::ToggleServerRecorder => {
                if self.recorder_on {
                    self.sim.stop_recorder()?;
                    self.hud.notify("Recorder is OFF");
                } else {
                    self.sim.start_recorder(RECORDER_FILE)?;
                    self.hud.notify("Recorder is ON");
                }
                self.recorder_on = !self.recorder_on;
            }
            Action::ReplayRecording => self.replay_recording()?,
            Action::AdjustReplayStart(delta) => {
                self.replay_start += delta;
                self.hud
                    .notify(format!("Recording start time is {}", self.replay_start));
            }
            Action::ToggleConstantVelocity => {
                if self.constant_velocity_on {
                    self.sim.set_constant_velocity(self.player, None)?;
                    self.hud.notify("Disabled Constant Velocity Mode");
                } else {
                    self.sim
                        .set_constant_velocity(self.player, Some(CONSTANT_VELOCITY))?;
                    self.hud.notify("Enabled Constant Velocity Mode at 60 km/h");
                }
                self.constant_velocity_on = !self.constant_velocity_on;
            }
            Action::EnableCarsim => {
                self.sim.enable_carsim(self.player, CARSIM_FILE)?;
                self.hud.notify("Enabled CarSim physics");
            }
            Action::ToggleCarsimRoad => {
                self.carsim_road = !self.carsim_road;
                self.sim.use_carsim_road(self.player, self.carsim_road)?;
                tracing::info!(enabled = self.carsim_road, "carsim road definition");
            }
            Action::ToggleReverse => self.mapper.toggle_reverse(),
            Action::ToggleManualShift => {
                let gear = self.sim.actor_info(self.player)?.gear;
                if let Some(manual) = self.mapper.toggle_manual_shift(gear) {
                    self.hud.notify(format!(
                        "{} Transmission",
                        if manual { "Manual" } else { "Automatic" }
                    ));
                }
            }
            Action::GearUp => self.mapper.gear_up(),
            Action::GearDown => self.mapper.gear_down(),
            Action::ToggleAutopilot => {
                if let Some(enabled) = self.mapper.toggle_autopilot() {
                    self.sim.set_autopilot(self.player, enabled)?;
                    self.hud
                        .notify(format!("Autopilot {}", if enabled { "On" } else { "Off" }));
                }
            }
            Action::Light(toggle) => {
                self.mapper.toggle_light(toggle);
                self.hud.notify(light_label(toggle));
            }
        }
        Ok(LoopControl::Continue)
    }

    /// Despawns and respawns the controlled actor, carrying the camera rig
    /// and autopilot engagement over to the new handle.
    fn restart_actor(&mut self) -> Result<()> {
        let autopilot = self.mapper.autopilot_enabled();
        if autopilot {
            self.sim.set_autopilot(self.player, false)?;
        }
        self.camera.destroy(&mut self.sim)?;
        self.player = self.sim.restart_actor(self.player)?;
        tracing::info!(player = %self.player, "actor restarted");

        let info = self.sim.actor_info(self.player)?;
        let sample = self.sim.actor_telemetry(self.player)?;
        self.mapper = InputMapper::new(info.capability, autopilot, sample.transform.rotation)?;
        if self.mapper.is_vehicle() {
            self.sim.set_autopilot(self.player, autopilot)?;
            self.sim.set_light_state(self.player, LightState::NONE)?;
        }
        self.telemetry.actor_name = info.display_name;
        self.camera.retarget(&mut self.sim, self.player)?;
        Ok(())
    }

    /// Stops the recorder and hands the actor to the replayer. The camera
    /// is torn down and respawned because replay swaps the actor out from
    /// under attached sensors.
    fn replay_recording(&mut self) -> Result<()> {
        let sensor_index = self.camera.sensor_index();
        self.sim.stop_recorder()?;
        self.recorder_on = false;
        self.camera.destroy(&mut self.sim)?;
        self.mapper.disable_autopilot();
        self.sim.set_autopilot(self.player, false)?;
        self.hud
            .notify(format!("Replaying file '{RECORDER_FILE}'"));
        self.sim
            .replay_file(RECORDER_FILE, self.replay_start, self.player)?;
        self.camera.set_sensor(&mut self.sim, sensor_index)?;
        Ok(())
    }

    /// Runs one simulation step: mapped controls out, telemetry back.
    ///
    /// Returns `Quit` (after an orderly shutdown) when the interrupt flag
    /// was raised since the last frame.
    pub fn frame(&mut self) -> Result<LoopControl> {
        if self.interrupt.load(Ordering::Relaxed) {
            tracing::info!("interrupted, shutting down");
            self.shutdown();
            return Ok(LoopControl::Quit);
        }

        let now = Instant::now();
        let elapsed = now - self.last_frame;
        self.last_frame = now;
        let elapsed_ms = elapsed.as_secs_f32() * 1000.0;

        if let Some(mapped) = self.mapper.map_frame(&self.keys, elapsed_ms) {
            self.sim.apply_control(self.player, &mapped.command)?;
            if let Some(word) = mapped.lights {
                self.sim.set_light_state(self.player, word)?;
            }
        }
        self.sim.tick()?;

        let sample = self.sim.actor_telemetry(self.player)?;
        self.telemetry.server_fps = self.sim.server_fps();
        self.telemetry.client_fps = if elapsed > Duration::ZERO {
            1.0 / elapsed.as_secs_f32()
        } else {
            0.0
        };
        self.telemetry.velocity = sample.velocity;
        self.telemetry.transform = sample.transform;
        self.telemetry.map_name = sample.map_name;

        self.hud.tick(elapsed.as_secs_f32());
        Ok(LoopControl::Continue)
    }

    /// Tears down everything the session owns on the server. Safe to call
    /// more than once.
    pub fn shutdown(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if self.recorder_on {
            if let Err(e) = self.sim.stop_recorder() {
                tracing::warn!("failed to stop recorder: {e}");
            }
        }
        if let Err(e) = self.camera.destroy(&mut self.sim) {
            tracing::warn!("failed to destroy camera: {e}");
        }
        if let Err(e) = self.sim.destroy_actor(self.player) {
            tracing::warn!("failed to destroy actor: {e}");
        }
        tracing::info!("session closed");
    }
}

impl<S: SimulatorClient> Drop for Session<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn light_label(toggle: LightToggle) -> &'static str {
    match toggle {
        LightToggle::NextGroup => "Cycled light group",
        LightToggle::HighBeam => "High beam",
        LightToggle::LeftBlinker => "Left blinker",
        LightToggle::RightBlinker => "Right blinker",
        LightToggle::Interior => "Interior light",
        LightToggle::Special1 => "Special light 1",
    }
}

/// Busy-wait pacer pinning the loop to a fixed frame rate.
pub struct FrameClock {
    period: Duration,
    last: Instant,
}

impl FrameClock {
    pub fn new(hz: u32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / hz as f64),
            last: Instant::now(),
        }
    }

    /// Spins until the next frame boundary and returns the time consumed
    /// by the frame that just ended.
    pub fn tick(&mut self) -> Duration {
        let deadline = self.last + self.period;
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
        let now = Instant::now();
        let elapsed = now - self.last;
        self.last = now;
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivekit_sim::{MockCall, MockSimulator};

    fn vehicle_session() -> Session<MockSimulator> {
        Session::start(MockSimulator::vehicle(), &options(false)).unwrap()
    }

    fn options(autopilot: bool) -> SessionOptions {
        SessionOptions {
            filter: "vehicle.*".into(),
            rolename: "hero".into(),
            width: 1280,
            height: 720,
            gamma: 2.2,
            autopilot,
        }
    }

    #[test]
    fn startup_clears_lights_and_spawns_camera() {
        let session = vehicle_session();
        assert_eq!(session.sim.last_lights(), Some(LightState::NONE));
        assert_eq!(session.sim.handler_count(), 1);
    }

    #[test]
    fn autopilot_flag_reaches_the_server_at_startup() {
        let session = Session::start(MockSimulator::vehicle(), &options(true)).unwrap();
        assert!(session
            .sim
            .calls
            .iter()
            .any(|c| matches!(c, MockCall::SetAutopilot(_, true))));
    }

    #[test]
    fn recorder_toggle_round_trips() {
        let mut session = vehicle_session();
        session.apply(Action::ToggleServerRecorder).unwrap();
        assert_eq!(session.hud.notification.visible(), Some("Recorder is ON"));
        session.apply(Action::ToggleServerRecorder).unwrap();
        assert_eq!(session.hud.notification.visible(), Some("Recorder is OFF"));
        assert!(session
            .sim
            .calls
            .iter()
            .any(|c| matches!(c, MockCall::StopRecorder)));
    }

    #[test]
    fn replay_disables_autopilot_and_restores_the_sensor() {
        let mut session = Session::start(MockSimulator::vehicle(), &options(true)).unwrap();
        session.apply(Action::ReplayRecording).unwrap();
        assert!(!session.mapper.autopilot_enabled());
        assert!(session
            .sim
            .calls
            .iter()
            .any(|c| matches!(c, MockCall::ReplayFile(_, 0, _))));
        // camera came back after the replay teardown
        assert_eq!(session.sim.handler_count(), 1);
    }

    #[test]
    fn replay_start_offset_is_cumulative() {
        let mut session = vehicle_session();
        session.apply(Action::AdjustReplayStart(10)).unwrap();
        session.apply(Action::AdjustReplayStart(-1)).unwrap();
        session.apply(Action::ReplayRecording).unwrap();
        assert!(session
            .sim
            .calls
            .iter()
            .any(|c| matches!(c, MockCall::ReplayFile(_, 9, _))));
    }

    #[test]
    fn quit_action_stops_the_loop() {
        let mut session = vehicle_session();
        assert_eq!(session.apply(Action::Quit).unwrap(), LoopControl::Quit);
    }

    #[test]
    fn restart_preserves_autopilot_engagement() {
        let mut session = Session::start(MockSimulator::vehicle(), &options(true)).unwrap();
        session.apply(Action::RestartActor).unwrap();
        assert!(session.mapper.autopilot_enabled());
        let reenabled = session
            .sim
            .calls
            .iter()
            .rev()
            .find_map(|c| match c {
                MockCall::SetAutopilot(_, enabled) => Some(*enabled),
                _ => None,
            })
            .unwrap();
        assert!(reenabled);
    }

    #[test]
    fn key_release_dispatches_with_held_modifiers() {
        let mut session = vehicle_session();
        session.key_pressed(Key::Ctrl);
        session.key_pressed(Key::Minus);
        session.key_released(Key::Minus).unwrap();
        assert_eq!(
            session.hud.notification.visible(),
            Some("Recording start time is -1")
        );
    }

    #[test]
    fn frame_pushes_controls_and_refreshes_telemetry() {
        let mut session = vehicle_session();
        session.key_pressed(Key::W);
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(session.frame().unwrap(), LoopControl::Continue);
        let control = session.sim.last_control().unwrap();
        let vehicle = control.as_vehicle().unwrap();
        assert!(vehicle.throttle > 0.0);
        assert!(session.telemetry.client_fps > 0.0);
    }

    #[test]
    fn raised_interrupt_flag_shuts_the_session_down() {
        let mut session = vehicle_session();
        session.apply(Action::ToggleServerRecorder).unwrap();
        session.interrupt_flag().store(true, Ordering::Relaxed);
        assert_eq!(session.frame().unwrap(), LoopControl::Quit);
        assert!(session
            .sim
            .calls
            .iter()
            .any(|c| matches!(c, MockCall::StopRecorder)));
        assert_eq!(session.sim.handler_count(), 0);
    }

    #[test]
    fn shutdown_is_idempotent_and_releases_server_state() {
        let mut session = vehicle_session();
        session.apply(Action::ToggleServerRecorder).unwrap();
        session.shutdown();
        session.shutdown();
        let stops = session
            .sim
            .calls
            .iter()
            .filter(|c| matches!(c, MockCall::StopRecorder))
            .count();
        assert_eq!(stops, 1);
        assert_eq!(session.sim.handler_count(), 0);
    }

    #[test]
    fn frame_clock_paces_to_the_requested_rate() {
        let mut clock = FrameClock::new(240);
        clock.tick();
        let elapsed = clock.tick();
        assert!(elapsed >= Duration::from_secs_f64(1.0 / 240.0));
    }
}
