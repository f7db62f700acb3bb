//! Live connection to the simulator.
//!
//! The link is a synchronous command channel: one request line out, one
//! reply line back, with camera frames interleaved as pushed events. The
//! connection attempt is the only call with a timeout; once established,
//! a stalled server stalls the caller.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};

use drivekit_common::{ActorId, Attachment, ControlCommand, LightState, Transform};
use glam::Vec3;
use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::proto::{SimRequest, SimResponse};
use crate::{ActorInfo, CameraFrame, FrameHandler, SimError, SimulatorClient, TelemetrySample};

/// Simulator client over a TCP command channel.
pub struct ServerLink {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    /// Frame handlers keyed by sensor id; removed on destroy.
    handlers: HashMap<ActorId, FrameHandler>,
    server_fps: f32,
    line: String,
}

impl std::fmt::Debug for ServerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerLink")
            .field("server_fps", &self.server_fps)
            .finish_non_exhaustive()
    }
}

impl ServerLink {
    /// Connects with the configured timeout. Failure here is fatal to the
    /// client; there is no retry.
    pub fn connect(cfg: &SimConfig) -> Result<Self, SimError> {
        let addr = cfg.addr();
        let resolved = addr
            .to_socket_addrs()
            .map_err(|source| SimError::Connect {
                addr: addr.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| SimError::Connect {
                addr: addr.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved"),
            })?;

        let stream = TcpStream::connect_timeout(&resolved, cfg.connect_timeout).map_err(
            |source| SimError::Connect {
                addr: addr.clone(),
                source,
            },
        )?;
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);

        info!(%addr, "connected to simulator");
        Ok(Self {
            reader,
            writer: stream,
            handlers: HashMap::new(),
            server_fps: 0.0,
            line: String::new(),
        })
    }

    /// Sends one request and blocks until its reply arrives, dispatching
    /// any camera frames pushed in between.
    fn request(&mut self, req: &SimRequest) -> Result<SimResponse, SimError> {
        let mut encoded = serde_json::to_string(req)?;
        encoded.push('\n');
        self.writer.write_all(encoded.as_bytes())?;
        self.writer.flush()?;

        loop {
            self.line.clear();
            let n = self.reader.read_line(&mut self.line)?;
            if n == 0 {
                return Err(SimError::Disconnected);
            }
            let resp: SimResponse = serde_json::from_str(self.line.trim_end())?;
            match resp {
                SimResponse::CameraFrame {
                    sensor,
                    frame,
                    width,
                    height,
                    rgba,
                } => self.dispatch_frame(sensor, frame, width, height, rgba),
                SimResponse::Error { message } => return Err(SimError::Rejected(message)),
                other => return Ok(other),
            }
        }
    }

    fn dispatch_frame(&mut self, sensor: ActorId, frame: u64, width: u32, height: u32, rgba: Vec<u8>) {
        match self.handlers.get_mut(&sensor) {
            Some(handler) => handler(CameraFrame {
                frame,
                width,
                height,
                rgba,
            }),
            None => debug!(%sensor, frame, "dropping frame for unregistered sensor"),
        }
    }

    fn expect_ok(&mut self, req: &SimRequest) -> Result<(), SimError> {
        match self.request(req)? {
            SimResponse::Ok => Ok(()),
            other => {
                warn!(?other, "expected plain ack");
                Ok(())
            }
        }
    }
}

impl SimulatorClient for ServerLink {
    fn find_actor(&mut self, filter: &str, role_name: &str) -> Result<ActorId, SimError> {
        let req = SimRequest::FindActor {
            filter: filter.to_string(),
            role_name: role_name.to_string(),
        };
        match self.request(&req) {
            Ok(SimResponse::Actor { actor }) => Ok(actor),
            Ok(_) | Err(SimError::Rejected(_)) => Err(SimError::NoSuchActor {
                filter: filter.to_string(),
                role: role_name.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    fn actor_info(&mut self, actor: ActorId) -> Result<ActorInfo, SimError> {
        match self.request(&SimRequest::ActorInfo { actor })? {
            SimResponse::Info(info) => Ok(info),
            other => Err(SimError::Rejected(format!("unexpected reply {other:?}"))),
        }
    }

    fn actor_telemetry(&mut self, actor: ActorId) -> Result<TelemetrySample, SimError> {
        match self.request(&SimRequest::ActorTelemetry { actor })? {
            SimResponse::Telemetry(sample) => Ok(sample),
            other => Err(SimError::Rejected(format!("unexpected reply {other:?}"))),
        }
    }

    fn apply_control(&mut self, actor: ActorId, command: &ControlCommand) -> Result<(), SimError> {
        self.expect_ok(&SimRequest::ApplyControl {
            actor,
            command: *command,
        })
    }

    fn set_autopilot(&mut self, actor: ActorId, enabled: bool) -> Result<(), SimError> {
        self.expect_ok(&SimRequest::SetAutopilot { actor, enabled })
    }

    fn set_light_state(&mut self, actor: ActorId, lights: LightState) -> Result<(), SimError> {
        self.expect_ok(&SimRequest::SetLightState {
            actor,
            lights: lights.bits(),
        })
    }

    fn set_constant_velocity(
        &mut self,
        actor: ActorId,
        velocity: Option<Vec3>,
    ) -> Result<(), SimError> {
        self.expect_ok(&SimRequest::SetConstantVelocity {
            actor,
            velocity: velocity.map(|v| [v.x, v.y, v.z]),
        })
    }

    fn enable_carsim(&mut self, actor: ActorId, simfile: &str) -> Result<(), SimError> {
        self.expect_ok(&SimRequest::EnableCarsim {
            actor,
            simfile: simfile.to_string(),
        })
    }

    fn use_carsim_road(&mut self, actor: ActorId, enabled: bool) -> Result<(), SimError> {
        self.expect_ok(&SimRequest::UseCarsimRoad { actor, enabled })
    }

    fn next_map_layer(&mut self, reverse: bool) -> Result<String, SimError> {
        match self.request(&SimRequest::NextMapLayer { reverse })? {
            SimResponse::Layer { name } => Ok(name),
            other => Err(SimError::Rejected(format!("unexpected reply {other:?}"))),
        }
    }

    fn load_map_layer(&mut self, unload: bool) -> Result<String, SimError> {
        match self.request(&SimRequest::LoadMapLayer { unload })? {
            SimResponse::Layer { name } => Ok(name),
            other => Err(SimError::Rejected(format!("unexpected reply {other:?}"))),
        }
    }

    fn restart_actor(&mut self, actor: ActorId) -> Result<ActorId, SimError> {
        match self.request(&SimRequest::RestartActor { actor })? {
            SimResponse::Actor { actor } => Ok(actor),
            other => Err(SimError::Rejected(format!("unexpected reply {other:?}"))),
        }
    }

    fn set_radar_visualization(&mut self, enabled: bool) -> Result<(), SimError> {
        self.expect_ok(&SimRequest::SetRadarVisualization { enabled })
    }

    fn start_recorder(&mut self, path: &str) -> Result<(), SimError> {
        self.expect_ok(&SimRequest::StartRecorder {
            path: path.to_string(),
        })
    }

    fn stop_recorder(&mut self) -> Result<(), SimError> {
        self.expect_ok(&SimRequest::StopRecorder)
    }

    fn replay_file(&mut self, path: &str, start: i32, actor: ActorId) -> Result<(), SimError> {
        self.expect_ok(&SimRequest::ReplayFile {
            path: path.to_string(),
            start,
            follow: actor,
        })
    }

    fn spawn_camera(
        &mut self,
        parent: ActorId,
        transform: Transform,
        attachment: Attachment,
        gamma: f32,
        width: u32,
        height: u32,
        handler: FrameHandler,
    ) -> Result<ActorId, SimError> {
        let req = SimRequest::SpawnCamera {
            parent,
            transform,
            attachment,
            gamma,
            width,
            height,
        };
        match self.request(&req)? {
            SimResponse::Actor { actor } => {
                self.handlers.insert(actor, handler);
                debug!(sensor = %actor, "camera spawned");
                Ok(actor)
            }
            other => Err(SimError::Rejected(format!("unexpected reply {other:?}"))),
        }
    }

    fn destroy_actor(&mut self, actor: ActorId) -> Result<(), SimError> {
        self.handlers.remove(&actor);
        self.expect_ok(&SimRequest::DestroyActor { actor })
    }

    fn tick(&mut self) -> Result<u64, SimError> {
        match self.request(&SimRequest::Tick)? {
            SimResponse::Ticked { frame, server_fps } => {
                self.server_fps = server_fps;
                Ok(frame)
            }
            other => Err(SimError::Rejected(format!("unexpected reply {other:?}"))),
        }
    }

    fn server_fps(&self) -> f32 {
        self.server_fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::time::Duration;

    /// One-shot scripted server: reads request lines, replies from a list.
    fn scripted_server(replies: Vec<String>) -> (SimConfig, std::thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut stream = stream;
            let mut seen = Vec::new();
            for reply in replies {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 {
                    break;
                }
                seen.push(line.trim_end().to_string());
                stream.write_all(reply.as_bytes()).unwrap();
                stream.write_all(b"\n").unwrap();
            }
            seen
        });
        (SimConfig::new("127.0.0.1", port), handle)
    }

    #[test]
    fn connect_to_unreachable_port_fails_fast() {
        // A port nothing listens on; the loopback refuses immediately.
        let cfg = SimConfig {
            connect_timeout: Duration::from_millis(200),
            ..SimConfig::new("127.0.0.1", 1)
        };
        let err = ServerLink::connect(&cfg).unwrap_err();
        assert!(matches!(err, SimError::Connect { .. }));
    }

    #[test]
    fn tick_roundtrip_updates_server_fps() {
        let (cfg, server) = scripted_server(vec![
            r#"{"msg":"ticked","frame":41,"server_fps":30.0}"#.to_string(),
        ]);
        let mut link = ServerLink::connect(&cfg).unwrap();
        let frame = link.tick().unwrap();
        assert_eq!(frame, 41);
        assert_eq!(link.server_fps(), 30.0);
        let seen = server.join().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("\"op\":\"tick\""));
    }

    #[test]
    fn rejected_request_surfaces_server_message() {
        let (cfg, server) = scripted_server(vec![
            r#"{"msg":"error","message":"unknown layer"}"#.to_string(),
        ]);
        let mut link = ServerLink::connect(&cfg).unwrap();
        let err = link.next_map_layer(false).unwrap_err();
        assert!(matches!(err, SimError::Rejected(m) if m == "unknown layer"));
        server.join().unwrap();
    }

    #[test]
    fn pushed_frames_reach_the_registered_handler() {
        let frame_reply = r#"{"msg":"camera_frame","sensor":9,"frame":5,"width":2,"height":1,"rgba":[0,0,0,255,255,255,255,255]}"#;
        let (cfg, server) = scripted_server(vec![
            r#"{"msg":"actor","actor":9}"#.to_string(),
            // Pushed frame arrives before the tick reply on the same stream.
            format!("{frame_reply}\n{}", r#"{"msg":"ticked","frame":1,"server_fps":60.0}"#),
        ]);
        let mut link = ServerLink::connect(&cfg).unwrap();

        let got = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = got.clone();
        let sensor = link
            .spawn_camera(
                ActorId(1),
                Transform::default(),
                Attachment::SpringArm,
                2.2,
                2,
                1,
                Box::new(move |f: CameraFrame| sink.lock().unwrap().push(f.frame)),
            )
            .unwrap();
        assert_eq!(sensor, ActorId(9));

        link.tick().unwrap();
        assert_eq!(*got.lock().unwrap(), vec![5]);
        server.join().unwrap();
    }
}
