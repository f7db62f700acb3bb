//! Wire messages for the simulator command link.
//!
//! The full simulator protocol belongs to the server's own client library;
//! this is only the thin command channel the driving client needs, encoded
//! as newline-delimited JSON.

use drivekit_common::{ActorId, Attachment, ControlCommand, Transform};
use serde::{Deserialize, Serialize};

use crate::{ActorInfo, TelemetrySample};

/// Client-to-server command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SimRequest {
    FindActor {
        filter: String,
        role_name: String,
    },
    ActorInfo {
        actor: ActorId,
    },
    ActorTelemetry {
        actor: ActorId,
    },
    ApplyControl {
        actor: ActorId,
        command: ControlCommand,
    },
    SetAutopilot {
        actor: ActorId,
        enabled: bool,
    },
    SetLightState {
        actor: ActorId,
        /// Raw light word bits.
        lights: u32,
    },
    SetConstantVelocity {
        actor: ActorId,
        velocity: Option<[f32; 3]>,
    },
    EnableCarsim {
        actor: ActorId,
        simfile: String,
    },
    UseCarsimRoad {
        actor: ActorId,
        enabled: bool,
    },
    NextMapLayer {
        reverse: bool,
    },
    LoadMapLayer {
        unload: bool,
    },
    RestartActor {
        actor: ActorId,
    },
    SetRadarVisualization {
        enabled: bool,
    },
    StartRecorder {
        path: String,
    },
    StopRecorder,
    ReplayFile {
        path: String,
        start: i32,
        follow: ActorId,
    },
    SpawnCamera {
        parent: ActorId,
        transform: Transform,
        attachment: Attachment,
        gamma: f32,
        width: u32,
        height: u32,
    },
    DestroyActor {
        actor: ActorId,
    },
    Tick,
}

/// Server-to-client reply or pushed event.
///
/// `CameraFrame` messages may arrive ahead of the reply a request is
/// waiting for; the link dispatches them to sensor handlers in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum SimResponse {
    Ok,
    Actor {
        actor: ActorId,
    },
    Info(ActorInfo),
    Telemetry(TelemetrySample),
    Layer {
        name: String,
    },
    Ticked {
        frame: u64,
        server_fps: f32,
    },
    CameraFrame {
        sensor: ActorId,
        frame: u64,
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    },
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_roundtrips_through_json() {
        let req = SimRequest::SetLightState {
            actor: ActorId(7),
            lights: 0x48,
        };
        let line = serde_json::to_string(&req).unwrap();
        assert!(line.contains("set_light_state"));
        let back: SimRequest = serde_json::from_str(&line).unwrap();
        match back {
            SimRequest::SetLightState { actor, lights } => {
                assert_eq!(actor, ActorId(7));
                assert_eq!(lights, 0x48);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn error_reply_carries_message() {
        let line = r#"{"msg":"error","message":"no such actor"}"#;
        let resp: SimResponse = serde_json::from_str(line).unwrap();
        assert!(matches!(resp, SimResponse::Error { message } if message == "no such actor"));
    }
}
