use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{Axis, Direction, OperatingMode, TurnAction, Vector},
    error::{ApiError, ProtocolError},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidParams {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Target distance to the right wall in cm.
    pub setpoint: f64,
    pub base_speed: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectLists {
    #[serde(default)]
    pub list_a: Vec<String>,
    #[serde(default)]
    pub list_b: Vec<String>,
}

/// Commands sent from the operator client to the robot.
///
/// Framed as `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    Joystick {
        x: Axis,
        y: Axis,
    },
    Turn {
        direction: Direction,
        action: TurnAction,
    },
    ChangeMode {
        mode: OperatingMode,
    },
    ToggleAuto {
        active: bool,
    },
    ToggleRecording {
        active: bool,
    },
    ToggleCamera {
        enabled: bool,
    },
    SetObjectLists(ObjectLists),
    #[serde(rename = "override_th")]
    OverrideThreshold {
        threshold: f64,
    },
    SetPidParams(PidParams),
    ConsoleMessage {
        message: String,
    },
}

impl ClientCommand {
    pub fn stop() -> Self {
        Self::motion(Vector::ZERO)
    }

    pub fn motion(vector: Vector) -> Self {
        Self::Joystick {
            x: vector.x,
            y: vector.y,
        }
    }

    pub fn turn_start(direction: Direction) -> Self {
        Self::Turn {
            direction,
            action: TurnAction::Start,
        }
    }

    pub fn turn_stop(direction: Direction) -> Self {
        Self::Turn {
            direction,
            action: TurnAction::Stop,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Joystick { .. } => "joystick",
            Self::Turn { .. } => "turn",
            Self::ChangeMode { .. } => "change_mode",
            Self::ToggleAuto { .. } => "toggle_auto",
            Self::ToggleRecording { .. } => "toggle_recording",
            Self::ToggleCamera { .. } => "toggle_camera",
            Self::SetObjectLists(_) => "set_object_lists",
            Self::OverrideThreshold { .. } => "override_th",
            Self::SetPidParams(_) => "set_pid_params",
            Self::ConsoleMessage { .. } => "console_message",
        }
    }

    /// Motion commands are the ones the robot's watchdog counts as a heartbeat.
    pub fn is_motion(&self) -> bool {
        matches!(self, Self::Joystick { .. } | Self::Turn { .. })
    }

    /// Range checks the type system cannot express.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::OverrideThreshold { threshold } => {
                if !(0.0..=1.0).contains(threshold) {
                    return Err(ProtocolError::OutOfRange {
                        field: "threshold",
                        value: threshold.to_string(),
                    });
                }
            }
            Self::SetPidParams(params) => {
                for (field, value) in [("kp", params.kp), ("ki", params.ki), ("kd", params.kd)] {
                    if !value.is_finite() || value < 0.0 {
                        return Err(ProtocolError::OutOfRange {
                            field,
                            value: value.to_string(),
                        });
                    }
                }
                if !params.setpoint.is_finite() || params.setpoint <= 0.0 {
                    return Err(ProtocolError::OutOfRange {
                        field: "setpoint",
                        value: params.setpoint.to_string(),
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        self.validate()?;
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let command: Self = serde_json::from_str(text)
            .map_err(|err| unknown_mode(text).unwrap_or(ProtocolError::Malformed(err)))?;
        command.validate()?;
        Ok(command)
    }
}

/// Recovers the offending value when a `change_mode` frame names an unknown mode.
fn unknown_mode(text: &str) -> Option<ProtocolError> {
    #[derive(Deserialize)]
    struct ModeFrame {
        event: String,
        data: ModeData,
    }

    #[derive(Deserialize)]
    struct ModeData {
        mode: String,
    }

    let frame: ModeFrame = serde_json::from_str(text).ok()?;
    if frame.event != "change_mode" {
        return None;
    }
    frame.data.mode.parse::<OperatingMode>().err()
}

/// Events pushed from the robot to the operator client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Ultrasonic distances in cm; a sensor that timed out reports a negative value.
    Sensors {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frontal: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        right: Option<f64>,
    },
    Motors {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        left: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        right: Option<i32>,
    },
    Status {
        message: String,
    },
    ModeChanged {
        mode: OperatingMode,
    },
    Detection {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
        timestamp: DateTime<Utc>,
    },
    CameraStatus {
        enabled: bool,
    },
    ObjectLists(ObjectLists),
    PidParams(PidGains),
    AutotuneProgress {
        kp: f64,
        ki: f64,
        kd: f64,
        finished: bool,
        /// Fraction of the relay experiment completed, `0.0..=1.0`.
        progress: f64,
    },
    Error(ApiError),
}

impl ServerEvent {
    pub fn motors(left: i32, right: i32) -> Self {
        Self::Motors {
            left: Some(left),
            right: Some(right),
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}
