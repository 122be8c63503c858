//! Motor model of the reference robot.
//!
//! Commands come in one at a time; every reply is broadcast to all connected
//! operators.

use std::time::Duration;

use shared::{
    domain::{Direction, OperatingMode, TurnAction, Vector, AXIS_LIMIT},
    protocol::{ClientCommand, ObjectLists, PidGains, PidParams, ServerEvent},
};
use tokio::time::Instant;
use tracing::{debug, info};

pub const CONNECT_STATUS: &str = "connected to robot";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveLimits {
    pub max_pwm: i32,
    pub turn_pwm: i32,
}

impl Default for DriveLimits {
    fn default() -> Self {
        Self {
            max_pwm: 255,
            turn_pwm: 150,
        }
    }
}

/// Differential mixing: each axis is scaled to half the PWM range
/// (truncating toward zero), then `left = y + x`, `right = y - x`.
pub fn mix(vector: Vector, max_pwm: i32) -> (i32, i32) {
    let scale = |value: i32| -> i32 {
        (f64::from(value) / f64::from(AXIS_LIMIT) * (f64::from(max_pwm) / 2.0)) as i32
    };
    let x = scale(vector.x.get());
    let y = scale(vector.y.get());
    (
        (y + x).clamp(-max_pwm, max_pwm),
        (y - x).clamp(-max_pwm, max_pwm),
    )
}

/// Spin in place: left backwards and right forwards turns left.
pub fn turn(direction: Direction, action: TurnAction, turn_pwm: i32) -> (i32, i32) {
    match (action, direction) {
        (TurnAction::Stop, _) => (0, 0),
        (TurnAction::Start, Direction::Left) => (-turn_pwm, turn_pwm),
        (TurnAction::Start, Direction::Right) => (turn_pwm, -turn_pwm),
    }
}

#[derive(Debug, Clone)]
pub struct DriveController {
    limits: DriveLimits,
    mode: OperatingMode,
    auto_active: bool,
    recording: bool,
    camera_enabled: bool,
    object_lists: ObjectLists,
    threshold: Option<f64>,
    pid: Option<PidParams>,
    motors: (i32, i32),
    last_motion: Option<Instant>,
}

impl DriveController {
    pub fn new(limits: DriveLimits) -> Self {
        Self {
            limits,
            mode: OperatingMode::Manual,
            auto_active: false,
            recording: false,
            camera_enabled: true,
            object_lists: ObjectLists::default(),
            threshold: None,
            pid: None,
            motors: (0, 0),
            last_motion: None,
        }
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn motors(&self) -> (i32, i32) {
        self.motors
    }

    pub fn auto_active(&self) -> bool {
        self.auto_active
    }

    pub fn recording(&self) -> bool {
        self.recording
    }

    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn pid(&self) -> Option<&PidParams> {
        self.pid.as_ref()
    }

    /// Sent to every newly connected operator.
    pub fn greeting(&self) -> Vec<ServerEvent> {
        vec![
            ServerEvent::Status {
                message: CONNECT_STATUS.to_string(),
            },
            ServerEvent::ModeChanged { mode: self.mode },
            ServerEvent::ObjectLists(self.object_lists.clone()),
            ServerEvent::CameraStatus {
                enabled: self.camera_enabled,
            },
        ]
    }

    pub fn handle(&mut self, command: ClientCommand, now: Instant) -> Vec<ServerEvent> {
        match command {
            ClientCommand::Joystick { x, y } => {
                let pwm = mix(Vector { x, y }, self.limits.max_pwm);
                self.drive(pwm, now)
            }
            ClientCommand::Turn { direction, action } => {
                let pwm = turn(direction, action, self.limits.turn_pwm);
                self.drive(pwm, now)
            }
            ClientCommand::ChangeMode { mode } => {
                info!(from = %self.mode, to = %mode, "mode changed");
                self.mode = mode;
                self.auto_active = false;
                self.last_motion = None;
                self.motors = (0, 0);
                vec![ServerEvent::motors(0, 0), ServerEvent::ModeChanged { mode }]
            }
            ClientCommand::ToggleAuto { active } => {
                info!(active, "auto controller toggled");
                self.auto_active = active;
                if active {
                    Vec::new()
                } else {
                    self.motors = (0, 0);
                    vec![ServerEvent::motors(0, 0)]
                }
            }
            ClientCommand::ToggleRecording { active } => {
                self.recording = active;
                let message = if active {
                    "recording started"
                } else {
                    "recording stopped"
                };
                info!(active, "recorder toggled");
                vec![ServerEvent::Status {
                    message: message.to_string(),
                }]
            }
            ClientCommand::ToggleCamera { enabled } => {
                self.camera_enabled = enabled;
                vec![ServerEvent::CameraStatus { enabled }]
            }
            ClientCommand::SetObjectLists(lists) => {
                info!(list_a = ?lists.list_a, list_b = ?lists.list_b, "object lists updated");
                self.object_lists = lists.clone();
                vec![ServerEvent::ObjectLists(lists)]
            }
            ClientCommand::OverrideThreshold { threshold } => {
                info!(threshold, "confidence threshold updated");
                self.threshold = Some(threshold);
                Vec::new()
            }
            ClientCommand::SetPidParams(params) => {
                let gains = PidGains {
                    kp: params.kp,
                    ki: params.ki,
                    kd: params.kd,
                };
                info!(?params, "pid parameters updated");
                self.pid = Some(params);
                vec![ServerEvent::PidParams(gains)]
            }
            ClientCommand::ConsoleMessage { message } => {
                info!(%message, "operator console");
                Vec::new()
            }
        }
    }

    /// Stops the motors when no motion command arrived within `timeout`.
    pub fn check_watchdog(&mut self, now: Instant, timeout: Duration) -> Option<ServerEvent> {
        if self.motors == (0, 0) {
            return None;
        }
        let expired = match self.last_motion {
            Some(at) => now.saturating_duration_since(at) >= timeout,
            None => true,
        };
        if !expired {
            return None;
        }
        self.motors = (0, 0);
        self.last_motion = None;
        Some(ServerEvent::motors(0, 0))
    }

    fn drive(&mut self, pwm: (i32, i32), now: Instant) -> Vec<ServerEvent> {
        if !self.mode.is_manual() {
            debug!(mode = %self.mode, "motion command ignored outside manual mode");
            return Vec::new();
        }
        self.last_motion = Some(now);
        self.motors = pwm;
        vec![ServerEvent::motors(pwm.0, pwm.1)]
    }
}

#[cfg(test)]
#[path = "tests/drive_tests.rs"]
mod tests;
