//! Last-known robot state as shown to the operator.
//!
//! Purely informational: nothing here feeds back into the control loop.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use shared::{
    domain::OperatingMode,
    protocol::{ObjectLists, PidGains, ServerEvent},
};

use crate::ClientEvent;

/// Frontal readings closer than this (in cm) raise the obstacle warning.
pub const OBSTACLE_WARNING_CM: f64 = 15.0;
pub const DETECTION_HISTORY: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub content: String,
    pub confidence: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutotuneStatus {
    pub gains: PidGains,
    pub progress: f64,
    pub finished: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryView {
    pub connected: bool,
    pub mode: OperatingMode,
    pub frontal_cm: Option<f64>,
    pub right_cm: Option<f64>,
    pub motors: Option<(i32, i32)>,
    pub last_status: Option<String>,
    pub camera_enabled: Option<bool>,
    pub object_lists: Option<ObjectLists>,
    pub pid_gains: Option<PidGains>,
    pub autotune: Option<AutotuneStatus>,
    pub last_error: Option<String>,
    detections: VecDeque<Detection>,
}

impl TelemetryView {
    pub fn new(mode: OperatingMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, event: &ClientEvent) {
        match event {
            ClientEvent::ConnectionChanged { connected } => self.connected = *connected,
            ClientEvent::ModeChanged(mode) => self.mode = *mode,
            ClientEvent::Error(message) => self.last_error = Some(message.clone()),
            ClientEvent::Server(event) => self.apply_server(event),
        }
    }

    fn apply_server(&mut self, event: &ServerEvent) {
        match event {
            // Partial readings only replace the side that was reported.
            ServerEvent::Sensors { frontal, right } => {
                if frontal.is_some() {
                    self.frontal_cm = *frontal;
                }
                if right.is_some() {
                    self.right_cm = *right;
                }
            }
            ServerEvent::Motors { left, right } => {
                let (prev_left, prev_right) = self.motors.unwrap_or((0, 0));
                self.motors = Some((left.unwrap_or(prev_left), right.unwrap_or(prev_right)));
            }
            ServerEvent::Status { message } => self.last_status = Some(message.clone()),
            ServerEvent::ModeChanged { mode } => self.mode = *mode,
            ServerEvent::Detection {
                content,
                confidence,
                timestamp,
            } => {
                if self.detections.len() == DETECTION_HISTORY {
                    self.detections.pop_front();
                }
                self.detections.push_back(Detection {
                    content: content.clone(),
                    confidence: *confidence,
                    timestamp: *timestamp,
                });
            }
            ServerEvent::CameraStatus { enabled } => self.camera_enabled = Some(*enabled),
            ServerEvent::ObjectLists(lists) => self.object_lists = Some(lists.clone()),
            ServerEvent::PidParams(gains) => self.pid_gains = Some(*gains),
            ServerEvent::AutotuneProgress {
                kp,
                ki,
                kd,
                finished,
                progress,
            } => {
                let gains = PidGains {
                    kp: *kp,
                    ki: *ki,
                    kd: *kd,
                };
                if *finished {
                    self.pid_gains = Some(gains);
                }
                self.autotune = Some(AutotuneStatus {
                    gains,
                    progress: *progress,
                    finished: *finished,
                });
            }
            ServerEvent::Error(err) => self.last_error = Some(err.message.clone()),
        }
    }

    pub fn obstacle_ahead(&self) -> bool {
        matches!(self.frontal_cm, Some(d) if d > 0.0 && d < OBSTACLE_WARNING_CM)
    }

    /// Most recent first.
    pub fn detections(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter().rev()
    }
}

#[cfg(test)]
#[path = "tests/telemetry_tests.rs"]
mod tests;
