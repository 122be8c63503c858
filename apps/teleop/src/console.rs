//! Line-oriented operator console.
//!
//! ```text
//! key down up        key up left        drag 150 0.0       release
//! press left         lift left          leave right        touch right
//! untouch right      cancel left        stop               mode auto
//! auto on            record off         camera on          threshold 0.6
//! lists cup,bottle person               pid 2.0 0.1 0.5 20 120
//! say hello robot    wait 500           status             quit
//! ```

use std::{fmt::Write as _, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use client_core::{
    control::ArrowKey,
    driver::OperatorAction,
    input::{ButtonEvent, InputEvent},
    telemetry::TelemetryView,
    ClientEvent,
};
use shared::{
    domain::{Direction, OperatingMode},
    protocol::{ClientCommand, ObjectLists, PidParams, ServerEvent},
};

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Action(OperatorAction),
    Wait(Duration),
    Status,
    Quit,
}

impl From<OperatorAction> for ConsoleCommand {
    fn from(action: OperatorAction) -> Self {
        Self::Action(action)
    }
}

/// Parses one console line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let verb = verb.to_ascii_lowercase();
    let rest = rest.trim();
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match verb.as_str() {
        "key" => {
            let [edge, key] = args[..] else {
                bail!("usage: key <down|up> <up|down|left|right>");
            };
            let key =
                ArrowKey::from_key_name(key).ok_or_else(|| anyhow!("not an arrow key: {key}"))?;
            let event = match edge {
                "down" => InputEvent::KeyDown(key),
                "up" => InputEvent::KeyUp(key),
                other => bail!("expected down or up, got {other}"),
            };
            OperatorAction::Input(event).into()
        }
        "drag" => {
            let [distance, angle] = args[..] else {
                bail!("usage: drag <distance> <angle-radians>");
            };
            let distance: f64 = distance.parse().context("invalid distance")?;
            let angle: f64 = angle.parse().context("invalid angle")?;
            OperatorAction::Input(InputEvent::JoystickMove {
                distance: Some(distance),
                angle,
            })
            .into()
        }
        "release" => OperatorAction::Input(InputEvent::JoystickRelease).into(),
        "press" | "lift" | "leave" | "touch" | "untouch" | "cancel" => {
            let [direction] = args[..] else {
                bail!("usage: {verb} <left|right>");
            };
            let direction: Direction = direction.parse()?;
            let event = match verb.as_str() {
                "press" => ButtonEvent::PointerDown,
                "lift" => ButtonEvent::PointerUp,
                "leave" => ButtonEvent::PointerLeave,
                "touch" => ButtonEvent::TouchStart,
                "untouch" => ButtonEvent::TouchEnd,
                _ => ButtonEvent::TouchCancel,
            };
            OperatorAction::Input(InputEvent::Button { direction, event }).into()
        }
        "stop" => OperatorAction::ReleaseAll.into(),
        "mode" => {
            let mode: OperatingMode = rest.parse()?;
            OperatorAction::SetMode(mode).into()
        }
        "auto" => send(ClientCommand::ToggleAuto {
            active: switch(rest)?,
        })?,
        "record" => send(ClientCommand::ToggleRecording {
            active: switch(rest)?,
        })?,
        "camera" => send(ClientCommand::ToggleCamera {
            enabled: switch(rest)?,
        })?,
        "threshold" => send(ClientCommand::OverrideThreshold {
            threshold: rest.parse().context("invalid threshold")?,
        })?,
        "lists" => {
            let list = |raw: Option<&&str>| -> Vec<String> {
                raw.map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|item| !item.is_empty() && *item != "-")
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
            };
            if args.len() > 2 {
                bail!("usage: lists <a,b,...> <c,d,...>");
            }
            send(ClientCommand::SetObjectLists(ObjectLists {
                list_a: list(args.first()),
                list_b: list(args.get(1)),
            }))?
        }
        "pid" => {
            let [kp, ki, kd, setpoint, base_speed] = args[..] else {
                bail!("usage: pid <kp> <ki> <kd> <setpoint> <base_speed>");
            };
            send(ClientCommand::SetPidParams(PidParams {
                kp: kp.parse().context("invalid kp")?,
                ki: ki.parse().context("invalid ki")?,
                kd: kd.parse().context("invalid kd")?,
                setpoint: setpoint.parse().context("invalid setpoint")?,
                base_speed: base_speed.parse().context("invalid base_speed")?,
            }))?
        }
        "say" => {
            if rest.is_empty() {
                bail!("usage: say <message>");
            }
            send(ClientCommand::ConsoleMessage {
                message: rest.to_string(),
            })?
        }
        "wait" => {
            let millis: u64 = rest.parse().context("usage: wait <milliseconds>")?;
            ConsoleCommand::Wait(Duration::from_millis(millis))
        }
        "status" => ConsoleCommand::Status,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => bail!("unknown command: {other}"),
    };
    Ok(Some(command))
}

fn send(command: ClientCommand) -> Result<ConsoleCommand> {
    command.validate()?;
    Ok(OperatorAction::Send(command).into())
}

fn switch(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => bail!("expected on or off, got {other:?}"),
    }
}

/// One-line summary for the `status` command.
pub fn render(view: &TelemetryView) -> String {
    let mut out = String::new();
    let link = if view.connected { "up" } else { "down" };
    let _ = write!(out, "link={link} mode={}", view.mode);
    let _ = write!(
        out,
        " front={} right={}",
        distance(view.frontal_cm),
        distance(view.right_cm)
    );
    if let Some((left, right)) = view.motors {
        let _ = write!(out, " motors=({left},{right})");
    }
    if let Some(enabled) = view.camera_enabled {
        let _ = write!(out, " camera={}", if enabled { "on" } else { "off" });
    }
    if let Some(autotune) = view.autotune {
        let _ = write!(out, " autotune={:.0}%", autotune.progress * 100.0);
    }
    if view.obstacle_ahead() {
        out.push_str(" OBSTACLE");
    }
    out
}

fn distance(value: Option<f64>) -> String {
    match value {
        Some(cm) if cm >= 0.0 => format!("{cm:.1}cm"),
        _ => "-".to_string(),
    }
}

/// Console line for events worth interrupting the operator for.
pub fn describe(event: &ClientEvent, view: &TelemetryView) -> Option<String> {
    match event {
        ClientEvent::ConnectionChanged { connected: true } => Some("robot connected".into()),
        ClientEvent::ConnectionChanged { connected: false } => {
            Some("robot disconnected, retrying".into())
        }
        ClientEvent::ModeChanged(mode) => Some(format!("mode: {mode}")),
        ClientEvent::Error(message) => Some(format!("error: {message}")),
        ClientEvent::Server(event) => match event {
            ServerEvent::Status { message } => Some(format!("robot: {message}")),
            ServerEvent::Error(err) => Some(format!("robot error: {}", err.message)),
            ServerEvent::Detection {
                content,
                confidence,
                ..
            } => Some(match confidence {
                Some(confidence) => format!("detected {content} ({:.0}%)", confidence * 100.0),
                None => format!("detected {content}"),
            }),
            ServerEvent::Sensors { .. } if view.obstacle_ahead() => {
                Some(format!("obstacle ahead: {}", distance(view.frontal_cm)))
            }
            ServerEvent::AutotuneProgress {
                finished: true,
                kp,
                ki,
                kd,
                ..
            } => Some(format!(
                "autotune finished: kp={kp:.3} ki={ki:.3} kd={kd:.3}"
            )),
            _ => None,
        },
    }
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;
