//! Arbitration of intents into the session's control state.
//!
//! Last writer wins: whichever producer spoke most recently overwrites the
//! state. Turn changes also yield the immediate start/stop commands that
//! bracket a press-and-hold.

use shared::{domain::OperatingMode, protocol::ClientCommand};

use crate::{control::ControlState, input::Intent};

/// Next state plus the commands to send right away, ahead of the next heartbeat.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: ControlState,
    pub commands: Vec<ClientCommand>,
}

impl Transition {
    fn quiet(state: ControlState) -> Self {
        Self {
            state,
            commands: Vec::new(),
        }
    }
}

pub fn reduce(current: ControlState, mode: OperatingMode, intent: Intent) -> Transition {
    if !mode.is_manual() {
        return Transition::quiet(ControlState::Stop);
    }

    let next = ControlState::from(intent);
    if next == current {
        return Transition::quiet(next);
    }

    let mut commands = Vec::new();
    if let ControlState::Turn(previous) = current {
        commands.push(ClientCommand::turn_stop(previous));
    }
    if let ControlState::Turn(direction) = next {
        commands.push(ClientCommand::turn_start(direction));
    }
    Transition {
        state: next,
        commands,
    }
}

/// Forced reset on an operating-mode change: `Stop` plus exactly one explicit
/// stop command.
pub fn reset() -> Transition {
    Transition {
        state: ControlState::Stop,
        commands: vec![ClientCommand::stop()],
    }
}

#[cfg(test)]
#[path = "tests/reducer_tests.rs"]
mod tests;
