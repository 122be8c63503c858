use shared::{domain::OperatingMode, protocol::ClientCommand};
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::{
    control::{ControlState, PressedKeySet},
    input::{ButtonEvent, InputEvent, Intent, JoystickInput, KeyboardInput, TurnButtons},
    reducer::{self, Transition},
};

/// Result of feeding one input event into the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputOutcome {
    pub commands: Vec<ClientCommand>,
    pub prevent_default: bool,
}

/// Control state of one connection, together with the producers feeding it.
///
/// Created once per connection in `Stop`; mutated only through the methods
/// below, which all go through the reducer.
#[derive(Debug, Clone)]
pub struct ControlSession {
    id: Uuid,
    state: ControlState,
    mode: OperatingMode,
    joystick: JoystickInput,
    buttons: TurnButtons,
    keyboard: KeyboardInput,
}

impl ControlSession {
    pub fn new(deadzone_radius: f64, mode: OperatingMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: ControlState::Stop,
            mode,
            joystick: JoystickInput::new(deadzone_radius),
            buttons: TurnButtons::default(),
            keyboard: KeyboardInput::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn pressed_keys(&self) -> PressedKeySet {
        self.keyboard.pressed()
    }

    pub fn handle_input(&mut self, event: InputEvent) -> InputOutcome {
        let prevent_default = matches!(
            event,
            InputEvent::Button {
                event: ButtonEvent::TouchStart,
                ..
            }
        );

        if !self.mode.is_manual() {
            trace!(session = %self.id, mode = %self.mode, "input ignored outside manual mode");
            return InputOutcome {
                commands: Vec::new(),
                prevent_default,
            };
        }

        let intent = match event {
            InputEvent::JoystickMove { distance, angle } => self.joystick.on_move(distance, angle),
            InputEvent::JoystickRelease => Some(self.joystick.on_release()),
            InputEvent::Button { direction, event } => {
                self.buttons.handle(direction, event).intent
            }
            InputEvent::KeyDown(key) => Some(self.keyboard.key_down(key)),
            InputEvent::KeyUp(key) => self.keyboard.key_up(key),
        };

        let commands = match intent {
            Some(intent) => self.apply(intent),
            None => Vec::new(),
        };
        InputOutcome {
            commands,
            prevent_default,
        }
    }

    /// Operator-initiated mode switch: resets to stop and announces the new mode.
    pub fn set_operating_mode(&mut self, mode: OperatingMode) -> Vec<ClientCommand> {
        let mut commands = self.switch_mode(mode);
        if !commands.is_empty() {
            commands.push(ClientCommand::ChangeMode { mode });
        }
        commands
    }

    /// Mode reported by the robot: same reset, but nothing is echoed back.
    pub fn sync_operating_mode(&mut self, mode: OperatingMode) -> Vec<ClientCommand> {
        self.switch_mode(mode)
    }

    /// Drops every held input as if all of them had been released.
    pub fn release_all(&mut self) -> Vec<ClientCommand> {
        self.joystick.reset();
        self.buttons.reset();
        self.keyboard.reset();
        self.apply(Intent::Stop)
    }

    fn apply(&mut self, intent: Intent) -> Vec<ClientCommand> {
        let Transition { state, commands } = reducer::reduce(self.state, self.mode, intent);
        if state != self.state {
            debug!(
                session = %self.id,
                from = %self.state.mode(),
                to = %state.mode(),
                "control state changed"
            );
        }
        self.state = state;
        commands
    }

    fn switch_mode(&mut self, mode: OperatingMode) -> Vec<ClientCommand> {
        if mode == self.mode {
            return Vec::new();
        }
        info!(session = %self.id, from = %self.mode, to = %mode, "operating mode changed");
        self.mode = mode;
        self.joystick.reset();
        self.buttons.reset();
        self.keyboard.reset();
        let Transition { state, commands } = reducer::reset();
        self.state = state;
        commands
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
