//! Input aggregation: each producer turns one input modality into an [`Intent`].
//!
//! Producers keep only the bookkeeping their modality needs (drag in progress,
//! button held, keys held). They never touch the session's control state.

use shared::domain::{Axis, Direction, Vector, AXIS_LIMIT};

use crate::control::{ArrowKey, ControlState, PressedKeySet};

/// Joystick radius at which the force saturates, for a 150-unit joystick.
pub const DEFAULT_DEADZONE_RADIUS: f64 = 75.0;

/// A candidate motion directive from one input source, prior to arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Stop,
    Joystick(Vector),
    Turn(Direction),
}

impl From<Intent> for ControlState {
    fn from(value: Intent) -> Self {
        match value {
            Intent::Stop => ControlState::Stop,
            Intent::Joystick(vector) => ControlState::Joystick(vector),
            Intent::Turn(direction) => ControlState::Turn(direction),
        }
    }
}

/// Raw input events as delivered by the host UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Drag displacement from the joystick center. `distance` is `None` when the
    /// driver reports a move without a displacement.
    JoystickMove { distance: Option<f64>, angle: f64 },
    JoystickRelease,
    Button {
        direction: Direction,
        event: ButtonEvent,
    },
    KeyDown(ArrowKey),
    KeyUp(ArrowKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonEvent {
    PointerDown,
    PointerUp,
    PointerLeave,
    TouchStart,
    TouchEnd,
    TouchCancel,
}

impl ButtonEvent {
    pub fn is_press(self) -> bool {
        matches!(self, Self::PointerDown | Self::TouchStart)
    }
}

/// Outcome of a button event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonResponse {
    pub intent: Option<Intent>,
    /// The host must suppress its default touch handling (scrolling), otherwise
    /// it fires spurious release events mid-press.
    pub prevent_default: bool,
}

#[derive(Debug, Clone)]
pub struct JoystickInput {
    deadzone_radius: f64,
    dragging: bool,
}

impl JoystickInput {
    pub fn new(deadzone_radius: f64) -> Self {
        Self {
            deadzone_radius,
            dragging: false,
        }
    }

    pub fn deadzone_radius(&self) -> f64 {
        self.deadzone_radius
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// A move without displacement (missing or exactly zero) yields nothing.
    pub fn on_move(&mut self, distance: Option<f64>, angle: f64) -> Option<Intent> {
        let distance = distance.filter(|d| *d != 0.0)?;
        self.dragging = true;
        Some(Intent::Joystick(self.vector(distance, angle)))
    }

    pub fn on_release(&mut self) -> Intent {
        self.dragging = false;
        Intent::Stop
    }

    pub fn reset(&mut self) {
        self.dragging = false;
    }

    /// `x = round(cos θ · f · 255)`, `y = round(sin θ · f · 255)` with
    /// `f = min(d / radius, 1)`. Degenerate input yields the zero vector.
    pub fn vector(&self, distance: f64, angle: f64) -> Vector {
        let force = self.force(distance);
        if force == 0.0 || !angle.is_finite() {
            return Vector::ZERO;
        }
        Vector {
            x: Axis::from_unit(angle.cos() * force),
            y: Axis::from_unit(angle.sin() * force),
        }
    }

    fn force(&self, distance: f64) -> f64 {
        if !distance.is_finite() || distance <= 0.0 {
            return 0.0;
        }
        if !self.deadzone_radius.is_finite() || self.deadzone_radius <= 0.0 {
            return 1.0;
        }
        (distance / self.deadzone_radius).min(1.0)
    }
}

impl Default for JoystickInput {
    fn default() -> Self {
        Self::new(DEFAULT_DEADZONE_RADIUS)
    }
}

/// The left/right press-and-hold buttons.
#[derive(Debug, Clone, Default)]
pub struct TurnButtons {
    pressed: Option<Direction>,
}

impl TurnButtons {
    pub fn pressed(&self) -> Option<Direction> {
        self.pressed
    }

    pub fn handle(&mut self, direction: Direction, event: ButtonEvent) -> ButtonResponse {
        let prevent_default = event == ButtonEvent::TouchStart;
        let intent = if event.is_press() {
            self.pressed = Some(direction);
            Some(Intent::Turn(direction))
        } else if self.pressed == Some(direction) {
            // pointer-up, pointer-leave and touch-end all share this stop path
            self.pressed = None;
            Some(Intent::Stop)
        } else {
            None
        };
        ButtonResponse {
            intent,
            prevent_default,
        }
    }

    pub fn reset(&mut self) {
        self.pressed = None;
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyboardInput {
    pressed: PressedKeySet,
}

impl KeyboardInput {
    pub fn pressed(&self) -> PressedKeySet {
        self.pressed
    }

    pub fn key_down(&mut self, key: ArrowKey) -> Intent {
        self.pressed.insert(key);
        keyboard_intent(&self.pressed)
    }

    /// Releasing a key that is not held (already cleared by a mode reset,
    /// or never seen) yields nothing.
    pub fn key_up(&mut self, key: ArrowKey) -> Option<Intent> {
        if !self.pressed.remove(key) {
            return None;
        }
        Some(keyboard_intent(&self.pressed))
    }

    pub fn reset(&mut self) {
        self.pressed.clear();
    }
}

/// Maps the full set of held arrow keys to an intent.
///
/// A single horizontal key with no vertical key rotates in place (`Turn`);
/// any vertical component steers while moving (`Joystick`). Left and right
/// together cancel to `x = 0` and never produce a turn.
pub fn keyboard_intent(keys: &PressedKeySet) -> Intent {
    if keys.is_empty() {
        return Intent::Stop;
    }

    let up = keys.contains(ArrowKey::Up);
    let down = keys.contains(ArrowKey::Down);
    let left = keys.contains(ArrowKey::Left);
    let right = keys.contains(ArrowKey::Right);

    let mut y = 0;
    if up {
        y += AXIS_LIMIT;
    }
    if down {
        y -= AXIS_LIMIT;
    }

    let vertical = up || down;
    if left && !right && !vertical {
        return Intent::Turn(Direction::Left);
    }
    if right && !left && !vertical {
        return Intent::Turn(Direction::Right);
    }

    let mut x = 0;
    if left {
        x -= AXIS_LIMIT;
    }
    if right {
        x += AXIS_LIMIT;
    }
    Intent::Joystick(Vector::new(x, y))
}

#[cfg(test)]
#[path = "tests/input_tests.rs"]
mod tests;
