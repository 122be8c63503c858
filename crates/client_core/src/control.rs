//! Control state owned by a session and the keyboard key set feeding it.

use std::fmt;

use shared::domain::{Direction, Vector};

/// The single authoritative motion request of a session.
///
/// Each variant carries only the data meaningful for it, so a stopped state
/// never holds a vector and a joystick state never holds a turn direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControlState {
    #[default]
    Stop,
    Joystick(Vector),
    Turn(Direction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionMode {
    Stop,
    Joystick,
    Turn,
}

impl MotionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Joystick => "joystick",
            Self::Turn => "turn",
        }
    }
}

impl fmt::Display for MotionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ControlState {
    pub fn mode(&self) -> MotionMode {
        match self {
            Self::Stop => MotionMode::Stop,
            Self::Joystick(_) => MotionMode::Joystick,
            Self::Turn(_) => MotionMode::Turn,
        }
    }

    /// Drive vector; zero unless the state is `Joystick`.
    pub fn vector(&self) -> Vector {
        match self {
            Self::Joystick(vector) => *vector,
            Self::Stop | Self::Turn(_) => Vector::ZERO,
        }
    }

    pub fn turn_direction(&self) -> Option<Direction> {
        match self {
            Self::Turn(direction) => Some(*direction),
            Self::Stop | Self::Joystick(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrowKey {
    Up,
    Down,
    Left,
    Right,
}

impl ArrowKey {
    pub const ALL: [ArrowKey; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// Maps a key name (`ArrowUp`, `up`, ...) to an arrow key. Other keys are `None`.
    pub fn from_key_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let name = name.strip_prefix("Arrow").unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    fn bit(self) -> u8 {
        match self {
            Self::Up => 0b0001,
            Self::Down => 0b0010,
            Self::Left => 0b0100,
            Self::Right => 0b1000,
        }
    }
}

/// Set of arrow keys currently held down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PressedKeySet(u8);

impl PressedKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the key was not already held.
    pub fn insert(&mut self, key: ArrowKey) -> bool {
        let added = !self.contains(key);
        self.0 |= key.bit();
        added
    }

    /// Returns `true` if the key was held.
    pub fn remove(&mut self, key: ArrowKey) -> bool {
        let removed = self.contains(key);
        self.0 &= !key.bit();
        removed
    }

    pub fn contains(&self, key: ArrowKey) -> bool {
        self.0 & key.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = ArrowKey> + '_ {
        ArrowKey::ALL.into_iter().filter(|key| self.contains(*key))
    }
}

impl FromIterator<ArrowKey> for PressedKeySet {
    fn from_iter<I: IntoIterator<Item = ArrowKey>>(iter: I) -> Self {
        let mut set = Self::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_state_exposes_zero_vector_and_no_direction() {
        let state = ControlState::default();
        assert_eq!(state.mode(), MotionMode::Stop);
        assert!(state.vector().is_zero());
        assert_eq!(state.turn_direction(), None);
    }

    #[test]
    fn turn_state_hides_vector() {
        let state = ControlState::Turn(Direction::Left);
        assert!(state.vector().is_zero());
        assert_eq!(state.turn_direction(), Some(Direction::Left));
    }

    #[test]
    fn key_names_accept_dom_and_short_forms() {
        assert_eq!(ArrowKey::from_key_name("ArrowLeft"), Some(ArrowKey::Left));
        assert_eq!(ArrowKey::from_key_name("down"), Some(ArrowKey::Down));
        assert_eq!(ArrowKey::from_key_name("Space"), None);
    }

    #[test]
    fn key_set_tracks_membership() {
        let mut keys = PressedKeySet::new();
        assert!(keys.insert(ArrowKey::Up));
        assert!(!keys.insert(ArrowKey::Up));
        assert!(keys.insert(ArrowKey::Right));
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.iter().collect::<Vec<_>>(), vec![ArrowKey::Up, ArrowKey::Right]);
        assert!(keys.remove(ArrowKey::Up));
        assert!(!keys.remove(ArrowKey::Up));
        keys.clear();
        assert!(keys.is_empty());
    }
}
