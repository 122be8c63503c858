use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Largest magnitude a motion axis may carry on the wire.
pub const AXIS_LIMIT: i32 = 255;

/// One component of a motion vector, always within `[-255, 255]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Axis(i16);

impl Axis {
    pub const ZERO: Axis = Axis(0);
    pub const MAX: Axis = Axis(AXIS_LIMIT as i16);
    pub const MIN: Axis = Axis(-AXIS_LIMIT as i16);

    pub fn saturating(value: i32) -> Self {
        Self(value.clamp(-AXIS_LIMIT, AXIS_LIMIT) as i16)
    }

    /// Scales a unit value (`-1.0..=1.0`) to the axis range, rounding halves
    /// upward. Non-finite input maps to zero.
    pub fn from_unit(value: f64) -> Self {
        if !value.is_finite() {
            return Self::ZERO;
        }
        let scaled = (value.clamp(-1.0, 1.0) * f64::from(AXIS_LIMIT) + 0.5).floor();
        Self::saturating(scaled as i32)
    }

    pub fn get(self) -> i32 {
        i32::from(self.0)
    }
}

impl TryFrom<i32> for Axis {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        if (-AXIS_LIMIT..=AXIS_LIMIT).contains(&value) {
            Ok(Self(value as i16))
        } else {
            Err(ProtocolError::OutOfRange {
                field: "axis",
                value: value.to_string(),
            })
        }
    }
}

impl From<Axis> for i32 {
    fn from(value: Axis) -> Self {
        value.get()
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Differential drive request: `x` steers, `y` drives forward (positive) or back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: Axis,
    pub y: Axis,
}

impl Vector {
    pub const ZERO: Vector = Vector {
        x: Axis::ZERO,
        y: Axis::ZERO,
    };

    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x: Axis::saturating(x),
            y: Axis::saturating(y),
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(ProtocolError::OutOfRange {
                field: "direction",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnAction {
    Start,
    Stop,
}

/// Top-level operating mode of the robot. Only `Manual` hands motion to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum OperatingMode {
    #[default]
    Manual,
    Auto,
    Pid,
    Autotune,
}

impl OperatingMode {
    pub const ALL: [OperatingMode; 4] = [Self::Manual, Self::Auto, Self::Pid, Self::Autotune];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Auto => "auto",
            Self::Pid => "pid",
            Self::Autotune => "autotune",
        }
    }

    pub fn is_manual(self) -> bool {
        self == Self::Manual
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<OperatingMode> for &'static str {
    fn from(value: OperatingMode) -> Self {
        value.as_str()
    }
}

impl TryFrom<String> for OperatingMode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for OperatingMode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or(ProtocolError::UnknownMode(normalized))
    }
}
