// Vertical hand position -> motor command
//
// Above the deadzone drives forward, below it drives backward. Speed grows
// linearly with the distance from the deadzone edge and saturates at 255
// at the image border.

use serde::{Deserialize, Serialize};

use crate::config::Deadzone;

/// Full-scale motor magnitude
pub const MAX_MAGNITUDE: u8 = 255;

/// Motor spin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    /// Wire character for this direction
    pub fn as_char(&self) -> char {
        match self {
            Direction::Forward => 'F',
            Direction::Backward => 'B',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'F' => Some(Direction::Forward),
            'B' => Some(Direction::Backward),
            _ => None,
        }
    }
}

/// Command for one motor. Magnitude 0 means stopped regardless of direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActuatorCommand {
    pub direction: Direction,
    pub magnitude: u8,
}

impl ActuatorCommand {
    pub fn new(direction: Direction, magnitude: u8) -> Self {
        Self {
            direction,
            magnitude,
        }
    }

    pub fn stop() -> Self {
        Self::default()
    }

    pub fn is_stopped(&self) -> bool {
        self.magnitude == 0
    }
}

/// Maps a normalized y coordinate to an [`ActuatorCommand`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalMapper {
    deadzone: Deadzone,
}

impl SignalMapper {
    pub fn new(deadzone: Deadzone) -> Self {
        Self { deadzone }
    }

    pub fn deadzone(&self) -> Deadzone {
        self.deadzone
    }

    /// Map `y` (0 = top of the image, 1 = bottom) to a command.
    ///
    /// Total over all inputs: values outside [0, 1] are clamped, NaN stops.
    pub fn map(&self, y: f64) -> ActuatorCommand {
        let y = y.clamp(0.0, 1.0);
        let low = self.deadzone.low();
        let high = self.deadzone.high();

        if y < low {
            let ratio = (low - y) / low;
            ActuatorCommand::new(Direction::Forward, scale(ratio))
        } else if y > high {
            let ratio = (y - high) / (1.0 - high);
            ActuatorCommand::new(Direction::Backward, scale(ratio))
        } else {
            // Deadzone (inclusive of both bounds)
            ActuatorCommand::stop()
        }
    }
}

/// Convert a 0..=1 ratio to a motor magnitude
fn scale(ratio: f64) -> u8 {
    let raw = (ratio * MAX_MAGNITUDE as f64).floor();
    raw.clamp(0.0, MAX_MAGNITUDE as f64) as u8
}
