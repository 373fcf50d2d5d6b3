// Splits detected hands between the left and right motor channels
//
// The operator watches a mirrored preview, so hands are placed by their
// on-screen ("visual") position: visual_x = 1 - x. The left half of the
// preview drives the left motor, the right half drives the right motor.

use serde::{Deserialize, Serialize};

use super::mapper::{ActuatorCommand, SignalMapper};
use crate::messages::HandPosition;

/// Visual x coordinate separating the two channels
pub const CHANNEL_SPLIT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub fn label(&self) -> &'static str {
        match self {
            Channel::Left => "L",
            Channel::Right => "R",
        }
    }
}

/// Operator feedback for one assigned hand (never read back by the control path)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandIndicator {
    pub visual_x: f64,
    pub visual_y: f64,
    pub channel: Channel,
    pub command: ActuatorCommand,
}

/// Commands for both channels computed from a single detection frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelAssignment {
    pub left: ActuatorCommand,
    pub right: ActuatorCommand,
    pub indicators: Vec<HandIndicator>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HandAssigner {
    mapper: SignalMapper,
}

impl HandAssigner {
    pub fn new(mapper: SignalMapper) -> Self {
        Self { mapper }
    }

    pub fn mapper(&self) -> &SignalMapper {
        &self.mapper
    }

    /// Assign each hand to a channel. A channel without a hand is stopped.
    ///
    /// When several hands fall on the same side, the last one in input
    /// order overrides the earlier ones.
    pub fn assign(&self, hands: &[HandPosition]) -> ChannelAssignment {
        let mut assignment = ChannelAssignment::default();

        for hand in hands {
            let visual_x = 1.0 - hand.x;
            let visual_y = hand.y;
            let command = self.mapper.map(visual_y);

            let channel = if visual_x < CHANNEL_SPLIT {
                assignment.left = command;
                Channel::Left
            } else {
                assignment.right = command;
                Channel::Right
            };

            assignment.indicators.push(HandIndicator {
                visual_x,
                visual_y,
                channel,
                command,
            });
        }

        assignment
    }
}
