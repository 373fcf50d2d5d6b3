// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::control::{ActuatorCommand, HandIndicator};
use crate::link::{LinkState, SendOutcome};

/// Reference point (wrist landmark) of one detected hand.
/// Detector-native coordinates: [0,1], origin top-left, not mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandPosition {
    pub x: f64,
    pub y: f64,
}

// Hand detector -> runtime, one per processed video frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    /// Video timestamp of the frame the detector ran on
    pub timestamp_ms: u64,
    #[serde(default)]
    pub hands: Vec<HandPosition>,
}

/// Operator request for the wireless link
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkRequest {
    Connect,
    Disconnect,
}

/// Detector liveness as seen by the control loop
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DetectorHealth {
    Ok,
    Stale,
}

// Runtime -> operator feedback, published every loop iteration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub left: ActuatorCommand,
    pub right: ActuatorCommand,
    /// Last frame handed to the gate (whether or not it went out)
    pub packet: String,
    pub outcome: SendOutcome,
    pub link: LinkState,
    pub detector: DetectorHealth,
    pub hands: Vec<HandIndicator>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_frame_json() {
        let frame: DetectionFrame = serde_json::from_str(
            r#"{"timestamp_ms": 33, "hands": [{"x": 0.25, "y": 0.5}]}"#,
        )
        .unwrap();
        assert_eq!(frame.timestamp_ms, 33);
        assert_eq!(frame.hands, vec![HandPosition { x: 0.25, y: 0.5 }]);

        let empty: DetectionFrame = serde_json::from_str(r#"{"timestamp_ms": 34}"#).unwrap();
        assert!(empty.hands.is_empty());
    }

    #[test]
    fn test_link_request_json() {
        assert_eq!(
            serde_json::from_str::<LinkRequest>(r#""connect""#).unwrap(),
            LinkRequest::Connect
        );
        assert_eq!(
            serde_json::to_string(&LinkRequest::Disconnect).unwrap(),
            r#""disconnect""#
        );
    }
}
