// Text wire frame for the drive firmware
//
// Frame format: "L" dir mag "R" dir mag, e.g. "LF007RB255"
//   dir = 'F' | 'B'
//   mag = motor magnitude as exactly three zero-padded decimal digits
// The line terminator is added by the transmission gate, not here.

use super::mapper::{ActuatorCommand, Direction};

/// Length of an encoded frame without terminator
pub const FRAME_LEN: usize = 10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("Frame must be 10 bytes, got {0}")]
    Length(usize),

    #[error("Expected channel tag '{expected}' at offset {offset}")]
    ChannelTag { expected: char, offset: usize },

    #[error("Invalid direction {0:?}")]
    Direction(char),

    #[error("Invalid magnitude {0:?}")]
    Magnitude(String),
}

/// Encode both channel commands into one frame
pub fn encode(left: ActuatorCommand, right: ActuatorCommand) -> String {
    format!(
        "L{}{:03}R{}{:03}",
        left.direction.as_char(),
        left.magnitude,
        right.direction.as_char(),
        right.magnitude
    )
}

/// Parse a frame back into (left, right). One trailing "\n" or "\r\n" is accepted.
pub fn decode(frame: &str) -> Result<(ActuatorCommand, ActuatorCommand), PacketError> {
    let frame = frame
        .strip_suffix("\r\n")
        .or_else(|| frame.strip_suffix('\n'))
        .unwrap_or(frame);

    if frame.len() != FRAME_LEN || !frame.is_ascii() {
        return Err(PacketError::Length(frame.len()));
    }

    let left = decode_channel(&frame[0..5], 'L', 0)?;
    let right = decode_channel(&frame[5..10], 'R', 5)?;
    Ok((left, right))
}

fn decode_channel(
    field: &str,
    tag: char,
    offset: usize,
) -> Result<ActuatorCommand, PacketError> {
    let mut chars = field.chars();

    if chars.next() != Some(tag) {
        return Err(PacketError::ChannelTag {
            expected: tag,
            offset,
        });
    }

    // Length was checked by the caller, so the direction char is present
    let dir_char = chars.next().unwrap_or_default();
    let direction = Direction::from_char(dir_char).ok_or(PacketError::Direction(dir_char))?;

    let digits = &field[2..];
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PacketError::Magnitude(digits.to_string()));
    }
    let magnitude = digits
        .parse::<u8>()
        .map_err(|_| PacketError::Magnitude(digits.to_string()))?;

    Ok(ActuatorCommand::new(direction, magnitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(direction: Direction, magnitude: u8) -> ActuatorCommand {
        ActuatorCommand::new(direction, magnitude)
    }

    #[test]
    fn test_encode_stopped() {
        assert_eq!(
            encode(ActuatorCommand::stop(), ActuatorCommand::stop()),
            "LF000RF000"
        );
    }

    #[test]
    fn test_encode_padding() {
        assert_eq!(
            encode(cmd(Direction::Forward, 7), cmd(Direction::Backward, 255)),
            "LF007RB255"
        );
        assert_eq!(
            encode(cmd(Direction::Backward, 50), cmd(Direction::Forward, 5)),
            "LB050RF005"
        );
    }

    #[test]
    fn test_encode_fixed_grammar() {
        for magnitude in [0u8, 1, 9, 10, 99, 100, 254, 255] {
            for direction in [Direction::Forward, Direction::Backward] {
                let frame = encode(cmd(direction, magnitude), cmd(direction, 255 - magnitude));
                assert_eq!(frame.len(), FRAME_LEN);
                let bytes = frame.as_bytes();
                assert_eq!(bytes[0], b'L');
                assert_eq!(bytes[5], b'R');
                assert!(matches!(bytes[1], b'F' | b'B'));
                assert!(matches!(bytes[6], b'F' | b'B'));
                assert!(bytes[2..5].iter().all(u8::is_ascii_digit));
                assert!(bytes[7..10].iter().all(u8::is_ascii_digit));
                assert_eq!(
                    decode(&frame).unwrap(),
                    (cmd(direction, magnitude), cmd(direction, 255 - magnitude))
                );
            }
        }
    }

    #[test]
    fn test_decode_with_terminators() {
        let expected = (cmd(Direction::Forward, 12), cmd(Direction::Backward, 3));
        assert_eq!(decode("LF012RB003\n").unwrap(), expected);
        assert_eq!(decode("LF012RB003\r\n").unwrap(), expected);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert_eq!(decode("LF00RF000"), Err(PacketError::Length(9)));
        assert_eq!(
            decode("XF000RF000"),
            Err(PacketError::ChannelTag {
                expected: 'L',
                offset: 0
            })
        );
        assert_eq!(
            decode("LF000LF000"),
            Err(PacketError::ChannelTag {
                expected: 'R',
                offset: 5
            })
        );
        assert_eq!(decode("LS000RF000"), Err(PacketError::Direction('S')));
        assert!(matches!(
            decode("LF256RF000"),
            Err(PacketError::Magnitude(_))
        ));
        assert!(matches!(
            decode("LF+12RF000"),
            Err(PacketError::Magnitude(_))
        ));
    }
}
