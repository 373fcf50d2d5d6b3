// Wireless link to the drive robot
//
// Provides:
// - Transport / Connector traits (the seam between control code and hardware)
// - Transmission gate: single-in-flight, rate-limited frame delivery
// - Link session: Disconnected -> Connecting -> Connected state machine
// - Serial implementation on top of the `serialport` crate

use std::time::Duration;

pub mod gate;
pub mod serial;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;

pub use gate::{SendOutcome, TransmissionGate};
pub use serial::{SerialConnector, SerialLink};
pub use session::{LinkSession, LinkState};

/// Error types for link communication
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Write did not complete within {0:?}")]
    Timeout(Duration),

    #[error("Link disconnected")]
    Disconnected,

    #[error("Link task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl LinkError {
    /// True when the error means the link is gone, not just a failed write
    pub fn is_disconnect(&self) -> bool {
        use std::io::ErrorKind;

        match self {
            LinkError::Disconnected => true,
            LinkError::Serial(e) => e.kind() == serialport::ErrorKind::NoDevice,
            LinkError::Io(e) => matches!(
                e.kind(),
                ErrorKind::BrokenPipe
                    | ErrorKind::NotConnected
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
            ),
            LinkError::Timeout(_) | LinkError::Task(_) => false,
        }
    }
}

/// A writable, half-duplex link. Writes must not overlap; the gate ensures it.
pub trait Transport: Send + Sync + 'static {
    /// Start writing `bytes`. The returned future owns everything it needs.
    fn write(
        &self,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<(), LinkError>> + Send + 'static;
}

/// Opens a [`Transport`]
pub trait Connector: Send + Sync + 'static {
    type Link: Transport;

    fn connect(&self) -> impl Future<Output = Result<Self::Link, LinkError>> + Send + 'static;

    /// Human-readable target, used in logs
    fn target(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_classification() {
        assert!(LinkError::Disconnected.is_disconnect());
        assert!(LinkError::Io(std::io::ErrorKind::BrokenPipe.into()).is_disconnect());
        assert!(
            LinkError::Serial(serialport::Error::new(
                serialport::ErrorKind::NoDevice,
                "gone"
            ))
            .is_disconnect()
        );
        assert!(!LinkError::Io(std::io::ErrorKind::WouldBlock.into()).is_disconnect());
        assert!(!LinkError::Timeout(Duration::from_millis(5)).is_disconnect());
    }
}
