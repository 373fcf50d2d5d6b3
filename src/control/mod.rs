// Per-frame control path
//
// Provides:
// - Hand position -> motor command mapping with a central deadzone
// - Left/right channel assignment from mirrored hand positions
// - Fixed-grammar text frame encoding for the drive firmware

pub mod assigner;
pub mod mapper;
pub mod packet;

pub use assigner::{Channel, ChannelAssignment, HandAssigner, HandIndicator};
pub use mapper::{ActuatorCommand, Direction, SignalMapper};
pub use packet::{decode, encode, PacketError, FRAME_LEN};
