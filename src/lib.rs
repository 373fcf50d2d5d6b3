// Hand-tracking teleoperation runtime for a two-motor differential-drive robot

pub mod config;
pub mod control;
pub mod link;
pub mod messages;
pub mod runtime;
