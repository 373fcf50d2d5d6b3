// Timeouts, topics, link and mapping configuration
use std::time::Duration;

use clap::{Parser, ValueEnum};

// Control loop frequency (stands in for the display refresh tick)
pub const LOOP_HZ: u64 = 60;

// Detection watchdog: stop both motors when the detector goes quiet this long
pub const DETECTION_TIMEOUT: Duration = Duration::from_millis(250);

// Vertical deadzone band, normalized image coordinates (y grows downward)
pub const DEADZONE_LOW: f64 = 0.40;
pub const DEADZONE_HIGH: f64 = 0.60;

// Minimum spacing between two dispatched frames in throttled mode
pub const SEND_INTERVAL: Duration = Duration::from_millis(80);

// Zenoh topics
pub const TOPIC_DETECTIONS: &str = "handbot/detector/hands"; // detector output
pub const TOPIC_LINK_CMD: &str = "handbot/link/cmd"; // connect / disconnect requests
pub const TOPIC_STATUS: &str = "handbot/state/control"; // per-frame feedback

// Serial device bridged to the robot's wireless UART
pub const LINK_PORT: &str = "/dev/rfcomm0";
pub const LINK_BAUDRATE: u32 = 115_200;
// Port I/O timeout: bounds opening and every blocking write on the link
pub const LINK_IO_TIMEOUT_MS: u64 = 100;

/// Errors raised while building a [`Config`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Deadzone bound {value} must lie strictly between 0 and 1")]
    DeadzoneOutOfRange { value: f64 },

    #[error("Deadzone low bound {low} must be below high bound {high}")]
    DeadzoneOrder { low: f64, high: f64 },

    #[error("Loop rate must be at least 1 Hz")]
    LoopRate,

    #[error("Detection timeout must be non-zero")]
    DetectionTimeout,
}

/// Central band of y values that maps to a stopped motor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadzone {
    low: f64,
    high: f64,
}

impl Deadzone {
    pub fn new(low: f64, high: f64) -> Result<Self, ConfigError> {
        for value in [low, high] {
            // NaN fails both comparisons and is rejected here too
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigError::DeadzoneOutOfRange { value });
            }
        }
        if low >= high {
            return Err(ConfigError::DeadzoneOrder { low, high });
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }
}

impl Default for Deadzone {
    fn default() -> Self {
        Self {
            low: DEADZONE_LOW,
            high: DEADZONE_HIGH,
        }
    }
}

/// Delivery discipline of the transmission gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GateMode {
    /// Drop frames arriving sooner than the send interval after the last dispatch
    Throttled,
    /// Drop frames only while a write is outstanding
    Exclusive,
}

/// Terminator appended to every frame on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateConfig {
    pub mode: GateMode,
    pub send_interval: Duration,
    pub line_ending: LineEnding,
    /// Give up on a write after this long (None = wait for the transport)
    pub write_timeout: Option<Duration>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            mode: GateMode::Throttled,
            send_interval: SEND_INTERVAL,
            line_ending: LineEnding::Lf,
            write_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    pub port: String,
    pub baudrate: u32,
    /// Request a connection as soon as the runtime starts
    pub auto_connect: bool,
}

/// Validated runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub loop_hz: u64,
    pub detection_timeout: Duration,
    pub deadzone: Deadzone,
    pub gate: GateConfig,
    pub link: LinkConfig,
}

impl Config {
    /// Period of one control loop iteration
    pub fn frame_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.loop_hz)
    }
}

/// Hand-tracking teleoperation runtime for a two-motor drive robot
#[derive(Debug, Parser)]
#[command(name = "handbot-teleop", version)]
pub struct Args {
    /// Serial device of the wireless link
    #[arg(long, default_value = LINK_PORT)]
    pub port: String,

    #[arg(long, default_value_t = LINK_BAUDRATE)]
    pub baudrate: u32,

    /// Connect to the link at startup instead of waiting for a request
    #[arg(long)]
    pub connect: bool,

    #[arg(long, value_enum, default_value_t = GateMode::Throttled)]
    pub gate: GateMode,

    /// Minimum spacing between frames in throttled mode
    #[arg(long, default_value_t = SEND_INTERVAL.as_millis() as u64)]
    pub send_interval_ms: u64,

    #[arg(long, value_enum, default_value_t = LineEnding::Lf)]
    pub line_ending: LineEnding,

    /// Abandon a stalled write after this many ms (0 disables)
    #[arg(long, default_value_t = 0)]
    pub write_timeout_ms: u64,

    #[arg(long, default_value_t = DEADZONE_LOW)]
    pub deadzone_low: f64,

    #[arg(long, default_value_t = DEADZONE_HIGH)]
    pub deadzone_high: f64,

    #[arg(long, default_value_t = LOOP_HZ)]
    pub loop_hz: u64,

    /// Stop both motors after this many ms without a detection
    #[arg(long, default_value_t = DETECTION_TIMEOUT.as_millis() as u64)]
    pub detection_timeout_ms: u64,
}

impl Args {
    pub fn into_config(self) -> Result<Config, ConfigError> {
        if self.loop_hz == 0 {
            return Err(ConfigError::LoopRate);
        }
        if self.detection_timeout_ms == 0 {
            return Err(ConfigError::DetectionTimeout);
        }
        let deadzone = Deadzone::new(self.deadzone_low, self.deadzone_high)?;
        let write_timeout =
            (self.write_timeout_ms > 0).then(|| Duration::from_millis(self.write_timeout_ms));

        Ok(Config {
            loop_hz: self.loop_hz,
            detection_timeout: Duration::from_millis(self.detection_timeout_ms),
            deadzone,
            gate: GateConfig {
                mode: self.gate,
                send_interval: Duration::from_millis(self.send_interval_ms),
                line_ending: self.line_ending,
                write_timeout,
            },
            link: LinkConfig {
                port: self.port,
                baudrate: self.baudrate,
                auto_connect: self.connect,
            },
        })
    }
}
