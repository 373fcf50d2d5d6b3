// Frame monitor: READ-ONLY view of what the robot receives
//
// Opens the receiving end of the serial link, reads line-terminated frames and
// prints the decoded motor commands. Use it on the robot side (or a loopback
// port) to check the wire format before connecting real firmware.
//
// Usage: cargo run --example frame_monitor -- [port] [baudrate]
// Example: cargo run --example frame_monitor -- /dev/ttyUSB0 115200

use handbot_teleop::config::LINK_BAUDRATE;
use handbot_teleop::control::{decode, ActuatorCommand};
use std::io::{BufRead, BufReader, ErrorKind};
use std::time::Duration;

fn describe(cmd: &ActuatorCommand) -> String {
    if cmd.is_stopped() {
        "Stop".to_string()
    } else {
        format!("{:?} {}", cmd.direction, cmd.magnitude)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let port_name = args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let baudrate = match args.next() {
        Some(raw) => raw.parse()?,
        None => LINK_BAUDRATE,
    };

    println!("Frame monitor on {} @ {} baud (Ctrl-C to stop)", port_name, baudrate);
    println!();

    let port = match serialport::new(&port_name, baudrate)
        .timeout(Duration::from_millis(500))
        .open()
    {
        Ok(port) => port,
        Err(e) => {
            println!("  ✗ Failed to open serial port: {}", e);
            println!();
            println!("Troubleshooting:");
            println!("  - Check the port path is correct");
            println!("  - Make sure no other program holds the port");
            return Err(e.into());
        }
    };

    let mut reader = BufReader::new(port);
    let mut line = String::new();
    let mut received = 0u64;
    let mut rejected = 0u64;

    loop {
        // A timeout may leave a partial line in the buffer; keep it for the next read
        match reader.read_line(&mut line) {
            Ok(0) => {
                println!("Port closed");
                break;
            }
            Ok(_) => {
                match decode(&line) {
                    Ok((left, right)) => {
                        received += 1;
                        println!(
                            "#{:<6} {}  L: {:<14} R: {}",
                            received,
                            line.trim_end(),
                            describe(&left),
                            describe(&right)
                        );
                    }
                    Err(e) => {
                        rejected += 1;
                        println!("  ✗ {:?}: {} ({} rejected so far)", line.trim_end(), e, rejected);
                    }
                }
                line.clear();
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => continue,
            Err(e) => return Err(e.into()),
        }
    }

    println!();
    println!("Received {} frames, rejected {}", received, rejected);
    Ok(())
}
