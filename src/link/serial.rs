// Serial transport for the wireless UART bridge
//
// The radio (RFCOMM / BLE-UART) is exposed to the host as a tty. Port I/O is
// blocking, so opening and writing run on tokio's blocking pool and never
// stall the control loop.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, info};

use super::{Connector, LinkError, Transport};
use crate::config::{LinkConfig, LINK_IO_TIMEOUT_MS};

/// Opens [`SerialLink`]s on a fixed device
#[derive(Debug, Clone)]
pub struct SerialConnector {
    port: String,
    baudrate: u32,
}

impl SerialConnector {
    pub fn new(port: impl Into<String>, baudrate: u32) -> Self {
        Self {
            port: port.into(),
            baudrate,
        }
    }

    pub fn from_config(config: &LinkConfig) -> Self {
        Self::new(config.port.clone(), config.baudrate)
    }
}

impl Connector for SerialConnector {
    type Link = SerialLink;

    fn connect(&self) -> impl Future<Output = Result<SerialLink, LinkError>> + Send + 'static {
        let port_name = self.port.clone();
        let baudrate = self.baudrate;

        async move {
            info!("Opening link on {} @ {} baud", port_name, baudrate);
            let name = port_name.clone();
            let port = tokio::task::spawn_blocking(move || {
                serialport::new(&name, baudrate)
                    .timeout(Duration::from_millis(LINK_IO_TIMEOUT_MS))
                    .open()
            })
            .await??;

            Ok::<_, LinkError>(SerialLink::new(port_name, port))
        }
    }

    fn target(&self) -> String {
        self.port.clone()
    }
}

/// An open serial port
pub struct SerialLink {
    name: String,
    port: Arc<Mutex<Box<dyn SerialPort>>>,
}

impl SerialLink {
    pub fn new(name: impl Into<String>, port: Box<dyn SerialPort>) -> Self {
        Self {
            name: name.into(),
            port: Arc::new(Mutex::new(port)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Transport for SerialLink {
    fn write(
        &self,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<(), LinkError>> + Send + 'static {
        let port = Arc::clone(&self.port);

        async move {
            tokio::task::spawn_blocking(move || -> Result<(), LinkError> {
                let mut port = port.lock().map_err(|_| LinkError::Disconnected)?;
                port.write_all(&bytes)?;
                port.flush()?;
                debug!("Wrote {} bytes", bytes.len());
                Ok(())
            })
            .await?
        }
    }
}
