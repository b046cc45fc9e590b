//! Card reader serial port
//!
//! Line settings: 4800 baud (configurable), 8 data bits, odd parity, 1 stop bit.

use crate::domain::errors::LinkError;
use crate::domain::ports::SerialConnector;
use crate::infra::config::Config;
use async_trait::async_trait;
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::debug;

/// Opens the card reader through tokio-serial
pub struct TokioSerialConnector {
    device: String,
    baud: u32,
}

impl TokioSerialConnector {
    pub fn new(config: &Config) -> Self {
        Self { device: config.serial_device().to_string(), baud: config.serial_baud() }
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }
}

#[async_trait]
impl SerialConnector for TokioSerialConnector {
    type Port = SerialStream;

    fn device(&self) -> &str {
        &self.device
    }

    async fn open(&mut self) -> Result<SerialStream, LinkError> {
        debug!(device = %self.device, baud = %self.baud, "serial_port_opening");

        tokio_serial::new(&self.device, self.baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::Odd)
            .stop_bits(StopBits::One)
            .open_native_async()
            .map_err(|e| LinkError::open(&self.device, e))
    }
}
