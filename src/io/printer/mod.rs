//! Printer driver adapters
//!
//! - `mock` - scripted driver for tests and printer-less bench setups
//! - `bixolon` - vendor BXLPAPI driver (Windows, `bixolon` feature)

#[cfg(all(windows, feature = "bixolon"))]
pub mod bixolon;
pub mod mock;

pub use mock::{DriverCall, MockPrinterDriver, MockPrinterHandle};

use crate::domain::errors::DriverError;
use crate::domain::ports::PrinterDriver;
use crate::infra::config::{Config, PrinterDriverKind};

/// Build the driver adapter selected in config
pub fn driver_from_config(config: &Config) -> Result<Box<dyn PrinterDriver>, DriverError> {
    match config.printer_driver() {
        PrinterDriverKind::Mock => Ok(Box::new(MockPrinterDriver::default())),
        PrinterDriverKind::Bixolon => bixolon_driver(),
    }
}

#[cfg(all(windows, feature = "bixolon"))]
fn bixolon_driver() -> Result<Box<dyn PrinterDriver>, DriverError> {
    Ok(Box::new(bixolon::BixolonDriver::new()))
}

#[cfg(not(all(windows, feature = "bixolon")))]
fn bixolon_driver() -> Result<Box<dyn PrinterDriver>, DriverError> {
    Err(DriverError::Unavailable(
        "built without the bixolon feature or not on Windows".to_string(),
    ))
}
