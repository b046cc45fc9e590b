//! Bixolon BXLPAPI receipt printer adapter (Windows).
//!
//! The DLL is resolved by the platform loader: `BXLPAPI.dll` must sit next to
//! the executable or on the DLL search path (the vendor install directory in
//! dev deployments).

use crate::domain::errors::DriverError;
use crate::domain::ports::{OpenParams, PrinterDriver};
use std::ffi::CString;
use std::os::raw::{c_char, c_int};

#[link(name = "BXLPAPI")]
extern "C" {
    fn PrinterOpen(
        device_index: c_int,
        comm_mode: *const c_char,
        p1: c_int,
        p2: c_int,
        p3: c_int,
        p4: c_int,
        p5: c_int,
    ) -> c_int;
    fn GetPrinterCurrentStatus() -> c_int;
    fn PrinterClose() -> c_int;
}

/// Adapter over the vendor driver. Result codes are passed through untouched.
#[derive(Debug, Default)]
pub struct BixolonDriver;

impl BixolonDriver {
    pub fn new() -> Self {
        Self
    }
}

impl PrinterDriver for BixolonDriver {
    fn open(&mut self, params: &OpenParams) -> Result<i32, DriverError> {
        let comm_mode = CString::new(params.comm_mode.as_str())
            .map_err(|e| DriverError::Call { op: "open", message: e.to_string() })?;
        let [p1, p2, p3, p4, p5] = params.params;

        // SAFETY: comm_mode outlives the call and is NUL-terminated; the driver
        // does not retain the pointer.
        let code = unsafe { PrinterOpen(params.device_index, comm_mode.as_ptr(), p1, p2, p3, p4, p5) };
        Ok(code)
    }

    fn query_status(&mut self) -> Result<i32, DriverError> {
        // SAFETY: no arguments; the driver reports failures through the return code.
        Ok(unsafe { GetPrinterCurrentStatus() })
    }

    fn close(&mut self) -> Result<i32, DriverError> {
        // SAFETY: closing an unopened printer is a no-op in the driver.
        Ok(unsafe { PrinterClose() })
    }
}
