//! Telemetry payloads sent to the kiosk backend

use serde::Serialize;

/// `kioskStatus` value meaning the agent is alive
pub const KIOSK_STATUS_ALIVE: u8 = 1;

/// Body of `POST <base>/kiosk/update/time`.
///
/// A heartbeat omits `printerStatus`; a printer status report carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KioskUpdate {
    pub kiosk_id: String,
    pub kiosk_status: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printer_status: Option<i32>,
}

impl KioskUpdate {
    pub fn heartbeat(kiosk_id: impl Into<String>) -> Self {
        Self { kiosk_id: kiosk_id.into(), kiosk_status: KIOSK_STATUS_ALIVE, printer_status: None }
    }

    pub fn printer_status(kiosk_id: impl Into<String>, code: i32) -> Self {
        Self {
            kiosk_id: kiosk_id.into(),
            kiosk_status: KIOSK_STATUS_ALIVE,
            printer_status: Some(code),
        }
    }

    pub fn kind(&self) -> &'static str {
        if self.printer_status.is_some() {
            "printer_status"
        } else {
            "heartbeat"
        }
    }
}
