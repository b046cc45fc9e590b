//! IO modules - external system interfaces
//!
//! - `card_frame` - Card reader frame decoding and 12-byte window accumulation
//! - `serial` - tokio-serial connector for the card reader
//! - `printer` - Printer driver adapters (vendor FFI and mock)
//! - `telemetry_http` - HTTP transport to the kiosk backend
//! - `ui_bridge` - Typed channel towards the kiosk UI host
//! - `host_pipe` - JSON-lines stdio bridge to the UI host
//! - `prometheus` - Prometheus metrics HTTP endpoint

pub mod card_frame;
pub mod host_pipe;
pub mod printer;
pub mod prometheus;
pub mod serial;
pub mod telemetry_http;
pub mod ui_bridge;

// Re-export commonly used types
pub use card_frame::{decode, FrameAccumulator, FRAME_LEN};
pub use printer::{driver_from_config, MockPrinterDriver, MockPrinterHandle};
pub use serial::TokioSerialConnector;
pub use telemetry_http::{HttpTransport, TelemetryTransport};
pub use ui_bridge::{create_ui_channel, SessionFlag, UiBridge, UiCommand};
