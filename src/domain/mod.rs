//! Domain models - device agent types and state machines
//!
//! - `card` - card identifiers and swipe events
//! - `link` - card reader link state machine
//! - `status` - printer status samples and hysteresis classifier
//! - `telemetry` - backend update payloads
//! - `ports` - traits for external collaborators
//! - `errors` - error taxonomy

pub mod card;
pub mod errors;
pub mod link;
pub mod ports;
pub mod status;
pub mod telemetry;

// Re-export commonly used types at module level
pub use card::{CardIdentifier, CardSwipeEvent};
pub use errors::{DriverError, LinkError, TelemetryError};
pub use link::{LinkAction, LinkEvent, LinkPhase, LinkState, RetryPolicy};
pub use ports::{AlertSink, NavigationSink, OpenParams, PrinterDriver, SerialConnector, SessionOracle};
pub use status::{StatusClassifier, StatusSample};
pub use telemetry::KioskUpdate;
