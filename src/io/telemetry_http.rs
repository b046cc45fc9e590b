//! Telemetry transport to the kiosk backend
//!
//! `POST <base_url>/kiosk/update/time` with a JSON [`KioskUpdate`] body.
//! One attempt per update; the caller decides what a failure means.

use crate::domain::errors::TelemetryError;
use crate::domain::telemetry::KioskUpdate;
use crate::infra::config::Config;
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, warn};

/// Delivers kiosk updates to the backend
#[async_trait]
pub trait TelemetryTransport: Send + Sync {
    async fn post_update(&self, update: &KioskUpdate) -> Result<(), TelemetryError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, TelemetryError> {
        let mut builder = reqwest::Client::builder().http1_only();

        if let Some(timeout) = config.telemetry_timeout() {
            builder = builder.timeout(timeout);
        }

        if config.accept_invalid_certs() {
            warn!(base_url = %config.telemetry_base_url(), "telemetry_tls_validation_disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self { client: builder.build()?, url: config.telemetry_update_url() })
    }
}

#[async_trait]
impl TelemetryTransport for HttpTransport {
    async fn post_update(&self, update: &KioskUpdate) -> Result<(), TelemetryError> {
        let start = Instant::now();
        let response = self.client.post(&self.url).json(update).send().await?;
        let status = response.status();

        debug!(
            kind = update.kind(),
            status = %status.as_u16(),
            latency_ms = %start.elapsed().as_millis(),
            "telemetry_post"
        );

        if status.is_success() {
            Ok(())
        } else {
            Err(TelemetryError::Rejected(status.as_u16()))
        }
    }
}
