//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/kiosk.toml
//!
//! `KIOSK_ID` and `KIOSK_APP_MODE` override the `[kiosk]` section.

use crate::domain::link::{RetryPolicy, MAX_RETRY, RETRY_DELAY};
use crate::domain::ports::OpenParams;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Deployment mode (selects the driver resolution path on the host)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    Dev,
    Prod,
}

impl DeploymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::Dev => "dev",
            DeploymentMode::Prod => "prod",
        }
    }

    fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" => Some(DeploymentMode::Dev),
            "prod" => Some(DeploymentMode::Prod),
            _ => None,
        }
    }
}

/// Printer driver adapter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterDriverKind {
    Bixolon,
    Mock,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KioskSection {
    #[serde(default = "default_kiosk_id")]
    pub id: String,
    #[serde(default = "default_mode")]
    pub mode: DeploymentMode,
}

impl Default for KioskSection {
    fn default() -> Self {
        Self { id: default_kiosk_id(), mode: default_mode() }
    }
}

fn default_kiosk_id() -> String {
    "kiosk".to_string()
}

fn default_mode() -> DeploymentMode {
    DeploymentMode::Prod
}

#[derive(Debug, Clone, Deserialize)]
pub struct SerialSection {
    #[serde(default = "default_serial_device")]
    pub device: String,
    #[serde(default = "default_serial_baud")]
    pub baud: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            device: default_serial_device(),
            baud: default_serial_baud(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_serial_device() -> String {
    "COM5".to_string()
}

fn default_serial_baud() -> u32 {
    4800
}

fn default_retry_delay_ms() -> u64 {
    RETRY_DELAY.as_millis() as u64
}

fn default_max_retries() -> u32 {
    MAX_RETRY
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrinterSection {
    #[serde(default = "default_printer_driver")]
    pub driver: PrinterDriverKind,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_device_index")]
    pub device_index: i32,
    #[serde(default)]
    pub comm_mode: String,
}

impl Default for PrinterSection {
    fn default() -> Self {
        Self {
            driver: default_printer_driver(),
            poll_interval_ms: default_poll_interval_ms(),
            device_index: default_device_index(),
            comm_mode: String::new(),
        }
    }
}

fn default_printer_driver() -> PrinterDriverKind {
    PrinterDriverKind::Bixolon
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_device_index() -> i32 {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Request timeout (0 disables it)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Skip TLS certificate validation (the production backend uses an untrusted certificate)
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            timeout_ms: default_timeout_ms(),
            accept_invalid_certs: default_accept_invalid_certs(),
        }
    }
}

fn default_base_url() -> String {
    "https://next.xi.co.kr/api/v2/fmcs".to_string()
}

fn default_heartbeat_interval_ms() -> u64 {
    10_000
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_accept_invalid_certs() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiSection {
    #[serde(default = "default_login_url")]
    pub login_url: String,
}

impl Default for UiSection {
    fn default() -> Self {
        Self { login_url: default_login_url() }
    }
}

fn default_login_url() -> String {
    "https://next-app.xi.co.kr/kiosk/login".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSection {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
    /// Prometheus metrics HTTP port (0 to disable)
    #[serde(default)]
    pub prometheus_port: u16,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval_secs(), prometheus_port: 0 }
    }
}

fn default_metrics_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub kiosk: KioskSection,
    #[serde(default)]
    pub serial: SerialSection,
    #[serde(default)]
    pub printer: PrinterSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
    #[serde(default)]
    pub ui: UiSection,
    #[serde(default)]
    pub metrics: MetricsSection,
}

/// Main configuration struct used throughout the application.
///
/// Immutable after start.
#[derive(Debug, Clone)]
pub struct Config {
    kiosk_id: String,
    mode: DeploymentMode,
    serial_device: String,
    serial_baud: u32,
    serial_retry_delay_ms: u64,
    serial_max_retries: u32,
    printer_driver: PrinterDriverKind,
    printer_poll_interval_ms: u64,
    printer_device_index: i32,
    printer_comm_mode: String,
    telemetry_base_url: String,
    heartbeat_interval_ms: u64,
    telemetry_timeout_ms: u64,
    accept_invalid_certs: bool,
    login_url: String,
    metrics_interval_secs: u64,
    prometheus_port: u16,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            kiosk_id: toml_config.kiosk.id,
            mode: toml_config.kiosk.mode,
            serial_device: toml_config.serial.device,
            serial_baud: toml_config.serial.baud,
            serial_retry_delay_ms: toml_config.serial.retry_delay_ms,
            serial_max_retries: toml_config.serial.max_retries,
            printer_driver: toml_config.printer.driver,
            printer_poll_interval_ms: toml_config.printer.poll_interval_ms,
            printer_device_index: toml_config.printer.device_index,
            printer_comm_mode: toml_config.printer.comm_mode,
            telemetry_base_url: toml_config.telemetry.base_url,
            heartbeat_interval_ms: toml_config.telemetry.heartbeat_interval_ms,
            telemetry_timeout_ms: toml_config.telemetry.timeout_ms,
            accept_invalid_certs: toml_config.telemetry.accept_invalid_certs,
            login_url: toml_config.ui.login_url,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            prometheus_port: toml_config.metrics.prometheus_port,
            config_file: config_file.to_string(),
        }
    }

    /// Pick the config file: the `--config` value, then `CONFIG_FILE`, then
    /// `config/kiosk.toml`
    pub fn resolve_config_path(cli_path: Option<String>) -> String {
        cli_path
            .or_else(|| env::var("CONFIG_FILE").ok())
            .unwrap_or_else(|| "config/kiosk.toml".to_string())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Self::from_toml_str(&content, &path.display().to_string())
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str, source: &str) -> anyhow::Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content)?;
        Ok(Self::from_toml(toml_config, source))
    }

    /// Load from an explicit path, falling back to defaults, then apply
    /// environment overrides
    pub fn load_from_path(path: &str) -> Self {
        let config = match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        };

        config.with_env_overrides(env::var("KIOSK_ID").ok(), env::var("KIOSK_APP_MODE").ok())
    }

    /// Apply `KIOSK_ID` / `KIOSK_APP_MODE` values. Unknown modes are ignored.
    pub fn with_env_overrides(mut self, kiosk_id: Option<String>, mode: Option<String>) -> Self {
        if let Some(id) = kiosk_id.filter(|id| !id.trim().is_empty()) {
            self.kiosk_id = id.trim().to_string();
        }
        if let Some(mode) = mode.as_deref().and_then(DeploymentMode::from_env_value) {
            self.mode = mode;
        }
        self
    }

    /// Serial retry policy
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_millis(self.serial_retry_delay_ms),
            max_retries: self.serial_max_retries,
        }
    }

    /// Arguments for the printer driver's open call
    pub fn printer_open_params(&self) -> OpenParams {
        OpenParams {
            device_index: self.printer_device_index,
            comm_mode: self.printer_comm_mode.clone(),
            params: [0; 5],
        }
    }

    /// Telemetry endpoint URL
    pub fn telemetry_update_url(&self) -> String {
        format!("{}/kiosk/update/time", self.telemetry_base_url.trim_end_matches('/'))
    }

    // Getters for all config fields
    pub fn kiosk_id(&self) -> &str {
        &self.kiosk_id
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn serial_device(&self) -> &str {
        &self.serial_device
    }

    pub fn serial_baud(&self) -> u32 {
        self.serial_baud
    }

    pub fn printer_driver(&self) -> PrinterDriverKind {
        self.printer_driver
    }

    pub fn printer_poll_interval(&self) -> Duration {
        Duration::from_millis(self.printer_poll_interval_ms)
    }

    pub fn telemetry_base_url(&self) -> &str {
        &self.telemetry_base_url
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// `None` when the timeout is disabled
    pub fn telemetry_timeout(&self) -> Option<Duration> {
        (self.telemetry_timeout_ms > 0).then(|| Duration::from_millis(self.telemetry_timeout_ms))
    }

    pub fn accept_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn prometheus_port(&self) -> u16 {
        self.prometheus_port
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to point telemetry at another backend
    #[cfg(test)]
    pub fn with_telemetry_base_url(mut self, url: &str) -> Self {
        self.telemetry_base_url = url.to_string();
        self
    }
}
