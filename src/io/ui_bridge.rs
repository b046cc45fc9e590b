//! Typed channel towards the kiosk UI host
//!
//! The link manager talks to the UI through the `AlertSink`,
//! `NavigationSink` and `SessionOracle` traits. This module implements them
//! over a bounded mpsc channel of [`UiCommand`]s and a watch channel carrying
//! the host's session state, so a slow or absent UI never blocks the serial
//! task.

use crate::domain::ports::{AlertSink, NavigationSink, SessionOracle};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::warn;

/// Commands for the UI host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiCommand {
    ShowAlert { text: String },
    ClearAlert,
    Navigate { url: String },
}

/// Sender side of the UI channel
#[derive(Debug, Clone)]
pub struct UiBridge {
    tx: mpsc::Sender<UiCommand>,
}

impl UiBridge {
    pub fn new(tx: mpsc::Sender<UiCommand>) -> Self {
        Self { tx }
    }

    /// Returns whether the command was queued
    fn send(&self, command: UiCommand) -> bool {
        match self.tx.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(command)) => {
                warn!(command = ?command, "ui_channel_full");
                false
            }
            Err(TrySendError::Closed(command)) => {
                warn!(command = ?command, "ui_channel_closed");
                false
            }
        }
    }
}

impl AlertSink for UiBridge {
    fn show_alert(&self, text: &str) -> bool {
        self.send(UiCommand::ShowAlert { text: text.to_string() })
    }

    fn clear_alert(&self) {
        self.send(UiCommand::ClearAlert);
    }
}

impl NavigationSink for UiBridge {
    fn navigate(&self, url: &str) {
        self.send(UiCommand::Navigate { url: url.to_string() });
    }
}

/// Create the UI command channel
pub fn create_ui_channel(buffer_size: usize) -> (UiBridge, mpsc::Receiver<UiCommand>) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (UiBridge::new(tx), rx)
}

/// Session state published by the UI host
#[derive(Debug, Clone)]
pub struct SessionFlag {
    rx: watch::Receiver<bool>,
}

impl SessionFlag {
    /// Returns the flag and the sender used to update it (starts inactive)
    pub fn new() -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { rx }, tx)
    }
}

#[async_trait]
impl SessionOracle for SessionFlag {
    async fn has_active_session(&self) -> bool {
        *self.rx.borrow()
    }
}
