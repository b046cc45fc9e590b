//! JSON-lines pipe to the UI host process
//!
//! Outbound (agent → host, one per line): serialized [`UiCommand`]s.
//! Inbound (host → agent, one per line): [`HostMessage`]s, currently only the
//! session state. Unparseable inbound lines are logged and skipped.

use crate::infra::shutdown::wait_for_shutdown;
use crate::io::ui_bridge::UiCommand;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Messages accepted from the host
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    Session { active: bool },
}

/// Run the pipe until shutdown, the host closes its input, or the UI
/// channel closes.
pub async fn run_host_pipe<R, W>(
    reader: R,
    mut writer: W,
    mut ui_rx: mpsc::Receiver<UiCommand>,
    session_tx: watch::Sender<bool>,
    mut shutdown: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut input_open = true;

    info!("host_pipe_started");

    loop {
        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => {
                info!("host_pipe_shutdown");
                return;
            }
            command = ui_rx.recv() => {
                let Some(command) = command else {
                    info!("host_pipe_ui_channel_closed");
                    return;
                };
                if let Err(e) = write_command(&mut writer, &command).await {
                    warn!(error = %e, "host_pipe_write_failed");
                }
            }
            line = lines.next_line(), if input_open => {
                match line {
                    Ok(Some(line)) => handle_host_line(&line, &session_tx),
                    Ok(None) => {
                        info!("host_pipe_input_closed");
                        input_open = false;
                    }
                    Err(e) => {
                        warn!(error = %e, "host_pipe_read_failed");
                        input_open = false;
                    }
                }
            }
        }
    }
}

async fn write_command<W: AsyncWrite + Unpin>(
    writer: &mut W,
    command: &UiCommand,
) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(command)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

fn handle_host_line(line: &str, session_tx: &watch::Sender<bool>) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    match serde_json::from_str::<HostMessage>(line) {
        Ok(HostMessage::Session { active }) => {
            debug!(active = %active, "host_session_state");
            session_tx.send_replace(active);
        }
        Err(e) => {
            warn!(error = %e, line = %line, "host_pipe_invalid_message");
        }
    }
}
