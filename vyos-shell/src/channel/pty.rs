//! PTY channel for interactive shell sessions over russh.

use std::time::Duration;

use bytes::Bytes;
use log::trace;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};

use crate::error::{ChannelError, Result};

/// Configuration for PTY channel behavior.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Terminal type requested for the PTY.
    pub term: String,

    /// Terminal width.
    pub terminal_width: u32,

    /// Terminal height.
    pub terminal_height: u32,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            term: "vt100".to_string(),
            terminal_width: 511,
            terminal_height: 24,
        }
    }
}

/// Interactive shell channel with a PTY attached.
pub struct PtyChannel {
    channel: Channel<Msg>,
    is_open: bool,
}

impl PtyChannel {
    /// Wrap an already opened channel, requesting a PTY and a shell on it.
    pub async fn start(channel: Channel<Msg>, config: &PtyConfig) -> Result<Self> {
        channel
            .request_pty(
                true,
                &config.term,
                config.terminal_width,
                config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(|_| ChannelError::PtyOpenFailed)?;

        channel
            .request_shell(true)
            .await
            .map_err(|_| ChannelError::ShellRequestFailed)?;

        Ok(Self {
            channel,
            is_open: true,
        })
    }

    /// Write raw bytes to the shell.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.is_open {
            return Err(ChannelError::Closed.into());
        }
        self.channel
            .data(data)
            .await
            .map_err(ChannelError::Ssh)?;
        Ok(())
    }

    /// Wait at most `timeout` for the next chunk of shell output.
    pub async fn read_raw_chunk(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        if !self.is_open {
            return Err(ChannelError::Closed.into());
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let msg = match tokio::time::timeout_at(deadline, self.channel.wait()).await {
                Ok(msg) => msg,
                Err(_) => return Ok(None),
            };

            match msg {
                Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                    trace!("pty: {} bytes", data.len());
                    return Ok(Some(Bytes::copy_from_slice(&data)));
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    self.is_open = false;
                    return Err(ChannelError::Closed.into());
                }
                Some(_) => continue,
            }
        }
    }

    /// Check if the channel is open.
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Close the channel.
    pub async fn close(&mut self) -> Result<()> {
        if self.is_open {
            self.is_open = false;
            self.channel.eof().await.map_err(ChannelError::Ssh)?;
        }
        Ok(())
    }
}
