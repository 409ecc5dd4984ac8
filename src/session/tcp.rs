//! SCPI session over a raw TCP (LXI) socket.
//!
//! Most LXI-class instruments expose their SCPI interpreter on a plain TCP
//! port (conventionally 5025). Commands are newline-terminated text; query
//! responses are a single line. This module wraps that link with connect and
//! per-exchange timeouts.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

use super::InstrumentSession;
use crate::error::{AppResult, ScopeError};

/// Connection parameters for [`TcpSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Timeout for each command/query exchange. Export acknowledgments can
    /// take minutes, so the default is generous.
    pub io_timeout: Duration,
    /// Line terminator appended to outgoing commands.
    pub terminator: &'static str,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(3000),
            terminator: "\n",
        }
    }
}

/// A live SCPI-over-TCP instrument link.
#[derive(Debug)]
pub struct TcpSession {
    stream: Mutex<BufStream<TcpStream>>,
    config: SessionConfig,
    address: String,
}

impl TcpSession {
    /// Connect to `address` (`host:port`) with the given parameters.
    pub async fn connect(address: &str, config: SessionConfig) -> AppResult<Self> {
        let stream = timeout(config.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| transport_timeout("connect", &config.connect_timeout))?
            .map_err(|source| ScopeError::Transport {
                command: "connect".to_string(),
                source,
            })?;
        stream.set_nodelay(true).map_err(|source| ScopeError::Transport {
            command: "connect".to_string(),
            source,
        })?;
        debug!(address, "instrument link established");
        Ok(Self {
            stream: Mutex::new(BufStream::new(stream)),
            config,
            address: address.to_string(),
        })
    }

    /// Address this session is connected to.
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn write_line(&self, stream: &mut BufStream<TcpStream>, command: &str) -> AppResult<()> {
        let io = async {
            stream.write_all(command.as_bytes()).await?;
            stream.write_all(self.config.terminator.as_bytes()).await?;
            stream.flush().await
        };
        timeout(self.config.io_timeout, io)
            .await
            .map_err(|_| transport_timeout(command, &self.config.io_timeout))?
            .map_err(|source| ScopeError::Transport {
                command: command.to_string(),
                source,
            })
    }
}

fn transport_timeout(command: &str, after: &Duration) -> ScopeError {
    ScopeError::Transport {
        command: command.to_string(),
        source: std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("no response within {after:?}"),
        ),
    }
}

#[async_trait]
impl InstrumentSession for TcpSession {
    async fn command(&self, command: &str) -> AppResult<()> {
        let mut stream = self.stream.lock().await;
        debug!(command, "write");
        self.write_line(&mut stream, command).await
    }

    async fn query(&self, command: &str) -> AppResult<String> {
        let mut stream = self.stream.lock().await;
        debug!(command, "query");
        self.write_line(&mut stream, command).await?;

        let mut line = String::new();
        let read = timeout(self.config.io_timeout, stream.read_line(&mut line))
            .await
            .map_err(|_| transport_timeout(command, &self.config.io_timeout))?
            .map_err(|source| ScopeError::Transport {
                command: command.to_string(),
                source,
            })?;
        if read == 0 {
            return Err(ScopeError::Transport {
                command: command.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "link closed by instrument",
                ),
            });
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}
