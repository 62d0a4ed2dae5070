// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Accepts connections and handles each on its own spawned task so a slow
//! or stuck client never blocks another's request. `Subscribe` connections
//! instead stay open and stream `ProcessStateChanged` signals until the
//! client disconnects.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, warn};

use crate::agent::{AgentCore, AgentError};
use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT};

/// Errors from connection handling.
#[derive(Debug, Error)]
pub(crate) enum ConnectionError {
    #[error("protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),
}

/// Listener task for accepting socket connections.
pub struct Listener {
    socket: UnixListener,
    agent: Arc<AgentCore>,
}

impl Listener {
    pub fn bind(path: &Path, agent: Arc<AgentCore>) -> std::io::Result<Self> {
        let _ = std::fs::remove_file(path);
        let socket = UnixListener::bind(path)?;
        Ok(Self { socket, agent })
    }

    /// Runs the accept loop until the process is torn down. Each connection
    /// is handled on its own spawned task.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let agent = Arc::clone(&self.agent);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &agent).await {
                            match e {
                                ConnectionError::Protocol(protocol::ProtocolError::ConnectionClosed) => {
                                    debug!("client disconnected")
                                }
                                ConnectionError::Protocol(protocol::ProtocolError::Timeout) => {
                                    warn!("connection timeout")
                                }
                                _ => error!("connection error: {}", e),
                            }
                        }
                    });
                }
                Err(e) => error!("accept error: {}", e),
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, agent: &AgentCore) -> Result<(), ConnectionError> {
    let (mut reader, mut writer) = stream.into_split();
    let request = protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await?;

    if matches!(request, Request::Subscribe) {
        let mut signals = agent.subscribe();
        loop {
            match signals.recv().await {
                Ok(signal) => {
                    let response: Response = signal.into();
                    if protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
                        .await
                        .is_err()
                    {
                        return Ok(());
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return Ok(()),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    }

    debug!(request = ?request, "received request");
    let response = dispatch(agent, request).await;
    debug!(response = ?response, "sending response");
    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
    Ok(())
}

async fn dispatch(agent: &AgentCore, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::CreateContainer { prefix } => match agent.create_container(&prefix).await {
            Ok(handle) => Response::Handle { handle: handle.0 },
            Err(e) => error_response(&e),
        },

        Request::SetCapabilities { handle, ids } => {
            let ids = ids
                .iter()
                .map(|s| sc_core::CapabilityName::new(s.as_str()))
                .collect::<Vec<_>>();
            match agent.set_capabilities(sc_core::ContainerHandle(handle), &ids).await {
                Ok(()) => Response::Ok,
                Err(e) => error_response(&e),
            }
        }

        Request::SetGatewayConfigs { handle, configs } => {
            match agent.set_gateway_configs(sc_core::ContainerHandle(handle), &configs).await {
                Ok(()) => Response::Ok,
                Err(e) => error_response(&e),
            }
        }

        Request::LaunchCommand { handle, user, cmdline, cwd, out_file, env } => {
            match agent
                .launch(sc_core::ContainerHandle(handle), cmdline, user, cwd, out_file, env)
                .await
            {
                Ok(pid) => Response::Pid { pid },
                Err(e) => error_response(&e),
            }
        }

        Request::WriteToStdIn { pid, bytes } => match agent.write_stdin(pid, &bytes).await {
            Ok(()) => Response::Ok,
            Err(e) => error_response(&e),
        },

        Request::ShutDownContainer { handle, timeout_secs } => {
            let timeout = timeout_secs.map(std::time::Duration::from_secs);
            match agent.shutdown_container(sc_core::ContainerHandle(handle), timeout).await {
                Ok(()) => Response::Ok,
                Err(e) => error_response(&e),
            }
        }

        Request::BindMountFolderInContainer { handle, host_path, container_path, read_only } => {
            match agent
                .bind_mount_folder_in_container(
                    sc_core::ContainerHandle(handle),
                    &host_path,
                    &container_path,
                    read_only,
                )
                .await
            {
                Ok(path) => Response::Path { path },
                Err(e) => error_response(&e),
            }
        }

        Request::Subscribe => unreachable!("handled before dispatch"),
    }
}

fn error_response(e: &AgentError) -> Response {
    Response::Error { error_kind: e.kind().to_string(), message: e.to_string() }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
