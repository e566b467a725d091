// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Target server controller.
//!
//! Starts the disposable responder and owns it until it is terminated.
//! A [`ServerHandle`] terminates its responder when dropped, so every exit
//! path of a run releases the port.

pub mod go;
pub mod responder;

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::sync::watch;

use crate::error::ServerError;
use crate::types::Port;

/// Poll interval while waiting for a terminated process to exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Responder lifecycle states. Terminated is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
    Starting = 0,
    Ready = 1,
    Terminated = 2,
}

impl ServerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Ready,
            _ => Self::Terminated,
        }
    }
}

/// Read-only view of a handle's state that outlives the handle.
#[derive(Debug, Clone)]
pub struct ServerStateWatch(Arc<AtomicU8>);

impl ServerStateWatch {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ServerState::Starting as u8)))
    }

    pub fn get(&self) -> ServerState {
        ServerState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: ServerState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// How a responder is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLauncher {
    /// External process; the port is appended as the final argument.
    Command { program: PathBuf, args: Vec<String> },
    /// The axum responder on a dedicated thread of this process.
    Embedded,
}

impl ServerLauncher {
    /// Re-execute the running binary with `args` followed by the port.
    pub fn current_exe(args: &[&str]) -> Result<Self, ServerError> {
        let program = std::env::current_exe().map_err(|e| ServerError::SpawnFailed {
            program: "<current executable>".to_string(),
            source: e,
        })?;
        Ok(Self::Command {
            program,
            args: args.iter().map(|a| a.to_string()).collect(),
        })
    }

    /// Build the Go responder when possible, otherwise use `fallback`.
    pub fn prefer_go(go_source: &Path, build_dir: &Path, fallback: ServerLauncher) -> Self {
        if !go::toolchain_available() {
            tracing::debug!("Go toolchain not found, using fallback responder");
            return fallback;
        }

        match go::build(go_source, build_dir) {
            Ok(program) => Self::Command {
                program,
                args: Vec::new(),
            },
            Err(e) => {
                tracing::warn!(error = %e, "Go responder unavailable, using fallback responder");
                fallback
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Command { program, args } if args.is_empty() => program.display().to_string(),
            Self::Command { program, args } => {
                format!("{} {}", program.display(), args.join(" "))
            }
            Self::Embedded => "embedded".to_string(),
        }
    }

    /// Spawn the responder bound to `0.0.0.0:port`.
    ///
    /// The returned handle is in the Starting state; readiness is confirmed
    /// separately by the readiness prober.
    pub fn start(&self, port: Port, grace: Duration) -> Result<ServerHandle, ServerError> {
        let backend = match self {
            Self::Command { program, args } => {
                let child = Command::new(program)
                    .args(args)
                    .arg(port.to_string())
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::inherit())
                    .spawn()
                    .map_err(|e| ServerError::SpawnFailed {
                        program: program.display().to_string(),
                        source: e,
                    })?;
                Backend::Process { child }
            }
            Self::Embedded => start_embedded(port, grace)?,
        };

        let handle = ServerHandle {
            backend,
            port,
            grace,
            state: ServerStateWatch::new(),
        };

        tracing::info!(
            launcher = %self.describe(),
            port = %port,
            pid = ?handle.pid(),
            "Started responder"
        );

        Ok(handle)
    }
}

fn start_embedded(port: Port, grace: Duration) -> Result<Backend, ServerError> {
    let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let thread = std::thread::Builder::new()
        .name(format!("responder-{}", port))
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };

            runtime.block_on(async move {
                let listener = match responder::bind(port).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                let mut graceful = shutdown_rx.clone();
                let shutdown = async move {
                    let _ = graceful.wait_for(|stop| *stop).await;
                };
                // Idle keep-alive connections may outlive the signal
                let mut forced = shutdown_rx;
                let deadline = async move {
                    let _ = forced.wait_for(|stop| *stop).await;
                    tokio::time::sleep(grace).await;
                };

                tokio::select! {
                    result = responder::serve_on(listener, shutdown) => {
                        if let Err(e) = result {
                            tracing::warn!(error = %e, "Embedded responder stopped with error");
                        }
                    }
                    _ = deadline => {
                        tracing::debug!(port = %port, "Embedded responder closed with open connections");
                    }
                }
            });
        })
        .map_err(|e| ServerError::EmbeddedFailed {
            port,
            reason: e.to_string(),
        })?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(Backend::Embedded {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        }),
        Ok(Err(reason)) => {
            let _ = thread.join();
            Err(ServerError::EmbeddedFailed { port, reason })
        }
        Err(_) => {
            let _ = thread.join();
            Err(ServerError::EmbeddedFailed {
                port,
                reason: "responder thread exited before binding".to_string(),
            })
        }
    }
}

enum Backend {
    Process {
        child: Child,
    },
    Embedded {
        shutdown: Option<watch::Sender<bool>>,
        thread: Option<JoinHandle<()>>,
    },
}

/// Exclusive owner of a running responder.
pub struct ServerHandle {
    backend: Backend,
    port: Port,
    grace: Duration,
    state: ServerStateWatch,
}

impl ServerHandle {
    pub fn port(&self) -> Port {
        self.port
    }

    /// URL the harness uses to reach the responder.
    pub fn url(&self) -> String {
        self.port.local_url()
    }

    pub fn state(&self) -> ServerState {
        self.state.get()
    }

    /// A watch that keeps reporting the state after the handle is gone.
    pub fn watch(&self) -> ServerStateWatch {
        self.state.clone()
    }

    /// Process ID of an external responder.
    pub fn pid(&self) -> Option<u32> {
        match &self.backend {
            Backend::Process { child } => Some(child.id()),
            Backend::Embedded { .. } => None,
        }
    }

    /// Record that the readiness probe saw an answer.
    pub fn mark_ready(&self) {
        if self.state.get() == ServerState::Starting {
            self.state.set(ServerState::Ready);
        }
    }

    /// Stop the responder. Best-effort and idempotent; errors are logged only.
    pub fn terminate(&mut self) {
        if self.state.get() == ServerState::Terminated {
            return;
        }

        match &mut self.backend {
            Backend::Process { child } => terminate_process(child, self.grace),
            Backend::Embedded { shutdown, thread } => {
                if let Some(tx) = shutdown.take() {
                    let _ = tx.send(true);
                }
                if let Some(thread) = thread.take() {
                    if thread.join().is_err() {
                        tracing::warn!(port = %self.port, "Embedded responder thread panicked");
                    }
                }
            }
        }

        self.state.set(ServerState::Terminated);
        tracing::info!(port = %self.port, "Responder terminated");
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn terminate_process(child: &mut Child, grace: Duration) {
    let pid = child.id();

    match i32::try_from(pid) {
        Ok(raw) => {
            if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
                tracing::warn!(pid, error = %e, "Failed to send SIGTERM to responder");
            }
        }
        Err(_) => tracing::warn!(pid, "Responder PID out of range for signalling"),
    }

    let deadline = Instant::now() + grace;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(pid, status = %status, "Responder exited");
                return;
            }
            Ok(None) if Instant::now() < deadline => std::thread::sleep(EXIT_POLL_INTERVAL),
            Ok(None) => {
                tracing::warn!(pid, "Responder ignored SIGTERM, killing");
                if let Err(e) = child.kill() {
                    tracing::warn!(pid, error = %e, "Failed to kill responder");
                }
                let _ = child.wait();
                return;
            }
            Err(e) => {
                tracing::warn!(pid, error = %e, "Failed to reap responder");
                return;
            }
        }
    }
}
