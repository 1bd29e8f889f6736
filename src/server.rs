use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::Config;
use crate::connection::handle_connection;
use crate::error::RtmpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPhase {
    /// Waiting for clients, none connected.
    Accepting,
    /// At least one live connection. New clients are still accepted.
    InProgress,
    /// Stop requested, draining in-flight connections.
    Stopping,
    Stopped,
}

struct LifecycleState {
    phase: ServerPhase,
    in_flight: usize,
}

/// Tracks the phase and the number of live connections, so shutdown can block
/// until the last connection drains instead of polling.
struct Lifecycle {
    state: Mutex<LifecycleState>,
    drained: Condvar,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: Mutex::new(LifecycleState {
                phase: ServerPhase::Accepting,
                in_flight: 0,
            }),
            drained: Condvar::new(),
        }
    }

    /// Registers a new connection. Refused once a stop was requested.
    fn connection_started(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.phase {
            ServerPhase::Accepting | ServerPhase::InProgress => {
                state.in_flight += 1;
                state.phase = ServerPhase::InProgress;
                true
            }
            ServerPhase::Stopping | ServerPhase::Stopped => false,
        }
    }

    fn connection_finished(&self) {
        let mut state = self.state.lock().unwrap();
        state.in_flight -= 1;
        if state.in_flight > 0 {
            return;
        }
        match state.phase {
            ServerPhase::Stopping => {
                state.phase = ServerPhase::Stopped;
                self.drained.notify_all();
            }
            ServerPhase::InProgress => state.phase = ServerPhase::Accepting,
            ServerPhase::Accepting | ServerPhase::Stopped => {}
        }
    }

    fn request_stop(&self) {
        let mut state = self.state.lock().unwrap();
        if matches!(state.phase, ServerPhase::Stopping | ServerPhase::Stopped) {
            return;
        }
        state.phase = if state.in_flight == 0 {
            self.drained.notify_all();
            ServerPhase::Stopped
        } else {
            ServerPhase::Stopping
        };
    }

    fn wait_stopped(&self) {
        let mut state = self.state.lock().unwrap();
        while state.phase != ServerPhase::Stopped {
            state = self.drained.wait(state).unwrap();
        }
    }

    fn phase(&self) -> ServerPhase {
        self.state.lock().unwrap().phase
    }
}

pub struct RtmpServer {
    shutdown: Arc<AtomicBool>,
    lifecycle: Arc<Lifecycle>,
    local_addr: SocketAddr,
}

impl RtmpServer {
    /// Binds the listener and spawns the accept thread. Binding failures are
    /// fatal, accept failures are not.
    pub fn start(config: Config) -> Result<Self, RtmpError> {
        let addr = SocketAddr::from((config.bind_address, config.port));
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let lifecycle = Arc::new(Lifecycle::new());

        info!(%local_addr, "RTMP server running");

        let accept_shutdown = shutdown.clone();
        let accept_lifecycle = lifecycle.clone();
        thread::Builder::new()
            .name("RTMP server".to_string())
            .spawn(move || {
                accept_loop(listener, config, accept_shutdown, accept_lifecycle);
            })?;

        Ok(Self {
            shutdown,
            lifecycle,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn phase(&self) -> ServerPhase {
        self.lifecycle.phase()
    }

    /// Stops accepting, then blocks until every in-flight connection ends.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.lifecycle.request_stop();
        self.lifecycle.wait_stopped();
        info!("RTMP server stopped");
    }
}

impl Drop for RtmpServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.lifecycle.request_stop();
    }
}

fn accept_loop(
    listener: TcpListener,
    config: Config,
    shutdown: Arc<AtomicBool>,
    lifecycle: Arc<Lifecycle>,
) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match listener.accept() {
            Ok((stream, peer_addr)) => {
                if !lifecycle.connection_started() {
                    debug!(%peer_addr, "refusing connection, server is stopping");
                    continue;
                }
                let config = config.clone();
                let lifecycle = lifecycle.clone();
                thread::spawn(move || {
                    if let Err(error) = stream.set_nonblocking(false) {
                        error!(?error, "failed to set stream blocking");
                    } else {
                        handle_connection(stream, &config);
                    }
                    lifecycle.connection_finished();
                });
            }
            Err(error) if error.kind() == ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(100));
            }
            Err(error) => {
                error!(?error, "accept error");
            }
        }
    }
    debug!("accept loop exited");
}
