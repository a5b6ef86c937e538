//! Command-port accept loop and live-session tracking.
//!
//! Follows the deferred startup pattern: `bind()` claims the port (0 =
//! OS-assigned; the actual port feeds the discovery announcer), `serve()`
//! accepts until shutdown. Each accepted socket becomes an independent
//! session task tracked in a [`SessionRegistry`], so shutdown can drain
//! in-flight requests and then abort whatever is left.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::net::TcpListener;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::command::HandlerMap;

use super::session::run_session;
use super::shutdown::ShutdownController;

/// One live session as the registry sees it.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: u64,
    pub peer: SocketAddr,
    abort: AbortHandle,
}

/// Thread-safe registry of live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<u64, SessionHandle>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    /// Creates an empty registry. Session ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn register(&self, id: u64, peer: SocketAddr, abort: AbortHandle) {
        self.sessions.insert(id, SessionHandle { id, peer, abort });
    }

    /// Removes a completed session. Missing ids are fine: a session that
    /// finished before registration simply has nothing to remove.
    pub fn remove(&self, id: u64) {
        self.sessions.remove(&id);
    }

    /// Number of live sessions.
    #[must_use]
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Aborts every remaining session task. Aborting a task that already
    /// completed is a no-op.
    pub fn abort_all(&self) {
        let ids: Vec<u64> = self.sessions.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, handle)) = self.sessions.remove(&id) {
                handle.abort.abort();
            }
        }
    }
}

/// The command-port listener.
pub struct CommandListener {
    listener: TcpListener,
    sessions: Arc<SessionRegistry>,
    shutdown: Arc<ShutdownController>,
    drain_timeout: Duration,
}

impl CommandListener {
    /// Binds the command port. Port 0 asks the OS for an ephemeral port;
    /// read it back with [`CommandListener::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns the bind error (port in use, permissions).
    pub async fn bind(
        port: u16,
        shutdown: Arc<ShutdownController>,
        drain_timeout: Duration,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        info!(port = listener.local_addr()?.port(), "command port bound");
        Ok(Self {
            listener,
            sessions: Arc::new(SessionRegistry::new()),
            shutdown,
            drain_timeout,
        })
    }

    /// The actually bound address.
    ///
    /// # Errors
    ///
    /// Propagates the socket error.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared handle to the live-session registry.
    #[must_use]
    pub fn sessions(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.sessions)
    }

    /// Accepts sessions until shutdown is triggered, then drains in-flight
    /// requests up to the deadline and aborts the rest.
    pub async fn serve(self, handlers: Arc<HandlerMap>) {
        let mut stop = self.shutdown.shutdown_receiver();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        let id = self.sessions.allocate_id();
                        let handlers = Arc::clone(&handlers);
                        let session_shutdown = Arc::clone(&self.shutdown);
                        let registry = Arc::clone(&self.sessions);
                        let task = tokio::spawn(async move {
                            run_session(socket, peer, id, handlers, session_shutdown).await;
                            registry.remove(id);
                        });
                        self.sessions.register(id, peer, task.abort_handle());
                        debug!(session = id, %peer, "session accepted");
                    }
                    Err(error) => {
                        // Transient accept failures (EMFILE and friends)
                        // must not kill the loop.
                        warn!(%error, "accept failed");
                    }
                },
                _ = stop.changed() => break,
            }
        }

        debug!(live = self.sessions.count(), "accept loop stopped");
        if !self.shutdown.wait_for_drain(self.drain_timeout).await {
            warn!(
                remaining = self.shutdown.in_flight_count(),
                "drain deadline passed; aborting sessions"
            );
        }
        self.sessions.abort_all();
    }
}
