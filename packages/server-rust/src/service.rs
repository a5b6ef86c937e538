//! The Registry service: composition and lifecycle.
//!
//! Owns every long-lived piece -- catalog, publisher, handler map,
//! listener, announcer, shutdown controller -- and runs the whole thing
//! from probe to goodbye. Startup refuses to proceed when another
//! Registry already answers on the LAN; there is exactly one Registry per
//! network.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;

use tokio::signal;
use tracing::{info, warn};

use crate::catalog::CatalogStore;
use crate::command::standard_handlers;
use crate::config::RegistryConfig;
use crate::discovery::{self, AnnouncementData, MDNS_GROUP, MDNS_PORT};
use crate::network::{CommandListener, ShutdownController};
use crate::status::StatusPublisher;

/// The DNS-SD service type the Registry announces.
pub const SERVICE_TYPE: &str = "_nimo-registry._tcp.local.";

/// TXT key carrying the status multicast address.
pub const STATUS_ADDR_TXT_KEY: &str = "status-addr";

/// Fatal startup/runtime failures, each with its own exit code.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("another Registry is already running (answered from {0})")]
    AlreadyRunning(SocketAddr),
    #[error("could not bind the command port: {0}")]
    Bind(#[source] io::Error),
    #[error("discovery failed: {0}")]
    Discovery(#[source] io::Error),
    #[error("could not open the status socket: {0}")]
    Status(#[source] io::Error),
    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
}

impl ServiceError {
    /// Process exit code for this failure.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::AlreadyRunning(_) => 2,
            Self::Bind(_) => 3,
            Self::Discovery(_) | Self::Status(_) | Self::Runtime(_) => 1,
        }
    }
}

/// The composed Registry service.
pub struct RegistryService {
    config: RegistryConfig,
}

impl RegistryService {
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self { config }
    }

    /// Runs until SIGINT/SIGTERM, then shuts down in order: stop
    /// accepting, goodbye and join the announcer, drain sessions up to
    /// the grace deadline, close.
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`] for fatal startup failures; a clean
    /// signal-triggered shutdown is `Ok`.
    pub async fn run(self) -> Result<(), ServiceError> {
        let config = self.config;

        if config.discovery.enabled {
            let window = config.discovery.probe_window();
            let attempts = config.discovery.probe_attempts;
            let existing = tokio::task::spawn_blocking(move || {
                discovery::probe_for_registry(SERVICE_TYPE, window, attempts)
            })
            .await
            .map_err(|join| ServiceError::Runtime(join.into()))?
            .map_err(ServiceError::Discovery)?;
            if let Some(origin) = existing {
                return Err(ServiceError::AlreadyRunning(origin));
            }
        }

        let catalog = Arc::new(CatalogStore::new());
        let publisher = Arc::new(if config.status.enabled {
            StatusPublisher::new(config.status.group, config.status.port)
                .map_err(ServiceError::Status)?
        } else {
            StatusPublisher::disabled()
        });
        let handlers = Arc::new(standard_handlers(catalog, Arc::clone(&publisher)));

        let shutdown = Arc::new(ShutdownController::new());
        let listener = CommandListener::bind(
            config.command_port,
            Arc::clone(&shutdown),
            config.shutdown_grace(),
        )
        .await
        .map_err(ServiceError::Bind)?;
        let command_port = listener.local_addr().map_err(ServiceError::Bind)?.port();

        let announcer = if config.discovery.enabled {
            let data = AnnouncementData::new(
                SERVICE_TYPE,
                &short_host_name(),
                advertised_address(),
                command_port,
                vec![format!("{STATUS_ADDR_TXT_KEY}={}", publisher.target())],
            );
            Some(
                discovery::spawn(data, config.discovery.poll_interval())
                    .map_err(ServiceError::Discovery)?,
            )
        } else {
            None
        };

        shutdown.set_ready();
        info!(port = command_port, "Registry ready");

        let serve = tokio::spawn(listener.serve(handlers));
        wait_for_signal().await;
        info!("shutdown requested");
        shutdown.trigger_shutdown();

        serve.await.map_err(|join| ServiceError::Runtime(join.into()))?;

        if let Some(announcer) = announcer {
            // stop() joins the thread after it multicasts the goodbye.
            tokio::task::spawn_blocking(move || announcer.stop())
                .await
                .map_err(|join| ServiceError::Runtime(join.into()))?;
        }

        info!("Registry stopped");
        Ok(())
    }
}

/// Blocks until SIGINT or, on Unix, SIGTERM.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(error) => {
                warn!(%error, "SIGTERM handler unavailable; relying on ctrl-c");
                if let Err(error) = signal::ctrl_c().await {
                    warn!(%error, "ctrl-c handler failed");
                }
                return;
            }
        };
        tokio::select! {
            result = signal::ctrl_c() => {
                if let Err(error) = result {
                    warn!(%error, "ctrl-c handler failed");
                }
            }
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(error) = signal::ctrl_c().await {
            warn!(%error, "ctrl-c handler failed");
        }
    }
}

/// The short host name used to build the instance name.
fn short_host_name() -> String {
    let raw = hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let short = raw.split('.').next().unwrap_or_default().trim();
    if short.is_empty() {
        "registry-host".to_string()
    } else {
        short.to_string()
    }
}

/// The IPv4 address advertised in the A record.
///
/// Connecting a UDP socket to the mDNS group performs a route lookup
/// without sending anything; the chosen source address is the interface
/// multicast traffic will leave on. Loopback is the fallback when the
/// host has no multicast route.
fn advertised_address() -> Ipv4Addr {
    let candidate = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| {
            socket.connect((MDNS_GROUP, MDNS_PORT))?;
            socket.local_addr()
        })
        .ok()
        .and_then(|addr| match addr {
            SocketAddr::V4(v4) => Some(*v4.ip()),
            SocketAddr::V6(_) => None,
        });
    match candidate {
        Some(address) if !address.is_unspecified() => address,
        _ => Ipv4Addr::LOCALHOST,
    }
}
