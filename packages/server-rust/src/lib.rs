//! `nImO` Registry -- the authoritative catalog service for a data-flow
//! network.
//!
//! - **Catalog** ([`catalog`]): machines, nodes, applications, channels,
//!   connections; invariants and cascades
//! - **Protocol** ([`protocol`]): framed request/response codec over TCP
//! - **Command** ([`command`]): opcode dispatch and the per-operation
//!   handlers
//! - **Network** ([`network`]): listener, sessions, graceful shutdown
//! - **Status** ([`status`]): best-effort multicast of catalog changes
//! - **Discovery** ([`discovery`]): mDNS announcer and the
//!   one-Registry-per-network probe
//! - **Service** ([`service`]): composition, signals, lifecycle
//! - **Config** ([`config`]): defaults and TOML loading

pub mod catalog;
pub mod command;
pub mod config;
pub mod discovery;
pub mod network;
pub mod protocol;
pub mod service;
pub mod status;

pub use catalog::{CatalogError, CatalogStore};
pub use command::{standard_handlers, CommandHandler, HandlerMap};
pub use config::RegistryConfig;
pub use network::{CommandListener, ShutdownController};
pub use service::{RegistryService, ServiceError, SERVICE_TYPE};
pub use status::StatusPublisher;
