//! Command dispatch: the opcode → handler map and the handler contract.
//!
//! Handlers are registered once at startup; the map is immutable
//! afterwards. The dispatcher owns the response envelope: a handler only
//! produces a result value or an error, and arity is checked before the
//! handler runs. An unknown opcode is an error response, not a session
//! error -- the client stays connected.

pub mod args;
pub mod handlers;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use nimo_core::{Request, Response, Value};
use tracing::debug;

use crate::catalog::{CatalogError, CatalogStore};
use crate::status::StatusPublisher;

/// Errors a handler can produce. Both flatten into an error response;
/// neither ends the session.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Per-session information made available to handlers.
#[derive(Debug, Clone, Copy)]
pub struct SessionContext {
    pub session_id: u64,
    pub peer: SocketAddr,
}

/// One command operation: an opcode, an argument-count contract, and the
/// operation itself.
pub trait CommandHandler: Send + Sync {
    /// The opcode this handler answers to.
    fn opcode(&self) -> &'static str;

    /// Minimum and maximum argument count; `None` means unbounded.
    fn arity(&self) -> (usize, Option<usize>);

    /// Runs the operation. The dispatcher turns the result into a
    /// response envelope.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] for bad arguments or catalog failures.
    fn execute(&self, args: &[Value], ctx: &SessionContext) -> Result<Value, HandlerError>;
}

/// Immutable opcode → handler map.
pub struct HandlerMap {
    handlers: HashMap<&'static str, Arc<dyn CommandHandler>>,
}

impl HandlerMap {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler under its own opcode. Startup-time only; last
    /// registration wins on a duplicate opcode.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(handler.opcode(), handler);
    }

    #[must_use]
    pub fn contains(&self, opcode: &str) -> bool {
        self.handlers.contains_key(opcode)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Routes one request to its handler and builds the response.
    #[must_use]
    pub fn dispatch(&self, request: &Request, ctx: &SessionContext) -> Response {
        let Some(handler) = self.handlers.get(request.opcode.as_str()) else {
            debug!(
                opcode = %request.opcode,
                session = ctx.session_id,
                "unknown request opcode"
            );
            return Response::failure(
                request.opcode.clone(),
                format!("unknown request {:?}", request.opcode),
            );
        };

        let (min, max) = handler.arity();
        let given = request.args.len();
        let arity_ok = given >= min && max.is_none_or(|max| given <= max);
        if !arity_ok {
            return Response::failure(
                request.opcode.clone(),
                format!(
                    "invalid arguments: {:?} takes {} argument(s), got {given}",
                    request.opcode,
                    describe_arity(min, max),
                ),
            );
        }

        debug!(
            opcode = %request.opcode,
            session = ctx.session_id,
            "request received"
        );
        match handler.execute(&request.args, ctx) {
            Ok(result) => Response::success(request.opcode.clone(), result),
            Err(error) => Response::failure(request.opcode.clone(), error.to_string()),
        }
    }
}

impl Default for HandlerMap {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_arity(min: usize, max: Option<usize>) -> String {
    match max {
        Some(max) if max == min => format!("{min}"),
        Some(max) => format!("{min} to {max}"),
        None => format!("at least {min}"),
    }
}

/// Builds the full production handler map over one catalog and publisher.
#[must_use]
pub fn standard_handlers(
    catalog: Arc<CatalogStore>,
    publisher: Arc<StatusPublisher>,
) -> HandlerMap {
    let mut map = HandlerMap::new();
    handlers::machines::register(&mut map, &catalog, &publisher);
    handlers::nodes::register(&mut map, &catalog, &publisher);
    handlers::applications::register(&mut map, &catalog, &publisher);
    handlers::channels::register(&mut map, &catalog, &publisher);
    handlers::connections::register(&mut map, &catalog, &publisher);
    map
}
