//! Status-channel event schema.
//!
//! Every externally observable catalog mutation is multicast as one
//! datagram holding an array `[kindString, payload…]`. Observers that miss
//! a datagram re-sync by querying the Registry; nothing here is
//! acknowledged or retried, so the schema stays flat and self-contained.

use std::net::Ipv4Addr;

use crate::schema::{ChannelDirection, NodeEndpoint, ServiceType, TransportModes};
use crate::value::Value;

/// The kind strings carried in position 0 of every status datagram.
pub mod kinds {
    pub const MACHINE_ADDED: &str = "machine-added";
    pub const MACHINE_REMOVED: &str = "machine-removed";
    pub const NODE_ADDED: &str = "node-added";
    pub const NODE_REMOVED: &str = "node-removed";
    pub const CHANNEL_ADDED: &str = "channel-added";
    pub const CHANNEL_REMOVED: &str = "channel-removed";
    pub const CONNECTION_ADDED: &str = "connection-added";
    pub const CONNECTION_REMOVED: &str = "connection-removed";
    pub const APPLICATION_SET: &str = "application-set";
}

/// Errors from interpreting a decoded [`Value`] as a status event.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event payload is a {0}, not an array")]
    NotAnArray(&'static str),
    #[error("event is missing its kind string")]
    MissingKind,
    #[error("unknown event kind {0:?}")]
    UnknownKind(String),
    #[error("event field {0} is missing or mistyped")]
    BadField(&'static str),
}

/// A catalog state change as multicast on the status group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    MachineAdded {
        name: String,
        address: Ipv4Addr,
    },
    MachineRemoved {
        name: String,
    },
    NodeAdded {
        name: String,
        machine: String,
        service_type: ServiceType,
        endpoint: NodeEndpoint,
    },
    NodeRemoved {
        name: String,
    },
    ChannelAdded {
        node: String,
        path: String,
        direction: ChannelDirection,
        data_type: String,
    },
    ChannelRemoved {
        node: String,
        path: String,
    },
    ConnectionAdded {
        from_node: String,
        from_path: String,
        to_node: String,
        to_path: String,
        data_type: String,
        mode: TransportModes,
    },
    ConnectionRemoved {
        from_node: String,
        from_path: String,
        to_node: String,
        to_path: String,
    },
    ApplicationSet {
        node: String,
        application: String,
    },
}

impl StatusEvent {
    /// The kind string this event carries in position 0.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MachineAdded { .. } => kinds::MACHINE_ADDED,
            Self::MachineRemoved { .. } => kinds::MACHINE_REMOVED,
            Self::NodeAdded { .. } => kinds::NODE_ADDED,
            Self::NodeRemoved { .. } => kinds::NODE_REMOVED,
            Self::ChannelAdded { .. } => kinds::CHANNEL_ADDED,
            Self::ChannelRemoved { .. } => kinds::CHANNEL_REMOVED,
            Self::ConnectionAdded { .. } => kinds::CONNECTION_ADDED,
            Self::ConnectionRemoved { .. } => kinds::CONNECTION_REMOVED,
            Self::ApplicationSet { .. } => kinds::APPLICATION_SET,
        }
    }

    /// Flattens this event into its wire array.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let kind = Value::String(self.kind().to_string());
        let items = match self {
            Self::MachineAdded { name, address } => vec![
                kind,
                Value::String(name.clone()),
                Value::Integer(i64::from(u32::from(*address))),
            ],
            Self::MachineRemoved { name } | Self::NodeRemoved { name } => {
                vec![kind, Value::String(name.clone())]
            }
            Self::NodeAdded {
                name,
                machine,
                service_type,
                endpoint,
            } => vec![
                kind,
                Value::String(name.clone()),
                Value::String(machine.clone()),
                Value::Integer(service_type.wire_value()),
                endpoint_to_value(*endpoint),
            ],
            Self::ChannelAdded {
                node,
                path,
                direction,
                data_type,
            } => vec![
                kind,
                Value::String(node.clone()),
                Value::String(path.clone()),
                Value::Logical(direction.is_output()),
                Value::String(data_type.clone()),
            ],
            Self::ChannelRemoved { node, path } => vec![
                kind,
                Value::String(node.clone()),
                Value::String(path.clone()),
            ],
            Self::ConnectionAdded {
                from_node,
                from_path,
                to_node,
                to_path,
                data_type,
                mode,
            } => vec![
                kind,
                Value::String(from_node.clone()),
                Value::String(from_path.clone()),
                Value::String(to_node.clone()),
                Value::String(to_path.clone()),
                Value::String(data_type.clone()),
                Value::Integer(i64::from(mode.bits())),
            ],
            Self::ConnectionRemoved {
                from_node,
                from_path,
                to_node,
                to_path,
            } => vec![
                kind,
                Value::String(from_node.clone()),
                Value::String(from_path.clone()),
                Value::String(to_node.clone()),
                Value::String(to_path.clone()),
            ],
            Self::ApplicationSet { node, application } => vec![
                kind,
                Value::String(node.clone()),
                Value::String(application.clone()),
            ],
        };
        Value::Array(items)
    }

    /// Interprets a decoded datagram payload as a status event.
    ///
    /// # Errors
    ///
    /// Returns an [`EventError`] for unknown kinds or mistyped fields.
    pub fn from_value(value: Value) -> Result<Self, EventError> {
        let Value::Array(items) = value else {
            return Err(EventError::NotAnArray(value.kind()));
        };
        let mut items = items.into_iter();
        let kind = match items.next() {
            Some(Value::String(s)) => s,
            Some(_) | None => return Err(EventError::MissingKind),
        };
        match kind.as_str() {
            kinds::MACHINE_ADDED => Ok(Self::MachineAdded {
                name: take_string(&mut items, "name")?,
                address: take_address(&mut items, "address")?,
            }),
            kinds::MACHINE_REMOVED => Ok(Self::MachineRemoved {
                name: take_string(&mut items, "name")?,
            }),
            kinds::NODE_ADDED => Ok(Self::NodeAdded {
                name: take_string(&mut items, "name")?,
                machine: take_string(&mut items, "machine")?,
                service_type: take_service_type(&mut items)?,
                endpoint: take_endpoint(&mut items)?,
            }),
            kinds::NODE_REMOVED => Ok(Self::NodeRemoved {
                name: take_string(&mut items, "name")?,
            }),
            kinds::CHANNEL_ADDED => Ok(Self::ChannelAdded {
                node: take_string(&mut items, "node")?,
                path: take_string(&mut items, "path")?,
                direction: ChannelDirection::from_is_output(take_logical(
                    &mut items,
                    "direction",
                )?),
                data_type: take_string(&mut items, "dataType")?,
            }),
            kinds::CHANNEL_REMOVED => Ok(Self::ChannelRemoved {
                node: take_string(&mut items, "node")?,
                path: take_string(&mut items, "path")?,
            }),
            kinds::CONNECTION_ADDED => Ok(Self::ConnectionAdded {
                from_node: take_string(&mut items, "fromNode")?,
                from_path: take_string(&mut items, "fromPath")?,
                to_node: take_string(&mut items, "toNode")?,
                to_path: take_string(&mut items, "toPath")?,
                data_type: take_string(&mut items, "dataType")?,
                mode: take_modes(&mut items, "mode")?,
            }),
            kinds::CONNECTION_REMOVED => Ok(Self::ConnectionRemoved {
                from_node: take_string(&mut items, "fromNode")?,
                from_path: take_string(&mut items, "fromPath")?,
                to_node: take_string(&mut items, "toNode")?,
                to_path: take_string(&mut items, "toPath")?,
            }),
            kinds::APPLICATION_SET => Ok(Self::ApplicationSet {
                node: take_string(&mut items, "node")?,
                application: take_string(&mut items, "application")?,
            }),
            _ => Err(EventError::UnknownKind(kind)),
        }
    }
}

fn endpoint_to_value(endpoint: NodeEndpoint) -> Value {
    Value::Array(vec![
        Value::Integer(i64::from(u32::from(endpoint.address))),
        Value::Integer(i64::from(endpoint.port)),
    ])
}

fn take_string(
    items: &mut impl Iterator<Item = Value>,
    field: &'static str,
) -> Result<String, EventError> {
    match items.next() {
        Some(Value::String(s)) => Ok(s),
        _ => Err(EventError::BadField(field)),
    }
}

fn take_logical(
    items: &mut impl Iterator<Item = Value>,
    field: &'static str,
) -> Result<bool, EventError> {
    match items.next() {
        Some(Value::Logical(b)) => Ok(b),
        _ => Err(EventError::BadField(field)),
    }
}

fn take_i64(
    items: &mut impl Iterator<Item = Value>,
    field: &'static str,
) -> Result<i64, EventError> {
    match items.next() {
        Some(Value::Integer(i)) => Ok(i),
        _ => Err(EventError::BadField(field)),
    }
}

fn take_address(
    items: &mut impl Iterator<Item = Value>,
    field: &'static str,
) -> Result<Ipv4Addr, EventError> {
    let raw = take_i64(items, field)?;
    u32::try_from(raw)
        .map(Ipv4Addr::from)
        .map_err(|_| EventError::BadField(field))
}

fn take_service_type(
    items: &mut impl Iterator<Item = Value>,
) -> Result<ServiceType, EventError> {
    let raw = take_i64(items, "serviceType")?;
    ServiceType::from_wire_value(raw).ok_or(EventError::BadField("serviceType"))
}

fn take_modes(
    items: &mut impl Iterator<Item = Value>,
    field: &'static str,
) -> Result<TransportModes, EventError> {
    let raw = take_i64(items, field)?;
    u32::try_from(raw)
        .map(TransportModes::from_bits)
        .map_err(|_| EventError::BadField(field))
}

fn take_endpoint(items: &mut impl Iterator<Item = Value>) -> Result<NodeEndpoint, EventError> {
    let Some(Value::Array(parts)) = items.next() else {
        return Err(EventError::BadField("endpoint"));
    };
    let mut parts = parts.into_iter();
    let address = take_address(&mut parts, "endpoint.address")?;
    let port = take_i64(&mut parts, "endpoint.port")?;
    let port = u16::try_from(port).map_err(|_| EventError::BadField("endpoint.port"))?;
    Ok(NodeEndpoint::new(address, port))
}
