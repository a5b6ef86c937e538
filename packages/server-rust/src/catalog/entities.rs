//! Catalog entity records and their response flattenings.
//!
//! Entities reference each other by name only -- channels name their node,
//! connections name their endpoint channels -- so there is no object graph
//! to keep consistent beyond the maps in the store.

use std::fmt;

use nimo_core::{ChannelDirection, NodeEndpoint, ServiceType, TransportModes, Value};

/// How a node was started, kept so launchers can restart it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LaunchDetails {
    pub exec_path: String,
    pub working_dir: String,
    pub command_line: String,
}

/// A registered node: one process participating in the data-flow network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    pub machine: String,
    pub service_type: ServiceType,
    pub endpoint: NodeEndpoint,
    pub launch: LaunchDetails,
}

impl NodeInfo {
    /// Flattens into the response form
    /// `[name, machine, serviceType, [address, port], execPath, workingDir, commandLine]`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Array(vec![
            Value::String(self.name.clone()),
            Value::String(self.machine.clone()),
            Value::Integer(self.service_type.wire_value()),
            Value::Array(vec![
                Value::Integer(i64::from(u32::from(self.endpoint.address))),
                Value::Integer(i64::from(self.endpoint.port)),
            ]),
            Value::String(self.launch.exec_path.clone()),
            Value::String(self.launch.working_dir.clone()),
            Value::String(self.launch.command_line.clone()),
        ])
    }
}

/// Identifies a channel by its owning node and path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelKey {
    pub node: String,
    pub path: String,
}

impl ChannelKey {
    #[must_use]
    pub fn new(node: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.node, self.path)
    }
}

/// A typed I/O endpoint on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub node: String,
    pub path: String,
    pub direction: ChannelDirection,
    pub data_type: String,
    pub modes: TransportModes,
    /// Derived: whether a connection currently references this channel.
    pub in_use: bool,
}

impl ChannelInfo {
    /// Flattens into the response form
    /// `[node, path, isOutput, dataType, modes, inUse]`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Array(vec![
            Value::String(self.node.clone()),
            Value::String(self.path.clone()),
            Value::Logical(self.direction.is_output()),
            Value::String(self.data_type.clone()),
            Value::Integer(i64::from(self.modes.bits())),
            Value::Logical(self.in_use),
        ])
    }

    #[must_use]
    pub fn key(&self) -> ChannelKey {
        ChannelKey::new(self.node.clone(), self.path.clone())
    }
}

/// A directed link from an output channel to an input channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub from: ChannelKey,
    pub to: ChannelKey,
    pub data_type: String,
    pub mode: TransportModes,
}

impl ConnectionInfo {
    /// Flattens into the response form
    /// `[fromNode, fromPath, toNode, toPath, dataType, mode]`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Array(vec![
            Value::String(self.from.node.clone()),
            Value::String(self.from.path.clone()),
            Value::String(self.to.node.clone()),
            Value::String(self.to.path.clone()),
            Value::String(self.data_type.clone()),
            Value::Integer(i64::from(self.mode.bits())),
        ])
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn channel_key_ordering_is_node_then_path() {
        let a = ChannelKey::new("n1", "/out");
        let b = ChannelKey::new("n1", "/in");
        let c = ChannelKey::new("n2", "/a");
        assert!(b < a); // "/in" < "/out"
        assert!(a < c);
    }

    #[test]
    fn node_info_flattening_shape() {
        let info = NodeInfo {
            name: "n1".to_string(),
            machine: "alpha".to_string(),
            service_type: ServiceType::Filter,
            endpoint: NodeEndpoint::new(Ipv4Addr::new(192, 168, 1, 11), 40_001),
            launch: LaunchDetails {
                exec_path: "/x".to_string(),
                working_dir: "/".to_string(),
                command_line: "n1".to_string(),
            },
        };
        let Value::Array(items) = info.to_value() else {
            panic!("node info must flatten to an array");
        };
        assert_eq!(items.len(), 7);
        assert_eq!(items[0].as_str(), Some("n1"));
        assert_eq!(items[2].as_i64(), Some(ServiceType::Filter.wire_value()));
    }

    #[test]
    fn channel_info_flattening_shape() {
        let info = ChannelInfo {
            node: "n1".to_string(),
            path: "/out".to_string(),
            direction: ChannelDirection::Output,
            data_type: "int32".to_string(),
            modes: TransportModes::TCP,
            in_use: false,
        };
        let Value::Array(items) = info.to_value() else {
            panic!("channel info must flatten to an array");
        };
        assert_eq!(items.len(), 6);
        assert_eq!(items[2].as_logical(), Some(true));
        assert_eq!(items[5].as_logical(), Some(false));
    }
}
