//! The catalog store: every entity map, every invariant, every cascade.
//!
//! [`CatalogStore`] wraps the maps in a single `parking_lot::RwLock`. Lock
//! scope is one operation; mutators return the status events describing
//! what changed so callers publish them after the lock is released -- the
//! store itself does no I/O and has no partial-failure states.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use nimo_core::{
    ChannelDirection, NodeEndpoint, ServiceType, StatusEvent, TransportModes,
    WILDCARD_DATA_TYPE,
};
use parking_lot::RwLock;

use super::entities::{ChannelInfo, ChannelKey, ConnectionInfo, LaunchDetails, NodeInfo};
use super::error::CatalogError;

#[derive(Debug, Clone)]
struct NodeRecord {
    machine: String,
    service_type: ServiceType,
    endpoint: NodeEndpoint,
    launch: LaunchDetails,
    application: Option<String>,
}

#[derive(Debug, Clone)]
struct ChannelRecord {
    direction: ChannelDirection,
    data_type: String,
    modes: TransportModes,
    in_use: bool,
}

#[derive(Debug, Clone)]
struct ConnectionRecord {
    to: ChannelKey,
    data_type: String,
    mode: TransportModes,
}

/// All catalog state. Entities reference each other by name; connections
/// are keyed by their from-endpoint, which invariant 5 makes unique.
#[derive(Debug, Default)]
struct Catalog {
    machines: BTreeMap<String, Ipv4Addr>,
    nodes: BTreeMap<String, NodeRecord>,
    channels: BTreeMap<ChannelKey, ChannelRecord>,
    connections: BTreeMap<ChannelKey, ConnectionRecord>,
}

impl Catalog {
    fn channel_info(&self, key: &ChannelKey, record: &ChannelRecord) -> ChannelInfo {
        ChannelInfo {
            node: key.node.clone(),
            path: key.path.clone(),
            direction: record.direction,
            data_type: record.data_type.clone(),
            modes: record.modes,
            in_use: record.in_use,
        }
    }

    /// The connection referencing `key` on either end, if any.
    fn connection_touching(&self, key: &ChannelKey) -> Option<(ChannelKey, ConnectionRecord)> {
        if let Some(record) = self.connections.get(key) {
            return Some((key.clone(), record.clone()));
        }
        self.connections
            .iter()
            .find(|(_, record)| record.to == *key)
            .map(|(from, record)| (from.clone(), record.clone()))
    }

    /// Channels owned by `node`, outputs before inputs, path-ordered
    /// within each direction. This is the cascade enumeration order, so it
    /// is observable through the status channel and must stay stable.
    fn channels_of_node(&self, node: &str) -> Vec<(ChannelKey, ChannelRecord)> {
        let mut channels: Vec<(ChannelKey, ChannelRecord)> = self
            .channels
            .iter()
            .filter(|(key, _)| key.node == node)
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect();
        channels.sort_by_key(|(key, record)| (!record.direction.is_output(), key.path.clone()));
        channels
    }

    /// Sort key for ordered listings: `(machineName, nodeName)`.
    fn node_sort_key(&self, node: &str) -> (String, String) {
        let machine = self
            .nodes
            .get(node)
            .map(|record| record.machine.clone())
            .unwrap_or_default();
        (machine, node.to_string())
    }

    /// Removes the connection keyed by `from`, clears `inUse` on both
    /// endpoints, and returns the removed event.
    fn unlink_connection(&mut self, from: &ChannelKey) -> Option<StatusEvent> {
        let record = self.connections.remove(from)?;
        if let Some(channel) = self.channels.get_mut(from) {
            channel.in_use = false;
        }
        if let Some(channel) = self.channels.get_mut(&record.to) {
            channel.in_use = false;
        }
        Some(StatusEvent::ConnectionRemoved {
            from_node: from.node.clone(),
            from_path: from.path.clone(),
            to_node: record.to.node.clone(),
            to_path: record.to.path.clone(),
        })
    }

    /// Removes every channel of `node`, cascading connections first.
    /// Events arrive in cascade order: all connection-removed, then each
    /// channel-removed.
    fn remove_channels_of(&mut self, node: &str) -> Vec<StatusEvent> {
        let channels = self.channels_of_node(node);
        let mut events = Vec::new();

        // Connections first. A self-connection touches two of this node's
        // channels but must be reported exactly once.
        let mut unlinked = BTreeSet::new();
        for (key, _) in &channels {
            if let Some((from, _)) = self.connection_touching(key) {
                if unlinked.insert(from.clone()) {
                    if let Some(event) = self.unlink_connection(&from) {
                        events.push(event);
                    }
                }
            }
        }

        for (key, _) in channels {
            self.channels.remove(&key);
            events.push(StatusEvent::ChannelRemoved {
                node: key.node,
                path: key.path,
            });
        }
        events
    }
}

fn require_name(value: &str, what: &'static str) -> Result<(), CatalogError> {
    if value.is_empty() {
        return Err(CatalogError::InvalidArgument(format!(
            "{what} must not be empty"
        )));
    }
    Ok(())
}

/// Two data types are compatible iff byte-equal or either is `"*"`.
fn data_types_compatible(a: &str, b: &str) -> bool {
    a == b || a == WILDCARD_DATA_TYPE || b == WILDCARD_DATA_TYPE
}

/// The authoritative in-memory catalog, shared across sessions.
///
/// Mutating operations and multi-step reads take the write lock; point
/// lookups take the read lock. Locks are never held across I/O.
#[derive(Debug, Default)]
pub struct CatalogStore {
    inner: RwLock<Catalog>,
}

impl CatalogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Machines
    // -----------------------------------------------------------------------

    /// Adds a machine. Re-adding an identical `(name, address)` pair is a
    /// no-op success; the same name with a different address is a conflict.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty name, `Conflict` for an address
    /// mismatch.
    pub fn add_machine(
        &self,
        name: &str,
        address: Ipv4Addr,
    ) -> Result<Vec<StatusEvent>, CatalogError> {
        require_name(name, "machine name")?;
        let mut catalog = self.inner.write();
        match catalog.machines.get(name) {
            Some(existing) if *existing == address => Ok(Vec::new()),
            Some(existing) => Err(CatalogError::Conflict(format!(
                "machine {name:?} is already registered at {existing}"
            ))),
            None => {
                catalog.machines.insert(name.to_string(), address);
                Ok(vec![StatusEvent::MachineAdded {
                    name: name.to_string(),
                    address,
                }])
            }
        }
    }

    /// Removes a machine. Removal is always explicit: a machine that still
    /// hosts nodes cannot be removed.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent, `Conflict` if nodes remain on it.
    pub fn remove_machine(&self, name: &str) -> Result<Vec<StatusEvent>, CatalogError> {
        let mut catalog = self.inner.write();
        if !catalog.machines.contains_key(name) {
            return Err(CatalogError::machine_not_found(name));
        }
        let residents = catalog
            .nodes
            .values()
            .filter(|record| record.machine == name)
            .count();
        if residents > 0 {
            return Err(CatalogError::Conflict(format!(
                "machine {name:?} still hosts {residents} node(s)"
            )));
        }
        catalog.machines.remove(name);
        Ok(vec![StatusEvent::MachineRemoved {
            name: name.to_string(),
        }])
    }

    #[must_use]
    pub fn is_machine_present(&self, name: &str) -> bool {
        self.inner.read().machines.contains_key(name)
    }

    #[must_use]
    pub fn count_machines(&self) -> usize {
        self.inner.read().machines.len()
    }

    #[must_use]
    pub fn machine_names(&self) -> BTreeSet<String> {
        self.inner.read().machines.keys().cloned().collect()
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    /// Registers a node on an existing machine.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for empty names, `NotFound` for an absent
    /// machine, `Conflict` for a duplicate node name or an endpoint that
    /// is already bound by another node.
    pub fn add_node(
        &self,
        name: &str,
        machine: &str,
        service_type: ServiceType,
        endpoint: NodeEndpoint,
        launch: LaunchDetails,
    ) -> Result<Vec<StatusEvent>, CatalogError> {
        require_name(name, "node name")?;
        require_name(machine, "machine name")?;
        let mut catalog = self.inner.write();
        if !catalog.machines.contains_key(machine) {
            return Err(CatalogError::machine_not_found(machine));
        }
        if catalog.nodes.contains_key(name) {
            return Err(CatalogError::Conflict(format!(
                "node {name:?} is already registered"
            )));
        }
        if let Some((taken, _)) = catalog
            .nodes
            .iter()
            .find(|(_, record)| record.endpoint == endpoint)
        {
            return Err(CatalogError::Conflict(format!(
                "endpoint {endpoint} is already bound by node {taken:?}"
            )));
        }
        catalog.nodes.insert(
            name.to_string(),
            NodeRecord {
                machine: machine.to_string(),
                service_type,
                endpoint,
                launch,
                application: None,
            },
        );
        Ok(vec![StatusEvent::NodeAdded {
            name: name.to_string(),
            machine: machine.to_string(),
            service_type,
            endpoint,
        }])
    }

    /// Removes a node, cascading to its channels and to every connection
    /// touching those channels. Events arrive in cascade order:
    /// connection-removed first, then channel-removed (outputs before
    /// inputs), then node-removed.
    ///
    /// # Errors
    ///
    /// `NotFound` if the node is absent.
    pub fn remove_node(&self, name: &str) -> Result<Vec<StatusEvent>, CatalogError> {
        let mut catalog = self.inner.write();
        if !catalog.nodes.contains_key(name) {
            return Err(CatalogError::node_not_found(name));
        }
        let mut events = catalog.remove_channels_of(name);
        catalog.nodes.remove(name);
        events.push(StatusEvent::NodeRemoved {
            name: name.to_string(),
        });
        Ok(events)
    }

    #[must_use]
    pub fn is_node_present(&self, name: &str) -> bool {
        self.inner.read().nodes.contains_key(name)
    }

    #[must_use]
    pub fn count_nodes(&self) -> usize {
        self.inner.read().nodes.len()
    }

    /// Number of nodes hosted on `machine`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the machine is absent -- an empty machine and a
    /// missing machine are different answers.
    pub fn count_nodes_on(&self, machine: &str) -> Result<usize, CatalogError> {
        let catalog = self.inner.read();
        if !catalog.machines.contains_key(machine) {
            return Err(CatalogError::machine_not_found(machine));
        }
        Ok(catalog
            .nodes
            .values()
            .filter(|record| record.machine == machine)
            .count())
    }

    /// Names of nodes hosted on `machine`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the machine is absent.
    pub fn node_names_on(&self, machine: &str) -> Result<BTreeSet<String>, CatalogError> {
        let catalog = self.inner.read();
        if !catalog.machines.contains_key(machine) {
            return Err(CatalogError::machine_not_found(machine));
        }
        Ok(catalog
            .nodes
            .iter()
            .filter(|(_, record)| record.machine == machine)
            .map(|(name, _)| name.clone())
            .collect())
    }

    #[must_use]
    pub fn node_names(&self) -> BTreeSet<String> {
        self.inner.read().nodes.keys().cloned().collect()
    }

    /// The full record for one node.
    ///
    /// # Errors
    ///
    /// `NotFound` if the node is absent.
    pub fn node_info(&self, name: &str) -> Result<NodeInfo, CatalogError> {
        let catalog = self.inner.read();
        let record = catalog
            .nodes
            .get(name)
            .ok_or_else(|| CatalogError::node_not_found(name))?;
        Ok(node_info(name, record))
    }

    /// All node records, ordered by `(machineName, nodeName)`.
    #[must_use]
    pub fn all_node_info(&self) -> Vec<NodeInfo> {
        let catalog = self.inner.read();
        let mut infos: Vec<NodeInfo> = catalog
            .nodes
            .iter()
            .map(|(name, record)| node_info(name, record))
            .collect();
        infos.sort_by(|a, b| (&a.machine, &a.name).cmp(&(&b.machine, &b.name)));
        infos
    }

    /// Node records on one machine, name-ordered.
    ///
    /// # Errors
    ///
    /// `NotFound` if the machine is absent.
    pub fn all_node_info_on(&self, machine: &str) -> Result<Vec<NodeInfo>, CatalogError> {
        let catalog = self.inner.read();
        if !catalog.machines.contains_key(machine) {
            return Err(CatalogError::machine_not_found(machine));
        }
        Ok(catalog
            .nodes
            .iter()
            .filter(|(_, record)| record.machine == machine)
            .map(|(name, record)| node_info(name, record))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Applications
    // -----------------------------------------------------------------------

    /// Tags a node with the application it is performing. Overwrites any
    /// previous tag.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty tag, `NotFound` for an absent node.
    pub fn set_application(
        &self,
        node: &str,
        application: &str,
    ) -> Result<Vec<StatusEvent>, CatalogError> {
        require_name(application, "application name")?;
        let mut catalog = self.inner.write();
        let record = catalog
            .nodes
            .get_mut(node)
            .ok_or_else(|| CatalogError::node_not_found(node))?;
        record.application = Some(application.to_string());
        Ok(vec![StatusEvent::ApplicationSet {
            node: node.to_string(),
            application: application.to_string(),
        }])
    }

    /// The application tag on a node, if one was set.
    ///
    /// # Errors
    ///
    /// `NotFound` if the node is absent.
    pub fn get_application(&self, node: &str) -> Result<Option<String>, CatalogError> {
        let catalog = self.inner.read();
        let record = catalog
            .nodes
            .get(node)
            .ok_or_else(|| CatalogError::node_not_found(node))?;
        Ok(record.application.clone())
    }

    // -----------------------------------------------------------------------
    // Channels
    // -----------------------------------------------------------------------

    /// Adds a channel to an existing node.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for empty node/path/data-type, `NotFound` for an
    /// absent node, `Conflict` when `(node, path)` already exists.
    pub fn add_channel(
        &self,
        node: &str,
        path: &str,
        direction: ChannelDirection,
        data_type: &str,
        modes: TransportModes,
    ) -> Result<Vec<StatusEvent>, CatalogError> {
        require_name(node, "node name")?;
        require_name(path, "channel path")?;
        require_name(data_type, "data type")?;
        let mut catalog = self.inner.write();
        if !catalog.nodes.contains_key(node) {
            return Err(CatalogError::node_not_found(node));
        }
        let key = ChannelKey::new(node, path);
        if catalog.channels.contains_key(&key) {
            return Err(CatalogError::Conflict(format!(
                "channel {key} is already registered"
            )));
        }
        catalog.channels.insert(
            key,
            ChannelRecord {
                direction,
                data_type: data_type.to_string(),
                modes,
                in_use: false,
            },
        );
        Ok(vec![StatusEvent::ChannelAdded {
            node: node.to_string(),
            path: path.to_string(),
            direction,
            data_type: data_type.to_string(),
        }])
    }

    /// Removes a channel, cascading to a connection referencing it.
    ///
    /// # Errors
    ///
    /// `NotFound` if the channel is absent.
    pub fn remove_channel(
        &self,
        node: &str,
        path: &str,
    ) -> Result<Vec<StatusEvent>, CatalogError> {
        let mut catalog = self.inner.write();
        let key = ChannelKey::new(node, path);
        if !catalog.channels.contains_key(&key) {
            return Err(CatalogError::channel_not_found(key.to_string()));
        }
        let mut events = Vec::new();
        if let Some((from, _)) = catalog.connection_touching(&key) {
            if let Some(event) = catalog.unlink_connection(&from) {
                events.push(event);
            }
        }
        catalog.channels.remove(&key);
        events.push(StatusEvent::ChannelRemoved {
            node: node.to_string(),
            path: path.to_string(),
        });
        Ok(events)
    }

    /// Removes every channel on a node, cascading to connections. The
    /// node itself stays registered.
    ///
    /// # Errors
    ///
    /// `NotFound` if the node is absent.
    pub fn remove_channels_for_node(
        &self,
        node: &str,
    ) -> Result<Vec<StatusEvent>, CatalogError> {
        let mut catalog = self.inner.write();
        if !catalog.nodes.contains_key(node) {
            return Err(CatalogError::node_not_found(node));
        }
        Ok(catalog.remove_channels_of(node))
    }

    /// The record for one channel.
    ///
    /// # Errors
    ///
    /// `NotFound` if the channel is absent.
    pub fn channel_info(&self, node: &str, path: &str) -> Result<ChannelInfo, CatalogError> {
        let catalog = self.inner.read();
        let key = ChannelKey::new(node, path);
        let record = catalog
            .channels
            .get(&key)
            .ok_or_else(|| CatalogError::channel_not_found(key.to_string()))?;
        Ok(catalog.channel_info(&key, record))
    }

    /// Channels on one node, path-ordered.
    ///
    /// # Errors
    ///
    /// `NotFound` if the node is absent.
    pub fn channels_on_node(&self, node: &str) -> Result<Vec<ChannelInfo>, CatalogError> {
        let catalog = self.inner.read();
        if !catalog.nodes.contains_key(node) {
            return Err(CatalogError::node_not_found(node));
        }
        Ok(catalog
            .channels
            .iter()
            .filter(|(key, _)| key.node == node)
            .map(|(key, record)| catalog.channel_info(key, record))
            .collect())
    }

    /// Every channel in the catalog, ordered by
    /// `(machineName, nodeName, path)`.
    #[must_use]
    pub fn all_channels(&self) -> Vec<ChannelInfo> {
        let catalog = self.inner.read();
        let mut infos: Vec<(String, ChannelInfo)> = catalog
            .channels
            .iter()
            .map(|(key, record)| {
                let (machine, _) = catalog.node_sort_key(&key.node);
                (machine, catalog.channel_info(key, record))
            })
            .collect();
        infos.sort_by(|(ma, a), (mb, b)| {
            (ma, &a.node, &a.path).cmp(&(mb, &b.node, &b.path))
        });
        infos.into_iter().map(|(_, info)| info).collect()
    }

    // -----------------------------------------------------------------------
    // Connections
    // -----------------------------------------------------------------------

    /// Connects an output channel to an input channel.
    ///
    /// The requested data type and mode set must be compatible with both
    /// endpoints: data types match when byte-equal or wildcard on either
    /// side, mode sets when the three-way intersection is non-empty. The
    /// connection adopts the lowest-numbered common mode bit, and its data
    /// type is the first concrete type among request, from, and to.
    ///
    /// # Errors
    ///
    /// `NotFound` for an absent endpoint, `Conflict` for direction
    /// mismatches, already-connected endpoints, or incompatible
    /// types/modes.
    pub fn add_connection(
        &self,
        from: &ChannelKey,
        to: &ChannelKey,
        data_type: &str,
        modes: TransportModes,
    ) -> Result<Vec<StatusEvent>, CatalogError> {
        require_name(data_type, "data type")?;
        let mut catalog = self.inner.write();
        let from_record = catalog
            .channels
            .get(from)
            .ok_or_else(|| CatalogError::channel_not_found(from.to_string()))?
            .clone();
        let to_record = catalog
            .channels
            .get(to)
            .ok_or_else(|| CatalogError::channel_not_found(to.to_string()))?
            .clone();

        if !from_record.direction.is_output() {
            return Err(CatalogError::Conflict(format!(
                "channel {from} is not an output channel"
            )));
        }
        if to_record.direction.is_output() {
            return Err(CatalogError::Conflict(format!(
                "channel {to} is not an input channel"
            )));
        }
        if from_record.in_use {
            return Err(CatalogError::Conflict(format!(
                "channel {from} is already connected"
            )));
        }
        if to_record.in_use {
            return Err(CatalogError::Conflict(format!(
                "channel {to} is already connected"
            )));
        }

        let compatible = data_types_compatible(data_type, &from_record.data_type)
            && data_types_compatible(data_type, &to_record.data_type)
            && data_types_compatible(&from_record.data_type, &to_record.data_type);
        if !compatible {
            return Err(CatalogError::Conflict(format!(
                "data type {:?} does not join {:?} to {:?}",
                data_type, from_record.data_type, to_record.data_type
            )));
        }
        let resolved_type = [data_type, &from_record.data_type, &to_record.data_type]
            .into_iter()
            .find(|candidate| *candidate != WILDCARD_DATA_TYPE)
            .unwrap_or(WILDCARD_DATA_TYPE)
            .to_string();

        let common = modes
            .intersection(from_record.modes)
            .intersection(to_record.modes);
        let Some(mode) = common.lowest_mode() else {
            return Err(CatalogError::Conflict(format!(
                "no common transport mode between {from} and {to}"
            )));
        };

        if let Some(channel) = catalog.channels.get_mut(from) {
            channel.in_use = true;
        }
        if let Some(channel) = catalog.channels.get_mut(to) {
            channel.in_use = true;
        }
        catalog.connections.insert(
            from.clone(),
            ConnectionRecord {
                to: to.clone(),
                data_type: resolved_type.clone(),
                mode,
            },
        );
        Ok(vec![StatusEvent::ConnectionAdded {
            from_node: from.node.clone(),
            from_path: from.path.clone(),
            to_node: to.node.clone(),
            to_path: to.path.clone(),
            data_type: resolved_type,
            mode,
        }])
    }

    /// Removes the connection originating at `from`, clearing `inUse` on
    /// both endpoints.
    ///
    /// # Errors
    ///
    /// `NotFound` when no connection originates there.
    pub fn remove_connection(
        &self,
        from: &ChannelKey,
    ) -> Result<Vec<StatusEvent>, CatalogError> {
        let mut catalog = self.inner.write();
        catalog
            .unlink_connection(from)
            .map(|event| vec![event])
            .ok_or_else(|| CatalogError::connection_not_found(from.to_string()))
    }

    /// Every connection, ordered by the from-endpoint's
    /// `(machineName, nodeName, path)`.
    #[must_use]
    pub fn all_connections(&self) -> Vec<ConnectionInfo> {
        let catalog = self.inner.read();
        let mut infos: Vec<(String, ConnectionInfo)> = catalog
            .connections
            .iter()
            .map(|(from, record)| {
                let (machine, _) = catalog.node_sort_key(&from.node);
                (machine, connection_info(from, record))
            })
            .collect();
        infos.sort_by(|(ma, a), (mb, b)| {
            (ma, &a.from.node, &a.from.path).cmp(&(mb, &b.from.node, &b.from.path))
        });
        infos.into_iter().map(|(_, info)| info).collect()
    }

    /// Connections touching a node on either end.
    ///
    /// # Errors
    ///
    /// `NotFound` if the node is absent.
    pub fn connections_on_node(
        &self,
        node: &str,
    ) -> Result<Vec<ConnectionInfo>, CatalogError> {
        let catalog = self.inner.read();
        if !catalog.nodes.contains_key(node) {
            return Err(CatalogError::node_not_found(node));
        }
        Ok(catalog
            .connections
            .iter()
            .filter(|(from, record)| from.node == node || record.to.node == node)
            .map(|(from, record)| connection_info(from, record))
            .collect())
    }

    /// Connections touching any node hosted on a machine, on either end.
    ///
    /// # Errors
    ///
    /// `NotFound` if the machine is absent.
    pub fn connections_on_machine(
        &self,
        machine: &str,
    ) -> Result<Vec<ConnectionInfo>, CatalogError> {
        let catalog = self.inner.read();
        if !catalog.machines.contains_key(machine) {
            return Err(CatalogError::machine_not_found(machine));
        }
        let hosted: BTreeSet<&String> = catalog
            .nodes
            .iter()
            .filter(|(_, record)| record.machine == machine)
            .map(|(name, _)| name)
            .collect();
        Ok(catalog
            .connections
            .iter()
            .filter(|(from, record)| {
                hosted.contains(&from.node) || hosted.contains(&record.to.node)
            })
            .map(|(from, record)| connection_info(from, record))
            .collect())
    }

    /// Checks every global invariant, returning the first violation.
    ///
    /// Exposed for tests; production code relies on the operations never
    /// breaking them in the first place.
    #[doc(hidden)]
    pub fn verify_invariants(&self) -> Result<(), String> {
        let catalog = self.inner.read();
        for (name, record) in &catalog.nodes {
            if !catalog.machines.contains_key(&record.machine) {
                return Err(format!(
                    "node {name:?} references missing machine {:?}",
                    record.machine
                ));
            }
        }
        for key in catalog.channels.keys() {
            if !catalog.nodes.contains_key(&key.node) {
                return Err(format!("channel {key} references missing node"));
            }
        }
        let mut used: BTreeSet<ChannelKey> = BTreeSet::new();
        for (from, record) in &catalog.connections {
            if !catalog.channels.contains_key(from) {
                return Err(format!("connection references missing channel {from}"));
            }
            if !catalog.channels.contains_key(&record.to) {
                return Err(format!(
                    "connection references missing channel {}",
                    record.to
                ));
            }
            if !used.insert(from.clone()) {
                return Err(format!("channel {from} feeds more than one connection"));
            }
            if !used.insert(record.to.clone()) {
                return Err(format!(
                    "channel {} is fed by more than one connection",
                    record.to
                ));
            }
        }
        for (key, record) in &catalog.channels {
            if record.in_use != used.contains(key) {
                return Err(format!(
                    "channel {key} reports inUse={} but the connections say {}",
                    record.in_use,
                    used.contains(key)
                ));
            }
        }
        Ok(())
    }
}

fn node_info(name: &str, record: &NodeRecord) -> NodeInfo {
    NodeInfo {
        name: name.to_string(),
        machine: record.machine.clone(),
        service_type: record.service_type,
        endpoint: record.endpoint,
        launch: record.launch.clone(),
    }
}

fn connection_info(from: &ChannelKey, record: &ConnectionRecord) -> ConnectionInfo {
    ConnectionInfo {
        from: from.clone(),
        to: record.to.clone(),
        data_type: record.data_type.clone(),
        mode: record.mode,
    }
}

#[cfg(test)]
mod tests {
    use nimo_core::events::kinds;

    use super::*;

    const ALPHA_ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 11);

    fn store() -> CatalogStore {
        CatalogStore::new()
    }

    fn launch(cmd: &str) -> LaunchDetails {
        LaunchDetails {
            exec_path: "/x".to_string(),
            working_dir: "/".to_string(),
            command_line: cmd.to_string(),
        }
    }

    fn endpoint(port: u16) -> NodeEndpoint {
        NodeEndpoint::new(ALPHA_ADDR, port)
    }

    fn with_node(store: &CatalogStore, machine: &str, node: &str, port: u16) {
        store.add_machine(machine, ALPHA_ADDR).expect("add machine");
        store
            .add_node(node, machine, ServiceType::Filter, endpoint(port), launch(node))
            .expect("add node");
    }

    fn event_kinds(events: &[StatusEvent]) -> Vec<&'static str> {
        events.iter().map(StatusEvent::kind).collect()
    }

    // --- machines ---

    #[test]
    fn add_machine_emits_event_and_registers() {
        let store = store();
        let events = store.add_machine("alpha", ALPHA_ADDR).expect("add");
        assert_eq!(event_kinds(&events), vec![kinds::MACHINE_ADDED]);
        assert!(store.is_machine_present("alpha"));
        assert!(!store.is_machine_present("beta"));
        assert_eq!(store.count_machines(), 1);
        assert_eq!(
            store.machine_names().into_iter().collect::<Vec<_>>(),
            vec!["alpha".to_string()]
        );
    }

    #[test]
    fn add_machine_is_idempotent_without_duplicate_event() {
        let store = store();
        store.add_machine("alpha", ALPHA_ADDR).expect("first add");
        let events = store.add_machine("alpha", ALPHA_ADDR).expect("re-add");
        assert!(events.is_empty());
        assert_eq!(store.count_machines(), 1);
    }

    #[test]
    fn add_machine_same_name_different_address_conflicts() {
        let store = store();
        store.add_machine("alpha", ALPHA_ADDR).expect("first add");
        let err = store
            .add_machine("alpha", Ipv4Addr::new(10, 0, 0, 1))
            .expect_err("must conflict");
        assert!(matches!(err, CatalogError::Conflict(_)));
    }

    #[test]
    fn add_machine_rejects_empty_name() {
        let err = store().add_machine("", ALPHA_ADDR).expect_err("must fail");
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }

    #[test]
    fn machine_names_are_case_sensitive() {
        let store = store();
        store.add_machine("Alpha", ALPHA_ADDR).expect("add");
        assert!(!store.is_machine_present("alpha"));
    }

    #[test]
    fn add_machine_order_is_commutative() {
        let ab = store();
        ab.add_machine("a", ALPHA_ADDR).expect("add a");
        ab.add_machine("b", ALPHA_ADDR).expect("add b");

        let ba = store();
        ba.add_machine("b", ALPHA_ADDR).expect("add b");
        ba.add_machine("a", ALPHA_ADDR).expect("add a");

        assert_eq!(ab.machine_names(), ba.machine_names());
        assert_eq!(ab.count_machines(), ba.count_machines());
    }

    #[test]
    fn remove_machine_is_explicit_only() {
        let store = store();
        with_node(&store, "alpha", "n1", 40_001);

        // A machine with nodes cannot go away.
        let err = store.remove_machine("alpha").expect_err("must conflict");
        assert!(matches!(err, CatalogError::Conflict(_)));

        // Removing the last node leaves the machine registered.
        store.remove_node("n1").expect("remove node");
        assert!(store.is_machine_present("alpha"));

        let events = store.remove_machine("alpha").expect("remove machine");
        assert_eq!(event_kinds(&events), vec![kinds::MACHINE_REMOVED]);
        assert_eq!(store.count_machines(), 0);
    }

    #[test]
    fn remove_absent_machine_is_not_found() {
        let err = store().remove_machine("ghost").expect_err("must fail");
        assert!(matches!(err, CatalogError::NotFound { what: "machine", .. }));
    }

    #[test]
    fn empty_catalog_counts() {
        let store = store();
        assert_eq!(store.count_machines(), 0);
        assert_eq!(store.count_nodes(), 0);
        assert!(store.machine_names().is_empty());
        assert!(store.all_channels().is_empty());
        assert!(store.all_connections().is_empty());
    }

    // --- nodes ---

    #[test]
    fn add_node_roundtrip() {
        let store = store();
        with_node(&store, "alpha", "n1", 40_001);
        assert!(store.is_node_present("n1"));
        assert_eq!(store.count_nodes(), 1);

        let info = store.node_info("n1").expect("info");
        assert_eq!(info.machine, "alpha");
        assert_eq!(info.service_type, ServiceType::Filter);
        assert_eq!(info.endpoint, endpoint(40_001));
        assert_eq!(info.launch.command_line, "n1");

        store.remove_node("n1").expect("remove");
        assert!(!store.is_node_present("n1"));
    }

    #[test]
    fn add_node_requires_machine() {
        let err = store()
            .add_node("n1", "ghost", ServiceType::Generic, endpoint(1), launch("n1"))
            .expect_err("must fail");
        assert!(matches!(err, CatalogError::NotFound { what: "machine", .. }));
    }

    #[test]
    fn add_node_rejects_duplicate_name() {
        let store = store();
        with_node(&store, "alpha", "dup", 40_001);
        let err = store
            .add_node("dup", "alpha", ServiceType::Generic, endpoint(40_002), launch("dup"))
            .expect_err("must conflict");
        assert!(matches!(err, CatalogError::Conflict(_)));
        assert_eq!(store.count_nodes(), 1);
    }

    #[test]
    fn add_node_rejects_bound_endpoint() {
        let store = store();
        with_node(&store, "alpha", "n1", 40_001);
        let err = store
            .add_node("n2", "alpha", ServiceType::Generic, endpoint(40_001), launch("n2"))
            .expect_err("must conflict");
        assert!(matches!(err, CatalogError::Conflict(_)));
    }

    #[test]
    fn add_node_rejects_empty_name() {
        let store = store();
        store.add_machine("alpha", ALPHA_ADDR).expect("add machine");
        let err = store
            .add_node("", "alpha", ServiceType::Generic, endpoint(1), launch(""))
            .expect_err("must fail");
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }

    #[test]
    fn node_listings_filter_and_order() {
        let store = store();
        store.add_machine("beta", Ipv4Addr::new(10, 0, 0, 2)).expect("beta");
        store.add_machine("alpha", ALPHA_ADDR).expect("alpha");
        store
            .add_node("zeta", "beta", ServiceType::Generic, endpoint(1), launch("zeta"))
            .expect("zeta");
        store
            .add_node("mu", "alpha", ServiceType::Generic, endpoint(2), launch("mu"))
            .expect("mu");
        store
            .add_node("nu", "alpha", ServiceType::Generic, endpoint(3), launch("nu"))
            .expect("nu");

        // Ordered by machine name, then node name.
        let names: Vec<String> = store
            .all_node_info()
            .into_iter()
            .map(|info| info.name)
            .collect();
        assert_eq!(names, vec!["mu", "nu", "zeta"]);

        assert_eq!(store.count_nodes_on("alpha").expect("count"), 2);
        assert_eq!(store.count_nodes_on("beta").expect("count"), 1);
        assert_eq!(
            store.node_names_on("alpha").expect("names").into_iter().collect::<Vec<_>>(),
            vec!["mu".to_string(), "nu".to_string()]
        );
        assert_eq!(store.all_node_info_on("beta").expect("infos").len(), 1);
        assert!(store.count_nodes_on("ghost").is_err());
    }

    // --- applications ---

    #[test]
    fn application_set_and_overwrite() {
        let store = store();
        with_node(&store, "alpha", "n1", 40_001);

        assert_eq!(store.get_application("n1").expect("get"), None);

        let events = store.set_application("n1", "capture").expect("set");
        assert_eq!(event_kinds(&events), vec![kinds::APPLICATION_SET]);
        assert_eq!(
            store.get_application("n1").expect("get"),
            Some("capture".to_string())
        );

        store.set_application("n1", "render").expect("overwrite");
        assert_eq!(
            store.get_application("n1").expect("get"),
            Some("render".to_string())
        );
    }

    #[test]
    fn application_requires_node() {
        let err = store().set_application("ghost", "x").expect_err("must fail");
        assert!(matches!(err, CatalogError::NotFound { what: "node", .. }));
        let err = store().get_application("ghost").expect_err("must fail");
        assert!(matches!(err, CatalogError::NotFound { what: "node", .. }));
    }

    // --- channels ---

    #[test]
    fn add_channel_and_query() {
        let store = store();
        with_node(&store, "alpha", "n1", 40_001);
        let events = store
            .add_channel("n1", "/out", ChannelDirection::Output, "int32", TransportModes::TCP)
            .expect("add channel");
        assert_eq!(event_kinds(&events), vec![kinds::CHANNEL_ADDED]);

        let info = store.channel_info("n1", "/out").expect("info");
        assert_eq!(info.direction, ChannelDirection::Output);
        assert_eq!(info.data_type, "int32");
        assert!(!info.in_use);

        assert_eq!(store.channels_on_node("n1").expect("list").len(), 1);
        assert_eq!(store.all_channels().len(), 1);
    }

    #[test]
    fn add_channel_requires_node_and_unique_path() {
        let store = store();
        let err = store
            .add_channel("ghost", "/out", ChannelDirection::Output, "int32", TransportModes::TCP)
            .expect_err("must fail");
        assert!(matches!(err, CatalogError::NotFound { what: "node", .. }));

        with_node(&store, "alpha", "n1", 40_001);
        store
            .add_channel("n1", "/out", ChannelDirection::Output, "int32", TransportModes::TCP)
            .expect("add channel");
        let err = store
            .add_channel("n1", "/out", ChannelDirection::Input, "int32", TransportModes::TCP)
            .expect_err("must conflict");
        assert!(matches!(err, CatalogError::Conflict(_)));
    }

    #[test]
    fn remove_channel_cascades_connection() {
        let store = store();
        let (from, to) = connected_pair(&store);

        let events = store
            .remove_channel(&from.node, &from.path)
            .expect("remove channel");
        assert_eq!(
            event_kinds(&events),
            vec![kinds::CONNECTION_REMOVED, kinds::CHANNEL_REMOVED]
        );
        // The surviving endpoint is free again.
        assert!(!store.channel_info(&to.node, &to.path).expect("info").in_use);
    }

    // --- connections ---

    /// alpha hosts n1 (output /out) and n2 (input /in), connected.
    fn connected_pair(store: &CatalogStore) -> (ChannelKey, ChannelKey) {
        with_node(store, "alpha", "n1", 40_001);
        store
            .add_node("n2", "alpha", ServiceType::Filter, endpoint(40_002), launch("n2"))
            .expect("add n2");
        store
            .add_channel("n1", "/out", ChannelDirection::Output, "int32", TransportModes::TCP)
            .expect("out channel");
        store
            .add_channel("n2", "/in", ChannelDirection::Input, "int32", TransportModes::TCP)
            .expect("in channel");
        let from = ChannelKey::new("n1", "/out");
        let to = ChannelKey::new("n2", "/in");
        store
            .add_connection(&from, &to, "int32", TransportModes::TCP)
            .expect("connect");
        (from, to)
    }

    #[test]
    fn add_connection_marks_endpoints_in_use() {
        let store = store();
        let (from, to) = connected_pair(&store);
        assert!(store.channel_info(&from.node, &from.path).expect("info").in_use);
        assert!(store.channel_info(&to.node, &to.path).expect("info").in_use);

        let listed = store.all_connections();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].mode, TransportModes::TCP);
        assert_eq!(listed[0].data_type, "int32");
    }

    #[test]
    fn second_connection_on_same_channel_conflicts() {
        let store = store();
        let (from, _) = connected_pair(&store);
        store
            .add_node("n3", "alpha", ServiceType::Filter, endpoint(40_003), launch("n3"))
            .expect("add n3");
        store
            .add_channel("n3", "/in", ChannelDirection::Input, "int32", TransportModes::TCP)
            .expect("n3 in");
        let err = store
            .add_connection(&from, &ChannelKey::new("n3", "/in"), "int32", TransportModes::TCP)
            .expect_err("must conflict");
        assert!(matches!(err, CatalogError::Conflict(_)));
    }

    #[test]
    fn remove_connection_frees_endpoints() {
        let store = store();
        let (from, to) = connected_pair(&store);
        let events = store.remove_connection(&from).expect("disconnect");
        assert_eq!(event_kinds(&events), vec![kinds::CONNECTION_REMOVED]);
        assert!(!store.channel_info(&from.node, &from.path).expect("info").in_use);
        assert!(!store.channel_info(&to.node, &to.path).expect("info").in_use);
        assert!(store.all_connections().is_empty());

        let err = store.remove_connection(&from).expect_err("already gone");
        assert!(matches!(err, CatalogError::NotFound { what: "connection", .. }));
    }

    #[test]
    fn connection_direction_is_validated() {
        let store = store();
        with_node(&store, "alpha", "n1", 40_001);
        store
            .add_channel("n1", "/in", ChannelDirection::Input, "int32", TransportModes::TCP)
            .expect("in");
        store
            .add_channel("n1", "/out", ChannelDirection::Output, "int32", TransportModes::TCP)
            .expect("out");

        // Input as source
        let err = store
            .add_connection(
                &ChannelKey::new("n1", "/in"),
                &ChannelKey::new("n1", "/out"),
                "int32",
                TransportModes::TCP,
            )
            .expect_err("must conflict");
        assert!(matches!(err, CatalogError::Conflict(_)));
    }

    #[test]
    fn connection_data_type_wildcard_resolution() {
        let store = store();
        with_node(&store, "alpha", "n1", 40_001);
        store
            .add_channel("n1", "/out", ChannelDirection::Output, "*", TransportModes::TCP)
            .expect("out");
        store
            .add_channel("n1", "/in", ChannelDirection::Input, "int32", TransportModes::TCP)
            .expect("in");

        let events = store
            .add_connection(
                &ChannelKey::new("n1", "/out"),
                &ChannelKey::new("n1", "/in"),
                "*",
                TransportModes::TCP,
            )
            .expect("connect");
        let StatusEvent::ConnectionAdded { data_type, .. } = &events[0] else {
            panic!("expected connection-added");
        };
        // The concrete endpoint type wins over the wildcards.
        assert_eq!(data_type, "int32");
    }

    #[test]
    fn connection_incompatible_data_types_conflict() {
        let store = store();
        with_node(&store, "alpha", "n1", 40_001);
        store
            .add_channel("n1", "/out", ChannelDirection::Output, "int32", TransportModes::TCP)
            .expect("out");
        store
            .add_channel("n1", "/in", ChannelDirection::Input, "float64", TransportModes::TCP)
            .expect("in");

        let err = store
            .add_connection(
                &ChannelKey::new("n1", "/out"),
                &ChannelKey::new("n1", "/in"),
                "*",
                TransportModes::TCP,
            )
            .expect_err("must conflict");
        assert!(matches!(err, CatalogError::Conflict(_)));
    }

    #[test]
    fn connection_mode_is_lowest_common_bit() {
        let store = store();
        with_node(&store, "alpha", "n1", 40_001);
        let both = TransportModes::TCP.union(TransportModes::UDP);
        store
            .add_channel("n1", "/out", ChannelDirection::Output, "int32", both)
            .expect("out");
        store
            .add_channel("n1", "/in", ChannelDirection::Input, "int32", both)
            .expect("in");

        let events = store
            .add_connection(
                &ChannelKey::new("n1", "/out"),
                &ChannelKey::new("n1", "/in"),
                "int32",
                both,
            )
            .expect("connect");
        let StatusEvent::ConnectionAdded { mode, .. } = &events[0] else {
            panic!("expected connection-added");
        };
        assert_eq!(*mode, TransportModes::TCP);
    }

    #[test]
    fn connection_disjoint_modes_conflict() {
        let store = store();
        with_node(&store, "alpha", "n1", 40_001);
        store
            .add_channel("n1", "/out", ChannelDirection::Output, "int32", TransportModes::TCP)
            .expect("out");
        store
            .add_channel("n1", "/in", ChannelDirection::Input, "int32", TransportModes::UDP)
            .expect("in");

        let err = store
            .add_connection(
                &ChannelKey::new("n1", "/out"),
                &ChannelKey::new("n1", "/in"),
                "int32",
                TransportModes::TCP.union(TransportModes::UDP),
            )
            .expect_err("must conflict");
        assert!(matches!(err, CatalogError::Conflict(_)));
    }

    #[test]
    fn connection_queries_filter_by_node_and_machine() {
        let store = store();
        let (from, _) = connected_pair(&store);
        store.add_machine("beta", Ipv4Addr::new(10, 0, 0, 2)).expect("beta");

        assert_eq!(store.connections_on_node("n1").expect("by node").len(), 1);
        assert_eq!(store.connections_on_node("n2").expect("by node").len(), 1);
        assert_eq!(
            store.connections_on_machine("alpha").expect("by machine").len(),
            1
        );
        assert!(store
            .connections_on_machine("beta")
            .expect("by machine")
            .is_empty());
        assert!(store.connections_on_node("ghost").is_err());

        let listed = store.all_connections();
        assert_eq!(listed[0].from, from);
    }

    // --- cascades ---

    #[test]
    fn remove_node_cascade_event_order() {
        let store = store();
        with_node(&store, "alpha", "n1", 40_001);
        store
            .add_channel("n1", "/out", ChannelDirection::Output, "int32", TransportModes::TCP)
            .expect("out");
        store
            .add_channel("n1", "/in", ChannelDirection::Input, "int32", TransportModes::TCP)
            .expect("in");
        store
            .add_connection(
                &ChannelKey::new("n1", "/out"),
                &ChannelKey::new("n1", "/in"),
                "int32",
                TransportModes::TCP,
            )
            .expect("connect");

        let events = store.remove_node("n1").expect("remove");
        assert_eq!(
            event_kinds(&events),
            vec![
                kinds::CONNECTION_REMOVED,
                kinds::CHANNEL_REMOVED,
                kinds::CHANNEL_REMOVED,
                kinds::NODE_REMOVED,
            ]
        );
        // Outputs are torn down before inputs.
        let StatusEvent::ChannelRemoved { path, .. } = &events[1] else {
            panic!("expected channel-removed");
        };
        assert_eq!(path, "/out");
        let StatusEvent::ChannelRemoved { path, .. } = &events[2] else {
            panic!("expected channel-removed");
        };
        assert_eq!(path, "/in");

        assert_eq!(store.count_nodes(), 0);
        assert_eq!(store.count_machines(), 1);
        assert!(store.all_channels().is_empty());
        assert!(store.all_connections().is_empty());
    }

    #[test]
    fn remove_node_frees_remote_endpoints() {
        let store = store();
        let (_, to) = connected_pair(&store);
        store.remove_node("n1").expect("remove producer");
        // n2 survives with its channel no longer in use.
        let info = store.channel_info(&to.node, &to.path).expect("info");
        assert!(!info.in_use);
        store.verify_invariants().expect("invariants");
    }

    #[test]
    fn remove_channels_for_node_keeps_node() {
        let store = store();
        let (from, _) = connected_pair(&store);
        let events = store.remove_channels_for_node(&from.node).expect("clear");
        assert_eq!(
            event_kinds(&events),
            vec![kinds::CONNECTION_REMOVED, kinds::CHANNEL_REMOVED]
        );
        assert!(store.is_node_present("n1"));
        assert!(store.channels_on_node("n1").expect("list").is_empty());
    }

    // --- property tests ---

    mod properties {
        use proptest::prelude::*;

        use super::*;

        #[derive(Debug, Clone)]
        enum Op {
            AddMachine(u8),
            RemoveMachine(u8),
            AddNode(u8, u8, u16),
            RemoveNode(u8),
            AddChannel(u8, u8, bool, u8),
            RemoveChannel(u8, u8),
            RemoveChannelsForNode(u8),
            AddConnection(u8, u8, u8, u8),
            RemoveConnection(u8, u8),
            SetApplication(u8, u8),
        }

        fn machine(i: u8) -> String {
            format!("m{}", i % 3)
        }

        fn node(i: u8) -> String {
            format!("n{}", i % 4)
        }

        fn path(i: u8) -> String {
            format!("/p{}", i % 3)
        }

        fn data_type(i: u8) -> String {
            match i % 3 {
                0 => "int32".to_string(),
                1 => "float64".to_string(),
                _ => "*".to_string(),
            }
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                any::<u8>().prop_map(Op::AddMachine),
                any::<u8>().prop_map(Op::RemoveMachine),
                (any::<u8>(), any::<u8>(), 1_u16..200).prop_map(|(n, m, p)| Op::AddNode(n, m, p)),
                any::<u8>().prop_map(Op::RemoveNode),
                (any::<u8>(), any::<u8>(), any::<bool>(), any::<u8>())
                    .prop_map(|(n, p, d, t)| Op::AddChannel(n, p, d, t)),
                (any::<u8>(), any::<u8>()).prop_map(|(n, p)| Op::RemoveChannel(n, p)),
                any::<u8>().prop_map(Op::RemoveChannelsForNode),
                (any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>())
                    .prop_map(|(a, b, c, d)| Op::AddConnection(a, b, c, d)),
                (any::<u8>(), any::<u8>()).prop_map(|(n, p)| Op::RemoveConnection(n, p)),
                (any::<u8>(), any::<u8>()).prop_map(|(n, a)| Op::SetApplication(n, a)),
            ]
        }

        fn apply(store: &CatalogStore, op: &Op) {
            // Errors are expected and uninteresting; the property is that
            // no sequence of attempts ever corrupts the catalog.
            let _ = match op {
                Op::AddMachine(m) => store.add_machine(&machine(*m), ALPHA_ADDR),
                Op::RemoveMachine(m) => store.remove_machine(&machine(*m)),
                Op::AddNode(n, m, p) => store.add_node(
                    &node(*n),
                    &machine(*m),
                    ServiceType::Generic,
                    NodeEndpoint::new(ALPHA_ADDR, *p),
                    LaunchDetails::default(),
                ),
                Op::RemoveNode(n) => store.remove_node(&node(*n)),
                Op::AddChannel(n, p, output, t) => store.add_channel(
                    &node(*n),
                    &path(*p),
                    ChannelDirection::from_is_output(*output),
                    &data_type(*t),
                    TransportModes::TCP.union(TransportModes::UDP),
                ),
                Op::RemoveChannel(n, p) => store.remove_channel(&node(*n), &path(*p)),
                Op::RemoveChannelsForNode(n) => store.remove_channels_for_node(&node(*n)),
                Op::AddConnection(a, b, c, d) => store.add_connection(
                    &ChannelKey::new(node(*a), path(*b)),
                    &ChannelKey::new(node(*c), path(*d)),
                    "*",
                    TransportModes::TCP.union(TransportModes::UDP),
                ),
                Op::RemoveConnection(n, p) => {
                    store.remove_connection(&ChannelKey::new(node(*n), path(*p)))
                }
                Op::SetApplication(n, a) => {
                    store.set_application(&node(*n), &format!("app{a}"))
                }
            };
        }

        proptest! {
            /// Invariants 1-6 hold after every operation of any sequence.
            #[test]
            fn invariants_hold_under_arbitrary_operations(
                ops in proptest::collection::vec(op_strategy(), 1..60)
            ) {
                let store = CatalogStore::new();
                for op in &ops {
                    apply(&store, op);
                    if let Err(violation) = store.verify_invariants() {
                        return Err(TestCaseError::fail(format!("{violation} after {op:?}")));
                    }
                }
            }
        }
    }
}
