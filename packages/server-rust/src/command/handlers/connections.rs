//! Connection command handlers: `addX`, `rmX`, `infXA`, `infXN`, `infXM`.

use std::sync::Arc;

use nimo_core::{opcodes, Value};

use crate::catalog::{CatalogStore, ChannelKey, ConnectionInfo};
use crate::command::{args, CommandHandler, HandlerError, HandlerMap, SessionContext};
use crate::status::StatusPublisher;

pub(crate) fn register(
    map: &mut HandlerMap,
    catalog: &Arc<CatalogStore>,
    publisher: &Arc<StatusPublisher>,
) {
    map.register(Arc::new(AddConnection {
        catalog: Arc::clone(catalog),
        publisher: Arc::clone(publisher),
    }));
    map.register(Arc::new(RemoveConnection {
        catalog: Arc::clone(catalog),
        publisher: Arc::clone(publisher),
    }));
    map.register(Arc::new(AllConnections {
        catalog: Arc::clone(catalog),
    }));
    map.register(Arc::new(ConnectionsOnNode {
        catalog: Arc::clone(catalog),
    }));
    map.register(Arc::new(ConnectionsOnMachine {
        catalog: Arc::clone(catalog),
    }));
}

fn infos_to_value(infos: Vec<ConnectionInfo>) -> Value {
    Value::Array(infos.iter().map(ConnectionInfo::to_value).collect())
}

/// `addX <fromNode> <fromPath> <toNode> <toPath> <dataType> <modes>`
struct AddConnection {
    catalog: Arc<CatalogStore>,
    publisher: Arc<StatusPublisher>,
}

impl CommandHandler for AddConnection {
    fn opcode(&self) -> &'static str {
        opcodes::ADD_CONNECTION
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (6, Some(6))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let from = ChannelKey::new(
            args::string(args, 0, "fromNode")?,
            args::string(args, 1, "fromPath")?,
        );
        let to = ChannelKey::new(
            args::string(args, 2, "toNode")?,
            args::string(args, 3, "toPath")?,
        );
        let data_type = args::string(args, 4, "dataType")?;
        let modes = args::modes(args, 5, "modes")?;
        let events = self.catalog.add_connection(&from, &to, data_type, modes)?;
        self.publisher.publish_all(&events);
        Ok(Value::Logical(true))
    }
}

/// `rmX <fromNode> <fromPath>` -- connections are identified by their
/// from-endpoint, which holds at most one.
struct RemoveConnection {
    catalog: Arc<CatalogStore>,
    publisher: Arc<StatusPublisher>,
}

impl CommandHandler for RemoveConnection {
    fn opcode(&self) -> &'static str {
        opcodes::REMOVE_CONNECTION
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (2, Some(2))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let from = ChannelKey::new(
            args::string(args, 0, "fromNode")?,
            args::string(args, 1, "fromPath")?,
        );
        let events = self.catalog.remove_connection(&from)?;
        self.publisher.publish_all(&events);
        Ok(Value::Logical(true))
    }
}

/// `infXA` -- ordered by the from-endpoint's machine, node, then path.
struct AllConnections {
    catalog: Arc<CatalogStore>,
}

impl CommandHandler for AllConnections {
    fn opcode(&self) -> &'static str {
        opcodes::ALL_CONNECTIONS
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (0, Some(0))
    }

    fn execute(&self, _args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        Ok(infos_to_value(self.catalog.all_connections()))
    }
}

/// `infXN <node>` -- connections touching the node on either end.
struct ConnectionsOnNode {
    catalog: Arc<CatalogStore>,
}

impl CommandHandler for ConnectionsOnNode {
    fn opcode(&self) -> &'static str {
        opcodes::CONNECTIONS_ON_NODE
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (1, Some(1))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let node = args::string(args, 0, "nodeName")?;
        Ok(infos_to_value(self.catalog.connections_on_node(node)?))
    }
}

/// `infXM <machine>` -- connections touching any node on the machine.
struct ConnectionsOnMachine {
    catalog: Arc<CatalogStore>,
}

impl CommandHandler for ConnectionsOnMachine {
    fn opcode(&self) -> &'static str {
        opcodes::CONNECTIONS_ON_MACHINE
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (1, Some(1))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let machine = args::string(args, 0, "machineName")?;
        Ok(infos_to_value(self.catalog.connections_on_machine(machine)?))
    }
}
