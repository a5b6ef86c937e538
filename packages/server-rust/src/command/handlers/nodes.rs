//! Node command handlers: `addN`, `rmN`, `isN?`, `cntN`, `lstN`, `infN`,
//! `infNA`.

use std::sync::Arc;

use nimo_core::{opcodes, Value};

use crate::catalog::{CatalogStore, LaunchDetails, NodeInfo};
use crate::command::{args, CommandHandler, HandlerError, HandlerMap, SessionContext};
use crate::status::StatusPublisher;

use super::machines::count_to_i64;

pub(crate) fn register(
    map: &mut HandlerMap,
    catalog: &Arc<CatalogStore>,
    publisher: &Arc<StatusPublisher>,
) {
    map.register(Arc::new(AddNode {
        catalog: Arc::clone(catalog),
        publisher: Arc::clone(publisher),
    }));
    map.register(Arc::new(RemoveNode {
        catalog: Arc::clone(catalog),
        publisher: Arc::clone(publisher),
    }));
    map.register(Arc::new(IsNodePresent {
        catalog: Arc::clone(catalog),
    }));
    map.register(Arc::new(CountNodes {
        catalog: Arc::clone(catalog),
    }));
    map.register(Arc::new(NodeNames {
        catalog: Arc::clone(catalog),
    }));
    map.register(Arc::new(NodeInfoHandler {
        catalog: Arc::clone(catalog),
    }));
    map.register(Arc::new(AllNodeInfo {
        catalog: Arc::clone(catalog),
    }));
}

fn infos_to_value(infos: Vec<NodeInfo>) -> Value {
    Value::Array(infos.iter().map(NodeInfo::to_value).collect())
}

/// `addN <name> <machine> <execPath> <workingDir> <commandLine>
/// <serviceType> <[address, port]>`
struct AddNode {
    catalog: Arc<CatalogStore>,
    publisher: Arc<StatusPublisher>,
}

impl CommandHandler for AddNode {
    fn opcode(&self) -> &'static str {
        opcodes::ADD_NODE
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (7, Some(7))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let name = args::string(args, 0, "nodeName")?;
        let machine = args::string(args, 1, "machineName")?;
        let launch = LaunchDetails {
            exec_path: args::string(args, 2, "execPath")?.to_string(),
            working_dir: args::string(args, 3, "workingDir")?.to_string(),
            command_line: args::string(args, 4, "commandLine")?.to_string(),
        };
        let service_type = args::service_type(args, 5, "serviceType")?;
        let endpoint = args::endpoint(args, 6, "endpoint")?;
        let events = self
            .catalog
            .add_node(name, machine, service_type, endpoint, launch)?;
        self.publisher.publish_all(&events);
        Ok(Value::Logical(true))
    }
}

/// `rmN <name>` -- removal cascades to the node's channels and their
/// connections; every cascaded deletion is published.
struct RemoveNode {
    catalog: Arc<CatalogStore>,
    publisher: Arc<StatusPublisher>,
}

impl CommandHandler for RemoveNode {
    fn opcode(&self) -> &'static str {
        opcodes::REMOVE_NODE
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (1, Some(1))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let name = args::string(args, 0, "nodeName")?;
        let events = self.catalog.remove_node(name)?;
        self.publisher.publish_all(&events);
        Ok(Value::Logical(true))
    }
}

/// `isN? <name>`
struct IsNodePresent {
    catalog: Arc<CatalogStore>,
}

impl CommandHandler for IsNodePresent {
    fn opcode(&self) -> &'static str {
        opcodes::IS_NODE_PRESENT
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (1, Some(1))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let name = args::string(args, 0, "nodeName")?;
        Ok(Value::Logical(self.catalog.is_node_present(name)))
    }
}

/// `cntN [machine]` -- network-wide count, or one machine's.
struct CountNodes {
    catalog: Arc<CatalogStore>,
}

impl CommandHandler for CountNodes {
    fn opcode(&self) -> &'static str {
        opcodes::COUNT_NODES
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (0, Some(1))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let count = match args::optional_string(args, 0, "machineName")? {
            Some(machine) => self.catalog.count_nodes_on(machine)?,
            None => self.catalog.count_nodes(),
        };
        Ok(Value::Integer(count_to_i64(count)))
    }
}

/// `lstN [machine]`
struct NodeNames {
    catalog: Arc<CatalogStore>,
}

impl CommandHandler for NodeNames {
    fn opcode(&self) -> &'static str {
        opcodes::NODE_NAMES
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (0, Some(1))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let names = match args::optional_string(args, 0, "machineName")? {
            Some(machine) => self.catalog.node_names_on(machine)?,
            None => self.catalog.node_names(),
        };
        Ok(Value::Set(names))
    }
}

/// `infN <name>` -- the full record, launch details included.
struct NodeInfoHandler {
    catalog: Arc<CatalogStore>,
}

impl CommandHandler for NodeInfoHandler {
    fn opcode(&self) -> &'static str {
        opcodes::NODE_INFO
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (1, Some(1))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let name = args::string(args, 0, "nodeName")?;
        Ok(self.catalog.node_info(name)?.to_value())
    }
}

/// `infNA [machine]` -- ordered by machine name, then node name.
struct AllNodeInfo {
    catalog: Arc<CatalogStore>,
}

impl CommandHandler for AllNodeInfo {
    fn opcode(&self) -> &'static str {
        opcodes::ALL_NODE_INFO
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (0, Some(1))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let infos = match args::optional_string(args, 0, "machineName")? {
            Some(machine) => self.catalog.all_node_info_on(machine)?,
            None => self.catalog.all_node_info(),
        };
        Ok(infos_to_value(infos))
    }
}
