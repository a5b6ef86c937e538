//! Machine command handlers: `addM`, `rmM`, `isM?`, `cntM`, `lstM`.

use std::sync::Arc;

use nimo_core::{opcodes, Value};

use crate::catalog::CatalogStore;
use crate::command::{args, CommandHandler, HandlerError, HandlerMap, SessionContext};
use crate::status::StatusPublisher;

pub(crate) fn register(
    map: &mut HandlerMap,
    catalog: &Arc<CatalogStore>,
    publisher: &Arc<StatusPublisher>,
) {
    map.register(Arc::new(AddMachine {
        catalog: Arc::clone(catalog),
        publisher: Arc::clone(publisher),
    }));
    map.register(Arc::new(RemoveMachine {
        catalog: Arc::clone(catalog),
        publisher: Arc::clone(publisher),
    }));
    map.register(Arc::new(IsMachinePresent {
        catalog: Arc::clone(catalog),
    }));
    map.register(Arc::new(CountMachines {
        catalog: Arc::clone(catalog),
    }));
    map.register(Arc::new(MachineNames {
        catalog: Arc::clone(catalog),
    }));
}

/// `addM <name> <ipv4>` -- registers a machine. Idempotent on identical
/// re-adds.
struct AddMachine {
    catalog: Arc<CatalogStore>,
    publisher: Arc<StatusPublisher>,
}

impl CommandHandler for AddMachine {
    fn opcode(&self) -> &'static str {
        opcodes::ADD_MACHINE
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (2, Some(2))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let name = args::string(args, 0, "machineName")?;
        let address = args::ipv4(args, 1, "address")?;
        let events = self.catalog.add_machine(name, address)?;
        self.publisher.publish_all(&events);
        Ok(Value::Logical(true))
    }
}

/// `rmM <name>` -- removes a machine with no remaining nodes.
struct RemoveMachine {
    catalog: Arc<CatalogStore>,
    publisher: Arc<StatusPublisher>,
}

impl CommandHandler for RemoveMachine {
    fn opcode(&self) -> &'static str {
        opcodes::REMOVE_MACHINE
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (1, Some(1))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let name = args::string(args, 0, "machineName")?;
        let events = self.catalog.remove_machine(name)?;
        self.publisher.publish_all(&events);
        Ok(Value::Logical(true))
    }
}

/// `isM? <name>`
struct IsMachinePresent {
    catalog: Arc<CatalogStore>,
}

impl CommandHandler for IsMachinePresent {
    fn opcode(&self) -> &'static str {
        opcodes::IS_MACHINE_PRESENT
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (1, Some(1))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let name = args::string(args, 0, "machineName")?;
        Ok(Value::Logical(self.catalog.is_machine_present(name)))
    }
}

/// `cntM`
struct CountMachines {
    catalog: Arc<CatalogStore>,
}

impl CommandHandler for CountMachines {
    fn opcode(&self) -> &'static str {
        opcodes::COUNT_MACHINES
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (0, Some(0))
    }

    fn execute(&self, _args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        Ok(Value::Integer(count_to_i64(self.catalog.count_machines())))
    }
}

/// `lstM`
struct MachineNames {
    catalog: Arc<CatalogStore>,
}

impl CommandHandler for MachineNames {
    fn opcode(&self) -> &'static str {
        opcodes::MACHINE_NAMES
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (0, Some(0))
    }

    fn execute(&self, _args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        Ok(Value::Set(self.catalog.machine_names()))
    }
}

/// Counts come from `usize` maps and always fit an `i64`.
pub(crate) fn count_to_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
