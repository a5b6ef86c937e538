//! Application-tag handlers: `setA`, `getA`.

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
    map.register(Arc::new(SetApplication {
        catalog: Arc::clone(catalog),
        publisher: Arc::clone(publisher),
    }));
    map.register(Arc::new(GetApplication {
        catalog: Arc::clone(catalog),
    }));
}

/// `setA <node> <application>` -- tags the node; overwrites a previous tag.
struct SetApplication {
    catalog: Arc<CatalogStore>,
    publisher: Arc<StatusPublisher>,
}

impl CommandHandler for SetApplication {
    fn opcode(&self) -> &'static str {
        opcodes::SET_APPLICATION
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (2, Some(2))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let node = args::string(args, 0, "nodeName")?;
        let application = args::string(args, 1, "applicationName")?;
        let events = self.catalog.set_application(node, application)?;
        self.publisher.publish_all(&events);
        Ok(Value::Logical(true))
    }
}

/// `getA <node>` -- the tag, or an empty string when none was ever set
/// (empty is never a valid tag, so the answer is unambiguous).
struct GetApplication {
    catalog: Arc<CatalogStore>,
}

impl CommandHandler for GetApplication {
    fn opcode(&self) -> &'static str {
        opcodes::GET_APPLICATION
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (1, Some(1))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let node = args::string(args, 0, "nodeName")?;
        let application = self.catalog.get_application(node)?.unwrap_or_default();
        Ok(Value::String(application))
    }
}
