//! Channel command handlers: `addC`, `rmC`, `rmCFN`, `infC`, `infCN`,
//! `infCA`.

use std::sync::Arc;

use nimo_core::{opcodes, ChannelDirection, Value};

use crate::catalog::{CatalogStore, ChannelInfo};
use crate::command::{args, CommandHandler, HandlerError, HandlerMap, SessionContext};
use crate::status::StatusPublisher;

pub(crate) fn register(
    map: &mut HandlerMap,
    catalog: &Arc<CatalogStore>,
    publisher: &Arc<StatusPublisher>,
) {
    map.register(Arc::new(AddChannel {
        catalog: Arc::clone(catalog),
        publisher: Arc::clone(publisher),
    }));
    map.register(Arc::new(RemoveChannel {
        catalog: Arc::clone(catalog),
        publisher: Arc::clone(publisher),
    }));
    map.register(Arc::new(RemoveChannelsForNode {
        catalog: Arc::clone(catalog),
        publisher: Arc::clone(publisher),
    }));
    map.register(Arc::new(ChannelInfoHandler {
        catalog: Arc::clone(catalog),
    }));
    map.register(Arc::new(ChannelsOnNode {
        catalog: Arc::clone(catalog),
    }));
    map.register(Arc::new(AllChannels {
        catalog: Arc::clone(catalog),
    }));
}

fn infos_to_value(infos: Vec<ChannelInfo>) -> Value {
    Value::Array(infos.iter().map(ChannelInfo::to_value).collect())
}

/// `addC <node> <path> <isOutput> <dataType> <modes>`
struct AddChannel {
    catalog: Arc<CatalogStore>,
    publisher: Arc<StatusPublisher>,
}

impl CommandHandler for AddChannel {
    fn opcode(&self) -> &'static str {
        opcodes::ADD_CHANNEL
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (5, Some(5))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let node = args::string(args, 0, "nodeName")?;
        let path = args::string(args, 1, "path")?;
        let direction = ChannelDirection::from_is_output(args::logical(args, 2, "isOutput")?);
        let data_type = args::string(args, 3, "dataType")?;
        let modes = args::modes(args, 4, "modes")?;
        let events = self
            .catalog
            .add_channel(node, path, direction, data_type, modes)?;
        self.publisher.publish_all(&events);
        Ok(Value::Logical(true))
    }
}

/// `rmC <node> <path>` -- cascades to a connection using the channel.
struct RemoveChannel {
    catalog: Arc<CatalogStore>,
    publisher: Arc<StatusPublisher>,
}

impl CommandHandler for RemoveChannel {
    fn opcode(&self) -> &'static str {
        opcodes::REMOVE_CHANNEL
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (2, Some(2))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let node = args::string(args, 0, "nodeName")?;
        let path = args::string(args, 1, "path")?;
        let events = self.catalog.remove_channel(node, path)?;
        self.publisher.publish_all(&events);
        Ok(Value::Logical(true))
    }
}

/// `rmCFN <node>` -- clears every channel on the node, cascading to
/// connections; the node stays registered.
struct RemoveChannelsForNode {
    catalog: Arc<CatalogStore>,
    publisher: Arc<StatusPublisher>,
}

impl CommandHandler for RemoveChannelsForNode {
    fn opcode(&self) -> &'static str {
        opcodes::REMOVE_CHANNELS_FOR_NODE
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (1, Some(1))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let node = args::string(args, 0, "nodeName")?;
        let events = self.catalog.remove_channels_for_node(node)?;
        self.publisher.publish_all(&events);
        Ok(Value::Logical(true))
    }
}

/// `infC <node> <path>`
struct ChannelInfoHandler {
    catalog: Arc<CatalogStore>,
}

impl CommandHandler for ChannelInfoHandler {
    fn opcode(&self) -> &'static str {
        opcodes::CHANNEL_INFO
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (2, Some(2))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let node = args::string(args, 0, "nodeName")?;
        let path = args::string(args, 1, "path")?;
        Ok(self.catalog.channel_info(node, path)?.to_value())
    }
}

/// `infCN <node>`
struct ChannelsOnNode {
    catalog: Arc<CatalogStore>,
}

impl CommandHandler for ChannelsOnNode {
    fn opcode(&self) -> &'static str {
        opcodes::CHANNELS_ON_NODE
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (1, Some(1))
    }

    fn execute(&self, args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        let node = args::string(args, 0, "nodeName")?;
        Ok(infos_to_value(self.catalog.channels_on_node(node)?))
    }
}

/// `infCA` -- every channel, ordered by machine, node, then path.
struct AllChannels {
    catalog: Arc<CatalogStore>,
}

impl CommandHandler for AllChannels {
    fn opcode(&self) -> &'static str {
        opcodes::ALL_CHANNELS
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (0, Some(0))
    }

    fn execute(&self, _args: &[Value], _ctx: &SessionContext) -> Result<Value, HandlerError> {
        Ok(infos_to_value(self.catalog.all_channels()))
    }
}
