//! Command-channel envelopes: requests, responses, and the opcode table.
//!
//! A request on the wire is an array `[opcode, arg1, …]`; a response is
//! `[opcode, okFlag, result_or_errorString]`. The envelope types here only
//! deal with array shape -- argument counts and types belong to the
//! per-opcode handlers.

use crate::value::Value;

/// The stable opcode strings understood by the Registry.
pub mod opcodes {
    pub const ADD_MACHINE: &str = "addM";
    pub const REMOVE_MACHINE: &str = "rmM";
    pub const IS_MACHINE_PRESENT: &str = "isM?";
    pub const COUNT_MACHINES: &str = "cntM";
    pub const MACHINE_NAMES: &str = "lstM";

    pub const ADD_NODE: &str = "addN";
    pub const REMOVE_NODE: &str = "rmN";
    pub const IS_NODE_PRESENT: &str = "isN?";
    pub const COUNT_NODES: &str = "cntN";
    pub const NODE_NAMES: &str = "lstN";
    pub const NODE_INFO: &str = "infN";
    pub const ALL_NODE_INFO: &str = "infNA";

    pub const SET_APPLICATION: &str = "setA";
    pub const GET_APPLICATION: &str = "getA";

    pub const ADD_CHANNEL: &str = "addC";
    pub const REMOVE_CHANNEL: &str = "rmC";
    pub const REMOVE_CHANNELS_FOR_NODE: &str = "rmCFN";
    pub const CHANNEL_INFO: &str = "infC";
    pub const CHANNELS_ON_NODE: &str = "infCN";
    pub const ALL_CHANNELS: &str = "infCA";

    pub const ADD_CONNECTION: &str = "addX";
    pub const REMOVE_CONNECTION: &str = "rmX";
    pub const ALL_CONNECTIONS: &str = "infXA";
    pub const CONNECTIONS_ON_NODE: &str = "infXN";
    pub const CONNECTIONS_ON_MACHINE: &str = "infXM";
}

/// Errors from interpreting a decoded [`Value`] as an envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("message payload is a {0}, not an array")]
    NotAnArray(&'static str),
    #[error("message array is missing its opcode")]
    MissingOpcode,
    #[error("opcode is a {0}, not a string")]
    OpcodeNotAString(&'static str),
    #[error("response is missing its ok flag")]
    MissingOkFlag,
    #[error("response ok flag is a {0}, not a logical")]
    OkFlagNotLogical(&'static str),
    #[error("response is missing its result value")]
    MissingResult,
}

/// One command request: an opcode plus its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub opcode: String,
    pub args: Vec<Value>,
}

impl Request {
    #[must_use]
    pub fn new(opcode: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            opcode: opcode.into(),
            args,
        }
    }

    /// Flattens this request into its wire array.
    #[must_use]
    pub fn into_value(self) -> Value {
        let mut items = Vec::with_capacity(1 + self.args.len());
        items.push(Value::String(self.opcode));
        items.extend(self.args);
        Value::Array(items)
    }

    /// Interprets a decoded payload as a request envelope.
    ///
    /// # Errors
    ///
    /// Returns an [`EnvelopeError`] when the payload is not an array whose
    /// first element is a string.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        let Value::Array(mut items) = value else {
            return Err(EnvelopeError::NotAnArray(value.kind()));
        };
        if items.is_empty() {
            return Err(EnvelopeError::MissingOpcode);
        }
        let args = items.split_off(1);
        let opcode = match items.into_iter().next() {
            Some(Value::String(s)) => s,
            Some(other) => return Err(EnvelopeError::OpcodeNotAString(other.kind())),
            None => return Err(EnvelopeError::MissingOpcode),
        };
        Ok(Self { opcode, args })
    }
}

/// One command response: the echoed opcode, an ok flag, and either the
/// operation's result value or an error string.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub opcode: String,
    pub ok: bool,
    pub result: Value,
}

impl Response {
    /// A successful response carrying `result`.
    #[must_use]
    pub fn success(opcode: impl Into<String>, result: Value) -> Self {
        Self {
            opcode: opcode.into(),
            ok: true,
            result,
        }
    }

    /// A failed response carrying a reason string.
    #[must_use]
    pub fn failure(opcode: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            opcode: opcode.into(),
            ok: false,
            result: Value::String(reason.into()),
        }
    }

    /// Flattens this response into its wire array.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Array(vec![
            Value::String(self.opcode),
            Value::Logical(self.ok),
            self.result,
        ])
    }

    /// Interprets a decoded payload as a response envelope.
    ///
    /// # Errors
    ///
    /// Returns an [`EnvelopeError`] when the payload is not
    /// `[string, logical, value]`.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        let Value::Array(items) = value else {
            return Err(EnvelopeError::NotAnArray(value.kind()));
        };
        let mut items = items.into_iter();
        let opcode = match items.next() {
            Some(Value::String(s)) => s,
            Some(other) => return Err(EnvelopeError::OpcodeNotAString(other.kind())),
            None => return Err(EnvelopeError::MissingOpcode),
        };
        let ok = match items.next() {
            Some(Value::Logical(b)) => b,
            Some(other) => return Err(EnvelopeError::OkFlagNotLogical(other.kind())),
            None => return Err(EnvelopeError::MissingOkFlag),
        };
        let result = items.next().ok_or(EnvelopeError::MissingResult)?;
        Ok(Self { opcode, ok, result })
    }
}
