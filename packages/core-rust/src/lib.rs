//! `nImO` Core -- typed values, wire framing, command envelopes, and status event schemas.
//!
//! This crate provides the foundation layer shared by the Registry service
//! and anything that talks to it:
//!
//! - **Value** ([`value`]): the sum-type `Value` (logical, integer, double,
//!   string, blob, array, map, set) with its MessagePack wire codec
//! - **Frame** ([`frame`]): the 2-byte preamble/trailer stream framing for
//!   command-channel messages
//! - **Messages** ([`messages`]): request/response envelopes and the
//!   opcode table
//! - **Schema** ([`schema`]): wire-visible catalog types -- `ServiceType`,
//!   `ChannelDirection`, `TransportModes`, `NodeEndpoint`
//! - **Events** ([`events`]): the status-multicast event schema
//!
//! Nothing in this crate performs I/O.

pub mod events;
pub mod frame;
pub mod messages;
pub mod schema;
pub mod value;

// Value model
pub use value::{Value, ValueError, WILDCARD_DATA_TYPE};

// Framing
pub use frame::{FrameError, FrameHeader, FrameRole, HEADER_LEN, MAX_PAYLOAD_LEN};

// Envelopes
pub use messages::{opcodes, EnvelopeError, Request, Response};

// Schema
pub use schema::{ChannelDirection, NodeEndpoint, ServiceType, TransportModes};

// Events
pub use events::{EventError, StatusEvent};
