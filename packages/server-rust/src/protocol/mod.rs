//! Command-channel codec: framed requests in, framed responses out.

pub mod codec;

pub use codec::{ClientCodec, CommandCodec, ProtocolError};
