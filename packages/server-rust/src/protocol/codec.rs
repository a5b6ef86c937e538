//! Tokio codec over the 2-byte preamble/trailer framing.
//!
//! [`CommandCodec`] is the server side: it decodes request frames and
//! encodes response frames. [`ClientCodec`] is the mirror image, used by
//! the in-tree tests (and by anything else that wants to speak to a
//! Registry from Rust). Both delegate the byte-level work to
//! `nimo_core::frame` so there is exactly one implementation of the
//! framing rules.

use bytes::{BufMut, BytesMut};
use nimo_core::frame::{self, FrameHeader, FrameRole, HEADER_LEN};
use nimo_core::{EnvelopeError, FrameError, Request, Response};
use tokio_util::codec::{Decoder, Encoder};

/// Hard protocol violations. Any of these ends the session.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error("peer sent a {found:?} frame where a {expected:?} frame belongs")]
    UnexpectedRole {
        expected: FrameRole,
        found: FrameRole,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Pulls one complete frame off the buffer, or asks for more bytes.
fn decode_frame(
    src: &mut BytesMut,
    expected: FrameRole,
) -> Result<Option<nimo_core::Value>, ProtocolError> {
    if src.len() < HEADER_LEN {
        return Ok(None);
    }
    let header = FrameHeader::from_bytes([src[0], src[1]]);
    if header.role != expected {
        return Err(ProtocolError::UnexpectedRole {
            expected,
            found: header.role,
        });
    }
    let total = HEADER_LEN + header.len + HEADER_LEN;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }
    let bytes = src.split_to(total);
    let (_, value) = frame::unframe_message(&bytes)?;
    Ok(Some(value))
}

/// Server-side codec: requests in, responses out.
#[derive(Debug, Default)]
pub struct CommandCodec;

impl Decoder for CommandCodec {
    type Item = Request;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Request>, ProtocolError> {
        match decode_frame(src, FrameRole::Request)? {
            Some(value) => Ok(Some(Request::from_value(value)?)),
            None => Ok(None),
        }
    }
}

impl Encoder<Response> for CommandCodec {
    type Error = ProtocolError;

    fn encode(&mut self, response: Response, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let bytes = frame::frame_message(FrameRole::Response, &response.into_value())?;
        dst.put_slice(&bytes);
        Ok(())
    }
}

/// Client-side codec: responses in, requests out.
#[derive(Debug, Default)]
pub struct ClientCodec;

impl Decoder for ClientCodec {
    type Item = Response;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Response>, ProtocolError> {
        match decode_frame(src, FrameRole::Response)? {
            Some(value) => Ok(Some(Response::from_value(value)?)),
            None => Ok(None),
        }
    }
}

impl Encoder<Request> for ClientCodec {
    type Error = ProtocolError;

    fn encode(&mut self, request: Request, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let bytes = frame::frame_message(FrameRole::Request, &request.into_value())?;
        dst.put_slice(&bytes);
        Ok(())
    }
}
