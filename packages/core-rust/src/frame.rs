//! Stream framing for command-channel messages.
//!
//! One message on the wire is `preamble(2) | payload(N) | trailer(2)`. The
//! preamble is a big-endian `u16` whose top bit carries the role (0 =
//! request, 1 = response) and whose low 15 bits carry the payload length;
//! the trailer must mirror the preamble exactly. A reader consumes the
//! preamble, reads exactly the declared length, checks the trailer, then
//! decodes the payload as a single [`Value`]. Any mismatch is a hard
//! protocol error: the session that produced it cannot be trusted to be in
//! sync again.

use crate::value::{Value, ValueError};

/// Largest payload that fits the 15-bit length field.
pub const MAX_PAYLOAD_LEN: usize = 0x7FFF;

/// Number of bytes in the preamble (and in the trailer).
pub const HEADER_LEN: usize = 2;

const ROLE_BIT: u16 = 0x8000;

/// Which side of a command exchange a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRole {
    Request,
    Response,
}

/// Errors raised while framing or unframing a message.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("payload of {len} bytes exceeds the {MAX_PAYLOAD_LEN}-byte frame limit")]
    Oversize { len: usize },
    #[error("frame trailer does not match its preamble")]
    TrailerMismatch,
    #[error("frame truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Decoded preamble: the role and the payload length it announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub role: FrameRole,
    pub len: usize,
}

impl FrameHeader {
    /// Packs this header into its 2-byte wire form.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Oversize`] when the length does not fit the
    /// 15-bit field.
    pub fn to_bytes(self) -> Result<[u8; HEADER_LEN], FrameError> {
        if self.len > MAX_PAYLOAD_LEN {
            return Err(FrameError::Oversize { len: self.len });
        }
        #[allow(clippy::cast_possible_truncation)]
        let mut word = self.len as u16;
        if self.role == FrameRole::Response {
            word |= ROLE_BIT;
        }
        Ok(word.to_be_bytes())
    }

    /// Unpacks a 2-byte preamble or trailer. Never fails: every bit
    /// pattern names a role and a length.
    #[must_use]
    pub fn from_bytes(bytes: [u8; HEADER_LEN]) -> Self {
        let word = u16::from_be_bytes(bytes);
        let role = if word & ROLE_BIT == 0 {
            FrameRole::Request
        } else {
            FrameRole::Response
        };
        Self {
            role,
            len: usize::from(word & !ROLE_BIT),
        }
    }
}

/// Encodes `value` and wraps it in preamble and trailer.
///
/// # Errors
///
/// Returns [`FrameError::Oversize`] when the encoded payload exceeds
/// [`MAX_PAYLOAD_LEN`], or a [`ValueError`] if encoding fails.
pub fn frame_message(role: FrameRole, value: &Value) -> Result<Vec<u8>, FrameError> {
    let payload = value.encode()?;
    let header = FrameHeader {
        role,
        len: payload.len(),
    }
    .to_bytes()?;

    let mut out = Vec::with_capacity(payload.len() + 2 * HEADER_LEN);
    out.extend_from_slice(&header);
    out.extend_from_slice(&payload);
    out.extend_from_slice(&header);
    Ok(out)
}

/// Parses one complete frame from `bytes`, which must hold exactly one
/// message.
///
/// # Errors
///
/// Returns [`FrameError::Truncated`] when the buffer is shorter than the
/// announced frame, [`FrameError::TrailerMismatch`] when the trailer does
/// not mirror the preamble, and decode errors from the payload.
pub fn unframe_message(bytes: &[u8]) -> Result<(FrameRole, Value), FrameError> {
    if bytes.len() < HEADER_LEN {
        return Err(FrameError::Truncated {
            expected: HEADER_LEN,
            found: bytes.len(),
        });
    }
    let header = FrameHeader::from_bytes([bytes[0], bytes[1]]);
    let total = HEADER_LEN + header.len + HEADER_LEN;
    if bytes.len() < total {
        return Err(FrameError::Truncated {
            expected: total,
            found: bytes.len(),
        });
    }
    let payload = &bytes[HEADER_LEN..HEADER_LEN + header.len];
    let trailer = [bytes[total - 2], bytes[total - 1]];
    if FrameHeader::from_bytes(trailer) != header {
        return Err(FrameError::TrailerMismatch);
    }
    let value = Value::decode(payload)?;
    Ok((header.role, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        Value::Array(vec![
            Value::String("cntM".to_string()),
        ])
    }

    #[test]
    fn header_roundtrip_request() {
        let header = FrameHeader {
            role: FrameRole::Request,
            len: 1234,
        };
        let bytes = header.to_bytes().expect("pack");
        assert_eq!(FrameHeader::from_bytes(bytes), header);
    }

    #[test]
    fn header_roundtrip_response() {
        let header = FrameHeader {
            role: FrameRole::Response,
            len: MAX_PAYLOAD_LEN,
        };
        let bytes = header.to_bytes().expect("pack");
        assert_eq!(FrameHeader::from_bytes(bytes), header);
    }

    #[test]
    fn header_rejects_oversize() {
        let header = FrameHeader {
            role: FrameRole::Request,
            len: MAX_PAYLOAD_LEN + 1,
        };
        assert!(matches!(
            header.to_bytes(),
            Err(FrameError::Oversize { .. })
        ));
    }

    #[test]
    fn frame_roundtrip() {
        let value = sample();
        let framed = frame_message(FrameRole::Request, &value).expect("frame");
        let (role, decoded) = unframe_message(&framed).expect("unframe");
        assert_eq!(role, FrameRole::Request);
        assert_eq!(decoded, value);
    }

    #[test]
    fn response_role_survives_framing() {
        let framed = frame_message(FrameRole::Response, &sample()).expect("frame");
        let (role, _) = unframe_message(&framed).expect("unframe");
        assert_eq!(role, FrameRole::Response);
    }

    #[test]
    fn trailer_mismatch_detected() {
        let mut framed = frame_message(FrameRole::Request, &sample()).expect("frame");
        let last = framed.len() - 1;
        framed[last] ^= 0x01;
        assert!(matches!(
            unframe_message(&framed),
            Err(FrameError::TrailerMismatch)
        ));
    }

    #[test]
    fn truncated_frame_detected() {
        let framed = frame_message(FrameRole::Request, &sample()).expect("frame");
        assert!(matches!(
            unframe_message(&framed[..framed.len() - 3]),
            Err(FrameError::Truncated { .. })
        ));
    }

    #[test]
    fn corrupt_payload_detected() {
        let value = Value::String("abcdefgh".to_string());
        let mut framed = frame_message(FrameRole::Request, &value).expect("frame");
        // Clobber a payload byte without touching preamble or trailer.
        framed[HEADER_LEN] = 0xC1; // 0xC1 is never a valid MessagePack byte
        assert!(matches!(
            unframe_message(&framed),
            Err(FrameError::Value(_))
        ));
    }
}
