//! Duplicate-Registry probe.
//!
//! Exactly one Registry may exist per network. Before announcing, the
//! service multicasts a PTR question for its own service type and listens
//! through a short startup window; any answer means another Registry is
//! already there and startup must fail.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use tracing::debug;

use super::announcer::{MDNS_GROUP, MDNS_PORT};
use super::dns::{DnsMessage, Question, RecordData, TYPE_PTR, UNICAST_RESPONSE_BIT};

/// The probe question: a QU PTR query so responders answer us directly.
#[must_use]
pub fn probe_query(service_type: &str) -> DnsMessage {
    let mut question = Question::new(service_type, TYPE_PTR);
    question.class |= UNICAST_RESPONSE_BIT;
    DnsMessage::query(question)
}

/// Whether `bytes` is a discovery response claiming `service_type`.
#[must_use]
pub fn is_registry_answer(bytes: &[u8], service_type: &str) -> bool {
    let Ok(message) = DnsMessage::decode(bytes) else {
        return false;
    };
    message.is_response
        && message.answers.iter().any(|record| {
            record.ttl > 0
                && record.name.eq_ignore_ascii_case(service_type)
                && matches!(record.data, RecordData::Ptr(_))
        })
}

/// Probes the LAN for an existing Registry.
///
/// Sends the query `attempts` times spread over `window` and listens in
/// between. Returns the answering origin, or `None` when the window
/// closes silently.
///
/// # Errors
///
/// Returns socket errors from bind or send; a quiet network is not an
/// error.
pub fn probe_for_registry(
    service_type: &str,
    window: Duration,
    attempts: u32,
) -> io::Result<Option<SocketAddr>> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.set_multicast_ttl_v4(255)?;
    socket.set_multicast_loop_v4(true)?;
    socket.set_read_timeout(Some(Duration::from_millis(100)))?;

    let query = probe_query(service_type)
        .encode()
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;

    let attempts = attempts.max(1);
    let deadline = Instant::now() + window;
    let resend_every = window / attempts;
    let mut next_send = Instant::now();

    let mut buf = [0_u8; 4096];
    while Instant::now() < deadline {
        if Instant::now() >= next_send {
            socket.send_to(&query, (MDNS_GROUP, MDNS_PORT))?;
            next_send += resend_every;
        }
        match socket.recv_from(&mut buf) {
            Ok((len, origin)) => {
                if is_registry_answer(&buf[..len], service_type) {
                    debug!(%origin, "existing Registry answered the probe");
                    return Ok(Some(origin));
                }
            }
            Err(error)
                if error.kind() == io::ErrorKind::WouldBlock
                    || error.kind() == io::ErrorKind::TimedOut => {}
            Err(error) => return Err(error),
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::announcer::{announcement, AnnouncementData};

    const SERVICE: &str = "_nimo-registry._tcp.local.";

    fn data() -> AnnouncementData {
        AnnouncementData::new(
            SERVICE,
            "styx",
            Ipv4Addr::new(192, 168, 1, 11),
            52_131,
            Vec::new(),
        )
    }

    #[test]
    fn probe_query_asks_for_unicast_ptr() {
        let query = probe_query(SERVICE);
        assert!(!query.is_response);
        assert_eq!(query.questions.len(), 1);
        assert_eq!(query.questions[0].rtype, TYPE_PTR);
        assert!(query.questions[0].unicast_requested());
    }

    #[test]
    fn announcement_is_recognized_as_registry_answer() {
        let bytes = announcement(&data(), 4500).encode().expect("encode");
        assert!(is_registry_answer(&bytes, SERVICE));
    }

    #[test]
    fn goodbye_is_not_a_registry_answer() {
        // TTL 0 means the instance is leaving, not present.
        let bytes = announcement(&data(), 0).encode().expect("encode");
        assert!(!is_registry_answer(&bytes, SERVICE));
    }

    #[test]
    fn other_services_are_not_registry_answers() {
        let other = AnnouncementData::new(
            "_ipp._tcp.local.",
            "printer",
            Ipv4Addr::new(192, 168, 1, 12),
            631,
            Vec::new(),
        );
        let bytes = announcement(&other, 4500).encode().expect("encode");
        assert!(!is_registry_answer(&bytes, SERVICE));
    }

    #[test]
    fn queries_are_not_registry_answers() {
        let bytes = probe_query(SERVICE).encode().expect("encode");
        assert!(!is_registry_answer(&bytes, SERVICE));
    }

    #[test]
    fn garbage_is_not_a_registry_answer() {
        assert!(!is_registry_answer(&[0xFF, 0x01, 0x02], SERVICE));
    }
}
