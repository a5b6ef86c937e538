//! Status publisher: best-effort multicast of catalog change events.
//!
//! Every mutating handler publishes the events its catalog operation
//! returned, after the mutation committed and before the response goes
//! out. Delivery is fire-and-forget: no acknowledgement, no retry, and a
//! send failure never fails the operation that caused it. Observers that
//! miss a datagram re-sync by querying the Registry.

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use nimo_core::StatusEvent;
use tracing::{debug, trace};

/// Sends catalog change events to the status multicast group.
///
/// The socket is nonblocking; publishing happens from whatever task
/// performed the mutation, so a slow network must never stall a handler.
#[derive(Debug)]
pub struct StatusPublisher {
    socket: Option<UdpSocket>,
    target: SocketAddrV4,
}

impl StatusPublisher {
    /// Opens a publisher aimed at `group:port`.
    ///
    /// Loopback delivery is left on so observers on the Registry's own
    /// host see events too.
    ///
    /// # Errors
    ///
    /// Returns the socket error if the ephemeral UDP bind fails.
    pub fn new(group: Ipv4Addr, port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_nonblocking(true)?;
        socket.set_multicast_ttl_v4(1)?;
        socket.set_multicast_loop_v4(true)?;
        Ok(Self {
            socket: Some(socket),
            target: SocketAddrV4::new(group, port),
        })
    }

    /// A publisher that drops every event. Used by tests and by
    /// configurations with the status channel switched off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            socket: None,
            target: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
        }
    }

    /// Where events are sent.
    #[must_use]
    pub fn target(&self) -> SocketAddrV4 {
        self.target
    }

    /// Multicasts one event. Failures are logged and swallowed.
    pub fn publish(&self, event: &StatusEvent) {
        let Some(socket) = &self.socket else {
            return;
        };
        let bytes = match event.to_value().encode() {
            Ok(bytes) => bytes,
            Err(error) => {
                debug!(kind = event.kind(), %error, "could not encode status event");
                return;
            }
        };
        match socket.send_to(&bytes, self.target) {
            Ok(_) => trace!(kind = event.kind(), "status event published"),
            Err(error) => {
                debug!(kind = event.kind(), %error, "status event dropped");
            }
        }
    }

    /// Multicasts a batch in order. Cascaded removals rely on this order
    /// reaching the wire as the catalog produced it.
    pub fn publish_all(&self, events: &[StatusEvent]) {
        for event in events {
            self.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use nimo_core::Value;

    use super::*;

    /// Receiver bound on loopback; the publisher's target address does not
    /// have to be a multicast group for send_to to deliver.
    fn loopback_receiver() -> (UdpSocket, u16) {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind receiver");
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("timeout");
        let port = socket.local_addr().expect("addr").port();
        (socket, port)
    }

    #[test]
    fn publishes_decodable_event_datagrams() {
        let (receiver, port) = loopback_receiver();
        let publisher = StatusPublisher::new(Ipv4Addr::LOCALHOST, port).expect("publisher");

        let event = StatusEvent::MachineAdded {
            name: "alpha".to_string(),
            address: Ipv4Addr::new(192, 168, 1, 11),
        };
        publisher.publish(&event);

        let mut buf = [0_u8; 1500];
        let (len, _) = receiver.recv_from(&mut buf).expect("receive datagram");
        let value = Value::decode(&buf[..len]).expect("decode payload");
        assert_eq!(StatusEvent::from_value(value).expect("event"), event);
    }

    #[test]
    fn publish_all_preserves_order() {
        let (receiver, port) = loopback_receiver();
        let publisher = StatusPublisher::new(Ipv4Addr::LOCALHOST, port).expect("publisher");

        let events = vec![
            StatusEvent::NodeRemoved {
                name: "first".to_string(),
            },
            StatusEvent::NodeRemoved {
                name: "second".to_string(),
            },
        ];
        publisher.publish_all(&events);

        let mut buf = [0_u8; 1500];
        for expected in &events {
            let (len, _) = receiver.recv_from(&mut buf).expect("receive");
            let value = Value::decode(&buf[..len]).expect("decode");
            assert_eq!(&StatusEvent::from_value(value).expect("event"), expected);
        }
    }

    #[test]
    fn disabled_publisher_drops_silently() {
        let publisher = StatusPublisher::disabled();
        publisher.publish(&StatusEvent::NodeRemoved {
            name: "ignored".to_string(),
        });
    }
}
