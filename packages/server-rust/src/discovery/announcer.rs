//! mDNS-SD announcer: advertises the command endpoint and answers
//! discovery queries.
//!
//! The responder runs on a dedicated OS thread. Its socket carries a
//! bounded read timeout so the stop flag is observed within one poll
//! tick; the flag and the thread handle live in an [`AnnouncerHandle`]
//! owned by the service, not in process-wide state. On startup the thread
//! multicasts an unsolicited announcement (twice, a tick apart); on stop
//! it multicasts a goodbye with TTL zero before exiting.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, warn};

use super::dns::{
    DnsMessage, Question, RecordData, ResourceRecord, TYPE_A, TYPE_PTR, TYPE_SRV, TYPE_TXT,
};

/// The well-known mDNS group and port.
pub const MDNS_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
pub const MDNS_PORT: u16 = 5353;

/// TTL for the service PTR record.
const PTR_TTL: u32 = 4500;
/// TTL for SRV/TXT/A records.
const HOST_TTL: u32 = 120;

/// Everything the responder advertises.
#[derive(Debug, Clone)]
pub struct AnnouncementData {
    /// Service type, e.g. `_nimo-registry._tcp.local.`
    pub service_type: String,
    /// Instance name, `<host>.<serviceType>`.
    pub instance: String,
    /// Qualified host, `<host>.local.`
    pub host: String,
    /// Address the A record advertises.
    pub address: Ipv4Addr,
    /// Command TCP port for the SRV record.
    pub port: u16,
    /// TXT entries, e.g. `status-addr=239.17.12.1:9999`.
    pub txt: Vec<String>,
}

impl AnnouncementData {
    /// Builds the advertised names from a short host name.
    #[must_use]
    pub fn new(
        service_type: &str,
        host_name: &str,
        address: Ipv4Addr,
        port: u16,
        txt: Vec<String>,
    ) -> Self {
        Self {
            service_type: service_type.to_string(),
            instance: format!("{host_name}.{service_type}"),
            host: format!("{host_name}.local."),
            address,
            port,
            txt,
        }
    }

    fn srv_record(&self, ttl: u32) -> ResourceRecord {
        ResourceRecord {
            name: self.instance.clone(),
            ttl,
            cache_flush: true,
            data: RecordData::Srv {
                priority: 0,
                weight: 0,
                port: self.port,
                target: self.host.clone(),
            },
        }
    }

    fn txt_record(&self, ttl: u32) -> ResourceRecord {
        ResourceRecord {
            name: self.instance.clone(),
            ttl,
            cache_flush: true,
            data: RecordData::Txt(self.txt.clone()),
        }
    }

    fn a_record(&self, ttl: u32) -> ResourceRecord {
        ResourceRecord {
            name: self.host.clone(),
            ttl,
            cache_flush: true,
            data: RecordData::A(self.address),
        }
    }

    fn ptr_record(&self, ttl: u32) -> ResourceRecord {
        ResourceRecord {
            name: self.service_type.clone(),
            ttl,
            cache_flush: false,
            data: RecordData::Ptr(self.instance.clone()),
        }
    }
}

/// The unsolicited announcement: PTR in answers, SRV/TXT/A alongside.
/// With `ttl` zero this is the goodbye.
#[must_use]
pub fn announcement(data: &AnnouncementData, ttl: u32) -> DnsMessage {
    let scale = |host_ttl: u32| if ttl == 0 { 0 } else { host_ttl };
    DnsMessage::response(
        0,
        vec![
            data.ptr_record(ttl),
            data.srv_record(scale(HOST_TTL)),
            data.txt_record(scale(PTR_TTL)),
            data.a_record(scale(HOST_TTL)),
        ],
        Vec::new(),
    )
}

/// Builds the answer for one query question, or `None` when the question
/// is not about this instance. Name comparison is case-insensitive, as
/// DNS requires.
#[must_use]
pub fn answer_for(data: &AnnouncementData, id: u16, question: &Question) -> Option<DnsMessage> {
    let name = &question.name;
    if name.eq_ignore_ascii_case(&data.service_type) && question.asks_for(TYPE_PTR) {
        return Some(DnsMessage::response(
            id,
            vec![data.ptr_record(PTR_TTL)],
            vec![
                data.srv_record(HOST_TTL),
                data.txt_record(PTR_TTL),
                data.a_record(HOST_TTL),
            ],
        ));
    }
    if name.eq_ignore_ascii_case(&data.instance) {
        if question.asks_for(TYPE_SRV) {
            return Some(DnsMessage::response(
                id,
                vec![data.srv_record(HOST_TTL)],
                vec![data.a_record(HOST_TTL)],
            ));
        }
        if question.asks_for(TYPE_TXT) {
            return Some(DnsMessage::response(id, vec![data.txt_record(PTR_TTL)], Vec::new()));
        }
    }
    if name.eq_ignore_ascii_case(&data.host) && question.asks_for(TYPE_A) {
        return Some(DnsMessage::response(id, vec![data.a_record(HOST_TTL)], Vec::new()));
    }
    None
}

/// Opens the shared mDNS socket: port 5353 with address reuse, joined to
/// the group, read timeout bounded by `poll`.
fn open_mdns_socket(poll: Duration) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, MDNS_PORT).into())?;
    let socket: UdpSocket = socket.into();
    socket.join_multicast_v4(&MDNS_GROUP, &Ipv4Addr::UNSPECIFIED)?;
    socket.set_multicast_ttl_v4(255)?;
    socket.set_multicast_loop_v4(true)?;
    socket.set_read_timeout(Some(poll))?;
    Ok(socket)
}

/// Lifecycle handle for the responder thread. Dropping it without calling
/// [`AnnouncerHandle::stop`] raises the stop flag but does not wait for
/// the goodbye.
#[derive(Debug)]
pub struct AnnouncerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AnnouncerHandle {
    /// Raises the stop flag and waits for the responder to send its
    /// goodbye and exit.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("announcer thread panicked");
            }
        }
    }
}

impl Drop for AnnouncerHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Spawns the responder thread.
///
/// # Errors
///
/// Returns the socket error when the mDNS socket cannot be opened -- a
/// fatal condition for the service, which cannot be discovered without
/// it.
pub fn spawn(data: AnnouncementData, poll: Duration) -> io::Result<AnnouncerHandle> {
    let socket = open_mdns_socket(poll)?;
    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);
    let thread = thread::Builder::new()
        .name("mdns-announcer".to_string())
        .spawn(move || run_responder(&socket, &data, &thread_stop))?;
    Ok(AnnouncerHandle {
        stop,
        thread: Some(thread),
    })
}

fn multicast_send(socket: &UdpSocket, message: &DnsMessage) {
    match message.encode() {
        Ok(bytes) => {
            if let Err(error) = socket.send_to(&bytes, (MDNS_GROUP, MDNS_PORT)) {
                debug!(%error, "mDNS multicast send failed");
            }
        }
        Err(error) => warn!(%error, "mDNS message failed to encode"),
    }
}

fn run_responder(socket: &UdpSocket, data: &AnnouncementData, stop: &AtomicBool) {
    info!(instance = %data.instance, port = data.port, "announcer starting");
    multicast_send(socket, &announcement(data, PTR_TTL));
    // One repeat announcement goes out on the next poll tick.
    let mut repeats_left = 1_u32;

    let mut buf = [0_u8; 4096];
    while !stop.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((len, origin)) => handle_packet(socket, data, &buf[..len], origin),
            Err(error)
                if error.kind() == io::ErrorKind::WouldBlock
                    || error.kind() == io::ErrorKind::TimedOut =>
            {
                if repeats_left > 0 {
                    multicast_send(socket, &announcement(data, PTR_TTL));
                    repeats_left -= 1;
                }
            }
            Err(error) => {
                warn!(%error, "mDNS receive failed");
                // Back off briefly so a persistent socket error cannot
                // spin the thread.
                thread::sleep(Duration::from_millis(100));
            }
        }
    }

    multicast_send(socket, &announcement(data, 0));
    info!(instance = %data.instance, "announcer stopped");
}

fn handle_packet(socket: &UdpSocket, data: &AnnouncementData, bytes: &[u8], origin: SocketAddr) {
    let message = match DnsMessage::decode(bytes) {
        Ok(message) => message,
        Err(error) => {
            debug!(%error, %origin, "ignoring malformed mDNS packet");
            return;
        }
    };
    if message.is_response {
        return;
    }
    for question in &message.questions {
        let Some(reply) = answer_for(data, message.id, question) else {
            continue;
        };
        // Legacy one-shot queries (source port != 5353) and QU questions
        // get their answer unicast; everything else goes to the group.
        let unicast = question.unicast_requested() || origin.port() != MDNS_PORT;
        match reply.encode() {
            Ok(bytes) => {
                let target: SocketAddr = if unicast {
                    origin
                } else {
                    SocketAddrV4::new(MDNS_GROUP, MDNS_PORT).into()
                };
                if let Err(error) = socket.send_to(&bytes, target) {
                    debug!(%error, %target, "mDNS answer send failed");
                }
            }
            Err(error) => warn!(%error, "mDNS answer failed to encode"),
        }
    }
}
