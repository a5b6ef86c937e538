//! Multicast DNS service discovery: the announcer/responder, the
//! duplicate-Registry probe, and the small DNS wire codec they share.

pub mod announcer;
pub mod dns;
pub mod probe;

pub use announcer::{spawn, AnnouncementData, AnnouncerHandle, MDNS_GROUP, MDNS_PORT};
pub use probe::probe_for_registry;
