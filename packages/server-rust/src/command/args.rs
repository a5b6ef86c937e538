//! Positional argument coercion shared by all handlers.
//!
//! Arity is checked by the dispatcher before these run, so a missing
//! required argument here means the handler's own arity declaration is
//! wrong -- it is still reported as an invalid-arguments response rather
//! than a panic.

use std::net::Ipv4Addr;

use nimo_core::{NodeEndpoint, ServiceType, TransportModes, Value};

use super::HandlerError;

fn bad(name: &str, expected: &str, found: &Value) -> HandlerError {
    HandlerError::InvalidArguments(format!(
        "{name} must be a {expected}, got {}",
        found.kind()
    ))
}

fn missing(name: &str) -> HandlerError {
    HandlerError::InvalidArguments(format!("{name} is missing"))
}

pub(crate) fn string<'a>(
    args: &'a [Value],
    index: usize,
    name: &str,
) -> Result<&'a str, HandlerError> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(bad(name, "string", other)),
        None => Err(missing(name)),
    }
}

/// A trailing optional string, e.g. a machine filter on a listing.
pub(crate) fn optional_string<'a>(
    args: &'a [Value],
    index: usize,
    name: &str,
) -> Result<Option<&'a str>, HandlerError> {
    match args.get(index) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(bad(name, "string", other)),
    }
}

pub(crate) fn integer(args: &[Value], index: usize, name: &str) -> Result<i64, HandlerError> {
    match args.get(index) {
        Some(Value::Integer(i)) => Ok(*i),
        Some(other) => Err(bad(name, "integer", other)),
        None => Err(missing(name)),
    }
}

pub(crate) fn logical(args: &[Value], index: usize, name: &str) -> Result<bool, HandlerError> {
    match args.get(index) {
        Some(Value::Logical(b)) => Ok(*b),
        Some(other) => Err(bad(name, "logical", other)),
        None => Err(missing(name)),
    }
}

/// An IPv4 address carried as its 32-bit integer form.
pub(crate) fn ipv4(args: &[Value], index: usize, name: &str) -> Result<Ipv4Addr, HandlerError> {
    let raw = integer(args, index, name)?;
    u32::try_from(raw).map(Ipv4Addr::from).map_err(|_| {
        HandlerError::InvalidArguments(format!("{name} is not a valid IPv4 address: {raw}"))
    })
}

pub(crate) fn service_type(
    args: &[Value],
    index: usize,
    name: &str,
) -> Result<ServiceType, HandlerError> {
    let raw = integer(args, index, name)?;
    ServiceType::from_wire_value(raw).ok_or_else(|| {
        HandlerError::InvalidArguments(format!("{name} is not a known service type: {raw}"))
    })
}

pub(crate) fn modes(
    args: &[Value],
    index: usize,
    name: &str,
) -> Result<TransportModes, HandlerError> {
    let raw = integer(args, index, name)?;
    u32::try_from(raw).map(TransportModes::from_bits).map_err(|_| {
        HandlerError::InvalidArguments(format!("{name} is not a valid mode set: {raw}"))
    })
}

/// An endpoint carried as `[addressInteger, portInteger]`.
pub(crate) fn endpoint(
    args: &[Value],
    index: usize,
    name: &str,
) -> Result<NodeEndpoint, HandlerError> {
    let parts = match args.get(index) {
        Some(Value::Array(parts)) => parts,
        Some(other) => return Err(bad(name, "[address, port] array", other)),
        None => return Err(missing(name)),
    };
    let address = ipv4(parts, 0, "endpoint address")?;
    let port = integer(parts, 1, "endpoint port")?;
    let port = u16::try_from(port).map_err(|_| {
        HandlerError::InvalidArguments(format!("endpoint port out of range: {port}"))
    })?;
    Ok(NodeEndpoint::new(address, port))
}
