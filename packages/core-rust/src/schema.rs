//! Wire-visible catalog schema types.
//!
//! These enums and small structs appear in request arguments, response
//! payloads, and status events, so their wire encodings are fixed here
//! rather than in the server crate.

use std::fmt;
use std::net::Ipv4Addr;

/// The broad role a node plays in the data-flow network.
///
/// Wire form is the variant's ordinal as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServiceType {
    Generic,
    Filter,
    Launcher,
    InputOutput,
    Registry,
    Test,
}

impl ServiceType {
    /// The integer carried on the wire for this service type.
    #[must_use]
    pub fn wire_value(self) -> i64 {
        match self {
            Self::Generic => 0,
            Self::Filter => 1,
            Self::Launcher => 2,
            Self::InputOutput => 3,
            Self::Registry => 4,
            Self::Test => 5,
        }
    }

    /// Decodes a wire integer, or `None` for values outside the enum.
    #[must_use]
    pub fn from_wire_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Generic),
            1 => Some(Self::Filter),
            2 => Some(Self::Launcher),
            3 => Some(Self::InputOutput),
            4 => Some(Self::Registry),
            5 => Some(Self::Test),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Filter => "filter",
            Self::Launcher => "launcher",
            Self::InputOutput => "input-output",
            Self::Registry => "registry",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a channel consumes or produces data.
///
/// Wire form is a logical, `true` for output, matching the way channel
/// records are flattened into response arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChannelDirection {
    Input,
    Output,
}

impl ChannelDirection {
    #[must_use]
    pub fn is_output(self) -> bool {
        matches!(self, Self::Output)
    }

    #[must_use]
    pub fn from_is_output(is_output: bool) -> Self {
        if is_output {
            Self::Output
        } else {
            Self::Input
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for ChannelDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bitset of transport variants a channel is willing to use.
///
/// Wire form is the raw bits as an integer. Unknown bits are preserved;
/// compatibility only ever asks for intersections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransportModes(u32);

impl TransportModes {
    pub const NONE: Self = Self(0);
    pub const TCP: Self = Self(1);
    pub const UDP: Self = Self(1 << 1);

    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// The lowest-numbered bit in the set, as a single-mode set.
    ///
    /// This is the mode a new connection adopts when both endpoints offer
    /// several; pinning the choice to the lowest bit keeps it stable and
    /// reproducible across implementations.
    #[must_use]
    pub fn lowest_mode(self) -> Option<Self> {
        if self.0 == 0 {
            None
        } else {
            Some(Self(self.0 & self.0.wrapping_neg()))
        }
    }
}

impl fmt::Display for TransportModes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NONE => f.write_str("none"),
            Self::TCP => f.write_str("tcp"),
            Self::UDP => f.write_str("udp"),
            other => write!(f, "modes({:#x})", other.0),
        }
    }
}

/// The command endpoint a node listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeEndpoint {
    pub address: Ipv4Addr,
    pub port: u16,
}

impl NodeEndpoint {
    #[must_use]
    pub fn new(address: Ipv4Addr, port: u16) -> Self {
        Self { address, port }
    }
}

impl fmt::Display for NodeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}
