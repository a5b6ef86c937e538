//! Minimal DNS wire codec for the mDNS responder.
//!
//! Covers exactly what service discovery needs: header, questions, and
//! PTR/SRV/TXT/A/AAAA records. Names are written uncompressed (always
//! legal); parsing tolerates compression pointers since real resolvers
//! use them. Everything else about DNS stays out.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Record type codes.
pub const TYPE_A: u16 = 1;
pub const TYPE_PTR: u16 = 12;
pub const TYPE_TXT: u16 = 16;
pub const TYPE_AAAA: u16 = 28;
pub const TYPE_SRV: u16 = 33;
/// Query-type wildcard: matches any record type.
pub const TYPE_ANY: u16 = 255;

/// The Internet class.
pub const CLASS_IN: u16 = 1;
/// Top bit of a question's class: requester prefers a unicast response.
pub const UNICAST_RESPONSE_BIT: u16 = 0x8000;
/// Top bit of a record's class: mDNS cache-flush.
const CACHE_FLUSH_BIT: u16 = 0x8000;

const FLAG_RESPONSE: u16 = 0x8000;
const FLAG_AUTHORITATIVE: u16 = 0x0400;

/// Errors from encoding or decoding a DNS message.
#[derive(Debug, thiserror::Error)]
pub enum DnsError {
    #[error("message truncated")]
    Truncated,
    #[error("malformed message: {0}")]
    Malformed(&'static str),
    #[error("label longer than 63 bytes")]
    LabelTooLong,
}

/// One question section entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub rtype: u16,
    pub class: u16,
}

impl Question {
    #[must_use]
    pub fn new(name: impl Into<String>, rtype: u16) -> Self {
        Self {
            name: name.into(),
            rtype,
            class: CLASS_IN,
        }
    }

    /// Whether the requester asked for a unicast response (QU bit).
    #[must_use]
    pub fn unicast_requested(&self) -> bool {
        self.class & UNICAST_RESPONSE_BIT != 0
    }

    /// Whether this question asks for `rtype` records (directly or ANY).
    #[must_use]
    pub fn asks_for(&self, rtype: u16) -> bool {
        self.rtype == rtype || self.rtype == TYPE_ANY
    }
}

/// Typed record payloads the responder works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ptr(String),
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    Txt(Vec<String>),
    /// Record types the responder does not interpret; payload skipped.
    Unknown(u16),
}

impl RecordData {
    fn rtype(&self) -> u16 {
        match self {
            Self::A(_) => TYPE_A,
            Self::Aaaa(_) => TYPE_AAAA,
            Self::Ptr(_) => TYPE_PTR,
            Self::Srv { .. } => TYPE_SRV,
            Self::Txt(_) => TYPE_TXT,
            Self::Unknown(rtype) => *rtype,
        }
    }
}

/// One resource record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: String,
    pub ttl: u32,
    pub cache_flush: bool,
    pub data: RecordData,
}

/// A DNS message, reduced to the sections the responder uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsMessage {
    pub id: u16,
    pub is_response: bool,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl DnsMessage {
    /// A query carrying one question.
    #[must_use]
    pub fn query(question: Question) -> Self {
        Self {
            questions: vec![question],
            ..Self::default()
        }
    }

    /// An authoritative response with the given sections.
    #[must_use]
    pub fn response(
        id: u16,
        answers: Vec<ResourceRecord>,
        additionals: Vec<ResourceRecord>,
    ) -> Self {
        Self {
            id,
            is_response: true,
            answers,
            additionals,
            ..Self::default()
        }
    }

    /// Encodes to wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::LabelTooLong`] for names with oversized labels.
    pub fn encode(&self) -> Result<Vec<u8>, DnsError> {
        let mut buf = Vec::with_capacity(512);
        buf.extend_from_slice(&self.id.to_be_bytes());
        let flags = if self.is_response {
            FLAG_RESPONSE | FLAG_AUTHORITATIVE
        } else {
            0
        };
        buf.extend_from_slice(&flags.to_be_bytes());
        buf.extend_from_slice(&question_count(self)?.to_be_bytes());
        buf.extend_from_slice(&section_count(&self.answers)?.to_be_bytes());
        buf.extend_from_slice(&0_u16.to_be_bytes()); // authority
        buf.extend_from_slice(&section_count(&self.additionals)?.to_be_bytes());

        for question in &self.questions {
            write_name(&mut buf, &question.name)?;
            buf.extend_from_slice(&question.rtype.to_be_bytes());
            buf.extend_from_slice(&question.class.to_be_bytes());
        }
        for record in self.answers.iter().chain(&self.additionals) {
            write_record(&mut buf, record)?;
        }
        Ok(buf)
    }

    /// Decodes wire bytes, skipping record types the responder does not
    /// interpret.
    ///
    /// # Errors
    ///
    /// Returns a [`DnsError`] for truncated or structurally invalid
    /// messages.
    pub fn decode(bytes: &[u8]) -> Result<Self, DnsError> {
        if bytes.len() < 12 {
            return Err(DnsError::Truncated);
        }
        let id = u16::from_be_bytes([bytes[0], bytes[1]]);
        let flags = u16::from_be_bytes([bytes[2], bytes[3]]);
        let qdcount = u16::from_be_bytes([bytes[4], bytes[5]]);
        let ancount = u16::from_be_bytes([bytes[6], bytes[7]]);
        let nscount = u16::from_be_bytes([bytes[8], bytes[9]]);
        let arcount = u16::from_be_bytes([bytes[10], bytes[11]]);

        let mut pos = 12;
        let mut questions = Vec::with_capacity(usize::from(qdcount));
        for _ in 0..qdcount {
            let name = read_name(bytes, &mut pos)?;
            let rtype = read_u16(bytes, &mut pos)?;
            let class = read_u16(bytes, &mut pos)?;
            questions.push(Question { name, rtype, class });
        }

        let mut answers = Vec::with_capacity(usize::from(ancount));
        for _ in 0..ancount {
            answers.push(read_record(bytes, &mut pos)?);
        }
        // Authority records are skipped but must still be walked past.
        for _ in 0..nscount {
            read_record(bytes, &mut pos)?;
        }
        let mut additionals = Vec::with_capacity(usize::from(arcount));
        for _ in 0..arcount {
            additionals.push(read_record(bytes, &mut pos)?);
        }

        Ok(Self {
            id,
            is_response: flags & FLAG_RESPONSE != 0,
            questions,
            answers,
            additionals,
        })
    }
}

fn question_count(message: &DnsMessage) -> Result<u16, DnsError> {
    u16::try_from(message.questions.len()).map_err(|_| DnsError::Malformed("too many questions"))
}

fn section_count(records: &[ResourceRecord]) -> Result<u16, DnsError> {
    u16::try_from(records.len()).map_err(|_| DnsError::Malformed("too many records"))
}

/// Writes an uncompressed name: length-prefixed labels, zero terminator.
/// A trailing dot on the input is tolerated.
fn write_name(buf: &mut Vec<u8>, name: &str) -> Result<(), DnsError> {
    for label in name.split('.').filter(|label| !label.is_empty()) {
        let bytes = label.as_bytes();
        if bytes.len() > 63 {
            return Err(DnsError::LabelTooLong);
        }
        #[allow(clippy::cast_possible_truncation)]
        buf.push(bytes.len() as u8);
        buf.extend_from_slice(bytes);
    }
    buf.push(0);
    Ok(())
}

/// Reads a possibly compressed name starting at `*pos`, leaving `*pos`
/// just past the name. Pointer chains are bounded so a malicious packet
/// cannot loop forever.
fn read_name(bytes: &[u8], pos: &mut usize) -> Result<String, DnsError> {
    let mut name = String::new();
    let mut cursor = *pos;
    let mut jumped = false;
    let mut jumps = 0;

    loop {
        let len = *bytes.get(cursor).ok_or(DnsError::Truncated)?;
        if len & 0xC0 == 0xC0 {
            let low = *bytes.get(cursor + 1).ok_or(DnsError::Truncated)?;
            let target = usize::from(u16::from_be_bytes([len & 0x3F, low]));
            if !jumped {
                *pos = cursor + 2;
                jumped = true;
            }
            jumps += 1;
            if jumps > 16 {
                return Err(DnsError::Malformed("compression pointer loop"));
            }
            cursor = target;
            continue;
        }
        if len & 0xC0 != 0 {
            return Err(DnsError::Malformed("reserved label type"));
        }
        cursor += 1;
        if len == 0 {
            break;
        }
        let end = cursor + usize::from(len);
        let label = bytes.get(cursor..end).ok_or(DnsError::Truncated)?;
        let label =
            std::str::from_utf8(label).map_err(|_| DnsError::Malformed("non-UTF-8 label"))?;
        name.push_str(label);
        name.push('.');
        cursor = end;
    }
    if !jumped {
        *pos = cursor;
    }
    Ok(name)
}

fn read_u16(bytes: &[u8], pos: &mut usize) -> Result<u16, DnsError> {
    let slice = bytes.get(*pos..*pos + 2).ok_or(DnsError::Truncated)?;
    *pos += 2;
    Ok(u16::from_be_bytes([slice[0], slice[1]]))
}

fn read_u32(bytes: &[u8], pos: &mut usize) -> Result<u32, DnsError> {
    let slice = bytes.get(*pos..*pos + 4).ok_or(DnsError::Truncated)?;
    *pos += 4;
    Ok(u32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn write_record(buf: &mut Vec<u8>, record: &ResourceRecord) -> Result<(), DnsError> {
    write_name(buf, &record.name)?;
    buf.extend_from_slice(&record.data.rtype().to_be_bytes());
    let class = if record.cache_flush {
        CLASS_IN | CACHE_FLUSH_BIT
    } else {
        CLASS_IN
    };
    buf.extend_from_slice(&class.to_be_bytes());
    buf.extend_from_slice(&record.ttl.to_be_bytes());

    let mut rdata = Vec::new();
    match &record.data {
        RecordData::A(address) => rdata.extend_from_slice(&address.octets()),
        RecordData::Aaaa(address) => rdata.extend_from_slice(&address.octets()),
        RecordData::Ptr(target) => write_name(&mut rdata, target)?,
        RecordData::Srv {
            priority,
            weight,
            port,
            target,
        } => {
            rdata.extend_from_slice(&priority.to_be_bytes());
            rdata.extend_from_slice(&weight.to_be_bytes());
            rdata.extend_from_slice(&port.to_be_bytes());
            write_name(&mut rdata, target)?;
        }
        RecordData::Txt(entries) => {
            for entry in entries {
                let bytes = entry.as_bytes();
                if bytes.len() > 255 {
                    return Err(DnsError::Malformed("TXT entry longer than 255 bytes"));
                }
                #[allow(clippy::cast_possible_truncation)]
                rdata.push(bytes.len() as u8);
                rdata.extend_from_slice(bytes);
            }
            // An empty TXT still needs one zero-length string.
            if entries.is_empty() {
                rdata.push(0);
            }
        }
        RecordData::Unknown(_) => {}
    }

    let rdlen =
        u16::try_from(rdata.len()).map_err(|_| DnsError::Malformed("record data too long"))?;
    buf.extend_from_slice(&rdlen.to_be_bytes());
    buf.extend_from_slice(&rdata);
    Ok(())
}

fn read_record(bytes: &[u8], pos: &mut usize) -> Result<ResourceRecord, DnsError> {
    let name = read_name(bytes, pos)?;
    let rtype = read_u16(bytes, pos)?;
    let class = read_u16(bytes, pos)?;
    let ttl = read_u32(bytes, pos)?;
    let rdlen = usize::from(read_u16(bytes, pos)?);
    let rdata_start = *pos;
    let rdata_end = rdata_start + rdlen;
    if bytes.len() < rdata_end {
        return Err(DnsError::Truncated);
    }

    let data = match rtype {
        TYPE_A if rdlen == 4 => {
            let octets: [u8; 4] = bytes[rdata_start..rdata_end]
                .try_into()
                .map_err(|_| DnsError::Truncated)?;
            RecordData::A(Ipv4Addr::from(octets))
        }
        TYPE_AAAA if rdlen == 16 => {
            let octets: [u8; 16] = bytes[rdata_start..rdata_end]
                .try_into()
                .map_err(|_| DnsError::Truncated)?;
            RecordData::Aaaa(Ipv6Addr::from(octets))
        }
        TYPE_PTR => {
            let mut cursor = rdata_start;
            RecordData::Ptr(read_name(bytes, &mut cursor)?)
        }
        TYPE_SRV if rdlen >= 6 => {
            let mut cursor = rdata_start;
            let priority = read_u16(bytes, &mut cursor)?;
            let weight = read_u16(bytes, &mut cursor)?;
            let port = read_u16(bytes, &mut cursor)?;
            let target = read_name(bytes, &mut cursor)?;
            RecordData::Srv {
                priority,
                weight,
                port,
                target,
            }
        }
        TYPE_TXT => {
            let mut entries = Vec::new();
            let mut cursor = rdata_start;
            while cursor < rdata_end {
                let len = usize::from(bytes[cursor]);
                cursor += 1;
                let end = cursor + len;
                if end > rdata_end {
                    return Err(DnsError::Truncated);
                }
                if len > 0 {
                    let entry = std::str::from_utf8(&bytes[cursor..end])
                        .map_err(|_| DnsError::Malformed("non-UTF-8 TXT entry"))?;
                    entries.push(entry.to_string());
                }
                cursor = end;
            }
            RecordData::Txt(entries)
        }
        other => RecordData::Unknown(other),
    };

    *pos = rdata_end;
    Ok(ResourceRecord {
        name,
        ttl,
        cache_flush: class & CACHE_FLUSH_BIT != 0,
        data,
    })
}
