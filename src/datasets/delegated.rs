//! RIR delegated statistics file parser
//!
//! Delegated files are pipe-delimited, one resource per line:
//!
//! ```text
//! registry|cc|type|start|value|date|status[|opaque-id...]
//! ```
//!
//! The header (`|version|`) and summary (`|summary|`) rows, comments and blank
//! lines are skipped. Lines with fewer than seven fields or an unknown resource
//! type are dropped without error; only a failure of the underlying stream stops
//! the iteration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;
use tracing::debug;

/// One past the largest 32-bit AS number
const ASN_SPACE: u64 = 1 << 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Asn,
    Ipv4,
    Ipv6,
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asn" => Ok(RecordType::Asn),
            "ipv4" => Ok(RecordType::Ipv4),
            "ipv6" => Ok(RecordType::Ipv6),
            _ => Err(format!("unknown record type: {}", s)),
        }
    }
}

/// Allocation status column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Allocated,
    Assigned,
    Reserved,
    Available,
    Other(String),
}

impl RecordStatus {
    /// Unallocated inventory rather than a real assignment
    pub fn is_inventory(&self) -> bool {
        matches!(self, RecordStatus::Reserved | RecordStatus::Available)
    }
}

impl From<&str> for RecordStatus {
    fn from(s: &str) -> Self {
        match s {
            "allocated" => RecordStatus::Allocated,
            "assigned" => RecordStatus::Assigned,
            "reserved" => RecordStatus::Reserved,
            "available" => RecordStatus::Available,
            other => RecordStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Allocated => write!(f, "allocated"),
            RecordStatus::Assigned => write!(f, "assigned"),
            RecordStatus::Reserved => write!(f, "reserved"),
            RecordStatus::Available => write!(f, "available"),
            RecordStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A single line of a delegated file.
///
/// `start` and `value` are kept as text: for ASN records they are the first ASN
/// and the count, for IPv4 the first address and the address count, for IPv6
/// the first address and the prefix length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatedRecord {
    pub registry: String,
    pub country: String,
    pub record_type: RecordType,
    pub start: String,
    pub value: String,
    pub date: String,
    pub status: RecordStatus,
    /// Eighth column of extended files (opaque organization id), if present
    pub opaque_id: Option<String>,
}

impl DelegatedRecord {
    /// Parse one data line. Returns `None` for anything that is not a resource record.
    pub fn parse_line(line: &str) -> Option<DelegatedRecord> {
        let line = line.trim();
        if line.is_empty()
            || line.starts_with('#')
            || line.contains("|version|")
            || line.contains("|summary|")
        {
            return None;
        }

        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() < 7 {
            return None;
        }

        let record_type = fields[2].parse().ok()?;
        Some(DelegatedRecord {
            registry: fields[0].to_string(),
            country: fields[1].to_string(),
            record_type,
            start: fields[3].to_string(),
            value: fields[4].to_string(),
            date: fields[5].to_string(),
            status: RecordStatus::from(fields[6]),
            opaque_id: fields
                .get(7)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
        })
    }

    /// ASN range `[start, start + count)` for ASN records with numeric columns.
    ///
    /// Ranges reaching past the 32-bit ASN space are rejected.
    pub fn asn_range(&self) -> Option<std::ops::Range<u64>> {
        if self.record_type != RecordType::Asn {
            return None;
        }
        let start: u64 = self.start.parse().ok()?;
        let count: u64 = self.value.parse().ok()?;
        let end = start.checked_add(count).filter(|end| *end <= ASN_SPACE)?;
        Some(start..end)
    }
}

/// Lazy iterator over the records of a delegated file.
///
/// Each item is either a parsed record or the stream error that ended the
/// iteration; after an error nothing more is yielded.
pub struct DelegatedRecords<R> {
    reader: R,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> DelegatedRecords<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for DelegatedRecords<R> {
    type Item = std::io::Result<DelegatedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&self.buf);
                    match DelegatedRecord::parse_line(&line) {
                        Some(record) => return Some(Ok(record)),
                        None => {
                            let line = line.trim();
                            if !line.is_empty() && !line.starts_with('#') {
                                debug!("skipping delegated line: {}", line);
                            }
                        }
                    }
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// Parse a delegated file from any buffered reader
pub fn parse_delegated<R: BufRead>(reader: R) -> DelegatedRecords<R> {
    DelegatedRecords::new(reader)
}
