//! Host reservation lines as rendered by the inventory export.
//!
//! The sync loop treats the export as opaque text. This module only recognises
//! the one-line `host` statements well enough to count them, to describe what
//! changed between two files, and to drive the `compare` tool.

use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::OnceLock;

/// A single static host reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    /// Host declaration name
    pub hostname: String,
    /// Hardware address, upper case
    pub mac: String,
    /// Fixed address handed to the client
    pub ip: Ipv4Addr,
    /// Trailing comment naming the source entity, if any
    pub comment: Option<String>,
    /// The original line, trimmed
    pub line: String,
}

fn host_regex() -> &'static Regex {
    static HOST_RE: OnceLock<Regex> = OnceLock::new();
    HOST_RE.get_or_init(|| {
        Regex::new(
            r"^\s*host\s+([\w.-]+)\s*\{\s*hardware\s+ethernet\s+([0-9A-Fa-f:]+)\s*;\s*fixed-address\s+([0-9.]+)\s*;\s*\}\s*(?:#+\s*(.*?))?\s*$",
        )
        .expect("host reservation pattern is valid")
    })
}

/// Parse a single line, returning `None` when it is not a host reservation.
#[must_use]
pub fn parse_line(line: &str) -> Option<Reservation> {
    let caps = host_regex().captures(line)?;
    let ip = caps[3].parse().ok()?;
    let comment = caps
        .get(4)
        .map(|m| m.as_str().to_string())
        .filter(|c| !c.is_empty());

    Some(Reservation {
        hostname: caps[1].to_string(),
        mac: caps[2].to_ascii_uppercase(),
        ip,
        comment,
        line: line.trim().to_string(),
    })
}

/// Parse every recognisable reservation in `text`, in file order.
#[must_use]
pub fn parse(text: &str) -> Vec<Reservation> {
    text.lines().filter_map(parse_line).collect()
}

/// Number of recognisable reservations in `text`.
#[must_use]
pub fn count(text: &str) -> usize {
    text.lines().filter(|line| parse_line(line).is_some()).count()
}
