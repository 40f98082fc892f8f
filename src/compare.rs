//! Reservation-level comparison of two include files.
//!
//! Used by the `compare` subcommand and by the sync loop to describe what a
//! change consists of before the new file is written.

use crate::error::{Result, SyncError};
use crate::reservations::{self, Reservation};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;
use std::net::Ipv4Addr;
use std::path::Path;

/// Same MAC bound to different addresses on each side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpMismatch {
    pub mac: String,
    pub first: Ipv4Addr,
    pub second: Ipv4Addr,
}

/// Same address bound to different MACs on each side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacMismatch {
    pub ip: Ipv4Addr,
    pub first: String,
    pub second: String,
}

/// Differences between two sets of reservations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comparison {
    /// Number of (MAC, IP) pairs present on both sides
    pub matching: usize,
    /// Present in the second set only, sorted by IP
    pub missing_in_first: Vec<Reservation>,
    /// Present in the first set only, sorted by IP
    pub missing_in_second: Vec<Reservation>,
    /// Sorted by MAC
    pub ip_mismatches: Vec<IpMismatch>,
    /// Sorted by IP
    pub mac_mismatches: Vec<MacMismatch>,
}

/// Index of one side. Later lines win when a MAC or IP repeats.
struct Side<'a> {
    by_mac: BTreeMap<&'a str, &'a Reservation>,
    by_ip: BTreeMap<Ipv4Addr, &'a str>,
    pairs: BTreeSet<(&'a str, Ipv4Addr)>,
}

impl<'a> Side<'a> {
    fn new(reservations: &'a [Reservation]) -> Self {
        let mut by_mac = BTreeMap::new();
        let mut by_ip = BTreeMap::new();
        for r in reservations {
            by_mac.insert(r.mac.as_str(), r);
            by_ip.insert(r.ip, r.mac.as_str());
        }
        let pairs = by_mac.iter().map(|(mac, r)| (*mac, r.ip)).collect();
        Self {
            by_mac,
            by_ip,
            pairs,
        }
    }

    fn only_here(&self, other: &Self) -> Vec<Reservation> {
        let mut missing: Vec<Reservation> = self
            .pairs
            .iter()
            .filter(|pair| !other.pairs.contains(*pair))
            .filter_map(|(mac, _)| self.by_mac.get(mac).map(|r| (*r).clone()))
            .collect();
        missing.sort_by_key(|r| r.ip);
        missing
    }
}

/// Compare two reservation lists.
#[must_use]
pub fn compare(first: &[Reservation], second: &[Reservation]) -> Comparison {
    let a = Side::new(first);
    let b = Side::new(second);

    let ip_mismatches = a
        .by_mac
        .iter()
        .filter_map(|(mac, ra)| {
            let rb = b.by_mac.get(mac)?;
            (ra.ip != rb.ip).then(|| IpMismatch {
                mac: (*mac).to_string(),
                first: ra.ip,
                second: rb.ip,
            })
        })
        .collect();

    let mac_mismatches = a
        .by_ip
        .iter()
        .filter_map(|(ip, mac_a)| {
            let mac_b = b.by_ip.get(ip)?;
            (mac_a != mac_b).then(|| MacMismatch {
                ip: *ip,
                first: (*mac_a).to_string(),
                second: (*mac_b).to_string(),
            })
        })
        .collect();

    Comparison {
        matching: a.pairs.intersection(&b.pairs).count(),
        missing_in_first: b.only_here(&a),
        missing_in_second: a.only_here(&b),
        ip_mismatches,
        mac_mismatches,
    }
}

/// Compare the reservations contained in two texts.
#[must_use]
pub fn compare_text(first: &str, second: &str) -> Comparison {
    compare(&reservations::parse(first), &reservations::parse(second))
}

/// Read and compare two include files.
///
/// # Errors
///
/// Returns an error if either file cannot be read
pub fn compare_files(first: &Path, second: &Path) -> Result<Comparison> {
    let read = |path: &Path| {
        std::fs::read_to_string(path).map_err(|e| {
            SyncError::Generic(format!("Failed to read {}: {e}", path.display()))
        })
    };
    Ok(compare_text(&read(first)?, &read(second)?))
}

impl Comparison {
    /// `true` when both sides hold exactly the same pairs.
    #[must_use]
    pub fn is_identical(&self) -> bool {
        self.missing_in_first.is_empty()
            && self.missing_in_second.is_empty()
            && self.ip_mismatches.is_empty()
            && self.mac_mismatches.is_empty()
    }

    /// Human readable report naming the sides `first` and `second`.
    #[must_use]
    pub fn render(&self, first: &str, second: &str) -> String {
        let mut out = String::new();

        // writing into a String cannot fail
        let _ = writeln!(
            out,
            "Missing in {first} (present in {second}, not in {first}):"
        );
        write_lines(&mut out, self.missing_in_first.iter().map(|r| r.line.clone()));

        let _ = writeln!(
            out,
            "Missing in {second} (present in {first}, not in {second}):"
        );
        write_lines(&mut out, self.missing_in_second.iter().map(|r| r.line.clone()));

        let _ = writeln!(
            out,
            "IP Mismatches (Same MAC, different IPs) between {first} and {second}:"
        );
        write_lines(
            &mut out,
            self.ip_mismatches.iter().map(|m| {
                format!(
                    "MAC {}: {first} has IP {} vs {second} has IP {}",
                    m.mac, m.first, m.second
                )
            }),
        );

        let _ = writeln!(
            out,
            "MAC Mismatches (Same IP, different MACs) between {first} and {second}:"
        );
        write_lines(
            &mut out,
            self.mac_mismatches.iter().map(|m| {
                format!(
                    "IP {}: {first} has MAC {} vs {second} has MAC {}",
                    m.ip, m.first, m.second
                )
            }),
        );

        let _ = writeln!(out, "Summary:");
        let _ = writeln!(out, "Matching pairs: {}", self.matching);
        let _ = writeln!(
            out,
            "Missing in {first}: {}",
            self.missing_in_first.len()
        );
        let _ = writeln!(
            out,
            "Missing in {second}: {}",
            self.missing_in_second.len()
        );
        let _ = writeln!(out, "IP mismatches: {}", self.ip_mismatches.len());
        let _ = writeln!(out, "MAC mismatches: {}", self.mac_mismatches.len());
        out
    }
}

fn write_lines(out: &mut String, lines: impl Iterator<Item = String>) {
    let mut any = false;
    for line in lines {
        any = true;
        out.push_str(&line);
        out.push('\n');
    }
    if !any {
        out.push_str("None\n");
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    const OLD: &str = "\
host a { hardware ethernet 00:00:00:00:00:01; fixed-address 10.0.0.1; }
host b { hardware ethernet 00:00:00:00:00:02; fixed-address 10.0.0.2; }
host c { hardware ethernet 00:00:00:00:00:03; fixed-address 10.0.0.3; }
";

    const NEW: &str = "\
host a { hardware ethernet 00:00:00:00:00:01; fixed-address 10.0.0.1; }
host b { hardware ethernet 00:00:00:00:00:02; fixed-address 10.0.0.20; }
host d { hardware ethernet 00:00:00:00:00:04; fixed-address 10.0.0.3; }
host e { hardware ethernet 00:00:00:00:00:05; fixed-address 10.0.0.10; }
";

    #[test]
    fn test_identical_inputs() {
        let comparison = compare_text(OLD, OLD);
        assert!(comparison.is_identical());
        assert_eq!(comparison.matching, 3);
    }

    #[test]
    fn test_missing_pairs_sorted_by_ip() {
        let comparison = compare_text(OLD, NEW);

        assert_eq!(comparison.matching, 1);
        let added: Vec<Ipv4Addr> = comparison.missing_in_first.iter().map(|r| r.ip).collect();
        assert_eq!(
            added,
            vec![
                Ipv4Addr::new(10, 0, 0, 3),
                Ipv4Addr::new(10, 0, 0, 10),
                Ipv4Addr::new(10, 0, 0, 20),
            ]
        );
        let removed: Vec<&str> = comparison
            .missing_in_second
            .iter()
            .map(|r| r.hostname.as_str())
            .collect();
        assert_eq!(removed, vec!["b", "c"]);
    }

    #[test]
    fn test_mismatches() {
        let comparison = compare_text(OLD, NEW);

        assert_eq!(
            comparison.ip_mismatches,
            vec![IpMismatch {
                mac: "00:00:00:00:00:02".to_string(),
                first: Ipv4Addr::new(10, 0, 0, 2),
                second: Ipv4Addr::new(10, 0, 0, 20),
            }]
        );
        assert_eq!(
            comparison.mac_mismatches,
            vec![MacMismatch {
                ip: Ipv4Addr::new(10, 0, 0, 3),
                first: "00:00:00:00:00:03".to_string(),
                second: "00:00:00:00:00:04".to_string(),
            }]
        );
    }

    #[test]
    fn test_mac_case_is_ignored() {
        let upper = "host a { hardware ethernet AA:BB:CC:DD:EE:FF; fixed-address 10.0.0.1; }";
        let lower = "host a { hardware ethernet aa:bb:cc:dd:ee:ff; fixed-address 10.0.0.1; }";
        assert!(compare_text(upper, lower).is_identical());
    }

    #[test]
    fn test_render_report() {
        let report = compare_text(OLD, NEW).render("old.conf", "new.conf");

        assert!(report.starts_with("Missing in old.conf (present in new.conf, not in old.conf):\n"));
        assert!(report.contains(
            "MAC 00:00:00:00:00:02: old.conf has IP 10.0.0.2 vs new.conf has IP 10.0.0.20"
        ));
        assert!(report.contains(
            "IP 10.0.0.3: old.conf has MAC 00:00:00:00:00:03 vs new.conf has MAC 00:00:00:00:00:04"
        ));
        assert!(report.contains("Matching pairs: 1\n"));
        assert!(report.ends_with("MAC mismatches: 1\n"));
    }

    #[test]
    fn test_render_empty_sections() {
        let report = compare_text(OLD, OLD).render("a", "b");
        assert_eq!(report.matches("None\n").count(), 4);
    }

    #[test]
    fn test_compare_files_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.conf");
        std::fs::write(&present, OLD).unwrap();

        let err = compare_files(&present, &dir.path().join("b.conf")).unwrap_err();
        assert!(err.to_string().contains("b.conf"));
    }
}
