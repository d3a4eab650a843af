//! Normalized IPv4 address intervals.

use ipnet::Ipv4Net;
use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;

use crate::serial::{Deserializer, Serializer};
use crate::Result;

/// Byte length of an IPv4 address, the width tag of every IPv4 range.
pub const IPV4_LEN: u8 = 4;

/// An inclusive address interval.
///
/// `lower <= upper` always holds; constructors swap out-of-order bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    len: u8,
    lower: u32,
    upper: u32,
}

impl Range {
    /// Create a range, swapping the bounds if given out of order.
    pub fn new(len: u8, a: u32, b: u32) -> Self {
        Self {
            len,
            lower: a.min(b),
            upper: a.max(b),
        }
    }

    /// IPv4 range between two addresses.
    pub fn from_addrs(a: Ipv4Addr, b: Ipv4Addr) -> Self {
        Self::new(IPV4_LEN, u32::from(a), u32::from(b))
    }

    /// Point range used as a search key.
    pub fn probe(len: u8, value: u32) -> Self {
        Self::new(len, value, value)
    }

    /// Address width tag.
    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    pub fn lower(&self) -> u32 {
        self.lower
    }

    pub fn upper(&self) -> u32 {
        self.upper
    }

    /// Check if a value lies within the bounds (inclusive).
    pub fn contains(&self, value: u32) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Check if an IPv4 address lies within the bounds.
    pub fn contains_addr(&self, addr: Ipv4Addr) -> bool {
        self.len == IPV4_LEN && self.contains(u32::from(addr))
    }

    /// Interval ordering used for binary search.
    ///
    /// Ranges order by width tag first. Within one width, overlapping
    /// intervals compare equal, so a point probe is equal to the range
    /// containing it.
    pub fn cmp_interval(&self, other: &Range) -> Ordering {
        self.len.cmp(&other.len).then_with(|| {
            if self.upper < other.lower {
                Ordering::Less
            } else if other.upper < self.lower {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        })
    }

    pub fn lower_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.lower)
    }

    pub fn upper_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.upper)
    }

    /// Wire encoding: `u8 len, u32 lower, u32 upper`.
    pub fn write_to(&self, out: &mut Serializer<'_>) -> Result<()> {
        out.write_u8(self.len)?;
        out.write_u32(self.lower)?;
        out.write_u32(self.upper)
    }

    pub fn read_from(input: &mut Deserializer<'_>) -> Result<Self> {
        let len = input.read_u8()?;
        let lower = input.read_u32()?;
        let upper = input.read_u32()?;
        Ok(Self::new(len, lower, upper))
    }
}

impl From<Ipv4Net> for Range {
    fn from(net: Ipv4Net) -> Self {
        Self::from_addrs(net.network(), net.broadcast())
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.lower_addr(), self.upper_addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(s: &str) -> u32 {
        u32::from(s.parse::<Ipv4Addr>().unwrap())
    }

    #[test]
    fn test_new_normalizes_bounds() {
        let range = Range::new(4, 20, 10);
        assert_eq!(range.lower(), 10);
        assert_eq!(range.upper(), 20);
        assert_eq!(range, Range::new(4, 10, 20));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let range = Range::new(4, v4("91.64.54.0"), v4("91.64.54.255"));
        assert!(range.contains(v4("91.64.54.0")));
        assert!(range.contains(v4("91.64.54.207")));
        assert!(range.contains(v4("91.64.54.255")));
        assert!(!range.contains(v4("91.64.55.0")));
        assert!(!range.contains(v4("91.64.53.255")));
    }

    #[test]
    fn test_probe_ordering() {
        let range = Range::new(4, 100, 200);
        assert_eq!(Range::probe(4, 150).cmp_interval(&range), Ordering::Equal);
        assert_eq!(Range::probe(4, 100).cmp_interval(&range), Ordering::Equal);
        assert_eq!(Range::probe(4, 99).cmp_interval(&range), Ordering::Less);
        assert_eq!(Range::probe(4, 201).cmp_interval(&range), Ordering::Greater);
        assert_eq!(range.cmp_interval(&Range::probe(4, 201)), Ordering::Less);
    }

    #[test]
    fn test_width_orders_first() {
        let v4_range = Range::new(4, 0, u32::MAX);
        let other = Range::new(16, 0, 0);
        assert_eq!(v4_range.cmp_interval(&other), Ordering::Less);
        assert!(!Range::new(16, 0, 10).contains_addr(Ipv4Addr::new(0, 0, 0, 5)));
    }

    #[test]
    fn test_from_cidr() {
        let net: Ipv4Net = "10.1.0.0/16".parse().unwrap();
        let range = Range::from(net);
        assert_eq!(range.lower_addr(), Ipv4Addr::new(10, 1, 0, 0));
        assert_eq!(range.upper_addr(), Ipv4Addr::new(10, 1, 255, 255));
        assert_eq!(range.prefix_len(), IPV4_LEN);
    }

    #[test]
    fn test_display() {
        let range = Range::new(4, v4("91.64.54.255"), v4("91.64.54.0"));
        assert_eq!(range.to_string(), "91.64.54.0-91.64.54.255");
    }
}
