//! IPv4 range parsing and lazy expansion

use crate::error::{ScanError, ScanResult};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Parse a strict dotted-quad IPv4 literal.
///
/// Four decimal octets in `0..=255`, nothing before or after. Surrounding
/// whitespace counts as garbage.
pub fn parse_ipv4(input: &str) -> ScanResult<Ipv4Addr> {
    Ipv4Addr::from_str(input).map_err(|_| ScanError::InvalidAddressFormat(input.to_string()))
}

/// Inclusive span of IPv4 addresses between two endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
}

impl AddressRange {
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Self {
        Self { start, end }
    }

    /// Validate both endpoints and build the range
    pub fn parse(start: &str, end: &str) -> ScanResult<Self> {
        Ok(Self::new(parse_ipv4(start)?, parse_ipv4(end)?))
    }

    /// Number of addresses covered; zero when `start > end`
    pub fn len(&self) -> u64 {
        let start = u32::from(self.start) as u64;
        let end = u32::from(self.end) as u64;
        if start > end {
            0
        } else {
            end - start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand into the ordered address sequence.
    ///
    /// `limit` bounds the number of addresses; `None` accepts any range,
    /// including the full 2^32 space.
    pub fn expand(&self, limit: Option<u64>) -> ScanResult<ExpandedRange> {
        let len = self.len();
        if let Some(limit) = limit {
            if len > limit {
                return Err(ScanError::RangeTooLarge { requested: len, limit });
            }
        }

        log::debug!("Range {}-{} expanded to {} addresses", self.start, self.end, len);
        Ok(ExpandedRange {
            first: u32::from(self.start),
            len,
        })
    }
}

/// Ordered, contiguous sequence of addresses.
///
/// Stored as the first address and a length, so slicing a chunk out of a
/// large range never materializes the addresses outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandedRange {
    first: u32,
    len: u64,
}

impl ExpandedRange {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Address at `index`, if inside the range
    pub fn get(&self, index: u64) -> Option<Ipv4Addr> {
        if index < self.len {
            Some(Ipv4Addr::from((self.first as u64 + index) as u32))
        } else {
            None
        }
    }

    /// Sub-sequence starting at `offset` holding at most `count` addresses.
    /// Offsets past the end give an empty slice.
    pub fn slice(&self, offset: u64, count: u64) -> Vec<Ipv4Addr> {
        let offset = offset.min(self.len);
        let take = count.min(self.len - offset);
        (offset..offset + take)
            .map(|i| Ipv4Addr::from((self.first as u64 + i) as u32))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        (0..self.len).map(move |i| Ipv4Addr::from((self.first as u64 + i) as u32))
    }
}
