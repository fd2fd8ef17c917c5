//! Address block arithmetic
//!
//! IPv4 prefixes are normalized to /24 blocks: longer prefixes are aligned onto
//! their containing /24, shorter ones are split into consecutive /24s. IPv6
//! prefixes are never re-aligned, so these operations only accept [Ipv4Net].
//!
//! [compare_prefixes] is the single ordering used for every sorted prefix list:
//! address family first (IPv4 before IPv6), then prefix length, then address.

use crate::error::PrefixError;
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::cmp::Ordering;
use std::net::Ipv4Addr;

/// Normalized block length for IPv4 output.
pub const BLOCK_LEN: u8 = 24;

/// Number of addresses in one /24 block.
const BLOCK_SIZE: u64 = 1 << (32 - BLOCK_LEN);

/// Map a /24-or-longer prefix onto its containing /24.
///
/// Returns `None` for prefixes shorter than /24, which have to be split instead.
pub fn align_to_24(prefix: Ipv4Net) -> Option<Ipv4Net> {
    if prefix.prefix_len() < BLOCK_LEN {
        return None;
    }
    let masked = u32::from(prefix.addr()) & 0xffff_ff00;
    Ipv4Net::new(Ipv4Addr::from(masked), BLOCK_LEN).ok()
}

/// Cover `prefix` with /24 blocks, in increasing address order.
///
/// A prefix of length `L < 24` yields exactly `2^(24 - L)` blocks starting at its
/// network address. Prefixes of /24 or longer yield the single aligned block.
pub fn split_into_24s(prefix: Ipv4Net) -> Result<Vec<Ipv4Net>, PrefixError> {
    if let Some(block) = align_to_24(prefix) {
        return Ok(vec![block]);
    }

    let count = 1u64 << (BLOCK_LEN - prefix.prefix_len());
    // u64 keeps `base + i * 256` from wrapping at the top of the address space
    let base = u64::from(u32::from(prefix.network()));

    (0..count)
        .map(|i| {
            let start = base + i * BLOCK_SIZE;
            let addr = u32::try_from(start).map_err(|_| {
                PrefixError::Conversion(format!(
                    "block {} of {} lies outside the IPv4 space",
                    start, prefix
                ))
            })?;
            Ipv4Net::new(Ipv4Addr::from(addr), BLOCK_LEN)
                .map_err(|e| PrefixError::Conversion(e.to_string()))
        })
        .collect()
}

fn family_bits(prefix: &IpNet) -> u8 {
    match prefix {
        IpNet::V4(_) => 32,
        IpNet::V6(_) => 128,
    }
}

fn addr_value(prefix: &IpNet) -> u128 {
    match prefix {
        IpNet::V4(p) => u128::from(u32::from(p.addr())),
        IpNet::V6(p) => u128::from(p.addr()),
    }
}

/// Canonical ordering: family, then prefix length, then numeric address.
pub fn compare_prefixes(a: &IpNet, b: &IpNet) -> Ordering {
    family_bits(a)
        .cmp(&family_bits(b))
        .then_with(|| a.prefix_len().cmp(&b.prefix_len()))
        .then_with(|| addr_value(a).cmp(&addr_value(b)))
}

/// [compare_prefixes] restricted to IPv4.
pub fn compare_v4(a: &Ipv4Net, b: &Ipv4Net) -> Ordering {
    compare_prefixes(&IpNet::V4(*a), &IpNet::V4(*b))
}

/// [compare_prefixes] restricted to IPv6.
pub fn compare_v6(a: &Ipv6Net, b: &Ipv6Net) -> Ordering {
    compare_prefixes(&IpNet::V6(*a), &IpNet::V6(*b))
}
