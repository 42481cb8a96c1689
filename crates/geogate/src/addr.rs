// SPDX-License-Identifier: MPL-2.0

//! Peer address normalization.
//!
//! Country lookups only exist for IPv4, so a peer address is reduced to the IPv4 addresses it
//! *carries*: an IPv4 peer carries itself, and an IPv6 peer may carry one or two IPv4 addresses
//! if it uses a transition mechanism that embeds them. Native IPv6 peers carry none and are not
//! checked at all.
//!
//! The recognized IPv6 embeddings are tried in this order, and only the first match counts:
//!
//! | Embedding        | Prefix          | Candidates                                              |
//! |------------------|-----------------|---------------------------------------------------------|
//! | Teredo           | `2001:0000::/32`| server (bytes 4..8), complemented client (bytes 12..16) |
//! | IPv4-mapped      | `::ffff:0:0/96` | bytes 12..16                                            |
//! | IPv4-compatible  | `::/96`         | bytes 12..16, see [`Embedding::Compatible`]             |
//! | 6to4             | `2002::/16`     | bytes 2..6                                              |

use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6},
};

use nix::sys::socket::{SockaddrLike as _, SockaddrStorage};
use smallvec::SmallVec;

/// The IPv4 addresses to check for a single peer.
///
/// There are at most two, so they are stored inline.
pub type Candidates = SmallVec<[Ipv4Addr; 2]>;

/// An IPv6 transition mechanism that embeds an IPv4 address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Embedding {
    /// Teredo (RFC 4380).
    ///
    /// Both the Teredo server and the client's NAT endpoint are candidates. The latter is stored
    /// with every bit flipped.
    Teredo,
    /// IPv4-mapped (RFC 4291, section 2.5.5.2).
    Mapped,
    /// IPv4-compatible (RFC 4291, section 2.5.5.1, deprecated).
    ///
    /// The embedded address must have a nonzero bit somewhere in its first three octets. This
    /// keeps `::` and `::1` (and the rest of `::/120`) out.
    Compatible,
    /// 6to4 (RFC 3056).
    SixToFour,
}

impl Embedding {
    /// Determines which embedding, if any, `addr` uses.
    pub fn classify(addr: &Ipv6Addr) -> Option<Self> {
        let o = addr.octets();

        if o[..4] == [0x20, 0x01, 0x00, 0x00] {
            Some(Self::Teredo)
        } else if o[..10] == [0; 10] && o[10..12] == [0xff, 0xff] {
            Some(Self::Mapped)
        } else if o[..12] == [0; 12] && o[12..15] != [0; 3] {
            Some(Self::Compatible)
        } else if o[..2] == [0x20, 0x02] {
            Some(Self::SixToFour)
        } else {
            None
        }
    }

    /// Extracts the IPv4 candidates from `addr`, which must use this embedding.
    fn extract(self, addr: &Ipv6Addr) -> Candidates {
        let o = addr.octets();
        let v4 = |at: usize| Ipv4Addr::new(o[at], o[at + 1], o[at + 2], o[at + 3]);

        let mut candidates = Candidates::new();
        match self {
            Self::Teredo => {
                candidates.push(v4(4));
                candidates.push(Ipv4Addr::from(!u32::from(v4(12))));
            }
            Self::Mapped | Self::Compatible => candidates.push(v4(12)),
            Self::SixToFour => candidates.push(v4(2)),
        }

        candidates
    }
}

impl fmt::Display for Embedding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Teredo => "Teredo",
            Self::Mapped => "IPv4-mapped",
            Self::Compatible => "IPv4-compatible",
            Self::SixToFour => "6to4",
        })
    }
}

/// Decodes `raw` as an IPv4 socket address.
pub fn decode_as_ipv4(raw: &SockaddrStorage) -> Option<Ipv4Addr> {
    raw.as_sockaddr_in().map(|sin| *SocketAddrV4::from(*sin).ip())
}

/// Decodes `raw` as an IPv6 socket address.
pub fn decode_as_ipv6(raw: &SockaddrStorage) -> Option<Ipv6Addr> {
    raw.as_sockaddr_in6().map(|sin6| *SocketAddrV6::from(*sin6).ip())
}

/// Returns the IPv4 candidates for a raw peer socket address.
///
/// An address that is neither IPv4 nor IPv6 yields no candidates.
pub fn candidates_for(raw: &SockaddrStorage) -> Candidates {
    if let Some(addr) = decode_as_ipv4(raw) {
        return candidates_for_ip(IpAddr::V4(addr));
    }
    if let Some(addr) = decode_as_ipv6(raw) {
        return candidates_for_ip(IpAddr::V6(addr));
    }

    tracing::debug!("peer address {:?} is neither IPv4 nor IPv6", raw.family());

    Candidates::new()
}

/// Returns the IPv4 candidates for an already-decoded address.
pub fn candidates_for_ip(addr: IpAddr) -> Candidates {
    match addr {
        IpAddr::V4(addr) => smallvec::smallvec![addr],
        IpAddr::V6(addr) => embedded_ipv4(&addr),
    }
}

/// Returns the IPv4 addresses embedded in `addr`, if it uses a known [`Embedding`].
pub fn embedded_ipv4(addr: &Ipv6Addr) -> Candidates {
    match Embedding::classify(addr) {
        Some(embedding) => {
            let candidates = embedding.extract(addr);
            tracing::debug!("{} is {}, carrying {:?}", addr, embedding, candidates.as_slice());

            candidates
        }
        None => Candidates::new(),
    }
}
