// SPDX-License-Identifier: MPL-2.0

//! A per-connection gatekeeper that refuses peers from denylisted countries.
//!
//! A super-server accepts a connection, puts it on standard input and output, and runs the
//! gatekeeper. The gatekeeper reduces the peer address to IPv4 [candidates](addr::Candidates),
//! looks up the country of each, and either exits with [`DENIED_EXIT_CODE`] or
//! [hands the connection over](handoff::exec) to the wrapped program.

use std::net::Ipv4Addr;

pub use country::{CountryCode, ParseCountryCodeError};
pub use denylist::Denylist;
pub use geo::{GeoDb, Resolve};

pub mod addr;
mod country;
pub mod denylist;
pub mod gate;
pub mod geo;
pub mod handoff;
pub mod peer;

/// The exit code of a gatekeeper that refused a connection.
pub const DENIED_EXIT_CODE: u8 = 2;

/// The outcome of checking a peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// `addr` was found to be in `country`, which is denylisted.
    Deny { addr: Ipv4Addr, country: CountryCode },
}

impl Decision {
    pub fn is_deny(&self) -> bool {
        matches!(self, Self::Deny { .. })
    }
}

/// Checks `candidates` in order, stopping at the first whose country is in `denylist`.
///
/// Candidates with no known country never cause a denial, and neither does an empty candidate
/// list.
pub fn decide(
    candidates: impl IntoIterator<Item = Ipv4Addr>,
    denylist: &Denylist,
    resolver: &impl Resolve,
) -> Decision {
    for addr in candidates {
        let country = resolver.country_of(addr);
        tracing::debug!("{} resolved to {:?}", addr, country);

        if let Some(country) = country {
            if denylist.contains(&country) {
                return Decision::Deny { addr, country };
            }
        }
    }

    Decision::Allow
}
