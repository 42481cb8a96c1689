// SPDX-License-Identifier: MPL-2.0

//! Country lookups by IPv4 address.

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
};

use error_stack::{IntoReport as _, Result, ResultExt as _};
use maxminddb::{geoip2, MaxMindDBError};

use crate::CountryCode;

/// Something that knows which country an IPv4 address belongs to.
///
/// An address with no known country is not an error; implementations return `None`.
pub trait Resolve {
    fn country_of(&self, addr: Ipv4Addr) -> Option<CountryCode>;
}

impl<R: Resolve + ?Sized> Resolve for &R {
    fn country_of(&self, addr: Ipv4Addr) -> Option<CountryCode> {
        (**self).country_of(addr)
    }
}

impl Resolve for HashMap<Ipv4Addr, CountryCode> {
    fn country_of(&self, addr: Ipv4Addr) -> Option<CountryCode> {
        self.get(&addr).copied()
    }
}

/// An error returned by [`GeoDb::open`].
#[derive(thiserror::Error, Debug)]
#[error("failed to open GeoIP database {}", .path.display())]
pub struct OpenError {
    path: PathBuf,
}

/// A MaxMind DB country (or city) database.
///
/// The whole database is read into memory when opened, so no file descriptor is held afterwards.
pub struct GeoDb {
    reader: maxminddb::Reader<Vec<u8>>,
}

impl GeoDb {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let reader = maxminddb::Reader::open_readfile(path)
            .into_report()
            .change_context_lazy(|| OpenError { path: path.to_owned() })?;

        tracing::debug!(
            "opened GeoIP database {} ({}, built {})",
            path.display(),
            reader.metadata.database_type,
            reader.metadata.build_epoch,
        );

        Ok(Self { reader })
    }
}

impl Resolve for GeoDb {
    fn country_of(&self, addr: Ipv4Addr) -> Option<CountryCode> {
        let record = match self.reader.lookup::<geoip2::Country>(IpAddr::V4(addr)) {
            Ok(record) => record,
            Err(MaxMindDBError::AddressNotFoundError(_)) => return None,
            Err(e) => {
                tracing::warn!("GeoIP lookup of {} failed: {}", addr, e);

                return None;
            }
        };
        let iso_code = record.country?.iso_code?;

        match iso_code.parse() {
            Ok(code) => Some(code),
            Err(_) => {
                tracing::debug!("ignoring unexpected ISO code {:?} for {}", iso_code, addr);

                None
            }
        }
    }
}
