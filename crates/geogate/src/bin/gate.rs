// SPDX-License-Identifier: MPL-2.0

//! The gatekeeper, run by a super-server with the accepted connection on standard input and
//! output.
//!
//! ```text
//! norepi-geogate BLACKLIST_PATH GEOIP_DB_PATH TARGET_PROGRAM [TARGET_ARGS]...
//! ```

use std::{ffi::OsString, path::PathBuf, process};

use clap::Parser as _;
use error_stack::{Result, ResultExt as _};
use norepi_geogate::{gate, handoff, peer, Denylist, GeoDb};

#[derive(clap::Parser, Debug)]
#[command(version, about = "Refuses connections from denylisted countries")]
struct Args {
    /// File of two-letter country codes to refuse, one per line.
    #[arg(value_name = "BLACKLIST_PATH")]
    blacklist: PathBuf,
    /// MaxMind DB file mapping IP addresses to countries.
    #[arg(value_name = "GEOIP_DB_PATH")]
    geoip_db: PathBuf,
    /// Program to run if the peer is allowed, followed by its arguments.
    #[arg(
        value_name = "TARGET_PROGRAM [TARGET_ARGS]",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true,
    )]
    command: Vec<OsString>,
}

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error("failed to load the denylist")]
    Denylist,
    #[error("failed to open the GeoIP database")]
    GeoDb,
    #[error("failed to identify the peer")]
    Peer,
    #[error("failed to hand over the connection")]
    Handoff,
}

fn main() -> process::ExitCode {
    norepi_geogate_util::run(guard)
}

fn guard() -> Result<process::ExitCode, Error> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => return Ok(gate::usage(&e)),
    };

    let denylist = Denylist::load(&args.blacklist).change_context(Error::Denylist)?;
    let resolver = GeoDb::open(&args.geoip_db).change_context(Error::GeoDb)?;
    let raw = peer::of_stdin().change_context(Error::Peer)?;

    gate::admit(&raw, denylist, resolver, &args.command, |target, target_args| {
        Err(handoff::exec(target, target_args))
    })
    .change_context(Error::Handoff)
}
