// SPDX-License-Identifier: MPL-2.0

//! Shows what the gatekeeper would decide for a list of addresses.
//!
//! ```text
//! $ norepi-geogate-inspect blacklist.txt GeoLite2-Country.mmdb 2001:0:4136:e378:8000:63bf:3fff:fdd2
//! 2001:0:4136:e378:8000:63bf:3fff:fdd2 (Teredo)
//!   65.54.227.120 US
//!   192.0.2.45 -
//!   allow
//! ```

use std::{io::Write as _, net::IpAddr, path::PathBuf, process};

use clap::Parser as _;
use error_stack::{IntoReport as _, Result, ResultExt as _};
use norepi_geogate::{gate, Denylist, GeoDb};

#[derive(clap::Parser, Debug)]
#[command(version, about = "Shows what norepi-geogate would decide for the given addresses")]
struct Args {
    #[arg(value_name = "BLACKLIST_PATH")]
    blacklist: PathBuf,
    #[arg(value_name = "GEOIP_DB_PATH")]
    geoip_db: PathBuf,
    /// IPv4 or IPv6 addresses to check.
    #[arg(value_name = "ADDR", required = true, num_args = 1..)]
    addrs: Vec<String>,
}

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error("failed to load the denylist")]
    Denylist,
    #[error("failed to open the GeoIP database")]
    GeoDb,
    #[error("failed to write to stdout")]
    Write,
}

fn main() -> process::ExitCode {
    norepi_geogate_util::run(|| {
        let args = match Args::try_parse() {
            Ok(args) => args,
            Err(e) => return Ok(gate::usage(&e)),
        };

        inspect(args)
    })
}

fn inspect(args: Args) -> Result<process::ExitCode, Error> {
    let denylist = Denylist::load(&args.blacklist).change_context(Error::Denylist)?;
    let resolver = GeoDb::open(&args.geoip_db).change_context(Error::GeoDb)?;

    let mut stdout = std::io::stdout().lock();
    let mut code = process::ExitCode::SUCCESS;

    for arg in &args.addrs {
        let ip: IpAddr = match arg.parse() {
            Ok(ip) => ip,
            Err(e) => {
                eprintln!("{arg}: {e}");
                code = process::ExitCode::FAILURE;

                continue;
            }
        };

        let out = gate::describe(ip, &denylist, &resolver);
        stdout.write_all(out.as_bytes()).into_report().change_context(Error::Write)?;
    }

    Ok(code)
}
