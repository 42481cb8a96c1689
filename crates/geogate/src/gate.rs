// SPDX-License-Identifier: MPL-2.0

//! The gatekeeper's flow, from a raw peer address to an exit code or a handoff.

use std::{
    ffi::{OsStr, OsString},
    fmt::Write as _,
    net::IpAddr,
    process,
};

use error_stack::{Report, Result, ResultExt as _};
use nix::sys::socket::SockaddrStorage;

use crate::{addr, handoff::HandoffError, Decision, Denylist, Resolve, DENIED_EXIT_CODE};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum GateError {
    #[error("no target program was given")]
    NoTarget,
    #[error("failed to hand over the connection")]
    Handoff,
}

/// Decides whether the peer at `raw` may connect and acts on it.
///
/// A denied peer yields [`DENIED_EXIT_CODE`] without calling `handoff`. An allowed peer has
/// `denylist` and `resolver` dropped, then `command` split into the target and its arguments
/// and passed to `handoff`, whose result is returned.
pub fn admit<R, H>(
    raw: &SockaddrStorage,
    denylist: Denylist,
    resolver: R,
    command: &[OsString],
    handoff: H,
) -> Result<process::ExitCode, GateError>
where
    R: Resolve,
    H: FnOnce(&OsStr, &[OsString]) -> Result<process::ExitCode, HandoffError>,
{
    match crate::decide(addr::candidates_for(raw), &denylist, &resolver) {
        Decision::Deny { addr, country } => {
            tracing::warn!("connection from {} was denied: {} is in {}", raw, addr, country);

            return Ok(process::ExitCode::from(DENIED_EXIT_CODE));
        }
        Decision::Allow => {
            tracing::info!("connection from {} was allowed", raw);
        }
    }

    // Nothing opened here should outlive the handoff.
    drop(resolver);
    drop(denylist);

    let (target, args) = command.split_first().ok_or_else(|| Report::new(GateError::NoTarget))?;

    handoff(target, args)
        .change_context(GateError::Handoff)
        .attach_printable_lazy(|| format!("target: {target:?}"))
}

/// Prints a command-line parsing error (or help) and picks the exit code.
///
/// Usage errors exit with [`process::ExitCode::FAILURE`] rather than clap's default of 2, which
/// is [`DENIED_EXIT_CODE`].
pub fn usage(e: &clap::Error) -> process::ExitCode {
    let _ = e.print();

    usage_exit_code(e)
}

fn usage_exit_code(e: &clap::Error) -> process::ExitCode {
    use clap::error::ErrorKind;

    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => process::ExitCode::SUCCESS,
        _ => process::ExitCode::FAILURE,
    }
}

/// Describes what the gatekeeper would do with a peer at `ip`.
///
/// ```text
/// 2001:0:4136:e378:8000:63bf:3fff:fdd2 (Teredo)
///   65.54.227.120 US
///   192.0.2.45 -
///   allow
/// ```
pub fn describe(ip: IpAddr, denylist: &Denylist, resolver: &impl Resolve) -> String {
    let mut out = ip.to_string();
    if let IpAddr::V6(ip) = ip {
        if let Some(embedding) = addr::Embedding::classify(&ip) {
            let _ = write!(out, " ({embedding})");
        }
    }
    out.push('\n');

    let candidates = addr::candidates_for_ip(ip);
    for candidate in &candidates {
        match resolver.country_of(*candidate) {
            Some(country) => {
                let _ = writeln!(out, "  {candidate} {country}");
            }
            None => {
                let _ = writeln!(out, "  {candidate} -");
            }
        }
    }

    match crate::decide(candidates, denylist, resolver) {
        Decision::Allow => out.push_str("  allow\n"),
        Decision::Deny { addr, country } => {
            let _ = writeln!(out, "  deny ({addr} is in {country})");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, collections::HashMap, fs, net::{Ipv4Addr, SocketAddr}};

    use super::*;
    use crate::{handoff, CountryCode};

    fn code(s: &str) -> CountryCode {
        s.parse().unwrap()
    }

    fn peer(addr: &str) -> SockaddrStorage {
        SockaddrStorage::from(addr.parse::<SocketAddr>().unwrap())
    }

    fn resolver(entries: &[([u8; 4], &str)]) -> HashMap<Ipv4Addr, CountryCode> {
        entries.iter().map(|(addr, cc)| (Ipv4Addr::from(*addr), code(cc))).collect()
    }

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    fn code_of(code: process::ExitCode) -> String {
        format!("{code:?}")
    }

    #[test]
    fn denied_peer_exits_with_the_denied_code_without_handoff() {
        let called = Cell::new(false);

        let exit = admit(
            &peer("1.2.3.4:5555"),
            Denylist::from_iter([code("FR")]),
            resolver(&[([1, 2, 3, 4], "FR")]),
            &os(&["true"]),
            |_, _| {
                called.set(true);
                Ok(process::ExitCode::SUCCESS)
            },
        )
        .unwrap();

        assert_eq!(code_of(exit), code_of(process::ExitCode::from(2)));
        assert!(!called.get());
    }

    #[test]
    fn allowed_peer_launches_the_target_with_its_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("args.txt");
        let script = r#"printf '%s\n' "$@" > "$0""#;
        let mut command = os(&["sh", "-c", script]);
        command.push(out.clone().into_os_string());
        command.extend(os(&["a", "-b", "c d"]));

        let exit = admit(
            &peer("5.6.7.8:5555"),
            Denylist::from_iter([code("FR")]),
            resolver(&[([5, 6, 7, 8], "DE")]),
            &command,
            handoff::spawn,
        )
        .unwrap();

        assert_eq!(code_of(exit), code_of(process::ExitCode::SUCCESS));
        assert_eq!(fs::read_to_string(&out).unwrap(), "a\n-b\nc d\n");
    }

    #[test]
    fn unresolved_peer_is_handed_over_and_its_status_propagates() {
        let exit = admit(
            &peer("9.9.9.9:5555"),
            Denylist::from_iter([code("FR")]),
            resolver(&[]),
            &os(&["sh", "-c", "exit 7"]),
            handoff::spawn,
        )
        .unwrap();

        assert_eq!(code_of(exit), code_of(process::ExitCode::from(7)));
    }

    #[test]
    fn target_and_arguments_are_split_for_the_handoff() {
        let mut seen = None;

        let _ = admit(
            &peer("[2a01:e0a::1]:443"),
            Denylist::from_iter([code("FR")]),
            resolver(&[]),
            &os(&["/usr/sbin/in.telnetd", "-h", "--", "x"]),
            |target, args| {
                seen = Some((target.to_owned(), args.to_vec()));
                Ok(process::ExitCode::SUCCESS)
            },
        );

        assert_eq!(seen, Some((OsString::from("/usr/sbin/in.telnetd"), os(&["-h", "--", "x"]))));
    }

    #[test]
    fn failed_handoff_is_an_error() {
        let err = admit(
            &peer("5.6.7.8:5555"),
            Denylist::default(),
            resolver(&[]),
            &os(&["/nonexistent/norepi-geogate-target"]),
            |target, args| Err(handoff::exec(target, args)),
        )
        .unwrap_err();

        assert_eq!(err.current_context(), &GateError::Handoff);
        assert!(err.downcast_ref::<HandoffError>().is_some());
    }

    #[test]
    fn empty_command_is_an_error() {
        let err = admit(
            &peer("5.6.7.8:5555"),
            Denylist::default(),
            resolver(&[]),
            &[],
            |_, _| Ok(process::ExitCode::SUCCESS),
        )
        .unwrap_err();

        assert_eq!(err.current_context(), &GateError::NoTarget);
    }

    #[test]
    fn usage_errors_are_not_denials() {
        let command = || clap::Command::new("gate").arg(clap::Arg::new("path").required(true));

        let missing = command().try_get_matches_from(["gate"]).unwrap_err();
        assert_eq!(code_of(usage_exit_code(&missing)), code_of(process::ExitCode::FAILURE));

        let help = command().try_get_matches_from(["gate", "--help"]).unwrap_err();
        assert_eq!(code_of(usage_exit_code(&help)), code_of(process::ExitCode::SUCCESS));
    }

    #[test]
    fn describes_a_denied_ipv4_peer() {
        let text = describe(
            "1.2.3.4".parse().unwrap(),
            &Denylist::from_iter([code("FR")]),
            &resolver(&[([1, 2, 3, 4], "FR")]),
        );

        assert_eq!(text, "1.2.3.4\n  1.2.3.4 FR\n  deny (1.2.3.4 is in FR)\n");
    }

    #[test]
    fn describes_a_teredo_peer() {
        let text = describe(
            "2001:0:4136:e378:8000:63bf:3fff:fdd2".parse().unwrap(),
            &Denylist::from_iter([code("FR")]),
            &resolver(&[([65, 54, 227, 120], "US")]),
        );

        assert_eq!(
            text,
            "2001:0:4136:e378:8000:63bf:3fff:fdd2 (Teredo)\n  \
             65.54.227.120 US\n  \
             192.0.2.45 -\n  \
             allow\n",
        );
    }

    #[test]
    fn describes_a_native_ipv6_peer() {
        let text = describe("2a01:e0a::1".parse().unwrap(), &Denylist::default(), &resolver(&[]));

        assert_eq!(text, "2a01:e0a::1\n  allow\n");
    }
}
