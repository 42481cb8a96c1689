// SPDX-License-Identifier: MPL-2.0

//! The connection handed over by the super-server.

use std::{
    io,
    os::unix::io::{AsRawFd, RawFd},
};

use error_stack::{IntoReport as _, Result, ResultExt as _};
use nix::sys::socket::{self, SockaddrStorage};

#[derive(thiserror::Error, Debug)]
#[error("failed to query the peer address of file descriptor {fd}")]
pub struct PeerError {
    fd: RawFd,
}

/// Returns the raw peer address of the socket on standard input.
pub fn of_stdin() -> Result<SockaddrStorage, PeerError> {
    of(io::stdin().as_raw_fd())
}

/// Returns the raw peer address of the connected socket `fd`.
pub fn of(fd: RawFd) -> Result<SockaddrStorage, PeerError> {
    socket::getpeername::<SockaddrStorage>(fd)
        .into_report()
        .change_context(PeerError { fd })
}
