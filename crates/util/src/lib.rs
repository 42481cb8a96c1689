// SPDX-License-Identifier: MPL-2.0

//! Process scaffolding shared by the *norepi-geogate* binaries.
//!
//! Under a super-server, standard output is the accepted connection, so everything here writes to
//! standard error.

use std::{fmt, io, process};

/// Runs `main` after setting up tracing, reporting any error on standard error.
///
/// On success, the exit code chosen by `main` is returned as-is; on failure,
/// [`process::ExitCode::FAILURE`] is returned.
pub fn run<E: fmt::Debug>(main: impl FnOnce() -> Result<process::ExitCode, E>) -> process::ExitCode {
    prologue();

    handle_result(main())
}

fn prologue() {
    if let Err(e) = try_setup_tracing() {
        eprintln!("Failed to setup tracing: {}", e);
    }

    tracing::info!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
}

fn handle_result<E: fmt::Debug>(result: Result<process::ExitCode, E>) -> process::ExitCode {
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e:?}");

            process::ExitCode::FAILURE
        }
    }
}

fn try_setup_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::filter::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter({
            match EnvFilter::try_from_default_env() {
                Ok(filter) => filter,
                Err(e) => {
                    // An unset variable is the common case and not worth mentioning.
                    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
                        eprintln!("Failed to parse ${}: {}", EnvFilter::DEFAULT_ENV, e);
                        eprintln!("Using default tracing filter");
                    }

                    EnvFilter::default()
                }
            }
        })
        .with_writer(io::stderr)
        .with_thread_names(false)
        .try_init()
}
