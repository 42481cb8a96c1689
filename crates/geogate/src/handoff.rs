// SPDX-License-Identifier: MPL-2.0

//! Handing the connection over to the wrapped program.

use std::{
    ffi::{OsStr, OsString},
    os::unix::process::CommandExt as _,
    process::{self, Command},
};

use error_stack::{IntoReport as _, Report, Result, ResultExt as _};

#[derive(thiserror::Error, Debug)]
#[error("failed to execute {target:?}")]
pub struct HandoffError {
    target: OsString,
}

/// Replaces the current process with `target`, passing `args` verbatim.
///
/// All file descriptors not marked close-on-exec are inherited, including the connection on
/// standard input and output. This only returns if the target could not be executed.
pub fn exec(target: &OsStr, args: &[OsString]) -> Report<HandoffError> {
    tracing::debug!("executing {:?} with {} argument(s)", target, args.len());

    Report::new(Command::new(target).args(args).exec())
        .change_context(HandoffError { target: target.to_owned() })
}

/// Runs `target` as a child with inherited standard streams and returns its exit status as an exit
/// code for this process.
///
/// This is the fallback for when the process image must not be replaced. A child killed by a
/// signal maps to [`process::ExitCode::FAILURE`].
pub fn spawn(target: &OsStr, args: &[OsString]) -> Result<process::ExitCode, HandoffError> {
    let status = Command::new(target)
        .args(args)
        .status()
        .into_report()
        .change_context_lazy(|| HandoffError { target: target.to_owned() })?;

    Ok(match status.code() {
        Some(code) => process::ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX)),
        None => process::ExitCode::FAILURE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    fn code_of(code: process::ExitCode) -> String {
        format!("{code:?}")
    }

    #[test]
    fn exec_of_missing_program_returns_an_error() {
        let err = exec(OsStr::new("/nonexistent/norepi-geogate-target"), &os(&["x"]));

        assert_eq!(
            err.current_context().target,
            OsString::from("/nonexistent/norepi-geogate-target"),
        );
        assert!(err.downcast_ref::<std::io::Error>().is_some());
    }

    #[test]
    fn spawn_propagates_the_exit_status() {
        let code = spawn(OsStr::new("sh"), &os(&["-c", "exit 7"])).unwrap();

        assert_eq!(code_of(code), code_of(process::ExitCode::from(7)));
    }

    #[test]
    fn spawn_passes_arguments_verbatim() {
        let script = r#"[ "$#" -eq 3 ] && [ "$1" = "-v" ] && [ "$2" = "a b" ] && [ "$3" = "--" ]"#;
        let args = os(&["-c", script, "sh", "-v", "a b", "--"]);

        let code = spawn(OsStr::new("sh"), &args).unwrap();

        assert_eq!(code_of(code), code_of(process::ExitCode::SUCCESS));
    }

    #[test]
    fn spawn_of_missing_program_is_an_error() {
        assert!(spawn(OsStr::new("/nonexistent/norepi-geogate-target"), &[]).is_err());
    }
}
