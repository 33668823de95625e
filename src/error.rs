use std::io;

/// Errors surfacing from pipeline execution.
///
/// The engine distinguishes two classes. A [`ExecError::Command`] is a user
/// error (bad redirection target, malformed builtin invocation): it is
/// reported and the interpreter keeps running. A [`ExecError::Resource`] is
/// a plumbing failure (descriptor duplication, pipe or process creation, an
/// unexpected wait error): the interpreter's descriptor state can no longer
/// be trusted, so the caller is expected to report it and terminate with a
/// non-zero status.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// Reported to the user; the interpreter survives.
    #[error("{0}")]
    Command(String),

    /// Unrecoverable OS resource failure; named after the failing call the
    /// way `perror` would be.
    #[error("{call}: {source}")]
    Resource {
        call: &'static str,
        #[source]
        source: io::Error,
    },
}

impl ExecError {
    pub fn command(message: impl Into<String>) -> Self {
        ExecError::Command(message.into())
    }

    pub fn resource(call: &'static str, source: io::Error) -> Self {
        ExecError::Resource { call, source }
    }

    /// A resource error carrying the errno of a failed `nix` call.
    pub fn os(call: &'static str, errno: nix::errno::Errno) -> Self {
        ExecError::Resource {
            call,
            source: io::Error::from_raw_os_error(errno as i32),
        }
    }

    /// Whether the interpreter must terminate after reporting this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExecError::Resource { .. })
    }
}

pub type Result<T> = std::result::Result<T, ExecError>;
