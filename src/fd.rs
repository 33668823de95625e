//! Descriptor plumbing for the execution engine.
//!
//! Every descriptor the engine juggles (the saved copies of the
//! interpreter's own standard streams, redirection files, pipe ends) is held
//! as an [`OwnedFd`] so it is closed on every exit path, including the
//! early-fatal ones.

use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use crate::error::{ExecError, Result};

pub const STDIN_FD: RawFd = libc::STDIN_FILENO;
pub const STDOUT_FD: RawFd = libc::STDOUT_FILENO;
pub const STDERR_FD: RawFd = libc::STDERR_FILENO;

/// Duplicates of the interpreter's standard descriptors, captured before a
/// pipeline rewires them and guaranteed to be put back.
///
/// [`SavedStdio::restore`] is the checked restore used on the normal path;
/// `Drop` performs the same restore (ignoring errors) so an early return
/// cannot leave the interpreter reading or writing the wrong stream.
#[derive(Debug)]
pub struct SavedStdio {
    stdin: Option<OwnedFd>,
    stdout: Option<OwnedFd>,
    stderr: Option<OwnedFd>,
}

impl SavedStdio {
    /// Duplicate fds 0, 1 and 2. Failure here is a resource error: the
    /// engine cannot execute anything without a way back.
    pub fn capture() -> Result<Self> {
        let dup = |fd: RawFd| -> Result<OwnedFd> {
            nix::unistd::dup(fd)
                .map_err(|e| ExecError::os("dup", e))
                // SAFETY: dup returned a freshly created descriptor that
                // nothing else owns.
                .map(|raw| unsafe { <OwnedFd as std::os::fd::FromRawFd>::from_raw_fd(raw) })
        };
        Ok(Self {
            stdin: Some(dup(STDIN_FD)?),
            stdout: Some(dup(STDOUT_FD)?),
            stderr: Some(dup(STDERR_FD)?),
        })
    }

    /// A fresh duplicate of the saved stdin, for pipelines with no input
    /// redirection.
    pub fn dup_stdin(&self) -> Result<OwnedFd> {
        self.dup_saved(&self.stdin)
    }

    /// A fresh duplicate of the saved stdout, for final stages with no
    /// output redirection.
    pub fn dup_stdout(&self) -> Result<OwnedFd> {
        self.dup_saved(&self.stdout)
    }

    /// A fresh duplicate of the saved stderr, for final stages with no
    /// error redirection.
    pub fn dup_stderr(&self) -> Result<OwnedFd> {
        self.dup_saved(&self.stderr)
    }

    fn dup_saved(&self, fd: &Option<OwnedFd>) -> Result<OwnedFd> {
        // The Options are only emptied by restore(), which consumes self.
        let fd = fd.as_ref().ok_or_else(|| {
            ExecError::resource("dup", io::Error::from_raw_os_error(libc::EBADF))
        })?;
        fd.try_clone()
            .map_err(|e| ExecError::resource("dup", e))
    }

    /// Raw values of the three saved duplicates, so a forked child can close
    /// them before replacing its program image.
    pub fn raw_fds(&self) -> [RawFd; 3] {
        let raw = |fd: &Option<OwnedFd>| fd.as_ref().map(|f| f.as_raw_fd()).unwrap_or(-1);
        [raw(&self.stdin), raw(&self.stdout), raw(&self.stderr)]
    }

    /// Put fds 0/1/2 back and close the duplicates, reporting any failure.
    pub fn restore(mut self) -> Result<()> {
        self.restore_inner()
            .map_err(|e| ExecError::os("dup2", e))
    }

    fn restore_inner(&mut self) -> std::result::Result<(), nix::errno::Errno> {
        let mut result = Ok(());
        for (saved, slot) in [
            (self.stdin.take(), STDIN_FD),
            (self.stdout.take(), STDOUT_FD),
            (self.stderr.take(), STDERR_FD),
        ] {
            if let Some(fd) = saved {
                if let Err(e) = nix::unistd::dup2(fd.as_raw_fd(), slot) {
                    result = Err(e);
                }
                // fd drops here, closing the duplicate.
            }
        }
        result
    }
}

impl Drop for SavedStdio {
    fn drop(&mut self) {
        // Fallback for early-error paths; restore() already emptied the
        // fields on the normal path.
        let _ = self.restore_inner();
    }
}

/// Move `fd` onto a standard descriptor slot and close the original, the
/// `dup2`-then-`close` idiom of the per-stage remap.
pub fn bind(fd: OwnedFd, slot: RawFd) -> Result<()> {
    if fd.as_raw_fd() == slot {
        // Already in place; the slot must stay open.
        std::mem::forget(fd);
        return Ok(());
    }
    nix::unistd::dup2(fd.as_raw_fd(), slot)
        .map_err(|e| ExecError::os("dup2", e))?;
    Ok(())
    // fd drops here, closing the original.
}

/// An anonymous pipe connecting adjacent stages: `(read_end, write_end)`.
pub fn pipe() -> Result<(OwnedFd, OwnedFd)> {
    nix::unistd::pipe().map_err(|e| ExecError::os("pipe", e))
}

/// Whether the descriptor refers to a terminal. Used to gate prompt
/// re-issue behavior.
pub fn is_tty(fd: RawFd) -> bool {
    // SAFETY: isatty only inspects the descriptor.
    unsafe { libc::isatty(fd) == 1 }
}
