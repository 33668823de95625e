//! Process creation for external stages.
//!
//! By the time a stage reaches this module the coordinator has already
//! remapped fds 0/1/2 for it; the child only has to shed the interpreter's
//! saved descriptor duplicates and replace its program image.

use std::ffi::CString;
use std::io::{self, Write};

use nix::unistd::{ForkResult, Pid, fork};

use crate::command::Stage;
use crate::error::{ExecError, Result};
use crate::fd::SavedStdio;

/// Fork a process for one external stage and return its pid.
///
/// Fork failure is a resource error: the interpreter cannot safely continue
/// in an unknown state, so the caller terminates after reporting. Everything
/// that goes wrong *inside* the child (unknown program, exec failure) is
/// confined there — the child reports on its own stderr and exits non-zero,
/// never returning into interpreter logic.
pub fn spawn_stage(stage: &Stage, saved: &SavedStdio) -> Result<Pid> {
    if stage.argv.is_empty() {
        return Err(ExecError::command("cannot execute an empty command"));
    }
    // SAFETY: the interpreter is single-threaded, so the child is not born
    // with poisoned locks; it only closes descriptors, writes, and execs.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => Ok(child),
        Ok(ForkResult::Child) => run_child(stage, saved),
        Err(e) => Err(ExecError::resource(
            "fork",
            io::Error::from_raw_os_error(e as i32),
        )),
    }
}

/// Child-side continuation: never returns to the caller.
fn run_child(stage: &Stage, saved: &SavedStdio) -> ! {
    // The three saved duplicates belong to the interpreter; an external
    // program must not inherit them.
    for fd in saved.raw_fds() {
        if fd >= 0 {
            let _ = nix::unistd::close(fd);
        }
    }

    // `printenv` is handled here, after the fork decision: it lists the
    // environment through whatever fd 1 was remapped to and exits, instead
    // of going through the search-path lookup.
    if stage.verb() == Some("printenv") {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for (name, value) in std::env::vars() {
            if writeln!(out, "{}={}", name, value).is_err() {
                exit_child(1);
            }
        }
        if out.flush().is_err() {
            exit_child(1);
        }
        exit_child(0);
    }

    let program = stage.argv[0].clone();
    let argv: Option<Vec<CString>> = stage
        .argv
        .iter()
        .map(|arg| CString::new(arg.as_str()).ok())
        .collect();
    let Some(argv) = argv else {
        eprintln!("{}: argument contains an interior NUL byte", program);
        exit_child(1);
    };

    // execvp searches PATH and only returns on failure.
    match nix::unistd::execvp(&argv[0], &argv) {
        Ok(infallible) => match infallible {},
        Err(e) => {
            eprintln!(
                "{}: {}",
                program,
                io::Error::from_raw_os_error(e as i32)
            );
            exit_child(1)
        }
    }
}

/// Exit without running the parent's atexit machinery or flushing buffers
/// the child inherited.
fn exit_child(code: i32) -> ! {
    // SAFETY: _exit is always safe to call; it does not return.
    unsafe { libc::_exit(code) }
}
