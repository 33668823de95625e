//! Redirection resolution: turning a pipeline's redirection fields into
//! concrete descriptors.
//!
//! Only the ends of a pipeline touch files: stage 0's input and the final
//! stage's output/error. Interior stages are always connected through
//! anonymous pipes by the coordinator, never through this module.

use std::fs::{File, OpenOptions};
use std::os::fd::OwnedFd;
use std::os::unix::fs::OpenOptionsExt;

use crate::command::{Pipeline, Sink};
use crate::error::{ExecError, Result};
use crate::fd::SavedStdio;

/// Mode bits for files created by output/error redirection.
const SINK_MODE: u32 = 0o644;

/// The input descriptor for stage 0: the redirection file opened read-only,
/// or a duplicate of the interpreter's saved stdin.
///
/// An unreadable or missing input file is a user error that aborts the whole
/// pipeline before any stage starts.
pub fn initial_input(pipeline: &Pipeline, saved: &SavedStdio) -> Result<OwnedFd> {
    match &pipeline.input_source {
        Some(path) => {
            let file = File::open(path).map_err(|e| {
                ExecError::command(format!("{}: {}", path.display(), e))
            })?;
            Ok(file.into())
        }
        None => saved.dup_stdin(),
    }
}

/// The final stage's output descriptor: the sink opened for writing
/// (created with mode 0644, truncated or appended per the sink flag), or a
/// duplicate of the interpreter's saved stdout.
pub fn final_output(pipeline: &Pipeline, saved: &SavedStdio) -> Result<OwnedFd> {
    match &pipeline.output_sink {
        Some(sink) => open_sink(sink),
        None => saved.dup_stdout(),
    }
}

/// The final stage's error descriptor; same policy as [`final_output`],
/// defaulting to the interpreter's saved stderr.
pub fn final_error(pipeline: &Pipeline, saved: &SavedStdio) -> Result<OwnedFd> {
    match &pipeline.error_sink {
        Some(sink) => open_sink(sink),
        None => saved.dup_stderr(),
    }
}

fn open_sink(sink: &Sink) -> Result<OwnedFd> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).mode(SINK_MODE);
    if sink.append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    let file = options.open(&sink.path).map_err(|e| {
        ExecError::command(format!("{}: {}", sink.path.display(), e))
    })?;
    Ok(file.into())
}
