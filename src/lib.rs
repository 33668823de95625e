//! A small Unix shell built around a classic pipeline execution engine.
//!
//! The crate turns a command line into a [`Pipeline`] (a chain of stages
//! joined by anonymous pipes, with optional file redirections at the ends)
//! and executes it with the traditional fork/dup2/execvp dance: the
//! interpreter's own standard descriptors are saved, rewired per stage, and
//! restored afterwards. Terminated children that nobody waits on are
//! reclaimed asynchronously by a SIGCHLD handler.
//!
//! The main entry point is [`Interpreter`], which owns the read-eval loop
//! and the per-pipeline coordinator. The public modules expose the pieces
//! in between: [`lexer`] and [`parser`] build pipelines from text,
//! [`command`] holds the data model, and [`expand`] performs wildcard
//! expansion of argument words.

pub mod builtin;
pub mod command;
pub mod error;
pub mod expand;
pub mod fd;
mod interpreter;
mod launch;
pub mod lexer;
pub mod parser;
pub mod reaper;
mod redirect;

pub use command::{Pipeline, Sink, Stage};
pub use error::{ExecError, Result};
pub use interpreter::Interpreter;

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::{Mutex, MutexGuard, OnceLock};

    /// Serializes tests that touch process-wide state: the standard
    /// descriptors, the environment and the working directory. A test that
    /// panics while holding the lock poisons it; later tests just take the
    /// guard anyway since the state it protects is re-established by each
    /// test's own setup.
    pub fn lock_process_state() -> MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}
