//! Builtin verbs executed inside the interpreter's own process.
//!
//! `setenv`, `unsetenv` and `cd` mutate interpreter-global state (the
//! process environment and working directory), which is why they must not
//! spawn a child: the mutation has to be visible to the interpreter itself
//! and to every subsequently created process.
//!
//! `printenv` is deliberately *not* here: it is recognized only after the
//! decision to fork has been made and runs inside the fresh child (see
//! [`crate::launch`]), so it participates in pipe and redirection plumbing
//! like any external program.

use std::env;
use std::path::PathBuf;

use crate::command::Stage;
use crate::error::{ExecError, Result};

/// A classified builtin invocation, ready to run.
#[derive(Debug, PartialEq, Eq)]
pub enum Builtin {
    Setenv { name: String, value: String },
    Unsetenv { name: String },
    Cd { target: Option<String> },
}

/// Whether `verb` must run inside the interpreter process.
pub fn is_builtin(verb: &str) -> bool {
    matches!(verb, "setenv" | "unsetenv" | "cd")
}

impl Builtin {
    /// Parse a stage already classified by [`is_builtin`]. Argument-count
    /// violations are user errors: reported, no mutation performed.
    pub fn parse(stage: &Stage) -> Result<Self> {
        let argv = &stage.argv;
        match argv.first().map(String::as_str) {
            Some("setenv") => match argv.len() {
                3 => Ok(Builtin::Setenv {
                    name: argv[1].clone(),
                    value: argv[2].clone(),
                }),
                n if n > 3 => Err(ExecError::command("setenv: too many arguments")),
                _ => Err(ExecError::command("setenv: too few arguments")),
            },
            Some("unsetenv") => match argv.len() {
                2 => Ok(Builtin::Unsetenv {
                    name: argv[1].clone(),
                }),
                n if n > 2 => Err(ExecError::command("unsetenv: too many arguments")),
                _ => Err(ExecError::command("unsetenv: too few arguments")),
            },
            Some("cd") => match argv.len() {
                1 => Ok(Builtin::Cd { target: None }),
                2 => Ok(Builtin::Cd {
                    target: Some(argv[1].clone()),
                }),
                _ => Err(ExecError::command("cd: too many arguments")),
            },
            _ => Err(ExecError::command(format!(
                "{}: not a builtin",
                stage.verb().unwrap_or("")
            ))),
        }
    }

    /// Execute the builtin. Errors are user errors; they never terminate
    /// the interpreter.
    pub fn run(self) -> Result<()> {
        match self {
            Builtin::Setenv { name, value } => {
                // SAFETY: the interpreter is single-threaded; no other
                // thread reads the environment concurrently. The
                // environment owns the installed string for the remainder
                // of the process.
                unsafe { env::set_var(&name, &value) };
                Ok(())
            }
            Builtin::Unsetenv { name } => {
                // SAFETY: as above.
                unsafe { env::remove_var(&name) };
                Ok(())
            }
            Builtin::Cd { target } => {
                let dir = match target {
                    Some(dir) => PathBuf::from(dir),
                    None => match env::var("HOME") {
                        Ok(home) => PathBuf::from(home),
                        Err(_) => return Err(ExecError::command("cd: HOME not set")),
                    },
                };
                env::set_current_dir(&dir).map_err(|_| {
                    ExecError::command(format!("cd: can't cd to {}", dir.display()))
                })
            }
        }
    }
}

/// Parse and execute a builtin stage in one step.
pub fn run(stage: &Stage) -> Result<()> {
    Builtin::parse(stage)?.run()
}
