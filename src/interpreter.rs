//! The execution coordinator and the read-eval loop around it.

use nix::errno::Errno;
use nix::sys::wait::waitpid;
use nix::unistd::Pid;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::command::Pipeline;
use crate::error::{ExecError, Result};
use crate::fd::{self, STDERR_FD, STDIN_FD, STDOUT_FD, SavedStdio};
use crate::lexer::split_into_tokens;
use crate::parser::parse_pipeline;
use crate::{builtin, launch, reaper, redirect};

/// Interpreter state: everything the engine needs beyond the pipeline it is
/// currently executing. Deliberately a value, not process-wide statics, so
/// independent instances can coexist (the one exception is the
/// prompt-suppression flag, which signal context forces to be atomic and
/// static — see [`crate::reaper`]).
pub struct Interpreter {
    interactive: bool,
    quiet: bool,
}

impl Interpreter {
    pub fn new(quiet: bool) -> Self {
        Self {
            interactive: fd::is_tty(STDIN_FD),
            quiet,
        }
    }

    /// Execute one pipeline to completion (or to dispatch, when
    /// backgrounded).
    ///
    /// A returned [`ExecError::Command`] is a user error: the pipeline was
    /// aborted but the interpreter state is intact and the caller should
    /// report and continue. [`ExecError::Resource`] means the descriptor
    /// plumbing failed and the interpreter must terminate after reporting.
    pub fn execute(&mut self, pipeline: Pipeline) -> Result<()> {
        // An empty pipeline touches nothing: no descriptors, no processes.
        if pipeline.is_empty() {
            return Ok(());
        }

        let saved = SavedStdio::capture()?;
        let outcome = match self.dispatch_stages(&pipeline, &saved) {
            Ok(last_pid) => {
                saved.restore()?;
                if pipeline.background {
                    // Completion is reported later, asynchronously, by the
                    // reaper.
                    Ok(())
                } else {
                    self.wait_foreground(last_pid)
                }
            }
            Err(e) => {
                // SavedStdio::drop puts the standard descriptors back.
                drop(saved);
                Err(e)
            }
        };

        if self.interactive {
            // The interrupt handler may have touched the prompt area while
            // we were waiting; consuming the flag keeps the line editor
            // from being second-guessed. Rendering belongs to it.
            let _ = reaper::take_prompt_printed();
        }
        outcome
    }

    /// The per-stage loop: remap input, resolve this stage's output (file
    /// sinks for the last stage, a fresh pipe otherwise), then run the verb
    /// in-process if it is a builtin or fork for it if not.
    ///
    /// Returns the pid of the most recently spawned process, the engine's
    /// only synchronous-wait target. When the final stage is a builtin this
    /// is an earlier stage's pid; when no stage forked at all it is `None`
    /// and the wait step is skipped.
    fn dispatch_stages(
        &mut self,
        pipeline: &Pipeline,
        saved: &SavedStdio,
    ) -> Result<Option<Pid>> {
        let mut input = Some(redirect::initial_input(pipeline, saved)?);
        let mut last_pid = None;
        let stage_count = pipeline.stages.len();

        for (index, stage) in pipeline.stages.iter().enumerate() {
            if let Some(fd) = input.take() {
                fd::bind(fd, STDIN_FD)?;
            }

            if index + 1 == stage_count {
                // The pipeline's ends are the only places files appear.
                let out = redirect::final_output(pipeline, saved)?;
                let err = redirect::final_error(pipeline, saved)?;
                fd::bind(err, STDERR_FD)?;
                fd::bind(out, STDOUT_FD)?;
            } else {
                let (read_end, write_end) = fd::pipe()?;
                fd::bind(write_end, STDOUT_FD)?;
                input = Some(read_end);
            }

            match stage.verb() {
                Some(verb) if builtin::is_builtin(verb) => {
                    // Builtins run synchronously in place, after the same
                    // descriptor remap as everyone else. Their errors never
                    // abort the pipeline.
                    if let Err(e) = builtin::run(stage) {
                        eprintln!("{}", e);
                    }
                }
                _ => last_pid = Some(launch::spawn_stage(stage, saved)?),
            }
        }
        Ok(last_pid)
    }

    /// Block on the last-recorded pid. `ECHILD` means the asynchronous
    /// reaper won the race and is silently fine; anything else is fatal.
    fn wait_foreground(&self, last_pid: Option<Pid>) -> Result<()> {
        let Some(pid) = last_pid else {
            // Entirely-builtin pipeline: nothing was spawned, nothing to
            // wait for.
            return Ok(());
        };
        match waitpid(pid, None) {
            Ok(_) => Ok(()),
            Err(Errno::ECHILD) => Ok(()),
            Err(e) => Err(ExecError::os("waitpid", e)),
        }
    }

    /// Tokenize, parse and execute one line. Lexical, syntactic and user
    /// errors are reported here and the interpreter moves on; only resource
    /// errors propagate.
    pub fn run_line(&mut self, line: &str) -> Result<()> {
        let tokens = match split_into_tokens(line) {
            Ok(tokens) => tokens,
            Err(e) => {
                eprintln!("syntax error: {}", e);
                return Ok(());
            }
        };
        let pipeline = match parse_pipeline(&tokens) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                eprintln!("syntax error: {}", e);
                return Ok(());
            }
        };
        match self.execute(pipeline) {
            Err(e) if !e.is_fatal() => {
                eprintln!("{}", e);
                Ok(())
            }
            other => other,
        }
    }

    /// The interactive loop. Returns when stdin is exhausted; a resource
    /// error propagates out for the binary to report and exit non-zero.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new()?;
        let prompt = if self.interactive && !self.quiet {
            "rshell> "
        } else {
            ""
        };

        loop {
            match rl.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = rl.add_history_entry(line.as_str());
                    }
                    self.run_line(&line)?;
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Sink, Stage};
    use crate::testutil::lock_process_state;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    fn stage(words: &[&str]) -> Stage {
        Stage::new(words.iter().map(|w| w.to_string()).collect())
    }

    fn scratch(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rshell_interp_{}_{}", std::process::id(), tag))
    }

    #[test]
    fn empty_pipeline_is_a_noop() {
        let mut sh = Interpreter::new(true);
        sh.execute(Pipeline::new()).unwrap();
    }

    #[test]
    fn single_stage_output_redirection() {
        let _lock = lock_process_state();
        let path = scratch("single");
        let mut p = Pipeline::new();
        p.push_stage(stage(&["echo", "hello"]));
        p.output_sink = Some(Sink::new(&path, false));

        Interpreter::new(true).execute(p).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn pipe_carries_stage_output_to_the_next_stage() {
        let _lock = lock_process_state();
        let path = scratch("pipe");
        let mut p = Pipeline::new();
        p.push_stage(stage(&["echo", "one two"]));
        p.push_stage(stage(&["cat"]));
        p.push_stage(stage(&["cat"]));
        p.output_sink = Some(Sink::new(&path, false));

        Interpreter::new(true).execute(p).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "one two\n");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn append_mode_concatenates_runs() {
        let _lock = lock_process_state();
        let path = scratch("append");
        let _ = fs::remove_file(&path);
        for run in ["first", "second"] {
            let mut p = Pipeline::new();
            p.push_stage(stage(&["echo", run]));
            p.output_sink = Some(Sink::new(&path, true));
            Interpreter::new(true).execute(p).unwrap();
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");

        // Truncate mode replaces instead.
        let mut p = Pipeline::new();
        p.push_stage(stage(&["echo", "third"]));
        p.output_sink = Some(Sink::new(&path, false));
        Interpreter::new(true).execute(p).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "third\n");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn input_redirection_feeds_stage_zero() {
        let _lock = lock_process_state();
        let input = scratch("in_src");
        let output = scratch("in_dst");
        fs::write(&input, "redirected input\n").unwrap();

        let mut p = Pipeline::new();
        p.push_stage(stage(&["cat"]));
        p.input_source = Some(input.clone());
        p.output_sink = Some(Sink::new(&output, false));
        Interpreter::new(true).execute(p).unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "redirected input\n");
        fs::remove_file(&input).unwrap();
        fs::remove_file(&output).unwrap();
    }

    #[test]
    fn missing_input_file_aborts_without_killing_the_interpreter() {
        let _lock = lock_process_state();
        let mut p = Pipeline::new();
        p.push_stage(stage(&["cat"]));
        p.input_source = Some(PathBuf::from("/no/such/rshell/file"));

        let err = Interpreter::new(true).execute(p).unwrap_err();
        assert!(!err.is_fatal());

        // The interpreter's descriptors were restored; it can run again.
        let path = scratch("after_abort");
        let mut p = Pipeline::new();
        p.push_stage(stage(&["echo", "still alive"]));
        p.output_sink = Some(Sink::new(&path, false));
        Interpreter::new(true).execute(p).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "still alive\n");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unknown_program_leaves_the_interpreter_alive() {
        let _lock = lock_process_state();
        // The exec failure happens inside the child; execute itself
        // succeeds and the foreground wait collects the dead child.
        let mut p = Pipeline::new();
        p.push_stage(stage(&["rshell_definitely_missing_cmd"]));
        Interpreter::new(true).execute(p).unwrap();
    }

    #[test]
    fn printenv_lists_the_environment_through_redirection() {
        let _lock = lock_process_state();
        let path = scratch("printenv");

        let mut p = Pipeline::new();
        p.push_stage(stage(&["setenv", "RSHELL_PRINTENV_PROBE", "present"]));
        Interpreter::new(true).execute(p).unwrap();

        let mut p = Pipeline::new();
        p.push_stage(stage(&["printenv"]));
        p.output_sink = Some(Sink::new(&path, false));
        Interpreter::new(true).execute(p).unwrap();

        let listing = fs::read_to_string(&path).unwrap();
        assert!(
            listing
                .lines()
                .any(|l| l == "RSHELL_PRINTENV_PROBE=present")
        );

        let mut p = Pipeline::new();
        p.push_stage(stage(&["unsetenv", "RSHELL_PRINTENV_PROBE"]));
        Interpreter::new(true).execute(p).unwrap();
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn builtin_only_pipeline_skips_the_wait() {
        let _lock = lock_process_state();
        let mut p = Pipeline::new();
        p.push_stage(stage(&["setenv", "RSHELL_WAIT_SKIP", "1"]));
        Interpreter::new(true).execute(p).unwrap();
        assert_eq!(std::env::var("RSHELL_WAIT_SKIP").as_deref(), Ok("1"));

        let mut p = Pipeline::new();
        p.push_stage(stage(&["unsetenv", "RSHELL_WAIT_SKIP"]));
        Interpreter::new(true).execute(p).unwrap();
    }

    #[test]
    fn backgrounded_pipeline_returns_immediately() {
        let _lock = lock_process_state();
        let mut p = Pipeline::new();
        p.push_stage(stage(&["sleep", "2"]));
        p.background = true;

        let started = Instant::now();
        Interpreter::new(true).execute(p).unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn run_line_reports_syntax_errors_and_continues() {
        let _lock = lock_process_state();
        let mut sh = Interpreter::new(true);
        sh.run_line("echo 'unterminated").unwrap();
        sh.run_line("| nothing").unwrap();
        sh.run_line("").unwrap();
    }

    #[test]
    fn run_line_executes_a_full_pipeline() {
        let _lock = lock_process_state();
        let path = scratch("run_line");
        let mut sh = Interpreter::new(true);
        sh.run_line(&format!("echo alpha beta | cat > {}", path.display()))
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "alpha beta\n");
        fs::remove_file(&path).unwrap();
    }
}
