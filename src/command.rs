use std::path::PathBuf;

/// One program invocation within a pipeline: the verb followed by its
/// arguments, in order. `argv[0]` is the verb/program name.
///
/// A stage is built up by the parser and immutable once handed to the
/// engine; it owns its strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub argv: Vec<String>,
}

impl Stage {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    /// The verb or program name, i.e. `argv[0]`.
    ///
    /// The parser never produces a stage with an empty argv, but the engine
    /// does not rely on that.
    pub fn verb(&self) -> Option<&str> {
        self.argv.first().map(|s| s.as_str())
    }
}

/// An output or error redirection target: a file path plus whether to append
/// to it (otherwise the file is truncated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sink {
    pub path: PathBuf,
    pub append: bool,
}

impl Sink {
    pub fn new(path: impl Into<PathBuf>, append: bool) -> Self {
        Self {
            path: path.into(),
            append,
        }
    }
}

/// An ordered chain of stages whose standard streams are connected
/// end-to-end, plus redirection targets and the background flag.
///
/// Input redirection applies pipeline-wide (it feeds stage 0); output and
/// error redirection apply only to the final stage; interior stages always
/// connect through anonymous pipes. An empty pipeline (no stages) is a
/// documented no-op.
///
/// A pipeline is created by the parser, consumed exactly once by
/// [`crate::Interpreter::execute`], and dropped afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
    /// File feeding stage 0; `None` means the interpreter's current stdin.
    pub input_source: Option<PathBuf>,
    /// Sink for the final stage's stdout; `None` means the interpreter's
    /// current stdout.
    pub output_sink: Option<Sink>,
    /// Sink for the final stage's stderr; `None` means the interpreter's
    /// current stderr.
    pub error_sink: Option<Sink>,
    /// When set the engine does not block waiting for completion.
    pub background: bool,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn push_stage(&mut self, stage: Stage) {
        self.stages.push(stage);
    }
}
