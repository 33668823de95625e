//! Construction of a [`Pipeline`] from a token stream.
//!
//! Redirections may appear anywhere in the line and apply pipeline-wide
//! (input feeds stage 0, output/error sinks bind to the final stage); when
//! an operator is repeated, the last occurrence wins. A trailing `&` marks
//! the pipeline as backgrounded. Stage argument words go through wildcard
//! expansion here; redirection targets do not.

use std::path::PathBuf;

use crate::command::{Pipeline, Sink, Stage};
use crate::expand::expand_word;
use crate::lexer::Token;

/// Errors that can occur while assembling a pipeline.
#[derive(Debug, PartialEq, Eq)]
pub enum ParsingError {
    /// A pipe with no command on one side of it.
    MissingCommand,
    /// A redirection operator with no file name after it.
    MissingRedirectTarget(&'static str),
    /// Tokens after the background `&`.
    TokenAfterBackground,
}

impl std::fmt::Display for ParsingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParsingError::MissingCommand => write!(f, "missing command"),
            ParsingError::MissingRedirectTarget(op) => {
                write!(f, "missing file name after `{}`", op)
            }
            ParsingError::TokenAfterBackground => write!(f, "`&` must end the line"),
        }
    }
}

impl std::error::Error for ParsingError {}

/// Assemble the token stream of one line into a pipeline. An empty stream
/// parses to the empty pipeline, which the engine treats as a no-op.
pub fn parse_pipeline(tokens: &[Token]) -> Result<Pipeline, ParsingError> {
    let mut pipeline = Pipeline::new();
    let mut argv: Vec<String> = Vec::new();
    let mut stage_required = false;

    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        if pipeline.background {
            return Err(ParsingError::TokenAfterBackground);
        }
        match token {
            Token::Word(word) => argv.extend(expand_word(word)),
            Token::Pipe => {
                if argv.is_empty() {
                    return Err(ParsingError::MissingCommand);
                }
                pipeline.push_stage(Stage::new(std::mem::take(&mut argv)));
                stage_required = true;
            }
            Token::Background => pipeline.background = true,
            Token::RedirectIn => {
                pipeline.input_source = Some(PathBuf::from(target(&mut iter, "<")?));
            }
            Token::RedirectOut => {
                pipeline.output_sink = Some(Sink::new(target(&mut iter, ">")?, false));
            }
            Token::RedirectOutAppend => {
                pipeline.output_sink = Some(Sink::new(target(&mut iter, ">>")?, true));
            }
            Token::RedirectErr => {
                pipeline.error_sink = Some(Sink::new(target(&mut iter, "2>")?, false));
            }
            Token::RedirectErrAppend => {
                pipeline.error_sink = Some(Sink::new(target(&mut iter, "2>>")?, true));
            }
            Token::RedirectBoth => {
                let file = target(&mut iter, ">&")?;
                pipeline.output_sink = Some(Sink::new(&file, false));
                pipeline.error_sink = Some(Sink::new(&file, false));
            }
            Token::RedirectBothAppend => {
                let file = target(&mut iter, ">>&")?;
                pipeline.output_sink = Some(Sink::new(&file, true));
                pipeline.error_sink = Some(Sink::new(&file, true));
            }
        }
    }

    if !argv.is_empty() {
        pipeline.push_stage(Stage::new(argv));
    } else if stage_required {
        // The line ended on a pipe.
        return Err(ParsingError::MissingCommand);
    }
    Ok(pipeline)
}

fn target<'a>(
    iter: &mut std::slice::Iter<'a, Token>,
    op: &'static str,
) -> Result<String, ParsingError> {
    match iter.next() {
        Some(Token::Word(word)) => Ok(word.clone()),
        _ => Err(ParsingError::MissingRedirectTarget(op)),
    }
}
