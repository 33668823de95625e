//! Tokenization of one command line.
//!
//! The grammar is the classic pipeline one: words, `|`, the redirection
//! operators (`<`, `>`, `>>`, `2>`, `2>>`, `>&`, `>>&`) and a trailing `&`.
//! Single quotes take everything literally, double quotes and bare words
//! honor backslash escapes, and adjacent quoted/unquoted pieces concatenate
//! into one word.

/// One token of a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word: program name, argument, or redirection target.
    Word(String),
    /// `|`: connect adjacent stages with a pipe.
    Pipe,
    /// `&`: run the pipeline in the background.
    Background,
    /// `<`: redirect the pipeline's input.
    RedirectIn,
    /// `>`: redirect the final stage's output, truncating.
    RedirectOut,
    /// `>>`: redirect the final stage's output, appending.
    RedirectOutAppend,
    /// `2>`: redirect the final stage's error stream, truncating.
    RedirectErr,
    /// `2>>`: redirect the final stage's error stream, appending.
    RedirectErrAppend,
    /// `>&`: redirect both output and error to one file, truncating.
    RedirectBoth,
    /// `>>&`: redirect both output and error to one file, appending.
    RedirectBothAppend,
}

/// Errors that can occur while tokenizing.
#[derive(Debug, PartialEq, Eq)]
pub enum LexingError {
    /// A closing single or double quote was not found.
    UnfinishedQuote,
}

impl std::fmt::Display for LexingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexingError::UnfinishedQuote => write!(f, "unterminated quote"),
        }
    }
}

impl std::error::Error for LexingError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
    /// True once the current word has begun, so an empty quoted string
    /// still yields a (empty) word token.
    in_word: bool,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            buffer: String::new(),
            in_word: false,
        }
    }

    fn make_tokens(&mut self) -> Result<Vec<Token>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch, &mut out),
                LexingState::ReadingWord => self.handle_word(ch, &mut out),
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch),
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote | LexingState::ReadingDoubleQuote => {
                return Err(LexingError::UnfinishedQuote);
            }
            _ => {}
        }
        self.flush_word(&mut out);

        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn flush_word(&mut self, out: &mut Vec<Token>) {
        if self.in_word {
            out.push(Token::Word(std::mem::take(&mut self.buffer)));
            self.in_word = false;
        }
    }

    /// Consume the `>`-family operator whose leading `>` was just read.
    fn read_out_redirect(&mut self) -> Token {
        let append = if self.peek_char() == Some('>') {
            self.read_char();
            true
        } else {
            false
        };
        let both = if self.peek_char() == Some('&') {
            self.read_char();
            true
        } else {
            false
        };
        match (append, both) {
            (false, false) => Token::RedirectOut,
            (true, false) => Token::RedirectOutAppend,
            (false, true) => Token::RedirectBoth,
            (true, true) => Token::RedirectBothAppend,
        }
    }

    fn handle_start(&mut self, ch: char, out: &mut Vec<Token>) {
        match ch {
            ' ' | '\t' => {}
            '|' => out.push(Token::Pipe),
            '&' => out.push(Token::Background),
            '<' => out.push(Token::RedirectIn),
            '>' => {
                let token = self.read_out_redirect();
                out.push(token);
            }
            // `2>`/`2>>` are only operators when the 2 starts a token.
            '2' if self.peek_char() == Some('>') => {
                self.read_char();
                let token = if self.peek_char() == Some('>') {
                    self.read_char();
                    Token::RedirectErrAppend
                } else {
                    Token::RedirectErr
                };
                out.push(token);
            }
            '\'' => {
                self.in_word = true;
                self.state = LexingState::ReadingSingleQuote;
            }
            '"' => {
                self.in_word = true;
                self.state = LexingState::ReadingDoubleQuote;
            }
            '\\' => {
                if let Some(escaped) = self.read_char() {
                    self.buffer.push(escaped);
                }
                self.in_word = true;
                self.state = LexingState::ReadingWord;
            }
            c => {
                self.buffer.push(c);
                self.in_word = true;
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<Token>) {
        match ch {
            ' ' | '\t' => {
                self.flush_word(out);
                self.state = LexingState::Start;
            }
            '|' | '&' | '<' | '>' => {
                self.flush_word(out);
                out.push(match ch {
                    '|' => Token::Pipe,
                    '&' => Token::Background,
                    '<' => Token::RedirectIn,
                    '>' => self.read_out_redirect(),
                    _ => unreachable!(),
                });
                self.state = LexingState::Start;
            }
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            '\\' => {
                if let Some(escaped) = self.read_char() {
                    self.buffer.push(escaped);
                }
            }
            c => self.buffer.push(c),
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' => {
                if let Some(escaped) = self.read_char() {
                    self.buffer.push(escaped);
                }
            }
            c => self.buffer.push(c),
        }
    }
}

/// Tokenize one command line.
pub fn split_into_tokens(line: &str) -> Result<Vec<Token>, LexingError> {
    LexingFSM::new(line).make_tokens()
}
