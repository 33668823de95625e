use argh::FromArgs;

use rshell::{Interpreter, reaper};

#[derive(FromArgs)]
/// An interactive Unix shell with pipelines, redirections and background
/// execution.
struct Options {
    /// suppress the prompt even on a terminal
    #[argh(switch, short = 'q')]
    quiet: bool,
}

fn main() {
    let options: Options = argh::from_env();

    if let Err(e) = reaper::install() {
        eprintln!("rshell: {}", e);
        std::process::exit(1);
    }

    let mut interpreter = Interpreter::new(options.quiet);
    if let Err(e) = interpreter.repl() {
        eprintln!("rshell: {}", e);
        std::process::exit(1);
    }
}
