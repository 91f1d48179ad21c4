mod args;
mod commands;
mod repl;

pub use args::{CliArgs, CliCommand};
pub use repl::{AppState, run_repl};
