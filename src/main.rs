//! sitevault CLI entry point
//!
//! Parses arguments, dispatches to a command, prints the error object and
//! exits non-zero on failure. All logic lives in the CLI module.

use sitevault::cli;

fn main() {
    if let Err(e) = cli::run() {
        if cli::write_error(&e).is_err() {
            eprintln!("{}", e);
        }
        std::process::exit(1);
    }
}
