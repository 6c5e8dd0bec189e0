//! Courier.
//!
//! A command line client that issues requests through the courier request coordinator, with
//! the same response normalization, error notifications and online probing an application
//! would get.

#![warn(missing_debug_implementations, unused_crate_dependencies, clippy::all)]

mod cli;
mod console;
mod logging;

fn main() {
    match cli::execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}
