//! Command-line interface components
//!
//! Argument parsing and the handlers that drive each subcommand.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, GlobalArgs, IndexArgs};
pub use commands::{handle_clean, handle_harvest, handle_index};
