//! Command Line Interface for the pike binary.

pub mod args;
pub mod commands;
pub mod output;

pub use args::PikeArgs;
pub use commands::execute_command;
