//! CLI module for tasksmith - command-line interface and console output.

pub mod commands;
pub mod console;

pub use commands::Cli;
pub use console::ConsoleObserver;
