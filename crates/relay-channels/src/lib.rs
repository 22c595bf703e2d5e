//! Channel implementations for relay.

pub mod cli;

pub use cli::CliChannel;
