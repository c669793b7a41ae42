//! CLI subcommand implementations.

pub mod connect;
pub mod send;
pub mod token;
