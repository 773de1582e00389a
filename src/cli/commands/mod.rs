//! Subcommand implementations.

pub mod cache;
pub mod du;
pub mod ls;
