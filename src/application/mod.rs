//! Use-cases driven by the command line, layered over the page cache store.

pub mod commands;
pub mod error;
