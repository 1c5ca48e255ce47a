//! Note time tracker CLI library.
//!
//! This crate provides the `nt` command-line interface over a markdown vault.

mod cli;
pub mod commands;
mod config;

pub use cli::{BlockRef, Cli, Commands};
pub use config::Config;
