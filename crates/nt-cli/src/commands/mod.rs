//! CLI subcommand implementations.

pub mod list;
pub mod report;
pub mod show;
pub mod status;
pub mod stop_all;
pub mod track;
pub mod util;
