//! Command-line surface: top-level arguments and per-unit tag flags

pub mod args;
pub mod job_args;

pub use args::{Cli, Commands};
pub use job_args::{banner, command_for, help_for, parse_job};
