//! Scan configuration, merged from built-in defaults, an optional TOML file, `--set`
//! overrides and command-line flags (in increasing precedence).

pub mod builder;
mod defaults;
mod file;
mod models;
