//! # hostsweep-cli
//!
//! Operator command-line interface for hostsweep.
//!
//! ## Features
//!
//! - **Tool management**: list, check, verify and download scanner binaries
//! - **Pipelines**: daily sweep, forensic triage, or any pipeline file
//! - **Sysmon**: install, reconfigure and remove the telemetry service
//! - **Multiple output formats**: Pretty tables, JSON, CSV, YAML

pub mod cli;
pub mod config;
pub mod output;

pub use cli::run;
