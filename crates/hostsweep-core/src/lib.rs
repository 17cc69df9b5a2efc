//! Core types and errors for the hostsweep scan orchestrator.
//!
//! This crate provides the foundational types shared by every hostsweep crate:
//!
//! - **Types**: tool metadata, scan requests, normalized findings, and
//!   per-step / per-pipeline results
//! - **Errors**: one error taxonomy, [`SweepError`], for the whole workspace
//!
//! # Example
//!
//! ```rust,ignore
//! use hostsweep_core::{Finding, ScanResult, Severity};
//!
//! fn worst(result: &ScanResult) -> Option<Severity> {
//!     result.findings.iter().map(|f| f.severity).max()
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/hostsweep-core/0.3.0")]

mod error;
pub mod types;

pub use error::{Result, SweepError};
pub use types::*;
