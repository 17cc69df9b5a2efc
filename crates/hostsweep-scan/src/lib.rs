//! Scan execution for hostsweep.
//!
//! - [`Scanner`]: adapter trait pairing a tool's command line with its output grammar
//! - [`run_scan`]: the subprocess lifecycle shared by every adapter
//! - [`ScanPipeline`]: ordered multi-step sweeps with result history
//! - [`SysmonManager`]: service lifecycle for Sysmon
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hostsweep_scan::ScanPipeline;
//! use hostsweep_tools::{SweepConfig, ToolManager};
//!
//! let config = SweepConfig::default();
//! let pipeline = ScanPipeline::new(Arc::new(ToolManager::new(&config)), &config);
//! let result = pipeline
//!     .run_pipeline(&ScanPipeline::daily_pipeline("C:\\Users", &config.output_dir))
//!     .await;
//! println!("{} findings", result.total_findings());
//! ```

#![doc(html_root_url = "https://docs.rs/hostsweep-scan/0.3.0")]

mod command;
pub mod monitor;
pub mod parser;
mod pipeline;
mod runner;
mod scanner;
pub mod scanners;
mod sysmon;

pub use command::CommandLine;
pub use hostsweep_core::{Result, SweepError};
pub use monitor::{FindingsQuery, PipelineSummary, StepSummary, ToolAvailability, ToolStatus};
pub use pipeline::ScanPipeline;
pub use runner::{run_scan, stage_dir_name};
pub use scanner::Scanner;
pub use sysmon::{SysmonManager, SysmonStatus};
