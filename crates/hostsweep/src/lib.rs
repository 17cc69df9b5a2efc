//! Host security sweeps driven by external command-line scanners.
//!
//! hostsweep locates (or downloads) tools such as ClamAV, YARA-X,
//! HollowsHunter, Hayabusa, Chainsaw and the Sysinternals suite, runs them as
//! ordered pipelines, and normalizes everything they report into
//! [`Finding`]s with a common severity scale.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hostsweep::{ScanPipeline, SweepConfig, ToolManager};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SweepConfig::default();
//!     let tools = Arc::new(ToolManager::new(&config));
//!
//!     for (name, info) in tools.check_all_tools() {
//!         println!("{name}: installed={}", info.installed);
//!     }
//!
//!     let pipeline = ScanPipeline::new(tools, &config);
//!     let result = pipeline
//!         .run_pipeline(&ScanPipeline::daily_pipeline("C:\\Users", &config.output_dir))
//!         .await;
//!
//!     println!(
//!         "{}: {} findings ({} critical)",
//!         result.status,
//!         result.total_findings(),
//!         result.critical_findings()
//!     );
//! }
//! ```
//!
//! # Features
//!
//! - `default` - Uses rustls for release downloads
//! - `rustls` - Use rustls for TLS (recommended)
//! - `native-tls` - Use system native TLS

#![doc(html_root_url = "https://docs.rs/hostsweep/0.3.0")]

// Re-export core types
pub use hostsweep_core::*;

// Re-export tool management
pub use hostsweep_tools::{
    catalog, hash, install_hint, ReleaseClient, ReleaseClientBuilder, SweepConfig, ToolManager,
    ToolManagerBuilder, ToolOverride,
};

// Re-export scan execution
pub use hostsweep_scan::{
    monitor, parser, run_scan, scanners, CommandLine, FindingsQuery, PipelineSummary,
    ScanPipeline, Scanner, StepSummary, SysmonManager, SysmonStatus, ToolAvailability,
    ToolStatus,
};

// Re-export runtime for convenience
pub use serde;
pub use serde_json;
pub use tokio;
