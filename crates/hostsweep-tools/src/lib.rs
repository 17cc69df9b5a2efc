//! Tool registry and acquisition for hostsweep.
//!
//! [`ToolManager`] knows every external scanner binary hostsweep can drive,
//! finds it on disk, checks its pinned hash, and fetches release builds from
//! the upstream repository when asked to.

#![doc(html_root_url = "https://docs.rs/hostsweep-tools/0.3.0")]

mod archive;
pub mod catalog;
mod config;
pub mod hash;
mod manager;
mod release;

pub use config::{SweepConfig, ToolOverride};
pub use hostsweep_core::{Result, SweepError};
pub use manager::{install_hint, ToolManager, ToolManagerBuilder};
pub use release::{find_matching_asset, Release, ReleaseAsset, ReleaseClient, ReleaseClientBuilder};
