//! hostsweep - host security sweeps from the command line

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    hostsweep_cli::run().await
}
