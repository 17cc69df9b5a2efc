//! SHA-256 pins for tool binaries.

use ring::digest::{Context, Digest, SHA256};
use std::path::Path;
use tokio::io::AsyncReadExt;

use hostsweep_core::{Result, SweepError};

const CHUNK: usize = 64 * 1024;

/// Lowercase hex SHA-256 of the file at `path`, read in 64 KiB chunks.
pub async fn sha256_file(path: &Path) -> Result<String> {
    let io_err = |e| SweepError::io(path, e);
    let mut file = tokio::fs::File::open(path).await.map_err(io_err)?;
    let mut chunk = vec![0u8; CHUNK];
    let mut context = Context::new(&SHA256);

    while let n @ 1.. = file.read(&mut chunk).await.map_err(io_err)? {
        context.update(&chunk[..n]);
    }

    Ok(to_hex(&context.finish()))
}

fn to_hex(digest: &Digest) -> String {
    hex::encode(digest.as_ref())
}

/// Compare a pinned digest with a computed one. Case and surrounding
/// whitespace are ignored, as is an optional `sha256:` prefix on the pin.
#[must_use]
pub fn digest_matches(pinned: &str, actual: &str) -> bool {
    let pinned = pinned.trim();
    let pinned = pinned
        .get(..7)
        .filter(|p| p.eq_ignore_ascii_case("sha256:"))
        .map_or(pinned, |_| &pinned[7..]);
    pinned.eq_ignore_ascii_case(actual.trim())
}
