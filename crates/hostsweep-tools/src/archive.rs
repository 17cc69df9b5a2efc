//! Release archive extraction and executable renaming.
//!
//! Everything here is blocking; callers run it on `spawn_blocking`.

use glob::Pattern;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use hostsweep_core::{Result, SweepError};

/// Extract `archive` into `dest`, returning the files written.
///
/// Entries whose names would escape `dest` are skipped.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let file = fs::File::open(archive).map_err(|e| SweepError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(io::BufReader::new(file))
        .map_err(|e| SweepError::Download(format!("{}: {e}", archive.display())))?;

    let mut written = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| SweepError::Download(format!("{}: {e}", archive.display())))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "Skipping archive entry outside destination");
            continue;
        };
        let outpath = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath).map_err(|e| SweepError::io(&outpath, e))?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent).map_err(|e| SweepError::io(parent, e))?;
        }
        let mut outfile = fs::File::create(&outpath).map_err(|e| SweepError::io(&outpath, e))?;
        io::copy(&mut entry, &mut outfile).map_err(|e| SweepError::io(&outpath, e))?;
        written.push(outpath);
    }

    debug!(archive = %archive.display(), files = written.len(), "Extracted archive");
    Ok(written)
}

/// Sorted walk of every regular file under `dir`
pub fn files_under(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
}

/// Rename a versioned executable (e.g. `hayabusa-2.17.0-win-x64.exe`) to the
/// canonical `exe_name` when the canonical file is not present anywhere under
/// `dir`. Returns the canonical path if one exists afterwards.
pub fn fixup_exe_name(dir: &Path, exe_name: &str) -> Option<PathBuf> {
    if let Some(existing) = files_under(dir).find(|p| p.file_name().is_some_and(|n| n == exe_name))
    {
        return Some(existing);
    }

    let (base, ext) = match exe_name.rsplit_once('.') {
        Some((base, ext)) => (base, format!(".{ext}")),
        None => (exe_name, String::new()),
    };
    let pattern = Pattern::new(&format!("{}*{ext}", Pattern::escape(base))).ok()?;

    let candidate = files_under(dir).find(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| pattern.matches(n))
    })?;

    let target = candidate.with_file_name(exe_name);
    match fs::rename(&candidate, &target) {
        Ok(()) => {
            debug!(from = %candidate.display(), to = %target.display(), "Renamed executable");
            Some(target)
        }
        Err(e) => {
            warn!(path = %candidate.display(), error = %e, "Failed to rename executable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extract_nested_entries() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("tool.zip");
        write_zip(
            &archive,
            &[("yr.exe", b"MZ"), ("docs/README.md", b"# yara-x")],
        );

        let dest = dir.path().join("out");
        let files = extract_zip(&archive, &dest).unwrap();
        assert_eq!(files.len(), 2);
        assert!(dest.join("yr.exe").is_file());
        assert!(dest.join("docs").join("README.md").is_file());
    }

    #[test]
    fn test_extract_skips_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        write_zip(&archive, &[("../escape.exe", b"MZ"), ("ok.exe", b"MZ")]);

        let dest = dir.path().join("out");
        let files = extract_zip(&archive, &dest).unwrap();
        assert_eq!(files, vec![dest.join("ok.exe")]);
        assert!(!dir.path().join("escape.exe").exists());
    }

    #[test]
    fn test_extract_rejects_non_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"not a zip").unwrap();
        assert!(matches!(
            extract_zip(&archive, dir.path()),
            Err(SweepError::Download(_))
        ));
    }

    #[test]
    fn test_fixup_renames_versioned_exe() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("hayabusa-2.17.0");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("hayabusa-2.17.0-win-x64.exe"), b"MZ").unwrap();

        let path = fixup_exe_name(dir.path(), "hayabusa.exe").unwrap();
        assert_eq!(path, nested.join("hayabusa.exe"));
        assert!(path.is_file());
        assert!(!nested.join("hayabusa-2.17.0-win-x64.exe").exists());
    }

    #[test]
    fn test_fixup_keeps_canonical() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("chainsaw.exe"), b"MZ").unwrap();
        fs::write(dir.path().join("chainsaw-old.exe"), b"MZ").unwrap();

        let path = fixup_exe_name(dir.path(), "chainsaw.exe").unwrap();
        assert_eq!(path, dir.path().join("chainsaw.exe"));
        assert!(dir.path().join("chainsaw-old.exe").exists());
    }

    #[test]
    fn test_fixup_no_candidate() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.txt"), b"").unwrap();
        assert!(fixup_exe_name(dir.path(), "yr.exe").is_none());
    }
}
