//! Subprocess lifecycle shared by every scanner.

use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use hostsweep_core::{ScanConfig, ScanResult, ScanStatus};
use hostsweep_tools::{install_hint, ToolManager};

use crate::parser::decode_text;
use crate::Scanner;

/// Collision suffixes tried before giving up on a staging directory
const MAX_STAGE_ATTEMPTS: u32 = 1000;

/// Directory name for a step started at `at` (`YYYYmmdd_HHMMSS`)
#[must_use]
pub fn stage_dir_name(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Run one scan step through its full lifecycle.
///
/// Never returns an error: every failure is folded into the returned
/// [`ScanResult`] as `Skipped`, `Failed` or `TimedOut`.
pub async fn run_scan(scanner: &dyn Scanner, tools: &ToolManager, config: &ScanConfig) -> ScanResult {
    let tool = scanner.tool_name();
    let mut result = ScanResult::start(config);

    let exe = match tools.check_tool(tool) {
        Ok(info) if info.installed => match info.path {
            Some(path) => path,
            None => return skipped(result, format!("{} is not installed.", info.display_name)),
        },
        Ok(info) => {
            let message = format!(
                "{} ({}) is not installed. {}",
                info.display_name,
                info.exe_name,
                install_hint(&info)
            );
            return skipped(result, message);
        }
        Err(e) => return skipped(result, e.to_string()),
    };

    let staged = config
        .output_dir
        .join(tool)
        .join(stage_dir_name(result.started_at));

    if config.dry_run {
        match scanner.build_command(&exe, config, &staged) {
            Ok(command) => {
                info!(tool = %tool, command = %command, "Dry run");
                result.stdout = format!("[DRY RUN] Would execute: {command}");
                result.finish(ScanStatus::Completed);
            }
            Err(e) => result.fail(ScanStatus::Failed, format!("Failed to build command: {e}")),
        }
        return result;
    }

    let output_dir = match create_stage_dir(&staged).await {
        Ok(dir) => dir,
        Err(e) => {
            error!(tool = %tool, dir = %staged.display(), error = %e, "Failed to create output directory");
            result.fail(
                ScanStatus::Failed,
                format!("Subprocess error: cannot create {}: {e}", staged.display()),
            );
            return result;
        }
    };

    let command = match scanner.build_command(&exe, config, &output_dir) {
        Ok(command) => command,
        Err(e) => {
            let _ = tokio::fs::remove_dir(&output_dir).await;
            result.fail(ScanStatus::Failed, format!("Failed to build command: {e}"));
            return result;
        }
    };

    scanner.before_run(tools, config).await;
    result.started_at = Utc::now();

    info!(tool = %tool, command = %command, timeout = config.timeout_secs, "Starting scan");

    let mut child = match Command::new(&command.program)
        .args(&command.args)
        .envs(&config.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            error!(tool = %tool, error = %e, "Failed to spawn");
            result.fail(ScanStatus::Failed, format!("Subprocess error: {e}"));
            return result;
        }
    };

    let mut stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let mut stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    // The exit and both pipes share one budget: a background process the
    // tool started can hold the pipes open after the tool itself exits.
    let collected = tokio::time::timeout(Duration::from_secs(config.timeout_secs), async {
        let status = child.wait().await?;
        let stdout = (&mut stdout_task).await.unwrap_or_default();
        let stderr = (&mut stderr_task).await.unwrap_or_default();
        Ok::<_, std::io::Error>((status, stdout, stderr))
    })
    .await;

    let (status, stdout, stderr) = match collected {
        Ok(Ok(collected)) => collected,
        Ok(Err(e)) => {
            stdout_task.abort();
            stderr_task.abort();
            result.fail(ScanStatus::Failed, format!("Subprocess error: {e}"));
            return result;
        }
        Err(_) => {
            if let Err(e) = child.start_kill() {
                debug!(tool = %tool, error = %e, "Process already exited");
            }
            stdout_task.abort();
            stderr_task.abort();
            let _ = child.wait().await;
            warn!(tool = %tool, timeout = config.timeout_secs, "Scan timed out");
            result.fail(
                ScanStatus::TimedOut,
                format!("{tool} timed out after {}s", config.timeout_secs),
            );
            return result;
        }
    };

    result.stdout = decode_text(&stdout);
    result.stderr = decode_text(&stderr);
    result.return_code = status.code();
    result.output_files = collect_output_files(&output_dir);
    persist_streams(&output_dir, &result).await;

    match scanner.parse_output(&result) {
        Ok(findings) => result.findings = findings,
        Err(e) => {
            error!(tool = %tool, error = %e, "Failed to parse output");
            result.parse_error = Some(e.to_string());
        }
    }

    match result.return_code {
        Some(0) => result.finish(ScanStatus::Completed),
        Some(code) if scanner.is_success_return_code(code) => result.finish(ScanStatus::Completed),
        Some(code) => result.fail(ScanStatus::Failed, format!("{tool} exited with code {code}")),
        None => result.fail(ScanStatus::Failed, format!("{tool} was terminated by a signal")),
    }

    info!(
        tool = %tool,
        status = %result.status,
        findings = result.findings_count(),
        duration = result.duration_secs.unwrap_or_default(),
        "Scan finished"
    );
    result
}

fn skipped(mut result: ScanResult, message: String) -> ScanResult {
    warn!(tool = %result.tool_name, "{message}");
    result.fail(ScanStatus::Skipped, message);
    result
}

/// Create `base`, or `base_1`, `base_2`, ... if it is taken
async fn create_stage_dir(base: &Path) -> std::io::Result<PathBuf> {
    if let Some(parent) = base.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    for attempt in 0..MAX_STAGE_ATTEMPTS {
        let candidate = if attempt == 0 {
            base.to_path_buf()
        } else {
            base.with_file_name(format!("{name}_{attempt}"))
        };
        match tokio::fs::create_dir(&candidate).await {
            Ok(()) => {
                debug!(dir = %candidate.display(), "Staged output directory");
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free directory name for {}", base.display()),
    ))
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buf).await {
            debug!(error = %e, "Output stream closed early");
        }
    }
    buf
}

fn collect_output_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect()
}

async fn persist_streams(dir: &Path, result: &ScanResult) {
    for (name, text) in [("stdout.txt", &result.stdout), ("stderr.txt", &result.stderr)] {
        let path = dir.join(name);
        if let Err(e) = tokio::fs::write(&path, text.as_bytes()).await {
            warn!(path = %path.display(), error = %e, "Failed to save captured output");
        }
    }
}
