//! `hostsweep run` - execute a scan pipeline.

use anyhow::{Context as _, Result};
use colored::Colorize;
use hostsweep::{
    FindingsQuery, PipelineConfig, PipelineResult, PipelineSummary, ScanPipeline, ScanStatus,
    DEFAULT_OUTPUT_DIR,
};
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::debug;

use super::Context;
use crate::cli::args::{RunArgs, RunCommands, RunOptions};
use crate::output::{
    print_structured, severity_label, status_label, truncate, write_csv, FindingRow, OutputFormat,
};

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "Step")]
    step: usize,
    #[tabled(rename = "Tool")]
    tool: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Findings")]
    findings: usize,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Note")]
    note: String,
}

#[derive(Tabled)]
struct FindingTableRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Tool")]
    tool: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "ATT&CK")]
    mitre: String,
}

pub async fn execute(ctx: Context, args: RunArgs) -> Result<()> {
    let output_dir = args
        .options
        .output_dir
        .clone()
        .unwrap_or_else(|| ctx.config.sweep.output_dir.clone());

    let config = match &args.command {
        RunCommands::Daily { target } => ScanPipeline::daily_pipeline(target, &output_dir),
        RunCommands::Forensic { evtx } => ScanPipeline::forensic_pipeline(evtx, &output_dir),
        RunCommands::File { path } => {
            load_pipeline(path, &output_dir, args.options.output_dir.is_some())?
        }
    };
    let config = apply_options(config, &args.options);
    debug!(
        pipeline = %config.name,
        steps = config.steps.len(),
        stop_on_failure = config.stop_on_failure,
        "pipeline ready"
    );

    let pipeline = ScanPipeline::new(ctx.tool_manager(), &ctx.config.sweep);
    if ctx.output_format == OutputFormat::Pretty {
        println!(
            "Running {} ({} steps){}",
            config.name.bold(),
            config.steps.len(),
            if args.options.dry_run { " [dry run]" } else { "" }
        );
    }

    let result = pipeline.run_pipeline(&config).await;

    let mut query = FindingsQuery::default().limit(args.options.limit);
    if let Some(severity) = args.options.severity {
        query = query.severity(severity);
    }
    let findings = pipeline.findings(&query);

    if !print_structured(ctx.output_format, &result)? {
        if ctx.output_format == OutputFormat::Csv {
            let rows: Vec<FindingRow> = findings.iter().map(FindingRow::from).collect();
            write_csv(std::io::stdout().lock(), &rows)?;
        } else {
            print_pretty(&result, &findings, ctx.verbose);
        }
    }

    if result.status == ScanStatus::Failed {
        anyhow::bail!("pipeline '{}' stopped after a failed step", result.name);
    }
    Ok(())
}

/// Read a pipeline file. Steps left at the default output directory use
/// `output_dir` instead; `force_output_dir` applies it to every step.
fn load_pipeline(path: &Path, output_dir: &Path, force_output_dir: bool) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline file {}", path.display()))?;
    let mut config: PipelineConfig = toml::from_str(&content)
        .with_context(|| format!("Invalid pipeline file {}", path.display()))?;

    for step in &mut config.steps {
        if force_output_dir || step.output_dir == Path::new(DEFAULT_OUTPUT_DIR) {
            step.output_dir = PathBuf::from(output_dir);
        }
    }
    Ok(config)
}

fn apply_options(mut config: PipelineConfig, options: &RunOptions) -> PipelineConfig {
    config.stop_on_failure |= options.stop_on_failure;
    if options.dry_run {
        for step in &mut config.steps {
            step.dry_run = true;
        }
    }
    config
}

fn print_pretty(result: &PipelineResult, findings: &[hostsweep::Finding], verbose: bool) {
    let summary = PipelineSummary::from(result);

    let steps: Vec<StepRow> = result
        .scan_results
        .iter()
        .enumerate()
        .map(|(i, r)| StepRow {
            step: i + 1,
            tool: r.tool_name.clone(),
            status: status_label(r.status).to_string(),
            findings: r.findings_count(),
            duration: r
                .duration_secs
                .map(|d| format!("{d:.1}s"))
                .unwrap_or_default(),
            note: step_note(r, verbose),
        })
        .collect();

    println!();
    println!("{}", Table::new(&steps).with(Style::rounded()));
    println!();
    println!("{}", summary_line(&summary));

    if findings.is_empty() {
        return;
    }

    let rows: Vec<FindingTableRow> = findings
        .iter()
        .map(|f| FindingTableRow {
            severity: severity_label(f.severity).to_string(),
            tool: f.tool_name.clone(),
            title: truncate(&f.title, 50),
            target: truncate(&f.target, 40),
            mitre: f.mitre_attack.clone().unwrap_or_default(),
        })
        .collect();

    println!();
    println!("{}", "Findings:".bold().underline());
    println!("{}", Table::new(&rows).with(Style::rounded()));

    if findings.len() < summary.total_findings {
        println!();
        println!(
            "{}",
            format!(
                "Showing {} of {} findings. Use --limit or --severity to adjust, or -o json for everything.",
                findings.len(),
                summary.total_findings
            )
            .dimmed()
        );
    }
}

fn summary_line(summary: &PipelineSummary) -> String {
    format!(
        "{} {} {}  {} {}  {} {} total, {} critical, {} high",
        "Pipeline:".bold(),
        status_label(summary.status),
        summary
            .started_at
            .with_timezone(&chrono::Local)
            .format("(started %Y-%m-%d %H:%M:%S)")
            .to_string()
            .dimmed(),
        "Duration:".bold(),
        summary
            .duration_secs
            .map(|d| format!("{d:.1}s"))
            .unwrap_or_else(|| "-".to_string()),
        "Findings:".bold(),
        summary.total_findings.to_string().cyan(),
        summary.critical_findings.to_string().red().bold(),
        summary.high_findings.to_string().red(),
    )
}

fn step_note(result: &hostsweep::ScanResult, verbose: bool) -> String {
    let note = if result.config.dry_run && result.status == ScanStatus::Completed {
        result
            .stdout
            .strip_prefix("[DRY RUN] Would execute: ")
            .unwrap_or(&result.stdout)
            .to_string()
    } else if let Some(err) = &result.error_message {
        err.clone()
    } else if let Some(err) = &result.parse_error {
        format!("output only partly understood: {err}")
    } else {
        String::new()
    };

    if verbose {
        note
    } else {
        truncate(&note, 70)
    }
}
