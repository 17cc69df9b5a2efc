//! `hostsweep sysmon` - manage the Sysmon service.

use anyhow::Result;
use colored::Colorize;
use hostsweep::{SysmonManager, SysmonStatus};

use super::Context;
use crate::cli::args::{SysmonArgs, SysmonCommands};
use crate::output::{print_structured, write_csv, OutputFormat};

pub async fn execute(ctx: Context, args: SysmonArgs) -> Result<()> {
    let sysmon = SysmonManager::new(ctx.tool_manager(), &ctx.config.sweep);

    match args.command {
        SysmonCommands::Status => {
            let status = sysmon.status().await;
            if !print_structured(ctx.output_format, &status)? {
                if ctx.output_format == OutputFormat::Csv {
                    write_csv(std::io::stdout().lock(), &[&status])?;
                } else {
                    print_status(&status);
                }
            }
        }
        SysmonCommands::Install { config_file } => {
            sysmon.install(config_file.as_deref()).await?;
            let path = config_file.as_deref().unwrap_or(sysmon.config_file());
            success(
                &ctx,
                &format!("Sysmon installed with {}", path.display()),
            );
        }
        SysmonCommands::Update { config_file } => {
            sysmon.update_config(config_file.as_deref()).await?;
            let path = config_file.as_deref().unwrap_or(sysmon.config_file());
            success(
                &ctx,
                &format!("Sysmon configuration replaced with {}", path.display()),
            );
        }
        SysmonCommands::Uninstall => {
            sysmon.uninstall().await?;
            success(&ctx, "Sysmon removed");
        }
    }

    Ok(())
}

fn print_status(status: &SysmonStatus) {
    let state = if status.installed {
        "running".green().bold()
    } else {
        "not running".red().bold()
    };
    println!("{} {}", status.service_name.bold(), state);

    let config = if status.config_exists {
        status.config_file.display().to_string().normal()
    } else {
        format!("{} (missing)", status.config_file.display()).yellow()
    };
    println!("  {} {}", "Config:".bold(), config);

    if !status.installed {
        println!();
        println!(
            "{}",
            "Tip: run `hostsweep sysmon install` from an elevated prompt".dimmed()
        );
    }
}

fn success(ctx: &Context, message: &str) {
    if ctx.output_format == OutputFormat::Pretty {
        println!("{} {}", "Success:".green().bold(), message);
    }
}
