//! `hostsweep tools` - tool registry inspection.

use anyhow::Result;
use colored::Colorize;
use hostsweep::{install_hint, ToolAvailability, ToolInfo};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use super::Context;
use crate::cli::args::{ToolsArgs, ToolsCommands};
use crate::output::{print_structured, truncate, write_csv, OutputFormat};

#[derive(Tabled, Serialize)]
struct ToolRow {
    #[tabled(rename = "Tool")]
    name: String,
    #[tabled(rename = "Name")]
    display_name: String,
    #[tabled(rename = "Installed")]
    installed: String,
    #[tabled(rename = "Install")]
    install_method: String,
    #[tabled(rename = "Admin")]
    admin: String,
    #[tabled(rename = "Path")]
    path: String,
}

#[derive(Serialize)]
struct Verification<'a> {
    tool: &'a str,
    installed: bool,
    pinned: bool,
    verified: bool,
}

pub async fn execute(ctx: Context, args: ToolsArgs) -> Result<()> {
    match args.command {
        ToolsCommands::List => list_tools(&ctx),
        ToolsCommands::Check { name } => check_tool(&ctx, &name),
        ToolsCommands::Verify { name } => verify_tool(&ctx, &name).await,
    }
}

fn list_tools(ctx: &Context) -> Result<()> {
    let availability = ToolAvailability::collect(&ctx.tool_manager());
    if print_structured(ctx.output_format, &availability)? {
        return Ok(());
    }

    let pretty = ctx.output_format == OutputFormat::Pretty;
    let rows: Vec<ToolRow> = availability
        .tools
        .iter()
        .map(|(name, t)| {
            let path = t
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            ToolRow {
                name: name.clone(),
                display_name: t.display_name.clone(),
                installed: match (t.installed, pretty) {
                    (true, true) => "yes".green().to_string(),
                    (false, true) => "no".red().to_string(),
                    (installed, false) => installed.to_string(),
                },
                install_method: t.install_method.to_string(),
                admin: if t.requires_elevated_privileges { "yes" } else { "" }.to_string(),
                path: if pretty { truncate(&path, 60) } else { path },
            }
        })
        .collect();

    if !pretty {
        return write_csv(std::io::stdout().lock(), &rows);
    }

    println!("{}", Table::new(&rows).with(Style::rounded()));
    println!();
    println!(
        "{}",
        format!(
            "{} of {} tools installed",
            availability.installed_count, availability.total_count
        )
        .dimmed()
    );

    if availability.installed_count < availability.total_count {
        println!("{}", "Tip: run `hostsweep setup` to download missing tools".dimmed());
    }
    Ok(())
}

fn check_tool(ctx: &Context, name: &str) -> Result<()> {
    let info = ctx.tool_manager().check_tool(name)?;
    if print_structured(ctx.output_format, &info)? {
        return Ok(());
    }
    if ctx.output_format == OutputFormat::Csv {
        return write_csv(std::io::stdout().lock(), &[&info]);
    }

    print_tool(&info);
    Ok(())
}

fn print_tool(info: &ToolInfo) {
    let state = if info.installed {
        "installed".green().bold()
    } else {
        "not installed".red().bold()
    };
    println!("{} ({}) {}", info.display_name.bold(), info.name, state);
    println!("  {} {}", "Executable:".bold(), info.exe_name);
    if let Some(path) = &info.path {
        println!("  {} {}", "Path:".bold(), path.display());
    }
    println!("  {} {}", "Install:".bold(), info.install_method);
    if let Some(repo) = &info.source_repo {
        println!("  {} {}", "Source:".bold(), repo);
    }
    if !info.license.is_empty() {
        println!("  {} {}", "License:".bold(), info.license);
    }
    if info.requires_elevated_privileges {
        println!("  {}", "Requires administrator rights".yellow());
    }
    if !info.installed {
        println!();
        println!("{}", install_hint(info).dimmed());
    }
}

async fn verify_tool(ctx: &Context, name: &str) -> Result<()> {
    let tools = ctx.tool_manager();
    let info = tools.check_tool(name)?;
    let verified = tools.verify_tool_integrity(name).await?;

    let report = Verification {
        tool: name,
        installed: info.installed,
        pinned: info.expected_hash.is_some(),
        verified,
    };

    if !print_structured(ctx.output_format, &report)? {
        if ctx.output_format == OutputFormat::Csv {
            write_csv(std::io::stdout().lock(), &[&report])?;
        } else if !info.installed {
            println!("{} {} is not installed", "Error:".red().bold(), info.display_name);
        } else if !report.pinned {
            println!("{} no hash pinned for {}", "Note:".yellow().bold(), name);
        } else if verified {
            println!("{} {} matches its pinned SHA-256", "OK:".green().bold(), name);
        } else {
            println!("{} {} does not match its pinned SHA-256", "MISMATCH:".red().bold(), name);
        }
    }

    if verified {
        Ok(())
    } else {
        anyhow::bail!("integrity check failed for {name}")
    }
}
