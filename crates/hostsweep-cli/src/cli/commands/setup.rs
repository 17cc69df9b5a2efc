//! `hostsweep setup` - download tools from their release pages.

use anyhow::Result;
use colored::Colorize;
use std::collections::BTreeMap;

use super::Context;
use crate::cli::args::SetupArgs;
use crate::output::{print_structured, write_csv, OutputFormat};

#[derive(serde::Serialize)]
struct SetupRow<'a> {
    tool: &'a str,
    installed: bool,
}

pub async fn execute(ctx: Context, args: SetupArgs) -> Result<()> {
    let tools = ctx.tool_manager();

    let outcome: BTreeMap<String, bool> = match &args.tool {
        Some(name) => {
            let info = tools.check_tool(name)?;
            if info.installed && !args.force {
                if ctx.output_format == OutputFormat::Pretty {
                    println!(
                        "{} {} is already installed at {}",
                        "Note:".yellow().bold(),
                        info.display_name,
                        info.path.map(|p| p.display().to_string()).unwrap_or_default()
                    );
                    println!("{}", "Use --force to download it again".dimmed());
                }
                BTreeMap::from([(name.clone(), true)])
            } else {
                if ctx.output_format == OutputFormat::Pretty {
                    println!("Downloading {}...", info.display_name.cyan());
                }
                BTreeMap::from([(name.clone(), tools.download_tool(name).await?)])
            }
        }
        None => {
            if ctx.output_format == OutputFormat::Pretty {
                println!("Downloading tools into {}...", tools.tools_dir().display());
            }
            tools.bootstrap_all(!args.force).await
        }
    };

    if !print_structured(ctx.output_format, &outcome)? {
        if ctx.output_format == OutputFormat::Csv {
            let rows: Vec<SetupRow> = outcome
                .iter()
                .map(|(tool, installed)| SetupRow {
                    tool,
                    installed: *installed,
                })
                .collect();
            write_csv(std::io::stdout().lock(), &rows)?;
        } else {
            println!();
            for (name, ok) in &outcome {
                let mark = if *ok { "ok".green() } else { "failed".red() };
                println!("  {name:20} {mark}");
            }
        }
    }

    let failed: Vec<&str> = outcome
        .iter()
        .filter(|(_, ok)| !**ok)
        .map(|(name, _)| name.as_str())
        .collect();
    if failed.is_empty() {
        Ok(())
    } else {
        anyhow::bail!(
            "{} tool(s) could not be installed: {}\n\
             Tools installed by hand can be registered with `tools.<name>.path` in the config file.",
            failed.len(),
            failed.join(", ")
        )
    }
}
