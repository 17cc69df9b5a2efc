//! `hostsweep config` - show the effective configuration.

use anyhow::Result;
use colored::Colorize;

use super::Context;
use crate::cli::args::{ConfigArgs, ConfigCommands};
use crate::config::Config;
use crate::output::OutputFormat;

pub fn execute(ctx: Context, args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(&ctx),
        ConfigCommands::Path => show_path(&ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    let config = &ctx.config;

    match ctx.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(config)?);
        }
        _ => {
            println!("{}", "Current Configuration:".bold());
            println!();
            println!("  {} {}", "tools_dir:".bold(), config.sweep.tools_dir.display());
            println!("  {} {}", "output_dir:".bold(), config.sweep.output_dir.display());
            println!(
                "  {} {}",
                "output_format:".bold(),
                config.output_format.unwrap_or(OutputFormat::Pretty)
            );

            if config.sweep.tools.is_empty() {
                println!("  {} {}", "tools:".bold(), "(no overrides)".dimmed());
            } else {
                let overrides = toml::to_string_pretty(&config.sweep.tools)?;
                println!();
                println!("{}", "Tool overrides:".bold());
                for line in overrides.lines() {
                    println!("  {line}");
                }
            }
        }
    }

    Ok(())
}

fn show_path(ctx: &Context) -> Result<()> {
    let path = match &ctx.config_path {
        Some(path) => path.clone(),
        None => Config::path()?,
    };
    println!("{}", path.display());
    Ok(())
}
