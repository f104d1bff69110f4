//! Configuration view and setup commands: `taskbridge config`.

use std::path::Path;

use anyhow::{Context, Result, bail};
use console::style;
use taskbridge::config::{Config, TaskbridgeToml};
use taskbridge::ui::icons::{CHECK, WARN};

use super::super::ConfigCommands;

/// `config show` (the default) and `config validate`.
pub fn cmd_config(config: &Config, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            if config.config_path.exists() {
                println!("Config file: {}", config.config_path.display());
            } else {
                println!(
                    "No config file at {} (using defaults)",
                    config.config_path.display()
                );
            }
            println!();
            println!("Effective values (with env/CLI overrides):");
            let effective = toml::to_string_pretty(&config.effective_toml())
                .context("Failed to render configuration")?;
            print!("{}", effective);
            print_warnings(&config.validate());
        }
        Some(ConfigCommands::Validate) => {
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("{}Configuration is valid", CHECK);
            } else {
                print_warnings(&warnings);
            }
        }
        Some(ConfigCommands::Init { .. }) => {
            bail!("'config init' runs before configuration is loaded")
        }
    }
    Ok(())
}

/// Write a default config file. Runs without loading configuration so a
/// missing `--config` target is not an error.
pub fn cmd_config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }
    TaskbridgeToml::default().save(path)?;
    println!("{}Wrote default configuration to {}", CHECK, path.display());
    Ok(())
}

fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!();
    for warning in warnings {
        println!("{}{}", WARN, style(warning).yellow());
    }
}
