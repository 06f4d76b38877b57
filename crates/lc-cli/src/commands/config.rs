//! Config command implementation

use std::path::PathBuf;

use anyhow::{Context, Result};

use lc_core::config::{self, ClientConfig};

use crate::output::{print_error, print_info, print_success, print_warning};
use crate::settings::Settings;

/// Show the current configuration file, or the defaults if there is none
pub fn config_show(config_path: Option<&PathBuf>) -> Result<()> {
    let path = Settings::config_file(config_path);

    if !path.exists() {
        print_warning(&format!("Config file not found: {:?}", path));
        print_info("Showing defaults; run 'lab-console config init' to create one");
        let defaults = toml::to_string_pretty(&ClientConfig::default())
            .context("Failed to render default config")?;
        println!("{}", defaults);
        return Ok(());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    println!("{}", content);

    Ok(())
}

/// Print the configuration file path
pub fn config_path(config_path: Option<&PathBuf>) -> Result<()> {
    println!("{}", Settings::config_file(config_path).display());
    Ok(())
}

/// Write the default configuration
pub fn config_init(config_path: Option<&PathBuf>, force: bool) -> Result<()> {
    let path = Settings::config_file(config_path);

    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    let defaults = ClientConfig::default();
    config::save_config(&path, &defaults)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    print_success(&format!("Created configuration file: {:?}", path));

    if !defaults.token_path.exists() {
        print_info(&format!(
            "Store your bearer token in {:?} or pass --token",
            defaults.token_path
        ));
    }

    Ok(())
}
