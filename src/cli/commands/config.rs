//! Config command - show or edit configuration

use super::{CHECK, CROSS, WARN};
use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::cli::AppContext;
use crate::config::{Config, ConfigManager};
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::key::Origin;
use console::style;
use std::path::PathBuf;

const VALID_KEYS: &[&str] = &[
    "general.log_format",
    "cache.dir",
    "cache.manifest_store",
    "cache.temp_store",
    "cache.content_store",
    "app.origin",
    "app.manifest",
    "app.core",
    "network.root_timeout_secs",
    "network.request_timeout_secs",
    "lifecycle.skip_waiting_on_install",
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, ctx: &AppContext) -> ShellcacheResult<()> {
    let manager = &ctx.config_manager;

    match args.action {
        None | Some(ConfigAction::Show) => show_config(&ctx.config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => {
            set_value(manager, &ctx.config, &key, &value).await?
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> ShellcacheResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> ShellcacheResult<()> {
    let path = manager.path();

    if path.exists() && !force {
        println!("{} Config already exists at {}", WARN, path.display());
        println!("  Use {} to overwrite", style("--force").cyan());
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    println!("{} Configuration initialized at {}", CHECK, path.display());

    Ok(())
}

async fn set_value(
    manager: &ConfigManager,
    config: &Config,
    key: &str,
    value: &str,
) -> ShellcacheResult<()> {
    let mut config = config.clone();
    if !apply_value(&mut config, key, value)? {
        eprintln!("{} Unknown config key: {}", CROSS, key);
        eprintln!("Valid keys:");
        for key in VALID_KEYS {
            eprintln!("  {}", key);
        }
        return Err(ShellcacheError::User(format!("Unknown config key: {}", key)));
    }

    manager.save(&config).await?;
    println!("{} Set {} = {}", CHECK, key, value);

    Ok(())
}

/// Apply one dotted key to the config; false if the key is not recognised
fn apply_value(config: &mut Config, key: &str, value: &str) -> ShellcacheResult<bool> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => match value {
            "text" | "json" => config.general.log_format = value.to_string(),
            _ => {
                return Err(ShellcacheError::User(format!(
                    "Invalid log format: {}. Use text or json",
                    value
                )))
            }
        },

        ["cache", "dir"] => {
            config.cache.dir = if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            }
        }
        ["cache", "manifest_store"] => config.cache.manifest_store = parse_store_name(value)?,
        ["cache", "temp_store"] => config.cache.temp_store = parse_store_name(value)?,
        ["cache", "content_store"] => config.cache.content_store = parse_store_name(value)?,

        ["app", "origin"] => {
            config.app.origin = Origin::parse(value)?.as_str().to_string();
        }
        ["app", "manifest"] => config.app.manifest = PathBuf::from(value),
        ["app", "core"] => {
            config.app.core = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        ["network", "root_timeout_secs"] => config.network.root_timeout_secs = parse_secs(value)?,
        ["network", "request_timeout_secs"] => {
            config.network.request_timeout_secs = parse_secs(value)?
        }

        ["lifecycle", "skip_waiting_on_install"] => {
            config.lifecycle.skip_waiting_on_install = parse_bool(value)?
        }

        _ => return Ok(false),
    }

    Ok(true)
}

fn parse_bool(value: &str) -> ShellcacheResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ShellcacheError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_secs(value: &str) -> ShellcacheResult<u64> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ShellcacheError::User(format!(
            "Invalid timeout: {}. Use a positive number of seconds",
            value
        ))),
    }
}

fn parse_store_name(value: &str) -> ShellcacheResult<String> {
    if value.is_empty() || value.contains(['/', '\\']) || value.contains("..") {
        return Err(ShellcacheError::User(format!(
            "Invalid store name: {}",
            value
        )));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_known_keys() {
        let mut config = Config::default();

        assert!(apply_value(&mut config, "app.origin", "https://app.example.com/").unwrap());
        assert!(apply_value(&mut config, "app.core", "main.dart.js, index.html,").unwrap());
        assert!(apply_value(&mut config, "network.root_timeout_secs", "3").unwrap());
        assert!(apply_value(&mut config, "lifecycle.skip_waiting_on_install", "no").unwrap());

        assert_eq!(config.app.origin, "https://app.example.com");
        assert_eq!(config.app.core, vec!["main.dart.js", "index.html"]);
        assert_eq!(config.network.root_timeout_secs, 3);
        assert!(!config.lifecycle.skip_waiting_on_install);
    }

    #[test]
    fn unknown_key_is_reported() {
        let mut config = Config::default();
        assert!(!apply_value(&mut config, "vm.name", "x").unwrap());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = Config::default();
        assert!(apply_value(&mut config, "network.request_timeout_secs", "0").is_err());
        assert!(apply_value(&mut config, "cache.content_store", "../x").is_err());
        assert!(apply_value(&mut config, "general.log_format", "yaml").is_err());
        assert!(apply_value(&mut config, "app.origin", "ftp://host").is_err());
    }

    #[test]
    fn empty_cache_dir_restores_default() {
        let mut config = Config::default();
        apply_value(&mut config, "cache.dir", "/tmp/stores").unwrap();
        assert_eq!(config.cache.dir, Some(PathBuf::from("/tmp/stores")));

        apply_value(&mut config, "cache.dir", "").unwrap();
        assert!(config.cache.dir.is_none());
    }
}
