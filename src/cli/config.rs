use std::path::Path;

use crate::cli::context::CliContext;
use crate::cli::output::{emit, OutputFormat};
use crate::cli::runtime::apply_env_overrides;
use anyhow::{bail, Context, Result};
use autoheal_locator::{AutoHealConfiguration, ConfigurationValidator, ValidationReport};
use clap::{Args, Subcommand};
use serde_json::{Map, Value as JsonValue};
use tokio::fs;
use tracing::info;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Set configuration value (dotted key, e.g. ai.provider)
    Set {
        /// Configuration key
        key: String,

        /// Configuration value (JSON literals are parsed, anything else is a string)
        value: String,
    },

    /// Get configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Reset configuration to defaults
    Reset,

    /// Validate configuration
    Validate,

    /// Print the JSON schema of the configuration file
    Schema,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let path = ctx.config_path().to_path_buf();
    match args.action {
        ConfigAction::Show => {
            emit(ctx.output(), ctx.config(), |config| {
                println!("Current configuration ({}):", path.display());
                match serde_yaml::to_string(config) {
                    Ok(yaml) => print!("{yaml}"),
                    Err(err) => println!("<unprintable: {err}>"),
                }
            })?;
        }
        ConfigAction::Set { key, value } => {
            let config = load_config_file(&path).await?;
            let mut json = serde_json::to_value(&config)?;
            let segments = split_key(&key)?;
            if get_json_value(&json, &segments).is_none() {
                bail!("{} is not a configuration key", key);
            }
            set_json_value(&mut json, &segments, parse_cli_value(&value))?;
            let config: AutoHealConfiguration = serde_json::from_value(json)
                .with_context(|| format!("{} cannot be set to {}", key, value))?;
            save_config_file(&path, &config).await?;
            info!("Updated configuration key {}", key);
            println!("Saved configuration to {}", path.display());
        }
        ConfigAction::Get { key } => {
            let json = serde_json::to_value(ctx.config())?;
            let segments = split_key(&key)?;
            let Some(value) = get_json_value(&json, &segments) else {
                bail!("{} not found in configuration", key);
            };
            emit(ctx.output(), value, |value| match value {
                JsonValue::String(text) => println!("{text}"),
                other => match serde_yaml::to_string(other) {
                    Ok(yaml) => print!("{yaml}"),
                    Err(_) => println!("{other}"),
                },
            })?;
        }
        ConfigAction::Reset => {
            save_config_file(&path, &AutoHealConfiguration::default()).await?;
            println!(
                "Configuration reset to defaults and written to {}",
                path.display()
            );
        }
        ConfigAction::Validate => {
            let exists = fs::try_exists(&path).await?;
            let mut config = load_config_file(&path).await?;
            apply_env_overrides(&mut config)?;
            let report = ConfigurationValidator::validate(&config);
            print_validation(ctx.output(), &path, exists, &report)?;
            if !report.is_valid() {
                bail!(
                    "configuration has {} error(s): {}",
                    report.errors.len(),
                    report.errors.join("; ")
                );
            }
        }
        ConfigAction::Schema => {
            let schema = schemars::schema_for!(AutoHealConfiguration);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }

    Ok(())
}

fn print_validation(
    format: OutputFormat,
    path: &Path,
    exists: bool,
    report: &ValidationReport,
) -> Result<()> {
    emit(format, report, |report| {
        if exists {
            println!("Configuration file: {}", path.display());
        } else {
            println!("No configuration file at {}; checking defaults", path.display());
        }
        for error in &report.errors {
            println!("  error: {error}");
        }
        for warning in &report.warnings {
            println!("  warning: {warning}");
        }
        if report.is_valid() {
            println!("Configuration is valid");
        }
    })
}

async fn load_config_file(path: &Path) -> Result<AutoHealConfiguration> {
    if fs::try_exists(path).await? {
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let config =
            serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    } else {
        Ok(AutoHealConfiguration::default())
    }
}

async fn save_config_file(path: &Path, config: &AutoHealConfiguration) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let serialized = serde_yaml::to_string(config)?;
    fs::write(path, serialized)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn parse_cli_value(raw: &str) -> JsonValue {
    serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        bail!("configuration key cannot be empty");
    }
    Ok(segments)
}

fn set_json_value(target: &mut JsonValue, path: &[&str], value: JsonValue) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        bail!("configuration key cannot be empty");
    };
    let mut current = target;
    for segment in parents {
        current = ensure_object(current, segment)?
            .entry((*segment).to_string())
            .or_insert(JsonValue::Null);
    }
    ensure_object(current, last)?.insert((*last).to_string(), value);
    Ok(())
}

fn ensure_object<'a>(
    value: &'a mut JsonValue,
    segment: &str,
) -> Result<&'a mut Map<String, JsonValue>> {
    if value.is_null() {
        *value = JsonValue::Object(Map::new());
    }
    match value {
        JsonValue::Object(map) => Ok(map),
        _ => bail!(
            "{} resolves to a non-object value; cannot assign nested configuration",
            segment
        ),
    }
}

fn get_json_value<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let mut current = value;
    for segment in path {
        match current {
            JsonValue::Object(map) => {
                current = map.get(*segment)?;
            }
            _ => return None,
        }
    }
    Some(current)
}
