use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use autoheal_locator::AutoHealConfiguration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOCAL_ENV_PATH: &str = "config/local.env";
const LOCAL_CONFIG_PATH: &str = "config/config.yaml";

/// Outcome of reading an env file. It runs before the subscriber exists
/// (the file may set `RUST_LOG`), so it is logged afterwards.
#[derive(Debug, Default)]
pub struct EnvFileLoad {
    pub path: PathBuf,
    pub found: bool,
    pub applied: usize,
    pub invalid_lines: Vec<usize>,
    pub read_error: Option<String>,
}

impl EnvFileLoad {
    pub fn log(&self) {
        if let Some(err) = &self.read_error {
            warn!(path = %self.path.display(), %err, "failed to read local.env overrides");
            return;
        }
        for line in &self.invalid_lines {
            warn!(line, "invalid local.env entry; skipping");
        }
        if self.found {
            info!(
                path = %self.path.display(),
                applied = self.applied,
                "Loaded environment defaults from local.env"
            );
        }
    }
}

/// Export `KEY=value` lines from `config/local.env` without overriding
/// variables that are already set.
pub fn load_local_env_overrides() -> EnvFileLoad {
    load_env_file(Path::new(LOCAL_ENV_PATH))
}

pub(crate) fn load_env_file(path: &Path) -> EnvFileLoad {
    let mut load = EnvFileLoad {
        path: path.to_path_buf(),
        ..EnvFileLoad::default()
    };
    if !path.exists() {
        return load;
    }
    load.found = true;

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            load.read_error = Some(err.to_string());
            return load;
        }
    };

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            load.invalid_lines.push(idx + 1);
            continue;
        };
        let key = key.trim();
        if key.is_empty() || env::var_os(key).is_some() {
            continue;
        }
        env::set_var(key, unescape_value(value.trim()));
        load.applied += 1;
    }
    load
}

/// `RUST_LOG` wins over `--log-level`; `--debug` forces DEBUG.
pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;

    Ok(())
}

pub struct LoadedConfig {
    pub config: AutoHealConfiguration,
    pub path: PathBuf,
    pub from_file: bool,
}

/// `--config`, then `./config/config.yaml`, then
/// `<config dir>/autoheal/config.yaml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let local = PathBuf::from(LOCAL_CONFIG_PATH);
    if local.exists() {
        return Ok(local);
    }
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("autoheal");
    path.push("config.yaml");
    Ok(path)
}

pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = resolve_config_path(explicit)?;

    let (mut config, from_file) = if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AutoHealConfiguration = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Loaded configuration from: {}", path.display());
        (config, true)
    } else {
        warn!("Config file not found, using defaults: {}", path.display());
        (AutoHealConfiguration::default(), false)
    };

    apply_env_overrides(&mut config)?;
    Ok(LoadedConfig {
        config,
        path,
        from_file,
    })
}

/// `AUTOHEAL_AI_PROVIDER` and `AUTOHEAL_AI_MODEL` win over the file.
pub fn apply_env_overrides(config: &mut AutoHealConfiguration) -> Result<()> {
    config
        .ai
        .apply_env_overrides()
        .map_err(|err| anyhow!(err))
        .context("Invalid AI environment override")
}

/// Multi-threaded runtime sized from `performance.thread_pool_size`.
pub fn build_runtime(config: &AutoHealConfiguration) -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.performance.thread_pool_size.max(1))
        .thread_name("autoheal-worker")
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")
}

fn unescape_value(value: &str) -> String {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        let inner = &value[1..value.len() - 1];
        inner
            .replace("\\\"", "\"")
            .replace("\\n", "\n")
            .replace("\\r", "\r")
            .replace("\\t", "\t")
    } else if value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2 {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}
