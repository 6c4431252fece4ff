use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use super::commands::Commands;
use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{
    build_runtime, init_logging, load_config, load_local_env_overrides, resolve_config_path,
    LoadedConfig,
};
use crate::metrics;
use autoheal_locator::AutoHealConfiguration;

/// Parse arguments, load configuration, then run the command on a runtime
/// sized from the configuration.
pub fn run() -> Result<()> {
    let local_env = load_local_env_overrides();
    let cli = CliArgs::parse();

    if let Err(err) = init_logging(&cli.log_level, cli.debug) {
        eprintln!("autoheal: {err:#}");
        return Err(err);
    }
    local_env.log();

    let LoadedConfig {
        config,
        path,
        from_file,
    } = match load_config(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        // `config` subcommands must still run against a broken file
        Err(err) if matches!(cli.command, Commands::Config(_)) => {
            warn!("{err:#}; continuing with defaults");
            LoadedConfig {
                config: AutoHealConfiguration::default(),
                path: resolve_config_path(cli.config.as_deref())?,
                from_file: false,
            }
        }
        Err(err) => {
            error!("Command failed: {err:#}");
            return Err(err);
        }
    };

    let runtime = build_runtime(&config)?;
    let ctx = CliContext::new(config, path, from_file, cli.output, cli.metrics_port);

    runtime.block_on(async {
        let _metrics_server = metrics::spawn_metrics_server(ctx.metrics_port());
        info!("Starting AutoHeal v{}", env!("CARGO_PKG_VERSION"));

        match dispatch(&cli, &ctx).await {
            Ok(()) => {
                info!("Command completed successfully");
                Ok(())
            }
            Err(err) => {
                error!("Command failed: {err:#}");
                Err(err)
            }
        }
    })
}
