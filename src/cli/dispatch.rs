use super::cache::cmd_cache;
use super::config::cmd_config;
use super::env::CliArgs;
use super::info::cmd_info;
use super::locate::cmd_locate;
use super::selector::cmd_selector;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Locate(args) => cmd_locate(args, ctx).await,
        Commands::Cache(args) => cmd_cache(args, ctx).await,
        Commands::Config(args) => cmd_config(args, ctx).await,
        Commands::Selector(args) => cmd_selector(args, ctx.output()),
        Commands::Info => cmd_info(ctx),
    }
}
