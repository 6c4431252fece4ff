use anyhow::{Context, Result};
use autoheal_selector_cache::{contextual_key, try_create_cache, CacheMetricsSnapshot, CacheType};
use clap::{Args, Subcommand};
use serde::Serialize;
use tracing::info;

use crate::cli::context::CliContext;
use crate::cli::output::emit;

#[derive(Args, Clone, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum CacheAction {
    /// Show backend, size and hit/miss counters
    Stats,

    /// Remove every cached selector
    Clear,

    /// Remove the cached selector for one logical element
    Remove {
        #[arg(short, long)]
        selector: String,

        #[arg(short = 'D', long)]
        description: String,
    },

    /// Drop expired entries
    Evict,
}

#[derive(Debug, Serialize)]
struct CacheStats {
    backend: CacheType,
    entries: u64,
    #[serde(flatten)]
    metrics: CacheMetricsSnapshot,
    hit_rate: f64,
}

pub async fn cmd_cache(args: CacheArgs, ctx: &CliContext) -> Result<()> {
    let settings = &ctx.config().cache;
    let cache = try_create_cache(settings)
        .await
        .with_context(|| format!("opening the {} selector cache", settings.cache_type))?;

    match args.action {
        CacheAction::Stats => {
            let metrics = cache.metrics();
            let stats = CacheStats {
                backend: cache.kind(),
                entries: cache.size().await?,
                hit_rate: metrics.hit_rate(),
                metrics,
            };
            emit(ctx.output(), &stats, |stats| {
                println!("Selector cache ({})", stats.backend);
                println!("- Entries: {}", stats.entries);
                println!("- Hits: {}", stats.metrics.hits);
                println!("- Misses: {}", stats.metrics.misses);
                println!("- Evictions: {}", stats.metrics.evictions);
                println!("- Hit rate: {:.1}%", stats.hit_rate * 100.0);
            })?;
        }
        CacheAction::Clear => {
            cache.clear_all().await?;
            info!(backend = %cache.kind(), "Selector cache cleared");
            println!("Selector cache cleared");
        }
        CacheAction::Remove {
            selector,
            description,
        } => {
            let key = contextual_key(&selector, &description, None);
            if cache.remove(&key).await? {
                println!("Removed cached selector for {key}");
            } else {
                println!("No cached selector for {key}");
            }
        }
        CacheAction::Evict => {
            let removed = cache.evict_expired().await?;
            println!("Evicted {removed} expired entr{}", if removed == 1 { "y" } else { "ies" });
        }
    }

    Ok(())
}
