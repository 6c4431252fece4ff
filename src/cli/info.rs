use std::env;

use anyhow::Result;
use autoheal_core_types::AiProvider;
use autoheal_locator::ConfigurationValidator;
use humantime::format_duration;
use serde::Serialize;

use crate::cli::context::CliContext;
use crate::cli::output::emit;

#[derive(Debug, Serialize)]
struct ProviderInfo {
    provider: &'static str,
    default_model: &'static str,
    api_base: &'static str,
    visual: bool,
    api_key_env: Option<&'static str>,
    key_present: bool,
}

impl ProviderInfo {
    fn of(provider: AiProvider) -> Self {
        let api_key_env = provider.api_key_env();
        Self {
            provider: provider.name(),
            default_model: provider.default_model(),
            api_base: provider.default_api_base(),
            visual: provider.supports_visual(),
            api_key_env,
            key_present: api_key_env
                .map(|name| env::var(name).is_ok_and(|value| !value.trim().is_empty()))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Serialize)]
struct SystemInfo {
    version: &'static str,
    build_date: &'static str,
    git_commit: &'static str,
    config_path: String,
    config_from_file: bool,
    provider: String,
    model: String,
    cache: String,
    execution_strategy: String,
    element_timeout: String,
    max_concurrent_requests: usize,
    reporting: bool,
    metrics_port: u16,
    errors: Vec<String>,
    warnings: Vec<String>,
    providers: Vec<ProviderInfo>,
}

pub fn cmd_info(ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    let validation = ConfigurationValidator::validate(config);
    let info = SystemInfo {
        version: env!("CARGO_PKG_VERSION"),
        build_date: env!("BUILD_DATE"),
        git_commit: env!("GIT_HASH"),
        config_path: ctx.config_path().display().to_string(),
        config_from_file: ctx.config_from_file(),
        provider: config.ai.provider.to_string(),
        model: config.ai.effective_model(),
        cache: config.cache.cache_type.to_string(),
        execution_strategy: config.performance.execution_strategy.to_string(),
        element_timeout: format_duration(config.performance.element_timeout).to_string(),
        max_concurrent_requests: config.performance.max_concurrent_requests,
        reporting: config.reporting.enabled,
        metrics_port: ctx.metrics_port(),
        errors: validation.errors,
        warnings: validation.warnings,
        providers: AiProvider::all().into_iter().map(ProviderInfo::of).collect(),
    };

    emit(ctx.output(), &info, print_human)
}

fn print_human(info: &SystemInfo) {
    println!("AutoHeal System Information");
    println!("===========================");
    println!("Version: {}", info.version);
    println!("Build Date: {}", info.build_date);
    println!("Git Commit: {}", info.git_commit);
    println!();

    println!("Configuration:");
    if info.config_from_file {
        println!("- File: {}", info.config_path);
    } else {
        println!("- File: {} (not found, using defaults)", info.config_path);
    }
    println!("- AI Provider: {} ({})", info.provider, info.model);
    println!("- Cache: {}", info.cache);
    println!("- Execution Strategy: {}", info.execution_strategy);
    println!("- Element Timeout: {}", info.element_timeout);
    println!("- Max Concurrent Requests: {}", info.max_concurrent_requests);
    println!("- Reporting: {}", if info.reporting { "enabled" } else { "disabled" });
    if info.metrics_port == 0 {
        println!("- Metrics: disabled");
    } else {
        println!("- Metrics: http://0.0.0.0:{}/metrics", info.metrics_port);
    }
    for error in &info.errors {
        println!("- Error: {error}");
    }
    for warning in &info.warnings {
        println!("- Warning: {warning}");
    }
    println!();

    println!("Providers:");
    for provider in &info.providers {
        let key = match provider.api_key_env {
            Some(name) if provider.key_present => format!("{name} set"),
            Some(name) => format!("{name} missing"),
            None => "no key needed".to_string(),
        };
        println!(
            "- {:<17} model={:<18} visual={:<5} {}",
            provider.provider, provider.default_model, provider.visual, key
        );
    }
}
