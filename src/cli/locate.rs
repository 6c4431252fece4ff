use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use autoheal_ai_service::AiConfig;
use autoheal_core_types::{AiProvider, ExecutionStrategy, WebElement};
use autoheal_locator::{AutoHealConfiguration, AutoHealLocator, LocatorOptions, LocatorResult};
use autoheal_web_adapter::{MockWebAutomationAdapter, WebAutomationAdapter, WebDriverAdapter};
use clap::{ArgGroup, Args};
use serde_json::json;
use tracing::{info, warn};

use crate::cli::context::CliContext;
use crate::cli::output::emit;

#[derive(Args, Clone, Debug)]
#[command(group(ArgGroup::new("page").required(true).args(["fixture", "webdriver"])))]
pub struct LocateArgs {
    /// Selector to try first
    #[arg(short, long)]
    pub selector: String,

    /// Human description of the element, used for healing
    #[arg(short = 'D', long)]
    pub description: String,

    /// Page fixture (YAML or JSON) served by the offline adapter
    #[arg(long, value_name = "FILE")]
    pub fixture: Option<PathBuf>,

    /// WebDriver endpoint, e.g. http://localhost:9515
    #[arg(long, value_name = "URL")]
    pub webdriver: Option<String>,

    /// Attach to an existing WebDriver session instead of creating one
    #[arg(long, requires = "webdriver")]
    pub session: Option<String>,

    /// Browser name for a new WebDriver session
    #[arg(long, default_value = "chrome")]
    pub browser: String,

    /// Return every element the working selector matches
    #[arg(long)]
    pub all: bool,

    /// Execution strategy override (sequential, parallel, smart_sequential, dom_only, visual_first)
    #[arg(long)]
    pub strategy: Option<ExecutionStrategy>,

    /// AI provider override
    #[arg(long)]
    pub provider: Option<AiProvider>,

    /// Healing time budget, e.g. 15s
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Skip the healing cache
    #[arg(long)]
    pub no_cache: bool,

    /// Skip visual analysis
    #[arg(long)]
    pub no_visual: bool,

    /// Write reports to the configured reporting directory
    #[arg(long)]
    pub report: bool,
}

impl LocateArgs {
    /// The loaded configuration with this command's overrides applied.
    pub fn effective_config(&self, base: &AutoHealConfiguration) -> AutoHealConfiguration {
        let mut config = base.clone();
        if let Some(strategy) = self.strategy {
            config.performance.execution_strategy = strategy;
        }
        if let Some(provider) = self.provider {
            if provider != config.ai.provider {
                config.ai = AiConfig {
                    provider,
                    model: None,
                    api_base: None,
                    ..config.ai
                };
            }
        }
        if self.report {
            config.reporting.enabled = true;
        }
        config
    }

    pub fn options(&self) -> LocatorOptions {
        let mut options = LocatorOptions::default()
            .with_caching(!self.no_cache)
            .with_visual_analysis(!self.no_visual);
        if let Some(timeout) = self.timeout {
            options = options.with_timeout(timeout);
        }
        options
    }
}

pub async fn cmd_locate(args: LocateArgs, ctx: &CliContext) -> Result<()> {
    let config = args.effective_config(ctx.config());
    let reporting = config.reporting.clone();

    let mut webdriver: Option<Arc<WebDriverAdapter>> = None;
    let adapter: Arc<dyn WebAutomationAdapter> = match (&args.fixture, &args.webdriver) {
        (Some(path), _) => Arc::new(
            MockWebAutomationAdapter::from_fixture_file(path)
                .await
                .with_context(|| format!("loading fixture {}", path.display()))?,
        ),
        (None, Some(url)) => {
            let driver = match &args.session {
                Some(session) => WebDriverAdapter::attach(url, session)?,
                None => {
                    WebDriverAdapter::create_session(
                        url,
                        json!({ "alwaysMatch": { "browserName": &args.browser } }),
                    )
                    .await
                    .with_context(|| format!("creating a WebDriver session at {url}"))?
                }
            };
            let driver = Arc::new(driver);
            webdriver = Some(driver.clone());
            driver
        }
        (None, None) => anyhow::bail!("either --fixture or --webdriver is required"),
    };

    let locator = AutoHealLocator::builder()
        .with_adapter(adapter)
        .with_configuration(config)
        .build()
        .await
        .context("building the locator")?;
    info!(
        selector = %args.selector,
        strategy = %locator.execution_strategy(),
        "Locating element"
    );

    let outcome = if args.all {
        locator
            .find_elements_with(&args.selector, &args.description, args.options())
            .await
            .map(|elements| print_elements(ctx, &elements))
    } else {
        locator
            .locate_with(&args.selector, &args.description, args.options())
            .await
            .map(|result| print_result(ctx, &result))
    };

    locator.shutdown().await;
    if let Some(driver) = webdriver {
        if let Err(err) = driver.delete_session().await {
            warn!(error = %err, "Failed to end WebDriver session");
        }
    }
    if reporting.enabled {
        eprintln!("Reports written to {}", reporting.output_directory.display());
    }

    outcome.context("element lookup failed")?
}

fn print_result(ctx: &CliContext, result: &LocatorResult) -> Result<()> {
    emit(ctx.output(), result, |result| {
        println!("Located element: {}", result.element.describe());
        println!("- Selector: {}", result.actual_selector);
        match result.healed_by {
            Some(inner) => println!("- Strategy: {} (via {})", result.strategy.name(), inner.name()),
            None => println!("- Strategy: {}", result.strategy.name()),
        }
        println!("- Confidence: {:.2}", result.confidence);
        println!("- From cache: {}", result.from_cache);
        println!("- Time: {}ms", result.execution_time.as_millis());
        if let Some(tokens) = result.tokens_used {
            println!("- Tokens: {tokens}");
        }
        if !result.reasoning.is_empty() {
            println!("- Reasoning: {}", result.reasoning);
        }
    })
}

fn print_elements(ctx: &CliContext, elements: &[WebElement]) -> Result<()> {
    emit(ctx.output(), elements, |elements| {
        println!("Found {} element(s):", elements.len());
        for element in elements {
            if element.text.is_empty() {
                println!("- {}", element.describe());
            } else {
                println!("- {} \"{}\"", element.describe(), element.text);
            }
        }
    })
}
