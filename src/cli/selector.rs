use anyhow::Result;
use autoheal_core_types::{
    detect_locator_type, extract_element_type, generate_fallback_selectors, normalize_selector,
    LocatorSpec, LocatorType, PlaywrightLocator,
};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct SelectorArgs {
    #[command(subcommand)]
    pub action: SelectorAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum SelectorAction {
    /// Detect how a selector string is interpreted
    Detect { selector: String },

    /// Normalize whitespace and combinators (the form cache keys use)
    Normalize { selector: String },

    /// Naive attribute and XPath rewrites of a failed selector
    Fallbacks { selector: String },

    /// Parse a Playwright locator expression such as `getByRole('button', { name: 'Submit' })`
    ParsePlaywright { expression: String },

    /// Convert a Playwright locator expression to XPath
    Xpath { expression: String },
}

#[derive(Debug, Serialize)]
pub struct SelectorDetection {
    pub selector: String,
    pub locator_type: LocatorType,
    pub display_name: &'static str,
    pub element_type: &'static str,
    pub webdriver_using: &'static str,
    pub webdriver_value: String,
    pub playwright_expression: bool,
}

impl SelectorDetection {
    pub fn of(selector: &str) -> Self {
        let locator_type = detect_locator_type(selector);
        let (webdriver_using, webdriver_value) = LocatorSpec::from_selector(selector).to_webdriver();
        Self {
            selector: selector.to_string(),
            locator_type,
            display_name: locator_type.display_name(),
            element_type: extract_element_type(selector),
            webdriver_using,
            webdriver_value,
            playwright_expression: PlaywrightLocator::is_locator_expression(selector),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlaywrightSummary {
    /// False when the input was not a call chain and is treated as CSS.
    pub recognized: bool,
    pub locator: PlaywrightLocator,
    pub javascript: String,
    pub selector_engine: String,
    pub xpath: Option<String>,
}

impl PlaywrightSummary {
    pub fn of(expression: &str) -> Self {
        let parsed = PlaywrightLocator::try_parse(expression);
        let recognized = parsed.is_some();
        let locator = parsed.unwrap_or_else(|| PlaywrightLocator::parse(expression));
        Self {
            recognized,
            javascript: locator.to_js_string(),
            selector_engine: locator.to_selector_engine(),
            xpath: locator.to_xpath(),
            locator,
        }
    }
}

pub fn cmd_selector(args: SelectorArgs, format: OutputFormat) -> Result<()> {
    match args.action {
        SelectorAction::Detect { selector } => {
            emit(format, &SelectorDetection::of(&selector), |detection| {
                println!("Selector: {}", detection.selector);
                println!("- Type: {}", detection.display_name);
                println!("- Element type: {}", detection.element_type);
                println!(
                    "- WebDriver: using=\"{}\" value=\"{}\"",
                    detection.webdriver_using, detection.webdriver_value
                );
                if detection.playwright_expression {
                    println!("- Playwright locator expression");
                }
            })
        }
        SelectorAction::Normalize { selector } => {
            emit(format, &normalize_selector(&selector), |normalized| {
                println!("{normalized}")
            })
        }
        SelectorAction::Fallbacks { selector } => {
            emit(format, &generate_fallback_selectors(&selector), |fallbacks| {
                if fallbacks.is_empty() {
                    println!("No fallbacks for an empty selector");
                }
                for fallback in fallbacks {
                    println!("{fallback}");
                }
            })
        }
        SelectorAction::ParsePlaywright { expression } => {
            emit(format, &PlaywrightSummary::of(&expression), |summary| {
                if !summary.recognized {
                    println!("Not a Playwright call chain; treated as a CSS locator");
                }
                println!("Kind: {}", summary.locator.kind.method_name());
                println!("Value: {}", summary.locator.value);
                if !summary.locator.options.is_empty() {
                    println!("Options: {}", summary.locator.options.len());
                }
                if !summary.locator.filters.is_empty() {
                    println!("Filters: {}", summary.locator.filters.len());
                }
                println!("JavaScript: page.{}", summary.javascript);
                println!("Selector engine: {}", summary.selector_engine);
                if let Some(xpath) = &summary.xpath {
                    println!("XPath: {xpath}");
                }
            })
        }
        SelectorAction::Xpath { expression } => {
            let xpath = PlaywrightLocator::parse(&expression).to_xpath();
            emit(format, &xpath, |xpath| match xpath {
                Some(xpath) => println!("{xpath}"),
                None => println!("CSS locators have no XPath form; use the selector as-is"),
            })
        }
    }
}
