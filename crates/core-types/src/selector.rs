//! Selector classification and normalization.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[A-Za-z][\w-]*$").unwrap());
static CLASS_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\.[A-Za-z][\w-]*$").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static COMBINATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*([>+~])\s*").unwrap());
/// Tag tokens sit at the start of a compound selector or right after an
/// XPath step.
static TAG_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[\s>+~(/,])([a-zA-Z][a-zA-Z0-9]*)").unwrap());

const KNOWN_TAGS: &[&str] = &[
    "a", "article", "aside", "body", "button", "canvas", "dialog", "div", "footer", "form", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "iframe", "img", "input", "label", "li", "main",
    "nav", "ol", "option", "p", "section", "select", "span", "svg", "table", "tbody", "td",
    "textarea", "th", "thead", "tr", "ul",
];

/// How a selector string is interpreted by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorType {
    CssSelector,
    XPath,
    Id,
    Name,
    ClassName,
    TagName,
    LinkText,
    PartialLinkText,
}

impl LocatorType {
    pub fn display_name(&self) -> &'static str {
        match self {
            LocatorType::CssSelector => "CSS Selector",
            LocatorType::XPath => "XPath",
            LocatorType::Id => "ID",
            LocatorType::Name => "Name",
            LocatorType::ClassName => "Class Name",
            LocatorType::TagName => "Tag Name",
            LocatorType::LinkText => "Link Text",
            LocatorType::PartialLinkText => "Partial Link Text",
        }
    }
}

impl fmt::Display for LocatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

pub fn detect_locator_type(selector: &str) -> LocatorType {
    let selector = selector.trim();
    if selector.starts_with("//")
        || selector.starts_with('(')
        || selector.starts_with("./")
        || selector.starts_with('/')
    {
        LocatorType::XPath
    } else if ID_PATTERN.is_match(selector) {
        LocatorType::Id
    } else if CLASS_PATTERN.is_match(selector) {
        LocatorType::ClassName
    } else if selector.starts_with("name=") {
        LocatorType::Name
    } else if selector.starts_with("partial link=") {
        LocatorType::PartialLinkText
    } else if selector.starts_with("link=") {
        LocatorType::LinkText
    } else if KNOWN_TAGS.contains(&selector.to_ascii_lowercase().as_str()) {
        LocatorType::TagName
    } else {
        LocatorType::CssSelector
    }
}

/// A selector split into its type and the bare value the type consumes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocatorSpec {
    pub locator_type: LocatorType,
    pub value: String,
}

impl LocatorSpec {
    pub fn new(locator_type: LocatorType, value: impl Into<String>) -> Self {
        Self {
            locator_type,
            value: value.into(),
        }
    }

    pub fn from_selector(selector: &str) -> Self {
        let trimmed = selector.trim();
        let locator_type = detect_locator_type(trimmed);
        let value = match locator_type {
            LocatorType::Id | LocatorType::ClassName => &trimmed[1..],
            LocatorType::Name => &trimmed["name=".len()..],
            LocatorType::LinkText => &trimmed["link=".len()..],
            LocatorType::PartialLinkText => &trimmed["partial link=".len()..],
            _ => trimmed,
        };
        Self::new(locator_type, value)
    }

    /// W3C WebDriver `(using, value)` pair.
    pub fn to_webdriver(&self) -> (&'static str, String) {
        match self.locator_type {
            LocatorType::CssSelector => ("css selector", self.value.clone()),
            LocatorType::XPath => ("xpath", self.value.clone()),
            LocatorType::Id => ("css selector", format!("#{}", css_escape_ident(&self.value))),
            LocatorType::Name => (
                "css selector",
                format!("[name=\"{}\"]", self.value.replace('"', "\\\"")),
            ),
            LocatorType::ClassName => ("css selector", format!(".{}", css_escape_ident(&self.value))),
            LocatorType::TagName => ("tag name", self.value.clone()),
            LocatorType::LinkText => ("link text", self.value.clone()),
            LocatorType::PartialLinkText => ("partial link text", self.value.clone()),
        }
    }

    /// Selector string in the form `detect_locator_type` round-trips.
    pub fn to_selector_string(&self) -> String {
        match self.locator_type {
            LocatorType::Id => format!("#{}", self.value),
            LocatorType::ClassName => format!(".{}", self.value),
            LocatorType::Name => format!("name={}", self.value),
            LocatorType::LinkText => format!("link={}", self.value),
            LocatorType::PartialLinkText => format!("partial link={}", self.value),
            _ => self.value.clone(),
        }
    }
}

impl fmt::Display for LocatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "By.{}: {}", self.locator_type, self.value)
    }
}

fn css_escape_ident(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch);
        } else {
            out.push('\\');
            out.push(ch);
        }
    }
    out
}

/// Collapse whitespace and drop spaces around `>`, `+` and `~` so that
/// equivalent selectors share a cache key.
pub fn normalize_selector(selector: &str) -> String {
    let collapsed = WHITESPACE.replace_all(selector.trim(), " ");
    COMBINATOR.replace_all(&collapsed, "$1").into_owned()
}

/// Coarse element category of a selector, for logs and metrics.
pub fn extract_element_type(selector: &str) -> &'static str {
    let selector = selector.trim().to_ascii_lowercase();
    if selector.is_empty() {
        return "unknown";
    }

    let last_tag = TAG_TOKEN
        .captures_iter(&selector)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|token| KNOWN_TAGS.contains(token))
        .last();

    match last_tag {
        Some("button") => "button",
        Some("input") => "input",
        Some("select") => "select",
        Some("textarea") => "textarea",
        Some("a") => "link",
        Some("img") => "image",
        Some("div") => "div",
        Some("span") => "span",
        Some("form") => "form",
        Some(_) => "element",
        None => {
            // Class and attribute names often carry the role ("login-button").
            ["button", "input", "select", "textarea"]
                .into_iter()
                .find(|kind| selector.contains(kind))
                .unwrap_or("element")
        }
    }
}

/// Naive rewrites of a failed selector into attribute and XPath forms.
pub fn generate_fallback_selectors(selector: &str) -> Vec<String> {
    if selector.trim().is_empty() {
        return Vec::new();
    }
    vec![
        format!("{}']", selector.replace('#', "[id='")),
        format!("{}']", selector.replace('.', "[class*='")),
        format!("//*[contains(@class, '{}')]", selector.replace('.', "")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_every_locator_type() {
        assert_eq!(detect_locator_type("//button[@id='x']"), LocatorType::XPath);
        assert_eq!(detect_locator_type("(//a)[2]"), LocatorType::XPath);
        assert_eq!(detect_locator_type("./span"), LocatorType::XPath);
        assert_eq!(detect_locator_type("#login-btn"), LocatorType::Id);
        assert_eq!(detect_locator_type(".btn_primary"), LocatorType::ClassName);
        assert_eq!(detect_locator_type("name=username"), LocatorType::Name);
        assert_eq!(detect_locator_type("link=Home"), LocatorType::LinkText);
        assert_eq!(detect_locator_type("partial link=Ho"), LocatorType::PartialLinkText);
        assert_eq!(detect_locator_type("button"), LocatorType::TagName);
        assert_eq!(detect_locator_type("form > button.primary"), LocatorType::CssSelector);
        assert_eq!(detect_locator_type("#a .b"), LocatorType::CssSelector);
    }

    #[test]
    fn test_spec_strips_prefixes() {
        let spec = LocatorSpec::from_selector("#login");
        assert_eq!(spec, LocatorSpec::new(LocatorType::Id, "login"));
        assert_eq!(spec.to_webdriver(), ("css selector", "#login".to_string()));

        let name = LocatorSpec::from_selector("name=user");
        assert_eq!(name.to_webdriver(), ("css selector", "[name=\"user\"]".to_string()));

        let link = LocatorSpec::from_selector("partial link=Sign");
        assert_eq!(link.value, "Sign");
        assert_eq!(link.to_webdriver().0, "partial link text");
        assert_eq!(link.to_selector_string(), "partial link=Sign");
    }

    #[test]
    fn test_normalize_selector() {
        assert_eq!(normalize_selector("  div   >  span + a ~  p "), "div>span+a~p");
        assert_eq!(normalize_selector("form   input"), "form input");
    }

    #[test]
    fn test_extract_element_type_uses_tags() {
        assert_eq!(extract_element_type(""), "unknown");
        assert_eq!(extract_element_type("form > button.primary"), "button");
        assert_eq!(extract_element_type("//a[@href]"), "link");
        assert_eq!(extract_element_type("img.logo"), "image");
        assert_eq!(extract_element_type("#login-button"), "button");
        assert_eq!(extract_element_type(".card"), "element");
        assert_eq!(extract_element_type("table td"), "element");
    }

    #[test]
    fn test_fallback_selectors() {
        assert!(generate_fallback_selectors("  ").is_empty());
        let fallbacks = generate_fallback_selectors("#submit");
        assert_eq!(fallbacks[0], "[id='submit']");
        assert_eq!(fallbacks[1], "#submit']");
        assert_eq!(fallbacks[2], "//*[contains(@class, '#submit')]");

        let class_fallbacks = generate_fallback_selectors(".btn");
        assert_eq!(class_fallbacks[1], "[class*='btn']");
        assert_eq!(class_fallbacks[2], "//*[contains(@class, 'btn')]");
    }
}
