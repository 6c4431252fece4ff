//! Playwright locator expressions.
//!
//! Locators arrive as JavaScript-style strings such as
//! `page.getByRole('button', { name: 'Submit' }).filter({ hasText: 'Now' })`.
//! [`PlaywrightLocator::parse`] turns them into a structured form which can
//! be rendered back as canonical JavaScript (used for cache keys), as a
//! Playwright selector-engine string, or as an XPath approximation for
//! adapters that do not speak Playwright.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaywrightLocatorKind {
    GetByRole,
    GetByLabel,
    GetByPlaceholder,
    GetByText,
    GetByAltText,
    GetByTitle,
    GetByTestId,
    Css,
    XPath,
}

impl PlaywrightLocatorKind {
    fn from_method(name: &str) -> Option<Self> {
        Some(match name {
            "getByRole" => Self::GetByRole,
            "getByLabel" => Self::GetByLabel,
            "getByPlaceholder" => Self::GetByPlaceholder,
            "getByText" => Self::GetByText,
            "getByAltText" => Self::GetByAltText,
            "getByTitle" => Self::GetByTitle,
            "getByTestId" => Self::GetByTestId,
            "locator" => Self::Css,
            _ => return None,
        })
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            Self::GetByRole => "getByRole",
            Self::GetByLabel => "getByLabel",
            Self::GetByPlaceholder => "getByPlaceholder",
            Self::GetByText => "getByText",
            Self::GetByAltText => "getByAltText",
            Self::GetByTitle => "getByTitle",
            Self::GetByTestId => "getByTestId",
            Self::Css | Self::XPath => "locator",
        }
    }
}

/// Option value inside a `{ ... }` options object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionValue {
    Text(String),
    /// Regex literal including slashes and flags, e.g. `/submit/i`.
    Regex(String),
    Bool(bool),
    Number(String),
}

impl OptionValue {
    fn to_js(&self) -> String {
        match self {
            OptionValue::Text(text) => js_quote(text),
            OptionValue::Regex(literal) | OptionValue::Number(literal) => literal.clone(),
            OptionValue::Bool(flag) => flag.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    HasText,
    HasNotText,
    Has,
    HasNot,
}

impl FilterKind {
    fn option_name(&self) -> &'static str {
        match self {
            FilterKind::HasText => "hasText",
            FilterKind::HasNotText => "hasNotText",
            FilterKind::Has => "has",
            FilterKind::HasNot => "hasNot",
        }
    }

    fn from_option(name: &str) -> Option<Self> {
        match name {
            "hasText" => Some(FilterKind::HasText),
            "hasNotText" => Some(FilterKind::HasNotText),
            "has" => Some(FilterKind::Has),
            "hasNot" => Some(FilterKind::HasNot),
            _ => None,
        }
    }
}

/// A `.filter({ ... })` step. For `Has`/`HasNot` the value is the nested
/// locator in canonical JavaScript form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorFilter {
    pub kind: FilterKind,
    pub value: String,
    #[serde(default)]
    pub is_regex: bool,
}

impl LocatorFilter {
    pub fn has_text(text: impl Into<String>) -> Self {
        Self {
            kind: FilterKind::HasText,
            value: text.into(),
            is_regex: false,
        }
    }

    pub fn has_not_text(text: impl Into<String>) -> Self {
        Self {
            kind: FilterKind::HasNotText,
            value: text.into(),
            is_regex: false,
        }
    }

    pub fn to_js_string(&self) -> String {
        let value = match self.kind {
            FilterKind::Has | FilterKind::HasNot => self.value.clone(),
            _ if self.is_regex => self.value.clone(),
            _ => js_quote(&self.value),
        };
        format!("filter({{ {}: {} }})", self.kind.option_name(), value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaywrightLocator {
    pub kind: PlaywrightLocatorKind,
    pub value: String,
    /// `value` is a regex literal rather than plain text.
    #[serde(default)]
    pub is_regex: bool,
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,
    #[serde(default)]
    pub filters: Vec<LocatorFilter>,
}

impl PlaywrightLocator {
    pub fn new(kind: PlaywrightLocatorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            is_regex: false,
            options: BTreeMap::new(),
            filters: Vec::new(),
        }
    }

    pub fn by_role(role: impl Into<String>, name: Option<&str>) -> Self {
        let mut locator = Self::new(PlaywrightLocatorKind::GetByRole, role);
        if let Some(name) = name {
            locator
                .options
                .insert("name".to_string(), OptionValue::Text(name.to_string()));
        }
        locator
    }

    pub fn with_option(mut self, key: impl Into<String>, value: OptionValue) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn with_filter(mut self, filter: LocatorFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Parse a locator expression, falling back to a CSS locator holding the
    /// raw input when it is not a recognised Playwright call chain.
    pub fn parse(input: &str) -> Self {
        Self::try_parse(input)
            .unwrap_or_else(|| Self::new(PlaywrightLocatorKind::Css, input.trim()))
    }

    /// Strict parse: `None` unless the whole input is a locator call chain.
    pub fn try_parse(input: &str) -> Option<Self> {
        let mut cursor = Cursor::new(input.trim());
        let locator = cursor.locator_chain()?;
        cursor.skip_ws();
        cursor.eat(';');
        cursor.skip_ws();
        cursor.at_end().then_some(locator)
    }

    /// True when `input` looks like a Playwright call chain rather than a
    /// plain CSS or XPath selector.
    pub fn is_locator_expression(input: &str) -> bool {
        let trimmed = input.trim();
        let body = trimmed.strip_prefix("page.").unwrap_or(trimmed);
        (body.starts_with("getBy") || body.starts_with("locator(")) && Self::try_parse(trimmed).is_some()
    }

    fn option_text(&self, key: &str) -> Option<(&str, bool)> {
        match self.options.get(key)? {
            OptionValue::Text(text) => Some((text.as_str(), false)),
            OptionValue::Regex(literal) => Some((literal.as_str(), true)),
            _ => None,
        }
    }

    fn is_exact(&self) -> bool {
        matches!(self.options.get("exact"), Some(OptionValue::Bool(true)))
    }

    /// Canonical JavaScript form without the `page.` receiver.
    pub fn to_js_string(&self) -> String {
        let first_arg = match self.kind {
            PlaywrightLocatorKind::XPath
                if !(self.value.starts_with('/') || self.value.starts_with('(')) =>
            {
                js_quote(&format!("xpath={}", self.value))
            }
            _ if self.is_regex => self.value.clone(),
            _ => js_quote(&self.value),
        };

        let mut out = format!("{}({}", self.kind.method_name(), first_arg);
        if !self.options.is_empty() {
            let mut entries: Vec<String> = Vec::with_capacity(self.options.len());
            if let Some(name) = self.options.get("name") {
                entries.push(format!("name: {}", name.to_js()));
            }
            entries.extend(
                self.options
                    .iter()
                    .filter(|(key, _)| key.as_str() != "name")
                    .map(|(key, value)| format!("{key}: {}", value.to_js())),
            );
            out.push_str(&format!(", {{ {} }}", entries.join(", ")));
        }
        out.push(')');
        for filter in &self.filters {
            out.push('.');
            out.push_str(&filter.to_js_string());
        }
        out
    }

    /// Playwright selector-engine form, e.g. `internal:role=button[name="Submit"i]`.
    pub fn to_selector_engine(&self) -> String {
        let case = if self.is_exact() { "s" } else { "i" };
        let text_arg = |value: &str, is_regex: bool| {
            if is_regex {
                value.to_string()
            } else {
                format!("{}{}", json_quote(value), case)
            }
        };

        let mut out = match self.kind {
            PlaywrightLocatorKind::GetByRole => {
                let mut role = format!("internal:role={}", self.value);
                if let Some((name, is_regex)) = self.option_text("name") {
                    role.push_str(&format!("[name={}]", text_arg(name, is_regex)));
                }
                role
            }
            PlaywrightLocatorKind::GetByText => {
                format!("internal:text={}", text_arg(&self.value, self.is_regex))
            }
            PlaywrightLocatorKind::GetByLabel => {
                format!("internal:label={}", text_arg(&self.value, self.is_regex))
            }
            PlaywrightLocatorKind::GetByPlaceholder => {
                format!("internal:attr=[placeholder={}]", text_arg(&self.value, self.is_regex))
            }
            PlaywrightLocatorKind::GetByAltText => {
                format!("internal:attr=[alt={}]", text_arg(&self.value, self.is_regex))
            }
            PlaywrightLocatorKind::GetByTitle => {
                format!("internal:attr=[title={}]", text_arg(&self.value, self.is_regex))
            }
            PlaywrightLocatorKind::GetByTestId => {
                format!("internal:testid=[data-testid={}s]", json_quote(&self.value))
            }
            PlaywrightLocatorKind::Css => self.value.clone(),
            PlaywrightLocatorKind::XPath => format!("xpath={}", self.value),
        };

        for filter in &self.filters {
            let step = match filter.kind {
                FilterKind::HasText if filter.is_regex => format!("internal:has-text={}", filter.value),
                FilterKind::HasText => format!("internal:has-text={}i", json_quote(&filter.value)),
                FilterKind::HasNotText if filter.is_regex => {
                    format!("internal:has-not-text={}", filter.value)
                }
                FilterKind::HasNotText => {
                    format!("internal:has-not-text={}i", json_quote(&filter.value))
                }
                FilterKind::Has | FilterKind::HasNot => {
                    let nested = PlaywrightLocator::parse(&filter.value).to_selector_engine();
                    let name = if filter.kind == FilterKind::Has {
                        "internal:has"
                    } else {
                        "internal:has-not"
                    };
                    format!("{name}={}", json_quote(&nested))
                }
            };
            out.push_str(" >> ");
            out.push_str(&step);
        }
        out
    }

    /// XPath approximation. `None` for CSS locators, which adapters can run
    /// as-is.
    ///
    /// Regex arguments are reduced to their literal characters and matched
    /// with `contains`, since XPath 1.0 has no regex support.
    pub fn to_xpath(&self) -> Option<String> {
        let exact = self.is_exact();
        let mut xpath = match self.kind {
            PlaywrightLocatorKind::Css => return None,
            PlaywrightLocatorKind::XPath => self.value.clone(),
            PlaywrightLocatorKind::GetByRole => {
                let mut xpath = format!("//*[{}]", role_predicate(&self.value));
                if let Some((name, is_regex)) = self.option_text("name") {
                    let (text, exact) = text_match(name, is_regex, exact);
                    let literal = xpath_literal(&text);
                    let predicate = if exact {
                        format!(
                            "normalize-space(.)={literal} or @aria-label={literal} or @value={literal} or @title={literal}"
                        )
                    } else {
                        format!(
                            "contains(normalize-space(.), {literal}) or contains(@aria-label, {literal}) or contains(@value, {literal}) or contains(@title, {literal})"
                        )
                    };
                    xpath.push_str(&format!("[{predicate}]"));
                }
                xpath
            }
            PlaywrightLocatorKind::GetByText => {
                let (text, exact) = text_match(&self.value, self.is_regex, exact);
                let literal = xpath_literal(&text);
                if exact {
                    format!("//*[text()[normalize-space(.)={literal}]]")
                } else {
                    format!("//*[text()[contains(normalize-space(.), {literal})]]")
                }
            }
            PlaywrightLocatorKind::GetByLabel => {
                let (text, _) = text_match(&self.value, self.is_regex, exact);
                let literal = xpath_literal(&text);
                format!(
                    "//*[@id=//label[contains(normalize-space(.), {literal})]/@for] | //label[contains(normalize-space(.), {literal})]//*[self::input or self::textarea or self::select] | //*[@aria-label={literal}]"
                )
            }
            PlaywrightLocatorKind::GetByPlaceholder => attribute_xpath("placeholder", self, exact),
            PlaywrightLocatorKind::GetByAltText => attribute_xpath("alt", self, exact),
            PlaywrightLocatorKind::GetByTitle => attribute_xpath("title", self, exact),
            PlaywrightLocatorKind::GetByTestId => {
                format!("//*[@data-testid={}]", xpath_literal(&self.value))
            }
        };

        if xpath.contains(" | ") && !self.filters.is_empty() {
            xpath = format!("({xpath})");
        }
        for filter in &self.filters {
            match filter.kind {
                FilterKind::HasText | FilterKind::HasNotText => {
                    let (text, _) = text_match(&filter.value, filter.is_regex, false);
                    let contains = format!("contains(normalize-space(.), {})", xpath_literal(&text));
                    if filter.kind == FilterKind::HasText {
                        xpath.push_str(&format!("[{contains}]"));
                    } else {
                        xpath.push_str(&format!("[not({contains})]"));
                    }
                }
                FilterKind::Has | FilterKind::HasNot => {
                    let Some(nested) = PlaywrightLocator::parse(&filter.value).to_xpath() else {
                        continue;
                    };
                    if nested.contains(" | ") {
                        continue;
                    }
                    let relative = format!(".{}", nested.trim_start_matches('.'));
                    if filter.kind == FilterKind::Has {
                        xpath.push_str(&format!("[{relative}]"));
                    } else {
                        xpath.push_str(&format!("[not({relative})]"));
                    }
                }
            }
        }
        Some(xpath)
    }
}

impl fmt::Display for PlaywrightLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_js_string())
    }
}

fn attribute_xpath(attribute: &str, locator: &PlaywrightLocator, exact: bool) -> String {
    let (text, exact) = text_match(&locator.value, locator.is_regex, exact);
    let literal = xpath_literal(&text);
    if exact {
        format!("//*[@{attribute}={literal}]")
    } else {
        format!("//*[contains(@{attribute}, {literal})]")
    }
}

/// Text to compare against and whether to compare exactly. Regex literals
/// become their literal characters, anchored on both ends means exact.
fn text_match(value: &str, is_regex: bool, exact: bool) -> (String, bool) {
    if !is_regex {
        return (value.to_string(), exact);
    }
    let pattern = value
        .strip_prefix('/')
        .and_then(|rest| rest.rfind('/').map(|end| &rest[..end]))
        .unwrap_or(value);
    let anchored = pattern.starts_with('^') && pattern.ends_with('$');
    let literal: String = pattern
        .chars()
        .filter(|ch| !"^$\\.*+?()[]{}|".contains(*ch))
        .collect();
    (literal, anchored)
}

fn role_predicate(role: &str) -> String {
    let role_attr = format!("@role={}", xpath_literal(role));
    match role {
        "button" => format!(
            "self::button or {role_attr} or (self::input and (@type='button' or @type='submit' or @type='reset'))"
        ),
        "link" => format!("self::a[@href] or {role_attr}"),
        "textbox" => format!(
            "(self::input and (not(@type) or @type='text' or @type='email' or @type='password' or @type='search' or @type='tel' or @type='url')) or self::textarea or {role_attr}"
        ),
        "checkbox" => format!("(self::input and @type='checkbox') or {role_attr}"),
        "radio" => format!("(self::input and @type='radio') or {role_attr}"),
        "combobox" => format!("self::select or {role_attr}"),
        "heading" => format!(
            "self::h1 or self::h2 or self::h3 or self::h4 or self::h5 or self::h6 or {role_attr}"
        ),
        "img" => format!("self::img or {role_attr}"),
        "list" => format!("self::ul or self::ol or {role_attr}"),
        "listitem" => format!("self::li or {role_attr}"),
        _ => role_attr,
    }
}

fn js_quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn json_quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{value}'")
    } else if !value.contains('"') {
        format!("\"{value}\"")
    } else {
        let parts: Vec<String> = value.split('\'').map(|part| format!("'{part}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

enum Arg {
    Text(String),
    Regex(String),
    Bool(bool),
    Number(String),
    Locator(PlaywrightLocator),
    Object(Vec<(String, Arg)>),
}

/// Byte-offset cursor over a locator expression.
struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Option<()> {
        self.skip_ws();
        self.eat(expected).then_some(())
    }

    fn ident(&mut self) -> Option<String> {
        self.skip_ws();
        let start = self.pos;
        match self.peek() {
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' || ch == '$' => {
                self.bump();
            }
            _ => return None,
        }
        while self
            .peek()
            .is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '$')
        {
            self.bump();
        }
        Some(self.src[start..self.pos].to_string())
    }

    fn string_literal(&mut self) -> Option<String> {
        let quote = self.peek().filter(|ch| matches!(ch, '\'' | '"' | '`'))?;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump()? {
                '\\' => match self.bump()? {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    other => out.push(other),
                },
                ch if ch == quote => return Some(out),
                ch => out.push(ch),
            }
        }
    }

    fn regex_literal(&mut self) -> Option<String> {
        let start = self.pos;
        if !self.eat('/') {
            return None;
        }
        let mut in_class = false;
        loop {
            match self.bump()? {
                '\\' => {
                    self.bump()?;
                }
                '[' => in_class = true,
                ']' => in_class = false,
                '/' if !in_class => break,
                _ => {}
            }
        }
        while self.peek().is_some_and(|ch| ch.is_ascii_alphabetic()) {
            self.bump();
        }
        Some(self.src[start..self.pos].to_string())
    }

    fn number(&mut self) -> Option<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '.' || ch == '-')
        {
            self.bump();
        }
        (self.pos > start).then(|| self.src[start..self.pos].to_string())
    }

    fn arg(&mut self) -> Option<Arg> {
        self.skip_ws();
        match self.peek()? {
            '\'' | '"' | '`' => self.string_literal().map(Arg::Text),
            '/' => self.regex_literal().map(Arg::Regex),
            '{' => self.object().map(Arg::Object),
            ch if ch.is_ascii_digit() || ch == '-' => self.number().map(Arg::Number),
            _ => {
                let save = self.pos;
                match self.ident()?.as_str() {
                    "true" => Some(Arg::Bool(true)),
                    "false" => Some(Arg::Bool(false)),
                    _ => {
                        self.pos = save;
                        self.locator_chain().map(Arg::Locator)
                    }
                }
            }
        }
    }

    fn object(&mut self) -> Option<Vec<(String, Arg)>> {
        self.expect('{')?;
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            if self.eat('}') {
                return Some(entries);
            }
            let key = match self.peek()? {
                '\'' | '"' => self.string_literal()?,
                _ => self.ident()?,
            };
            self.expect(':')?;
            let value = self.arg()?;
            entries.push((key, value));
            self.skip_ws();
            if !self.eat(',') {
                self.expect('}')?;
                return Some(entries);
            }
        }
    }

    fn call_args(&mut self) -> Option<Vec<Arg>> {
        self.expect('(')?;
        let mut args = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(')') {
                return Some(args);
            }
            args.push(self.arg()?);
            self.skip_ws();
            if !self.eat(',') {
                self.expect(')')?;
                return Some(args);
            }
        }
    }

    /// `[page.]method(args)(.filter({...}))*`
    fn locator_chain(&mut self) -> Option<PlaywrightLocator> {
        let mut method = self.ident()?;
        if method == "page" {
            self.expect('.')?;
            method = self.ident()?;
        }
        let kind = PlaywrightLocatorKind::from_method(&method)?;
        let mut args = self.call_args()?.into_iter();

        let mut locator = match args.next()? {
            Arg::Text(text) if kind == PlaywrightLocatorKind::Css => css_or_xpath(&text),
            Arg::Text(text) => PlaywrightLocator::new(kind, text),
            Arg::Regex(literal) if kind != PlaywrightLocatorKind::Css => {
                let mut locator = PlaywrightLocator::new(kind, literal);
                locator.is_regex = true;
                locator
            }
            _ => return None,
        };

        if let Some(Arg::Object(entries)) = args.next() {
            apply_options(&mut locator, entries, kind == PlaywrightLocatorKind::Css)?;
        }

        loop {
            let save = self.pos;
            self.skip_ws();
            if !self.eat('.') {
                self.pos = save;
                break;
            }
            if self.ident()? != "filter" {
                return None;
            }
            let mut filter_args = self.call_args()?.into_iter();
            match filter_args.next()? {
                Arg::Object(entries) => apply_options(&mut locator, entries, true)?,
                _ => return None,
            }
        }
        Some(locator)
    }
}

fn css_or_xpath(value: &str) -> PlaywrightLocator {
    if let Some(xpath) = value.strip_prefix("xpath=") {
        PlaywrightLocator::new(PlaywrightLocatorKind::XPath, xpath)
    } else if value.starts_with("//") || value.starts_with('(') {
        PlaywrightLocator::new(PlaywrightLocatorKind::XPath, value)
    } else {
        PlaywrightLocator::new(
            PlaywrightLocatorKind::Css,
            value.strip_prefix("css=").unwrap_or(value),
        )
    }
}

/// Options objects double as filter objects for `locator(..., {hasText})`
/// and `.filter({...})`.
fn apply_options(
    locator: &mut PlaywrightLocator,
    entries: Vec<(String, Arg)>,
    filters_allowed: bool,
) -> Option<()> {
    for (key, value) in entries {
        if let Some(kind) = FilterKind::from_option(&key) {
            if !filters_allowed {
                return None;
            }
            let filter = match value {
                Arg::Text(text) => LocatorFilter {
                    kind,
                    value: text,
                    is_regex: false,
                },
                Arg::Regex(literal) => LocatorFilter {
                    kind,
                    value: literal,
                    is_regex: true,
                },
                Arg::Locator(nested) => LocatorFilter {
                    kind,
                    value: nested.to_js_string(),
                    is_regex: false,
                },
                _ => return None,
            };
            locator.filters.push(filter);
            continue;
        }
        let option = match value {
            Arg::Text(text) => OptionValue::Text(text),
            Arg::Regex(literal) => OptionValue::Regex(literal),
            Arg::Bool(flag) => OptionValue::Bool(flag),
            Arg::Number(number) => OptionValue::Number(number),
            Arg::Locator(_) | Arg::Object(_) => return None,
        };
        locator.options.insert(key, option);
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get_by_role_with_options() {
        let locator = PlaywrightLocator::parse("page.getByRole('button', { name: 'Submit', exact: true })");
        assert_eq!(locator.kind, PlaywrightLocatorKind::GetByRole);
        assert_eq!(locator.value, "button");
        assert_eq!(
            locator.options.get("name"),
            Some(&OptionValue::Text("Submit".to_string()))
        );
        assert_eq!(locator.options.get("exact"), Some(&OptionValue::Bool(true)));
        assert_eq!(
            locator.to_js_string(),
            "getByRole('button', { name: 'Submit', exact: true })"
        );
        assert_eq!(
            locator.to_selector_engine(),
            "internal:role=button[name=\"Submit\"s]"
        );
    }

    #[test]
    fn test_parse_regex_text() {
        let locator = PlaywrightLocator::parse("getByText(/log ?in/i)");
        assert_eq!(locator.kind, PlaywrightLocatorKind::GetByText);
        assert!(locator.is_regex);
        assert_eq!(locator.value, "/log ?in/i");
        assert_eq!(locator.to_js_string(), "getByText(/log ?in/i)");
        assert_eq!(locator.to_selector_engine(), "internal:text=/log ?in/i");
    }

    #[test]
    fn test_parse_filters() {
        let locator = PlaywrightLocator::parse(
            "page.getByRole('listitem').filter({ hasText: 'Product 2' }).filter({ hasNotText: \"Sold out\" })",
        );
        assert_eq!(locator.filters.len(), 2);
        assert_eq!(locator.filters[0], LocatorFilter::has_text("Product 2"));
        assert_eq!(locator.filters[1], LocatorFilter::has_not_text("Sold out"));
        assert_eq!(
            locator.to_js_string(),
            "getByRole('listitem').filter({ hasText: 'Product 2' }).filter({ hasNotText: 'Sold out' })"
        );
    }

    #[test]
    fn test_parse_locator_css_and_xpath() {
        let css = PlaywrightLocator::parse("page.locator('#login')");
        assert_eq!(css.kind, PlaywrightLocatorKind::Css);
        assert_eq!(css.value, "#login");
        assert_eq!(css.to_xpath(), None);

        let xpath = PlaywrightLocator::parse("locator('xpath=//div[@id=\"x\"]')");
        assert_eq!(xpath.kind, PlaywrightLocatorKind::XPath);
        assert_eq!(xpath.value, "//div[@id=\"x\"]");
        assert_eq!(xpath.to_xpath().as_deref(), Some("//div[@id=\"x\"]"));
    }

    #[test]
    fn test_unparseable_becomes_css() {
        let locator = PlaywrightLocator::parse("div.card > span");
        assert_eq!(locator.kind, PlaywrightLocatorKind::Css);
        assert_eq!(locator.value, "div.card > span");
        assert!(PlaywrightLocator::try_parse("getByRole('button').click()").is_none());
        assert!(!PlaywrightLocator::is_locator_expression("#login"));
        assert!(PlaywrightLocator::is_locator_expression("page.getByTestId('save')"));
    }

    #[test]
    fn test_nested_has_filter() {
        let locator = PlaywrightLocator::parse(
            "getByRole('listitem').filter({ has: page.getByRole('button', { name: 'Buy' }) })",
        );
        assert_eq!(locator.filters[0].kind, FilterKind::Has);
        assert_eq!(locator.filters[0].value, "getByRole('button', { name: 'Buy' })");
        let xpath = locator.to_xpath().unwrap();
        assert!(xpath.starts_with("//*[self::li or @role='listitem']"));
        assert!(xpath.contains("[.//*[self::button"));
    }

    #[test]
    fn test_xpath_rendering() {
        let role = PlaywrightLocator::by_role("button", Some("Sign in"));
        assert_eq!(
            role.to_xpath().unwrap(),
            "//*[self::button or @role='button' or (self::input and (@type='button' or @type='submit' or @type='reset'))][contains(normalize-space(.), 'Sign in') or contains(@aria-label, 'Sign in') or contains(@value, 'Sign in') or contains(@title, 'Sign in')]"
        );

        let test_id = PlaywrightLocator::parse("getByTestId('save')");
        assert_eq!(test_id.to_xpath().unwrap(), "//*[@data-testid='save']");

        let text = PlaywrightLocator::parse("getByText('Welcome', { exact: true })");
        assert_eq!(
            text.to_xpath().unwrap(),
            "//*[text()[normalize-space(.)='Welcome']]"
        );

        let placeholder = PlaywrightLocator::parse("getByPlaceholder('Email')");
        assert_eq!(placeholder.to_xpath().unwrap(), "//*[contains(@placeholder, 'Email')]");
    }

    #[test]
    fn test_xpath_literal_quotes() {
        assert_eq!(xpath_literal("plain"), "'plain'");
        assert_eq!(xpath_literal("it's"), "\"it's\"");
        assert_eq!(xpath_literal("a'b\"c"), "concat('a', \"'\", 'b\"c')");
    }

    #[test]
    fn test_selector_engine_for_attributes() {
        assert_eq!(
            PlaywrightLocator::parse("getByPlaceholder('Email')").to_selector_engine(),
            "internal:attr=[placeholder=\"Email\"i]"
        );
        assert_eq!(
            PlaywrightLocator::parse("getByTestId('save')").to_selector_engine(),
            "internal:testid=[data-testid=\"save\"s]"
        );
        assert_eq!(
            PlaywrightLocator::parse("getByText('Hi').filter({ hasText: 'there' })").to_selector_engine(),
            "internal:text=\"Hi\"i >> internal:has-text=\"there\"i"
        );
    }
}
