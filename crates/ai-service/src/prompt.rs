//! Prompts sent to providers and parsing of their JSON replies.

use autoheal_core_types::{
    AiAnalysisResult, ElementCandidate, PlaywrightLocator, TokenUsage, WebElement,
};
use serde::Deserialize;

use crate::errors::AiError;
use crate::utils::{extract_json_object, truncate_chars};

const SYSTEM_PROMPT: &str = "You are an expert in web UI test automation. You locate page elements from a short human description and answer with strictly valid JSON, no prose. Prefer stable selectors: ids, data-testid, name and aria attributes over positional or styling classes.";

const ANALYSIS_SCHEMA: &str = "{\"selector\": string, \"confidence\": number between 0 and 1, \"reasoning\": string, \"alternatives\": [{\"selector\": string, \"confidence\": number, \"description\": string}]}";

/// Longest element text quoted in a disambiguation list.
const ELEMENT_TEXT_PREVIEW: usize = 80;

pub struct PromptBuilder {
    max_dom_chars: usize,
}

impl PromptBuilder {
    pub fn new(max_dom_chars: usize) -> Self {
        Self { max_dom_chars }
    }

    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    pub fn dom_prompt(&self, html: &str, description: &str, previous_selector: Option<&str>) -> String {
        let mut sections = Vec::new();
        sections.push(format!("Find the element described as: \"{}\"", description.trim()));
        if let Some(previous) = previous_selector.filter(|s| !s.trim().is_empty()) {
            sections.push(format!(
                "The selector `{}` used to match it but no longer does. Suggest a replacement.",
                previous.trim()
            ));
        }
        let truncated = truncate_chars(html, self.max_dom_chars);
        if truncated.len() < html.len() {
            sections.push(format!(
                "Page HTML (first {} characters):\n{}",
                self.max_dom_chars, truncated
            ));
        } else {
            sections.push(format!("Page HTML:\n{}", truncated));
        }
        sections.push(format!(
            "Answer with a CSS selector, an XPath, or a Playwright locator such as getByRole('button', {{ name: 'Submit' }}). Respond with JSON only:\n{}",
            ANALYSIS_SCHEMA
        ));
        sections.join("\n\n")
    }

    pub fn visual_prompt(&self, description: &str) -> String {
        format!(
            "The attached screenshot shows a web page. Identify the element described as: \"{}\".\n\nGive the most reliable selector for it. List fallbacks in \"alternatives\"; set each alternative's \"description\" to \"text-based\" when it matches on visible text and \"attribute-based\" when it matches on attributes. Respond with JSON only:\n{}",
            description.trim(),
            ANALYSIS_SCHEMA
        )
    }

    pub fn disambiguation_prompt(&self, elements: &[WebElement], description: &str) -> String {
        let listing = elements
            .iter()
            .enumerate()
            .map(|(idx, element)| format!("{}. {}", idx + 1, summarize_element(element)))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Several elements matched. Which one is best described as: \"{}\"?\n\n{}\n\nRespond with JSON only: {{\"index\": <number from 1 to {}>}}",
            description.trim(),
            listing,
            elements.len()
        )
    }
}

fn summarize_element(element: &WebElement) -> String {
    let mut parts = vec![format!("<{}>", element.tag_name)];
    for key in ["id", "class", "name", "type", "aria-label", "data-testid", "placeholder"] {
        if let Some(value) = element.attribute(key).filter(|v| !v.is_empty()) {
            parts.push(format!("{key}=\"{value}\""));
        }
    }
    let text = element.text.trim();
    if !text.is_empty() {
        parts.push(format!("text=\"{}\"", truncate_chars(text, ELEMENT_TEXT_PREVIEW)));
    }
    if !element.displayed {
        parts.push("hidden".to_string());
    }
    parts.join(" ")
}

#[derive(Debug, Deserialize)]
struct AnalysisPayload {
    #[serde(default, alias = "recommendedSelector", alias = "recommended_selector")]
    selector: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    alternatives: Vec<AlternativePayload>,
}

#[derive(Debug, Deserialize)]
struct AlternativePayload {
    selector: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndexPayload {
    index: usize,
}

/// Turn a provider reply into an analysis result.
pub fn parse_analysis(raw: &str, usage: Option<TokenUsage>) -> Result<AiAnalysisResult, AiError> {
    let json = extract_json_object(raw)
        .ok_or_else(|| AiError::InvalidResponse("response contains no JSON object".to_string()))?;
    let payload: AnalysisPayload = serde_json::from_str(&json)
        .map_err(|err| AiError::InvalidResponse(format!("failed to parse analysis JSON: {err}")))?;

    let selector = payload
        .selector
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AiError::InvalidResponse("analysis JSON has no selector".to_string()))?;

    let alternatives = payload
        .alternatives
        .into_iter()
        .filter(|alt| !alt.selector.trim().is_empty())
        .map(|alt| {
            ElementCandidate::new(
                alt.selector.trim(),
                alt.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
                alt.description.unwrap_or_default(),
            )
        })
        .collect();

    let mut builder = AiAnalysisResult::builder(selector.clone())
        .confidence(payload.confidence.unwrap_or(0.0))
        .reasoning(payload.reasoning.unwrap_or_default())
        .alternatives(alternatives)
        .token_usage(usage);
    if PlaywrightLocator::is_locator_expression(&selector) {
        builder = builder.playwright_locator(PlaywrightLocator::parse(&selector));
    }
    Ok(builder.build())
}

/// Zero-based index chosen by the model, if it is in range.
pub fn parse_index(raw: &str, len: usize) -> Option<usize> {
    let json = extract_json_object(raw)?;
    let payload: IndexPayload = serde_json::from_str(&json).ok()?;
    (1..=len).contains(&payload.index).then(|| payload.index - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoheal_core_types::AutomationFramework;

    #[test]
    fn test_dom_prompt_truncates_html() {
        let builder = PromptBuilder::new(10);
        let prompt = builder.dom_prompt("<div>ééééééééééééé</div>", "login button", Some("#old"));
        assert!(prompt.contains("\"login button\""));
        assert!(prompt.contains("`#old`"));
        assert!(prompt.contains("first 10 characters"));
        assert!(prompt.contains("<div>ééééé\n"));
        assert!(!prompt.contains("</div>"));
    }

    #[test]
    fn test_dom_prompt_keeps_short_html() {
        let prompt = PromptBuilder::new(100).dom_prompt("<p>x</p>", "para", None);
        assert!(prompt.contains("Page HTML:\n<p>x</p>"));
        assert!(!prompt.contains("no longer"));
    }

    #[test]
    fn test_visual_prompt_names_alternative_kinds() {
        let prompt = PromptBuilder::new(100).visual_prompt("cart icon");
        assert!(prompt.contains("text-based"));
        assert!(prompt.contains("attribute-based"));
    }

    #[test]
    fn test_disambiguation_prompt_lists_elements() {
        let elements = vec![
            WebElement::new("e1", "button").with_text("Cancel"),
            WebElement::new("e2", "button")
                .with_attribute("id", "ok")
                .with_text("OK"),
        ];
        let prompt = PromptBuilder::new(100).disambiguation_prompt(&elements, "confirm");
        assert!(prompt.contains("1. <button> text=\"Cancel\""));
        assert!(prompt.contains("2. <button> id=\"ok\" text=\"OK\""));
        assert!(prompt.contains("from 1 to 2"));
    }

    #[test]
    fn test_parse_analysis_accepts_recommended_selector() {
        let raw = "```json\n{\"recommendedSelector\": \"#submit\", \"confidence\": 1.4, \"reasoning\": \"id match\", \"alternatives\": [{\"selector\": \"button[type=submit]\", \"confidence\": 0.6, \"description\": \"attribute-based\"}]}\n```";
        let result = parse_analysis(raw, Some(TokenUsage::new(100, 20))).unwrap();
        assert_eq!(result.recommended_selector, "#submit");
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.reasoning, "id match");
        assert_eq!(result.alternatives.len(), 1);
        assert_eq!(result.alternatives[0].description, "attribute-based");
        assert_eq!(result.token_usage, Some(TokenUsage::new(100, 20)));
        assert_eq!(result.target_framework, AutomationFramework::Selenium);
    }

    #[test]
    fn test_parse_analysis_detects_playwright_locator() {
        let raw = r#"{"selector": "getByRole('button', { name: 'Save' })", "confidence": 0.9}"#;
        let result = parse_analysis(raw, None).unwrap();
        assert_eq!(result.target_framework, AutomationFramework::Playwright);
        assert!(result.playwright_locator.is_some());
    }

    #[test]
    fn test_parse_analysis_ignores_trailing_prose() {
        let raw = "{\"selector\": \"#login\", \"confidence\": 0.9} Let me know if you need anything else!";
        let result = parse_analysis(raw, None).unwrap();
        assert_eq!(result.recommended_selector, "#login");
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn test_parse_analysis_requires_selector() {
        assert!(matches!(
            parse_analysis("{\"confidence\": 0.5}", None),
            Err(AiError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_analysis("I could not find it", None),
            Err(AiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_index_bounds() {
        assert_eq!(parse_index("{\"index\": 2}", 3), Some(1));
        assert_eq!(parse_index("{\"index\": 0}", 3), None);
        assert_eq!(parse_index("{\"index\": 4}", 3), None);
        assert_eq!(parse_index("nope", 3), None);
    }
}
