//! Ranking of strategy results and heuristic element scoring

use std::cmp::Ordering;

use autoheal_core_types::{ElementFingerprint, LocatorStrategy, WebElement};

use crate::types::LocatorResult;

pub use autoheal_ai_service::heuristic_pick;

const VISIBILITY_WEIGHT: f64 = 0.2;
const TEXT_WEIGHT: f64 = 0.4;
const ATTRIBUTE_WEIGHT: f64 = 0.2;
const FINGERPRINT_WEIGHT: f64 = 0.2;

const SCORED_ATTRIBUTES: [&str; 5] = ["aria-label", "id", "class", "name", "placeholder"];

pub struct ConfidenceScorer;

impl ConfidenceScorer {
    /// Highest confidence first; ties go to the lower `priority` of the
    /// strategy that produced the result.
    pub fn rank(
        mut results: Vec<LocatorResult>,
        priority: impl Fn(LocatorStrategy) -> usize,
    ) -> Vec<LocatorResult> {
        results.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
                .then_with(|| priority(a.strategy).cmp(&priority(b.strategy)))
        });
        results
    }

    pub fn best(
        results: Vec<LocatorResult>,
        priority: impl Fn(LocatorStrategy) -> usize,
    ) -> Option<LocatorResult> {
        Self::rank(results, priority).into_iter().next()
    }

    /// Heuristic fit of `element` to `description`, in `[0, 1]`.
    pub fn score_candidate(
        element: &WebElement,
        description: &str,
        reference: Option<&ElementFingerprint>,
    ) -> f64 {
        let mut score = 0.0;
        if element.displayed {
            score += VISIBILITY_WEIGHT;
        }
        score += TEXT_WEIGHT * text_match(&element.text, description);

        let tokens = tokens(description);
        let attribute_hit = SCORED_ATTRIBUTES.iter().any(|name| {
            element.attribute(name).is_some_and(|value| {
                let value = value.to_lowercase();
                tokens.iter().any(|token| value.contains(token.as_str()))
            })
        });
        if attribute_hit {
            score += ATTRIBUTE_WEIGHT;
        }

        if let Some(reference) = reference {
            score += FINGERPRINT_WEIGHT * reference.similarity(&fingerprint_of(element));
        }
        score.clamp(0.0, 1.0)
    }
}

/// 1.0 when either text contains the other, otherwise the share of
/// description words found in the element text.
fn text_match(text: &str, description: &str) -> f64 {
    let text = text.trim().to_lowercase();
    let description = description.trim().to_lowercase();
    if text.is_empty() || description.is_empty() {
        return 0.0;
    }
    if text.contains(&description) || description.contains(&text) {
        return 1.0;
    }
    let words = tokens(&description);
    if words.is_empty() {
        return 0.0;
    }
    let found = words.iter().filter(|word| text.contains(word.as_str())).count();
    found as f64 / words.len() as f64
}

fn tokens(description: &str) -> Vec<String> {
    description
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.len() > 1)
        .map(str::to_lowercase)
        .collect()
}

fn fingerprint_of(element: &WebElement) -> ElementFingerprint {
    let mut builder = ElementFingerprint::builder()
        .tag_name(element.tag_name.clone())
        .text(element.text.clone());
    if let Some(id) = element.attribute("id") {
        builder = builder.id(id);
    }
    if let Some(class) = element.attribute("class") {
        builder = builder.class_name(class);
    }
    if let Some(rect) = element.rect {
        builder = builder.position(rect);
    }
    builder.build()
}

/// Pick among several matches for a visual suggestion: visible elements
/// when there are any, then the first whose text and the description
/// contain one another, then the first.
pub fn select_best_element<'a>(elements: &'a [WebElement], description: &str) -> Option<&'a WebElement> {
    match elements {
        [] => None,
        [only] => Some(only),
        _ => {
            let visible: Vec<&WebElement> = elements.iter().filter(|e| e.displayed).collect();
            let pool: Vec<&WebElement> = if visible.is_empty() {
                elements.iter().collect()
            } else {
                visible
            };
            let needle = description.trim().to_lowercase();
            pool.iter()
                .copied()
                .find(|element| {
                    let text = element.text.trim().to_lowercase();
                    !text.is_empty()
                        && !needle.is_empty()
                        && (text.contains(&needle) || needle.contains(&text))
                })
                .or_else(|| pool.first().copied())
        }
    }
}
