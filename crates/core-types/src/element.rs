//! Element snapshots, positions and fingerprints.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum distance (in CSS pixels) used to normalize position similarity.
const POSITION_NORMALIZER: f64 = 1000.0;

const PARENT_WEIGHT: f64 = 0.3;
const POSITION_WEIGHT: f64 = 0.2;
const TEXT_WEIGHT: f64 = 0.3;
const STYLE_WEIGHT: f64 = 0.2;

/// Bounding box of an element on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Position {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Euclidean distance between the top-left corners.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Position{{x={}, y={}, width={}, height={}}}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Structural and visual signature of an element, used to judge whether a
/// healed element is "the same" element as a previously cached one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementFingerprint {
    #[serde(default)]
    pub parent_chain: String,
    #[serde(default)]
    pub screen_position: Option<Position>,
    #[serde(default)]
    pub computed_styles: BTreeMap<String, String>,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub nearby_elements: Vec<String>,
    #[serde(default)]
    pub visual_hash: Option<String>,
}

impl ElementFingerprint {
    pub fn builder() -> ElementFingerprintBuilder {
        ElementFingerprintBuilder::default()
    }

    /// Weighted similarity in `[0.0, 1.0]`.
    pub fn similarity(&self, other: &ElementFingerprint) -> f64 {
        let parent = string_similarity(Some(self.parent_chain.as_str()), Some(other.parent_chain.as_str()));
        let position = position_similarity(self.screen_position, other.screen_position);
        let text = string_similarity(Some(self.text_content.as_str()), Some(other.text_content.as_str()));
        let style = style_similarity(&self.computed_styles, &other.computed_styles);

        parent * PARENT_WEIGHT + position * POSITION_WEIGHT + text * TEXT_WEIGHT + style * STYLE_WEIGHT
    }
}

/// Builder mirroring how adapters collect fingerprint parts piecemeal.
#[derive(Debug, Default)]
pub struct ElementFingerprintBuilder {
    tag_name: Option<String>,
    id: Option<String>,
    class_name: Option<String>,
    text: Option<String>,
    position: Option<Position>,
    parent_chain: Option<String>,
    computed_styles: BTreeMap<String, String>,
    nearby_elements: Vec<String>,
    visual_hash: Option<String>,
}

impl ElementFingerprintBuilder {
    pub fn tag_name(mut self, tag: impl Into<String>) -> Self {
        self.tag_name = Some(tag.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn class_name(mut self, class: impl Into<String>) -> Self {
        self.class_name = Some(class.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn parent_chain(mut self, chain: impl Into<String>) -> Self {
        self.parent_chain = Some(chain.into());
        self
    }

    pub fn computed_styles(mut self, styles: BTreeMap<String, String>) -> Self {
        self.computed_styles = styles;
        self
    }

    pub fn nearby_elements(mut self, elements: Vec<String>) -> Self {
        self.nearby_elements = elements;
        self
    }

    pub fn visual_hash(mut self, hash: impl Into<String>) -> Self {
        self.visual_hash = Some(hash.into());
        self
    }

    pub fn build(self) -> ElementFingerprint {
        // tag/id/class are folded into the parent chain tail so they take part
        // in the structural comparison.
        let mut chain = self.parent_chain.unwrap_or_default();
        if let Some(tag) = self.tag_name {
            let mut tail = tag;
            if let Some(id) = self.id.filter(|v| !v.is_empty()) {
                tail.push('#');
                tail.push_str(&id);
            }
            if let Some(class) = self.class_name.filter(|v| !v.is_empty()) {
                for part in class.split_whitespace() {
                    tail.push('.');
                    tail.push_str(part);
                }
            }
            if chain.is_empty() {
                chain = tail;
            } else {
                chain = format!("{chain} > {tail}");
            }
        }

        ElementFingerprint {
            parent_chain: chain,
            screen_position: self.position,
            computed_styles: self.computed_styles,
            text_content: self.text.unwrap_or_default(),
            nearby_elements: self.nearby_elements,
            visual_hash: self.visual_hash,
        }
    }
}

pub(crate) fn string_similarity(a: Option<&str>, b: Option<&str>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };
    if a == b {
        return 1.0;
    }
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    let longest = len_a.max(len_b);
    if longest == 0 {
        return 1.0;
    }
    1.0 - (len_a.abs_diff(len_b) as f64) / longest as f64
}

fn position_similarity(a: Option<Position>, b: Option<Position>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => (1.0 - a.distance_to(&b) / POSITION_NORMALIZER).max(0.0),
        _ => 0.0,
    }
}

fn style_similarity(a: &BTreeMap<String, String>, b: &BTreeMap<String, String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
    let matches = keys.iter().filter(|key| a.get(**key) == b.get(**key)).count();
    matches as f64 / keys.len() as f64
}

/// Surroundings of an element captured by an adapter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementContext {
    #[serde(default)]
    pub parent_container: Option<String>,
    #[serde(default)]
    pub relative_position: Option<Position>,
    #[serde(default)]
    pub sibling_elements: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub fingerprint: Option<ElementFingerprint>,
}

impl ElementContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_container = Some(parent.into());
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.relative_position = Some(position);
        self
    }

    pub fn with_siblings(mut self, siblings: Vec<String>) -> Self {
        self.sibling_elements = siblings;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_page_url(self, url: impl Into<String>) -> Self {
        self.with_attribute("pageUrl", url)
    }

    pub fn with_fingerprint(mut self, fingerprint: ElementFingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    /// Stored fingerprint, or one derived from the captured context fields.
    pub fn fingerprint_or_derived(&self) -> ElementFingerprint {
        if let Some(fingerprint) = &self.fingerprint {
            return fingerprint.clone();
        }
        ElementFingerprint {
            parent_chain: self.parent_container.clone().unwrap_or_default(),
            screen_position: self.relative_position,
            computed_styles: BTreeMap::new(),
            text_content: self.text_content.clone().unwrap_or_default(),
            nearby_elements: self.sibling_elements.clone(),
            visual_hash: None,
        }
    }
}

/// Adapter-neutral snapshot of a live element.
///
/// `handle` is the adapter's opaque reference (a WebDriver element id, a
/// fixture key, ...). Equality is by handle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebElement {
    pub handle: String,
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default = "default_displayed")]
    pub displayed: bool,
    #[serde(default)]
    pub rect: Option<Position>,
}

fn default_displayed() -> bool {
    true
}

impl PartialEq for WebElement {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for WebElement {}

impl WebElement {
    pub fn new(handle: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            tag_name: tag_name.into(),
            displayed: true,
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_displayed(mut self, displayed: bool) -> Self {
        self.displayed = displayed;
        self
    }

    pub fn with_rect(mut self, rect: Position) -> Self {
        self.rect = Some(rect);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// `tag#id.class` summary used in reports; missing parts render as `null`.
    pub fn describe(&self) -> String {
        format!(
            "{}#{}.{}",
            self.tag_name,
            self.attribute("id").unwrap_or("null"),
            self.attribute("class").unwrap_or("null")
        )
    }

    /// Best-effort selector for the element itself: id, then name, then
    /// first class, then tag name.
    pub fn inferred_selector(&self) -> String {
        if let Some(id) = self.attribute("id").filter(|v| !v.is_empty()) {
            return format!("#{id}");
        }
        if let Some(name) = self.attribute("name").filter(|v| !v.is_empty()) {
            return format!("[name='{name}']");
        }
        if let Some(class) = self
            .attribute("class")
            .and_then(|v| v.split_whitespace().next())
        {
            return format!(".{class}");
        }
        self.tag_name.clone()
    }
}
