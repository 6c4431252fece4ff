//! In-memory adapter keyed by raw selector strings

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use autoheal_core_types::{
    AutomationFramework, ElementContext, LocatorSpec, Position, WebElement,
};
use parking_lot::RwLock;
use tracing::debug;

use crate::errors::AdapterResult;
use crate::fixture::PageFixture;
use crate::WebAutomationAdapter;

pub const DEFAULT_PAGE_SOURCE: &str = "<html><body>Mock page</body></html>";

#[derive(Default)]
struct MockPage {
    elements: HashMap<String, Vec<WebElement>>,
    contexts: HashMap<String, ElementContext>,
    page_source: Option<String>,
    screenshot: Vec<u8>,
}

pub struct MockWebAutomationAdapter {
    framework: AutomationFramework,
    page: RwLock<MockPage>,
}

impl Default for MockWebAutomationAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWebAutomationAdapter {
    pub fn new() -> Self {
        Self {
            framework: AutomationFramework::Selenium,
            page: RwLock::new(MockPage::default()),
        }
    }

    pub fn with_framework(mut self, framework: AutomationFramework) -> Self {
        self.framework = framework;
        self
    }

    /// Adapter serving everything a fixture describes.
    pub async fn from_fixture_file(path: impl AsRef<Path>) -> AdapterResult<Self> {
        let fixture = PageFixture::load(path).await?;
        let screenshot = fixture.read_screenshot().await?.unwrap_or_default();
        let adapter = Self::from_fixture(fixture);
        adapter.set_screenshot(screenshot);
        Ok(adapter)
    }

    pub fn from_fixture(fixture: PageFixture) -> Self {
        debug!(
            elements = fixture.element_count(),
            selectors = fixture.elements.len(),
            "Loading mock page fixture"
        );
        let page = MockPage {
            elements: fixture.elements.into_iter().collect(),
            contexts: fixture.contexts.into_iter().collect(),
            page_source: fixture.page_source,
            screenshot: Vec::new(),
        };
        Self {
            framework: fixture.framework,
            page: RwLock::new(page),
        }
    }

    pub fn add_mock_element(&self, selector: impl Into<String>, element: WebElement) {
        let selector = selector.into();
        debug!(selector = %selector, handle = %element.handle, "Added mock element");
        self.page
            .write()
            .elements
            .entry(selector)
            .or_default()
            .push(element);
    }

    /// Register a selector that matches nothing.
    pub fn add_empty_selector(&self, selector: impl Into<String>) {
        self.page.write().elements.entry(selector.into()).or_default();
    }

    pub fn remove_selector(&self, selector: &str) {
        self.page.write().elements.remove(selector);
    }

    pub fn set_page_source(&self, source: impl Into<String>) {
        self.page.write().page_source = Some(source.into());
    }

    pub fn set_screenshot(&self, png: Vec<u8>) {
        self.page.write().screenshot = png;
    }

    pub fn set_element_context(&self, handle: impl Into<String>, context: ElementContext) {
        self.page.write().contexts.insert(handle.into(), context);
    }

    fn lookup(&self, key: &str) -> Vec<WebElement> {
        self.page
            .read()
            .elements
            .get(key)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl WebAutomationAdapter for MockWebAutomationAdapter {
    fn framework(&self) -> AutomationFramework {
        self.framework
    }

    async fn find_elements(&self, selector: &str) -> AdapterResult<Vec<WebElement>> {
        let elements = self.lookup(selector);
        debug!(selector, count = elements.len(), "Mock found elements");
        Ok(elements)
    }

    async fn find_elements_by(&self, spec: &LocatorSpec) -> AdapterResult<Vec<WebElement>> {
        let key = spec.to_selector_string();
        let elements = self.lookup(&key);
        debug!(locator = %spec, count = elements.len(), "Mock found elements");
        Ok(elements)
    }

    async fn page_source(&self) -> AdapterResult<String> {
        Ok(self
            .page
            .read()
            .page_source
            .clone()
            .unwrap_or_else(|| DEFAULT_PAGE_SOURCE.to_string()))
    }

    async fn take_screenshot(&self) -> AdapterResult<Vec<u8>> {
        Ok(self.page.read().screenshot.clone())
    }

    async fn element_context(&self, element: &WebElement) -> AdapterResult<ElementContext> {
        if let Some(context) = self.page.read().contexts.get(&element.handle) {
            return Ok(context.clone());
        }
        Ok(ElementContext::new()
            .with_parent("mock-parent")
            .with_position(Position::new(100, 100, 50, 20))
            .with_text("Mock Element"))
    }
}
