//! Browser automation adapters.
//!
//! The locator never talks to a browser directly; it goes through
//! [`WebAutomationAdapter`]. [`MockWebAutomationAdapter`] serves canned
//! elements (optionally loaded from a fixture file) and [`WebDriverAdapter`]
//! speaks W3C WebDriver to chromedriver, geckodriver or a Selenium Grid.

pub mod errors;
pub mod fixture;
pub mod mock;
pub mod webdriver;

use async_trait::async_trait;
use autoheal_core_types::{AutomationFramework, ElementContext, LocatorSpec, WebElement};

pub use errors::{AdapterError, AdapterResult};
pub use fixture::PageFixture;
pub use mock::MockWebAutomationAdapter;
pub use webdriver::WebDriverAdapter;

#[async_trait]
pub trait WebAutomationAdapter: Send + Sync {
    fn framework(&self) -> AutomationFramework;

    /// Find elements for a selector whose type is detected from its shape.
    async fn find_elements(&self, selector: &str) -> AdapterResult<Vec<WebElement>>;

    async fn find_elements_by(&self, spec: &LocatorSpec) -> AdapterResult<Vec<WebElement>>;

    async fn page_source(&self) -> AdapterResult<String>;

    /// PNG bytes; empty when the adapter has nothing to show.
    async fn take_screenshot(&self) -> AdapterResult<Vec<u8>>;

    async fn element_context(&self, element: &WebElement) -> AdapterResult<ElementContext>;
}
