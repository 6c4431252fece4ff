//! Page fixtures: a page described in YAML or JSON for offline healing runs.
//!
//! ```yaml
//! page_source: "<html>...</html>"
//! screenshot_path: login.png        # relative to the fixture file
//! elements:
//!   "#login-btn": []                 # the broken selector matches nothing
//!   "button[data-testid='mock-element']":
//!     - handle: btn-1
//!       tag_name: button
//!       text: Sign in
//!       attributes: { id: signin }
//! contexts:
//!   btn-1: { parent_container: "form#login" }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use autoheal_core_types::{AutomationFramework, ElementContext, WebElement};
use serde::{Deserialize, Serialize};

use crate::errors::{AdapterError, AdapterResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageFixture {
    #[serde(default)]
    pub framework: AutomationFramework,
    #[serde(default)]
    pub page_source: Option<String>,
    #[serde(default)]
    pub screenshot_path: Option<PathBuf>,
    #[serde(default)]
    pub elements: BTreeMap<String, Vec<WebElement>>,
    /// Element contexts keyed by element handle.
    #[serde(default)]
    pub contexts: BTreeMap<String, ElementContext>,
}

impl PageFixture {
    /// Parse a fixture. JSON is valid YAML, so one parser covers both.
    pub fn parse(input: &str) -> AdapterResult<Self> {
        serde_yaml::from_str(input).map_err(|err| AdapterError::Fixture(err.to_string()))
    }

    pub async fn load(path: impl AsRef<Path>) -> AdapterResult<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|err| {
            AdapterError::Fixture(format!("failed to read {}: {err}", path.display()))
        })?;
        let mut fixture: PageFixture = serde_yaml::from_str(&raw)
            .map_err(|err| AdapterError::Fixture(format!("{}: {err}", path.display())))?;

        if let Some(shot) = fixture.screenshot_path.take() {
            let resolved = if shot.is_relative() {
                path.parent().map(|dir| dir.join(&shot)).unwrap_or(shot)
            } else {
                shot
            };
            fixture.screenshot_path = Some(resolved);
        }
        Ok(fixture)
    }

    /// Screenshot bytes, if the fixture names a screenshot file.
    pub async fn read_screenshot(&self) -> AdapterResult<Option<Vec<u8>>> {
        match &self.screenshot_path {
            Some(path) => tokio::fs::read(path).await.map(Some).map_err(|err| {
                AdapterError::Fixture(format!("failed to read screenshot {}: {err}", path.display()))
            }),
            None => Ok(None),
        }
    }

    pub fn element_count(&self) -> usize {
        self.elements.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r##"
page_source: "<html><body><button id='signin'>Sign in</button></body></html>"
elements:
  "#login-btn": []
  "button[data-testid='mock-element']":
    - handle: btn-1
      tag_name: button
      text: Sign in
      attributes:
        id: signin
contexts:
  btn-1:
    parent_container: "form#login"
"##;

    #[test]
    fn test_parse_yaml_fixture() {
        let fixture = PageFixture::parse(FIXTURE).unwrap();
        assert_eq!(fixture.framework, AutomationFramework::Selenium);
        assert_eq!(fixture.element_count(), 1);
        let button = &fixture.elements["button[data-testid='mock-element']"][0];
        assert_eq!(button.attribute("id"), Some("signin"));
        assert!(button.displayed);
        assert_eq!(
            fixture.contexts["btn-1"].parent_container.as_deref(),
            Some("form#login")
        );
    }

    #[test]
    fn test_parse_json_fixture() {
        let fixture = PageFixture::parse(
            r##"{"framework": "playwright", "elements": {"#a": [{"handle": "a1", "tag_name": "a"}]}}"##,
        )
        .unwrap();
        assert_eq!(fixture.framework, AutomationFramework::Playwright);
        assert_eq!(fixture.element_count(), 1);
        assert!(fixture.page_source.is_none());
    }

    #[tokio::test]
    async fn test_screenshot_path_is_relative_to_fixture() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("shot.png"), [1u8, 2, 3]).unwrap();
        let fixture_path = dir.path().join("page.yaml");
        std::fs::write(&fixture_path, "screenshot_path: shot.png\n").unwrap();

        let fixture = PageFixture::load(&fixture_path).await.unwrap();
        assert_eq!(fixture.screenshot_path, Some(dir.path().join("shot.png")));
        assert_eq!(fixture.read_screenshot().await.unwrap(), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_missing_file_is_fixture_error() {
        let err = PageFixture::load("/nonexistent/page.yaml").await.unwrap_err();
        assert!(matches!(err, AdapterError::Fixture(_)));
    }
}
