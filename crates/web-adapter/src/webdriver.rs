//! W3C WebDriver client for chromedriver, geckodriver and Selenium Grid.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use autoheal_core_types::{
    AutomationFramework, ElementContext, ElementFingerprint, LocatorSpec, LocatorType,
    PlaywrightLocator, PlaywrightLocatorKind, Position, WebElement,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::errors::{AdapterError, AdapterResult};
use crate::WebAutomationAdapter;

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const LEGACY_ELEMENT_KEY: &str = "ELEMENT";
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

const SNAPSHOT_ATTRIBUTES: [&str; 12] = [
    "id",
    "class",
    "name",
    "type",
    "aria-label",
    "placeholder",
    "data-testid",
    "href",
    "role",
    "title",
    "alt",
    "value",
];

const ATTRIBUTES_SCRIPT: &str = r#"
const el = arguments[0];
const out = {};
for (const name of arguments[1]) {
  const value = el.getAttribute(name);
  if (value !== null) { out[name] = value; }
}
return out;
"#;

const CONTEXT_SCRIPT: &str = r#"
const el = arguments[0];
const describe = (node) => {
  let part = node.tagName.toLowerCase();
  if (node.id) { part += '#' + node.id; }
  return part;
};
const chain = [];
let parent = el.parentElement;
while (parent && parent.tagName.toLowerCase() !== 'html') {
  chain.unshift(describe(parent));
  parent = parent.parentElement;
}
const siblings = el.parentElement
  ? Array.from(el.parentElement.children).filter((n) => n !== el).map((n) => n.tagName.toLowerCase())
  : [];
const computed = window.getComputedStyle(el);
const styles = {};
for (const name of ['display', 'visibility', 'color', 'background-color', 'font-size', 'font-weight']) {
  styles[name] = computed.getPropertyValue(name);
}
const rect = el.getBoundingClientRect();
return {
  parentChain: chain.join(' > '),
  siblings: siblings,
  styles: styles,
  rect: { x: rect.x, y: rect.y, width: rect.width, height: rect.height },
  text: (el.textContent || '').trim()
};
"#;

/// Adapter driving a browser through a WebDriver endpoint.
pub struct WebDriverAdapter {
    client: Client,
    base_url: String,
    session_id: String,
    owns_session: bool,
}

impl WebDriverAdapter {
    /// Attach to a session someone else created.
    pub fn attach(base_url: impl Into<String>, session_id: impl Into<String>) -> AdapterResult<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: trim_base(base_url.into()),
            session_id: session_id.into(),
            owns_session: false,
        })
    }

    /// Start a new session with `capabilities` (`{"alwaysMatch": {...}}`).
    pub async fn create_session(base_url: impl Into<String>, capabilities: Value) -> AdapterResult<Self> {
        let client = http_client()?;
        let base_url = trim_base(base_url.into());
        let response = client
            .post(format!("{base_url}/session"))
            .json(&json!({ "capabilities": capabilities }))
            .send()
            .await?;
        let value = read_value(response).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::Protocol("new session response missing sessionId".into()))?
            .to_string();
        info!(session = %session_id, base_url = %base_url, "Created WebDriver session");

        Ok(Self {
            client,
            base_url,
            session_id,
            owns_session: true,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn owns_session(&self) -> bool {
        self.owns_session
    }

    /// End the session if this adapter created it. Attached sessions are left alone.
    pub async fn delete_session(&self) -> AdapterResult<()> {
        if !self.owns_session {
            debug!(session = %self.session_id, "Not deleting attached session");
            return Ok(());
        }
        self.command(Method::DELETE, "", None).await?;
        info!(session = %self.session_id, "Deleted WebDriver session");
        Ok(())
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> AdapterResult<Value> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        read_value(request.send().await?).await
    }

    async fn element_property(&self, element_id: &str, property: &str) -> AdapterResult<Value> {
        self.command(Method::GET, &format!("/element/{element_id}/{property}"), None)
            .await
    }

    async fn execute(&self, script: &str, args: Value) -> AdapterResult<Value> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    async fn snapshot_element(&self, element_id: &str) -> AdapterResult<WebElement> {
        let tag_name = self.element_property(element_id, "name").await?;
        let text = self.element_property(element_id, "text").await?;
        let displayed = self.element_property(element_id, "displayed").await?;
        let rect = self.element_property(element_id, "rect").await?;
        let attributes = self
            .execute(
                ATTRIBUTES_SCRIPT,
                json!([element_reference(element_id), SNAPSHOT_ATTRIBUTES]),
            )
            .await?;

        let mut element = WebElement::new(element_id, tag_name.as_str().unwrap_or_default())
            .with_text(text.as_str().unwrap_or_default())
            .with_displayed(displayed.as_bool().unwrap_or(true));
        if let Ok(rect) = serde_json::from_value::<Rect>(rect) {
            element = element.with_rect(rect.position());
        }
        if let Value::Object(map) = attributes {
            for (key, value) in map {
                if let Some(value) = value.as_str() {
                    element = element.with_attribute(key, value);
                }
            }
        }
        Ok(element)
    }
}

#[async_trait]
impl WebAutomationAdapter for WebDriverAdapter {
    fn framework(&self) -> AutomationFramework {
        AutomationFramework::Selenium
    }

    async fn find_elements(&self, selector: &str) -> AdapterResult<Vec<WebElement>> {
        let spec = if PlaywrightLocator::is_locator_expression(selector) {
            let locator = PlaywrightLocator::parse(selector);
            match locator.to_xpath() {
                Some(xpath) => {
                    debug!(selector, xpath = %xpath, "Translated Playwright locator to XPath");
                    LocatorSpec::new(LocatorType::XPath, xpath)
                }
                None if locator.kind == PlaywrightLocatorKind::Css => {
                    LocatorSpec::new(LocatorType::CssSelector, locator.value)
                }
                None => {
                    return Err(AdapterError::InvalidSelector(format!(
                        "cannot translate Playwright locator: {selector}"
                    )))
                }
            }
        } else {
            LocatorSpec::from_selector(selector)
        };
        self.find_elements_by(&spec).await
    }

    async fn find_elements_by(&self, spec: &LocatorSpec) -> AdapterResult<Vec<WebElement>> {
        let (using, value) = spec.to_webdriver();
        let found = match self
            .command(
                Method::POST,
                "/elements",
                Some(json!({ "using": using, "value": value })),
            )
            .await
        {
            Ok(found) => found,
            Err(AdapterError::WebDriver { error, .. }) if error == "no such element" => {
                return Ok(Vec::new())
            }
            Err(err) => return Err(err),
        };

        let references = found
            .as_array()
            .ok_or_else(|| AdapterError::Protocol("find elements did not return an array".into()))?;

        let mut elements = Vec::with_capacity(references.len());
        for reference in references {
            let Some(element_id) = element_id(reference) else {
                warn!(locator = %spec, "Skipping malformed element reference");
                continue;
            };
            match self.snapshot_element(element_id).await {
                Ok(element) => elements.push(element),
                Err(AdapterError::WebDriver { error, .. })
                    if error == "stale element reference" || error == "no such element" =>
                {
                    debug!(element = element_id, "Element went stale while reading it");
                }
                Err(err) => return Err(err),
            }
        }
        debug!(locator = %spec, count = elements.len(), "WebDriver found elements");
        Ok(elements)
    }

    async fn page_source(&self) -> AdapterResult<String> {
        let value = self.command(Method::GET, "/source", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AdapterError::Protocol("page source was not a string".into()))
    }

    async fn take_screenshot(&self) -> AdapterResult<Vec<u8>> {
        let value = self.command(Method::GET, "/screenshot", None).await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| AdapterError::Protocol("screenshot was not a string".into()))?;
        BASE64
            .decode(encoded)
            .map_err(|err| AdapterError::Protocol(format!("screenshot is not valid base64: {err}")))
    }

    async fn element_context(&self, element: &WebElement) -> AdapterResult<ElementContext> {
        let raw = self
            .execute(CONTEXT_SCRIPT, json!([element_reference(&element.handle)]))
            .await?;
        let snapshot: ContextSnapshot = serde_json::from_value(raw)
            .map_err(|err| AdapterError::Protocol(format!("invalid element context: {err}")))?;

        let position = snapshot.rect.map(|rect| rect.position());
        let mut fingerprint = ElementFingerprint::builder()
            .tag_name(element.tag_name.clone())
            .parent_chain(snapshot.parent_chain.clone())
            .text(snapshot.text.clone())
            .computed_styles(snapshot.styles)
            .nearby_elements(snapshot.siblings.clone());
        if let Some(id) = element.attribute("id") {
            fingerprint = fingerprint.id(id);
        }
        if let Some(class) = element.attribute("class") {
            fingerprint = fingerprint.class_name(class);
        }
        if let Some(position) = position {
            fingerprint = fingerprint.position(position);
        }

        let mut context = ElementContext::new()
            .with_parent(snapshot.parent_chain)
            .with_siblings(snapshot.siblings)
            .with_text(snapshot.text)
            .with_fingerprint(fingerprint.build());
        if let Some(position) = position {
            context = context.with_position(position);
        }
        for (key, value) in &element.attributes {
            context = context.with_attribute(key.clone(), value.clone());
        }
        Ok(context)
    }
}

#[derive(Debug, Deserialize)]
struct Rect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl Rect {
    fn position(&self) -> Position {
        Position::new(
            self.x.round() as i32,
            self.y.round() as i32,
            self.width.round() as i32,
            self.height.round() as i32,
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextSnapshot {
    #[serde(default)]
    parent_chain: String,
    #[serde(default)]
    siblings: Vec<String>,
    #[serde(default)]
    styles: BTreeMap<String, String>,
    #[serde(default)]
    rect: Option<Rect>,
    #[serde(default)]
    text: String,
}

fn http_client() -> AdapterResult<Client> {
    Client::builder()
        .timeout(DEFAULT_COMMAND_TIMEOUT)
        .build()
        .map_err(|err| AdapterError::Transport(format!("failed to build HTTP client: {err}")))
}

fn trim_base(base_url: String) -> String {
    base_url.trim_end_matches('/').to_string()
}

fn element_reference(element_id: &str) -> Value {
    json!({ ELEMENT_KEY: element_id })
}

fn element_id(reference: &Value) -> Option<&str> {
    reference
        .get(ELEMENT_KEY)
        .or_else(|| reference.get(LEGACY_ELEMENT_KEY))
        .and_then(Value::as_str)
}

/// Unwrap the `value` envelope, turning error payloads into adapter errors.
async fn read_value(response: reqwest::Response) -> AdapterResult<Value> {
    let status = response.status();
    let body: Value = match response.json().await {
        Ok(body) => body,
        Err(err) if status.is_success() => return Err(AdapterError::Protocol(err.to_string())),
        Err(_) => {
            return Err(AdapterError::WebDriver {
                error: "unknown error".to_string(),
                message: format!("HTTP {status} without a WebDriver payload"),
            })
        }
    };
    let value = body.get("value").cloned().unwrap_or(Value::Null);

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(AdapterError::from_webdriver(error, message));
    }
    if !status.is_success() {
        return Err(AdapterError::WebDriver {
            error: "unknown error".to_string(),
            message: format!("HTTP {status}"),
        });
    }
    Ok(value)
}
