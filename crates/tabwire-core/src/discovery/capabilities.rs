//! Browser capabilities relevant to remote debugging.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tabwire_config::DiscoveryConfig;

/// Explicit debugging socket URL.
pub const CDP_ENDPOINT_CAPABILITY: &str = "se:cdp";
/// Browser version to negotiate the schema against.
pub const CDP_VERSION_CAPABILITY: &str = "se:cdpVersion";

pub const BROWSER_NAME_CAPABILITY: &str = "browserName";
pub const BROWSER_VERSION_CAPABILITY: &str = "browserVersion";

/// Capability key holding the debugger address for a browser.
///
/// Chromium browsers nest it as `debuggerAddress` inside their options map;
/// Firefox reports it directly.
pub fn debugger_address_key(browser_name: &str) -> Option<&'static str> {
    match browser_name {
        "chrome" => Some("goog:chromeOptions"),
        "msedge" | "MicrosoftEdge" => Some("ms:edgeOptions"),
        "firefox" => Some("moz:debuggerAddress"),
        _ => None,
    }
}

/// Capabilities as returned by a driver session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(Map<String, Value>);

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn browser_name(&self) -> Option<&str> {
        self.get_str(BROWSER_NAME_CAPABILITY)
    }

    pub fn browser_version(&self) -> Option<&str> {
        self.get_str(BROWSER_VERSION_CAPABILITY)
    }

    pub fn cdp_endpoint(&self) -> Option<&str> {
        self.get_str(CDP_ENDPOINT_CAPABILITY)
    }

    /// Version to negotiate against: `se:cdpVersion`, else `browserVersion`.
    pub fn cdp_version(&self) -> Option<&str> {
        self.get_str(CDP_VERSION_CAPABILITY)
            .or_else(|| self.browser_version())
    }

    /// Raw debugger address for the browser, if it reported one.
    pub fn debugger_address(&self) -> Option<&str> {
        let key = debugger_address_key(self.browser_name()?)?;
        match self.0.get(key)? {
            Value::Object(options) => options.get("debuggerAddress").and_then(Value::as_str),
            Value::String(address) => Some(address.as_str()),
            _ => None,
        }
    }

    /// Build capabilities from the `[discovery]` config section.
    pub fn from_config(config: &DiscoveryConfig) -> Self {
        let mut caps = Self::new();

        if let Some(ref name) = config.browser_name {
            caps = caps.with(BROWSER_NAME_CAPABILITY, name.as_str());
            if let (Some(key), Some(address)) =
                (debugger_address_key(name), config.debugger_address.as_deref())
            {
                caps = if key.ends_with("Options") {
                    caps.with(key, json!({"debuggerAddress": address}))
                } else {
                    caps.with(key, address)
                };
            }
        }
        if let Some(ref endpoint) = config.cdp_endpoint {
            caps = caps.with(CDP_ENDPOINT_CAPABILITY, endpoint.as_str());
        }
        if let Some(ref version) = config.browser_version {
            caps = caps.with(CDP_VERSION_CAPABILITY, version.as_str());
        }
        caps
    }
}

impl From<Map<String, Value>> for Capabilities {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
