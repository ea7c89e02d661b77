//! Debugging socket URL resolution.
//!
//! Every "not found" outcome is `None`: a browser started without remote
//! debugging is a normal case, not an error.

use std::sync::Arc;

use tabwire_config::ConnectionConfig;
use tabwire_protocol::BrowserVersionReport;
use tracing::{debug, warn};
use url::Url;

use super::capabilities::Capabilities;
use crate::transport::{ClientConfig, HttpClient, HttpClientFactory};

/// A reachable debugging socket and the client that will carry it.
pub struct DiscoveredEndpoint {
    pub client: Arc<dyn HttpClient>,
    pub url: Url,
    /// Present when the URL came from `/json/version`.
    pub version_report: Option<BrowserVersionReport>,
}

/// Resolves debugging endpoints from capabilities.
pub struct EndpointFinder;

impl EndpointFinder {
    /// HTTP origin derived from the browser's reported debugger address.
    ///
    /// The text after the final colon must be a port. Any `scheme://` prefix
    /// is dropped and an empty host becomes `localhost`.
    pub fn reported_origin(caps: &Capabilities) -> Option<Url> {
        let raw = caps.debugger_address()?;
        let (host, port) = raw.rsplit_once(':')?;
        let port: u16 = port.parse().ok()?;

        let host = host.rsplit_once("://").map_or(host, |(_, host)| host);
        let host = if host.is_empty() { "localhost" } else { host };

        Url::parse(&format!("http://{}:{}", host, port)).ok()
    }

    /// Ask `origin` for its debugging socket via `GET /json/version`.
    pub async fn fetch_endpoint(
        client: &dyn HttpClient,
        origin: &Url,
    ) -> Option<(Url, BrowserVersionReport)> {
        let version_url = origin.join("/json/version").ok()?;
        debug!("Fetching browser version from {}", version_url);

        let response = match client.get(&version_url).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Unable to reach {}: {}", version_url, e);
                return None;
            }
        };
        if !response.is_ok() {
            warn!("{} returned HTTP {}", version_url, response.status);
            return None;
        }

        let report: BrowserVersionReport = match response.json() {
            Ok(report) => report,
            Err(e) => {
                warn!("Invalid version report from {}: {}", version_url, e);
                return None;
            }
        };

        let Some(raw) = report.web_socket_debugger_url.as_deref() else {
            warn!("{} did not report webSocketDebuggerUrl", version_url);
            return None;
        };
        match Url::parse(raw) {
            Ok(url) => Some((url, report)),
            Err(e) => {
                warn!("Invalid webSocketDebuggerUrl {:?}: {}", raw, e);
                None
            }
        }
    }

    /// Resolve the debugging socket for a browser.
    ///
    /// An explicit `se:cdp` capability wins; otherwise the reported debugger
    /// address is queried over HTTP. The discovery client is dropped when no
    /// endpoint is found, and handed to the caller otherwise.
    pub async fn discover(
        factory: &dyn HttpClientFactory,
        caps: &Capabilities,
        connection: &ConnectionConfig,
    ) -> Option<DiscoveredEndpoint> {
        if let Some(explicit) = caps.cdp_endpoint() {
            let url = match Url::parse(explicit) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Ignoring invalid se:cdp endpoint {:?}: {}", explicit, e);
                    return None;
                }
            };
            let client = Self::create_client(factory, &url, connection)?;
            debug!("Using explicit CDP endpoint {}", url);
            return Some(DiscoveredEndpoint {
                client,
                url,
                version_report: None,
            });
        }

        let Some(origin) = Self::reported_origin(caps) else {
            debug!("No debugger address in capabilities");
            return None;
        };
        let client = Self::create_client(factory, &origin, connection)?;

        match Self::fetch_endpoint(client.as_ref(), &origin).await {
            Some((url, report)) => {
                debug!("Discovered CDP endpoint {}", url);
                Some(DiscoveredEndpoint {
                    client,
                    url,
                    version_report: Some(report),
                })
            }
            None => {
                drop(client);
                None
            }
        }
    }

    fn create_client(
        factory: &dyn HttpClientFactory,
        base_url: &Url,
        connection: &ConnectionConfig,
    ) -> Option<Arc<dyn HttpClient>> {
        match factory.create_client(&ClientConfig::new(base_url.clone(), connection)) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("Unable to create client for {}: {}", base_url, e);
                None
            }
        }
    }
}
