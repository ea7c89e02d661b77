//! One-call setup: capabilities in, ready [`DevTools`] out.

use std::sync::Arc;
use std::time::Duration;

use tabwire_config::{Config, ConnectionConfig};
use tabwire_protocol::{BrowserVersionReport, CdpError};
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::discovery::{Capabilities, EndpointFinder};
use crate::session::{DevTools, DEFAULT_COMMAND_TIMEOUT};
use crate::transport::HttpClientFactory;
use crate::versions::{CdpInfo, VersionCatalog};

/// Settings used while wiring a session together.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub connection: ConnectionConfig,
    pub command_timeout: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl From<&Config> for BootstrapConfig {
    fn from(config: &Config) -> Self {
        Self {
            connection: config.connection.clone(),
            command_timeout: config.session.command_timeout(),
        }
    }
}

/// Discover the debugging socket, pick a schema and open a connection.
///
/// `Ok(None)` means remote debugging is unavailable for this browser or no
/// registered schema is close enough to its version. Socket failures after
/// an endpoint was found are errors.
pub async fn connect(
    caps: &Capabilities,
    factory: &dyn HttpClientFactory,
    catalog: &VersionCatalog,
    config: &BootstrapConfig,
) -> Result<Option<DevTools>, CdpError> {
    let Some(endpoint) = EndpointFinder::discover(factory, caps, &config.connection).await else {
        debug!("Remote debugging not available");
        return Ok(None);
    };

    let info = match select_schema(caps, endpoint.version_report.as_ref(), catalog) {
        Some(info) => info,
        None => {
            warn!(
                "No supported CDP version for browser {:?} (available: {:?})",
                caps.cdp_version(),
                catalog.versions().collect::<Vec<_>>()
            );
            return Ok(None);
        }
    };
    info!("Using CDP v{} at {}", info.major_version(), endpoint.url);

    let connection = Connection::open(endpoint.client, endpoint.url).await?;
    let devtools = DevTools::new(Arc::new(connection), info.domains()).with_timeout(config.command_timeout);
    Ok(Some(devtools))
}

/// Capability version first, then the `/json/version` report.
fn select_schema<'a>(
    caps: &Capabilities,
    report: Option<&BrowserVersionReport>,
    catalog: &'a VersionCatalog,
) -> Option<&'a CdpInfo> {
    caps.cdp_version()
        .and_then(|version| catalog.match_version(version))
        .or_else(|| report.and_then(|report| catalog.match_report(report)))
}
