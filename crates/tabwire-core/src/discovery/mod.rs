//! Debugging endpoint discovery.

mod capabilities;
mod endpoint;

pub use capabilities::{
    debugger_address_key, Capabilities, BROWSER_NAME_CAPABILITY, BROWSER_VERSION_CAPABILITY,
    CDP_ENDPOINT_CAPABILITY, CDP_VERSION_CAPABILITY,
};
pub use endpoint::{DiscoveredEndpoint, EndpointFinder};
