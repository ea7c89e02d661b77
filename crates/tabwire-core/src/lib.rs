//! # tabwire core
//!
//! Session layer for the browser remote debugging protocol: one socket per
//! browser, commands correlated to replies by id, events fanned out to
//! listeners, and page sessions attached on top.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  attach/send   ┌────────────┐   text frames   ┌─────────┐
//! │  DevTools  │ ─────────────► │ Connection │ ◄─────────────► │ Browser │
//! └────────────┘                └────────────┘    WebSocket    └─────────┘
//!        ▲                             ▲
//!        │ Domains                     │ HttpClient
//! ┌──────────────┐             ┌────────────────┐
//! │VersionCatalog│             │ EndpointFinder │  GET /json/version
//! └──────────────┘             └────────────────┘
//! ```
//!
//! ## Setup
//!
//! Start the browser with remote debugging enabled:
//!
//! ```bash
//! google-chrome --remote-debugging-port=9222
//! ```
//!
//! then hand its capabilities to [`bootstrap::connect`].

pub mod bootstrap;
pub mod connection;
pub mod discovery;
pub mod http;
pub mod session;
pub mod transport;
pub mod versions;

pub use bootstrap::{connect, BootstrapConfig};
pub use connection::{Connection, ConnectionStats, PendingReply};
pub use discovery::{Capabilities, DiscoveredEndpoint, EndpointFinder};
pub use http::{ReqwestClient, ReqwestClientFactory};
pub use session::{DevTools, SessionState, DEFAULT_COMMAND_TIMEOUT};
pub use transport::{ClientConfig, HttpClient, HttpClientFactory, HttpResponse, Socket};
pub use versions::{CdpInfo, Domains, StableDomains, VersionCatalog};

pub use tabwire_protocol::{CdpError, Command, Event, SessionId, TargetId, TargetInfo};
