//! Schema version negotiation.

mod catalog;
mod domains;

pub use catalog::{CdpInfo, VersionCatalog, BUILTIN_VERSIONS, DEFAULT_FUDGE_FACTOR};
pub use domains::{Domains, LogDomain, StableDomains, TargetDomain};
