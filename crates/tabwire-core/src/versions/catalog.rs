//! Registry of supported schema generations and nearest-version matching.

use std::fmt;
use std::sync::Arc;

use tabwire_protocol::BrowserVersionReport;
use tracing::debug;

use super::domains::{Domains, StableDomains};

/// Default largest accepted gap (exclusive) between requested and matched
/// major versions.
pub const DEFAULT_FUDGE_FACTOR: u32 = 5;

/// Schema generations shipped with the library.
pub const BUILTIN_VERSIONS: &[u32] = &[139, 140, 141, 142];

type DomainsFactory = Arc<dyn Fn() -> Arc<dyn Domains> + Send + Sync>;

/// One supported schema generation.
#[derive(Clone)]
pub struct CdpInfo {
    major_version: u32,
    factory: DomainsFactory,
}

impl CdpInfo {
    pub fn new<F>(major_version: u32, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Domains> + Send + Sync + 'static,
    {
        Self {
            major_version,
            factory: Arc::new(factory),
        }
    }

    pub fn major_version(&self) -> u32 {
        self.major_version
    }

    pub fn domains(&self) -> Arc<dyn Domains> {
        (self.factory)()
    }
}

impl fmt::Debug for CdpInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdpInfo")
            .field("major_version", &self.major_version)
            .finish()
    }
}

/// Supported schema generations.
///
/// Registering the same major version twice is a configuration error; which
/// entry wins is unspecified.
#[derive(Debug, Clone)]
pub struct VersionCatalog {
    infos: Vec<CdpInfo>,
    fudge_factor: u32,
}

impl Default for VersionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl VersionCatalog {
    pub fn new(infos: Vec<CdpInfo>) -> Self {
        Self {
            infos,
            fudge_factor: DEFAULT_FUDGE_FACTOR,
        }
    }

    /// Catalog of [`BUILTIN_VERSIONS`], each served by [`StableDomains`].
    pub fn builtin() -> Self {
        let infos = BUILTIN_VERSIONS
            .iter()
            .map(|&major| {
                CdpInfo::new(major, move || Arc::new(StableDomains::new(major)) as Arc<dyn Domains>)
            })
            .collect();
        Self::new(infos)
    }

    pub fn with_fudge_factor(mut self, fudge_factor: u32) -> Self {
        self.fudge_factor = fudge_factor;
        self
    }

    pub fn fudge_factor(&self) -> u32 {
        self.fudge_factor
    }

    pub fn versions(&self) -> impl Iterator<Item = u32> + '_ {
        self.infos.iter().map(CdpInfo::major_version)
    }

    /// Match the `Browser` field of a `/json/version` report
    /// (`"Chrome/87.0.4280.88"`).
    pub fn match_report(&self, report: &BrowserVersionReport) -> Option<&CdpInfo> {
        let browser = report.browser.as_deref()?;
        let Some(major) = parse_report_major(browser) else {
            debug!("Unable to parse browser version from {:?}", browser);
            return None;
        };
        self.find_nearest(major)
    }

    /// Match a bare version string (`"87.0.4280.88"`).
    pub fn match_version(&self, version: &str) -> Option<&CdpInfo> {
        let Some(major) = parse_leading_major(version) else {
            debug!("Unable to parse browser version from {:?}", version);
            return None;
        };
        self.find_nearest(major)
    }

    /// Exact major if registered, else the largest registered major below
    /// `major` within the fudge factor.
    pub fn find_nearest(&self, major: u32) -> Option<&CdpInfo> {
        if let Some(exact) = self.infos.iter().find(|info| info.major_version == major) {
            return Some(exact);
        }

        let nearest = self
            .infos
            .iter()
            .filter(|info| info.major_version < major)
            .max_by_key(|info| info.major_version)?;

        if major - nearest.major_version < self.fudge_factor {
            debug!("Using CDP v{} for browser v{}", nearest.major_version, major);
            Some(nearest)
        } else {
            debug!(
                "Nearest CDP v{} is too far from browser v{} (fudge factor {})",
                nearest.major_version, major, self.fudge_factor
            );
            None
        }
    }
}

/// `Name/Major.Minor...` -> `Major`.
fn parse_report_major(browser: &str) -> Option<u32> {
    let (_, version) = browser.rsplit_once('/')?;
    parse_leading_major(version)
}

/// `Major.Minor...` -> `Major`.
fn parse_leading_major(version: &str) -> Option<u32> {
    let (major, _) = version.trim().split_once('.')?;
    if major.is_empty() || !major.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    major.parse().ok()
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
