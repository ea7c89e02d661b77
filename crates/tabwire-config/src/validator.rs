//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Turn the first error into a [`ConfigError`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error.into()),
            None => Ok(self.warnings),
        }
    }
}

/// What a [`ValidationError`] is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    Timeout,
    FudgeFactor,
    /// Carries the rejected endpoint.
    Endpoint(String),
    /// Carries the rejected address.
    DebuggerAddress(String),
    Other,
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind: ValidationErrorKind::Other,
        }
    }

    pub fn with_kind(mut self, kind: ValidationErrorKind) -> Self {
        self.kind = kind;
        self
    }
}

impl From<ValidationError> for ConfigError {
    fn from(error: ValidationError) -> Self {
        let ValidationError { path, message, kind } = error;
        match kind {
            ValidationErrorKind::Timeout => ConfigError::InvalidTimeout { field: path, message },
            ValidationErrorKind::FudgeFactor => ConfigError::InvalidFudgeFactor(message),
            ValidationErrorKind::Endpoint(endpoint) => ConfigError::InvalidEndpoint { endpoint, message },
            ValidationErrorKind::DebuggerAddress(address) => {
                ConfigError::InvalidDebuggerAddress { address, message }
            }
            ValidationErrorKind::Other => ConfigError::InvalidValue { field: path, message },
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

const LONG_TIMEOUT_MS: u64 = 5 * 60 * 1000;
const LARGE_FUDGE_FACTOR: u32 = 20;

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_timeouts(config, &mut result);
        Self::validate_versions(config, &mut result);
        Self::validate_discovery(config, &mut result);

        result
    }

    fn validate_timeouts(config: &Config, result: &mut ValidationResult) {
        let timeouts = [
            ("session.command_timeout_ms", config.session.command_timeout_ms),
            ("connection.connect_timeout_ms", config.connection.connect_timeout_ms),
            ("connection.read_timeout_ms", config.connection.read_timeout_ms),
        ];

        for (path, value) in timeouts {
            if value == 0 {
                result.add_error(
                    ValidationError::new(path, "timeout must be greater than 0")
                        .with_kind(ValidationErrorKind::Timeout),
                );
            } else if value > LONG_TIMEOUT_MS {
                result.add_warning(ValidationWarning::new(
                    path,
                    "timeout is longer than 5 minutes, hung browsers will block callers for a long time",
                ));
            }
        }
    }

    fn validate_versions(config: &Config, result: &mut ValidationResult) {
        let fudge = config.versions.fudge_factor;
        if fudge == 0 {
            result.add_error(
                ValidationError::new("versions.fudge_factor", "fudge_factor must be greater than 0")
                    .with_kind(ValidationErrorKind::FudgeFactor),
            );
        } else if fudge > LARGE_FUDGE_FACTOR {
            result.add_warning(ValidationWarning::new(
                "versions.fudge_factor",
                "fudge_factor is very high (>20), old schemas may be used against new browsers",
            ));
        }
    }

    fn validate_discovery(config: &Config, result: &mut ValidationResult) {
        let discovery = &config.discovery;

        if let Some(ref endpoint) = discovery.cdp_endpoint {
            let message = match url::Url::parse(endpoint) {
                Ok(url) if matches!(url.scheme(), "ws" | "wss") => None,
                Ok(_) => Some("cdp_endpoint must be a ws:// or wss:// URL".to_string()),
                Err(e) => Some(format!("invalid URL: {}", e)),
            };
            if let Some(message) = message {
                result.add_error(
                    ValidationError::new("discovery.cdp_endpoint", message)
                        .with_kind(ValidationErrorKind::Endpoint(endpoint.clone())),
                );
            }
        }

        if let Some(ref address) = discovery.debugger_address {
            let port = address.rsplit_once(':').map(|(_, port)| port);
            if port.and_then(|p| p.parse::<u16>().ok()).is_none() {
                result.add_error(
                    ValidationError::new("discovery.debugger_address", "debugger_address must end in :<port>")
                        .with_kind(ValidationErrorKind::DebuggerAddress(address.clone())),
                );
            }
            if discovery.browser_name.is_none() {
                result.add_warning(ValidationWarning::new(
                    "discovery.browser_name",
                    "debugger_address is ignored without browser_name",
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
