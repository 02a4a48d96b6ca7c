//! Provider identity for metal-stack machines.
//!
//! Machines and firewalls created through metal-api are referenced from
//! Kubernetes objects by a provider ID of the form `metalstack://<machine-id>`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// URI scheme prefix used in provider IDs
pub const PROVIDER_ID_PREFIX: &str = "metalstack://";

/// Errors raised when a provider ID cannot be parsed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderIdError {
    /// The value does not start with `metalstack://`
    #[error("provider ID {0:?} is missing the {PROVIDER_ID_PREFIX} prefix")]
    MissingPrefix(String),

    /// The prefix is present but no machine ID follows it
    #[error("provider ID {0:?} has an empty machine ID")]
    EmptyMachineId(String),
}

/// A parsed `metalstack://<machine-id>` provider ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderId {
    machine_id: String,
}

impl ProviderId {
    /// Wraps a native metal-api machine ID.
    pub fn new(machine_id: impl Into<String>) -> Self {
        Self {
            machine_id: machine_id.into(),
        }
    }

    /// The native machine ID understood by metal-api.
    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }
}

impl FromStr for ProviderId {
    type Err = ProviderIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let machine_id = value
            .strip_prefix(PROVIDER_ID_PREFIX)
            .ok_or_else(|| ProviderIdError::MissingPrefix(value.to_string()))?;
        let machine_id = machine_id.trim_matches('/');
        if machine_id.is_empty() {
            return Err(ProviderIdError::EmptyMachineId(value.to_string()));
        }
        Ok(Self::new(machine_id))
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PROVIDER_ID_PREFIX, self.machine_id)
    }
}

/// Parses an optional provider ID field.
///
/// Returns `Ok(None)` when the field is unset (nothing was ever bound) and an
/// error when a value is present but malformed.
pub fn parse_optional(value: Option<&str>) -> Result<Option<ProviderId>, ProviderIdError> {
    match value {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => v.parse().map(Some),
    }
}
