//! Error types for the registry daemon and its collaborators.

use aolt_model::ChassisError;
use aolt_types::SiteId;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors returned by [`Registry`](crate::Registry) operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No chassis record exists for the site.
    #[error("No chassis found for site {site}")]
    UnknownSite { site: SiteId },

    /// The chassis model rejected the operation.
    #[error(transparent)]
    Chassis(#[from] ChassisError),

    /// Snapshot storage failed.
    #[error("Persistence failed for {site}: {message}")]
    Persistence { site: String, message: String },

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    Config { field: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RegistryError {
    pub fn unknown_site(site: &SiteId) -> Self {
        Self::UnknownSite { site: site.clone() }
    }

    /// Creates a persistence error.
    pub fn persistence(site: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence {
            site: site.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// The chassis error behind this one, if any.
    pub fn as_chassis(&self) -> Option<&ChassisError> {
        match self {
            RegistryError::Chassis(err) => Some(err),
            _ => None,
        }
    }
}

/// Failures reported by a [`Provisioner`](crate::Provisioner).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionerError {
    #[error("Login rejected for user '{user}' at {address}")]
    LoginRejected { user: String, address: SocketAddr },

    #[error("Provisioning request rejected: {message}")]
    Rejected { message: String },
}

impl ProvisionerError {
    pub fn login_rejected(user: impl Into<String>, address: SocketAddr) -> Self {
        Self::LoginRejected {
            user: user.into(),
            address,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Failures reported by a [`SnapshotSink`](crate::SnapshotSink).
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Snapshot I/O for '{key}' failed: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("Site identifier '{key}' cannot be used as a snapshot key")]
    InvalidKey { key: String },

    #[error("Snapshot sink unavailable: {message}")]
    Unavailable { message: String },
}

impl SinkError {
    pub fn io(key: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            key: key.into(),
            source,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unknown_site_display() {
        let err = RegistryError::unknown_site(&SiteId::new("NOWHERE").unwrap());
        assert_eq!(err.to_string(), "No chassis found for site NOWHERE");
    }

    #[test]
    fn test_chassis_error_is_transparent() {
        let inner = ChassisError::internal("bug");
        let err = RegistryError::from(inner.clone());
        assert_eq!(err.to_string(), inner.to_string());
        assert_eq!(err.as_chassis(), Some(&inner));
    }

    #[test]
    fn test_config_display() {
        let err = RegistryError::config("flush_interval_secs", "must be > 0");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for flush_interval_secs: must be > 0"
        );
    }

    #[test]
    fn test_provisioner_error_display() {
        let err = ProvisionerError::login_rejected("xosadmin", "10.0.0.1:9000".parse().unwrap());
        assert_eq!(
            err.to_string(),
            "Login rejected for user 'xosadmin' at 10.0.0.1:9000"
        );
    }

    #[test]
    fn test_sink_error_display() {
        let err = SinkError::io(
            "SITE1",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "Snapshot I/O for 'SITE1' failed: denied");
    }
}
