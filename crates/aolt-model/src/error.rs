//! Error types for chassis model operations.

use aolt_types::{ParseError, SiteId, TerminalCoord};
use thiserror::Error;

/// Result type alias for chassis model operations.
pub type ChassisResult<T> = Result<T, ChassisError>;

/// Errors raised by the chassis model and its state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChassisError {
    /// The logical port has no physical port bound to it.
    #[error("Port {port} on slot {slot} of chassis {site} is not provisioned")]
    UnprovisionedPort { site: SiteId, slot: u8, port: u8 },

    /// No line card has been attached with this ordinal.
    #[error("Slot {slot} in chassis {site} is currently unprovisioned")]
    UnprovisionedSlot { site: SiteId, slot: u32 },

    /// Activation requested for a terminal that is already active.
    #[error(
        "Attempt to activate terminal {} on port {} slot {} of {site} but already active",
        .coord.terminal(), .coord.port(), .coord.slot()
    )]
    AlreadyActive { site: SiteId, coord: TerminalCoord },

    /// Deactivation requested for a terminal that is not active.
    #[error(
        "Attempt to deactivate terminal {} on port {} slot {} of {site} but not active",
        .coord.terminal(), .coord.port(), .coord.slot()
    )]
    AlreadyDeactivated { site: SiteId, coord: TerminalCoord },

    /// The logical port binder cannot satisfy the request.
    #[error("Chassis {site} is out of logical ports ({requested} requested, {remaining} left)")]
    Exhausted {
        site: SiteId,
        requested: usize,
        remaining: usize,
    },

    /// An argument failed validation.
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// The external provisioning collaborator rejected or failed a call.
    #[error("External call {operation} failed: {message}")]
    ExternalCall { operation: String, message: String },

    /// A snapshot blob could not be encoded, decoded or validated.
    #[error("Snapshot error: {message}")]
    Snapshot { message: String },

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ChassisError {
    pub fn unprovisioned_port(site: &SiteId, slot: u8, port: u8) -> Self {
        Self::UnprovisionedPort {
            site: site.clone(),
            slot,
            port,
        }
    }

    pub fn unprovisioned_slot(site: &SiteId, slot: u32) -> Self {
        Self::UnprovisionedSlot {
            site: site.clone(),
            slot,
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an external call error.
    pub fn external(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalCall {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a snapshot error.
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true for errors caused by the current terminal or port state
    /// rather than by bad input or a failing collaborator.
    pub fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            ChassisError::UnprovisionedPort { .. }
                | ChassisError::UnprovisionedSlot { .. }
                | ChassisError::AlreadyActive { .. }
                | ChassisError::AlreadyDeactivated { .. }
                | ChassisError::Exhausted { .. }
        )
    }
}

impl From<ParseError> for ChassisError {
    fn from(err: ParseError) -> Self {
        let field = match &err {
            ParseError::InvalidSiteId(_) => "site",
            ParseError::CoordinateOutOfRange { field, .. } => *field,
            ParseError::InvalidVlanId(_) => "vlan",
            ParseError::UnknownDriver(_) => "driver",
        };
        ChassisError::validation(field, err.to_string())
    }
}

impl From<serde_json::Error> for ChassisError {
    fn from(err: serde_json::Error) -> Self {
        ChassisError::snapshot(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn site() -> SiteId {
        SiteId::new("SITE1").unwrap()
    }

    #[test]
    fn test_unprovisioned_port_display() {
        let err = ChassisError::unprovisioned_port(&site(), 2, 1);
        assert_eq!(
            err.to_string(),
            "Port 1 on slot 2 of chassis SITE1 is not provisioned"
        );
    }

    #[test]
    fn test_unprovisioned_slot_display() {
        let err = ChassisError::unprovisioned_slot(&site(), 4);
        assert_eq!(
            err.to_string(),
            "Slot 4 in chassis SITE1 is currently unprovisioned"
        );
    }

    #[test]
    fn test_activation_conflicts_display() {
        let coord = TerminalCoord::new(7, 1, 4).unwrap();
        let active = ChassisError::AlreadyActive {
            site: site(),
            coord,
        };
        assert_eq!(
            active.to_string(),
            "Attempt to activate terminal 4 on port 1 slot 7 of SITE1 but already active"
        );
        let inactive = ChassisError::AlreadyDeactivated {
            site: site(),
            coord,
        };
        assert!(inactive.to_string().ends_with("but not active"));
    }

    #[test]
    fn test_exhausted_display() {
        let err = ChassisError::Exhausted {
            site: site(),
            requested: 16,
            remaining: 0,
        };
        assert_eq!(
            err.to_string(),
            "Chassis SITE1 is out of logical ports (16 requested, 0 left)"
        );
    }

    #[test]
    fn test_from_parse_error() {
        let err: ChassisError = TerminalCoord::new(1, 1, 65).unwrap_err().into();
        assert_eq!(
            err,
            ChassisError::validation("terminal", "terminal 65 out of range (must be 1-64)")
        );
    }

    #[test]
    fn test_is_state_conflict() {
        assert!(ChassisError::unprovisioned_slot(&site(), 1).is_state_conflict());
        assert!(!ChassisError::external("activate", "timeout").is_state_conflict());
        assert!(!ChassisError::internal("bug").is_state_conflict());
    }
}
