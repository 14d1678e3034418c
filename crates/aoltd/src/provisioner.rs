//! External provisioning collaborator.
//!
//! The registry only interprets success or failure of these calls. Template
//! rendering and delivery to the real provisioning system live behind the
//! trait.

use crate::error::ProvisionerError;
use aolt_model::{LineCardNotice, ProvisioningEndpoint, TerminalNotice};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

/// Pushes chassis changes to the external provisioning system.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Checks that the endpoint accepts these credentials.
    async fn validate_login(&self, endpoint: &ProvisioningEndpoint) -> Result<(), ProvisionerError>;

    /// Announces a newly attached line card.
    async fn add_line_card(&self, card: &LineCardNotice) -> Result<(), ProvisionerError>;

    /// Whitelists a terminal with its finalized VLANs and identifiers.
    async fn activate_terminal(&self, terminal: &TerminalNotice) -> Result<(), ProvisionerError>;

    /// Removes a terminal from the whitelist.
    async fn deactivate_terminal(&self, terminal: &TerminalNotice) -> Result<(), ProvisionerError>;
}

/// Provisioner that only logs what it would send.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunProvisioner;

#[async_trait]
impl Provisioner for DryRunProvisioner {
    async fn validate_login(&self, endpoint: &ProvisioningEndpoint) -> Result<(), ProvisionerError> {
        info!(address = %endpoint.address, user = %endpoint.user, "dry-run: validate login");
        Ok(())
    }

    async fn add_line_card(&self, card: &LineCardNotice) -> Result<(), ProvisionerError> {
        info!(
            site = %card.site,
            card = card.number,
            driver = %card.driver,
            address = %card.address,
            hostname = %card.hostname,
            "dry-run: add line card"
        );
        Ok(())
    }

    async fn activate_terminal(&self, terminal: &TerminalNotice) -> Result<(), ProvisionerError> {
        info!(
            subscriber = %terminal.subscriber_name,
            serial = %terminal.serial,
            s_vlan = %terminal.s_vlan,
            c_vlan = %terminal.c_vlan,
            device = %terminal.device_address,
            "dry-run: activate terminal"
        );
        Ok(())
    }

    async fn deactivate_terminal(&self, terminal: &TerminalNotice) -> Result<(), ProvisionerError> {
        info!(
            subscriber = %terminal.subscriber_name,
            serial = %terminal.serial,
            "dry-run: deactivate terminal"
        );
        Ok(())
    }
}

/// One call observed by a [`RecordingProvisioner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionerCall {
    ValidateLogin { user: String },
    AddLineCard { site: String, number: u8 },
    Activate { subscriber: String, serial: String },
    Deactivate { subscriber: String },
}

/// In-memory provisioner that records every call and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingProvisioner {
    calls: Mutex<Vec<ProvisionerCall>>,
    failure: Mutex<Option<ProvisionerError>>,
    rejected_users: Mutex<Vec<String>>,
}

impl RecordingProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail with `err` until cleared with `None`.
    pub fn set_failure(&self, err: Option<ProvisionerError>) {
        *self.failure.lock() = err;
    }

    /// Makes logins as `user` fail with [`ProvisionerError::LoginRejected`].
    pub fn reject_user(&self, user: impl Into<String>) {
        self.rejected_users.lock().push(user.into());
    }

    pub fn calls(&self) -> Vec<ProvisionerCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: ProvisionerCall) -> Result<(), ProvisionerError> {
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        self.calls.lock().push(call);
        Ok(())
    }
}

#[async_trait]
impl Provisioner for RecordingProvisioner {
    async fn validate_login(&self, endpoint: &ProvisioningEndpoint) -> Result<(), ProvisionerError> {
        if self.rejected_users.lock().contains(&endpoint.user) {
            return Err(ProvisionerError::login_rejected(
                endpoint.user.clone(),
                endpoint.address,
            ));
        }
        self.record(ProvisionerCall::ValidateLogin {
            user: endpoint.user.clone(),
        })
    }

    async fn add_line_card(&self, card: &LineCardNotice) -> Result<(), ProvisionerError> {
        self.record(ProvisionerCall::AddLineCard {
            site: card.site.to_string(),
            number: card.number,
        })
    }

    async fn activate_terminal(&self, terminal: &TerminalNotice) -> Result<(), ProvisionerError> {
        self.record(ProvisionerCall::Activate {
            subscriber: terminal.subscriber_name.clone(),
            serial: terminal.serial.clone(),
        })
    }

    async fn deactivate_terminal(&self, terminal: &TerminalNotice) -> Result<(), ProvisionerError> {
        self.record(ProvisionerCall::Deactivate {
            subscriber: terminal.subscriber_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn endpoint() -> ProvisioningEndpoint {
        ProvisioningEndpoint::new("10.0.0.1:9000".parse().unwrap(), "xosadmin", "pw")
    }

    #[tokio::test]
    async fn test_dry_run_accepts_everything() {
        assert!(DryRunProvisioner.validate_login(&endpoint()).await.is_ok());
    }

    #[tokio::test]
    async fn test_recording_provisioner_records_and_fails() {
        let provisioner = RecordingProvisioner::new();
        provisioner.validate_login(&endpoint()).await.unwrap();
        assert_eq!(
            provisioner.calls(),
            vec![ProvisionerCall::ValidateLogin {
                user: "xosadmin".to_string()
            }]
        );

        provisioner.set_failure(Some(ProvisionerError::rejected("down")));
        assert_eq!(
            provisioner.validate_login(&endpoint()).await,
            Err(ProvisionerError::rejected("down"))
        );
        assert_eq!(provisioner.calls().len(), 1);

        provisioner.set_failure(None);
        assert!(provisioner.validate_login(&endpoint()).await.is_ok());
        assert_eq!(provisioner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_recording_provisioner_rejects_user() {
        let provisioner = RecordingProvisioner::new();
        provisioner.reject_user("xosadmin");
        assert_eq!(
            provisioner.validate_login(&endpoint()).await,
            Err(ProvisionerError::login_rejected(
                "xosadmin",
                "10.0.0.1:9000".parse().unwrap()
            ))
        );
        assert!(provisioner.calls().is_empty());
    }
}
