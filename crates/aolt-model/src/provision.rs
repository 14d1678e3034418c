//! Terminal (ONT) provisioning state machine.
//!
//! Every transition runs in two steps. `prepare_*` validates the request
//! against the current state and computes the finalized terminal data
//! without mutating the record. [`ChassisRecord::commit`] writes that data.
//! Callers notify the external provisioning system with
//! [`PreparedTransition::notice`] in between and commit only on success.
//!
//! ```text
//! Unbound --attach_line_card--> Inactive --activate--> Active
//!                                  ^                      |
//!                                  +------deactivate------+
//! ```

use crate::error::{ChassisError, ChassisResult};
use crate::physical::{PhysicalPortRef, PhysicalTerminal, ProvisioningEndpoint};
use crate::record::ChassisRecord;
use aolt_types::{LineCardDriver, SiteId, TerminalCoord, VlanId};
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;

/// Derived state of one terminal position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    /// The logical port has no physical port yet.
    Unbound,
    /// Bound, not active.
    Inactive,
    Active,
}

impl TerminalState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TerminalState::Unbound => "unbound",
            TerminalState::Inactive => "inactive",
            TerminalState::Active => "active",
        }
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a prepared transition does when committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Activate,
    PreProvision,
    Deactivate,
}

impl Action {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Action::Activate => "activate",
            Action::PreProvision => "pre_provision",
            Action::Deactivate => "deactivate",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-chosen values for an explicit activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalOverrides {
    pub s_vlan: VlanId,
    pub c_vlan: VlanId,
    pub nas_port_id: String,
    pub circuit_id: String,
}

/// Values staged on an inactive terminal ahead of its serial number.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreProvision {
    pub s_vlan: Option<VlanId>,
    pub c_vlan: Option<VlanId>,
    pub nas_port_id: String,
    pub circuit_id: String,
    pub tech_profile: Option<String>,
    pub speed_profile: Option<String>,
}

/// Terminal data handed to the external provisioning system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalNotice {
    pub site: SiteId,
    pub coord: TerminalCoord,
    pub subscriber_name: String,
    pub device: PhysicalPortRef,
    pub device_address: SocketAddr,
    pub device_hostname: String,
    pub driver: LineCardDriver,
    pub serial: String,
    pub s_vlan: VlanId,
    pub c_vlan: VlanId,
    pub nas_port_id: String,
    pub circuit_id: String,
    pub tech_profile: Option<String>,
    pub speed_profile: Option<String>,
    #[serde(skip)]
    pub endpoint: ProvisioningEndpoint,
}

/// Line card data handed to the external provisioning system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineCardNotice {
    pub site: SiteId,
    pub number: u8,
    pub driver: LineCardDriver,
    pub address: SocketAddr,
    pub hostname: String,
    pub port_count: usize,
    #[serde(skip)]
    pub endpoint: ProvisioningEndpoint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TerminalFields {
    serial: String,
    s_vlan: Option<VlanId>,
    c_vlan: Option<VlanId>,
    nas_port_id: String,
    circuit_id: String,
    tech_profile: Option<String>,
    speed_profile: Option<String>,
}

/// A validated transition waiting to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransition {
    site: SiteId,
    coord: TerminalCoord,
    action: Action,
    fields: TerminalFields,
    notice: Option<TerminalNotice>,
}

impl PreparedTransition {
    pub fn action(&self) -> Action {
        self.action
    }

    pub fn coord(&self) -> TerminalCoord {
        self.coord
    }

    /// Data for the external system, `None` when nothing needs notifying.
    pub fn notice(&self) -> Option<&TerminalNotice> {
        self.notice.as_ref()
    }
}

/// `PON <rack>/<shelf>/<slot>/<port>:<terminal>.1.1`
pub fn nas_port_id(rack: u32, shelf: u32, coord: TerminalCoord) -> String {
    format!(
        "PON {rack}/{shelf}/{}/{}:{}.1.1",
        coord.slot(),
        coord.port(),
        coord.terminal()
    )
}

/// `<site> <rack>/<shelf>/<slot>/<port>:<terminal>.1.1`
pub fn circuit_id(site: &SiteId, rack: u32, shelf: u32, coord: TerminalCoord) -> String {
    format!(
        "{site} {rack}/{shelf}/{}/{}:{}.1.1",
        coord.slot(),
        coord.port(),
        coord.terminal()
    )
}

/// `<site>_<slot>_<port>_<terminal>_RG`
pub fn subscriber_name(site: &SiteId, coord: TerminalCoord) -> String {
    format!(
        "{site}_{}_{}_{}_RG",
        coord.slot(),
        coord.port(),
        coord.terminal()
    )
}

fn require_serial(serial: &str) -> ChassisResult<String> {
    let serial = serial.trim();
    if serial.is_empty() {
        return Err(ChassisError::validation("serial", "must not be empty"));
    }
    Ok(serial.to_string())
}

fn non_empty_or(value: &str, fallback: impl FnOnce() -> String) -> String {
    if value.trim().is_empty() {
        fallback()
    } else {
        value.to_string()
    }
}

impl ChassisRecord {
    /// Current state of a terminal position.
    pub fn terminal_state(&self, coord: TerminalCoord) -> TerminalState {
        match self.physical_terminal(coord) {
            Ok(terminal) if terminal.active => TerminalState::Active,
            Ok(_) => TerminalState::Inactive,
            Err(_) => TerminalState::Unbound,
        }
    }

    /// VLAN pair stored on the logical terminal slot at generation time.
    fn planned_pair(&self, coord: TerminalCoord) -> ChassisResult<(VlanId, VlanId)> {
        self.logical()
            .terminal(coord)
            .map(|t| (t.s_vlan, t.c_vlan))
            .ok_or_else(|| ChassisError::internal(format!("no logical terminal at {coord}")))
    }

    fn planned_fields(&self, coord: TerminalCoord, serial: String) -> ChassisResult<TerminalFields> {
        let (s_vlan, c_vlan) = self.planned_pair(coord)?;
        let logical = self.logical();
        Ok(TerminalFields {
            serial,
            s_vlan: Some(s_vlan),
            c_vlan: Some(c_vlan),
            nas_port_id: nas_port_id(logical.rack, logical.shelf, coord),
            circuit_id: circuit_id(self.site(), logical.rack, logical.shelf, coord),
            tech_profile: None,
            speed_profile: None,
        })
    }

    /// Bound and inactive, or the matching error.
    fn require_inactive(&self, coord: TerminalCoord) -> ChassisResult<&PhysicalTerminal> {
        let terminal = self.physical_terminal(coord)?;
        if terminal.active {
            return Err(ChassisError::AlreadyActive {
                site: self.site().clone(),
                coord,
            });
        }
        Ok(terminal)
    }

    fn notice_for(&self, coord: TerminalCoord, fields: &TerminalFields) -> ChassisResult<TerminalNotice> {
        let device = self.require_binding(coord)?;
        let card = self
            .physical()
            .line_card(device.card)
            .ok_or_else(|| ChassisError::internal(format!("no line card for {device}")))?;
        let (s_vlan, c_vlan) = self.planned_pair(coord)?;
        Ok(TerminalNotice {
            site: self.site().clone(),
            coord,
            subscriber_name: subscriber_name(self.site(), coord),
            device,
            device_address: card.address,
            device_hostname: card.hostname.clone(),
            driver: card.driver,
            serial: fields.serial.clone(),
            s_vlan: fields.s_vlan.unwrap_or(s_vlan),
            c_vlan: fields.c_vlan.unwrap_or(c_vlan),
            nas_port_id: fields.nas_port_id.clone(),
            circuit_id: fields.circuit_id.clone(),
            tech_profile: fields.tech_profile.clone(),
            speed_profile: fields.speed_profile.clone(),
            endpoint: self.endpoint().clone(),
        })
    }

    fn prepared(
        &self,
        coord: TerminalCoord,
        action: Action,
        fields: TerminalFields,
    ) -> ChassisResult<PreparedTransition> {
        let notice = match action {
            Action::PreProvision => None,
            Action::Activate | Action::Deactivate => Some(self.notice_for(coord, &fields)?),
        };
        Ok(PreparedTransition {
            site: self.site().clone(),
            coord,
            action,
            fields,
            notice,
        })
    }

    /// Activation with planned VLANs and generated identifiers.
    pub fn prepare_activate(
        &self,
        coord: TerminalCoord,
        serial: &str,
    ) -> ChassisResult<PreparedTransition> {
        self.require_inactive(coord)?;
        let fields = self.planned_fields(coord, require_serial(serial)?)?;
        self.prepared(coord, Action::Activate, fields)
    }

    /// Activation with caller-chosen VLANs and identifiers.
    pub fn prepare_activate_explicit(
        &self,
        coord: TerminalCoord,
        serial: &str,
        overrides: TerminalOverrides,
    ) -> ChassisResult<PreparedTransition> {
        self.require_inactive(coord)?;
        let fields = TerminalFields {
            serial: require_serial(serial)?,
            s_vlan: Some(overrides.s_vlan),
            c_vlan: Some(overrides.c_vlan),
            nas_port_id: overrides.nas_port_id,
            circuit_id: overrides.circuit_id,
            tech_profile: None,
            speed_profile: None,
        };
        self.prepared(coord, Action::Activate, fields)
    }

    /// Stages VLANs, identifiers and profiles on an inactive terminal.
    pub fn prepare_pre_provision(
        &self,
        coord: TerminalCoord,
        values: PreProvision,
    ) -> ChassisResult<PreparedTransition> {
        self.require_inactive(coord)?;
        let fields = TerminalFields {
            serial: String::new(),
            s_vlan: values.s_vlan,
            c_vlan: values.c_vlan,
            nas_port_id: values.nas_port_id,
            circuit_id: values.circuit_id,
            tech_profile: values.tech_profile,
            speed_profile: values.speed_profile,
        };
        self.prepared(coord, Action::PreProvision, fields)
    }

    /// Activation of a pre-provisioned terminal by serial number.
    ///
    /// Values never staged fall back to the planned VLANs and generated
    /// identifiers.
    pub fn prepare_activate_serial(
        &self,
        coord: TerminalCoord,
        serial: &str,
    ) -> ChassisResult<PreparedTransition> {
        let staged = self.require_inactive(coord)?;
        let planned = self.planned_fields(coord, require_serial(serial)?)?;
        let fields = TerminalFields {
            serial: planned.serial,
            s_vlan: staged.s_vlan.or(planned.s_vlan),
            c_vlan: staged.c_vlan.or(planned.c_vlan),
            nas_port_id: non_empty_or(&staged.nas_port_id, || planned.nas_port_id),
            circuit_id: non_empty_or(&staged.circuit_id, || planned.circuit_id),
            tech_profile: staged.tech_profile.clone(),
            speed_profile: staged.speed_profile.clone(),
        };
        self.prepared(coord, Action::Activate, fields)
    }

    /// Deactivation. Stored VLANs, identifiers and serial are kept.
    pub fn prepare_deactivate(&self, coord: TerminalCoord) -> ChassisResult<PreparedTransition> {
        let terminal = self.physical_terminal(coord)?;
        if !terminal.active {
            return Err(ChassisError::AlreadyDeactivated {
                site: self.site().clone(),
                coord,
            });
        }
        let fields = TerminalFields {
            serial: terminal.serial.clone(),
            s_vlan: terminal.s_vlan,
            c_vlan: terminal.c_vlan,
            nas_port_id: terminal.nas_port_id.clone(),
            circuit_id: terminal.circuit_id.clone(),
            tech_profile: terminal.tech_profile.clone(),
            speed_profile: terminal.speed_profile.clone(),
        };
        self.prepared(coord, Action::Deactivate, fields)
    }

    /// Writes a prepared transition.
    pub fn commit(&mut self, prepared: PreparedTransition) -> ChassisResult<TerminalState> {
        if &prepared.site != self.site() {
            return Err(ChassisError::internal(format!(
                "transition for {} committed to {}",
                prepared.site,
                self.site()
            )));
        }
        let terminal = self.physical_terminal_mut(prepared.coord)?;
        let fields = prepared.fields;
        match prepared.action {
            Action::Activate | Action::PreProvision => {
                terminal.serial = fields.serial;
                terminal.s_vlan = fields.s_vlan;
                terminal.c_vlan = fields.c_vlan;
                terminal.nas_port_id = fields.nas_port_id;
                terminal.circuit_id = fields.circuit_id;
                terminal.tech_profile = fields.tech_profile;
                terminal.speed_profile = fields.speed_profile;
                terminal.active = prepared.action == Action::Activate;
            }
            Action::Deactivate => terminal.active = false,
        }
        Ok(if terminal.active {
            TerminalState::Active
        } else {
            TerminalState::Inactive
        })
    }

    /// Notices for every active terminal, in line card and port order.
    pub fn active_notices(&self) -> ChassisResult<Vec<TerminalNotice>> {
        let mut notices = Vec::new();
        for slot in &self.logical().slots {
            for port in &slot.ports {
                if !port.is_bound() {
                    continue;
                }
                for terminal in &port.terminals {
                    let coord = TerminalCoord::new(
                        u32::from(slot.number),
                        u32::from(port.number),
                        u32::from(terminal.number),
                    )?;
                    let physical = self.physical_terminal(coord)?;
                    if !physical.active {
                        continue;
                    }
                    let fields = TerminalFields {
                        serial: physical.serial.clone(),
                        s_vlan: physical.s_vlan,
                        c_vlan: physical.c_vlan,
                        nas_port_id: physical.nas_port_id.clone(),
                        circuit_id: physical.circuit_id.clone(),
                        tech_profile: physical.tech_profile.clone(),
                        speed_profile: physical.speed_profile.clone(),
                    };
                    notices.push(self.notice_for(coord, &fields)?);
                }
            }
        }
        Ok(notices)
    }

    /// Notices for every attached line card, in attach order.
    pub fn line_card_notices(&self) -> Vec<LineCardNotice> {
        self.physical()
            .line_cards
            .iter()
            .map(|card| LineCardNotice {
                site: self.site().clone(),
                number: card.number,
                driver: card.driver,
                address: card.address,
                hostname: card.hostname.clone(),
                port_count: card.ports.len(),
                endpoint: self.endpoint().clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aolt_types::plan;
    use pretty_assertions::assert_eq;

    fn record() -> ChassisRecord {
        let mut record = ChassisRecord::new(
            SiteId::new("SITE1").unwrap(),
            ProvisioningEndpoint::new("10.0.0.1:9000".parse().unwrap(), "admin", "secret"),
            1,
            1,
        );
        record
            .attach_line_card(LineCardDriver::Edgecore, "10.0.1.1:9191".parse().unwrap(), "olt1")
            .unwrap();
        record
    }

    fn coord(slot: u32, port: u32, terminal: u32) -> TerminalCoord {
        TerminalCoord::new(slot, port, terminal).unwrap()
    }

    fn activate(record: &mut ChassisRecord, at: TerminalCoord, serial: &str) -> ChassisResult<TerminalState> {
        let prepared = record.prepare_activate(at, serial)?;
        record.commit(prepared)
    }

    #[test]
    fn test_identifier_formats() {
        let site = SiteId::new("SITE1").unwrap();
        let at = coord(7, 1, 4);
        assert_eq!(nas_port_id(1, 2, at), "PON 1/2/7/1:4.1.1");
        assert_eq!(circuit_id(&site, 1, 2, at), "SITE1 1/2/7/1:4.1.1");
        assert_eq!(subscriber_name(&site, at), "SITE1_7_1_4_RG");
    }

    #[test]
    fn test_activate_lifecycle() {
        let mut record = record();
        let at = coord(1, 1, 1);
        assert_eq!(record.terminal_state(at), TerminalState::Inactive);

        let prepared = record.prepare_activate(at, "SN001").unwrap();
        assert_eq!(prepared.action(), Action::Activate);
        let notice = prepared.notice().unwrap();
        assert_eq!(notice.s_vlan.as_u16(), 2);
        assert_eq!(notice.c_vlan.as_u16(), 2);
        assert_eq!(notice.subscriber_name, "SITE1_1_1_1_RG");
        assert_eq!(notice.device, PhysicalPortRef { card: 1, port: 1 });
        assert_eq!(notice.device_hostname, "olt1");
        // prepare alone changes nothing
        assert_eq!(record.terminal_state(at), TerminalState::Inactive);

        assert_eq!(record.commit(prepared).unwrap(), TerminalState::Active);
        let terminal = record.physical_terminal(at).unwrap();
        assert_eq!(terminal.serial, "SN001");
        assert_eq!(terminal.nas_port_id, "PON 1/1/1/1:1.1.1");
        assert_eq!(terminal.circuit_id, "SITE1 1/1/1/1:1.1.1");

        assert_eq!(
            activate(&mut record, at, "SN001").unwrap_err(),
            ChassisError::AlreadyActive {
                site: record.site().clone(),
                coord: at
            }
        );

        let prepared = record.prepare_deactivate(at).unwrap();
        assert_eq!(prepared.notice().unwrap().serial, "SN001");
        assert_eq!(record.commit(prepared).unwrap(), TerminalState::Inactive);
        assert!(matches!(
            record.prepare_deactivate(at),
            Err(ChassisError::AlreadyDeactivated { .. })
        ));
    }

    #[test]
    fn test_deactivate_keeps_fields() {
        let mut record = record();
        let at = coord(1, 3, 10);
        activate(&mut record, at, "SN010").unwrap();
        let before = record.physical_terminal(at).unwrap().clone();
        let prepared = record.prepare_deactivate(at).unwrap();
        record.commit(prepared).unwrap();
        let after = record.physical_terminal(at).unwrap();
        assert!(!after.active);
        assert_eq!(after.serial, before.serial);
        assert_eq!(after.s_vlan, before.s_vlan);
        assert_eq!(after.circuit_id, before.circuit_id);
    }

    #[test]
    fn test_unbound_port() {
        let record = record();
        let at = coord(2, 1, 1);
        assert_eq!(record.terminal_state(at), TerminalState::Unbound);
        let expected = ChassisError::unprovisioned_port(record.site(), 2, 1);
        assert_eq!(record.prepare_activate(at, "SN").unwrap_err(), expected);
        assert_eq!(record.prepare_deactivate(at).unwrap_err(), expected);
        assert_eq!(
            record
                .prepare_pre_provision(at, PreProvision::default())
                .unwrap_err(),
            expected
        );
        assert_eq!(record.prepare_activate_serial(at, "SN").unwrap_err(), expected);
    }

    #[test]
    fn test_blank_serial_rejected() {
        let record = record();
        assert!(matches!(
            record.prepare_activate(coord(1, 1, 1), "  "),
            Err(ChassisError::Validation { .. })
        ));
    }

    #[test]
    fn test_explicit_overrides() {
        let mut record = record();
        let at = coord(1, 2, 3);
        let overrides = TerminalOverrides {
            s_vlan: VlanId::new(700).unwrap(),
            c_vlan: VlanId::new(800).unwrap(),
            nas_port_id: "custom-nas".to_string(),
            circuit_id: "custom-circuit".to_string(),
        };
        let prepared = record
            .prepare_activate_explicit(at, "SN123", overrides)
            .unwrap();
        assert_eq!(prepared.notice().unwrap().s_vlan.as_u16(), 700);
        record.commit(prepared).unwrap();
        let terminal = record.physical_terminal(at).unwrap();
        assert_eq!(terminal.c_vlan, Some(VlanId::new(800).unwrap()));
        assert_eq!(terminal.nas_port_id, "custom-nas");
        assert_eq!(terminal.circuit_id, "custom-circuit");
    }

    #[test]
    fn test_pre_provision_then_activate_serial() {
        let mut record = record();
        let at = coord(1, 4, 5);
        let values = PreProvision {
            s_vlan: Some(VlanId::new(1000).unwrap()),
            c_vlan: Some(VlanId::new(1001).unwrap()),
            nas_port_id: "nas-staged".to_string(),
            circuit_id: "circuit-staged".to_string(),
            tech_profile: Some("tp-1".to_string()),
            speed_profile: Some("1G".to_string()),
        };
        let prepared = record.prepare_pre_provision(at, values).unwrap();
        assert_eq!(prepared.action(), Action::PreProvision);
        assert!(prepared.notice().is_none());
        assert_eq!(record.commit(prepared).unwrap(), TerminalState::Inactive);
        assert_eq!(record.physical_terminal(at).unwrap().serial, "");

        let prepared = record.prepare_activate_serial(at, "SN555").unwrap();
        let notice = prepared.notice().unwrap();
        assert_eq!(notice.s_vlan.as_u16(), 1000);
        assert_eq!(notice.c_vlan.as_u16(), 1001);
        assert_eq!(notice.tech_profile.as_deref(), Some("tp-1"));
        record.commit(prepared).unwrap();
        let terminal = record.physical_terminal(at).unwrap();
        assert!(terminal.active);
        assert_eq!(terminal.serial, "SN555");
        assert_eq!(terminal.circuit_id, "circuit-staged");
        assert_eq!(terminal.speed_profile.as_deref(), Some("1G"));
    }

    #[test]
    fn test_activate_serial_without_staging_uses_plan() {
        let mut record = record();
        let at = coord(1, 1, 4);
        let prepared = record.prepare_activate_serial(at, "SN004").unwrap();
        record.commit(prepared).unwrap();
        let terminal = record.physical_terminal(at).unwrap();
        let pair = plan(at);
        assert_eq!(terminal.s_vlan, Some(pair.s_vlan));
        assert_eq!(terminal.c_vlan, Some(pair.c_vlan));
        assert_eq!(terminal.nas_port_id, "PON 1/1/1/1:4.1.1");
    }

    #[test]
    fn test_pre_provision_active_terminal_rejected() {
        let mut record = record();
        let at = coord(1, 1, 2);
        activate(&mut record, at, "SN002").unwrap();
        assert!(matches!(
            record.prepare_pre_provision(at, PreProvision::default()),
            Err(ChassisError::AlreadyActive { .. })
        ));
    }

    #[test]
    fn test_commit_to_other_site_rejected() {
        let source = record();
        let mut other = ChassisRecord::new(
            SiteId::new("SITE2").unwrap(),
            source.endpoint().clone(),
            1,
            1,
        );
        let prepared = source.prepare_activate(coord(1, 1, 1), "SN").unwrap();
        assert!(matches!(
            other.commit(prepared),
            Err(ChassisError::Internal { .. })
        ));
    }

    #[test]
    fn test_active_notices() {
        let mut record = record();
        activate(&mut record, coord(1, 2, 1), "SN-B").unwrap();
        activate(&mut record, coord(1, 1, 9), "SN-A").unwrap();
        let notices = record.active_notices().unwrap();
        let serials: Vec<&str> = notices.iter().map(|n| n.serial.as_str()).collect();
        assert_eq!(serials, vec!["SN-A", "SN-B"]);
        assert_eq!(record.line_card_notices().len(), 1);
    }
}
