//! Read-only inventory views of a chassis record.
//!
//! Logical slots that have a physical binding are listed with the physical
//! devices backing them. Consecutive ports bound to the same line card are
//! grouped under that card. Only terminals carrying a Circuit-ID appear.

use aolt_model::{ChassisRecord, PhysicalTerminal};
use aolt_types::{SiteId, VlanId};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChassisInventory {
    pub site: SiteId,
    pub rack: u32,
    pub shelf: u32,
    pub endpoint: SocketAddr,
    pub slots: Vec<SlotInventory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInventory {
    pub number: u8,
    pub devices: Vec<DeviceInventory>,
}

/// A physical line card as seen from one logical slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInventory {
    pub card: u8,
    pub address: SocketAddr,
    pub hostname: String,
    pub ports: Vec<PortInventory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInventory {
    pub logical_number: u8,
    pub physical_number: u8,
    pub terminals: Vec<TerminalInventory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalInventory {
    pub number: u8,
    pub active: bool,
    pub s_vlan: Option<VlanId>,
    pub c_vlan: Option<VlanId>,
    pub serial: String,
    pub nas_port_id: String,
    pub circuit_id: String,
}

impl From<&PhysicalTerminal> for TerminalInventory {
    fn from(terminal: &PhysicalTerminal) -> Self {
        Self {
            number: terminal.number,
            active: terminal.active,
            s_vlan: terminal.s_vlan,
            c_vlan: terminal.c_vlan,
            serial: terminal.serial.clone(),
            nas_port_id: terminal.nas_port_id.clone(),
            circuit_id: terminal.circuit_id.clone(),
        }
    }
}

/// Builds the inventory view of one record.
pub fn gather(record: &ChassisRecord) -> ChassisInventory {
    let logical = record.logical();
    let physical = record.physical();

    let mut slots = Vec::new();
    for slot in &logical.slots {
        let mut devices: Vec<DeviceInventory> = Vec::new();
        for port in &slot.ports {
            let Some(at) = port.physical() else {
                continue;
            };
            let Some(card) = physical.line_card(at.card) else {
                continue;
            };
            let Some(pon) = card.port(at.port) else {
                continue;
            };
            let entry = PortInventory {
                logical_number: port.number,
                physical_number: pon.number,
                terminals: pon
                    .terminals
                    .iter()
                    .filter(|t| !t.circuit_id.is_empty())
                    .map(TerminalInventory::from)
                    .collect(),
            };
            match devices.last_mut() {
                Some(device) if device.card == card.number => device.ports.push(entry),
                _ => devices.push(DeviceInventory {
                    card: card.number,
                    address: card.address,
                    hostname: card.hostname.clone(),
                    ports: vec![entry],
                }),
            }
        }
        if !devices.is_empty() {
            slots.push(SlotInventory {
                number: slot.number,
                devices,
            });
        }
    }

    ChassisInventory {
        site: record.site().clone(),
        rack: logical.rack,
        shelf: logical.shelf,
        endpoint: record.endpoint().address,
        slots,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aolt_model::ProvisioningEndpoint;
    use aolt_types::{LineCardDriver, TerminalCoord};
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

    #[test]
    fn test_empty_chassis() {
        let record = ChassisRecord::new(
            SiteId::new("EMPTY").unwrap(),
            ProvisioningEndpoint::new("10.0.0.1:9000".parse().unwrap(), "admin", "secret"),
            2,
            3,
        );
        let inventory = gather(&record);
        assert_eq!(inventory.rack, 2);
        assert_eq!(inventory.shelf, 3);
        assert!(inventory.slots.is_empty());
    }

    #[test]
    fn test_groups_ports_under_card() {
        let inventory = gather(&record());
        assert_eq!(inventory.slots.len(), 1);
        let slot = &inventory.slots[0];
        assert_eq!(slot.number, 1);
        assert_eq!(slot.devices.len(), 1);
        assert_eq!(slot.devices[0].hostname, "olt1");
        assert_eq!(slot.devices[0].ports.len(), 16);
        assert!(slot.devices[0].ports.iter().all(|p| p.terminals.is_empty()));
    }

    #[test]
    fn test_lists_terminals_with_circuit_id() {
        let mut record = record();
        let at = TerminalCoord::new(1, 2, 7).unwrap();
        let prepared = record.prepare_activate(at, "SN007").unwrap();
        record.commit(prepared).unwrap();

        let inventory = gather(&record);
        let port = &inventory.slots[0].devices[0].ports[1];
        assert_eq!(port.logical_number, 2);
        assert_eq!(port.physical_number, 2);
        assert_eq!(port.terminals.len(), 1);
        let terminal = &port.terminals[0];
        assert_eq!(terminal.number, 7);
        assert!(terminal.active);
        assert_eq!(terminal.serial, "SN007");
        assert_eq!(terminal.circuit_id, "SITE1 1/1/1/2:7.1.1");
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_value(gather(&record())).unwrap();
        assert_eq!(json["site"], "SITE1");
        assert_eq!(json["endpoint"], "10.0.0.1:9000");
        assert_eq!(json["slots"][0]["devices"][0]["ports"][15]["logical_number"], 16);
    }
}
