//! Logical chassis topology and the port binder.
//!
//! The logical tree is generated once per site and never changes shape. Its
//! only mutable state is the binding of each logical port to a physical port,
//! handed out by [`LogicalChassis::allocate_next`] in slot-major, port-minor
//! order.

use crate::error::{ChassisError, ChassisResult};
use crate::physical::PhysicalPortRef;
use aolt_types::{
    plan, PortCoord, SiteId, TerminalCoord, VlanId, LOGICAL_PORT_CAPACITY, PORTS_PER_SLOT,
    SLOTS_PER_CHASSIS, TERMINALS_PER_PORT,
};
use serde::{Deserialize, Serialize};

/// Position of the next logical port the binder hands out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cursor {
    slot: usize,
    port: usize,
    exhausted: bool,
}

impl Cursor {
    fn advance(&mut self) {
        self.port += 1;
        if self.port == PORTS_PER_SLOT {
            self.port = 0;
            self.slot += 1;
            if self.slot == SLOTS_PER_CHASSIS {
                self.exhausted = true;
            }
        }
    }

    fn allocated(&self) -> usize {
        if self.exhausted {
            LOGICAL_PORT_CAPACITY
        } else {
            self.slot * PORTS_PER_SLOT + self.port
        }
    }
}

/// One terminal position with its planned VLAN pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalTerminal {
    pub number: u8,
    pub s_vlan: VlanId,
    pub c_vlan: VlanId,
    #[serde(skip)]
    port: Option<PortCoord>,
}

impl LogicalTerminal {
    /// Logical port this terminal belongs to, available after relink.
    pub fn port(&self) -> Option<PortCoord> {
        self.port
    }
}

/// One logical PON port and its optional physical binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalPort {
    pub number: u8,
    pub terminals: Vec<LogicalTerminal>,
    #[serde(skip)]
    slot: Option<u8>,
    #[serde(skip)]
    physical: Option<PhysicalPortRef>,
}

impl LogicalPort {
    /// Logical slot number this port belongs to, available after relink.
    pub fn slot(&self) -> Option<u8> {
        self.slot
    }

    /// Physical port bound to this logical port, if any.
    pub fn physical(&self) -> Option<PhysicalPortRef> {
        self.physical
    }

    pub fn is_bound(&self) -> bool {
        self.physical.is_some()
    }

    /// Links this logical port to a physical port. A port is bound at most once.
    pub fn bind(&mut self, target: PhysicalPortRef) -> ChassisResult<()> {
        if let Some(existing) = self.physical {
            return Err(ChassisError::internal(format!(
                "logical port {} on slot {:?} already bound to {existing}, refusing {target}",
                self.number, self.slot
            )));
        }
        self.physical = Some(target);
        Ok(())
    }
}

/// One logical slot of 16 ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalSlot {
    pub number: u8,
    pub ports: Vec<LogicalPort>,
    #[serde(skip)]
    chassis: Option<SiteId>,
}

impl LogicalSlot {
    /// Site of the owning chassis, available after relink.
    pub fn chassis(&self) -> Option<&SiteId> {
        self.chassis.as_ref()
    }
}

/// The abstract chassis presented to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalChassis {
    pub site: SiteId,
    pub rack: u32,
    pub shelf: u32,
    pub slots: Vec<LogicalSlot>,
    #[serde(skip)]
    cursor: Cursor,
}

impl LogicalChassis {
    /// Builds the full 16x16x64 topology with its VLAN plan.
    pub fn generate(site: SiteId, rack: u32, shelf: u32) -> Self {
        let mut slots = Vec::with_capacity(SLOTS_PER_CHASSIS);
        for slot_index in 0..SLOTS_PER_CHASSIS {
            let mut ports = Vec::with_capacity(PORTS_PER_SLOT);
            for port_index in 0..PORTS_PER_SLOT {
                let terminals = (0..TERMINALS_PER_PORT)
                    .filter_map(|t| TerminalCoord::from_indices(slot_index, port_index, t).ok())
                    .map(|coord| {
                        let pair = plan(coord);
                        LogicalTerminal {
                            number: coord.terminal(),
                            s_vlan: pair.s_vlan,
                            c_vlan: pair.c_vlan,
                            port: None,
                        }
                    })
                    .collect();
                ports.push(LogicalPort {
                    number: (port_index + 1) as u8,
                    terminals,
                    slot: None,
                    physical: None,
                });
            }
            slots.push(LogicalSlot {
                number: (slot_index + 1) as u8,
                ports,
                chassis: None,
            });
        }

        let mut chassis = Self {
            site,
            rack,
            shelf,
            slots,
            cursor: Cursor::default(),
        };
        chassis.relink();
        chassis
    }

    /// Hands out the next unbound logical port.
    ///
    /// Ports are returned slot-major, port-minor. After the 256th port every
    /// call fails with [`ChassisError::Exhausted`].
    pub fn allocate_next(&mut self) -> ChassisResult<&mut LogicalPort> {
        if self.cursor.exhausted {
            return Err(ChassisError::Exhausted {
                site: self.site.clone(),
                requested: 1,
                remaining: 0,
            });
        }
        let Cursor { slot, port, .. } = self.cursor;
        self.cursor.advance();
        self.slots
            .get_mut(slot)
            .and_then(|s| s.ports.get_mut(port))
            .ok_or_else(|| ChassisError::internal(format!("cursor {slot}/{port} outside topology")))
    }

    /// Number of logical ports not yet handed out.
    pub fn remaining(&self) -> usize {
        LOGICAL_PORT_CAPACITY - self.cursor.allocated()
    }

    pub fn port(&self, coord: PortCoord) -> Option<&LogicalPort> {
        self.slots
            .get(coord.slot_index())?
            .ports
            .get(coord.port_index())
    }

    pub fn terminal(&self, coord: TerminalCoord) -> Option<&LogicalTerminal> {
        self.port(coord.port_coord())?
            .terminals
            .get(coord.terminal_index())
    }

    /// Drops every binding and rewinds the binder.
    pub(crate) fn reset_bindings(&mut self) {
        self.cursor = Cursor::default();
        for port in self.slots.iter_mut().flat_map(|s| s.ports.iter_mut()) {
            port.physical = None;
        }
    }

    /// Rebuilds every back-reference from the owning structure.
    pub fn relink(&mut self) {
        for slot in &mut self.slots {
            slot.chassis = Some(self.site.clone());
            for port in &mut slot.ports {
                port.slot = Some(slot.number);
                let coord = PortCoord::new(u32::from(slot.number), u32::from(port.number)).ok();
                for terminal in &mut port.terminals {
                    terminal.port = coord;
                }
            }
        }
    }

    /// Checks numbering and sizes of a decoded tree.
    pub fn validate(&self) -> ChassisResult<()> {
        if self.slots.len() != SLOTS_PER_CHASSIS {
            return Err(ChassisError::snapshot(format!(
                "logical chassis has {} slots, expected {SLOTS_PER_CHASSIS}",
                self.slots.len()
            )));
        }
        for (i, slot) in self.slots.iter().enumerate() {
            if usize::from(slot.number) != i + 1 || slot.ports.len() != PORTS_PER_SLOT {
                return Err(ChassisError::snapshot(format!(
                    "logical slot at position {} is numbered {} with {} ports",
                    i + 1,
                    slot.number,
                    slot.ports.len()
                )));
            }
            for (j, port) in slot.ports.iter().enumerate() {
                if usize::from(port.number) != j + 1 || port.terminals.len() != TERMINALS_PER_PORT {
                    return Err(ChassisError::snapshot(format!(
                        "logical port at {}/{} is numbered {} with {} terminal slots",
                        slot.number,
                        j + 1,
                        port.number,
                        port.terminals.len()
                    )));
                }
                for (k, terminal) in port.terminals.iter().enumerate() {
                    if usize::from(terminal.number) != k + 1 {
                        return Err(ChassisError::snapshot(format!(
                            "logical terminal at {}/{}/{} is numbered {}",
                            slot.number,
                            port.number,
                            k + 1,
                            terminal.number
                        )));
                    }
                    let planned = plan(TerminalCoord::from_indices(i, j, k)?);
                    if terminal.s_vlan != planned.s_vlan || terminal.c_vlan != planned.c_vlan {
                        return Err(ChassisError::snapshot(format!(
                            "logical terminal {}/{}/{} carries VLANs {}/{}, planned {}/{}",
                            slot.number,
                            port.number,
                            terminal.number,
                            terminal.s_vlan,
                            terminal.c_vlan,
                            planned.s_vlan,
                            planned.c_vlan
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
