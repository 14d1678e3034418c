//! Physical chassis: installed line cards, PON ports and terminal state.

use crate::error::{ChassisError, ChassisResult};
use aolt_types::{LineCardDriver, SiteId, VlanId, TERMINALS_PER_PORT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Locator of a physical PON port: 1-based line card ordinal and port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PhysicalPortRef {
    pub card: u8,
    pub port: u8,
}

impl fmt::Display for PhysicalPortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "card {} port {}", self.card, self.port)
    }
}

/// Where and as whom the external provisioning system is reached.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningEndpoint {
    pub address: SocketAddr,
    pub user: String,
    pub password: String,
}

impl ProvisioningEndpoint {
    pub fn new(address: SocketAddr, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            address,
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for ProvisioningEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningEndpoint")
            .field("address", &self.address)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Provisioning state of one terminal position on a PON port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalTerminal {
    pub number: u8,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub serial: String,
    #[serde(default)]
    pub s_vlan: Option<VlanId>,
    #[serde(default)]
    pub c_vlan: Option<VlanId>,
    #[serde(default)]
    pub nas_port_id: String,
    #[serde(default)]
    pub circuit_id: String,
    #[serde(default)]
    pub tech_profile: Option<String>,
    #[serde(default)]
    pub speed_profile: Option<String>,
    #[serde(skip)]
    port: Option<PhysicalPortRef>,
}

impl PhysicalTerminal {
    fn empty(number: u8) -> Self {
        Self {
            number,
            active: false,
            serial: String::new(),
            s_vlan: None,
            c_vlan: None,
            nas_port_id: String::new(),
            circuit_id: String::new(),
            tech_profile: None,
            speed_profile: None,
            port: None,
        }
    }

    /// Port this terminal sits on, available after relink.
    pub fn port_ref(&self) -> Option<PhysicalPortRef> {
        self.port
    }
}

/// One PON port on a line card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PonPort {
    pub number: u8,
    pub terminals: Vec<PhysicalTerminal>,
    #[serde(skip)]
    card: Option<u8>,
}

impl PonPort {
    fn new(number: u8) -> Self {
        Self {
            number,
            terminals: (1..=TERMINALS_PER_PORT as u8)
                .map(PhysicalTerminal::empty)
                .collect(),
            card: None,
        }
    }

    /// Ordinal of the owning line card, available after relink.
    pub fn card(&self) -> Option<u8> {
        self.card
    }
}

/// A physical line card (one OLT device) attached to the chassis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCard {
    pub number: u8,
    pub driver: LineCardDriver,
    pub address: SocketAddr,
    pub hostname: String,
    pub ports: Vec<PonPort>,
    #[serde(skip)]
    chassis: Option<SiteId>,
}

impl LineCard {
    /// Site of the owning chassis, available after relink.
    pub fn chassis(&self) -> Option<&SiteId> {
        self.chassis.as_ref()
    }

    pub fn port(&self, number: u8) -> Option<&PonPort> {
        self.ports.get(usize::from(number).checked_sub(1)?)
    }

    fn relink(&mut self, site: &SiteId) {
        self.chassis = Some(site.clone());
        for port in &mut self.ports {
            port.card = Some(self.number);
            let port_ref = PhysicalPortRef {
                card: self.number,
                port: port.number,
            };
            for terminal in &mut port.terminals {
                terminal.port = Some(port_ref);
            }
        }
    }
}

/// The installed hardware of one site, in attach order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalChassis {
    pub site: SiteId,
    pub endpoint: ProvisioningEndpoint,
    pub rack: u32,
    pub shelf: u32,
    #[serde(default)]
    pub line_cards: Vec<LineCard>,
}

impl PhysicalChassis {
    pub fn new(site: SiteId, endpoint: ProvisioningEndpoint, rack: u32, shelf: u32) -> Self {
        Self {
            site,
            endpoint,
            rack,
            shelf,
            line_cards: Vec::new(),
        }
    }

    /// Appends a line card with the next ordinal and returns it.
    ///
    /// The port binder is not involved here; see
    /// [`ChassisRecord::attach_line_card`](crate::ChassisRecord::attach_line_card).
    pub fn append_line_card(
        &mut self,
        driver: LineCardDriver,
        address: SocketAddr,
        hostname: impl Into<String>,
    ) -> ChassisResult<&LineCard> {
        let number = u8::try_from(self.line_cards.len() + 1)
            .map_err(|_| ChassisError::internal("line card ordinal overflow"))?;
        let port_count = u8::try_from(driver.port_count())
            .map_err(|_| ChassisError::internal("driver port count overflow"))?;
        let mut card = LineCard {
            number,
            driver,
            address,
            hostname: hostname.into(),
            ports: (1..=port_count).map(PonPort::new).collect(),
            chassis: None,
        };
        card.relink(&self.site);
        self.line_cards.push(card);
        self.line_cards
            .last()
            .ok_or_else(|| ChassisError::internal("line card vanished after append"))
    }

    pub fn line_card(&self, number: u8) -> Option<&LineCard> {
        self.line_cards.get(usize::from(number).checked_sub(1)?)
    }

    pub fn terminal(&self, at: PhysicalPortRef, terminal_index: usize) -> Option<&PhysicalTerminal> {
        self.line_card(at.card)?.port(at.port)?.terminals.get(terminal_index)
    }

    pub fn terminal_mut(
        &mut self,
        at: PhysicalPortRef,
        terminal_index: usize,
    ) -> Option<&mut PhysicalTerminal> {
        let card = self
            .line_cards
            .get_mut(usize::from(at.card).checked_sub(1)?)?;
        let port = card.ports.get_mut(usize::from(at.port).checked_sub(1)?)?;
        port.terminals.get_mut(terminal_index)
    }

    /// Rebuilds every back-reference from the owning structure.
    pub fn relink(&mut self) {
        let site = self.site.clone();
        for card in &mut self.line_cards {
            card.relink(&site);
        }
    }

    /// Checks numbering and sizes of a decoded tree.
    pub fn validate(&self) -> ChassisResult<()> {
        for (i, card) in self.line_cards.iter().enumerate() {
            if usize::from(card.number) != i + 1 {
                return Err(ChassisError::snapshot(format!(
                    "line card at position {} is numbered {}",
                    i + 1,
                    card.number
                )));
            }
            if card.ports.len() != card.driver.port_count() {
                return Err(ChassisError::snapshot(format!(
                    "line card {} has {} ports, {} driver expects {}",
                    card.number,
                    card.ports.len(),
                    card.driver,
                    card.driver.port_count()
                )));
            }
            for (j, port) in card.ports.iter().enumerate() {
                if usize::from(port.number) != j + 1 {
                    return Err(ChassisError::snapshot(format!(
                        "line card {} port at position {} is numbered {}",
                        card.number,
                        j + 1,
                        port.number
                    )));
                }
                if port.terminals.len() != TERMINALS_PER_PORT {
                    return Err(ChassisError::snapshot(format!(
                        "line card {} port {} has {} terminal slots",
                        card.number,
                        port.number,
                        port.terminals.len()
                    )));
                }
                for (k, terminal) in port.terminals.iter().enumerate() {
                    if usize::from(terminal.number) != k + 1 {
                        return Err(ChassisError::snapshot(format!(
                            "line card {} port {} terminal at position {} is numbered {}",
                            card.number,
                            port.number,
                            k + 1,
                            terminal.number
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
