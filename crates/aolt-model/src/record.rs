//! Chassis record: one logical and one physical chassis for a site.

use crate::error::{ChassisError, ChassisResult};
use crate::logical::LogicalChassis;
use crate::physical::{LineCard, PhysicalChassis, PhysicalPortRef, PhysicalTerminal, ProvisioningEndpoint};
use crate::provision::LineCardNotice;
use aolt_types::{LineCardDriver, PortCoord, SiteId, TerminalCoord};
use std::net::SocketAddr;
use tracing::debug;

/// Everything the registry knows about one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChassisRecord {
    logical: LogicalChassis,
    physical: PhysicalChassis,
}

impl ChassisRecord {
    /// Creates an empty record with a freshly generated logical topology.
    pub fn new(site: SiteId, endpoint: ProvisioningEndpoint, rack: u32, shelf: u32) -> Self {
        Self {
            logical: LogicalChassis::generate(site.clone(), rack, shelf),
            physical: PhysicalChassis::new(site, endpoint, rack, shelf),
        }
    }

    /// Assembles a record from decoded trees: relinks both, validates their
    /// shape, then replays the port binder over the stored line cards.
    pub fn from_parts(mut logical: LogicalChassis, mut physical: PhysicalChassis) -> ChassisResult<Self> {
        if logical.site != physical.site {
            return Err(ChassisError::snapshot(format!(
                "logical site {} does not match physical site {}",
                logical.site, physical.site
            )));
        }
        logical.relink();
        physical.relink();
        logical.validate()?;
        physical.validate()?;

        let mut record = Self { logical, physical };
        record.replay_bindings()?;
        Ok(record)
    }

    /// Rebuilds every logical-to-physical binding from line card order.
    pub(crate) fn replay_bindings(&mut self) -> ChassisResult<()> {
        self.logical.reset_bindings();
        let mut bound = 0usize;
        for card in &self.physical.line_cards {
            for port in &card.ports {
                self.logical.allocate_next()?.bind(PhysicalPortRef {
                    card: card.number,
                    port: port.number,
                })?;
                bound += 1;
            }
        }
        debug!(site = %self.site(), bound, "replayed port bindings");
        Ok(())
    }

    pub fn site(&self) -> &SiteId {
        &self.physical.site
    }

    pub fn logical(&self) -> &LogicalChassis {
        &self.logical
    }

    pub fn physical(&self) -> &PhysicalChassis {
        &self.physical
    }

    pub fn endpoint(&self) -> &ProvisioningEndpoint {
        &self.physical.endpoint
    }

    pub fn set_credentials(&mut self, user: impl Into<String>, password: impl Into<String>) {
        self.physical.endpoint.user = user.into();
        self.physical.endpoint.password = password.into();
    }

    /// Checks that a card with this driver fits and describes it, without
    /// mutating anything.
    pub fn prepare_line_card(
        &self,
        driver: LineCardDriver,
        address: SocketAddr,
        hostname: &str,
    ) -> ChassisResult<LineCardNotice> {
        let requested = driver.port_count();
        let remaining = self.logical.remaining();
        if requested > remaining {
            return Err(ChassisError::Exhausted {
                site: self.site().clone(),
                requested,
                remaining,
            });
        }
        if hostname.trim().is_empty() {
            return Err(ChassisError::validation("hostname", "must not be empty"));
        }
        let number = u8::try_from(self.physical.line_cards.len() + 1)
            .map_err(|_| ChassisError::internal("line card ordinal overflow"))?;
        Ok(LineCardNotice {
            site: self.site().clone(),
            number,
            driver,
            address,
            hostname: hostname.trim().to_string(),
            port_count: requested,
            endpoint: self.physical.endpoint.clone(),
        })
    }

    /// Appends a line card and binds one logical port per physical port, in
    /// card port order. Returns the new card's ordinal.
    ///
    /// Fails with [`ChassisError::Exhausted`] before touching anything if the
    /// binder cannot cover every port of the card.
    pub fn attach_line_card(
        &mut self,
        driver: LineCardDriver,
        address: SocketAddr,
        hostname: &str,
    ) -> ChassisResult<u8> {
        let notice = self.prepare_line_card(driver, address, hostname)?;
        self.commit_line_card(&notice)
    }

    /// Applies a line card previously described by [`prepare_line_card`](Self::prepare_line_card).
    pub fn commit_line_card(&mut self, notice: &LineCardNotice) -> ChassisResult<u8> {
        if &notice.site != self.site() {
            return Err(ChassisError::internal(format!(
                "line card for {} committed to {}",
                notice.site,
                self.site()
            )));
        }
        let card = self
            .physical
            .append_line_card(notice.driver, notice.address, notice.hostname.as_str())?;
        if card.number != notice.number {
            return Err(ChassisError::internal(format!(
                "line card prepared as {} appended as {}",
                notice.number, card.number
            )));
        }
        let number = card.number;
        let ports: Vec<u8> = card.ports.iter().map(|p| p.number).collect();
        for port in ports {
            self.logical
                .allocate_next()?
                .bind(PhysicalPortRef { card: number, port })?;
        }
        Ok(number)
    }

    /// Line card with the given 1-based ordinal.
    pub fn line_card(&self, number: u32) -> ChassisResult<&LineCard> {
        u8::try_from(number)
            .ok()
            .and_then(|n| self.physical.line_card(n))
            .ok_or_else(|| ChassisError::unprovisioned_slot(self.site(), number))
    }

    /// Physical port bound to a logical port, if any.
    pub fn binding(&self, coord: PortCoord) -> Option<PhysicalPortRef> {
        self.logical.port(coord)?.physical()
    }

    /// Physical terminal behind a logical coordinate.
    pub fn physical_terminal(&self, coord: TerminalCoord) -> ChassisResult<&PhysicalTerminal> {
        let at = self.require_binding(coord)?;
        self.physical
            .terminal(at, coord.terminal_index())
            .ok_or_else(|| dangling(coord, at))
    }

    pub(crate) fn physical_terminal_mut(
        &mut self,
        coord: TerminalCoord,
    ) -> ChassisResult<&mut PhysicalTerminal> {
        let at = self.require_binding(coord)?;
        self.physical
            .terminal_mut(at, coord.terminal_index())
            .ok_or_else(|| dangling(coord, at))
    }

    pub(crate) fn require_binding(&self, coord: TerminalCoord) -> ChassisResult<PhysicalPortRef> {
        self.binding(coord.port_coord()).ok_or_else(|| {
            ChassisError::unprovisioned_port(self.site(), coord.slot(), coord.port())
        })
    }
}

fn dangling(coord: TerminalCoord, at: PhysicalPortRef) -> ChassisError {
    ChassisError::internal(format!("logical {coord} bound to missing {at}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record() -> ChassisRecord {
        ChassisRecord::new(
            SiteId::new("SITE1").unwrap(),
            ProvisioningEndpoint::new("10.0.0.1:9000".parse().unwrap(), "admin", "secret"),
            1,
            1,
        )
    }

    fn addr(last: u8) -> SocketAddr {
        SocketAddr::from(([10, 0, 1, last], 9191))
    }

    #[test]
    fn test_attach_binds_in_order() {
        let mut record = record();
        assert_eq!(
            record
                .attach_line_card(LineCardDriver::Edgecore, addr(1), "olt1")
                .unwrap(),
            1
        );
        assert_eq!(
            record
                .attach_line_card(LineCardDriver::Edgecore, addr(2), "olt2")
                .unwrap(),
            2
        );

        let first = PortCoord::new(1, 1).unwrap();
        let last = PortCoord::new(2, 16).unwrap();
        assert_eq!(record.binding(first), Some(PhysicalPortRef { card: 1, port: 1 }));
        assert_eq!(record.binding(last), Some(PhysicalPortRef { card: 2, port: 16 }));
        assert_eq!(record.binding(PortCoord::new(3, 1).unwrap()), None);
        assert_eq!(record.logical().remaining(), 224);
    }

    #[test]
    fn test_attach_seventeenth_card_exhausts() {
        let mut record = record();
        for i in 1..=16u8 {
            record
                .attach_line_card(LineCardDriver::Tibit, addr(i), &format!("olt{i}"))
                .unwrap();
        }
        let err = record
            .attach_line_card(LineCardDriver::Tibit, addr(17), "olt17")
            .unwrap_err();
        assert_eq!(
            err,
            ChassisError::Exhausted {
                site: SiteId::new("SITE1").unwrap(),
                requested: 16,
                remaining: 0,
            }
        );
        assert_eq!(record.physical().line_cards.len(), 16);
    }

    #[test]
    fn test_attach_rejects_blank_hostname() {
        let mut record = record();
        let err = record
            .attach_line_card(LineCardDriver::Adtran, addr(1), "  ")
            .unwrap_err();
        assert!(matches!(err, ChassisError::Validation { .. }));
        assert!(record.physical().line_cards.is_empty());
    }

    #[test]
    fn test_line_card_lookup() {
        let mut record = record();
        record
            .attach_line_card(LineCardDriver::Adtran, addr(1), "olt1")
            .unwrap();
        assert_eq!(record.line_card(1).unwrap().hostname, "olt1");
        assert_eq!(
            record.line_card(2).unwrap_err(),
            ChassisError::unprovisioned_slot(record.site(), 2)
        );
        assert!(record.line_card(0).is_err());
        assert!(record.line_card(300).is_err());
    }

    #[test]
    fn test_physical_terminal_requires_binding() {
        let mut record = record();
        record
            .attach_line_card(LineCardDriver::Edgecore, addr(1), "olt1")
            .unwrap();
        let bound = TerminalCoord::new(1, 16, 64).unwrap();
        assert_eq!(record.physical_terminal(bound).unwrap().number, 64);

        let unbound = TerminalCoord::new(2, 1, 1).unwrap();
        assert_eq!(
            record.physical_terminal(unbound).unwrap_err(),
            ChassisError::unprovisioned_port(record.site(), 2, 1)
        );
    }

    #[test]
    fn test_from_parts_replays_bindings() {
        let mut original = record();
        original
            .attach_line_card(LineCardDriver::Edgecore, addr(1), "olt1")
            .unwrap();
        let rebuilt =
            ChassisRecord::from_parts(original.logical.clone(), original.physical.clone()).unwrap();
        assert_eq!(rebuilt, original);
        assert_eq!(rebuilt.logical().remaining(), 240);
    }

    #[test]
    fn test_from_parts_rejects_site_mismatch() {
        let a = record();
        let mut physical = a.physical().clone();
        physical.site = SiteId::new("OTHER").unwrap();
        let err = ChassisRecord::from_parts(a.logical().clone(), physical).unwrap_err();
        assert!(matches!(err, ChassisError::Snapshot { .. }));
    }
}
