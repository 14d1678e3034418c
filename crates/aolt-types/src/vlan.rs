//! S-tag and C-tag identifiers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A subscriber VLAN tag in 1-4094.
///
/// VLAN 1 is accepted from callers but never produced by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanId(u16);

impl VlanId {
    pub const RESERVED: VlanId = VlanId(1);

    /// # Examples
    ///
    /// ```
    /// use aolt_types::VlanId;
    ///
    /// assert_eq!(VlanId::new(434).unwrap().as_u16(), 434);
    /// assert!(VlanId::new(4095).is_err());
    /// ```
    pub const fn new(id: u16) -> Result<Self, ParseError> {
        match id {
            1..=4094 => Ok(VlanId(id)),
            _ => Err(ParseError::InvalidVlanId(id)),
        }
    }

    /// Planner output, already known to be in range.
    pub(crate) const fn planned(id: u16) -> Self {
        VlanId(id)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    pub const fn is_reserved(&self) -> bool {
        self.0 == Self::RESERVED.0
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for VlanId {
    type Error = ParseError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        VlanId::new(id)
    }
}

impl From<VlanId> for u16 {
    fn from(vlan: VlanId) -> u16 {
        vlan.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_range() {
        assert_eq!(VlanId::new(0), Err(ParseError::InvalidVlanId(0)));
        assert!(VlanId::new(1).unwrap().is_reserved());
        assert!(!VlanId::new(2).unwrap().is_reserved());
        assert_eq!(VlanId::new(4094).unwrap().as_u16(), 4094);
        assert_eq!(VlanId::new(4095), Err(ParseError::InvalidVlanId(4095)));
    }

    #[test]
    fn test_snapshot_field_is_checked() {
        let vlan: VlanId = serde_json::from_str("17").unwrap();
        assert_eq!(serde_json::to_string(&vlan).unwrap(), "17");
        assert!(serde_json::from_str::<VlanId>("0").is_err());
    }
}
