//! Deterministic S/C VLAN plan.
//!
//! Terminals are spread over 32-wide C-tag bands; the second half of each
//! port's 64 terminals moves to a second S-tag band 288 above the first.

use crate::{TerminalCoord, VlanId};
use serde::Serialize;

const C_TERMINAL_STRIDE: u16 = 120;
const C_SLOT_STRIDE: u16 = 12;
const S_SLOT_STRIDE: u16 = 16;
const S_BAND_STRIDE: u16 = 288;
const BAND_WIDTH: u16 = 32;

/// Outer (S) and inner (C) VLAN tags for one terminal slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VlanPair {
    pub s_vlan: VlanId,
    pub c_vlan: VlanId,
}

/// Computes the planned VLAN pair for a terminal slot.
///
/// Every coordinate in the 16x16x64 topology maps to a distinct pair, and no
/// tag equals VLAN 1.
///
/// # Examples
///
/// ```
/// use aolt_types::{plan, TerminalCoord};
///
/// let pair = plan(TerminalCoord::new(7, 1, 4).unwrap());
/// assert_eq!(pair.s_vlan.as_u16(), 98);
/// assert_eq!(pair.c_vlan.as_u16(), 434);
/// ```
pub fn plan(coord: TerminalCoord) -> VlanPair {
    let slot = u16::from(coord.slot()) - 1;
    let port = u16::from(coord.port());
    let terminal = u16::from(coord.terminal()) - 1;

    // Max C is 31*120 + 15*12 + 17 = 3917, max S is 256 + 288 + 1 = 545.
    let c = (terminal % BAND_WIDTH) * C_TERMINAL_STRIDE + slot * C_SLOT_STRIDE + port + 1;
    let s = (slot * S_SLOT_STRIDE + port) + (terminal / BAND_WIDTH) * S_BAND_STRIDE + 1;

    VlanPair {
        s_vlan: VlanId::planned(s),
        c_vlan: VlanId::planned(c),
    }
}
