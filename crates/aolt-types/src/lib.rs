//! Common types for the abstract OLT chassis registry.
//!
//! This crate provides type-safe representations of the primitives shared
//! by the chassis model and the registry daemon:
//!
//! - [`SiteId`]: CLLI site identifier naming one chassis record
//! - [`TerminalCoord`] / [`PortCoord`]: validated 1-based chassis coordinates
//! - [`VlanId`] / [`VlanPair`]: IEEE 802.1Q identifiers and S/C tag pairs
//! - [`plan`]: the deterministic S/C VLAN plan for a terminal slot
//! - [`LineCardDriver`]: hardware family tag for physical line cards
//!
//! # Numbering
//!
//! Slot, port and terminal numbers are 1-based everywhere they cross an API
//! boundary. Conversion to 0-based array indices happens only through the
//! `*_index()` accessors on the coordinate types.

mod coord;
mod driver;
mod plan;
mod site;
mod vlan;

pub use coord::{PortCoord, TerminalCoord};
pub use driver::LineCardDriver;
pub use plan::{plan, VlanPair};
pub use site::SiteId;
pub use vlan::VlanId;

/// Number of logical slots in an abstract chassis.
pub const SLOTS_PER_CHASSIS: usize = 16;

/// Number of logical PON ports per logical slot.
pub const PORTS_PER_SLOT: usize = 16;

/// Number of terminal (ONT) slots per PON port, logical or physical.
pub const TERMINALS_PER_PORT: usize = 64;

/// Total number of logical ports the binder can hand out.
pub const LOGICAL_PORT_CAPACITY: usize = SLOTS_PER_CHASSIS * PORTS_PER_SLOT;

/// Common error type for parsing and validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid site identifier: {0:?}")]
    InvalidSiteId(String),

    #[error("{field} {value} out of range (must be 1-{max})")]
    CoordinateOutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(u16),

    #[error("unknown line card driver: {0}")]
    UnknownDriver(String),
}
