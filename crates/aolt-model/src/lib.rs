//! Chassis model for the abstract OLT registry.
//!
//! A [`ChassisRecord`] pairs two trees that share one site identifier:
//!
//! - [`LogicalChassis`]: the fixed 16 slot x 16 port x 64 terminal topology
//!   handed to operators, with its planned VLAN pairs and the port binder
//! - [`PhysicalChassis`]: the line cards actually installed, in attach order,
//!   and the per-terminal provisioning state
//!
//! The binding from logical to physical ports is never stored. It is a pure
//! function of line card order and is replayed whenever a record is loaded
//! from a snapshot (see [`snapshot`]).
//!
//! Terminal transitions are split into a prepare step and a commit step (see
//! [`provision`]) so that callers can notify external systems in between.

pub mod error;
pub mod logical;
pub mod physical;
pub mod provision;
pub mod record;
pub mod snapshot;

pub use error::{ChassisError, ChassisResult};
pub use logical::{LogicalChassis, LogicalPort, LogicalSlot, LogicalTerminal};
pub use physical::{
    LineCard, PhysicalChassis, PhysicalPortRef, PhysicalTerminal, PonPort, ProvisioningEndpoint,
};
pub use provision::{
    Action, LineCardNotice, PreProvision, PreparedTransition, TerminalNotice, TerminalOverrides,
    TerminalState,
};
pub use record::ChassisRecord;
