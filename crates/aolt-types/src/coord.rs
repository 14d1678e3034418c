//! Validated 1-based chassis coordinates.

use crate::{ParseError, PORTS_PER_SLOT, SLOTS_PER_CHASSIS, TERMINALS_PER_PORT};
use serde::Serialize;
use std::fmt;

fn check(field: &'static str, value: u32, max: usize) -> Result<u8, ParseError> {
    // max is at most 64, so the cast below cannot truncate
    if value >= 1 && value as usize <= max {
        Ok(value as u8)
    } else {
        Err(ParseError::CoordinateOutOfRange {
            field,
            value,
            max: max as u32,
        })
    }
}

/// Address of one logical PON port: 1-based slot and port numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PortCoord {
    slot: u8,
    port: u8,
}

impl PortCoord {
    /// Creates a port coordinate from 1-based slot and port numbers.
    pub fn new(slot: u32, port: u32) -> Result<Self, ParseError> {
        Ok(Self {
            slot: check("slot", slot, SLOTS_PER_CHASSIS)?,
            port: check("port", port, PORTS_PER_SLOT)?,
        })
    }

    /// Creates a port coordinate from 0-based array indices.
    pub fn from_indices(slot_index: usize, port_index: usize) -> Result<Self, ParseError> {
        let slot = u32::try_from(slot_index + 1).unwrap_or(u32::MAX);
        let port = u32::try_from(port_index + 1).unwrap_or(u32::MAX);
        Self::new(slot, port)
    }

    pub const fn slot(&self) -> u8 {
        self.slot
    }

    pub const fn port(&self) -> u8 {
        self.port
    }

    pub const fn slot_index(&self) -> usize {
        self.slot as usize - 1
    }

    pub const fn port_index(&self) -> usize {
        self.port as usize - 1
    }

    /// Extends this port address with a 1-based terminal number.
    pub fn terminal(self, terminal: u32) -> Result<TerminalCoord, ParseError> {
        Ok(TerminalCoord {
            port: self,
            terminal: check("terminal", terminal, TERMINALS_PER_PORT)?,
        })
    }
}

impl fmt::Display for PortCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.slot, self.port)
    }
}

/// Address of one terminal (ONT) slot: 1-based slot, port and terminal.
///
/// # Examples
///
/// ```
/// use aolt_types::TerminalCoord;
///
/// let coord = TerminalCoord::new(7, 1, 4).unwrap();
/// assert_eq!(coord.slot_index(), 6);
/// assert_eq!(coord.terminal_index(), 3);
///
/// assert!(TerminalCoord::new(0, 1, 1).is_err());
/// assert!(TerminalCoord::new(1, 1, 65).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TerminalCoord {
    #[serde(flatten)]
    port: PortCoord,
    terminal: u8,
}

impl TerminalCoord {
    /// Creates a terminal coordinate from 1-based numbers.
    pub fn new(slot: u32, port: u32, terminal: u32) -> Result<Self, ParseError> {
        PortCoord::new(slot, port)?.terminal(terminal)
    }

    /// Creates a terminal coordinate from 0-based array indices.
    pub fn from_indices(
        slot_index: usize,
        port_index: usize,
        terminal_index: usize,
    ) -> Result<Self, ParseError> {
        let terminal = u32::try_from(terminal_index + 1).unwrap_or(u32::MAX);
        PortCoord::from_indices(slot_index, port_index)?.terminal(terminal)
    }

    pub const fn port_coord(&self) -> PortCoord {
        self.port
    }

    pub const fn slot(&self) -> u8 {
        self.port.slot
    }

    pub const fn port(&self) -> u8 {
        self.port.port
    }

    pub const fn terminal(&self) -> u8 {
        self.terminal
    }

    pub const fn slot_index(&self) -> usize {
        self.port.slot_index()
    }

    pub const fn port_index(&self) -> usize {
        self.port.port_index()
    }

    pub const fn terminal_index(&self) -> usize {
        self.terminal as usize - 1
    }
}

impl fmt::Display for TerminalCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.terminal)
    }
}
