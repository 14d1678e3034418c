//! Line card driver tags.

use crate::{ParseError, PORTS_PER_SLOT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hardware family of a physical line card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCardDriver {
    Edgecore,
    Adtran,
    Tibit,
}

impl LineCardDriver {
    pub const ALL: [LineCardDriver; 3] = [
        LineCardDriver::Edgecore,
        LineCardDriver::Adtran,
        LineCardDriver::Tibit,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            LineCardDriver::Edgecore => "edgecore",
            LineCardDriver::Adtran => "adtran",
            LineCardDriver::Tibit => "tibit",
        }
    }

    /// Number of PON ports a card of this family exposes.
    ///
    /// Never exceeds [`PORTS_PER_SLOT`].
    pub const fn port_count(&self) -> usize {
        match self {
            LineCardDriver::Edgecore | LineCardDriver::Adtran | LineCardDriver::Tibit => {
                PORTS_PER_SLOT
            }
        }
    }
}

impl fmt::Display for LineCardDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LineCardDriver {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "edgecore" => Ok(LineCardDriver::Edgecore),
            "adtran" => Ok(LineCardDriver::Adtran),
            "tibit" => Ok(LineCardDriver::Tibit),
            _ => Err(ParseError::UnknownDriver(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("EdgeCore".parse::<LineCardDriver>(), Ok(LineCardDriver::Edgecore));
        assert_eq!(" tibit ".parse::<LineCardDriver>(), Ok(LineCardDriver::Tibit));
        assert_eq!(
            "calix".parse::<LineCardDriver>(),
            Err(ParseError::UnknownDriver("calix".to_string()))
        );
    }

    #[test]
    fn test_as_str_round_trip() {
        for driver in LineCardDriver::ALL {
            assert_eq!(driver.as_str().parse::<LineCardDriver>(), Ok(driver));
        }
    }

    #[test]
    fn test_port_count_fits_slot() {
        for driver in LineCardDriver::ALL {
            assert_eq!(driver.port_count(), 16);
        }
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&LineCardDriver::Adtran).unwrap(),
            "\"adtran\""
        );
    }
}
