//! CLLI site identifier.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Site identifier (CLLI code) naming one chassis record.
///
/// Surrounding whitespace is stripped; an empty identifier is rejected.
///
/// # Examples
///
/// ```
/// use aolt_types::SiteId;
///
/// let site: SiteId = " SITE1 ".parse().unwrap();
/// assert_eq!(site.as_str(), "SITE1");
///
/// assert!(SiteId::new("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SiteId(String);

impl SiteId {
    pub fn new(id: impl AsRef<str>) -> Result<Self, ParseError> {
        let trimmed = id.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ParseError::InvalidSiteId(id.as_ref().to_string()));
        }
        Ok(SiteId(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SiteId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SiteId::new(s)
    }
}

impl TryFrom<String> for SiteId {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        SiteId::new(s)
    }
}

impl From<SiteId> for String {
    fn from(site: SiteId) -> String {
        site.0
    }
}

impl AsRef<str> for SiteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_trims_whitespace() {
        let site = SiteId::new("\tSITE1\n").unwrap();
        assert_eq!(site.as_str(), "SITE1");
        assert_eq!(site.to_string(), "SITE1");
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(
            SiteId::new(""),
            Err(ParseError::InvalidSiteId(String::new()))
        );
        assert!(" ".parse::<SiteId>().is_err());
    }

    #[test]
    fn test_serde() {
        let site: SiteId = serde_json::from_str("\"ABCDEF01\"").unwrap();
        assert_eq!(site.as_str(), "ABCDEF01");
        assert_eq!(serde_json::to_string(&site).unwrap(), "\"ABCDEF01\"");
        assert!(serde_json::from_str::<SiteId>("\"\"").is_err());
    }
}
