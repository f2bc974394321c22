use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A reference work whose citers are sought (an ADS bibcode)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeedIdentifier(String);

impl SeedIdentifier {
    /// Trim the raw value; blank seeds are rejected
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A work citing one or more seeds, in the same bibcode namespace
///
/// Equality and ordering use the case-folded key, so `2021b&b...2b` and
/// `2021B&B...2B` are the same work. Sets keep the first spelling inserted,
/// which is the one the source returned first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CitingWorkIdentifier {
    value: String,
    key: String,
}

impl CitingWorkIdentifier {
    /// Strip all whitespace; identifiers that end up empty are dropped
    pub fn parse(raw: &str) -> Option<Self> {
        let value: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if value.is_empty() {
            return None;
        }
        let key = value.to_ascii_uppercase();
        Some(Self { value, key })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Case-folded key used for deduplication and ordering
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for CitingWorkIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for CitingWorkIdentifier {}

impl PartialOrd for CitingWorkIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CitingWorkIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for CitingWorkIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl From<CitingWorkIdentifier> for String {
    fn from(id: CitingWorkIdentifier) -> Self {
        id.value
    }
}

impl TryFrom<String> for CitingWorkIdentifier {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| "empty identifier".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_parse() {
        assert_eq!(
            SeedIdentifier::parse("  2020A&A...1A \n").map(|s| s.as_str().to_string()),
            Some("2020A&A...1A".to_string())
        );
        assert!(SeedIdentifier::parse("   ").is_none());
    }

    #[test]
    fn test_citing_identifier_normalization() {
        let id = CitingWorkIdentifier::parse(" 2021B&B\t...2B ").unwrap();
        assert_eq!(id.as_str(), "2021B&B...2B");
        assert_eq!(id.key(), "2021B&B...2B");
        assert!(CitingWorkIdentifier::parse(" \t").is_none());
    }

    #[test]
    fn test_case_variants_are_equal() {
        let upper = CitingWorkIdentifier::parse("2022PhRvL.128G1101B").unwrap();
        let mixed = CitingWorkIdentifier::parse("2022PhRvL.128g1101B").unwrap();
        assert_eq!(upper, mixed);
    }
}
