//! Snowflake identifiers.
//!
//! Message ids are decimal strings that can exceed `u64`, so they are parsed into a
//! `BigUint` and compared as integers.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;

/// A non-negative decimal identifier of arbitrary length.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Snowflake(BigUint);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseSnowflakeError;

impl fmt::Display for ParseSnowflakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("not a decimal snowflake")
    }
}

impl std::error::Error for ParseSnowflakeError {}

impl Snowflake {
    /// Parse an id, tolerating surrounding whitespace and a leading `+`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
        // BigUint alone would also take `_` separators
        if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        BigUint::parse_bytes(unsigned.as_bytes(), 10).map(Self)
    }
}

impl FromStr for Snowflake {
    type Err = ParseSnowflakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(ParseSnowflakeError)
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
