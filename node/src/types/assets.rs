use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::error::TypeError;

/// Smallest denominations per whole LINK token.
pub const JUELS_PER_LINK: u128 = 1_000_000_000_000_000_000;

/// An amount of LINK, kept in juels. Serialized as a decimal string so large
/// amounts survive JSON consumers that only have doubles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Link(u128);

impl Link {
    pub const ZERO: Link = Link(0);

    pub const fn from_juels(juels: u128) -> Self {
        Link(juels)
    }

    pub const fn juels(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Link {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u128>().map(Link).map_err(|_| TypeError::InvalidLinkAmount(s.to_string()))
    }
}

impl Serialize for Link {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Link {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
