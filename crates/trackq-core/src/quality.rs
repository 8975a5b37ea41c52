//! Audio quality tiers, ordered highest first.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested audio fidelity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Quality {
    #[default]
    HiResLossless,
    Lossless,
}

impl Quality {
    /// All tiers, highest first.
    pub const TIERS: [Quality; 2] = [Quality::HiResLossless, Quality::Lossless];

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::HiResLossless => "HI_RES_LOSSLESS",
            Quality::Lossless => "LOSSLESS",
        }
    }

    pub fn is_highest(self) -> bool {
        self == Self::TIERS[0]
    }

    /// The next-lower tier, if any.
    pub fn lower(self) -> Option<Quality> {
        let idx = Self::TIERS.iter().position(|q| *q == self)?;
        Self::TIERS.get(idx + 1).copied()
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "HI_RES_LOSSLESS" | "HI_RES" => Ok(Quality::HiResLossless),
            "LOSSLESS" => Ok(Quality::Lossless),
            other => Err(format!(
                "unknown quality '{}' (expected HI_RES_LOSSLESS or LOSSLESS)",
                other
            )),
        }
    }
}
