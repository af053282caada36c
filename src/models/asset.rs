use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The two asset classes the pricing pipeline knows how to quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Stock,
    Crypto,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Stock => "stock",
            AssetClass::Crypto => "crypto",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock" => Ok(AssetClass::Stock),
            "crypto" => Ok(AssetClass::Crypto),
            other => Err(anyhow::anyhow!("invalid asset class: {other}")),
        }
    }
}

/// Canonical form for tickers and symbols: trimmed, upper-case.
pub fn normalize_symbol(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Canonical form for ISO-4217-like currency codes.
pub fn normalize_currency_code(value: &str) -> String {
    value.trim().to_uppercase()
}
