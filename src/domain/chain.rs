//! Supported blockchains and their address families.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Bsc,
    Polygon,
    Arbitrum,
    Optimism,
    Base,
    Avalanche,
    Tron,
    Solana,
    Bitcoin,
}

/// Address encoding used by a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Evm,
    Tron,
    Solana,
    Bitcoin,
}

impl Chain {
    pub const ALL: [Chain; 10] = [
        Chain::Ethereum,
        Chain::Bsc,
        Chain::Polygon,
        Chain::Arbitrum,
        Chain::Optimism,
        Chain::Base,
        Chain::Avalanche,
        Chain::Tron,
        Chain::Solana,
        Chain::Bitcoin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Bsc => "bsc",
            Chain::Polygon => "polygon",
            Chain::Arbitrum => "arbitrum",
            Chain::Optimism => "optimism",
            Chain::Base => "base",
            Chain::Avalanche => "avalanche",
            Chain::Tron => "tron",
            Chain::Solana => "solana",
            Chain::Bitcoin => "bitcoin",
        }
    }

    /// Symbol of the chain's gas asset.
    pub fn native_asset(&self) -> &'static str {
        match self {
            Chain::Ethereum | Chain::Arbitrum | Chain::Optimism | Chain::Base => "ETH",
            Chain::Bsc => "BNB",
            Chain::Polygon => "MATIC",
            Chain::Avalanche => "AVAX",
            Chain::Tron => "TRX",
            Chain::Solana => "SOL",
            Chain::Bitcoin => "BTC",
        }
    }

    pub fn is_native(&self, asset: &str) -> bool {
        self.native_asset().eq_ignore_ascii_case(asset)
    }

    pub fn address_family(&self) -> AddressFamily {
        match self {
            Chain::Tron => AddressFamily::Tron,
            Chain::Solana => AddressFamily::Solana,
            Chain::Bitcoin => AddressFamily::Bitcoin,
            _ => AddressFamily::Evm,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownChain(pub String);

impl fmt::Display for UnknownChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported chain '{}'", self.0)
    }
}

impl std::error::Error for UnknownChain {}

impl FromStr for Chain {
    type Err = UnknownChain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ethereum" | "eth" | "erc20" => Ok(Chain::Ethereum),
            "bsc" | "bnb" | "bep20" | "binance-smart-chain" => Ok(Chain::Bsc),
            "polygon" | "matic" => Ok(Chain::Polygon),
            "arbitrum" | "arb" => Ok(Chain::Arbitrum),
            "optimism" | "op" => Ok(Chain::Optimism),
            "base" => Ok(Chain::Base),
            "avalanche" | "avax" | "avaxc" => Ok(Chain::Avalanche),
            "tron" | "trx" | "trc20" => Ok(Chain::Tron),
            "solana" | "sol" => Ok(Chain::Solana),
            "bitcoin" | "btc" => Ok(Chain::Bitcoin),
            other => Err(UnknownChain(other.to_string())),
        }
    }
}

/// Human-readable `ASSET/chain -> ASSET/chain` label used in error messages.
pub fn pair_label(from_asset: &str, from_chain: Chain, to_asset: &str, to_chain: Chain) -> String {
    format!(
        "{}/{} -> {}/{}",
        from_asset.to_ascii_uppercase(),
        from_chain,
        to_asset.to_ascii_uppercase(),
        to_chain
    )
}
