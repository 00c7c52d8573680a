use bigdecimal::BigDecimal;
use std::fmt;

use crate::domain::{AddressFamily, Chain};

pub const ASSET_SYMBOL_MAX_LEN: usize = 12;
pub const ADDRESS_MAX_LEN: usize = 128;
pub const DESCRIPTION_MAX_LEN: usize = 255;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }

    Ok(())
}

/// Parses a chain name or alias (`eth`, `trc20`, ...).
pub fn parse_chain(field: &'static str, value: &str) -> Result<Chain, ValidationError> {
    let value = sanitize_string(value);
    validate_required(field, &value)?;
    value
        .parse::<Chain>()
        .map_err(|e| ValidationError::new(field, e.to_string()))
}

/// Normalises an asset ticker to upper case and checks its shape.
pub fn normalize_asset(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let asset = sanitize_string(value);
    validate_required(field, &asset)?;
    validate_max_len(field, &asset, ASSET_SYMBOL_MAX_LEN)?;

    if !asset.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(ValidationError::new(
            field,
            "must contain only letters and digits",
        ));
    }

    Ok(asset.to_ascii_uppercase())
}

fn is_base58(value: &str) -> bool {
    value.chars().all(|ch| BASE58_ALPHABET.contains(ch))
}

/// Checks that `address` is well-formed for `chain`. Returns the trimmed address.
pub fn validate_address(
    field: &'static str,
    chain: Chain,
    address: &str,
) -> Result<String, ValidationError> {
    let address = address.trim().to_string();
    validate_required(field, &address)?;
    validate_max_len(field, &address, ADDRESS_MAX_LEN)?;

    let valid = match chain.address_family() {
        AddressFamily::Evm => {
            address.len() == 42
                && address.starts_with("0x")
                && address[2..].chars().all(|ch| ch.is_ascii_hexdigit())
        }
        AddressFamily::Tron => address.len() == 34 && address.starts_with('T') && is_base58(&address),
        AddressFamily::Solana => (32..=44).contains(&address.len()) && is_base58(&address),
        AddressFamily::Bitcoin => {
            if address.starts_with("bc1") {
                (42..=62).contains(&address.len())
                    && address
                        .chars()
                        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit())
            } else {
                (address.starts_with('1') || address.starts_with('3'))
                    && (26..=35).contains(&address.len())
                    && is_base58(&address)
            }
        }
    };

    if !valid {
        return Err(ValidationError::new(
            field,
            format!("is not a valid {} address", chain),
        ));
    }

    Ok(address)
}
