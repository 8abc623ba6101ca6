use chrono::{DateTime, Utc};

use crate::{error::Error, model::Chain};

const BASE58_ALPHABET: &str =
    "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Source of the current time. Freshness decisions read it through this seam
/// so they can be driven by a fixed clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Validates `address` for `chain` and returns its canonical form: EVM
/// addresses are lowercased, Solana addresses are kept verbatim.
pub fn normalize_address(address: &str, chain: Chain) -> Result<String, Error> {
    let address = address.trim();

    if chain.is_evm() {
        let hex = address
            .strip_prefix("0x")
            .or_else(|| address.strip_prefix("0X"))
            .ok_or_else(|| {
                Error::ValidationError(format!(
                    "address {} must start with 0x on {}",
                    address, chain
                ))
            })?;

        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::ValidationError(format!(
                "address {} is not a 20 byte hex address",
                address
            )));
        }

        return Ok(format!("0x{}", hex.to_lowercase()));
    }

    let valid = (32..=44).contains(&address.len())
        && address.chars().all(|c| BASE58_ALPHABET.contains(c));
    if !valid {
        return Err(Error::ValidationError(format!(
            "address {} is not a base58 account address",
            address
        )));
    }

    Ok(address.to_owned())
}

/// Case folding for addresses already known to be valid on `chain`. Base58
/// is case-sensitive, so only EVM addresses are lowercased.
pub fn canonical_address(address: &str, chain: Chain) -> String {
    if chain.is_evm() {
        address.trim().to_lowercase()
    } else {
        address.trim().to_owned()
    }
}

/// `0x1234...abcd`; strings too short to abbreviate are returned as-is.
pub fn short_address(address: &str) -> String {
    let chars = address.chars().collect::<Vec<_>>();
    if chars.len() <= 10 {
        return address.to_owned();
    }

    let head = chars[..6].iter().collect::<String>();
    let tail = chars[chars.len() - 4..].iter().collect::<String>();
    format!("{}...{}", head, tail)
}
