use crate::{Result, TypesError};
use alloy_primitives::Address;

/// Parse an address string without enforcing EIP-55 checksum casing.
///
/// Addresses reach us from the chain, from the bundler and from off-chain
/// records, and the casing differs between those sources. Casing never
/// carries meaning here, so mixed-case input is folded before decoding.
pub fn parse_address_lenient(s: &str) -> Result<Address> {
    let trimmed = s.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex_part.len() != 40 {
        return Err(TypesError::InvalidLength {
            expected: 40,
            actual: hex_part.len(),
        });
    }

    let bytes = hex::decode(hex_part.to_ascii_lowercase())
        .map_err(|_| TypesError::InvalidHex(s.to_string()))?;

    Ok(Address::from_slice(&bytes))
}

/// Membership check of a raw address string against a decoded address set.
pub fn contains_address(set: &[Address], candidate: &str) -> bool {
    parse_address_lenient(candidate)
        .map(|addr| set.contains(&addr))
        .unwrap_or(false)
}
