use bech32::{FromBase32, ToBase32, Variant};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Address translation errors. Never fatal to a whole run, only to the
/// check that needed the translation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressCodecError {
    #[error("invalid bech32 address {address}: {reason}")]
    InvalidBech32 { address: String, reason: String },

    #[error("invalid canonical address {address}: {reason}")]
    InvalidHex { address: String, reason: String },

    #[error("cannot encode {address} with prefix {prefix:?}: {reason}")]
    Encode {
        prefix: String,
        address: String,
        reason: String,
    },
}

/// Chain-independent form of an account or validator address: lowercase hex
/// of the raw address bytes. This is the key space every comparison uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CanonicalAddress(String);

impl CanonicalAddress {
    /// Parse user input such as `cosmos1...` into canonical form.
    pub fn parse_bech32(address: &str) -> Result<Self, AddressCodecError> {
        to_canonical(address).map(Self)
    }

    pub fn from_hex(raw: &str) -> Result<Self, AddressCodecError> {
        let lower = raw.trim().to_ascii_lowercase();
        let bytes = hex::decode(&lower).map_err(|e| AddressCodecError::InvalidHex {
            address: raw.to_string(),
            reason: e.to_string(),
        })?;
        if bytes.is_empty() {
            return Err(AddressCodecError::InvalidHex {
                address: raw.to_string(),
                reason: "empty address".to_string(),
            });
        }
        Ok(Self(lower))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encode for a chain whose human-readable prefix is `prefix`.
    pub fn to_native(&self, prefix: &str) -> Result<String, AddressCodecError> {
        to_native(prefix, &self.0)
    }
}

impl fmt::Display for CanonicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn to_native(prefix: &str, canonical: &str) -> Result<String, AddressCodecError> {
    let bytes = hex::decode(canonical).map_err(|e| AddressCodecError::InvalidHex {
        address: canonical.to_string(),
        reason: e.to_string(),
    })?;

    bech32::encode(prefix, bytes.to_base32(), Variant::Bech32).map_err(|e| {
        AddressCodecError::Encode {
            prefix: prefix.to_string(),
            address: canonical.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Decode a bech32 address with any prefix. The prefix is discarded.
pub fn to_canonical(native: &str) -> Result<String, AddressCodecError> {
    let invalid = |reason: String| AddressCodecError::InvalidBech32 {
        address: native.to_string(),
        reason,
    };

    let (_prefix, data, _variant) = bech32::decode(native).map_err(|e| invalid(e.to_string()))?;
    let bytes = Vec::<u8>::from_base32(&data).map_err(|e| invalid(e.to_string()))?;
    if bytes.is_empty() {
        return Err(invalid("empty payload".to_string()));
    }

    Ok(hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    // BIP-173 test vector
    const NATIVE: &str = "abcdef1qpzry9x8gf2tvdw0s3jn54khce6mua7lmqqqxw";
    const CANONICAL: &str = "00443214c74254b635cf84653a56d7c675be77df";

    #[test]
    fn test_to_canonical_known_vector() {
        assert_eq!(to_canonical(NATIVE).unwrap(), CANONICAL);
    }

    #[test]
    fn test_to_native_known_vector() {
        assert_eq!(to_native("abcdef", CANONICAL).unwrap(), NATIVE);
    }

    #[test]
    fn test_same_bytes_different_prefixes_share_canonical_form() {
        let cosmos = to_native("cosmos", CANONICAL).unwrap();
        let osmo = to_native("osmo", CANONICAL).unwrap();

        assert!(cosmos.starts_with("cosmos1"));
        assert!(osmo.starts_with("osmo1"));
        assert_ne!(cosmos, osmo);
        assert_eq!(to_canonical(&cosmos).unwrap(), to_canonical(&osmo).unwrap());
    }

    #[test]
    fn test_bad_checksum_is_an_error_not_a_panic() {
        let mut corrupted = NATIVE.to_string();
        corrupted.pop();
        corrupted.push('q');

        let err = to_canonical(&corrupted).unwrap_err();
        assert!(matches!(err, AddressCodecError::InvalidBech32 { .. }));
    }

    #[test]
    fn test_to_native_rejects_non_hex() {
        let err = to_native("cosmos", "not-hex").unwrap_err();
        assert!(matches!(err, AddressCodecError::InvalidHex { .. }));
    }

    #[test]
    fn test_to_native_rejects_empty_prefix() {
        let err = to_native("", CANONICAL).unwrap_err();
        assert!(matches!(err, AddressCodecError::Encode { .. }));
    }

    #[test]
    fn test_canonical_address_normalizes_case() {
        let addr = CanonicalAddress::from_hex(&CANONICAL.to_uppercase()).unwrap();
        assert_eq!(addr.as_str(), CANONICAL);
        assert!(CanonicalAddress::from_hex("").is_err());
        assert!(CanonicalAddress::from_hex("zz").is_err());
    }

    #[test]
    fn test_parse_bech32_round_trips_through_prefix() {
        let addr = CanonicalAddress::parse_bech32(NATIVE).unwrap();
        assert_eq!(addr.to_native("abcdef").unwrap(), NATIVE);
    }
}
