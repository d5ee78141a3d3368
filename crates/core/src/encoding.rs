//! Hex string encoding used by every byte-oriented type on the wire.
//!
//! The canonical block form is JSON, so hashes, addresses, keys and
//! signatures travel as lowercase hex strings rather than number arrays.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

/// Serialize a byte slice as a lowercase hex string.
///
/// Usable as `#[serde(with = "forgechain_core::encoding")]` on `Vec<u8>` fields.
pub fn serialize<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: AsRef<[u8]> + ?Sized,
{
    serializer.serialize_str(&hex::encode(bytes.as_ref()))
}

/// Deserialize a hex string (with or without `0x`) into a byte vector.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    decode(&s).map_err(D::Error::custom)
}

/// Decode a hex string, tolerating a `0x` prefix.
pub fn decode(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
}

/// Decode a hex string into a fixed-width array.
pub fn decode_array<const N: usize>(s: &str) -> Result<[u8; N], hex::FromHexError> {
    let bytes = decode(s)?;
    if bytes.len() != N {
        return Err(hex::FromHexError::InvalidStringLength);
    }
    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

/// Deserialize a hex string into a fixed-width array.
pub(crate) fn deserialize_array<'de, D, const N: usize>(
    deserializer: D,
) -> Result<[u8; N], D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    decode_array::<N>(&s).map_err(D::Error::custom)
}
