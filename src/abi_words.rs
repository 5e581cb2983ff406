//! # ABI words
//! Manual decoding of flat contract return data: a sequence of 32-byte words addressed by index.
//! Only the words named in a layout are read, which lets callers leave wide fields such as a
//! 256-bit configuration bitmap completely untouched.
use ethers::types::{Address, U256};

use crate::error::MetricsError;

pub const WORD_SIZE: usize = 32;
const ADDRESS_OFFSET: usize = WORD_SIZE - 20;
const UINT128_OFFSET: usize = WORD_SIZE - 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Never read, only counted towards the required length.
    Skip,
    Uint128,
    /// Kept as a full `U256`; for single-value returns such as `totalSupply()`.
    Uint256,
    /// Low 20 bytes of the word.
    Address,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodedField {
    Skipped,
    Uint128(u128),
    Uint256(U256),
    Address(Address),
}

impl DecodedField {
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            DecodedField::Uint128(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            DecodedField::Address(address) => Some(*address),
            _ => None,
        }
    }
}

fn word(raw: &[u8], index: usize) -> &[u8] {
    &raw[index * WORD_SIZE..(index + 1) * WORD_SIZE]
}

fn decode_field(raw: &[u8], index: usize, kind: FieldKind) -> Result<DecodedField, MetricsError> {
    let word = word(raw, index);
    match kind {
        FieldKind::Skip => Ok(DecodedField::Skipped),
        FieldKind::Uint128 => {
            if word[..UINT128_OFFSET].iter().any(|byte| *byte != 0) {
                return Err(MetricsError::MalformedResponse(format!(
                    "word {} does not fit in 128 bits",
                    index
                )));
            }
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(&word[UINT128_OFFSET..]);
            Ok(DecodedField::Uint128(u128::from_be_bytes(bytes)))
        }
        FieldKind::Uint256 => Ok(DecodedField::Uint256(U256::from_big_endian(word))),
        FieldKind::Address => Ok(DecodedField::Address(Address::from_slice(
            &word[ADDRESS_OFFSET..],
        ))),
    }
}

/// Decodes `layout` (word index, kind) from `raw`, returning fields in layout order.
pub fn decode_words(
    raw: &[u8],
    layout: &[(usize, FieldKind)],
) -> Result<Vec<DecodedField>, MetricsError> {
    let required_words = layout
        .iter()
        .map(|(index, _)| index + 1)
        .max()
        .unwrap_or(0);
    if raw.len() < required_words * WORD_SIZE {
        return Err(MetricsError::MalformedResponse(format!(
            "expected at least {} words ({} bytes), got {} bytes",
            required_words,
            required_words * WORD_SIZE,
            raw.len()
        )));
    }
    layout
        .iter()
        .map(|(index, kind)| decode_field(raw, *index, *kind))
        .collect()
}

/// Reads a single `uint256` return value.
pub fn decode_single_uint(raw: &[u8]) -> Result<U256, MetricsError> {
    match decode_words(raw, &[(0, FieldKind::Uint256)])?.as_slice() {
        [DecodedField::Uint256(value)] => Ok(*value),
        _ => Err(MetricsError::MalformedResponse(
            "expected a single uint256".to_string(),
        )),
    }
}
