//! How values are laid out for the EVM: 32-byte big-endian words, keccak256 and 20-byte
//! addresses.
use crate::error::{Result, VrfError};
use core::{fmt, str::FromStr};
use num_bigint::BigUint;
use sha3::{Digest, Keccak256};

/// Length of an EVM word.
pub const WORD_LENGTH: usize = 32;

/// Domain separator for [`hash_to_curve`](crate::CurveParams::hash_to_curve).
pub const HASH_TO_CURVE_HASH_PREFIX: u8 = 1;
/// Domain separator for the challenge hash.
pub const SCALAR_FROM_CURVE_POINTS_HASH_PREFIX: u8 = 2;
/// Domain separator for the random output.
pub const VRF_RANDOM_OUTPUT_HASH_PREFIX: u8 = 3;

/// keccak256 of `data`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// keccak256 of the concatenation of `parts`, i.e. `keccak256(abi.encodePacked(...))`.
pub fn keccak256_packed(parts: &[&[u8]]) -> [u8; 32] {
    parts
        .iter()
        .fold(Keccak256::new(), |hash, part| hash.chain_update(part))
        .finalize()
        .into()
}

/// The value as a `uint256` word.
///
/// # Errors
///
/// Returns [`VrfError::Arithmetic`] if it needs more than 256 bits.
pub fn u256_to_word(value: &BigUint) -> Result<[u8; 32]> {
    let bytes = value.to_bytes_be();
    if bytes.len() > WORD_LENGTH {
        return Err(VrfError::Arithmetic("value does not fit in 256 bits"));
    }
    let mut word = [0u8; 32];
    word[WORD_LENGTH - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

/// The `uint256` value of a big-endian word.
pub fn word_to_u256(word: &[u8]) -> BigUint {
    BigUint::from_bytes_be(word)
}

/// A small integer as a `uint256` word.
pub fn u64_to_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Domain separators are hashed as full words.
pub(crate) fn prefix_word(prefix: u8) -> [u8; 32] {
    u64_to_word(prefix.into())
}

/// The `uint256` value of a 32-byte hash.
pub fn keccak256_u256(parts: &[&[u8]]) -> BigUint {
    word_to_u256(&keccak256_packed(parts))
}

/// A 20-byte account address.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address, which `ecrecover` returns on failure.
    pub const ZERO: Address = Address([0u8; 20]);

    /// The address whose public key hashes to `hash`, i.e. its low 20 bytes.
    pub fn from_hash(hash: &[u8; 32]) -> Self {
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..]);
        Address(address)
    }

    /// Decodes an address left-padded to a word, as `abi.decode` does.
    pub fn from_word(word: &[u8]) -> Result<Self> {
        if word.len() != WORD_LENGTH {
            return Err(VrfError::MalformedField("address word must be 32 bytes"));
        }
        if word[..12].iter().any(|byte| *byte != 0) {
            return Err(VrfError::MalformedField("address has dirty high bytes"));
        }
        let mut address = [0u8; 20];
        address.copy_from_slice(&word[12..]);
        Ok(Address(address))
    }

    /// The address left-padded to a word.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    /// Whether this is [`Address::ZERO`].
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = VrfError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut address = [0u8; 20];
        hex::decode_to_slice(s, &mut address)
            .map_err(|_| VrfError::MalformedField("address must be 20 hex encoded bytes"))?;
        Ok(Address(address))
    }
}

/// Strips an optional `0x` and decodes exactly 32 bytes of hex.
pub fn parse_word_hex(s: &str) -> Result<[u8; 32]> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let mut word = [0u8; 32];
    hex::decode_to_slice(s, &mut word)
        .map_err(|_| VrfError::MalformedField("expected 32 hex encoded bytes"))?;
    Ok(word)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn keccak_of_nothing() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_eq!(keccak256_packed(&[]), keccak256(b""));
        assert_eq!(keccak256_packed(&[b"ab", b"", b"c"]), keccak256(b"abc"));
    }

    #[test]
    fn words() {
        let word = u256_to_word(&BigUint::from(0x1234u32)).unwrap();
        assert_eq!(&word[30..], &[0x12, 0x34]);
        assert!(word[..30].iter().all(|b| *b == 0));
        assert_eq!(word_to_u256(&word), BigUint::from(0x1234u32));
        assert_eq!(u64_to_word(0x1234), word);

        let too_big = BigUint::from(1u8) << 256;
        assert!(u256_to_word(&too_big).is_err());
        let max = too_big - 1u8;
        assert_eq!(u256_to_word(&max).unwrap(), [0xff; 32]);
    }

    #[test]
    fn address_parsing() {
        let address: Address = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
            .parse()
            .unwrap();
        assert_eq!(
            address.to_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
        assert_eq!(Address::from_word(&address.to_word()), Ok(address));
        assert!("0x1234".parse::<Address>().is_err());
        let mut dirty = address.to_word();
        dirty[0] = 1;
        assert!(Address::from_word(&dirty).is_err());
    }
}
