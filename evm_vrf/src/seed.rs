//! Seeds and the request data they are derived from.
//!
//! A consumer's request fixes a pre-seed. Once the request is mined the oracle mixes in the hash
//! of the block it landed in, giving the final seed that is actually proven. The contract does
//! the same mixing from the block hash it observes, which is why on-chain responses carry the
//! pre-seed and not the final seed.
use crate::{
    curve::SECP256K1,
    error::{Result, VrfError},
    evm::{Address, keccak256, keccak256_u256, u64_to_word, u256_to_word},
    key::KeyHash,
};
use core::fmt;
use num_bigint::BigUint;

/// A 32-byte seed whose value is less than the secp256k1 field modulus.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Seed([u8; 32]);

impl Seed {
    /// # Errors
    ///
    /// [`VrfError::InvalidSeed`] if `value` is not less than the field modulus.
    pub fn from_big(value: &BigUint) -> Result<Self> {
        if !SECP256K1.field.contains(value) {
            return Err(VrfError::InvalidSeed);
        }
        Ok(Seed(u256_to_word(value)?))
    }

    /// Reads up to 32 big-endian bytes, left padding with zeros.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > 32 {
            return Err(VrfError::InvalidSeed);
        }
        Self::from_big(&BigUint::from_bytes_be(bytes))
    }

    /// The seed as a `uint256`.
    pub fn big(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// The seed as a big-endian word.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed(0x{})", hex::encode(self.0))
    }
}

/// `keccak256(pre_seed ‖ block_hash)` as a `uint256`. Not reduced, to match the contract.
pub fn final_seed(pre_seed: &Seed, block_hash: &[u8; 32]) -> BigUint {
    keccak256_u256(&[pre_seed.as_bytes(), block_hash])
}

/// The parts of a request that determine its final seed.
///
/// Each coordinator version carries extra commitment fields but they all derive the final seed
/// the same way.
pub trait RequestSeed {
    /// The seed fixed when the request was made.
    fn pre_seed(&self) -> &Seed;
    /// Hash of the block the request was mined in.
    fn block_hash(&self) -> &[u8; 32];
    /// Number of the block the request was mined in.
    fn block_num(&self) -> u64;

    /// The seed that gets proven.
    fn final_seed(&self) -> BigUint {
        final_seed(self.pre_seed(), self.block_hash())
    }
}

/// A request to the original coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PreSeedData {
    /// Seed the coordinator assigned when the request was made.
    pub pre_seed: Seed,
    /// Hash of the block the request was mined in.
    pub block_hash: [u8; 32],
    /// Number of that block.
    pub block_num: u64,
}

/// A request to the V2 coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PreSeedDataV2 {
    /// Seed the coordinator assigned when the request was made.
    pub pre_seed: Seed,
    /// Hash of the block the request was mined in.
    pub block_hash: [u8; 32],
    /// Number of that block.
    pub block_num: u64,
    /// Subscription paying for the request.
    pub sub_id: u64,
    /// Gas the coordinator gives the consumer's callback.
    pub callback_gas_limit: u32,
    /// How many random words the consumer asked for.
    pub num_words: u32,
    /// The consumer contract.
    pub sender: Address,
}

/// A request to the V2Plus coordinator, which widened subscription ids to 256 bits and added
/// `extra_args`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PreSeedDataV2Plus {
    /// Seed the coordinator assigned when the request was made.
    pub pre_seed: Seed,
    /// Hash of the block the request was mined in.
    pub block_hash: [u8; 32],
    /// Number of that block.
    pub block_num: u64,
    /// Subscription paying for the request.
    pub sub_id: BigUint,
    /// Gas the coordinator gives the consumer's callback.
    pub callback_gas_limit: u32,
    /// How many random words the consumer asked for.
    pub num_words: u32,
    /// The consumer contract.
    pub sender: Address,
    /// Encoded `ExtraArgsV1`, see [`extra_args_v1`].
    pub extra_args: Vec<u8>,
}

macro_rules! impl_request_seed {
    ($($ty:ty),*) => {$(
        impl RequestSeed for $ty {
            fn pre_seed(&self) -> &Seed {
                &self.pre_seed
            }

            fn block_hash(&self) -> &[u8; 32] {
                &self.block_hash
            }

            fn block_num(&self) -> u64 {
                self.block_num
            }
        }
    )*};
}

impl_request_seed!(PreSeedData, PreSeedDataV2, PreSeedDataV2Plus);

/// What the V2 coordinator stores for a pending request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestCommitmentV2 {
    /// Block the request was made in.
    pub block_num: u64,
    /// Subscription paying for the request.
    pub sub_id: u64,
    /// Gas the coordinator gives the consumer's callback.
    pub callback_gas_limit: u32,
    /// How many random words the consumer asked for.
    pub num_words: u32,
    /// The consumer contract.
    pub sender: Address,
}

/// What the V2Plus coordinator stores for a pending request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestCommitmentV2Plus {
    /// Block the request was made in.
    pub block_num: u64,
    /// Subscription paying for the request.
    pub sub_id: BigUint,
    /// Gas the coordinator gives the consumer's callback.
    pub callback_gas_limit: u32,
    /// How many random words the consumer asked for.
    pub num_words: u32,
    /// The consumer contract.
    pub sender: Address,
    /// Encoded `ExtraArgsV1`, see [`extra_args_v1`].
    pub extra_args: Vec<u8>,
}

impl PreSeedDataV2 {
    /// The fields the coordinator committed to.
    pub fn commitment(&self) -> RequestCommitmentV2 {
        RequestCommitmentV2 {
            block_num: self.block_num,
            sub_id: self.sub_id,
            callback_gas_limit: self.callback_gas_limit,
            num_words: self.num_words,
            sender: self.sender,
        }
    }
}

impl PreSeedDataV2Plus {
    /// The fields the coordinator committed to.
    pub fn commitment(&self) -> RequestCommitmentV2Plus {
        RequestCommitmentV2Plus {
            block_num: self.block_num,
            sub_id: self.sub_id.clone(),
            callback_gas_limit: self.callback_gas_limit,
            num_words: self.num_words,
            sender: self.sender,
            extra_args: self.extra_args.clone(),
        }
    }
}

impl RequestCommitmentV2 {
    /// `keccak256(abi.encode(requestId, blockNum, subId, callbackGasLimit, numWords, sender))`.
    pub fn hash(&self, request_id: &BigUint) -> Result<[u8; 32]> {
        Ok(keccak256(
            &[
                u256_to_word(request_id)?,
                u64_to_word(self.block_num),
                u64_to_word(self.sub_id),
                u64_to_word(self.callback_gas_limit.into()),
                u64_to_word(self.num_words.into()),
                self.sender.to_word(),
            ]
            .concat(),
        ))
    }
}

impl RequestCommitmentV2Plus {
    /// Like [`RequestCommitmentV2::hash`] with `extraArgs` appended as dynamic `bytes`.
    pub fn hash(&self, request_id: &BigUint) -> Result<[u8; 32]> {
        const HEAD_WORDS: u64 = 7;
        let mut encoded = [
            u256_to_word(request_id)?,
            u64_to_word(self.block_num),
            u256_to_word(&self.sub_id)?,
            u64_to_word(self.callback_gas_limit.into()),
            u64_to_word(self.num_words.into()),
            self.sender.to_word(),
            u64_to_word(HEAD_WORDS * 32),
            u64_to_word(self.extra_args.len() as u64),
        ]
        .concat();
        encoded.extend_from_slice(&self.extra_args);
        encoded.resize(encoded.len().next_multiple_of(32), 0);
        Ok(keccak256(&encoded))
    }
}

/// `keccak256(abi.encode(keyHash, sender, subId, nonce))`, the pre-seed the V2 coordinator
/// assigns to a request.
pub fn pre_seed_v2(key_hash: &KeyHash, sender: &Address, sub_id: u64, nonce: u64) -> BigUint {
    keccak256_u256(&[
        &key_hash.0,
        &sender.to_word(),
        &u64_to_word(sub_id),
        &u64_to_word(nonce),
    ])
}

/// [`pre_seed_v2`] with a 256-bit subscription id.
pub fn pre_seed_v2plus(
    key_hash: &KeyHash,
    sender: &Address,
    sub_id: &BigUint,
    nonce: u64,
) -> Result<BigUint> {
    Ok(keccak256_u256(&[
        &key_hash.0,
        &sender.to_word(),
        &u256_to_word(sub_id)?,
        &u64_to_word(nonce),
    ]))
}

/// `keccak256(abi.encode(keyHash, preSeed))`.
pub fn request_id(key_hash: &KeyHash, pre_seed: &BigUint) -> Result<BigUint> {
    Ok(keccak256_u256(&[&key_hash.0, &u256_to_word(pre_seed)?]))
}

/// `bytes4(keccak256("VRF ExtraArgsV1"))`.
pub const EXTRA_ARGS_V1_TAG: [u8; 4] = [0x92, 0xfd, 0x13, 0x38];

/// The `extraArgs` a V2Plus consumer passes to choose how it pays.
pub fn extra_args_v1(native_payment: bool) -> Vec<u8> {
    let mut args = EXTRA_ARGS_V1_TAG.to_vec();
    args.extend_from_slice(&u64_to_word(native_payment.into()));
    args
}
