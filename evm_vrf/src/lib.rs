//! Verifiable random function proofs over secp256k1 that an EVM contract can check.
//!
//! A key holder proves a seed with [`SecretKey::generate_proof`], producing a [`Proof`] whose
//! [`output`](Proof::output) is the random value. Anyone can check it off-chain with
//! [`Proof::verify`], and [`SolidityProof`] encodes it, together with the witnesses the contract
//! needs, in the layout the verifier contract decodes.
//!
//! Every hash, encoding and field operation matches the contract byte for byte, so a proof that
//! passes [`verify_marshaled_proof`] here will pass on chain.
//!
//! ```
//! use evm_vrf::{SecretKey, SolidityProof, num_bigint::BigUint, verify_marshaled_proof};
//!
//! let key = SecretKey::random(&mut rand::thread_rng());
//! let proof = key.generate_proof(&BigUint::from(42u8))?;
//! assert!(proof.verify()?);
//!
//! let bytes = SolidityProof::precalculate(&proof)?.marshal()?;
//! assert_eq!(verify_marshaled_proof(&bytes)?, proof.output);
//! # Ok::<(), evm_vrf::VrfError>(())
//! ```
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod curve;
pub mod error;
pub mod evm;
pub mod field;
pub mod hash_to_curve;
pub mod key;
pub mod point;
pub mod proof;
pub mod seed;
pub mod solidity;

pub use curve::{CurveParams, SECP256K1};
pub use error::{Result, VrfError};
pub use evm::Address;
pub use key::{InMemoryKeystore, KeyHash, ProofKeystore, PublicKey, SecretKey};
pub use num_bigint;
pub use point::{AffinePoint, ProjectivePoint};
pub use proof::Proof;
pub use seed::{PreSeedData, PreSeedDataV2, PreSeedDataV2Plus, RequestSeed, Seed};
pub use solidity::{
    ON_CHAIN_RESPONSE_LENGTH, PROOF_LENGTH, ProofResponse, SolidityProof, unmarshal_proof_response,
    unmarshal_solidity_proof, verify_marshaled_proof,
};
