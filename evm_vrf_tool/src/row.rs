//! One CSV row per generated proof.
//!
//! Ethereum identifiers (key hash, sender, block hash) are `0x` prefixed. Points and scalars of
//! the proof are bare lowercase hex. Everything else is decimal.
use anyhow::{Context, Result, ensure};
use evm_vrf::{
    AffinePoint, PreSeedDataV2, Proof, RequestSeed,
    evm::{parse_word_hex, u256_to_word},
    key::KeyHash,
    num_bigint::BigUint,
};
use serde::{Deserialize, Serialize};

/// The CSV header, in column order.
pub const HEADER: [&str; 16] = [
    "keyHashHex",
    "senderAddrHex",
    "subID",
    "nonce",
    "preSeed",
    "blockhash",
    "blocknum",
    "cbGasLimit",
    "numWords",
    "finalSeed",
    "proofPubKey",
    "proofGamma",
    "proofC",
    "proofS",
    "proofSeed",
    "randomNumber",
];

/// A proof and the V2 request it answers, with columns named as in [`HEADER`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRow {
    #[serde(rename = "keyHashHex")]
    pub key_hash: String,
    #[serde(rename = "senderAddrHex")]
    pub sender: String,
    #[serde(rename = "subID")]
    pub sub_id: u64,
    pub nonce: u64,
    #[serde(rename = "preSeed")]
    pub pre_seed: String,
    #[serde(rename = "blockhash")]
    pub block_hash: String,
    #[serde(rename = "blocknum")]
    pub block_num: u64,
    #[serde(rename = "cbGasLimit")]
    pub cb_gas_limit: u32,
    #[serde(rename = "numWords")]
    pub num_words: u32,
    #[serde(rename = "finalSeed")]
    pub final_seed: String,
    #[serde(rename = "proofPubKey")]
    pub proof_pub_key: String,
    #[serde(rename = "proofGamma")]
    pub proof_gamma: String,
    #[serde(rename = "proofC")]
    pub proof_c: String,
    #[serde(rename = "proofS")]
    pub proof_s: String,
    #[serde(rename = "proofSeed")]
    pub proof_seed: String,
    #[serde(rename = "randomNumber")]
    pub random_number: String,
}

impl ProofRow {
    /// Encodes `proof`, which must be for `request`'s final seed.
    pub fn new(
        key_hash: &KeyHash,
        nonce: u64,
        request: &PreSeedDataV2,
        proof: &Proof,
    ) -> Result<Self> {
        Ok(Self {
            key_hash: key_hash.to_string(),
            sender: request.sender.to_string(),
            sub_id: request.sub_id,
            nonce,
            pre_seed: request.pre_seed.big().to_string(),
            block_hash: format!("0x{}", hex::encode(request.block_hash)),
            block_num: request.block_num,
            cb_gas_limit: request.callback_gas_limit,
            num_words: request.num_words,
            final_seed: request.final_seed().to_string(),
            proof_pub_key: hex::encode(proof.public_key.long_marshal()?),
            proof_gamma: hex::encode(proof.gamma.long_marshal()?),
            proof_c: hex::encode(u256_to_word(&proof.c)?),
            proof_s: hex::encode(u256_to_word(&proof.s)?),
            proof_seed: hex::encode(u256_to_word(&proof.seed)?),
            random_number: proof.output.to_string(),
        })
    }

    /// Rebuilds the proof from its columns. Points are not validated here; that is
    /// [`Proof::verify`]'s job.
    pub fn to_proof(&self) -> Result<Proof> {
        let proof = Proof {
            public_key: parse_point(&self.proof_pub_key).context("proofPubKey")?,
            gamma: parse_point(&self.proof_gamma).context("proofGamma")?,
            c: parse_scalar(&self.proof_c).context("proofC")?,
            s: parse_scalar(&self.proof_s).context("proofS")?,
            seed: parse_scalar(&self.proof_seed).context("proofSeed")?,
            output: self.random_number.parse().context("randomNumber")?,
        };
        let final_seed: BigUint = self.final_seed.parse().context("finalSeed")?;
        ensure!(
            proof.seed == final_seed,
            "proofSeed does not match finalSeed for nonce {}",
            self.nonce
        );
        Ok(proof)
    }
}

fn parse_point(s: &str) -> Result<AffinePoint> {
    let bytes = hex::decode(s)?;
    Ok(AffinePoint::from_words(&bytes)?)
}

fn parse_scalar(s: &str) -> Result<BigUint> {
    Ok(BigUint::from_bytes_be(&parse_word_hex(s)?))
}
