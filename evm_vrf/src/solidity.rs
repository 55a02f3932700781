//! Encoding proofs for the verifier contract, and checking them the way it does.
//!
//! The contract can't afford scalar multiplications or modular inversions, so the prover
//! supplies them: `c·gamma` and `s·h` as witness points, the address of `c·pk + s·G`, and the
//! inverse of the `z` coordinate that projective addition of the two witnesses produces. The
//! contract only has to check these with `ecrecover` and a couple of `mulmod`s.
use crate::{
    curve::{CurveParams, SECP256K1},
    error::{Result, VrfError},
    evm::{Address, WORD_LENGTH, u64_to_word, u256_to_word, word_to_u256},
    key::ProofKeystore,
    point::AffinePoint,
    proof::{Proof, output_from_gamma, scalar_from_curve_points},
    seed::{
        PreSeedData, PreSeedDataV2, PreSeedDataV2Plus, RequestCommitmentV2,
        RequestCommitmentV2Plus, RequestSeed, Seed,
    },
};
use num_bigint::BigUint;
use tracing::debug;

/// Length of a proof encoded by [`SolidityProof::marshal`].
pub const PROOF_LENGTH: usize = 64 // public key
    + 64 // gamma
    + 32 // c
    + 32 // s
    + 32 // seed
    + 32 // u witness, left padded
    + 64 // c·gamma witness
    + 64 // s·hash witness
    + 32; // zInv

/// Length of a response encoded by [`ProofResponse::marshal_for_vrf_coordinator`].
pub const ON_CHAIN_RESPONSE_LENGTH: usize = PROOF_LENGTH + WORD_LENGTH;

/// A proof together with everything the contract needs to check it cheaply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolidityProof {
    /// The proof being encoded.
    pub proof: Proof,
    /// Address of `c·pk + s·G`.
    pub u_witness: Address,
    /// `c·gamma`.
    pub c_gamma_witness: AffinePoint,
    /// `s·hash_to_curve(pk, seed)`.
    pub s_hash_witness: AffinePoint,
    /// Inverse of the `z` from projectively adding the two witnesses.
    pub z_inv: BigUint,
}

impl SolidityProof {
    /// Computes the witnesses for `proof` on secp256k1.
    pub fn precalculate(proof: &Proof) -> Result<Self> {
        Self::precalculate_with(proof, &SECP256K1)
    }

    /// Like [`precalculate`](Self::precalculate) on any curve.
    pub fn precalculate_with(proof: &Proof, curve: &CurveParams) -> Result<Self> {
        curve.ensure_on_curve(&proof.public_key)?;
        curve.ensure_on_curve(&proof.gamma)?;
        let u = curve
            .sum_of_products(&proof.c, &proof.public_key, &proof.s, &curve.generator)
            .ok_or(VrfError::Arithmetic("c·pk + s·G is the point at infinity"))?;
        let c_gamma_witness = curve
            .scalar_mul(&proof.gamma, &proof.c)
            .ok_or(VrfError::Arithmetic("c·gamma is the point at infinity"))?;
        let h = curve.hash_to_curve(&proof.public_key, &proof.seed)?;
        let s_hash_witness = curve
            .scalar_mul(&h, &proof.s)
            .ok_or(VrfError::Arithmetic("s·h is the point at infinity"))?;
        let z = curve.projective_add(&c_gamma_witness, &s_hash_witness).z;
        Ok(Self {
            proof: proof.clone(),
            u_witness: u.ethereum_address()?,
            c_gamma_witness,
            s_hash_witness,
            z_inv: curve.field.inv(&z)?,
        })
    }

    /// The [`PROOF_LENGTH`] byte encoding the contract's `randomValueFromVRFProof` decodes.
    pub fn marshal(&self) -> Result<[u8; PROOF_LENGTH]> {
        let proof = &self.proof;
        let mut out = Vec::with_capacity(PROOF_LENGTH);
        out.extend_from_slice(&proof.public_key.long_marshal()?);
        out.extend_from_slice(&proof.gamma.long_marshal()?);
        out.extend_from_slice(&u256_to_word(&proof.c)?);
        out.extend_from_slice(&u256_to_word(&proof.s)?);
        out.extend_from_slice(&u256_to_word(&proof.seed)?);
        out.extend_from_slice(&self.u_witness.to_word());
        out.extend_from_slice(&self.c_gamma_witness.long_marshal()?);
        out.extend_from_slice(&self.s_hash_witness.long_marshal()?);
        out.extend_from_slice(&u256_to_word(&self.z_inv)?);
        out.try_into().map_err(|out: Vec<u8>| VrfError::MalformedProof {
            expected: PROOF_LENGTH,
            actual: out.len(),
        })
    }
}

/// Checks the length of a byte encoding.
fn expect_length(bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() != expected {
        return Err(VrfError::MalformedProof {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Recovers the proof from a [`SolidityProof::marshal`] encoding. The witnesses are dropped and
/// `output` is recomputed from `gamma`.
///
/// # Errors
///
/// [`VrfError::MalformedProof`] if `bytes` is not [`PROOF_LENGTH`] long and
/// [`VrfError::PointNotOnCurve`] if the public key or gamma is invalid.
pub fn unmarshal_solidity_proof(bytes: &[u8]) -> Result<Proof> {
    expect_length(bytes, PROOF_LENGTH)?;
    let curve = &*SECP256K1;
    let public_key = curve.long_unmarshal(&bytes[0..64])?;
    let gamma = curve.long_unmarshal(&bytes[64..128])?;
    Ok(Proof {
        public_key,
        output: output_from_gamma(&gamma)?,
        gamma,
        c: word_to_u256(&bytes[128..160]),
        s: word_to_u256(&bytes[160..192]),
        seed: word_to_u256(&bytes[192..224]),
    })
}

/// What the oracle sends the coordinator: a proof of the final seed, labelled with the request's
/// pre-seed and block number so the contract can rebuild the final seed itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofResponse {
    /// Proof of the final seed.
    pub proof: Proof,
    /// The request's pre-seed, which replaces the final seed on chain.
    pub pre_seed: Seed,
    /// Block the request was mined in.
    pub block_num: u64,
}

impl ProofResponse {
    /// The [`ON_CHAIN_RESPONSE_LENGTH`] byte encoding: the solidity proof with its seed replaced
    /// by the pre-seed, followed by the block number as a word.
    ///
    /// The witnesses are computed from the proof's real seed before it is replaced.
    pub fn marshal_for_vrf_coordinator(&self) -> Result<[u8; ON_CHAIN_RESPONSE_LENGTH]> {
        let mut solidity_proof = SolidityProof::precalculate(&self.proof)?;
        solidity_proof.proof.seed = self.pre_seed.big();
        let mut out = [0u8; ON_CHAIN_RESPONSE_LENGTH];
        out[..PROOF_LENGTH].copy_from_slice(&solidity_proof.marshal()?);
        out[PROOF_LENGTH..].copy_from_slice(&u64_to_word(self.block_num));
        Ok(out)
    }

    /// The proof of the final seed for `request`, checked.
    ///
    /// # Errors
    ///
    /// [`VrfError::ProofRejected`] if the proof does not verify for that final seed.
    pub fn crypto_proof(&self, request: &impl RequestSeed) -> Result<Proof> {
        let mut proof = self.proof.clone();
        proof.seed = request.final_seed();
        if !proof.verify()? {
            return Err(VrfError::ProofRejected("proof does not verify for the final seed"));
        }
        Ok(proof)
    }
}

/// Inverse of [`ProofResponse::marshal_for_vrf_coordinator`]. The returned proof's seed is the
/// pre-seed.
pub fn unmarshal_proof_response(bytes: &[u8]) -> Result<ProofResponse> {
    expect_length(bytes, ON_CHAIN_RESPONSE_LENGTH)?;
    let proof = unmarshal_solidity_proof(&bytes[..PROOF_LENGTH])?;
    let block_num = u64::try_from(&word_to_u256(&bytes[PROOF_LENGTH..]))
        .map_err(|_| VrfError::MalformedField("block number does not fit in 64 bits"))?;
    Ok(ProofResponse {
        pre_seed: Seed::from_big(&proof.seed)?,
        proof,
        block_num,
    })
}

/// Proves `request` with a key from `keystore` and packages it for the original coordinator.
pub fn generate_proof_response(
    keystore: &impl ProofKeystore,
    id: &str,
    request: &PreSeedData,
) -> Result<ProofResponse> {
    let proof = keystore.generate_proof(id, &request.final_seed())?;
    Ok(ProofResponse {
        proof,
        pre_seed: request.pre_seed,
        block_num: request.block_num,
    })
}

fn substitute_pre_seed(proof: &Proof, request: &impl RequestSeed) -> Result<SolidityProof> {
    if proof.seed != request.final_seed() {
        return Err(VrfError::InvalidSeed);
    }
    let mut solidity_proof = SolidityProof::precalculate(proof)?;
    solidity_proof.proof.seed = request.pre_seed().big();
    Ok(solidity_proof)
}

/// Packages a proof of `request`'s final seed for the V2 coordinator, which takes the proof and
/// the request commitment as separate arguments.
///
/// # Errors
///
/// [`VrfError::InvalidSeed`] if `proof` is not for the request's final seed.
pub fn proof_response_v2(
    proof: &Proof,
    request: &PreSeedDataV2,
) -> Result<(SolidityProof, RequestCommitmentV2)> {
    Ok((substitute_pre_seed(proof, request)?, request.commitment()))
}

/// [`proof_response_v2`] for the V2Plus coordinator.
pub fn proof_response_v2plus(
    proof: &Proof,
    request: &PreSeedDataV2Plus,
) -> Result<(SolidityProof, RequestCommitmentV2Plus)> {
    Ok((substitute_pre_seed(proof, request)?, request.commitment()))
}

/// Runs the contract's `randomValueFromVRFProof` on a [`PROOF_LENGTH`] byte proof and returns
/// the random output.
///
/// Every check the contract makes is made here in the same order, and a failing check is
/// reported as [`VrfError::ProofRejected`] carrying the contract's revert reason.
pub fn verify_marshaled_proof(bytes: &[u8]) -> Result<BigUint> {
    if bytes.len() != PROOF_LENGTH {
        return Err(VrfError::ProofRejected("wrong proof length"));
    }
    let curve = &*SECP256K1;
    let word = |i: usize| &bytes[i * WORD_LENGTH..(i + 1) * WORD_LENGTH];
    let point = |i: usize| AffinePoint::from_words(&bytes[i * WORD_LENGTH..(i + 2) * WORD_LENGTH]);

    let public_key = point(0)?;
    let gamma = point(2)?;
    let c = word_to_u256(word(4));
    let s = word_to_u256(word(5));
    let seed = word_to_u256(word(6));
    let u_witness = Address::from_word(word(7))?;
    let c_gamma_witness = point(8)?;
    let s_hash_witness = point(10)?;
    let z_inv = word_to_u256(word(12));

    require_on_curve(curve, &public_key, "public key is not on curve")?;
    require_on_curve(curve, &gamma, "gamma is not on curve")?;
    require_on_curve(curve, &c_gamma_witness, "cGammaWitness is not on curve")?;
    require_on_curve(curve, &s_hash_witness, "sHashWitness is not on curve")?;
    if !curve.verify_linear_combination_with_generator(&c, &public_key, &s, &u_witness)? {
        return Err(VrfError::ProofRejected("addr(c*pk+s*g)!=_uWitness"));
    }
    let hash = curve.hash_to_curve(&public_key, &seed)?;
    let v = curve.linear_combination(
        &c,
        &gamma,
        &c_gamma_witness,
        &s,
        &hash,
        &s_hash_witness,
        &z_inv,
    )?;
    let derived_c = scalar_from_curve_points(&hash, &public_key, &gamma, &u_witness, &v)?;
    if derived_c != c {
        debug!("marshaled proof has the wrong challenge");
        return Err(VrfError::ProofRejected("invalid proof"));
    }
    output_from_gamma(&gamma)
}

fn require_on_curve(curve: &CurveParams, point: &AffinePoint, reason: &'static str) -> Result<()> {
    if !curve.field.contains(&point.x) {
        return Err(VrfError::ProofRejected("invalid x-ordinate"));
    }
    if !curve.field.contains(&point.y) {
        return Err(VrfError::ProofRejected("invalid y-ordinate"));
    }
    if !curve.is_on_curve(point) {
        return Err(VrfError::ProofRejected(reason));
    }
    Ok(())
}
