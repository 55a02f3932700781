//! Proof generation and off-chain verification.
//!
//! A proof shows that `gamma = sk·hash_to_curve(pk, seed)` for the secret key behind `pk`
//! without revealing it. It is a Chaum-Pedersen proof made non-interactive with keccak256,
//! except that the `u = k·G` commitment is hashed as an address rather than as a point so the
//! contract can check it with `ecrecover`.
use crate::{
    curve::{CurveParams, SECP256K1},
    error::{Result, VrfError},
    evm::{
        Address, SCALAR_FROM_CURVE_POINTS_HASH_PREFIX, VRF_RANDOM_OUTPUT_HASH_PREFIX,
        keccak256_u256, prefix_word, u256_to_word,
    },
    key::{SecretKey, affine_from_point, point_from_affine},
    point::AffinePoint,
};
use num_bigint::BigUint;
use secp256kfun::{G, Scalar, g, marker::*, s};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

const NONCE_TAG: &[u8] = b"evm-vrf/nonce";

/// How many nonces [`SecretKey::generate_proof`] tries before giving up.
const MAX_NONCE_ATTEMPTS: u32 = 32;

/// A VRF proof.
///
/// `c`, `s`, `seed` and `output` are `uint256` values.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Proof {
    /// The prover's public key.
    pub public_key: AffinePoint,
    /// `sk·hash_to_curve(public_key, seed)`.
    pub gamma: AffinePoint,
    /// The challenge.
    pub c: BigUint,
    /// The response, `k - c·sk mod n`.
    pub s: BigUint,
    /// The input.
    pub seed: BigUint,
    /// The random output derived from `gamma`.
    pub output: BigUint,
}

impl Proof {
    /// Checks the proof against secp256k1.
    ///
    /// Returns `Ok(false)` for a proof that is well formed but wrong. [`output`](Self::output)
    /// is not looked at.
    ///
    /// # Errors
    ///
    /// [`VrfError::PointNotOnCurve`] if `public_key` or `gamma` is invalid and
    /// [`VrfError::Arithmetic`] if a scalar does not fit in 256 bits.
    pub fn verify(&self) -> Result<bool> {
        self.verify_with(&SECP256K1)
    }

    /// Like [`verify`](Self::verify) on any curve.
    pub fn verify_with(&self, curve: &CurveParams) -> Result<bool> {
        curve.ensure_on_curve(&self.public_key)?;
        curve.ensure_on_curve(&self.gamma)?;
        for value in [&self.c, &self.s, &self.seed] {
            u256_to_word(value)?;
        }
        let h = curve.hash_to_curve(&self.public_key, &self.seed)?;

        let (Some(c_gamma), Some(s_hash)) = (
            curve.scalar_mul(&self.gamma, &self.c),
            curve.scalar_mul(&h, &self.s),
        ) else {
            debug!("c·gamma or s·h is infinity");
            return Ok(false);
        };
        if c_gamma.x == s_hash.x {
            debug!("c·gamma and s·h share an x coordinate");
            return Ok(false);
        }
        // add the way the contract does so that anything accepted here is accepted there
        let z_inv = curve.field.inv(&curve.projective_add(&c_gamma, &s_hash).z)?;
        let v = curve.affine_add(&c_gamma, &s_hash, &z_inv)?;

        let Some(u) = curve.sum_of_products(&self.c, &self.public_key, &self.s, &curve.generator)
        else {
            debug!("c·pk + s·G is infinity");
            return Ok(false);
        };

        let derived_c = scalar_from_curve_points(
            &h,
            &self.public_key,
            &self.gamma,
            &u.ethereum_address()?,
            &v,
        )?;
        let valid = derived_c == self.c;
        if !valid {
            debug!("challenge mismatch");
        }
        Ok(valid)
    }
}

/// The challenge: `keccak256(2 ‖ hash ‖ pk ‖ gamma ‖ v ‖ u_witness)` as a `uint256`.
///
/// It is deliberately not reduced modulo the group order because the contract compares the raw
/// hash.
pub fn scalar_from_curve_points(
    hash: &AffinePoint,
    public_key: &AffinePoint,
    gamma: &AffinePoint,
    u_witness: &Address,
    v: &AffinePoint,
) -> Result<BigUint> {
    Ok(keccak256_u256(&[
        &prefix_word(SCALAR_FROM_CURVE_POINTS_HASH_PREFIX),
        &hash.long_marshal()?,
        &public_key.long_marshal()?,
        &gamma.long_marshal()?,
        &v.long_marshal()?,
        &u_witness.0,
    ]))
}

/// The VRF output for `gamma`: `keccak256(3 ‖ gamma)` as a `uint256`.
pub fn output_from_gamma(gamma: &AffinePoint) -> Result<BigUint> {
    Ok(keccak256_u256(&[
        &prefix_word(VRF_RANDOM_OUTPUT_HASH_PREFIX),
        &gamma.long_marshal()?,
    ]))
}

impl SecretKey {
    /// Proves `seed`.
    ///
    /// The nonce is derived from the secret key, the seed and an attempt counter so the same
    /// inputs always give the same proof. The counter only moves when the contract would reject
    /// the proof because `c·gamma` and `s·h` can't be added in affine form.
    ///
    /// # Errors
    ///
    /// [`VrfError::InvalidSeed`] if `seed` does not fit in 256 bits.
    pub fn generate_proof(&self, seed: &BigUint) -> Result<Proof> {
        let curve = &*SECP256K1;
        let seed_word = u256_to_word(seed).map_err(|_| VrfError::InvalidSeed)?;
        let public_key = self.public_key.point();
        let h = curve.hash_to_curve(public_key, seed)?;
        let h_point = point_from_affine(&h)?;
        let x = self.keypair.secret_key();
        let gamma_point = g!(x * h_point).normalize();
        let gamma = affine_from_point(gamma_point);

        for attempt in 0..MAX_NONCE_ATTEMPTS {
            let Some(k) = derive_nonce(x, &seed_word, attempt) else {
                continue;
            };
            let u = affine_from_point(g!(k * G).normalize());
            let v = affine_from_point(g!(k * h_point).normalize());
            let c = scalar_from_curve_points(&h, public_key, &gamma, &u.ethereum_address()?, &v)?;
            let c_scalar = Scalar::<Secret, Zero>::from_bytes_mod_order(u256_to_word(&c)?)
                .public();
            let s_scalar = s!(k - c_scalar * x).public();

            let c_gamma = g!(c_scalar * gamma_point).normalize().non_zero();
            let s_hash = g!(s_scalar * h_point).normalize().non_zero();
            match (c_gamma, s_hash) {
                (Some(c_gamma), Some(s_hash))
                    if c_gamma.coordinates().0 != s_hash.coordinates().0 =>
                {
                    return Ok(Proof {
                        public_key: public_key.clone(),
                        output: output_from_gamma(&gamma)?,
                        gamma,
                        c,
                        s: BigUint::from_bytes_be(&s_scalar.to_bytes()),
                        seed: seed.clone(),
                    });
                }
                _ => warn!(attempt, "c·gamma and s·h collide, retrying with the next nonce"),
            }
        }
        Err(VrfError::Arithmetic("no usable nonce found"))
    }
}

fn derive_nonce(secret: &Scalar, seed: &[u8; 32], attempt: u32) -> Option<Scalar> {
    let tag = Sha256::digest(NONCE_TAG);
    let hash = Sha256::new()
        .chain_update(tag)
        .chain_update(tag)
        .chain_update(secret.to_bytes())
        .chain_update(seed)
        .chain_update(attempt.to_be_bytes())
        .finalize();
    Scalar::<Secret, Zero>::from_bytes_mod_order(hash.into())
        .non_zero()
}

#[cfg(test)]
mod test {
    use super::*;

    fn key(v: u32) -> SecretKey {
        SecretKey::from_big(&BigUint::from(v)).unwrap()
    }

    #[test]
    fn nonce_depends_on_every_input() {
        let x = Scalar::<Secret, NonZero>::from_bytes([0x10; 32]).unwrap();
        let y = Scalar::<Secret, NonZero>::from_bytes([0x11; 32]).unwrap();
        let base = derive_nonce(&x, &[0; 32], 0);
        assert_eq!(base, derive_nonce(&x, &[0; 32], 0));
        assert_ne!(base, derive_nonce(&y, &[0; 32], 0));
        assert_ne!(base, derive_nonce(&x, &[1; 32], 0));
        assert_ne!(base, derive_nonce(&x, &[0; 32], 1));
    }

    #[test]
    fn proof_round_trip() {
        let proof = key(0x10).generate_proof(&BigUint::from(0x10u8)).unwrap();
        assert_eq!(proof.verify(), Ok(true));
        assert_eq!(proof.output, output_from_gamma(&proof.gamma).unwrap());
        assert!(proof.s < *SECP256K1.order.value());
    }

    #[test]
    fn wrong_seed_or_key_fails() {
        let proof = key(0x10).generate_proof(&BigUint::from(1u8)).unwrap();
        let mut other_seed = proof.clone();
        other_seed.seed = BigUint::from(2u8);
        assert_eq!(other_seed.verify(), Ok(false));
        let mut other_key = proof.clone();
        other_key.public_key = key(0x11).public_key().point().clone();
        assert_eq!(other_key.verify(), Ok(false));
    }

    #[test]
    fn output_is_not_checked() {
        let mut proof = key(3).generate_proof(&BigUint::from(99u8)).unwrap();
        proof.output += 1u8;
        assert_eq!(proof.verify(), Ok(true));
    }

    #[test]
    fn malformed_proofs_are_errors() {
        let proof = key(3).generate_proof(&BigUint::from(99u8)).unwrap();
        let mut off_curve = proof.clone();
        off_curve.gamma.y += 1u8;
        assert_eq!(off_curve.verify(), Err(VrfError::PointNotOnCurve));
        let mut huge = proof.clone();
        huge.s = BigUint::from(1u8) << 300;
        assert!(matches!(huge.verify(), Err(VrfError::Arithmetic(_))));
        let mut zero = proof;
        zero.c = BigUint::from(0u8);
        assert_eq!(zero.verify(), Ok(false));
    }

    #[test]
    fn seed_too_large() {
        assert_eq!(
            key(1).generate_proof(&(BigUint::from(1u8) << 256)),
            Err(VrfError::InvalidSeed)
        );
    }
}
