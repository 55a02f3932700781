//! Try-and-increment hashing onto the curve with keccak256.
//!
//! The candidate x coordinate is hashed until it lands in the field and then re-hashed until it
//! has a square root. The contract does the same thing so the two must agree on every hash
//! invocation.
use crate::{
    curve::CurveParams,
    error::{Result, VrfError},
    evm::{HASH_TO_CURVE_HASH_PREFIX, keccak256, prefix_word, u256_to_word, word_to_u256},
    point::AffinePoint,
};
use num_bigint::BigUint;
use tracing::trace;

/// How many keccak256 invocations [`CurveParams::hash_to_curve`] may use before giving up.
///
/// On secp256k1 each attempt fails with probability about one half, so reaching this is not
/// going to happen.
pub const HASH_TO_CURVE_ATTEMPTS: usize = 256;

impl CurveParams {
    /// Hashes `message` to a field element: `keccak256(message)`, re-hashed as a word until it
    /// is less than the field modulus.
    pub fn field_hash(&self, message: &[u8]) -> Result<BigUint> {
        let mut budget = HASH_TO_CURVE_ATTEMPTS;
        self.field_hash_within(message, &mut budget)
    }

    fn field_hash_within(&self, message: &[u8], budget: &mut usize) -> Result<BigUint> {
        spend(budget)?;
        let mut x = word_to_u256(&keccak256(message));
        while !self.field.contains(&x) {
            spend(budget)?;
            x = word_to_u256(&keccak256(&u256_to_word(&x)?));
        }
        Ok(x)
    }

    /// Deterministically maps `(public_key, input)` to a point with an even y coordinate.
    ///
    /// # Errors
    ///
    /// - [`VrfError::PointNotOnCurve`] if `public_key` is not a valid point
    /// - [`VrfError::InvalidSeed`] if `input` does not fit in 256 bits
    /// - [`VrfError::HashToCurveExhausted`] if no point was found within
    ///   [`HASH_TO_CURVE_ATTEMPTS`] hash invocations
    pub fn hash_to_curve(&self, public_key: &AffinePoint, input: &BigUint) -> Result<AffinePoint> {
        self.ensure_on_curve(public_key)?;
        let input = u256_to_word(input).map_err(|_| VrfError::InvalidSeed)?;
        let mut budget = HASH_TO_CURVE_ATTEMPTS;

        let mut message = Vec::with_capacity(128);
        message.extend_from_slice(&prefix_word(HASH_TO_CURVE_HASH_PREFIX));
        message.extend_from_slice(&public_key.long_marshal()?);
        message.extend_from_slice(&input);

        let mut x = self.field_hash_within(&message, &mut budget)?;
        loop {
            let y_squared = self.y_squared(&x);
            let y = self.field.sqrt_candidate(&y_squared)?;
            if self.field.mul(&y, &y) == y_squared {
                let y = if y.bit(0) { self.field.neg(&y) } else { y };
                return Ok(AffinePoint::new(x, y));
            }
            trace!(
                attempts = HASH_TO_CURVE_ATTEMPTS - budget,
                "candidate has no square root, rehashing"
            );
            x = self.field_hash_within(&u256_to_word(&x)?, &mut budget)?;
        }
    }
}

fn spend(budget: &mut usize) -> Result<()> {
    *budget = budget
        .checked_sub(1)
        .ok_or(VrfError::HashToCurveExhausted(HASH_TO_CURVE_ATTEMPTS))?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::curve::{SECP256K1, test_curve::tiny};

    #[test]
    fn lands_on_curve_with_even_y() {
        let curve = &*SECP256K1;
        let pk = curve.generator.clone();
        for seed in 0..50u32 {
            let point = curve.hash_to_curve(&pk, &BigUint::from(seed)).unwrap();
            assert!(curve.is_on_curve(&point));
            assert!(!point.y.bit(0));
            assert_eq!(
                curve.hash_to_curve(&pk, &BigUint::from(seed)).unwrap(),
                point
            );
        }
    }

    #[test]
    fn depends_on_public_key() {
        let curve = &*SECP256K1;
        let other = curve
            .scalar_mul(&curve.generator, &BigUint::from(2u8))
            .unwrap();
        let seed = BigUint::from(42u8);
        assert_ne!(
            curve.hash_to_curve(&curve.generator, &seed).unwrap(),
            curve.hash_to_curve(&other, &seed).unwrap()
        );
    }

    #[test]
    fn rejects_bad_inputs() {
        let curve = &*SECP256K1;
        let off_curve = AffinePoint::new(BigUint::from(1u8), BigUint::from(1u8));
        assert_eq!(
            curve.hash_to_curve(&off_curve, &BigUint::from(1u8)),
            Err(VrfError::PointNotOnCurve)
        );
        assert_eq!(
            curve.hash_to_curve(&curve.generator, &(BigUint::from(1u8) << 256)),
            Err(VrfError::InvalidSeed)
        );
    }

    #[test]
    fn matches_contract_hash_to_curve() {
        // hashToCurve(0x10·G, 0x10) as computed by the v08 verifier contract
        let curve = &*SECP256K1;
        let pk = curve
            .scalar_mul(&curve.generator, &BigUint::from(0x10u8))
            .unwrap();
        let h = curve.hash_to_curve(&pk, &BigUint::from(0x10u8)).unwrap();
        assert_eq!(
            hex::encode(h.long_marshal().unwrap()),
            "b9728c81fcb6fa3813a663e8ee54048a78d9f477cc30fea57a76a86ab8126bd1\
             1f018d281c0f71a25b461eff86daff3a320aac8a35e4388a0877b44d82819d58"
        );
    }

    #[test]
    fn field_hash_is_keccak_when_in_range() {
        let curve = &*SECP256K1;
        assert_eq!(
            curve.field_hash(b"").unwrap(),
            word_to_u256(&keccak256(b""))
        );
    }

    #[test]
    fn gives_up_on_tiny_field() {
        // keccak output is essentially never below 67
        let curve = tiny();
        assert_eq!(
            curve.hash_to_curve(&curve.generator.clone(), &BigUint::from(1u8)),
            Err(VrfError::HashToCurveExhausted(HASH_TO_CURVE_ATTEMPTS))
        );
    }
}
