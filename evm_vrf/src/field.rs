//! Modular arithmetic over a prime modulus.
//!
//! These are the same operations the verifier contract gets from `addmod`, `mulmod` and the
//! `bigModExp` precompile. Every result is in `[0, m)` and inputs are reduced before use, so raw
//! 256-bit words can be passed straight in.
//!
//! This arithmetic is variable time. It is only ever applied to public values; multiplications
//! involving the secret key go through [`secp256kfun`].
use crate::error::{Result, VrfError};
use num_bigint::BigUint;
use num_traits::{One, Zero};

/// An odd prime modulus and the arithmetic modulo it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Modulus {
    m: BigUint,
}

impl Modulus {
    /// Checks that `m` is odd and greater than three.
    ///
    /// Primality is not checked. Inversion uses Fermat's little theorem, so passing a composite
    /// modulus gives meaningless inverses.
    pub fn new(m: BigUint) -> Result<Self> {
        if m <= BigUint::from(3u8) || !m.bit(0) {
            return Err(VrfError::Arithmetic("modulus must be an odd prime greater than 3"));
        }
        Ok(Self { m })
    }

    pub(crate) fn from_be_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            m: BigUint::from_bytes_be(bytes),
        }
    }

    /// The modulus itself.
    pub fn value(&self) -> &BigUint {
        &self.m
    }

    /// Whether `a` is already a canonical residue.
    pub fn contains(&self, a: &BigUint) -> bool {
        a < &self.m
    }

    /// `a mod m`.
    pub fn reduce(&self, a: &BigUint) -> BigUint {
        a % &self.m
    }

    /// `a + b mod m`, like `addmod`.
    pub fn add(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + b) % &self.m
    }

    /// `a - b mod m`. Either operand may be unreduced.
    pub fn sub(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (self.reduce(a) + &self.m - self.reduce(b)) % &self.m
    }

    /// `-a mod m`, with `-0 = 0`.
    pub fn neg(&self, a: &BigUint) -> BigUint {
        self.sub(&BigUint::zero(), a)
    }

    /// `a · b mod m`, like `mulmod`.
    pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.m
    }

    /// `base^exponent mod m`, i.e. what `bigModExp` returns.
    pub fn pow(&self, base: &BigUint, exponent: &BigUint) -> BigUint {
        base.modpow(exponent, &self.m)
    }

    /// Multiplicative inverse as `a^(m-2)`.
    ///
    /// # Errors
    ///
    /// Returns [`VrfError::Arithmetic`] when `a ≡ 0`.
    pub fn inv(&self, a: &BigUint) -> Result<BigUint> {
        let a = self.reduce(a);
        if a.is_zero() {
            return Err(VrfError::Arithmetic("zero has no inverse"));
        }
        Ok(self.pow(&a, &(&self.m - 2u32)))
    }

    /// `a^((m+1)/4)`, which is a square root of `a` whenever one exists and `m ≡ 3 (mod 4)`.
    ///
    /// The caller must check the result squares back to `a`; this is exactly how the verifier
    /// contract computes square roots.
    pub fn sqrt_candidate(&self, a: &BigUint) -> Result<BigUint> {
        if !(self.m.bit(0) && self.m.bit(1)) {
            return Err(VrfError::Arithmetic(
                "square roots need a modulus congruent to 3 mod 4",
            ));
        }
        Ok(self.pow(a, &((&self.m + 1u32) >> 2)))
    }

    /// The square root of `a`, or `None` if `a` is not a quadratic residue.
    pub fn sqrt(&self, a: &BigUint) -> Result<Option<BigUint>> {
        let root = self.sqrt_candidate(a)?;
        Ok((self.mul(&root, &root) == self.reduce(a)).then_some(root))
    }

    /// Euler's criterion. Zero counts as a square.
    pub fn is_square(&self, a: &BigUint) -> bool {
        let a = self.reduce(a);
        a.is_zero() || self.pow(&a, &((&self.m - 1u32) >> 1)).is_one()
    }

    /// Whether `a · b ≡ 1`.
    pub fn is_inverse(&self, a: &BigUint, b: &BigUint) -> bool {
        self.mul(a, b).is_one()
    }
}
