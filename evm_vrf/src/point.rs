//! Points and the group operations the verifier contract relies on.
//!
//! [`AffinePoint`] is a plain pair of coordinates. The point at infinity has no affine form, so
//! operations that can produce it return `Option<AffinePoint>` with `None` standing for
//! infinity. Nothing here is constant time: these routines only ever see public values.
//!
//! The contract never multiplies points directly. It checks products with the `ecrecover`
//! precompile instead, and adds points in projective coordinates using an inverse supplied by
//! the prover. [`CurveParams::ecrecover`], [`CurveParams::ecmul_verify`],
//! [`CurveParams::projective_add`] and [`CurveParams::linear_combination`] reproduce those
//! steps so that proofs can be checked exactly the way the chain will check them.
use crate::{
    curve::CurveParams,
    error::{Result, VrfError},
    evm::{Address, keccak256_packed, u256_to_word},
};
use num_bigint::BigUint;
use num_traits::{One, Zero};

/// A point on the curve in affine coordinates.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AffinePoint {
    /// The x coordinate.
    pub x: BigUint,
    /// The y coordinate.
    pub y: BigUint,
}

/// The `(x, y, z)` triple returned by [`CurveParams::projective_add`]. The affine point is
/// `(x/z, y/z)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectivePoint {
    /// Numerator of the x coordinate.
    pub x: BigUint,
    /// Numerator of the y coordinate.
    pub y: BigUint,
    /// Shared denominator.
    pub z: BigUint,
}

impl AffinePoint {
    /// Pairs two coordinates without checking they are on any curve.
    pub fn new(x: BigUint, y: BigUint) -> Self {
        Self { x, y }
    }

    /// The 64-byte `x ‖ y` encoding used by `uint256[2]` in the contract.
    ///
    /// # Errors
    ///
    /// Fails if a coordinate does not fit in 256 bits, which can't happen for a point on the
    /// curve.
    pub fn long_marshal(&self) -> Result<[u8; 64]> {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&u256_to_word(&self.x)?);
        bytes[32..].copy_from_slice(&u256_to_word(&self.y)?);
        Ok(bytes)
    }

    /// Reads the two coordinates of a `uint256[2]` without checking them.
    pub fn from_words(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 64 {
            return Err(VrfError::MalformedProof {
                expected: 64,
                actual: bytes.len(),
            });
        }
        Ok(Self::new(
            BigUint::from_bytes_be(&bytes[..32]),
            BigUint::from_bytes_be(&bytes[32..]),
        ))
    }

    /// The account address of this point viewed as a public key: the low 20 bytes of
    /// `keccak256(x ‖ y)`.
    pub fn ethereum_address(&self) -> Result<Address> {
        Ok(Address::from_hash(&keccak256_packed(&[&self.long_marshal()?])))
    }

    fn is_y_even(&self) -> bool {
        !self.y.bit(0)
    }
}

/// Jacobian coordinates `(X/Z², Y/Z³)`, `Z = 0` being infinity.
#[derive(Clone, Debug)]
struct Jacobian {
    x: BigUint,
    y: BigUint,
    z: BigUint,
}

impl Jacobian {
    fn infinity() -> Self {
        Self {
            x: BigUint::one(),
            y: BigUint::one(),
            z: BigUint::zero(),
        }
    }

    fn is_infinity(&self) -> bool {
        self.z.is_zero()
    }
}

impl From<&AffinePoint> for Jacobian {
    fn from(point: &AffinePoint) -> Self {
        Self {
            x: point.x.clone(),
            y: point.y.clone(),
            z: BigUint::one(),
        }
    }
}

impl CurveParams {
    /// Decodes and validates a `uint256[2]` point.
    pub fn long_unmarshal(&self, bytes: &[u8]) -> Result<AffinePoint> {
        let point = AffinePoint::from_words(bytes)?;
        self.ensure_on_curve(&point)?;
        Ok(point)
    }

    /// `-p`.
    pub fn neg(&self, point: &AffinePoint) -> AffinePoint {
        AffinePoint::new(point.x.clone(), self.field.neg(&point.y))
    }

    /// `p + q`, `None` if they cancel out.
    pub fn add(&self, p: &AffinePoint, q: &AffinePoint) -> Option<AffinePoint> {
        self.to_affine(&self.jacobian_add(&p.into(), &q.into()))
    }

    /// `2·p`, `None` for a point of order two (which secp256k1 doesn't have).
    pub fn double(&self, point: &AffinePoint) -> Option<AffinePoint> {
        self.to_affine(&self.jacobian_double(&point.into()))
    }

    /// `k·p`, `None` if the result is infinity (including when `k ≡ 0`).
    ///
    /// `k` is used as is; any value works since `p` is assumed to be in the prime order group.
    pub fn scalar_mul(&self, point: &AffinePoint, k: &BigUint) -> Option<AffinePoint> {
        self.to_affine(&self.jacobian_mul(&point.into(), k))
    }

    /// `a·p + b·q`.
    pub fn sum_of_products(
        &self,
        a: &BigUint,
        p: &AffinePoint,
        b: &BigUint,
        q: &AffinePoint,
    ) -> Option<AffinePoint> {
        let ap = self.jacobian_mul(&p.into(), a);
        let bq = self.jacobian_mul(&q.into(), b);
        self.to_affine(&self.jacobian_add(&ap, &bq))
    }

    fn to_affine(&self, point: &Jacobian) -> Option<AffinePoint> {
        if point.is_infinity() {
            return None;
        }
        let f = &self.field;
        let z_inv = f.inv(&point.z).ok()?;
        let z_inv2 = f.mul(&z_inv, &z_inv);
        let z_inv3 = f.mul(&z_inv2, &z_inv);
        Some(AffinePoint::new(
            f.mul(&point.x, &z_inv2),
            f.mul(&point.y, &z_inv3),
        ))
    }

    fn jacobian_double(&self, p: &Jacobian) -> Jacobian {
        let f = &self.field;
        if p.is_infinity() || p.y.is_zero() {
            return Jacobian::infinity();
        }
        let a = f.mul(&p.x, &p.x);
        let b = f.mul(&p.y, &p.y);
        let c = f.mul(&b, &b);
        let x_plus_b = f.add(&p.x, &b);
        let d = f.mul(
            &BigUint::from(2u8),
            &f.sub(&f.sub(&f.mul(&x_plus_b, &x_plus_b), &a), &c),
        );
        let e = f.mul(&BigUint::from(3u8), &a);
        let e_squared = f.mul(&e, &e);
        let x = f.sub(&e_squared, &f.add(&d, &d));
        let y = f.sub(
            &f.mul(&e, &f.sub(&d, &x)),
            &f.mul(&BigUint::from(8u8), &c),
        );
        let z = f.mul(&BigUint::from(2u8), &f.mul(&p.y, &p.z));
        Jacobian { x, y, z }
    }

    fn jacobian_add(&self, p: &Jacobian, q: &Jacobian) -> Jacobian {
        if p.is_infinity() {
            return q.clone();
        }
        if q.is_infinity() {
            return p.clone();
        }
        let f = &self.field;
        let pz2 = f.mul(&p.z, &p.z);
        let qz2 = f.mul(&q.z, &q.z);
        let u1 = f.mul(&p.x, &qz2);
        let u2 = f.mul(&q.x, &pz2);
        let s1 = f.mul(&p.y, &f.mul(&qz2, &q.z));
        let s2 = f.mul(&q.y, &f.mul(&pz2, &p.z));
        if u1 == u2 {
            return if s1 == s2 {
                self.jacobian_double(p)
            } else {
                Jacobian::infinity()
            };
        }
        let h = f.sub(&u2, &u1);
        let r = f.sub(&s2, &s1);
        let h2 = f.mul(&h, &h);
        let h3 = f.mul(&h2, &h);
        let u1h2 = f.mul(&u1, &h2);
        let x = f.sub(&f.sub(&f.mul(&r, &r), &h3), &f.add(&u1h2, &u1h2));
        let y = f.sub(&f.mul(&r, &f.sub(&u1h2, &x)), &f.mul(&s1, &h3));
        let z = f.mul(&h, &f.mul(&p.z, &q.z));
        Jacobian { x, y, z }
    }

    fn jacobian_mul(&self, p: &Jacobian, k: &BigUint) -> Jacobian {
        let mut acc = Jacobian::infinity();
        for i in (0..k.bits()).rev() {
            acc = self.jacobian_double(&acc);
            if k.bit(i) {
                acc = self.jacobian_add(&acc, p);
            }
        }
        acc
    }

    /// `p + q` in projective coordinates, computed with exactly the same sequence of field
    /// operations as the contract's `projectiveECAdd`.
    ///
    /// `p` and `q` must have distinct x coordinates, otherwise `z` is zero.
    pub fn projective_add(&self, p: &AffinePoint, q: &AffinePoint) -> ProjectivePoint {
        let f = &self.field;
        let one = BigUint::one();
        // (x1/z1) - (x2/z2)
        let sub = |x1: &BigUint, z1: &BigUint, x2: &BigUint, z2: &BigUint| {
            (
                f.add(&f.mul(z2, x1), &f.mul(z1, &f.neg(x2))),
                f.mul(z1, z2),
            )
        };
        let mul = |x1: &BigUint, z1: &BigUint, x2: &BigUint, z2: &BigUint| {
            (f.mul(x1, x2), f.mul(z1, z2))
        };

        // slope of the secant as lx/lz
        let lx = f.sub(&q.y, &p.y);
        let lz = f.sub(&q.x, &p.x);

        let (sx, dx) = mul(&lx, &lz, &lx, &lz);
        let (sx, dx) = sub(&sx, &dx, &p.x, &one);
        let (sx, dx) = sub(&sx, &dx, &q.x, &one);

        let (sy, dy) = sub(&p.x, &one, &sx, &dx);
        let (sy, dy) = mul(&sy, &dy, &lx, &lz);
        let (sy, dy) = sub(&sy, &dy, &p.y, &one);

        if dx != dy {
            ProjectivePoint {
                x: f.mul(&sx, &dy),
                y: f.mul(&sy, &dx),
                z: f.mul(&dx, &dy),
            }
        } else {
            ProjectivePoint {
                x: sx,
                y: sy,
                z: dx,
            }
        }
    }

    /// `p1 + p2` given the inverse of the `z` that [`projective_add`](Self::projective_add)
    /// produces for them.
    ///
    /// # Errors
    ///
    /// [`VrfError::PointNotOnCurve`] if either point is invalid and
    /// [`VrfError::ProofRejected`] if `inv_z` is not the inverse of `z`.
    pub fn affine_add(
        &self,
        p1: &AffinePoint,
        p2: &AffinePoint,
        inv_z: &BigUint,
    ) -> Result<AffinePoint> {
        self.ensure_on_curve(p1)?;
        self.ensure_on_curve(p2)?;
        let ProjectivePoint { x, y, z } = self.projective_add(p1, p2);
        if !self.field.is_inverse(&z, inv_z) {
            return Err(VrfError::ProofRejected("invZ must be inverse of z"));
        }
        Ok(AffinePoint::new(
            self.field.mul(&x, inv_z),
            self.field.mul(&y, inv_z),
        ))
    }

    /// What the `ecrecover` precompile returns for this message hash and signature, `None`
    /// where the precompile would return the zero address.
    pub fn ecrecover(&self, hash: &BigUint, v: u8, r: &BigUint, s: &BigUint) -> Option<Address> {
        let n = &self.order;
        if !(v == 27 || v == 28) {
            return None;
        }
        if r.is_zero() || !n.contains(r) || s.is_zero() || !n.contains(s) {
            return None;
        }
        if !self.field.contains(r) {
            return None;
        }
        let mut y = self.field.sqrt(&self.y_squared(r)).ok().flatten()?;
        if y.bit(0) != (v == 28) {
            y = self.field.neg(&y);
        }
        let big_r = AffinePoint::new(r.clone(), y);
        let r_inv = n.inv(r).ok()?;
        let u1 = n.mul(&n.neg(hash), &r_inv);
        let u2 = n.mul(s, &r_inv);
        self.sum_of_products(&u1, &self.generator, &u2, &big_r)?
            .ethereum_address()
            .ok()
    }

    /// Checks `scalar · multiplicand == product` using one `ecrecover`.
    ///
    /// # Errors
    ///
    /// A zero scalar is rejected outright, as the contract does.
    pub fn ecmul_verify(
        &self,
        multiplicand: &AffinePoint,
        scalar: &BigUint,
        product: &AffinePoint,
    ) -> Result<bool> {
        if scalar.is_zero() {
            return Err(VrfError::ProofRejected("zero scalar"));
        }
        let x = &multiplicand.x;
        let v = if multiplicand.is_y_even() { 27 } else { 28 };
        let scalar_times_x = self.order.mul(scalar, x);
        let actual = self.ecrecover(&BigUint::zero(), v, x, &scalar_times_x);
        Ok(actual == Some(product.ethereum_address()?))
    }

    /// Checks that `witness` is the address of `c·p + s·G` using one `ecrecover`.
    ///
    /// # Errors
    ///
    /// The zero address is rejected outright since `ecrecover` uses it to signal failure.
    pub fn verify_linear_combination_with_generator(
        &self,
        c: &BigUint,
        p: &AffinePoint,
        s: &BigUint,
        witness: &Address,
    ) -> Result<bool> {
        if witness.is_zero() {
            return Err(VrfError::ProofRejected("bad witness"));
        }
        let n = &self.order;
        let v = if p.is_y_even() { 27 } else { 28 };
        // -(x·s), taken as n - (x·s mod n) just like the contract
        let pseudo_hash = n.value() - n.mul(&p.x, s);
        let pseudo_signature = n.mul(c, &p.x);
        let computed = self.ecrecover(&pseudo_hash, v, &p.x, &pseudo_signature);
        Ok(computed == Some(*witness))
    }

    /// `c·p1 + s·p2` given claimed products `cp1_witness = c·p1` and `sp2_witness = s·p2`,
    /// which are checked with [`ecmul_verify`](Self::ecmul_verify) before being added.
    #[allow(clippy::too_many_arguments)]
    pub fn linear_combination(
        &self,
        c: &BigUint,
        p1: &AffinePoint,
        cp1_witness: &AffinePoint,
        s: &BigUint,
        p2: &AffinePoint,
        sp2_witness: &AffinePoint,
        z_inv: &BigUint,
    ) -> Result<AffinePoint> {
        if self.field.reduce(&cp1_witness.x) == self.field.reduce(&sp2_witness.x) {
            return Err(VrfError::ProofRejected("points in sum must be distinct"));
        }
        if !self.ecmul_verify(p1, c, cp1_witness)? {
            return Err(VrfError::ProofRejected("First mul check failed"));
        }
        if !self.ecmul_verify(p2, s, sp2_witness)? {
            return Err(VrfError::ProofRejected("Second mul check failed"));
        }
        self.affine_add(cp1_witness, sp2_witness, z_inv)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::curve::{SECP256K1, test_curve::tiny};

    fn n(v: u32) -> BigUint {
        BigUint::from(v)
    }

    fn tiny_points() -> Vec<AffinePoint> {
        let curve = tiny();
        (1..79u32)
            .map(|k| curve.scalar_mul(&curve.generator, &n(k)).unwrap())
            .collect()
    }

    #[test]
    fn generator_has_prime_order() {
        let curve = tiny();
        let g = &curve.generator;
        assert_eq!(curve.scalar_mul(g, &n(79)), None);
        assert_eq!(curve.scalar_mul(g, &n(0)), None);
        assert_eq!(curve.scalar_mul(g, &n(80)).as_ref(), Some(g));
        let points = tiny_points();
        for point in &points {
            assert!(curve.is_on_curve(point));
        }
        let mut distinct = points.clone();
        distinct.sort_by(|a, b| (&a.x, &a.y).cmp(&(&b.x, &b.y)));
        distinct.dedup();
        assert_eq!(distinct.len(), 78);
    }

    #[test]
    fn addition_agrees_with_multiplication() {
        let curve = tiny();
        let g = &curve.generator;
        for a in 1..79u32 {
            for b in [1u32, 2, 5, 40, 78] {
                let lhs = curve
                    .scalar_mul(g, &n(a))
                    .and_then(|pa| curve.add(&pa, &curve.scalar_mul(g, &n(b)).unwrap()));
                assert_eq!(lhs, curve.scalar_mul(g, &n(a + b)), "{a}G + {b}G");
            }
        }
        let p = curve.scalar_mul(g, &n(9)).unwrap();
        assert_eq!(curve.add(&p, &curve.neg(&p)), None);
        assert_eq!(curve.double(&p), curve.scalar_mul(g, &n(18)));
        assert_eq!(curve.double(&p), curve.add(&p, &p));
        assert_eq!(
            curve.sum_of_products(&n(3), g, &n(4), &p),
            curve.scalar_mul(g, &n(39))
        );
    }

    #[test]
    fn projective_add_matches_affine_add() {
        let curve = tiny();
        let points = tiny_points();
        for p in points.iter().step_by(7) {
            for q in points.iter().step_by(5) {
                if p.x == q.x {
                    continue;
                }
                let ProjectivePoint { z, .. } = curve.projective_add(p, q);
                let z_inv = curve.field.inv(&z).unwrap();
                let sum = curve.affine_add(p, q, &z_inv).unwrap();
                assert_eq!(Some(sum), curve.add(p, q));
            }
        }
    }

    #[test]
    fn affine_add_checks_its_inputs() {
        let curve = tiny();
        let points = tiny_points();
        let (p, q) = (&points[0], &points[1]);
        let z = curve.projective_add(p, q).z;
        let z_inv = curve.field.inv(&z).unwrap();
        let off_curve = AffinePoint::new(n(2), n(23));
        assert_eq!(
            curve.affine_add(&off_curve, q, &z_inv),
            Err(VrfError::PointNotOnCurve)
        );
        assert_eq!(
            curve.affine_add(p, q, &curve.field.add(&z_inv, &n(1))),
            Err(VrfError::ProofRejected("invZ must be inverse of z"))
        );
    }

    #[test]
    fn ecrecover_recovers_signer() {
        let curve = &*SECP256K1;
        let secret = BigUint::from(0xdead_beefu32);
        let public = curve.scalar_mul(&curve.generator, &secret).unwrap();
        let expected = public.ethereum_address().unwrap();
        // sign z with nonce k: r = (kG).x, s = k⁻¹(z + r·d)
        let z = BigUint::from(1234567u32);
        let k = BigUint::from(987654321u32);
        let big_r = curve.scalar_mul(&curve.generator, &k).unwrap();
        let r = curve.order.reduce(&big_r.x);
        let n = &curve.order;
        let s = n.mul(&n.inv(&k).unwrap(), &n.add(&z, &n.mul(&r, &secret)));
        let v = if big_r.y.bit(0) { 28 } else { 27 };
        assert_eq!(curve.ecrecover(&z, v, &r, &s), Some(expected));
        assert_ne!(curve.ecrecover(&z, 55 - v, &r, &s), Some(expected));
        assert_eq!(curve.ecrecover(&z, 26, &r, &s), None);
        assert_eq!(curve.ecrecover(&z, v, &BigUint::zero(), &s), None);
        assert_eq!(curve.ecrecover(&z, v, &r, n.value()), None);
    }

    #[test]
    fn address_of_generator() {
        let curve = &*SECP256K1;
        assert_eq!(
            curve.generator.ethereum_address().unwrap().to_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn ecmul_verify_checks_products() {
        let curve = &*SECP256K1;
        let p = curve.scalar_mul(&curve.generator, &n(77)).unwrap();
        let scalar = n(12345);
        let product = curve.scalar_mul(&p, &scalar).unwrap();
        assert_eq!(curve.ecmul_verify(&p, &scalar, &product), Ok(true));
        assert_eq!(curve.ecmul_verify(&p, &n(12346), &product), Ok(false));
        assert_eq!(
            curve.ecmul_verify(&p, &n(0), &product),
            Err(VrfError::ProofRejected("zero scalar"))
        );
    }

    #[test]
    fn linear_combination_with_generator() {
        let curve = &*SECP256K1;
        let p = curve.scalar_mul(&curve.generator, &n(31337)).unwrap();
        let (c, s) = (n(1111), n(2222));
        let witness = curve
            .sum_of_products(&c, &p, &s, &curve.generator)
            .unwrap()
            .ethereum_address()
            .unwrap();
        assert_eq!(
            curve.verify_linear_combination_with_generator(&c, &p, &s, &witness),
            Ok(true)
        );
        assert_eq!(
            curve.verify_linear_combination_with_generator(&c, &p, &n(2223), &witness),
            Ok(false)
        );
        assert_eq!(
            curve.verify_linear_combination_with_generator(&c, &p, &s, &Address::ZERO),
            Err(VrfError::ProofRejected("bad witness"))
        );
    }

    #[test]
    fn linear_combination_checks_witnesses() {
        let curve = &*SECP256K1;
        let g = &curve.generator;
        let p1 = curve.scalar_mul(g, &n(5)).unwrap();
        let p2 = curve.scalar_mul(g, &n(7)).unwrap();
        let (c, s) = (n(11), n(13));
        let cp1 = curve.scalar_mul(&p1, &c).unwrap();
        let sp2 = curve.scalar_mul(&p2, &s).unwrap();
        let z_inv = curve
            .field
            .inv(&curve.projective_add(&cp1, &sp2).z)
            .unwrap();
        assert_eq!(
            curve.linear_combination(&c, &p1, &cp1, &s, &p2, &sp2, &z_inv),
            Ok(curve.scalar_mul(g, &n(5 * 11 + 7 * 13)).unwrap())
        );
        assert_eq!(
            curve.linear_combination(&c, &p1, &cp1, &s, &p2, &cp1, &z_inv),
            Err(VrfError::ProofRejected("points in sum must be distinct"))
        );
        assert_eq!(
            curve.linear_combination(&n(12), &p1, &cp1, &s, &p2, &sp2, &z_inv),
            Err(VrfError::ProofRejected("First mul check failed"))
        );
        assert_eq!(
            curve.linear_combination(&c, &p1, &cp1, &n(14), &p2, &sp2, &z_inv),
            Err(VrfError::ProofRejected("Second mul check failed"))
        );
    }

    #[test]
    fn long_marshal_round_trip() {
        let curve = &*SECP256K1;
        let bytes = curve.generator.long_marshal().unwrap();
        assert_eq!(curve.long_unmarshal(&bytes), Ok(curve.generator.clone()));
        assert_eq!(
            curve.long_unmarshal(&bytes[1..]),
            Err(VrfError::MalformedProof {
                expected: 64,
                actual: 63
            })
        );
        let mut off = bytes;
        off[63] ^= 1;
        assert_eq!(curve.long_unmarshal(&off), Err(VrfError::PointNotOnCurve));
    }
}
