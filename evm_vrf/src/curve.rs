//! Curve parameters.
//!
//! Everything that depends on the curve takes a [`CurveParams`] so that tests can swap in a
//! small curve. Proof generation always uses [`SECP256K1`] because that is what the verifier
//! contract hardcodes.
use crate::{
    error::{Result, VrfError},
    field::Modulus,
    point::AffinePoint,
};
use num_bigint::BigUint;
use std::sync::LazyLock;

const FIELD_SIZE: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, //
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, //
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, //
    0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xfc, 0x2f,
];
const GROUP_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, //
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe, //
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, //
    0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];
const GENERATOR_X: [u8; 32] = [
    0x79, 0xbe, 0x66, 0x7e, 0xf9, 0xdc, 0xbb, 0xac, //
    0x55, 0xa0, 0x62, 0x95, 0xce, 0x87, 0x0b, 0x07, //
    0x02, 0x9b, 0xfc, 0xdb, 0x2d, 0xce, 0x28, 0xd9, //
    0x59, 0xf2, 0x81, 0x5b, 0x16, 0xf8, 0x17, 0x98,
];
const GENERATOR_Y: [u8; 32] = [
    0x48, 0x3a, 0xda, 0x77, 0x26, 0xa3, 0xc4, 0x65, //
    0x5d, 0xa4, 0xfb, 0xfc, 0x0e, 0x11, 0x08, 0xa8, //
    0xfd, 0x17, 0xb4, 0x48, 0xa6, 0x85, 0x54, 0x19, //
    0x9c, 0x47, 0xd0, 0x8f, 0xfb, 0x10, 0xd4, 0xb8,
];

/// The secp256k1 parameters, built on first use.
pub static SECP256K1: LazyLock<CurveParams> = LazyLock::new(CurveParams::secp256k1);

/// A short Weierstrass curve `y² = x³ + b` over a prime field, together with a generator of
/// prime order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurveParams {
    /// The field the coordinates live in.
    pub field: Modulus,
    /// The order of [`generator`](Self::generator).
    pub order: Modulus,
    /// The constant term of the curve equation.
    pub b: BigUint,
    /// The base point.
    pub generator: AffinePoint,
}

impl CurveParams {
    /// Validates that `generator` lies on the curve.
    ///
    /// The group order is taken on trust.
    pub fn new(
        field_modulus: BigUint,
        order: BigUint,
        b: BigUint,
        generator: AffinePoint,
    ) -> Result<Self> {
        let field = Modulus::new(field_modulus)?;
        let order = Modulus::new(order)?;
        let b = field.reduce(&b);
        let params = Self {
            field,
            order,
            b,
            generator,
        };
        if !params.is_on_curve(&params.generator) {
            return Err(VrfError::PointNotOnCurve);
        }
        Ok(params)
    }

    /// secp256k1 as specified in SEC 2.
    pub fn secp256k1() -> Self {
        Self {
            field: Modulus::from_be_bytes(&FIELD_SIZE),
            order: Modulus::from_be_bytes(&GROUP_ORDER),
            b: BigUint::from(7u8),
            generator: AffinePoint::new(
                BigUint::from_bytes_be(&GENERATOR_X),
                BigUint::from_bytes_be(&GENERATOR_Y),
            ),
        }
    }

    /// `x³ + b mod p`.
    pub fn y_squared(&self, x: &BigUint) -> BigUint {
        let x_cubed = self.field.mul(&self.field.mul(x, x), x);
        self.field.add(&x_cubed, &self.b)
    }

    /// Whether both coordinates are canonical and satisfy the curve equation.
    ///
    /// The point at infinity has no affine form so it is never on the curve.
    pub fn is_on_curve(&self, point: &AffinePoint) -> bool {
        self.field.contains(&point.x)
            && self.field.contains(&point.y)
            && self.field.mul(&point.y, &point.y) == self.y_squared(&point.x)
    }

    /// Like [`is_on_curve`](Self::is_on_curve) but as an error.
    pub fn ensure_on_curve(&self, point: &AffinePoint) -> Result<()> {
        if self.is_on_curve(point) {
            Ok(())
        } else {
            Err(VrfError::PointNotOnCurve)
        }
    }
}
