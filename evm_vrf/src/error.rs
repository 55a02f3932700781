//! Error types.

/// Errors returned while generating, verifying or encoding proofs.
///
/// Nothing in this crate panics on untrusted input. A proof that is merely wrong is reported as
/// `Ok(false)` by [`Proof::verify`](crate::Proof::verify); these variants are for input that can
/// not be interpreted at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VrfError {
    /// An operand was out of range or had no inverse.
    #[error("arithmetic error: {0}")]
    Arithmetic(&'static str),
    /// A point that must be on the curve is not.
    #[error("point is not on the curve")]
    PointNotOnCurve,
    /// A byte encoding had the wrong length.
    #[error("malformed proof: expected {expected} bytes but got {actual}")]
    MalformedProof {
        /// The length the encoding must have.
        expected: usize,
        /// The length that was provided.
        actual: usize,
    },
    /// A field inside an encoding could not be decoded.
    #[error("malformed field: {0}")]
    MalformedField(&'static str),
    /// A seed was not less than the field modulus.
    #[error("seed is not less than the field modulus")]
    InvalidSeed,
    /// A secret key was zero or not less than the group order.
    #[error("secret key must be non-zero and less than the group order")]
    InvalidKey,
    /// Hashing to the curve ran out of attempts.
    #[error("hash to curve gave up after {0} hash invocations")]
    HashToCurveExhausted(usize),
    /// A check the verifier contract performs failed. Holds the contract's revert reason.
    #[error("proof rejected: {0}")]
    ProofRejected(&'static str),
    /// The keystore has no key with this id.
    #[error("no key with id {0}")]
    UnknownKey(String),
}

/// Result type with [`VrfError`] as the error.
pub type Result<T> = core::result::Result<T, VrfError>;
