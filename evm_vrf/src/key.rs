//! Keys and the keystore interface.
//!
//! The secret scalar lives in a [`secp256kfun::KeyPair`] so every multiplication by it goes
//! through `secp256kfun`'s constant time arithmetic.
use crate::{
    curve::SECP256K1,
    error::{Result, VrfError},
    evm::{Address, keccak256_packed},
    point::AffinePoint,
    proof::Proof,
};
use core::fmt;
use num_bigint::BigUint;
use secp256kfun::{
    KeyPair, Point, Scalar,
    marker::*,
    rand_core::{CryptoRng, RngCore},
};
use std::collections::BTreeMap;

/// A VRF secret key.
#[derive(Clone)]
pub struct SecretKey {
    pub(crate) keypair: KeyPair,
    pub(crate) public_key: PublicKey,
}

impl SecretKey {
    /// Interprets `bytes` as a big-endian scalar.
    ///
    /// # Errors
    ///
    /// [`VrfError::InvalidKey`] if the scalar is zero or not less than the group order.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self> {
        let secret = Scalar::<Secret, NonZero>::from_bytes(bytes)
            .ok_or(VrfError::InvalidKey)?;
        Ok(Self::from_scalar(secret))
    }

    /// Like [`from_bytes`](Self::from_bytes) for a value of at most 256 bits.
    pub fn from_big(value: &BigUint) -> Result<Self> {
        let bytes = value.to_bytes_be();
        if bytes.len() > 32 {
            return Err(VrfError::InvalidKey);
        }
        let mut padded = [0u8; 32];
        padded[32 - bytes.len()..].copy_from_slice(&bytes);
        Self::from_bytes(padded)
    }

    /// Samples a key uniformly from `rng`.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_scalar(Scalar::random(rng))
    }

    fn from_scalar(secret: Scalar) -> Self {
        let keypair = KeyPair::new(secret);
        let public_key = PublicKey(affine_from_point(keypair.public_key()));
        Self {
            keypair,
            public_key,
        }
    }

    /// The secret scalar as 32 big-endian bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.keypair.secret_key().to_bytes()
    }

    /// `sk·G`.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// A VRF public key. Always a valid secp256k1 point.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PublicKey(AffinePoint);

impl PublicKey {
    /// Checks that `point` is on secp256k1.
    pub fn from_point(point: AffinePoint) -> Result<Self> {
        SECP256K1.ensure_on_curve(&point)?;
        Ok(Self(point))
    }

    /// Decodes the 33-byte compressed encoding.
    pub fn from_compressed(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 33] = bytes.try_into().map_err(|_| VrfError::MalformedProof {
            expected: 33,
            actual: bytes.len(),
        })?;
        let point: Point = Point::from_bytes(bytes).ok_or(VrfError::PointNotOnCurve)?;
        Ok(Self(affine_from_point(point)))
    }

    /// The public key as affine coordinates.
    pub fn point(&self) -> &AffinePoint {
        &self.0
    }

    /// The 33-byte compressed encoding.
    pub fn compressed(&self) -> Result<[u8; 33]> {
        Ok(point_from_affine(&self.0)?.to_bytes())
    }

    /// The keystore id: the compressed encoding in `0x` prefixed hex.
    pub fn id(&self) -> Result<String> {
        Ok(format!("0x{}", hex::encode(self.compressed()?)))
    }

    /// `keccak256(x ‖ y)`, which is how the coordinator refers to a proving key.
    pub fn key_hash(&self) -> Result<KeyHash> {
        Ok(KeyHash(keccak256_packed(&[&self.0.long_marshal()?])))
    }

    /// The account address controlled by this key.
    pub fn address(&self) -> Result<Address> {
        self.0.ethereum_address()
    }
}

/// keccak256 of a public key's coordinates.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyHash(pub [u8; 32]);

impl fmt::Display for KeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for KeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyHash({self})")
    }
}

pub(crate) fn affine_from_point<S>(point: Point<Normal, S, NonZero>) -> AffinePoint {
    let (x, y) = point.coordinates();
    AffinePoint::new(BigUint::from_bytes_be(&x), BigUint::from_bytes_be(&y))
}

pub(crate) fn point_from_affine(point: &AffinePoint) -> Result<Point> {
    let mut bytes = [0u8; 65];
    bytes[0] = 0x04;
    bytes[1..].copy_from_slice(&point.long_marshal()?);
    Point::from_bytes_uncompressed(bytes)
        .ok_or(VrfError::PointNotOnCurve)
}

/// Something that holds secret keys and will produce proofs with them.
///
/// Callers only ever see key ids, never key material.
pub trait ProofKeystore {
    /// Proves `seed` with the key identified by `id`.
    fn generate_proof(&self, id: &str, seed: &BigUint) -> Result<Proof>;
}

/// A [`ProofKeystore`] that keeps keys in memory, indexed by [`PublicKey::id`].
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeystore {
    keys: BTreeMap<String, SecretKey>,
}

impl InMemoryKeystore {
    /// An empty keystore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key` and returns its id.
    pub fn insert(&mut self, key: SecretKey) -> Result<String> {
        let id = key.public_key().id()?;
        self.keys.insert(id.clone(), key);
        Ok(id)
    }

    /// Looks up a key by id, ignoring the case of the hex digits.
    pub fn get(&self, id: &str) -> Option<&SecretKey> {
        self.keys.get(&id.to_ascii_lowercase())
    }

    /// Ids of every stored key, in order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

impl ProofKeystore for InMemoryKeystore {
    fn generate_proof(&self, id: &str, seed: &BigUint) -> Result<Proof> {
        self.get(id)
            .ok_or_else(|| VrfError::UnknownKey(id.to_string()))?
            .generate_proof(seed)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn key_one_is_the_generator() {
        let key = SecretKey::from_big(&BigUint::from(1u8)).unwrap();
        assert_eq!(key.public_key().point(), &SECP256K1.generator);
        assert_eq!(
            key.public_key().id().unwrap(),
            "0x0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
        assert_eq!(
            key.public_key().address().unwrap().to_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn invalid_keys() {
        assert_eq!(
            SecretKey::from_bytes([0u8; 32]).unwrap_err(),
            VrfError::InvalidKey
        );
        assert_eq!(
            SecretKey::from_big(SECP256K1.order.value()).unwrap_err(),
            VrfError::InvalidKey
        );
        assert_eq!(
            SecretKey::from_big(&(BigUint::from(1u8) << 256))
                .unwrap_err(),
            VrfError::InvalidKey
        );
    }

    #[test]
    fn compressed_round_trip() {
        let key = SecretKey::random(&mut rand::thread_rng());
        let public = key.public_key();
        let compressed = public.compressed().unwrap();
        assert_eq!(&PublicKey::from_compressed(&compressed).unwrap(), public);
        assert!(PublicKey::from_compressed(&compressed[1..]).is_err());
    }

    #[test]
    fn debug_hides_secret() {
        let key = SecretKey::from_big(&BigUint::from(0x10u8)).unwrap();
        let debug = format!("{key:?}");
        assert!(!debug.contains(&hex::encode(key.to_bytes())));
    }

    #[test]
    fn keystore_lookup() {
        let mut keystore = InMemoryKeystore::new();
        let key = SecretKey::random(&mut rand::thread_rng());
        let id = keystore.insert(key.clone()).unwrap();
        assert_eq!(
            keystore.ids().collect::<Vec<_>>(),
            vec![id.as_str()]
        );
        let seed = BigUint::from(7u8);
        let upper_id = id.to_uppercase().replacen("0X", "0x", 1);
        let proof = keystore.generate_proof(&upper_id, &seed).unwrap();
        assert_eq!(proof, key.generate_proof(&seed).unwrap());
        assert_eq!(
            keystore.generate_proof("0x00", &seed),
            Err(VrfError::UnknownKey("0x00".into()))
        );
    }
}
