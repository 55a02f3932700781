use evm_vrf::{
    PROOF_LENGTH, ProofResponse, SECP256K1, SecretKey, Seed, SolidityProof, VrfError,
    num_bigint::BigUint, seed::final_seed, unmarshal_proof_response, unmarshal_solidity_proof,
    verify_marshaled_proof,
};
use proptest::prelude::*;

fn secret_key(bytes: [u8; 32]) -> Option<SecretKey> {
    SecretKey::from_bytes(bytes).ok()
}

fn flip(value: &BigUint, bit: u64) -> BigUint {
    value ^ (BigUint::from(1u8) << bit)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn proofs_verify_and_are_deterministic(
        secret_key_bytes in prop::array::uniform32(any::<u8>()),
        seed in prop::array::uniform32(any::<u8>()),
    ) {
        let Some(key) = secret_key(secret_key_bytes) else {
            return Ok(());
        };
        let seed = BigUint::from_bytes_be(&seed);

        let proof = key.generate_proof(&seed).expect("any 256-bit seed can be proven");
        prop_assert_eq!(proof.verify(), Ok(true), "proof should verify");

        let again = key.generate_proof(&seed).unwrap();
        prop_assert_eq!(&proof, &again, "proofs should be deterministic");

        let other = SecretKey::random(&mut rand::thread_rng());
        let mut wrong_key = proof.clone();
        wrong_key.public_key = other.public_key().point().clone();
        prop_assert_eq!(
            wrong_key.verify(),
            Ok(false),
            "proof should not verify under another key"
        );
    }

    #[test]
    fn single_bit_flips_invalidate(
        secret_key_bytes in prop::array::uniform32(any::<u8>()),
        seed in any::<u64>(),
        bit in 0u64..256,
    ) {
        let Some(key) = secret_key(secret_key_bytes) else {
            return Ok(());
        };
        let proof = key.generate_proof(&BigUint::from(seed)).unwrap();

        let mut tampered_c = proof.clone();
        tampered_c.c = flip(&proof.c, bit);
        prop_assert_ne!(tampered_c.verify(), Ok(true), "flipped c");

        let mut tampered_s = proof.clone();
        tampered_s.s = flip(&proof.s, bit);
        prop_assert_ne!(tampered_s.verify(), Ok(true), "flipped s");

        let mut tampered_gamma = proof.clone();
        tampered_gamma.gamma.x = flip(&proof.gamma.x, bit);
        prop_assert_ne!(tampered_gamma.verify(), Ok(true), "flipped gamma.x");
        tampered_gamma.gamma = proof.gamma.clone();
        tampered_gamma.gamma.y = flip(&proof.gamma.y, bit);
        prop_assert_ne!(tampered_gamma.verify(), Ok(true), "flipped gamma.y");

        let mut tampered_pk = proof.clone();
        tampered_pk.public_key.x = flip(&proof.public_key.x, bit);
        prop_assert_ne!(tampered_pk.verify(), Ok(true), "flipped public key");
    }

    #[test]
    fn seed_round_trip(bytes in prop::array::uniform32(any::<u8>())) {
        let value = BigUint::from_bytes_be(&bytes);
        match Seed::from_big(&value) {
            Ok(seed) => prop_assert_eq!(seed.big(), value),
            Err(e) => {
                prop_assert_eq!(e, VrfError::InvalidSeed);
                prop_assert!(&value >= SECP256K1.field.value());
            }
        }
    }

    #[test]
    fn marshal_round_trip(
        secret_key_bytes in prop::array::uniform32(any::<u8>()),
        pre_seed in any::<u128>(),
        block_hash in prop::array::uniform32(any::<u8>()),
        block_num in any::<u64>(),
    ) {
        let Some(key) = secret_key(secret_key_bytes) else {
            return Ok(());
        };
        let pre_seed = Seed::from_big(&BigUint::from(pre_seed)).unwrap();
        let proof = key.generate_proof(&final_seed(&pre_seed, &block_hash)).unwrap();

        let bytes = SolidityProof::precalculate(&proof).unwrap().marshal().unwrap();
        prop_assert_eq!(bytes.len(), PROOF_LENGTH);
        prop_assert_eq!(unmarshal_solidity_proof(&bytes).unwrap(), proof.clone());
        prop_assert_eq!(verify_marshaled_proof(&bytes), Ok(proof.output.clone()));

        let response = ProofResponse { proof: proof.clone(), pre_seed, block_num };
        let encoded = response.marshal_for_vrf_coordinator().unwrap();
        let decoded = unmarshal_proof_response(&encoded).unwrap();
        prop_assert_eq!(decoded.block_num, block_num);
        prop_assert_eq!(decoded.pre_seed, pre_seed);
        prop_assert_eq!(&decoded.proof.seed, &pre_seed.big(), "seed should be the pre-seed");
        prop_assert_eq!(&decoded.proof.gamma, &proof.gamma);
    }

    #[test]
    fn final_seed_stability(
        pre_seed in any::<u128>(),
        block_hash in prop::array::uniform32(any::<u8>()),
        byte in 0usize..32,
    ) {
        let pre_seed = Seed::from_big(&BigUint::from(pre_seed)).unwrap();
        let seed = final_seed(&pre_seed, &block_hash);
        prop_assert_eq!(&seed, &final_seed(&pre_seed, &block_hash));

        let mut other_hash = block_hash;
        other_hash[byte] ^= 0x80;
        prop_assert_ne!(&seed, &final_seed(&pre_seed, &other_hash));

        let other_pre_seed = Seed::from_big(&(pre_seed.big() + 1u8)).unwrap();
        prop_assert_ne!(&seed, &final_seed(&other_pre_seed, &block_hash));
    }
}
