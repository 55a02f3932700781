#[cfg(feature = "serde")]
#[test]
fn proof_serde_roundtrip() {
    use evm_vrf::{PreSeedDataV2Plus, Proof, SecretKey, Seed, evm::Address, num_bigint::BigUint};

    let key = SecretKey::random(&mut rand::thread_rng());
    let proof = key.generate_proof(&BigUint::from(12u8)).unwrap();
    let json = serde_json::to_string(&proof).unwrap();
    let decoded: Proof = serde_json::from_str(&json).unwrap();
    assert_eq!(proof, decoded);

    let request = PreSeedDataV2Plus {
        pre_seed: Seed::from_big(&BigUint::from(3u8)).unwrap(),
        block_hash: [1; 32],
        block_num: 2,
        sub_id: BigUint::from(1u8) << 255,
        callback_gas_limit: 4,
        num_words: 5,
        sender: Address([6; 20]),
        extra_args: vec![7, 8],
    };
    let json = serde_json::to_string(&request).unwrap();
    assert_eq!(
        serde_json::from_str::<PreSeedDataV2Plus>(&json).unwrap(),
        request
    );
}
