use evm_bridge::crypto::{derive_address, Address, Digest, SignerPublicKey};
use evm_bridge::principal::{encode_account_id, AccountId, MAX_ACCOUNT_ID_LEN};
use evm_bridge::signer::{LocalKeyOracle, SigningOracle};
use evm_bridge::tx::{compute_digest, encode_unsigned, FeeEstimate, UnsignedTx};
use evm_bridge::{keccak256, resolve_recovery_id, to_checksum_address};
use proptest::prelude::*;
use secp256k1::{Secp256k1, SecretKey};

fn any_secret_key() -> impl Strategy<Value = SecretKey> {
    prop::array::uniform32(any::<u8>()).prop_filter_map("valid secp256k1 scalar", |bytes| {
        SecretKey::from_slice(&bytes).ok()
    })
}

fn any_tx() -> impl Strategy<Value = UnsignedTx> {
    (
        any::<u64>(),
        prop::array::uniform20(any::<u8>()),
        any::<u64>(),
        prop::collection::vec(any::<u8>(), 0..200),
        1u64..30_000_000,
        0u128..1_000_000_000_000,
    )
        .prop_map(|(nonce, to, value, data, gas_limit, base_fee)| {
            let fees = FeeEstimate::from_base_fee(base_fee, FeeEstimate::DEFAULT_PRIORITY_FEE);
            UnsignedTx::eip1559(11_155_111, nonce, Address(to), value as u128, data, gas_limit, &fees)
        })
}

proptest! {
    #[test]
    fn checksum_addresses_roundtrip(bytes in prop::array::uniform20(any::<u8>())) {
        let checksummed = to_checksum_address(&bytes);
        prop_assert!(checksummed.starts_with("0x"));

        let lower_expected = hex::encode(bytes);
        prop_assert_eq!(checksummed[2..].to_ascii_lowercase(), lower_expected.clone());

        let hash = keccak256(lower_expected.as_bytes());
        let mut expected = String::from("0x");
        for (i, ch) in lower_expected.chars().enumerate() {
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if ch.is_ascii_digit() || nibble < 8 {
                expected.push(ch);
            } else {
                expected.push(ch.to_ascii_uppercase());
            }
        }
        prop_assert_eq!(checksummed, expected);
    }

    #[test]
    fn address_ignores_key_encoding(secret in any_secret_key()) {
        let secp = Secp256k1::new();
        let public = secret.public_key(&secp);
        let uncompressed = public.serialize_uncompressed();

        let from_prefixed = derive_address(&uncompressed).unwrap();
        let from_raw = derive_address(&uncompressed[1..]).unwrap();
        let from_compressed = derive_address(&public.serialize()).unwrap();

        prop_assert_eq!(from_prefixed, from_raw);
        prop_assert_eq!(from_prefixed, from_compressed);
        prop_assert_eq!(&from_prefixed.0[..], &keccak256(&uncompressed[1..])[12..]);
    }

    #[test]
    fn encoding_is_deterministic(tx in any_tx()) {
        let first = encode_unsigned(&tx).unwrap();
        let second = encode_unsigned(&tx.clone()).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first[0], 0x02);
        prop_assert_eq!(compute_digest(&first), Digest(keccak256(&first)));
    }

    #[test]
    fn nonce_changes_digest(tx in any_tx()) {
        let mut bumped = tx.clone();
        bumped.nonce = tx.nonce.wrapping_add(1);
        let a = compute_digest(&encode_unsigned(&tx).unwrap());
        let b = compute_digest(&encode_unsigned(&bumped).unwrap());
        prop_assert_ne!(a, b);
    }

    #[test]
    fn account_id_roundtrip(bytes in prop::collection::vec(any::<u8>(), 0..=MAX_ACCOUNT_ID_LEN)) {
        let account = AccountId::from_bytes(&bytes);
        let parsed = AccountId::from_text(&account.to_text()).unwrap();
        prop_assert_eq!(&parsed, &account);

        let arg = encode_account_id(&account).unwrap();
        prop_assert_eq!(arg.0[0] as usize, bytes.len());
        prop_assert_eq!(arg.decode_account().unwrap(), account);
    }

    #[test]
    fn recovery_id_always_resolves(secret in any_secret_key(), digest in prop::array::uniform32(any::<u8>())) {
        let oracle = LocalKeyOracle::new(secret);
        let expected: SignerPublicKey = oracle.signer_public_key();
        let raw = block_on(oracle.sign(Digest(digest))).unwrap();

        let full = resolve_recovery_id(&Digest(digest), &raw, &expected).unwrap();
        prop_assert!(full.recovery_id <= 1);
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
        .block_on(future)
}
