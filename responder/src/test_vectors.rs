//! Known-answer vectors
//!
//! Values were produced independently of this crate: the mnemonic seed with
//! a reference PBKDF2-HMAC-SHA512 run, the proof digests with plain SHA-256,
//! and the user-friendly addresses with the TON CRC16-XMODEM layout.

#[cfg(test)]
mod ton_test_vectors {
    use std::time::Duration;

    use crate::account::{mnemonic_to_seed, Account, KeyMaterial, KeyedAccount};
    use crate::address::AccountAddress;
    use crate::b64;
    use crate::event::{ProofDomain, ProofItem, TonProof};
    use crate::proof::{build_message, inner_hash, signing_hash, verify};
    use crate::tests::fixtures;

    const MNEMONIC: &str = "abandon ability able about above absent absorb abstract absurd abuse \
                            access accident account accuse achieve acid acoustic acquire across \
                            act action actor actress actual";
    const MNEMONIC_SEED: &str = "5a15842392fa95b99a9539f67c2b7630e3a68e8891a0711a9dbadb29538e1a2c";
    const MNEMONIC_PUBLIC_KEY: &str =
        "f4d310c7b29da245878b84b14cc85d76b2c5835864fcdbc0e2d8c303a99f591e";

    const PROOF_INNER_HASH: &str =
        "b8fe78f4523016641c27b2216cb5ffc9bf23395d9c0ffb31709fe5230897daef";
    const PROOF_SIGNING_HASH: &str =
        "f372ec603e9d18261aea6856246c8d5fcabcbd4a076d8205072fa3110bdd99f1";
    const PROOF_SIGNATURE: &str =
        "av0MHrOHAEW1Sy5HlouhHwcNMqnNv4fgBPK43G1xdaXtttixCHz9WmcfHoG6UG9Nn2miGrUdmF4p8KOjcnS1BA==";
    const MASTERCHAIN_INNER_HASH: &str =
        "a26a85f78c95b6aecaca7027abe88b068b20f23ffa74f5160c99dc061ac7d98f";

    fn vector_address() -> AccountAddress {
        AccountAddress::new(0, [0x11; 32])
    }

    /// Test Vector 1: TON mnemonic to ed25519 seed
    #[test]
    fn test_vector_1_mnemonic_seed() {
        let seed = mnemonic_to_seed(MNEMONIC, "").unwrap();
        assert_eq!(hex::encode(*seed), MNEMONIC_SEED);
    }

    /// Test Vector 2: keyed account derived from the same mnemonic
    #[tokio::test]
    async fn test_vector_2_keyed_account_from_mnemonic() {
        let material = KeyMaterial::mnemonic(MNEMONIC).unwrap();
        let mut account =
            KeyedAccount::new(material, fixtures::RAW_ADDRESS, fixtures::STATE_INIT_B64).unwrap();
        assert!(account.public_key().is_err());

        account.init(Duration::from_secs(120)).await.unwrap();
        assert_eq!(hex::encode(account.public_key().unwrap()), MNEMONIC_PUBLIC_KEY);
        assert_eq!(account.address().unwrap(), fixtures::RAW_ADDRESS);

        // second init is a no-op even though the material is gone
        account.init(Duration::from_secs(1)).await.unwrap();
        assert!(account.is_initialized());
    }

    /// Test Vector 3: raw seed material skips the mnemonic stretch
    #[tokio::test]
    async fn test_vector_3_seed_account() {
        let mut account = fixtures::keyed_account();
        account.init(Duration::from_secs(5)).await.unwrap();
        assert_eq!(hex::encode(account.public_key().unwrap()), fixtures::SEED_PUBLIC_KEY_HEX);
        assert_eq!(
            account.serialized_state().unwrap(),
            b64::decode(fixtures::STATE_INIT_B64).unwrap()
        );

        account.close(Duration::from_secs(1)).await.unwrap();
        assert!(!account.is_initialized());
    }

    /// Test Vector 4: proof message digests
    #[test]
    fn test_vector_4_proof_digests() {
        let message = build_message(&vector_address(), "example.com", 1_700_000_000, b"challenge");
        assert_eq!(message.len(), 86);
        assert_eq!(hex::encode(inner_hash(&message)), PROOF_INNER_HASH);
        assert_eq!(hex::encode(signing_hash(&message)), PROOF_SIGNING_HASH);

        let masterchain = AccountAddress::new(-1, [0x11; 32]);
        let message = build_message(&masterchain, "example.com", 1_700_000_000, b"challenge");
        assert_eq!(hex::encode(inner_hash(&message)), MASTERCHAIN_INNER_HASH);
    }

    /// Test Vector 5: ed25519 signatures are deterministic, so the proof
    /// signature is fixed for a given key and message
    #[test]
    fn test_vector_5_proof_signature() {
        let item = ProofItem {
            proof: TonProof {
                timestamp: 1_700_000_000,
                domain: ProofDomain {
                    length_bytes: 11,
                    value: "example.com".into(),
                },
                signature: PROOF_SIGNATURE.into(),
                payload: "challenge".into(),
            },
        };
        let public_key: [u8; 32] = hex::decode(MNEMONIC_PUBLIC_KEY).unwrap().try_into().unwrap();
        assert!(verify(&item, &vector_address(), &public_key));

        let mut later = item.clone();
        later.proof.timestamp += 1;
        assert!(!verify(&later, &vector_address(), &public_key));
    }

    /// Test Vector 6: user-friendly address forms
    #[test]
    fn test_vector_6_friendly_addresses() {
        let address = vector_address();
        let bounceable = "EQAREREREREREREREREREREREREREREREREREREREREREeYT";
        let non_bounceable = "UQAREREREREREREREREREREREREREREREREREREREREREbvW";

        assert_eq!(address.to_friendly(true, false), bounceable);
        assert_eq!(address.to_friendly(false, false), non_bounceable);
        assert_eq!(
            AccountAddress::new(-1, [0x11; 32]).to_friendly(true, false),
            "Ef8RERERERERERERERERERERERERERERERERERERERERERlb"
        );

        assert_eq!(bounceable.parse::<AccountAddress>().unwrap(), address);
        assert_eq!(non_bounceable.parse::<AccountAddress>().unwrap(), address);
        assert_eq!(
            fixtures::RAW_ADDRESS.parse::<AccountAddress>().unwrap(),
            address
        );

        // flipping a checksum character is caught
        let corrupted = bounceable.replace("eYT", "eYU");
        assert!(corrupted.parse::<AccountAddress>().is_err());
    }
}
