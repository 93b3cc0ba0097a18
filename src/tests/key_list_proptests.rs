//! Threshold keys: satisfaction depends only on how many members signed

use once_cell::sync::Lazy;
use proptest::prelude::*;

use crate::crypto::{Key, KeyList, PrivateKey, SignatureMap};

const MEMBERS: usize = 6;

static KEYS: Lazy<Vec<PrivateKey>> = Lazy::new(|| (0..MEMBERS).map(|_| PrivateKey::generate_ed25519()).collect());

fn signatures_from(signers: &[bool]) -> SignatureMap {
    let mut signatures = SignatureMap::new();
    for (key, signed) in KEYS.iter().zip(signers) {
        if *signed {
            let signature = key.sign_bytes(b"body").unwrap();
            signatures.insert(key.public_key(), signature);
        }
    }
    signatures
}

fn threshold_key(threshold: u32) -> Key {
    KeyList::threshold(KEYS.iter().map(|k| Key::from(k.public_key())).collect(), threshold)
        .unwrap()
        .into()
}

proptest! {
    #[test]
    fn prop_threshold_matches_signer_count(
        threshold in 1u32..=MEMBERS as u32,
        signers in proptest::collection::vec(any::<bool>(), MEMBERS),
    ) {
        let key = threshold_key(threshold);
        let count = signers.iter().filter(|s| **s).count() as u32;
        prop_assert_eq!(key.is_satisfied_by(&signatures_from(&signers)), count >= threshold);
    }

    #[test]
    fn prop_adding_signatures_keeps_key_satisfied(
        threshold in 1u32..=MEMBERS as u32,
        signers in proptest::collection::vec(any::<bool>(), MEMBERS),
        extra in 0..MEMBERS,
    ) {
        let key = threshold_key(threshold);
        let mut more = signers.clone();
        more[extra] = true;

        if key.is_satisfied_by(&signatures_from(&signers)) {
            prop_assert!(key.is_satisfied_by(&signatures_from(&more)));
        }
    }

    #[test]
    fn prop_nested_list_needs_every_member(
        signers in proptest::collection::vec(any::<bool>(), MEMBERS),
    ) {
        // All of (2-of-first-three, 1-of-last-three).
        let first = KeyList::threshold(KEYS[..3].iter().map(|k| Key::from(k.public_key())).collect(), 2).unwrap();
        let last = KeyList::threshold(KEYS[3..].iter().map(|k| Key::from(k.public_key())).collect(), 1).unwrap();
        let key: Key = KeyList::all(vec![first.into(), last.into()]).into();

        let head = signers[..3].iter().filter(|s| **s).count();
        let tail = signers[3..].iter().filter(|s| **s).count();
        prop_assert_eq!(key.is_satisfied_by(&signatures_from(&signers)), head >= 2 && tail >= 1);
    }
}
