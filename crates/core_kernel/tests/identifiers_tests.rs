//! Identifier parsing and conversion tests

use core_kernel::{ClaimId, EventId, PartyId, PolicyId};
use proptest::prelude::*;
use uuid::Uuid;

#[test]
fn test_prefixes_are_distinct() {
    let prefixes = [
        ClaimId::prefix(),
        PolicyId::prefix(),
        PartyId::prefix(),
        EventId::prefix(),
    ];
    for (i, a) in prefixes.iter().enumerate() {
        for b in prefixes.iter().skip(i + 1) {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_wrong_prefix_is_rejected() {
    let claim = ClaimId::new();
    let as_policy = claim.to_string().parse::<PolicyId>();
    assert!(as_policy.is_err());
}

#[test]
fn test_v7_ids_are_time_ordered() {
    let first = ClaimId::new_v7();
    let second = ClaimId::new_v7();
    assert!(first <= second);
}

proptest! {
    #[test]
    fn prop_uuid_roundtrip(bytes in any::<[u8; 16]>()) {
        let uuid = Uuid::from_bytes(bytes);
        let id = ClaimId::from(uuid);
        let parsed: ClaimId = id.to_string().parse().unwrap();
        prop_assert_eq!(Uuid::from(parsed), uuid);
    }
}
