//! Property-based tests for the erasure codec: arbitrary payloads and
//! arbitrary erasure patterns should always round-trip as long as at least
//! `DATA_SHARDS` shards survive.

use proptest::prelude::*;

use shardmesh::codec::{Codec, DATA_SHARDS, TOTAL_SHARDS};

proptest! {
    #[test]
    fn roundtrip_without_loss(data in prop::collection::vec(any::<u8>(), 0..8192)) {
        let codec = Codec::new();
        let shards = codec.encode(&data).unwrap();
        let slots: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        let decoded = codec.decode(slots, data.len()).unwrap();
        prop_assert_eq!(decoded, data);
    }

    #[test]
    fn roundtrip_tolerates_any_two_missing_shards(
        data in prop::collection::vec(any::<u8>(), 1..8192),
        drop_a in 0..TOTAL_SHARDS,
        drop_b in 0..TOTAL_SHARDS,
    ) {
        prop_assume!(drop_a != drop_b);
        let codec = Codec::new();
        let shards = codec.encode(&data).unwrap();
        let mut slots: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        slots[drop_a] = None;
        slots[drop_b] = None;
        let decoded = codec.decode(slots, data.len()).unwrap();
        prop_assert_eq!(decoded, data);
    }

    #[test]
    fn three_missing_shards_is_unrecoverable(
        data in prop::collection::vec(any::<u8>(), 1..4096),
    ) {
        let codec = Codec::new();
        let shards = codec.encode(&data).unwrap();
        let mut slots: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        for slot in slots.iter_mut().take(TOTAL_SHARDS - DATA_SHARDS + 1) {
            *slot = None;
        }
        prop_assert!(codec.decode(slots, data.len()).is_err());
    }
}
