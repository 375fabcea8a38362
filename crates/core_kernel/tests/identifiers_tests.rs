//! Unit tests for the Identifiers module

use core_kernel::{
    TripId, UserId, BillId, BillItemId, ParticipantId, SplitId, ReceiptId, TempItemId,
};
use std::collections::BTreeSet;
use uuid::Uuid;

mod typed_ids {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        assert_ne!(BillId::new(), BillId::new());
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = BillItemId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = BillItemId::new_v7();
        assert!(id1 < id2);
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(TripId::prefix(), "TRP");
        assert_eq!(UserId::prefix(), "USR");
        assert_eq!(BillId::prefix(), "BIL");
        assert_eq!(BillItemId::prefix(), "ITM");
        assert_eq!(ParticipantId::prefix(), "PRT");
        assert_eq!(SplitId::prefix(), "SPL");
        assert_eq!(ReceiptId::prefix(), "RCP");
    }

    #[test]
    fn test_from_str_with_and_without_prefix() {
        let original = UserId::new();
        let with_prefix: UserId = original.to_string().parse().unwrap();
        let without: UserId = original.as_uuid().to_string().parse().unwrap();
        assert_eq!(original, with_prefix);
        assert_eq!(original, without);
    }

    #[test]
    fn test_from_str_rejects_garbage() {
        assert!("USR-not-a-uuid".parse::<UserId>().is_err());
    }

    #[test]
    fn test_serde_is_transparent() {
        let uuid = Uuid::new_v4();
        let id = SplitId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }

    #[test]
    fn test_ids_are_ordered_for_btree_keys() {
        let set: BTreeSet<UserId> = (0..5).map(|_| UserId::new()).collect();
        assert_eq!(set.len(), 5);
    }
}

mod temp_item_ids {
    use super::*;

    #[test]
    fn test_temp_ids_are_opaque_strings() {
        let id = TempItemId::new("item-1");
        assert_eq!(id.as_str(), "item-1");
        assert_eq!(id.to_string(), "item-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"item-1\"");
    }

    #[test]
    fn test_generated_temp_ids_are_unique() {
        assert_ne!(TempItemId::generate(), TempItemId::generate());
    }
}
