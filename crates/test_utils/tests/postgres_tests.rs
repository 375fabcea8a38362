//! PostgreSQL Store Tests
//!
//! Runs the bill service against the Postgres adapters in a throwaway
//! container. These tests need docker and are ignored by default:
//!
//! ```bash
//! cargo test -p test_utils --test postgres_tests -- --ignored
//! ```

use std::sync::Arc;

use rust_decimal_macros::dec;

use core_kernel::{AdapterHealth, BillId, Currency, HealthCheckable, TripId};
use domain_bills::{BillError, BillService, ReceiptUpload};
use infra_db::{PostgresBillStore, PostgresTripDirectory};
use test_utils::{
    assert_money_eq, assert_net_balance, assert_split_mismatch, assert_splits_match_items,
    assert_totals_consistent, db_test, ConfirmRequestBuilder, ReceiptFixtures, TestDatabase,
    TripFixture,
};

fn service(db: &TestDatabase) -> (BillService, Arc<PostgresBillStore>) {
    let store = Arc::new(PostgresBillStore::new(db.pool().clone()));
    let service = BillService::new(
        store.clone(),
        Arc::new(PostgresTripDirectory::new(db.pool().clone())),
        Currency::USD,
    );
    (service, store)
}

async fn seeded(db: &TestDatabase) -> (BillService, Arc<PostgresBillStore>, TripFixture, BillId) {
    let trip = TripFixture::new();
    db.seed_trip(&trip).await.expect("seed trip");
    let (service, store) = service(db);
    let bill = service
        .create_bill_shell(trip.alice, trip.trip_id, "Dinner".into(), None, Some(Currency::USD))
        .await
        .expect("bill shell");
    (service, store, trip, bill.id)
}

db_test!(test_confirm_persists_full_state, |db| {
    let (service, _, trip, bill_id) = seeded(&db).await;
    let request = ConfirmRequestBuilder::for_trip(&trip)
        .with_tax_rate(dec!(6))
        .with_even_item("Ramen", dec!(2), dec!(10.00), &[trip.alice, trip.bob])
        .with_even_item("Dessert", dec!(1), dec!(10.01), &[trip.alice, trip.bob, trip.carol])
        .build();

    let confirmed = service.confirm_bill(trip.alice, bill_id, request.clone()).await.unwrap();
    assert_eq!(confirmed, bill_id);

    let record = service.get_bill(trip.alice, bill_id).await.unwrap();
    assert_eq!(record.items.len(), 2);
    assert_eq!(record.participants.len(), 3);
    assert_eq!(record.splits.len(), 5);
    assert_eq!(record.items[0].temp_item_id, request.items[0].temp_item_id);
    assert_money_eq(&record.items[0].total_price, dec!(21.20), Currency::USD);
    assert_splits_match_items(&record);
    assert_totals_consistent(&record);
});

db_test!(test_reconfirm_replaces_children, |db| {
    let (service, _, trip, bill_id) = seeded(&db).await;
    let first = ConfirmRequestBuilder::for_trip(&trip)
        .with_even_item("A", dec!(1), dec!(5.00), &[trip.alice])
        .with_even_item("B", dec!(1), dec!(6.00), &[trip.bob])
        .with_even_item("C", dec!(1), dec!(7.00), &[trip.carol])
        .build();
    service.confirm_bill(trip.alice, bill_id, first).await.unwrap();

    let second = ConfirmRequestBuilder::new(trip.trip_id, trip.alice)
        .with_participant(trip.alice, "Alice")
        .with_even_item("Only", dec!(1), dec!(9.00), &[trip.alice])
        .build();
    service.confirm_bill(trip.alice, bill_id, second).await.unwrap();

    assert_eq!(db.count_rows("bill_items").await.unwrap(), 1);
    assert_eq!(db.count_rows("participants").await.unwrap(), 1);
    assert_eq!(db.count_rows("splits").await.unwrap(), 1);
    let record = service.get_bill(trip.alice, bill_id).await.unwrap();
    assert_money_eq(&record.bill.totals.total_amount, dec!(9.00), Currency::USD);
});

db_test!(test_split_mismatch_keeps_previous_state, |db| {
    let (service, _, trip, bill_id) = seeded(&db).await;
    let good = ConfirmRequestBuilder::for_trip(&trip)
        .with_even_item("Set meal", dec!(1), dec!(20.00), &[trip.alice])
        .build();
    service.confirm_bill(trip.alice, bill_id, good).await.unwrap();
    let before = service.get_bill(trip.alice, bill_id).await.unwrap();

    let bad = ConfirmRequestBuilder::for_trip(&trip)
        .with_shared_item("Set meal", dec!(1), dec!(20.00), &[(trip.alice, dec!(19.99))])
        .build();
    assert_split_mismatch(service.confirm_bill(trip.alice, bill_id, bad).await, dec!(-0.01));

    let after = service.get_bill(trip.alice, bill_id).await.unwrap();
    assert_eq!(before, after);
});

db_test!(test_delete_cascades, |db| {
    let (service, _, trip, bill_id) = seeded(&db).await;
    let request = ConfirmRequestBuilder::for_trip(&trip)
        .with_even_item("Taxi", dec!(1), dec!(30.00), &trip.member_ids())
        .build();
    service.confirm_bill(trip.alice, bill_id, request).await.unwrap();
    service
        .attach_receipt(
            trip.alice,
            bill_id,
            ReceiptUpload {
                image_url: None,
                raw_ocr_text: None,
                parsed: ReceiptFixtures::sushi_receipt(),
            },
        )
        .await
        .unwrap();

    service.delete_bill(trip.alice, bill_id).await.unwrap();

    for table in ["bills", "bill_items", "participants", "splits", "receipts"] {
        assert_eq!(db.count_rows(table).await.unwrap(), 0, "{} not empty", table);
    }
    assert!(matches!(
        service.get_bill(trip.alice, bill_id).await,
        Err(BillError::NotFound { .. })
    ));
});

db_test!(test_receipt_is_replaced, |db| {
    let (service, store, trip, bill_id) = seeded(&db).await;
    let upload = |parsed| ReceiptUpload {
        image_url: Some("https://receipts.example.com/1.jpg".into()),
        raw_ocr_text: None,
        parsed,
    };

    let (first, draft) = service
        .attach_receipt(trip.alice, bill_id, upload(ReceiptFixtures::sushi_receipt()))
        .await
        .unwrap();
    assert_eq!(draft.items().len(), 2);
    let (second, _) = service
        .attach_receipt(trip.alice, bill_id, upload(ReceiptFixtures::empty_receipt()))
        .await
        .unwrap();

    assert_ne!(first, second);
    assert_eq!(db.count_rows("receipts").await.unwrap(), 1);
    let stored = store.receipt(bill_id).await.unwrap().expect("receipt");
    assert_eq!(stored.id, second);
    assert!(stored.parsed.items.is_empty());
});

db_test!(test_balances_over_trip, |db| {
    let (service, _, trip, bill_id) = seeded(&db).await;
    let dinner = ConfirmRequestBuilder::for_trip(&trip)
        .with_tax_rate(dec!(6))
        .with_even_item("Ramen", dec!(2), dec!(10.00), &[trip.alice, trip.bob])
        .build();
    service.confirm_bill(trip.alice, bill_id, dinner).await.unwrap();

    let taxi = service
        .create_bill_shell(trip.bob, trip.trip_id, "Taxi".into(), None, Some(Currency::USD))
        .await
        .unwrap();
    let ride = ConfirmRequestBuilder::for_trip(&trip)
        .paid_by(trip.bob)
        .with_even_item("Ride", dec!(1), dec!(9.00), &trip.member_ids())
        .build();
    service.confirm_bill(trip.bob, taxi.id, ride).await.unwrap();

    let sheet = service.trip_balances(trip.carol, trip.trip_id).await.unwrap();
    assert_money_eq(&sheet.balance_of(trip.alice), dec!(7.60), Currency::USD);
    assert_money_eq(&sheet.balance_of(trip.bob), dec!(-4.60), Currency::USD);
    assert_money_eq(&sheet.balance_of(trip.carol), dec!(-3.00), Currency::USD);
    assert_net_balance(&sheet, dec!(0));

    let listed = service.list_trip_bills(trip.alice, trip.trip_id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, taxi.id);
});

db_test!(test_reads_see_one_confirmed_state, |db| {
    let (service, _, trip, bill_id) = seeded(&db).await;
    let alice_pays = ConfirmRequestBuilder::for_trip(&trip)
        .with_even_item("Ramen", dec!(2), dec!(10.00), &[trip.alice, trip.bob])
        .with_even_item("Tea", dec!(3), dec!(1.10), &trip.member_ids())
        .build();
    let bob_pays = ConfirmRequestBuilder::for_trip(&trip)
        .paid_by(trip.bob)
        .with_tax_rate(dec!(6))
        .with_even_item("Hotpot", dec!(1), dec!(45.50), &trip.member_ids())
        .build();
    service.confirm_bill(trip.alice, bill_id, alice_pays.clone()).await.unwrap();

    for round in 0..20 {
        let request = if round % 2 == 0 { bob_pays.clone() } else { alice_pays.clone() };
        let (confirmed, sheet, record) = tokio::join!(
            service.confirm_bill(trip.alice, bill_id, request),
            service.trip_balances(trip.alice, trip.trip_id),
            service.get_bill(trip.alice, bill_id),
        );
        confirmed.unwrap();
        assert_net_balance(&sheet.unwrap(), dec!(0));
        let record = record.unwrap();
        assert_splits_match_items(&record);
        assert_totals_consistent(&record);
    }
});

db_test!(test_outsider_is_forbidden, |db| {
    let (service, _, trip, bill_id) = seeded(&db).await;
    let outsider = TripFixture::new().alice;
    assert!(matches!(
        service.get_bill(outsider, bill_id).await,
        Err(BillError::Forbidden(_))
    ));
    assert!(matches!(
        service.trip_balances(outsider, trip.trip_id).await,
        Err(BillError::Forbidden(_))
    ));
});

db_test!(test_shell_for_unknown_trip_is_forbidden, |db| {
    let (service, _) = service(&db);
    let result = service
        .create_bill_shell(TripFixture::new().alice, TripId::new(), "Lunch".into(), None, None)
        .await;
    assert!(matches!(result, Err(BillError::Forbidden(_))));
});

db_test!(test_adapters_report_healthy, |db| {
    let store = PostgresBillStore::new(db.pool().clone());
    let trips = PostgresTripDirectory::new(db.pool().clone());
    assert_eq!(store.health_check().await.status, AdapterHealth::Healthy);
    assert_eq!(trips.health_check().await.status, AdapterHealth::Healthy);
});
