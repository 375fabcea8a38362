//! API Tests
//!
//! Drives the router end to end over the in-memory ports: authentication,
//! the shell/draft/confirm lifecycle, error bodies, receipts, recompute and
//! trip balances.

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use core_kernel::{BillId, Currency, UserId};
use domain_bills::ports::mock::{InMemoryBillStore, InMemoryTripDirectory};
use domain_bills::{BillService, ConfirmBillRequest};
use interface_api::{auth::create_token, config::ApiConfig, create_router};
use test_utils::{ConfirmRequestBuilder, ReceiptFixtures, TripFixture};

struct TestApp {
    server: TestServer,
    store: Arc<InMemoryBillStore>,
    trip: TripFixture,
    config: ApiConfig,
}

impl TestApp {
    async fn new() -> Self {
        let trip = TripFixture::new();
        let trips = Arc::new(InMemoryTripDirectory::new());
        for (user, _) in trip.members() {
            trips.add_member(trip.trip_id, user, user == trip.alice).await;
        }
        let store = Arc::new(InMemoryBillStore::new());
        let config = ApiConfig::default();
        let service = BillService::new(store.clone(), trips, Currency::USD);
        let server = TestServer::new(create_router(service, config.clone())).unwrap();

        Self {
            server,
            store,
            trip,
            config,
        }
    }

    fn bearer(&self, user: UserId) -> HeaderValue {
        let token = create_token(user, None, &self.config.jwt_secret, 3600).unwrap();
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
    }

    async fn create_bill(&self, user: UserId) -> BillId {
        let response = self
            .server
            .post("/api/v1/bills")
            .add_header(AUTHORIZATION, self.bearer(user))
            .json(&json!({ "tripId": self.trip.trip_id, "title": "Dinner", "currency": "USD" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        serde_json::from_value(body["id"].clone()).unwrap()
    }

    async fn confirm(&self, user: UserId, bill_id: BillId, request: &ConfirmBillRequest) -> TestResponse {
        self.server
            .put(&format!("/api/v1/bills/{}/confirm", bill_id.as_uuid()))
            .add_header(AUTHORIZATION, self.bearer(user))
            .json(request)
            .await
    }
}

fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .map(|s| s.parse().unwrap())
        .unwrap_or_else(|| panic!("expected a decimal string, got {value}"))
}

// ============= HEALTH AND AUTH =============
mod health_and_auth {
    use super::*;

    #[tokio::test]
    async fn test_liveness_needs_no_token() {
        let app = TestApp::new().await;
        let response = app.server.get("/health").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["status"], "healthy");
    }

    #[tokio::test]
    async fn test_readiness_reports_store_outage() {
        let app = TestApp::new().await;
        app.server.get("/health/ready").await.assert_status_ok();

        app.store.set_unavailable(true);
        let response = app.server.get("/health/ready").await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = response.json();
        assert_eq!(body["status"], "unavailable");
        assert_eq!(body["adapters"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let app = TestApp::new().await;
        let response = app
            .server
            .get(&format!("/api/v1/trips/{}/balances", app.trip.trip_id.as_uuid()))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_token_with_wrong_secret_is_unauthorized() {
        let app = TestApp::new().await;
        let token = create_token(app.trip.alice, None, "not-the-secret", 3600).unwrap();
        app.server
            .get(&format!("/api/v1/trips/{}/bills", app.trip.trip_id.as_uuid()))
            .add_header(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_outsider_is_forbidden() {
        let app = TestApp::new().await;
        let bill_id = app.create_bill(app.trip.alice).await;
        let outsider = UserId::new();

        let response = app
            .server
            .get(&format!("/api/v1/bills/{}", bill_id.as_uuid()))
            .add_header(AUTHORIZATION, app.bearer(outsider))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(response.json::<Value>()["error"], "forbidden");
    }
}

// ============= BILL LIFECYCLE =============
mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_shell_draft_confirm() {
        let app = TestApp::new().await;
        let trip = app.trip;
        let bill_id = app.create_bill(trip.alice).await;

        let response = app
            .server
            .get(&format!("/api/v1/bills/{}/draft", bill_id.as_uuid()))
            .add_header(AUTHORIZATION, app.bearer(trip.bob))
            .await;
        response.assert_status_ok();
        let draft: Value = response.json();
        assert_eq!(draft["currency"], "USD");
        assert!(draft["draft"]["items"].as_array().unwrap().is_empty());

        let request = ConfirmRequestBuilder::for_trip(&trip)
            .with_tax_rate(dec!(6))
            .with_even_item("Ramen", dec!(2), dec!(10.00), &[trip.alice, trip.bob])
            .build();
        let response = app.confirm(trip.alice, bill_id, &request).await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["billId"], json!(bill_id));

        let response = app
            .server
            .get(&format!("/api/v1/bills/{}", bill_id.as_uuid()))
            .add_header(AUTHORIZATION, app.bearer(trip.carol))
            .await;
        response.assert_status_ok();
        let bill: Value = response.json();
        assert_eq!(decimal(&bill["totalAmount"]), dec!(21.20));
        assert_eq!(decimal(&bill["tax"]), dec!(1.20));
        assert_eq!(bill["items"][0]["tempItemId"], json!(request.items[0].temp_item_id));
        assert_eq!(bill["splits"].as_array().unwrap().len(), 2);
        assert_eq!(bill["participants"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_reopened_draft_confirms_unchanged() {
        let app = TestApp::new().await;
        let trip = app.trip;
        let bill_id = app.create_bill(trip.alice).await;
        let request = ConfirmRequestBuilder::for_trip(&trip)
            .with_even_item("Dessert", dec!(1), dec!(10.01), &trip.member_ids())
            .build();
        app.confirm(trip.alice, bill_id, &request).await.assert_status_ok();

        let draft: Value = app
            .server
            .get(&format!("/api/v1/bills/{}/draft", bill_id.as_uuid()))
            .add_header(AUTHORIZATION, app.bearer(trip.alice))
            .await
            .json();
        let reopened: ConfirmBillRequest = serde_json::from_value(draft["draft"].clone()).unwrap();
        assert_eq!(reopened.items[0].temp_item_id, request.items[0].temp_item_id);

        app.confirm(trip.alice, bill_id, &reopened).await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_split_mismatch_reports_delta() {
        let app = TestApp::new().await;
        let trip = app.trip;
        let bill_id = app.create_bill(trip.alice).await;
        let request = ConfirmRequestBuilder::for_trip(&trip)
            .with_shared_item("Set meal", dec!(1), dec!(20.00), &[(trip.alice, dec!(19.99))])
            .build();

        let response = app.confirm(trip.alice, bill_id, &request).await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert_eq!(body["error"], "split_mismatch");
        assert_eq!(decimal(&body["details"]["submittedSum"]), dec!(19.99));
        assert_eq!(decimal(&body["details"]["expectedTotal"]), dec!(20.00));
        assert_eq!(decimal(&body["details"]["delta"]), dec!(-0.01));

        let bill: Value = app
            .server
            .get(&format!("/api/v1/bills/{}", bill_id.as_uuid()))
            .add_header(AUTHORIZATION, app.bearer(trip.alice))
            .await
            .json();
        assert!(bill["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_confirm_is_bad_request() {
        let app = TestApp::new().await;
        let bill_id = app.create_bill(app.trip.alice).await;
        let response = app
            .server
            .put(&format!("/api/v1/bills/{}/confirm", bill_id.as_uuid()))
            .add_header(AUTHORIZATION, app.bearer(app.trip.alice))
            .json(&json!({ "title": "missing everything else" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_empty_title_fails_validation() {
        let app = TestApp::new().await;
        let response = app
            .server
            .post("/api/v1/bills")
            .add_header(AUTHORIZATION, app.bearer(app.trip.alice))
            .json(&json!({ "tripId": app.trip.trip_id, "title": "" }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["details"][0]["field"], "title");
    }

    #[tokio::test]
    async fn test_delete_then_not_found() {
        let app = TestApp::new().await;
        let bill_id = app.create_bill(app.trip.alice).await;
        let path = format!("/api/v1/bills/{}", bill_id.as_uuid());

        app.server
            .delete(&path)
            .add_header(AUTHORIZATION, app.bearer(app.trip.alice))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let response = app
            .server
            .get(&path)
            .add_header(AUTHORIZATION, app.bearer(app.trip.alice))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["error"], "not_found");
    }

    #[tokio::test]
    async fn test_store_outage_is_retryable() {
        let app = TestApp::new().await;
        let bill_id = app.create_bill(app.trip.alice).await;
        app.store.set_unavailable(true);

        let response = app
            .server
            .get(&format!("/api/v1/bills/{}", bill_id.as_uuid()))
            .add_header(AUTHORIZATION, app.bearer(app.trip.alice))
            .await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.json::<Value>()["retryable"], true);
    }
}

// ============= RECEIPTS AND RECOMPUTE =============
mod editor {
    use super::*;

    #[tokio::test]
    async fn test_attach_receipt_seeds_draft() {
        let app = TestApp::new().await;
        let bill_id = app.create_bill(app.trip.alice).await;

        let response = app
            .server
            .post(&format!("/api/v1/bills/{}/receipt", bill_id.as_uuid()))
            .add_header(AUTHORIZATION, app.bearer(app.trip.alice))
            .json(&json!({
                "imageUrl": "https://receipts.example.com/r1.jpg",
                "parsed": ReceiptFixtures::sushi_receipt(),
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert!(body["receiptId"].is_string());
        assert_eq!(body["draft"]["merchantName"], "Sushi World");
        let items = body["draft"]["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(decimal(&items[1]["unitPrice"]), dec!(4.00));
        assert!(app.store.receipt(bill_id).await.is_some());
    }

    #[tokio::test]
    async fn test_attach_receipt_rejects_bad_url() {
        let app = TestApp::new().await;
        let bill_id = app.create_bill(app.trip.alice).await;
        let response = app
            .server
            .post(&format!("/api/v1/bills/{}/receipt", bill_id.as_uuid()))
            .add_header(AUTHORIZATION, app.bearer(app.trip.alice))
            .json(&json!({ "imageUrl": "not a url", "parsed": ReceiptFixtures::empty_receipt() }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["details"][0]["field"], "image_url");
    }

    #[tokio::test]
    async fn test_recompute_prices_items() {
        let app = TestApp::new().await;
        let response = app
            .server
            .post("/api/v1/bills/recompute")
            .add_header(AUTHORIZATION, app.bearer(app.trip.alice))
            .json(&json!({
                "items": [
                    { "quantity": "2", "unitPrice": "10.00" },
                    { "quantity": "1", "unitPrice": "5.00", "discount": "1.00" },
                ],
                "taxPercentage": "6",
                "rounding": "0.01",
            }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(decimal(&body["items"][0]["totalPrice"]), dec!(21.20));
        assert_eq!(decimal(&body["items"][1]["totalPrice"]), dec!(4.24));
        assert_eq!(decimal(&body["totals"]["totalAmount"]), dec!(25.45));
        assert_eq!(body["totals"]["currency"], "USD");
    }

    #[tokio::test]
    async fn test_recompute_rejects_oversized_discount() {
        let app = TestApp::new().await;
        app.server
            .post("/api/v1/bills/recompute")
            .add_header(AUTHORIZATION, app.bearer(app.trip.alice))
            .json(&json!({ "items": [{ "quantity": "1", "unitPrice": "5.00", "discount": "6.00" }] }))
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_recompute_rejects_overflowing_quantity() {
        let app = TestApp::new().await;
        let response = app
            .server
            .post("/api/v1/bills/recompute")
            .add_header(AUTHORIZATION, app.bearer(app.trip.alice))
            .json(&json!({ "items": [{ "quantity": Decimal::MAX.to_string(), "unitPrice": "2.00" }] }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["details"][0]["field"], "items[0].quantity");
    }
}

// ============= TRIPS =============
mod trips {
    use super::*;

    #[tokio::test]
    async fn test_balances_and_listing() {
        let app = TestApp::new().await;
        let trip = app.trip;

        let dinner = app.create_bill(trip.alice).await;
        let request = ConfirmRequestBuilder::for_trip(&trip)
            .with_tax_rate(dec!(6))
            .with_even_item("Ramen", dec!(2), dec!(10.00), &[trip.alice, trip.bob])
            .build();
        app.confirm(trip.alice, dinner, &request).await.assert_status_ok();

        let response = app
            .server
            .get(&format!("/api/v1/trips/{}/balances", trip.trip_id.as_uuid()))
            .add_header(AUTHORIZATION, app.bearer(trip.bob))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        let balances = &body["balances"];
        assert_eq!(decimal(&balances[trip.alice.as_uuid().to_string()]), dec!(10.60));
        assert_eq!(decimal(&balances[trip.bob.as_uuid().to_string()]), dec!(-10.60));
        assert_eq!(decimal(&body["net"]), Decimal::ZERO);

        let listed: Value = app
            .server
            .get(&format!("/api/v1/trips/{}/bills", trip.trip_id.as_uuid()))
            .add_header(AUTHORIZATION, app.bearer(trip.carol))
            .await
            .json();
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(decimal(&listed[0]["totalAmount"]), dec!(21.20));
    }

    #[tokio::test]
    async fn test_second_currency_is_rejected() {
        let app = TestApp::new().await;
        app.create_bill(app.trip.alice).await;

        let response = app
            .server
            .post("/api/v1/bills")
            .add_header(AUTHORIZATION, app.bearer(app.trip.bob))
            .json(&json!({ "tripId": app.trip.trip_id, "title": "Satay", "currency": "MYR" }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["details"][0]["field"], "currency");

        app.server
            .get(&format!("/api/v1/trips/{}/balances", app.trip.trip_id.as_uuid()))
            .add_header(AUTHORIZATION, app.bearer(app.trip.bob))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_empty_trip_has_no_balances() {
        let app = TestApp::new().await;
        let body: Value = app
            .server
            .get(&format!("/api/v1/trips/{}/balances", app.trip.trip_id.as_uuid()))
            .add_header(AUTHORIZATION, app.bearer(app.trip.alice))
            .await
            .json();
        assert!(body["balances"].as_object().unwrap().is_empty());
        assert_eq!(body["currency"], "USD");
    }
}
