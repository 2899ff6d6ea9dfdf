mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn entree_creates_stock_and_one_ledger_row() {
    let app = TestApp::new().await;
    let w = app.seed_world().await;
    assert_eq!(app.stock_quantity(w.loc_a.id, w.card_x.id).await, 0);

    let (status, body) = app
        .send(
            Method::POST,
            "/movements",
            Some(json!({
                "type": "ENTREE",
                "userId": w.user.id,
                "destinationLocationId": w.loc_a.id,
                "items": [{ "cardTypeId": w.card_x.id, "quantity": 100 }]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["success"], true);
    assert!(body["data"]["reference_number"]
        .as_str()
        .unwrap()
        .starts_with("ENT-"));
    let rows = body["data"]["movements"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["type"], "ENTREE");
    assert_eq!(rows[0]["locationId"], w.loc_a.id.to_string());
    assert_eq!(rows[0]["quantity"], 100);
    assert!(rows[0]["destLocationId"].is_null());

    assert_eq!(app.stock_quantity(w.loc_a.id, w.card_x.id).await, 100);
    assert_eq!(app.movement_count().await, 1);
    app.assert_consistent(w.loc_a.id, w.card_x.id).await;
}

#[tokio::test]
async fn sortie_beyond_available_fails_without_side_effects() {
    let app = TestApp::new().await;
    let w = app.seed_world().await;
    app.stock_in(&w, w.loc_a.id, w.card_x.id, 100).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/movements",
            Some(json!({
                "type": "SORTIE",
                "userId": w.user.id,
                "sourceLocationId": w.loc_a.id,
                "items": [{ "cardTypeId": w.card_x.id, "quantity": 150 }]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert_eq!(body["details"]["available"], 100);
    assert_eq!(body["details"]["requested"], 150);
    assert_eq!(body["details"]["cardTypeId"], w.card_x.id.to_string());
    assert_eq!(body["details"]["itemIndex"], 0);
    assert!(body["message"].as_str().unwrap().contains("Insufficient stock"));

    assert_eq!(app.stock_quantity(w.loc_a.id, w.card_x.id).await, 100);
    assert_eq!(app.movement_count().await, 1);
}

#[tokio::test]
async fn transfer_moves_cards_between_locations() {
    let app = TestApp::new().await;
    let w = app.seed_world().await;
    app.stock_in(&w, w.loc_a.id, w.card_x.id, 100).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/movements",
            Some(json!({
                "type": "TRANSFERT",
                "userId": w.user.id,
                "sourceLocationId": w.loc_a.id,
                "destinationLocationId": w.loc_b.id,
                "items": [{ "cardTypeId": w.card_x.id, "quantity": 40 }]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    let row = &body["data"]["movements"][0];
    assert_eq!(row["type"], "TRANSFERT");
    assert_eq!(row["locationId"], w.loc_a.id.to_string());
    assert_eq!(row["destLocationId"], w.loc_b.id.to_string());
    assert_eq!(row["quantity"], 40);

    assert_eq!(app.stock_quantity(w.loc_a.id, w.card_x.id).await, 60);
    assert_eq!(app.stock_quantity(w.loc_b.id, w.card_x.id).await, 40);
    app.assert_consistent(w.loc_a.id, w.card_x.id).await;
    app.assert_consistent(w.loc_b.id, w.card_x.id).await;
}

#[tokio::test]
async fn failing_item_rolls_back_the_whole_batch() {
    let app = TestApp::new().await;
    let w = app.seed_world().await;
    app.stock_in(&w, w.loc_a.id, w.card_x.id, 100).await;
    app.stock_in(&w, w.loc_a.id, w.card_y.id, 10).await;
    let before = app.movement_count().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/movements",
            Some(json!({
                "type": "SORTIE",
                "userId": w.user.id,
                "sourceLocationId": w.loc_a.id,
                "items": [
                    { "cardTypeId": w.card_x.id, "quantity": 50 },
                    { "cardTypeId": w.card_y.id, "quantity": 9999 }
                ]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert_eq!(body["details"]["itemIndex"], 1);
    assert_eq!(app.stock_quantity(w.loc_a.id, w.card_x.id).await, 100);
    assert_eq!(app.stock_quantity(w.loc_a.id, w.card_y.id).await, 10);
    assert_eq!(app.movement_count().await, before);
}

#[tokio::test]
async fn multi_item_entree_shares_one_reference() {
    let app = TestApp::new().await;
    let w = app.seed_world().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/movements",
            Some(json!({
                "type": "ENTREE",
                "userId": w.user.id,
                "destinationLocationId": w.loc_b.id,
                "referenceNumber": "BL-2024-118",
                "notes": "delivery from printer",
                "items": [
                    { "cardTypeId": w.card_x.id, "quantity": 5 },
                    { "cardTypeId": w.card_y.id, "quantity": 7 },
                    { "cardTypeId": w.card_x.id, "quantity": 3 }
                ]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["reference_number"], "BL-2024-118");
    let rows = body["data"]["movements"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r["referenceNumber"] == "BL-2024-118"));
    assert_eq!(app.stock_quantity(w.loc_b.id, w.card_x.id).await, 8);
    assert_eq!(app.stock_quantity(w.loc_b.id, w.card_y.id).await, 7);
}

#[tokio::test]
async fn missing_or_identical_locations_are_rejected() {
    let app = TestApp::new().await;
    let w = app.seed_world().await;
    let item = json!([{ "cardTypeId": w.card_x.id, "quantity": 1 }]);

    let cases = [
        json!({ "type": "ENTREE", "userId": w.user.id, "sourceLocationId": w.loc_a.id, "items": item }),
        json!({ "type": "SORTIE", "userId": w.user.id, "destinationLocationId": w.loc_a.id, "items": item }),
        json!({ "type": "TRANSFERT", "userId": w.user.id, "sourceLocationId": w.loc_a.id, "items": item }),
        json!({
            "type": "TRANSFERT",
            "userId": w.user.id,
            "sourceLocationId": w.loc_a.id,
            "destinationLocationId": w.loc_a.id,
            "items": item
        }),
    ];

    for payload in cases {
        let (status, body) = app.send(Method::POST, "/movements", Some(payload.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload} -> {body}");
        assert!(body["message"].is_string());
    }
    assert_eq!(app.movement_count().await, 0);
}

#[tokio::test]
async fn entree_ignores_a_source_location() {
    let app = TestApp::new().await;
    let w = app.seed_world().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/movements",
            Some(json!({
                "type": "ENTREE",
                "userId": w.user.id,
                "sourceLocationId": w.loc_b.id,
                "destinationLocationId": w.loc_a.id,
                "items": [{ "cardTypeId": w.card_x.id, "quantity": 12 }]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["movements"][0]["locationId"], w.loc_a.id.to_string());
    assert_eq!(app.stock_quantity(w.loc_a.id, w.card_x.id).await, 12);
    assert_eq!(app.stock_quantity(w.loc_b.id, w.card_x.id).await, 0);
}

#[tokio::test]
async fn malformed_items_are_validation_errors() {
    let app = TestApp::new().await;
    let w = app.seed_world().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/movements",
            Some(json!({
                "type": "ENTREE",
                "userId": w.user.id,
                "destinationLocationId": w.loc_a.id,
                "items": [
                    { "cardTypeId": w.card_x.id, "quantity": 0 },
                    { "cardTypeId": w.card_y.id, "quantity": -4 }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body["details"]["items[0].quantity"].is_array());
    assert!(body["details"]["items[1].quantity"].is_array());

    let (status, body) = app
        .send(
            Method::POST,
            "/movements",
            Some(json!({
                "type": "ENTREE",
                "userId": w.user.id,
                "destinationLocationId": w.loc_a.id,
                "items": []
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body["details"]["items"].is_array());

    let (status, _) = app
        .send(
            Method::POST,
            "/movements",
            Some(json!({
                "type": "ENTREE",
                "userId": w.user.id,
                "destinationLocationId": w.loc_a.id,
                "items": [{ "cardTypeId": w.card_x.id, "quantity": 2.5 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::POST,
            "/movements",
            Some(json!({
                "type": "RECYCLAGE",
                "userId": w.user.id,
                "items": [{ "cardTypeId": w.card_x.id, "quantity": 1 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.send_raw(Method::POST, "/movements", "{\"type\":").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");

    assert_eq!(app.movement_count().await, 0);
}

#[tokio::test]
async fn unknown_references_are_not_found_and_roll_back() {
    let app = TestApp::new().await;
    let w = app.seed_world().await;
    let ghost = Uuid::new_v4();

    let (status, body) = app
        .send(
            Method::POST,
            "/movements",
            Some(json!({
                "type": "ENTREE",
                "userId": w.user.id,
                "destinationLocationId": w.loc_a.id,
                "items": [
                    { "cardTypeId": w.card_x.id, "quantity": 5 },
                    { "cardTypeId": ghost, "quantity": 5 }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");
    assert!(body["message"].as_str().unwrap().contains(&ghost.to_string()));
    assert_eq!(app.stock_quantity(w.loc_a.id, w.card_x.id).await, 0);

    let (status, _) = app
        .send(
            Method::POST,
            "/movements",
            Some(json!({
                "type": "ENTREE",
                "userId": w.user.id,
                "destinationLocationId": ghost,
                "items": [{ "cardTypeId": w.card_x.id, "quantity": 5 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            Method::POST,
            "/movements",
            Some(json!({
                "type": "ENTREE",
                "userId": ghost,
                "destinationLocationId": w.loc_a.id,
                "items": [{ "cardTypeId": w.card_x.id, "quantity": 5 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.movement_count().await, 0);
}

#[tokio::test]
async fn list_joins_user_and_filters() {
    let app = TestApp::new().await;
    let w = app.seed_world().await;
    app.stock_in(&w, w.loc_a.id, w.card_x.id, 30).await;
    app.stock_in(&w, w.loc_b.id, w.card_y.id, 20).await;
    let (status, _) = app
        .send(
            Method::POST,
            "/movements",
            Some(json!({
                "type": "SORTIE",
                "userId": w.user.id,
                "sourceLocationId": w.loc_a.id,
                "items": [{ "cardTypeId": w.card_x.id, "quantity": 4 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.send(Method::GET, "/movements", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["type"], "SORTIE");
    assert_eq!(rows[0]["user"]["email"], w.user.email);

    let (_, body) = app.send(Method::GET, "/movements?type=SORTIE", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let uri = format!("/api/v1/movements?locationId={}", w.loc_b.id);
    let (_, body) = app.send(Method::GET, &uri, None).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["cardTypeId"], w.card_y.id.to_string());

    let (_, body) = app.send(Method::GET, "/movements?limit=2", None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, _) = app.send(Method::GET, "/movements?locationId=nope", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reconciliation_endpoint_reports_balance() {
    let app = TestApp::new().await;
    let w = app.seed_world().await;
    app.stock_in(&w, w.loc_a.id, w.card_x.id, 80).await;
    app.send(
        Method::POST,
        "/movements",
        Some(json!({
            "type": "TRANSFERT",
            "userId": w.user.id,
            "sourceLocationId": w.loc_a.id,
            "destinationLocationId": w.loc_b.id,
            "items": [{ "cardTypeId": w.card_x.id, "quantity": 30 }]
        })),
    )
    .await;

    let uri = format!(
        "/movements/reconciliation?locationId={}&cardTypeId={}",
        w.loc_a.id, w.card_x.id
    );
    let (status, body) = app.send(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ledgerBalance"], 50);
    assert_eq!(body["stockQuantity"], 50);
    assert_eq!(body["consistent"], true);
    assert_eq!(body["movementCount"], 2);
}

#[tokio::test]
async fn request_id_is_echoed_in_header_and_error_body() {
    let app = TestApp::new().await;

    let response = app
        .request_with_headers(
            Method::PATCH,
            "/api/v1/movements",
            Some(json!({ "id": Uuid::new_v4(), "notes": "x" })),
            &[("x-request-id", "trace-42")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "trace-42"
    );
    let body = common::body_json(response).await;
    assert_eq!(body["request_id"], "trace-42");
}
