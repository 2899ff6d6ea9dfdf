mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use cardstock_api::entities::{location, stock};
use common::TestApp;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, SqlErr};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn bank_codes_are_unique() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/banks",
            Some(json!({ "name": "Banque du Nord", "bankCode": "BDN" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["bankCode"], "BDN");

    let (status, _) = app
        .send(
            Method::POST,
            "/banks",
            Some(json!({ "name": "Other", "bankCode": "BDN" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, banks) = app.send(Method::GET, "/banks", None).await;
    assert_eq!(banks.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn locations_and_card_types_require_an_existing_bank() {
    let app = TestApp::new().await;
    let ghost = Uuid::new_v4();

    let (status, _) = app
        .send(
            Method::POST,
            "/locations",
            Some(json!({ "name": "Vault", "bankId": ghost })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            Method::POST,
            "/card-types",
            Some(json!({ "name": "Visa", "bankId": ghost })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(
            Method::POST,
            "/card-types",
            Some(json!({ "name": "Visa", "subType": "Platinum" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert!(body["data"]["bankId"].is_null());
}

#[tokio::test]
async fn user_payloads_are_validated() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/users",
            Some(json!({ "name": "", "email": "not-an-email", "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["email"].is_array());
    assert!(body["details"]["name"].is_array());

    let (status, body) = app
        .send(
            Method::POST,
            "/users",
            Some(json!({ "name": "Awa", "email": "Awa@Example.com", "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["email"], "awa@example.com");

    let (status, _) = app
        .send(
            Method::POST,
            "/users",
            Some(json!({ "name": "Awa 2", "email": "awa@example.com", "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn reports_show_up_in_the_activity_feed() {
    let app = TestApp::new().await;
    app.send(Method::GET, "/dashboard", None).await;

    let (status, _) = app
        .send(
            Method::POST,
            "/reports",
            Some(json!({ "title": "Monthly stock", "reportType": "stock" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, reports) = app.send(Method::GET, "/reports", None).await;
    assert_eq!(reports[0]["title"], "Monthly stock");

    let (_, dashboard) = app.send(Method::GET, "/dashboard", None).await;
    let feed = dashboard["recentActivity"].as_array().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["kind"], "report");
    assert!(feed[0]["label"].as_str().unwrap().contains("Monthly stock"));
}

#[tokio::test]
async fn stocked_location_cannot_be_deleted() {
    let app = TestApp::new().await;
    let w = app.seed_world().await;
    app.stock_in(&w, w.loc_a.id, w.card_x.id, 3).await;

    let uri = format!("/locations/{}", w.loc_a.id);
    let (status, body) = app.send(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, _) = app
        .send(
            Method::POST,
            "/movements",
            Some(json!({
                "type": "SORTIE",
                "userId": w.user.id,
                "sourceLocationId": w.loc_a.id,
                "items": [{ "cardTypeId": w.card_x.id, "quantity": 3 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.send(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (_, locations) = app.send(Method::GET, "/locations", None).await;
    assert_eq!(locations.as_array().unwrap().len(), 1);

    let (status, _) = app.send(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn emptied_stock_rows_are_removed_with_the_location() {
    let app = TestApp::new().await;
    let w = app.seed_world().await;
    app.stock_in(&w, w.loc_b.id, w.card_x.id, 4).await;
    app.stock_in(&w, w.loc_a.id, w.card_x.id, 6).await;

    let (status, _) = app
        .send(
            Method::POST,
            "/movements",
            Some(json!({
                "type": "SORTIE",
                "userId": w.user.id,
                "sourceLocationId": w.loc_b.id,
                "items": [{ "cardTypeId": w.card_x.id, "quantity": 4 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!("/locations/{}", w.loc_b.id);
    let (status, _) = app.send(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let db = app.state.db.as_ref();
    let orphaned = stock::Entity::find()
        .filter(stock::Column::LocationId.eq(w.loc_b.id))
        .count(db)
        .await
        .unwrap();
    assert_eq!(orphaned, 0);
    assert_eq!(app.stock_quantity(w.loc_a.id, w.card_x.id).await, 6);
}

#[tokio::test]
async fn stock_rows_with_quantity_block_a_direct_location_delete() {
    let app = TestApp::new().await;
    let w = app.seed_world().await;
    app.stock_in(&w, w.loc_a.id, w.card_x.id, 5).await;

    let err = location::Entity::delete_by_id(w.loc_a.id)
        .exec(app.state.db.as_ref())
        .await
        .unwrap_err();
    assert_matches!(err.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_)));

    assert_eq!(app.stock_quantity(w.loc_a.id, w.card_x.id).await, 5);
    app.assert_consistent(w.loc_a.id, w.card_x.id).await;
}

#[tokio::test]
async fn health_and_openapi_are_served() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");

    let (status, body) = app.send(Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/movements"].is_object());

    let response = app.request(Method::GET, "/health", None).await;
    assert!(response.headers().contains_key("x-request-id"));
}
