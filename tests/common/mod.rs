#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use cardstock_api::{
    config::AppConfig,
    db,
    entities::{bank, card_type, location, user},
    events::{Event, EventSender},
    services::{
        catalog::{CreateBankRequest, CreateCardTypeRequest, CreateLocationRequest, CreateUserRequest},
        inventory, ledger,
    },
    AppState,
};

/// Reference data most tests need: two locations of one bank, two card
/// types and an acting user.
pub struct World {
    pub bank: bank::Model,
    pub loc_a: location::Model,
    pub loc_b: location::Model,
    pub card_x: card_type::Model,
    pub card_y: card_type::Model,
    pub user: user::Model,
}

/// Application harness backed by a temp-file SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    events: Arc<Mutex<Vec<Event>>>,
    _db_dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Builds the app after letting the caller adjust the configuration.
    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir");
        let db_path = db_dir.path().join("cardstock_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        // SQLite allows one writer; a single pooled connection serializes
        // transactions instead of surfacing SQLITE_BUSY.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        tweak(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, mut event_rx) = mpsc::channel(256);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let event_task = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                sink.lock().unwrap().push(event);
            }
        });

        let state = AppState::new(Arc::new(pool), cfg, EventSender::new(event_tx));
        let router = cardstock_api::app(state.clone());

        Self {
            router,
            state,
            events,
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends a request and decodes the JSON body (`Null` when empty).
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.request(method, uri, body).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    /// Sends a raw body with a JSON content type.
    pub async fn send_raw(&self, method: Method, uri: &str, raw: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(raw.to_string()))
            .expect("failed to build request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request");
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn seed_world(&self) -> World {
        let catalog = self.state.services.catalog.clone();
        let suffix = Uuid::new_v4().simple().to_string();

        let bank = catalog
            .create_bank(CreateBankRequest {
                name: "Banque Test".to_string(),
                address: None,
                bank_code: format!("BT-{}", &suffix[..8]),
            })
            .await
            .expect("seed bank");

        let loc_a = self.seed_location(&bank, "Vault A").await;
        let loc_b = self.seed_location(&bank, "Vault B").await;
        let card_x = self.seed_card_type(&bank, "Visa", Some("Classic")).await;
        let card_y = self.seed_card_type(&bank, "Mastercard", Some("Gold")).await;

        let user = catalog
            .create_user(CreateUserRequest {
                name: "Agent Test".to_string(),
                email: format!("agent-{}@example.com", &suffix[..8]),
                role: "operator".to_string(),
            })
            .await
            .expect("seed user");

        World {
            bank,
            loc_a,
            loc_b,
            card_x,
            card_y,
            user,
        }
    }

    pub async fn seed_location(&self, bank: &bank::Model, name: &str) -> location::Model {
        self.state
            .services
            .catalog
            .create_location(CreateLocationRequest {
                name: name.to_string(),
                address: None,
                bank_id: bank.id,
                max_capacity: None,
                security_level: Some("high".to_string()),
            })
            .await
            .expect("seed location")
    }

    pub async fn seed_card_type(
        &self,
        bank: &bank::Model,
        name: &str,
        sub_type: Option<&str>,
    ) -> card_type::Model {
        self.state
            .services
            .catalog
            .create_card_type(CreateCardTypeRequest {
                name: name.to_string(),
                sub_type: sub_type.map(str::to_string),
                sub_sub_type: None,
                bank_id: Some(bank.id),
                description: None,
            })
            .await
            .expect("seed card type")
    }

    /// Posts an ENTREE of `quantity` cards into `location`.
    pub async fn stock_in(&self, world: &World, location: Uuid, card_type: Uuid, quantity: i64) {
        let (status, body) = self
            .send(
                Method::POST,
                "/movements",
                Some(json!({
                    "type": "ENTREE",
                    "userId": world.user.id,
                    "destinationLocationId": location,
                    "items": [{ "cardTypeId": card_type, "quantity": quantity }]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "seed entree failed: {body}");
    }

    /// Current counter, 0 when the row does not exist.
    pub async fn stock_quantity(&self, location: Uuid, card_type: Uuid) -> i64 {
        inventory::find_stock(self.state.db.as_ref(), location, card_type)
            .await
            .expect("read stock")
            .map(|s| s.quantity)
            .unwrap_or(0)
    }

    pub async fn movement_count(&self) -> u64 {
        ledger::count_movements(self.state.db.as_ref())
            .await
            .expect("count movements")
    }

    pub async fn assert_consistent(&self, location: Uuid, card_type: Uuid) {
        let result = ledger::reconcile(self.state.db.as_ref(), location, card_type)
            .await
            .expect("reconcile");
        assert!(
            result.consistent,
            "ledger {} != stock {} for {location}/{card_type}",
            result.ledger_balance, result.stock_quantity
        );
    }

    /// Events received so far, waiting briefly for `at_least` of them.
    pub async fn events(&self, at_least: usize) -> Vec<Event> {
        for _ in 0..50 {
            {
                let events = self.events.lock().unwrap();
                if events.len() >= at_least {
                    return events.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.events.lock().unwrap().clone()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is JSON")
    }
}
