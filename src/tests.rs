//! Integration tests for the order server and the storefront client.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::client::{Backoff, CheckoutForm, ClientError, Storefront, SyncWorker};
use crate::config::{ClientConfig, Config, StorageKind};
use crate::models::BasketLineItem;
use crate::store::{JsonFileBackend, OrderPersistence, OrderStore};
use crate::{create_router, AppState};

const API_KEY: &str = "test-api-key";
const ADMIN_PASSWORD: &str = "correct horse";

fn test_config(temp_dir: &Path, psk: Option<&str>, admin_password: Option<&str>) -> Config {
    Config {
        api_psk: psk.map(str::to_string),
        admin_username: "admin".to_string(),
        admin_password: admin_password.map(str::to_string),
        session_ttl: Duration::from_secs(3600),
        storage: StorageKind::JsonFile,
        data_path: temp_dir.join("orders.json"),
        db_path: temp_dir.join("orders.sqlite"),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        log_level: "warn".to_string(),
        log_json: false,
    }
}

fn client_config(server_url: &str, temp_dir: &Path, api_key: Option<&str>) -> ClientConfig {
    ClientConfig {
        server_url: server_url.to_string(),
        api_key: api_key.map(str::to_string),
        local_db_path: temp_dir.join("local.sqlite"),
        request_timeout: Duration::from_secs(1),
        backoff_base: Duration::from_millis(50),
        backoff_max: Duration::from_millis(200),
    }
}

async fn build_app(config: Config) -> axum::Router {
    let backend = JsonFileBackend::new(&config.data_path);
    let store = OrderStore::open(OrderPersistence::JsonFile(backend))
        .await
        .expect("Failed to open store");
    create_router(AppState::new(store, config))
}

/// Serve the app on an already bound listener.
async fn serve_on(listener: tokio::net::TcpListener, config: Config) {
    let app = build_app(config).await;
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(100)).await;
}

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    admin: Client,
    base_url: String,
    temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_auth(Some(API_KEY), Some(ADMIN_PASSWORD)).await
    }

    async fn with_auth(psk: Option<&str>, admin_password: Option<&str>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = test_config(temp_dir.path(), psk, admin_password);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        serve_on(listener, config).await;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("x-api-key", API_KEY.parse().unwrap());
        let admin = Client::builder().default_headers(headers).build().unwrap();

        TestFixture {
            client: Client::new(),
            admin,
            base_url: format!("http://{}", addr),
            temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn create(&self, order: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/orders"))
            .json(&order)
            .send()
            .await
            .unwrap()
    }

    async fn order_count(&self) -> u64 {
        let body: Value = self
            .client
            .get(self.url("/api/sync"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["data"]["orderCount"].as_u64().unwrap()
    }
}

fn order_json(id: &str) -> Value {
    json!({
        "id": id,
        "name": "Jane Smith",
        "contact": "07700 900123",
        "address": "1 High Street",
        "postcode": "AB1 2CD",
        "products": [{ "id": "sofa1", "name": "Verona Sofa", "price": 499.0, "quantity": 1, "color": "grey" }],
        "deliveryOption": "premium",
        "pendingSync": true
    })
}

fn checkout_form() -> CheckoutForm {
    CheckoutForm {
        name: "Jane Smith".to_string(),
        contact: "07700 900123".to_string(),
        address: "1 High Street".to_string(),
        postcode: "AB1 2CD".to_string(),
        ..Default::default()
    }
}

fn sofa() -> BasketLineItem {
    BasketLineItem::new("sofa1", "Verona Sofa", 499.0)
        .with_color("grey")
        .with_extra_seats(1)
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_create_order() {
    let fixture = TestFixture::new().await;

    let resp = fixture.create(order_json("order-1")).await;
    assert_eq!(resp.status(), 201);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["orderId"], "order-1");
    assert!(body["lastSync"].is_string());

    let order = &body["data"]["order"];
    assert_eq!(order["synced"], true);
    assert_eq!(order["pendingSync"], false);
    assert_eq!(order["deliveryCost"], 50.0);
    assert_eq!(order["total"], 549.0);
    assert_eq!(order["products"][0]["image"], "/images/Verona Sofa/v3+2/vgrey3.jpg");
}

#[tokio::test]
async fn test_create_order_generates_id() {
    let fixture = TestFixture::new().await;

    let mut order = order_json("");
    order.as_object_mut().unwrap().remove("id");
    let body: Value = fixture.create(order).await.json().await.unwrap();

    let id = body["data"]["orderId"].as_str().unwrap();
    assert!(id.starts_with("order-"));
    assert!(body["data"]["order"]["timestamp"].is_string());
}

#[tokio::test]
async fn test_create_missing_contact_is_rejected() {
    let fixture = TestFixture::new().await;
    fixture.create(order_json("order-1")).await;

    let mut bad = order_json("order-2");
    bad.as_object_mut().unwrap().remove("contact");
    let resp = fixture.create(bad).await;
    assert_eq!(resp.status(), 400);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("contact"));

    assert_eq!(fixture.order_count().await, 1);
}

#[tokio::test]
async fn test_empty_name_is_rejected() {
    let fixture = TestFixture::new().await;

    let mut bad = order_json("order-1");
    bad["name"] = json!("");
    let resp = fixture.create(bad).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(fixture.order_count().await, 0);
}

#[tokio::test]
async fn test_resubmitted_order_keeps_latest() {
    let fixture = TestFixture::new().await;

    let mut first = order_json("order-1");
    first["timestamp"] = json!("2024-05-01T10:00:00Z");
    let mut second = order_json("order-1");
    second["timestamp"] = json!("2024-05-01T12:00:00Z");
    second["address"] = json!("2 Station Road");

    fixture.create(first).await;
    fixture.create(second).await;

    let body: Value = fixture
        .admin
        .get(fixture.url("/api/orders"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let orders = body["data"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["address"], "2 Station Road");
    assert_eq!(orders[0]["timestamp"], "2024-05-01T12:00:00Z");
}

#[tokio::test]
async fn test_admin_routes_require_auth() {
    let fixture = TestFixture::new().await;
    fixture.create(order_json("order-1")).await;

    for path in ["/api/orders", "/api/orders/order-1", "/api/events"] {
        let resp = fixture.client.get(fixture.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), 401, "GET {} should need auth", path);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    let resp = fixture
        .client
        .delete(fixture.url("/api/orders/order-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .client
        .get(fixture.url("/api/orders"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .client
        .get(fixture.url("/api/orders"))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_unconfigured_auth_rejects_admin_routes() {
    let fixture = TestFixture::with_auth(None, None).await;

    let resp = fixture
        .admin
        .get(fixture.url("/api/orders"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .client
        .post(fixture.url("/admin/login"))
        .json(&json!({ "username": "admin", "password": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_get_update_delete_order() {
    let fixture = TestFixture::new().await;
    fixture.create(order_json("order-1")).await;

    let resp = fixture
        .admin
        .get(fixture.url("/api/orders/order-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .admin
        .patch(fixture.url("/api/orders/order-1"))
        .json(&json!({ "status": "dispatched", "id": "hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["id"], "order-1");
    assert_eq!(body["data"]["status"], "dispatched");
    assert!(body["data"]["lastUpdated"].is_string());

    let resp = fixture
        .admin
        .patch(fixture.url("/api/orders/order-1"))
        .json(&json!({ "address": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .admin
        .patch(fixture.url("/api/orders/missing"))
        .json(&json!({ "status": "dispatched" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .admin
        .delete(fixture.url("/api/orders/order-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .admin
        .delete(fixture.url("/api/orders/order-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_sync_orders_response_depends_on_caller() {
    let fixture = TestFixture::new().await;
    fixture.create(order_json("order-1")).await;

    let batch = json!({ "orders": [order_json("order-2")] });
    let body: Value = fixture
        .client
        .post(fixture.url("/api/sync-orders"))
        .json(&batch)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["complete"], false);
    assert_eq!(body["data"]["orders"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["orders"][0]["id"], "order-2");
    assert_eq!(body["data"]["orders"][0]["synced"], true);

    let batch = json!({ "orders": [order_json("order-3")] });
    let body: Value = fixture
        .admin
        .post(fixture.url("/api/sync-orders"))
        .json(&batch)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["complete"], true);
    assert_eq!(body["data"]["orders"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_sync_orders_rejects_invalid_batch() {
    let fixture = TestFixture::new().await;

    let mut bad = order_json("order-2");
    bad["address"] = json!("   ");
    let resp = fixture
        .client
        .post(fixture.url("/api/sync-orders"))
        .json(&json!({ "orders": [order_json("order-1"), bad] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(fixture.order_count().await, 0);
}

#[tokio::test]
async fn test_check_orders() {
    let fixture = TestFixture::new().await;
    fixture.create(order_json("order-1")).await;

    let info: Value = fixture
        .client
        .get(fixture.url("/api/sync"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let last_sync = info["data"]["lastSync"].as_str().unwrap().to_string();

    let body: Value = fixture
        .client
        .get(fixture.url("/api/check-orders"))
        .query(&[("count", "1"), ("lastSync", last_sync.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["shouldSync"], false);
    assert_eq!(body["data"]["orderCount"], 1);

    let body: Value = fixture
        .client
        .get(fixture.url("/api/check-orders"))
        .query(&[("count", "0"), ("lastSync", last_sync.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["shouldSync"], true);

    let body: Value = fixture
        .client
        .get(fixture.url("/api/check-orders?count=1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["shouldSync"], true);
}

#[tokio::test]
async fn test_unknown_api_path() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/does-not-exist"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_admin_session_login_and_logout() {
    let fixture = TestFixture::new().await;
    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let resp = client
        .post(fixture.url("/admin/login"))
        .json(&json!({ "username": "admin", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(fixture.url("/admin/login"))
        .json(&json!({ "username": "admin", "password": ADMIN_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let set_cookie = resp
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["redirect"], "/admin");

    let resp = client
        .get(fixture.url("/api/orders"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(fixture.url("/admin/logout"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());
    assert_eq!(resp.headers().get("location").unwrap(), "/admin/login");

    let resp = client
        .get(fixture.url("/api/orders"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_event_stream_reports_new_orders() {
    let fixture = TestFixture::new().await;

    let mut events = fixture
        .admin
        .get(fixture.url("/api/events"))
        .send()
        .await
        .unwrap();
    assert_eq!(events.status(), 200);
    assert!(events
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    fixture.create(order_json("order-1")).await;

    let received = tokio::time::timeout(Duration::from_secs(5), async {
        let mut received = String::new();
        while let Some(chunk) = events.chunk().await.unwrap() {
            received.push_str(&String::from_utf8_lossy(&chunk));
            if received.contains("order-1") {
                break;
            }
        }
        received
    })
    .await
    .unwrap();

    assert!(received.contains("event: new-order"));
}

#[tokio::test]
async fn test_storefront_checkout_online() {
    let fixture = TestFixture::new().await;
    let storefront = Storefront::open(&client_config(
        &fixture.base_url,
        fixture.temp_dir.path(),
        None,
    ))
    .await
    .unwrap();

    storefront.basket.add_item(sofa()).await.unwrap();
    storefront.basket.add_item(sofa()).await.unwrap();

    let receipt = storefront
        .submitter
        .checkout_basket(&checkout_form(), &storefront.basket)
        .await
        .unwrap();
    assert!(receipt.delivered);
    assert_eq!(storefront.basket.count(), 0);
    assert_eq!(receipt.order.subtotal, 998.0);
    assert_eq!(receipt.order.total, 1028.0);

    let cached = storefront.cache.get(&receipt.order.id).await.unwrap().unwrap();
    assert!(cached.sync.synced);
    assert!(!cached.sync.pending_sync);
    assert!(cached.sync.synced_at.is_some());

    assert_eq!(fixture.order_count().await, 1);
}

#[tokio::test]
async fn test_offline_submit_then_reconnect() {
    let fixture = TestFixture::new().await;
    let local_dir = TempDir::new().unwrap();

    // Nothing listens on port 9
    let offline = Storefront::open(&client_config(
        "http://127.0.0.1:9",
        local_dir.path(),
        None,
    ))
    .await
    .unwrap();
    offline.basket.add_item(sofa()).await.unwrap();
    let receipt = offline
        .submitter
        .checkout_basket(&checkout_form(), &offline.basket)
        .await
        .unwrap();
    assert!(!receipt.delivered);
    let status = offline.cache.status().await.unwrap();
    assert_eq!(status.pending, 1);
    assert_eq!(status.attempts, 1);
    drop(offline);

    let online = Storefront::open(&client_config(
        &fixture.base_url,
        local_dir.path(),
        None,
    ))
    .await
    .unwrap();
    let report = online.reconciler.sync_pending().await.unwrap();
    assert!(report.delivered);
    assert_eq!(report.sent, 1);
    assert!(!report.refreshed);

    let cached = online.cache.get(&receipt.order.id).await.unwrap().unwrap();
    assert!(cached.sync.synced);
    assert!(!cached.sync.pending_sync);

    let resp = fixture
        .admin
        .get(fixture.url(&format!("/api/orders/{}", receipt.order.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_worker_delivers_when_connectivity_returns() {
    let server_dir = TempDir::new().unwrap();
    let local_dir = TempDir::new().unwrap();

    // Reserve the port but do not serve yet; requests time out meanwhile
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let config = client_config(&base_url, local_dir.path(), None);

    let storefront = Storefront::open(&config).await.unwrap();
    storefront.basket.add_item(sofa()).await.unwrap();
    let receipt = storefront
        .submitter
        .checkout_basket(&checkout_form(), &storefront.basket)
        .await
        .unwrap();
    assert!(!receipt.delivered);

    let (online_tx, online_rx) = tokio::sync::watch::channel(false);
    let worker = SyncWorker::spawn(
        storefront.reconciler.clone(),
        online_rx,
        Backoff::from_config(&config),
    );

    serve_on(
        listener,
        test_config(server_dir.path(), Some(API_KEY), None),
    )
    .await;
    online_tx.send(true).unwrap();

    let mut status = worker.status();
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let current = *status.borrow_and_update();
            if current.pending == 0 && current.synced == 1 {
                break;
            }
            status.changed().await.unwrap();
        }
    })
    .await
    .unwrap();
    worker.shutdown().await;

    let cached = storefront.cache.get(&receipt.order.id).await.unwrap().unwrap();
    assert!(cached.sync.synced);
}

#[tokio::test]
async fn test_admin_client_reconciliation() {
    let fixture = TestFixture::new().await;
    fixture.create(order_json("order-server")).await;

    let admin = Storefront::open(&client_config(
        &fixture.base_url,
        fixture.temp_dir.path(),
        Some(API_KEY),
    ))
    .await
    .unwrap();

    // First check pulls the full list
    assert!(admin.reconciler.check_for_updates().await.unwrap());
    assert_eq!(admin.cache.get_all().await.unwrap().len(), 1);
    assert!(!admin.reconciler.check_for_updates().await.unwrap());

    admin.basket.add_item(sofa()).await.unwrap();
    let receipt = admin
        .submitter
        .checkout_basket(&checkout_form(), &admin.basket)
        .await
        .unwrap();
    assert!(receipt.delivered);

    let all = admin.reconciler.all_orders().await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].timestamp >= all[1].timestamp);

    let report = admin.reconciler.force_sync().await.unwrap();
    assert_eq!(report.sent, 2);
    assert!(report.refreshed);
    assert_eq!(admin.cache.status().await.unwrap().synced, 2);

    admin.reconciler.delete_order("order-server").await.unwrap();
    assert!(admin.cache.get("order-server").await.unwrap().is_none());
    assert_eq!(fixture.order_count().await, 1);

    let err = admin
        .reconciler
        .delete_order("order-server")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Server { status: 404, .. }));

    let diagnosis = admin.reconciler.diagnose().await.unwrap();
    assert_eq!(diagnosis.total, 1);
    assert_eq!(diagnosis.pending, 0);
    assert!(diagnosis.invalid.is_empty());
}

/// Place `count` orders while the server is unreachable, leaving them pending in `local_dir`.
async fn place_pending_orders(local_dir: &Path, count: usize) -> Vec<String> {
    let offline = Storefront::open(&client_config("http://127.0.0.1:9", local_dir, None))
        .await
        .unwrap();
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        offline.basket.add_item(sofa()).await.unwrap();
        let receipt = offline
            .submitter
            .checkout_basket(&checkout_form(), &offline.basket)
            .await
            .unwrap();
        assert!(!receipt.delivered);
        ids.push(receipt.order.id);
    }
    ids
}

async fn server_order_ids(fixture: &TestFixture) -> Vec<String> {
    let body: Value = fixture
        .admin
        .get(fixture.url("/api/orders"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let mut ids: Vec<String> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids
}

async fn cached_order_ids(storefront: &Storefront) -> Vec<String> {
    let cached = storefront.cache.get_all().await.unwrap();
    assert!(cached.iter().all(|o| o.sync.synced && !o.sync.pending_sync));
    let mut ids: Vec<String> = cached.into_iter().map(|o| o.id).collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn test_overlapping_syncs_do_not_duplicate_orders() {
    let fixture = TestFixture::new().await;
    let local_dir = TempDir::new().unwrap();
    let mut placed = place_pending_orders(local_dir.path(), 3).await;
    placed.sort();

    let storefront = Storefront::open(&client_config(&fixture.base_url, local_dir.path(), None))
        .await
        .unwrap();
    let (first, second) = tokio::join!(
        storefront.reconciler.sync_pending(),
        storefront.reconciler.sync_pending()
    );
    assert!(first.unwrap().delivered);
    assert!(second.unwrap().delivered);

    assert_eq!(cached_order_ids(&storefront).await, placed);
    assert_eq!(server_order_ids(&fixture).await, placed);
}

#[tokio::test]
async fn test_admin_sync_overlapping_refresh_keeps_one_entry_per_order() {
    let fixture = TestFixture::new().await;
    fixture.create(order_json("order-server")).await;
    let local_dir = TempDir::new().unwrap();
    let mut expected = place_pending_orders(local_dir.path(), 2).await;
    expected.push("order-server".to_string());
    expected.sort();

    let admin = Storefront::open(&client_config(
        &fixture.base_url,
        local_dir.path(),
        Some(API_KEY),
    ))
    .await
    .unwrap();
    let (synced, refreshed) = tokio::join!(
        admin.reconciler.sync_pending(),
        admin.reconciler.check_for_updates()
    );
    assert!(synced.unwrap().delivered);
    refreshed.unwrap();

    assert_eq!(cached_order_ids(&admin).await, expected);
    assert_eq!(server_order_ids(&fixture).await, expected);
}
