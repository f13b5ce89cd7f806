//! `SupabaseClient` and `HttpDownloader` against a local stub of the hosted
//! service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use bookstall_resolve::adapter::{HttpDownloader, ServiceConfig, SupabaseClient, TableNames};
use bookstall_resolve::{
    resolve_accessible_content, AccessError, DownloadError, Downloader, PurchaseError,
    PurchaseOutcome, PurchaseSurface,
};
use bookstall_storage::{CatalogBackend, ObjectSigner, StoreError};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use time::OffsetDateTime;

// ──────────────────────────────────────────────
// Stub service
// ──────────────────────────────────────────────

struct Stub {
    base_url: String,
    sign_fails: AtomicBool,
    headers: Mutex<Vec<(String, String)>>,
    signed_objects: Mutex<Vec<String>>,
    purchases: Mutex<Vec<Value>>,
}

impl Stub {
    fn capture(&self, headers: &HeaderMap) {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        self.headers
            .lock()
            .unwrap()
            .push((get("apikey"), get("authorization")));
    }
}

async fn purchases_handler(
    State(stub): State<Arc<Stub>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    stub.capture(&headers);
    let matches = query.get("book_id").map(String::as_str) == Some("eq.b1")
        && query.get("user_id").map(String::as_str) == Some("eq.u1")
        && query.get("payment_status").map(String::as_str) == Some("eq.completed")
        && query.get("access_granted").map(String::as_str) == Some("eq.true")
        && query
            .get("select")
            .is_some_and(|s| s.contains("content:books(id,title,file_url,business_id)"));
    if !matches {
        return Json(json!([]));
    }
    Json(json!([{
        "user_id": "u1",
        "book_id": "b1",
        "payment_status": "completed",
        "access_granted": true,
        "purchased_at": "2025-01-02T03:04:05Z",
        "content": {
            "id": "b1",
            "title": "Book One",
            "file_url": format!("{}/storage/v1/object/public/books/book1.pdf", stub.base_url),
            "business_id": "shop-1"
        }
    }]))
}

async fn sign_handler(
    State(stub): State<Arc<Stub>>,
    headers: HeaderMap,
    Path(object): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    stub.capture(&headers);
    stub.signed_objects.lock().unwrap().push(object.clone());
    if stub.sign_fails.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "signing unavailable"})),
        );
    }
    let expires = body.get("expiresIn").and_then(Value::as_u64).unwrap_or(0);
    (
        StatusCode::OK,
        Json(json!({ "signedURL": format!("/object/sign/{object}?token=t&ttl={expires}") })),
    )
}

async fn products_handler(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    if query.get("id").map(String::as_str) != Some("eq.shirt") {
        return Json(json!([]));
    }
    Json(json!([{
        "id": "shirt",
        "name": "Shirt",
        "price": "100.00",
        "currency": "usd",
        "sale_price": "80.00",
        "sale_start_date": null,
        "sale_end_date": null,
        "variations": [
            {"name": "Size", "options": ["S", "M", "L"], "price_modifiers": {"M": "5", "L": "10"}}
        ],
        "manage_stock": true,
        "stock_quantity": 10,
        "low_stock_threshold": 2
    }]))
}

async fn purchase_handler(
    State(stub): State<Arc<Stub>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let quantity = body.get("quantity").and_then(Value::as_u64).unwrap_or(0);
    stub.purchases.lock().unwrap().push(body.clone());
    if quantity > 2 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"code": "P0001", "message": "out of stock"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "purchase_id": "p-1",
            "product_id": body["product_id"],
            "quantity": quantity,
            "total_amount": "180.00",
            "status": "completed"
        })),
    )
}

async fn file_handler(Path(name): Path<String>) -> impl IntoResponse {
    if name == "missing.pdf" {
        return (StatusCode::NOT_FOUND, Vec::new());
    }
    (StatusCode::OK, b"%PDF-1.7 stub".to_vec())
}

async fn spawn_stub() -> Arc<Stub> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stub = Arc::new(Stub {
        base_url: format!("http://{addr}"),
        sign_fails: AtomicBool::new(false),
        headers: Mutex::new(Vec::new()),
        signed_objects: Mutex::new(Vec::new()),
        purchases: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/rest/v1/book_purchases", get(purchases_handler))
        .route("/rest/v1/products", get(products_handler))
        .route("/rest/v1/rpc/purchase_product", post(purchase_handler))
        .route("/storage/v1/object/sign/{*object}", post(sign_handler))
        .route("/files/{name}", get(file_handler))
        .with_state(stub.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    stub
}

fn client(stub: &Stub, access_token: Option<&str>) -> SupabaseClient {
    SupabaseClient::new(
        &ServiceConfig {
            url: stub.base_url.clone(),
            anon_key: "anon-key".to_string(),
            access_token: access_token.map(str::to_string),
            timeout_secs: Some(5),
        },
        TableNames::default(),
    )
}

// ──────────────────────────────────────────────
// Content access
// ──────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn resolves_signed_url_with_user_token() {
    let stub = spawn_stub().await;
    let client = client(&stub, Some("user-jwt"));

    let d = resolve_accessible_content(&client, &client, "b1", "u1")
        .await
        .unwrap();
    assert!(d.signed);
    assert_eq!(d.title, "Book One");
    assert_eq!(
        d.url,
        format!(
            "{}/storage/v1/object/sign/books/book1.pdf?token=t&ttl=3600",
            stub.base_url
        )
    );

    let headers = stub.headers.lock().unwrap().clone();
    assert_eq!(headers.len(), 2);
    for (apikey, authorization) in headers {
        assert_eq!(apikey, "anon-key");
        assert_eq!(authorization, "Bearer user-jwt");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn signing_outage_falls_back_to_stored_url() {
    let stub = spawn_stub().await;
    stub.sign_fails.store(true, Ordering::SeqCst);
    let client = client(&stub, None);

    let d = resolve_accessible_content(&client, &client, "b1", "u1")
        .await
        .unwrap();
    assert!(!d.signed);
    assert_eq!(
        d.url,
        format!("{}/storage/v1/object/public/books/book1.pdf", stub.base_url)
    );
    let headers = stub.headers.lock().unwrap().clone();
    assert_eq!(headers[0].1, "Bearer anon-key");
}

#[tokio::test(flavor = "multi_thread")]
async fn object_key_with_space_is_signed() {
    let stub = spawn_stub().await;
    let client = client(&stub, None);

    let signed = client
        .create_signed_url("books", "shelf/vol 2.pdf", std::time::Duration::from_secs(60))
        .await
        .unwrap();
    assert!(signed.starts_with(&format!("{}/storage/v1/object/sign/", stub.base_url)));
    assert_eq!(
        stub.signed_objects.lock().unwrap().as_slice(),
        ["books/shelf/vol 2.pdf".to_string()]
    );
    assert_eq!(
        client.public_url("books", "shelf/vol 2.pdf"),
        format!("{}/storage/v1/object/public/books/shelf/vol%202.pdf", stub.base_url)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn other_user_is_denied() {
    let stub = spawn_stub().await;
    let client = client(&stub, None);
    let result = resolve_accessible_content(&client, &client, "b1", "u2").await;
    assert_eq!(result, Err(AccessError::AccessDenied));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_service_is_a_backend_error() {
    let client = SupabaseClient::new(
        &ServiceConfig {
            url: "http://127.0.0.1:1".to_string(),
            anon_key: "anon-key".to_string(),
            access_token: None,
            timeout_secs: Some(2),
        },
        TableNames::default(),
    );
    let result = resolve_accessible_content(&client, &client, "b1", "u1").await;
    match result {
        Err(AccessError::Backend(e)) => assert!(e.is_retryable()),
        other => panic!("expected Backend error, got {other:?}"),
    }
}

// ──────────────────────────────────────────────
// Catalog and purchase
// ──────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn loads_item_and_completes_purchase() {
    let stub = spawn_stub().await;
    let client = client(&stub, Some("user-jwt"));

    let surface = PurchaseSurface::load(&client, "shirt").await.unwrap();
    assert_eq!(surface.item().currency(), "USD");
    surface.select_option("Size", "L").unwrap();
    surface.change_quantity(1).unwrap();

    let as_of = OffsetDateTime::now_utc();
    match surface.submit(&client, as_of).await.unwrap() {
        PurchaseOutcome::Completed { receipt, total } => {
            assert_eq!(receipt.purchase_id, "p-1");
            assert_eq!(receipt.quantity, 2);
            assert_eq!(total.amount, Decimal::from(180));
        }
        PurchaseOutcome::Discarded => panic!("surface was live"),
    }

    let sent = stub.purchases.lock().unwrap().clone();
    assert_eq!(
        sent,
        vec![json!({"product_id": "shirt", "quantity": 2, "selection": {"Size": "L"}})]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn backend_rejection_carries_service_message() {
    let stub = spawn_stub().await;
    let client = client(&stub, None);

    let surface = PurchaseSurface::load(&client, "shirt").await.unwrap();
    surface.change_quantity(2).unwrap();
    let err = surface
        .submit(&client, OffsetDateTime::now_utc())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PurchaseError::Rejected {
            message: "out of stock".to_string()
        }
    );
    assert_eq!(surface.quantity(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_product_is_not_found() {
    let stub = spawn_stub().await;
    let client = client(&stub, None);
    let err = client.fetch_item("nope").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

// ──────────────────────────────────────────────
// Downloads
// ──────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn download_lands_under_final_name() {
    let stub = spawn_stub().await;
    let dir = tempfile::tempdir().unwrap();
    let downloader = HttpDownloader::new(dir.path().join("books"), None);

    let path = downloader
        .download(&format!("{}/files/book1.pdf", stub.base_url), "book_one.pdf")
        .await
        .unwrap();
    assert_eq!(path, dir.path().join("books").join("book_one.pdf"));
    assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7 stub");
    let names: Vec<_> = std::fs::read_dir(dir.path().join("books"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_download_leaves_nothing_behind() {
    let stub = spawn_stub().await;
    let dir = tempfile::tempdir().unwrap();
    let downloader = HttpDownloader::new(dir.path(), None);

    let err = downloader
        .download(&format!("{}/files/missing.pdf", stub.base_url), "missing.pdf")
        .await
        .unwrap_err();
    assert_eq!(err, DownloadError::Http { status: 404 });
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
