//! HTTP integration tests: the full router over an in-memory database.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use shopkeep_db::{Database, DbConfig};
use shopkeep_server::config::AppConfig;
use shopkeep_server::{build_router, AppState};

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13, b'I', b'H', b'D', b'R'];

struct TestApp {
    router: Router,
    _media: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let media = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.media.dir = media.path().to_path_buf();
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let state = AppState::new(db, config).unwrap();
        TestApp {
            router: build_router(state),
            _media: media,
        }
    }

    async fn raw(&self, request: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, bytes, content_type)
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let (status, bytes, _) = self.raw(request).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(body)).await
    }

    async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(body)).await
    }

    async fn create_product(&self, sku: &str, cost: i64, price: i64, stock: i64) -> Value {
        let (status, product) = self
            .post(
                "/api/products",
                json!({
                    "sku": sku,
                    "name": format!("Produto {}", sku),
                    "category": "Mercearia",
                    "cost_cents": cost,
                    "price_cents": price,
                    "stock": stock,
                    "min_stock": 1
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", product);
        product
    }
}

fn id_of(value: &Value) -> String {
    value["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn test_product_crud_and_errors() {
    let app = TestApp::new().await;
    let product = app.create_product("CAFE-500", 1450, 2290, 10).await;
    let id = id_of(&product);
    assert_eq!(product["unit"], "un");

    let (status, body) = app
        .post("/api/products", json!({ "sku": "CAFE-500", "name": "Outro", "price_cents": 100 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = app
        .post("/api/products", json!({ "sku": "X1", "name": "Caro", "cost_cents": 500, "price_cents": 100 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = app.post("/api/products", json!({ "sku": 42 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, found) = app.get("/api/products?q=cafe").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found.as_array().unwrap().len(), 1);

    let (status, updated) = app
        .put(
            &format!("/api/products/{}", id),
            json!({ "sku": "CAFE-500", "name": "Café Torrado", "cost_cents": 1450, "price_cents": 2490, "stock": 999 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price_cents"], 2490);
    assert_eq!(updated["stock"], 10);

    let (status, _) = app.call(Method::DELETE, &format!("/api/products/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, found) = app.get("/api/products").await;
    assert!(found.as_array().unwrap().is_empty());

    let (status, body) = app.get("/api/products/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_stock_adjustment_and_low_stock() {
    let app = TestApp::new().await;
    let id = id_of(&app.create_product("MEL", 1800, 3190, 3).await);

    let (status, product) = app.post(&format!("/api/products/{}/stock", id), json!({ "delta": -2 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["stock"], 1);

    let (status, body) = app.post(&format!("/api/products/{}/stock", id), json!({ "delta": -5 })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INSUFFICIENT_STOCK");

    for delta in [i64::MAX, i64::MIN] {
        let (status, body) = app.post(&format!("/api/products/{}/stock", id), json!({ "delta": delta })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
    let (status, product) = app.get(&format!("/api/products/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["stock"], 1);

    let (_, low) = app.get("/api/products/low-stock").await;
    assert_eq!(low[0]["sku"], "MEL");
}

#[tokio::test]
async fn test_sale_lifecycle() {
    let app = TestApp::new().await;
    let coffee = id_of(&app.create_product("CAFE", 1000, 2000, 5).await);

    let (_, mut profile) = app.get("/api/settings").await;
    profile["card_surcharge_bps"] = json!(500);
    let (status, _) = app.put("/api/settings", profile).await;
    assert_eq!(status, StatusCode::OK);

    let (status, quote) = app
        .post(
            "/api/sales/quote",
            json!({ "lines": [{ "product_id": coffee, "quantity": 2 }], "payment_method": "credit_card" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["total"], 4200);

    let (status, sale) = app
        .post(
            "/api/sales",
            json!({
                "lines": [{ "product_id": coffee, "quantity": 2 }],
                "payment_method": "cash",
                "discount": { "kind": "fixed", "value": 500 }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", sale);
    assert_eq!(sale["total_cents"], 3500);
    assert_eq!(sale["items"].as_array().unwrap().len(), 1);
    let sale_id = id_of(&sale);

    let (_, product) = app.get(&format!("/api/products/{}", coffee)).await;
    assert_eq!(product["stock"], 3);

    let (status, body) = app
        .post("/api/sales", json!({ "lines": [{ "product_id": coffee, "quantity": 4 }] }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INSUFFICIENT_STOCK");

    let (status, body) = app.post("/api/sales", json!({ "lines": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, cancelled) = app.post(&format!("/api/sales/{}/cancel", sale_id), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    let (_, product) = app.get(&format!("/api/products/{}", coffee)).await;
    assert_eq!(product["stock"], 5);

    let (status, body) = app.post(&format!("/api/sales/{}/cancel", sale_id), json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "BUSINESS_LOGIC");

    let (_, listed) = app.get("/api/sales?status=cancelled").await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_basket_assembly() {
    let app = TestApp::new().await;
    let coffee = id_of(&app.create_product("CAFE", 800, 1500, 10).await);
    let boxed = id_of(&app.create_product("CAIXA", 300, 300, 10).await);
    let (status, basket) = app
        .post(
            "/api/products",
            json!({ "sku": "CESTA", "name": "Cesta", "price_cents": 0, "is_basket": true }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let basket = id_of(&basket);

    let (status, composition) = app
        .put(
            &format!("/api/baskets/{}/components", basket),
            json!({
                "components": [
                    { "component_id": coffee, "role": "item", "quantity": 1 },
                    { "component_id": boxed, "role": "packaging", "quantity": 1 }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", composition);
    assert_eq!(composition["pricing"]["price"], 1800);
    assert_eq!(composition["pricing"]["cost"], 1100);
    assert_eq!(composition["assemblable"], 10);

    let (status, quote) = app
        .post(
            &format!("/api/baskets/{}/quote", basket),
            json!({ "discount": { "kind": "percentage", "value": 9000 } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["pricing"]["price"], 1100);
    assert_eq!(quote["pricing"]["clamped_to_cost"], true);

    let (status, assembly) = app
        .post(&format!("/api/baskets/{}/assemble", basket), json!({ "quantity": 2 }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", assembly);
    let (_, product) = app.get(&format!("/api/products/{}", basket)).await;
    assert_eq!(product["stock"], 2);
    assert_eq!(product["price_cents"], 1800);
    let (_, product) = app.get(&format!("/api/products/{}", coffee)).await;
    assert_eq!(product["stock"], 8);

    let (status, items) = app
        .get(&format!("/api/baskets/assemblies/{}/items", id_of(&assembly)))
        .await;
    assert_eq!(status, StatusCode::OK);
    let taken: i64 = items.as_array().unwrap().iter().map(|i| i["quantity"].as_i64().unwrap()).sum();
    assert_eq!(taken, 4);

    // A plain product edit cannot reprice the basket below its components
    let (status, product) = app
        .put(
            &format!("/api/products/{}", basket),
            json!({ "sku": "CESTA", "name": "Cesta Grande", "cost_cents": 0, "price_cents": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", product);
    assert_eq!(product["name"], "Cesta Grande");
    assert_eq!(product["price_cents"], 1800);
    assert_eq!(product["cost_cents"], 1100);
    assert_eq!(product["is_basket"], true);

    let (status, body) = app
        .put(
            &format!("/api/products/{}", coffee),
            json!({ "sku": "CAFE", "name": "Café", "cost_cents": 800, "price_cents": 1500, "is_basket": true }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "BUSINESS_LOGIC");

    let (status, body) = app
        .post(&format!("/api/baskets/{}/assemble", basket), json!({ "quantity": 20 }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INSUFFICIENT_STOCK");

    let (status, cancelled) = app
        .post(&format!("/api/baskets/assemblies/{}/cancel", id_of(&assembly)), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    let (_, product) = app.get(&format!("/api/products/{}", coffee)).await;
    assert_eq!(product["stock"], 10);

    let (_, assemblies) = app.get(&format!("/api/baskets/{}/assemblies", basket)).await;
    assert_eq!(assemblies.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_customers_expenses_accounts() {
    let app = TestApp::new().await;

    let (status, customer) = app
        .post("/api/customers", json!({ "name": "Ana Souza", "email": "ana@example.com" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, history) = app.get(&format!("/api/customers/{}/history", id_of(&customer))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(history.as_array().unwrap().is_empty());

    let (status, body) = app.post("/api/customers", json!({ "name": "Bruno", "email": "bruno@" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, rent) = app
        .post(
            "/api/expenses",
            json!({
                "description": "Aluguel",
                "category": "Aluguel",
                "amount_cents": 250000,
                "due_date": "2025-01-31",
                "recurrence": "monthly"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", rent);
    let (status, created) = app.call(Method::POST, "/api/expenses/recurring?until=2025-04-30", None).await;
    assert_eq!(status, StatusCode::OK);
    let dates: Vec<&str> = created
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["due_date"].as_str().unwrap())
        .collect();
    assert_eq!(dates, vec!["2025-02-28", "2025-03-31", "2025-04-30"]);
    let (_, again) = app.call(Method::POST, "/api/expenses/recurring?until=2025-04-30", None).await;
    assert!(again.as_array().unwrap().is_empty());

    let (status, paid) = app
        .call(Method::POST, &format!("/api/expenses/{}/pay?date=2025-02-01", id_of(&rent)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["paid_on"], "2025-02-01");

    let (status, account) = app
        .post(
            "/api/accounts",
            json!({
                "kind": "payable",
                "counterparty": "Torrefação",
                "description": "Boleto",
                "amount_cents": 45000,
                "due_date": "2020-01-10"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", account);
    assert_eq!(account["status"], "overdue");

    let (_, summary) = app.get("/api/accounts/summary").await;
    assert_eq!(summary["payable_overdue"], 45000);
    assert_eq!(summary["balance"], -45000);

    let (_, overdue) = app.get("/api/accounts?status=overdue").await;
    assert_eq!(overdue.as_array().unwrap().len(), 1);

    let (status, settled) = app
        .call(Method::POST, &format!("/api/accounts/{}/settle", id_of(&account)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settled["status"], "settled");
}

#[tokio::test]
async fn test_dashboard_and_labels() {
    let app = TestApp::new().await;
    let coffee = id_of(&app.create_product("CAFE", 1000, 2000, 5).await);
    app.post(
        "/api/sales",
        json!({ "lines": [{ "product_id": coffee, "quantity": 1 }], "sold_on": "2025-03-10" }),
    )
    .await;

    let (status, dashboard) = app.get("/api/reports/dashboard?from=2025-03-01&to=2025-03-31").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["daily"].as_array().unwrap().len(), 31);
    assert_eq!(dashboard["summary"]["net_revenue"], 2000);
    assert_eq!(dashboard["summary"]["gross_profit"], 1000);

    let (status, body) = app.get("/api/reports/dashboard?from=2025-04-01&to=2025-03-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/labels")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "items": [{ "product_id": coffee, "copies": 3 }] }).to_string()))
        .unwrap();
    let (status, bytes, content_type) = app.raw(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/pdf"));
    assert!(bytes.starts_with(b"%PDF"));

    let (status, _) = app
        .post("/api/labels", json!({ "items": [{ "product_id": "missing", "copies": 1 }] }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_photo_upload() {
    let app = TestApp::new().await;
    let id = id_of(&app.create_product("CAFE", 1000, 2000, 5).await);
    let uri = format!("/api/products/{}/photo", id);

    let (status, _) = app.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let upload = |bytes: &'static [u8], content_type: &str| {
        Request::builder()
            .method(Method::PUT)
            .uri(&uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(bytes))
            .unwrap()
    };

    let (status, body, _) = app.raw(upload(PNG, "image/png")).await;
    assert_eq!(status, StatusCode::OK);
    let product: Value = serde_json::from_slice(&body).unwrap();
    assert!(product["photo_path"].as_str().unwrap().starts_with("products/"));

    let (status, bytes, content_type) = app.raw(Request::get(&uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    assert_eq!(bytes, PNG);

    let (status, _, _) = app.raw(upload(b"GIF89a....", "image/gif")).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let (status, _, _) = app.raw(upload(b"GIF89a....", "image/png")).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_preferences_and_digest() {
    let app = TestApp::new().await;

    let (status, value) = app
        .put("/api/settings/preferences/ui.cart_widget", json!({ "x": 10, "y": 20 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["x"], 10);
    let (status, value) = app.get("/api/settings/preferences/ui.cart_widget").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!({ "x": 10, "y": 20 }));

    let (status, _) = app.put("/api/settings/preferences/store.name", json!("x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get("/api/settings/preferences/ui.unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let request = Request::get("/api/digest/preview?date=2025-03-10").body(Body::empty()).unwrap();
    let (status, bytes, content_type) = app.raw(request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/html"));
    assert!(String::from_utf8(bytes).unwrap().contains("Minha Loja"));

    let (status, body) = app.call(Method::POST, "/api/digest/send", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "BUSINESS_LOGIC");
}
