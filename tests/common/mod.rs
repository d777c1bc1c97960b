//! In-process fake of the remote ordering endpoint.
//!
//! One route (`/`) serves both envelopes: `GET ?path=...` reads and
//! `POST {path, ...}` writes, the same way the deployed script does. Every
//! POST body is recorded so tests can assert on what was sent.

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use foodhub_client::{ClientConfig, FoodHub, TokenBackend};

pub const ADMIN_PASSWORD: &str = "secret";

#[derive(Default)]
pub struct FakeApi {
    pub orders: Mutex<Vec<Value>>,
    pub menu: Mutex<Vec<Value>>,
    pub config: Mutex<Value>,
    pub posts: Mutex<Vec<Value>>,
    pub valid_tokens: Mutex<Vec<String>>,
    pub reject_new_orders: AtomicBool,
    /// Answer every request with an HTML error page.
    pub serve_html: AtomicBool,
    /// Answer single-order reads with an HTML error page; writes still work.
    pub fail_order_reads: AtomicBool,
    pub order_gets: AtomicU64,
    next_id: AtomicU64,
}

impl FakeApi {
    pub fn with_menu() -> Arc<Self> {
        let fake = FakeApi::default();
        *fake.menu.lock().unwrap() = vec![
            json!({ "id": 1, "name": "Burger", "description": "Beef", "price": 5000, "category": "mains", "available": true }),
            json!({ "id": 2, "name": "Fries", "description": "", "price": 2000, "category": "sides", "available": true }),
            json!({ "id": 3, "name": "Pilau", "price": 7000, "category": "mains", "available": false }),
        ];
        *fake.config.lock().unwrap() =
            json!({ "restaurant_name": "Mama Lishe", "currency_symbol": "TSh" });
        Arc::new(fake)
    }

    pub fn insert_order(&self, order_id: &str, status: &str, address: &str) {
        self.orders.lock().unwrap().push(json!({
            "order_id": order_id,
            "order_date": "2025-03-01T10:00:00Z",
            "customer_name": "Amina",
            "customer_phone": 712345678,
            "delivery_address": address,
            "notes": "",
            "items": [
                { "id": 1, "name": "Burger", "price": 5000, "quantity": 2 },
                { "id": 2, "name": "Fries", "price": 2000, "quantity": 1 }
            ],
            "total_amount": 12000,
            "status": status
        }));
    }

    pub fn set_status(&self, order_id: &str, status: &str) {
        let mut orders = self.orders.lock().unwrap();
        if let Some(order) = orders.iter_mut().find(|o| o["order_id"] == order_id) {
            order["status"] = json!(status);
        }
    }

    pub fn revoke_tokens(&self) {
        self.valid_tokens.lock().unwrap().clear();
    }

    pub fn posts_for(&self, path: &str) -> Vec<Value> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p["path"] == path)
            .cloned()
            .collect()
    }

    fn authorized(&self, token: Option<&str>) -> bool {
        token.is_some_and(|t| self.valid_tokens.lock().unwrap().iter().any(|v| v == t))
    }
}

fn rejected(error: &str) -> Value {
    json!({ "success": false, "error": error })
}

async fn read(State(fake): State<Arc<FakeApi>>, Query(q): Query<HashMap<String, String>>) -> Response {
    if fake.serve_html.load(Ordering::SeqCst) {
        return (StatusCode::OK, "<html><body>Script function not found: doGet</body></html>")
            .into_response();
    }
    let body = match q.get("path").map(String::as_str) {
        Some("menu") => {
            let items = fake.menu.lock().unwrap().clone();
            json!({ "success": true, "items": items })
        }
        Some("config") => {
            let config = fake.config.lock().unwrap().clone();
            json!({ "success": true, "config": config })
        }
        Some("orders") => {
            if fake.authorized(q.get("token").map(String::as_str)) {
                let orders = fake.orders.lock().unwrap().clone();
                json!({ "success": true, "orders": orders })
            } else {
                rejected("Unauthorized")
            }
        }
        Some("order") => {
            fake.order_gets.fetch_add(1, Ordering::SeqCst);
            if fake.fail_order_reads.load(Ordering::SeqCst) {
                return (StatusCode::OK, "<html>Service unavailable</html>").into_response();
            }
            let id = q.get("id").cloned().unwrap_or_default();
            let orders = fake.orders.lock().unwrap();
            match orders.iter().find(|o| o["order_id"] == id.as_str()) {
                Some(order) => json!({ "success": true, "order": order }),
                None => rejected("Order not found"),
            }
        }
        _ => rejected("Invalid path"),
    };
    Json(body).into_response()
}

async fn write(State(fake): State<Arc<FakeApi>>, Json(body): Json<Value>) -> Response {
    if fake.serve_html.load(Ordering::SeqCst) {
        return (StatusCode::OK, "<html>oops</html>").into_response();
    }
    fake.posts.lock().unwrap().push(body.clone());

    let path = body["path"].as_str().unwrap_or_default().to_string();
    let token = body["token"].as_str();
    let reply = match path.as_str() {
        "admin/login" => {
            if body["password"] == ADMIN_PASSWORD {
                let n = fake.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                let token = format!("tok-{n}");
                fake.valid_tokens.lock().unwrap().push(token.clone());
                json!({ "success": true, "token": token })
            } else {
                rejected("Invalid password")
            }
        }
        "order/create" => {
            if fake.reject_new_orders.load(Ordering::SeqCst) {
                rejected("Orders are closed")
            } else {
                let n = fake.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                let order_id = format!("ORD-{n:04}");
                let mut order = body.clone();
                order["order_id"] = json!(order_id);
                order["status"] = json!("pending");
                fake.orders.lock().unwrap().push(order);
                json!({ "success": true, "order_id": order_id })
            }
        }
        _ if !fake.authorized(token) => rejected("Unauthorized"),
        "order/update" => {
            let mut orders = fake.orders.lock().unwrap();
            match orders.iter_mut().find(|o| o["order_id"] == body["order_id"]) {
                Some(order) => {
                    for field in ["status", "customer_name", "customer_phone", "delivery_address", "notes"] {
                        if let Some(value) = body.get(field) {
                            order[field] = value.clone();
                        }
                    }
                    json!({ "success": true })
                }
                None => rejected("Order not found"),
            }
        }
        "menu/create" => {
            let mut item = body.clone();
            let n = 100 + fake.next_id.fetch_add(1, Ordering::SeqCst);
            item["id"] = json!(n);
            fake.menu.lock().unwrap().push(item);
            json!({ "success": true })
        }
        "menu/update" => {
            let mut menu = fake.menu.lock().unwrap();
            if let Some(item) = menu.iter_mut().find(|i| i["id"] == body["id"]) {
                *item = body.clone();
            }
            json!({ "success": true })
        }
        "menu/delete" => {
            fake.menu.lock().unwrap().retain(|i| i["id"] != body["itemId"]);
            json!({ "success": true })
        }
        "config/update" => {
            let mut config = fake.config.lock().unwrap();
            if let (Some(target), Some(updates)) = (config.as_object_mut(), body["updates"].as_object()) {
                for (k, v) in updates {
                    target.insert(k.clone(), v.clone());
                }
            }
            json!({ "success": true })
        }
        _ => rejected("Invalid path"),
    };
    Json(reply).into_response()
}

/// Serve `fake` on an ephemeral port; returns the base URL.
pub async fn serve(fake: Arc<FakeApi>) -> String {
    let app = Router::new()
        .route("/", get(read).post(write))
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A client against `base_url` with in-memory state and the local token
/// backend.
pub fn hub(base_url: &str, refresh: Duration) -> FoodHub {
    let config = ClientConfig::new(base_url)
        .with_token_backend(TokenBackend::Local)
        .with_refresh_interval(refresh)
        .with_request_timeout(Duration::from_secs(5));
    FoodHub::open(config).unwrap()
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..40 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}
