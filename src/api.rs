//! Remote ordering API client.
//!
//! Every surface talks to one HTTP endpoint. Reads are `GET ?path=...` with a
//! cache-busting `t` parameter; writes are `POST` with a JSON envelope whose
//! `path` field routes the call. Every response is `{success, ...}`; a
//! `success:false` body carries the server's error text, with the literal
//! `Unauthorized` reserved for rejected session tokens.

use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::cart::CartLine;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::{MenuItem, MenuItemDraft, Order, OrderEdit, StoreConfig};

/// Characters of a non-JSON body kept in the error.
const MALFORMED_PREVIEW_CHARS: usize = 50;

const UNAUTHORIZED_ERROR: &str = "Unauthorized";

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the endpoint URL:
/// - ensure a scheme is present (https, or http for localhost)
/// - strip trailing slashes
pub fn normalize_api_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Read endpoints (`GET ?path=...`).
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Orders { token: String },
    Menu,
    Order { id: String },
    Config,
}

impl Query {
    pub fn path(&self) -> &'static str {
        match self {
            Query::Orders { .. } => "orders",
            Query::Menu => "menu",
            Query::Order { .. } => "order",
            Query::Config => "config",
        }
    }

    /// Query-string pairs, without the cache-busting timestamp.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("path", self.path().to_string())];
        match self {
            Query::Orders { token } => params.push(("token", token.clone())),
            Query::Order { id } => params.push(("id", id.clone())),
            Query::Menu | Query::Config => {}
        }
        params
    }
}

/// Customer checkout payload for `order/create`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub notes: String,
    pub items: Vec<CartLine>,
    pub total_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// Write envelopes (`POST {path, ...}`).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "path")]
pub enum Request {
    #[serde(rename = "admin/login")]
    AdminLogin { password: String },

    #[serde(rename = "order/create")]
    CreateOrder(NewOrder),

    #[serde(rename = "order/update")]
    UpdateOrder {
        token: String,
        order_id: String,
        #[serde(flatten)]
        edit: OrderEdit,
    },

    #[serde(rename = "menu/create")]
    CreateMenuItem {
        token: String,
        #[serde(flatten)]
        item: MenuItemDraft,
    },

    #[serde(rename = "menu/update")]
    UpdateMenuItem {
        token: String,
        #[serde(flatten)]
        item: MenuItemDraft,
    },

    #[serde(rename = "menu/delete")]
    DeleteMenuItem {
        token: String,
        #[serde(rename = "itemId")]
        item_id: i64,
    },

    #[serde(rename = "config/update")]
    UpdateConfig {
        token: String,
        updates: Map<String, Value>,
    },
}

impl Request {
    pub fn path(&self) -> &'static str {
        match self {
            Request::AdminLogin { .. } => "admin/login",
            Request::CreateOrder(_) => "order/create",
            Request::UpdateOrder { .. } => "order/update",
            Request::CreateMenuItem { .. } => "menu/create",
            Request::UpdateMenuItem { .. } => "menu/update",
            Request::DeleteMenuItem { .. } => "menu/delete",
            Request::UpdateConfig { .. } => "config/update",
        }
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a network error with a readable cause.
fn friendly_error(url: &str, err: &reqwest::Error) -> ClientError {
    if err.is_connect() {
        return ClientError::Network(format!("cannot reach {url}"));
    }
    if err.is_timeout() {
        return ClientError::Network(format!("connection to {url} timed out"));
    }
    if err.is_builder() {
        return ClientError::Network(format!("invalid endpoint URL: {url}"));
    }
    ClientError::Network(format!("error communicating with {url}: {err}"))
}

fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 | 403 => UNAUTHORIZED_ERROR.to_string(),
        404 => "Endpoint not found".to_string(),
        s if s >= 500 => format!("Server error (HTTP {s})"),
        s => format!("Unexpected response (HTTP {s})"),
    }
}

/// Interpret a response body as the `{success, ...}` envelope.
pub fn parse_envelope(body: &str) -> ClientResult<Value> {
    let value: Value = serde_json::from_str(body).map_err(|_| {
        let preview: String = body.trim().chars().take(MALFORMED_PREVIEW_CHARS).collect();
        ClientError::MalformedResponse(preview)
    })?;

    if value.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(value);
    }

    let error = value
        .get("error")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("Unknown error");
    if error == UNAUTHORIZED_ERROR {
        return Err(ClientError::Unauthorized);
    }
    Err(ClientError::Rejected(error.to_string()))
}

/// Pull a typed field out of a successful envelope.
fn take_field<T: DeserializeOwned>(envelope: &mut Value, field: &str) -> ClientResult<T> {
    let raw = envelope
        .get_mut(field)
        .map(Value::take)
        .filter(|v| !v.is_null())
        .ok_or_else(|| ClientError::MalformedResponse(format!("missing `{field}`")))?;
    serde_json::from_value(raw)
        .map_err(|e| ClientError::MalformedResponse(format!("invalid `{field}`: {e}")))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: normalize_api_url(&config.api_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform a read. Returns the full success envelope.
    pub async fn get(&self, query: &Query) -> ClientResult<Value> {
        let mut params = query.params();
        params.push(("t", Utc::now().timestamp_millis().to_string()));
        debug!(path = query.path(), "api GET");

        let resp = self
            .http
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        self.read_envelope(query.path(), resp).await
    }

    /// Perform a write. Returns the full success envelope.
    pub async fn post(&self, request: &Request) -> ClientResult<Value> {
        debug!(path = request.path(), "api POST");

        let resp = self
            .http
            .post(&self.base_url)
            .json(request)
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        self.read_envelope(request.path(), resp).await
    }

    async fn read_envelope(&self, path: &str, resp: reqwest::Response) -> ClientResult<Value> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;

        let result = match parse_envelope(&body) {
            Err(ClientError::MalformedResponse(_)) if !status.is_success() => {
                let message = status_error(status);
                if message == UNAUTHORIZED_ERROR {
                    Err(ClientError::Unauthorized)
                } else {
                    Err(ClientError::Rejected(message))
                }
            }
            other => other,
        };
        if let Err(err) = &result {
            warn!(path, status = status.as_u16(), error = %err, "api call failed");
        }
        result
    }

    // ------------------------------------------------------------------
    // Typed helpers
    // ------------------------------------------------------------------

    /// Exchange a password for a session token.
    pub async fn login(&self, password: &str) -> ClientResult<String> {
        let envelope = self
            .post(&Request::AdminLogin {
                password: password.to_string(),
            })
            .await?;
        envelope
            .get("token")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string)
            .ok_or_else(|| ClientError::Rejected("Login failed".to_string()))
    }

    pub async fn fetch_menu(&self) -> ClientResult<Vec<MenuItem>> {
        let mut envelope = self.get(&Query::Menu).await?;
        take_field(&mut envelope, "items")
    }

    pub async fn fetch_orders(&self, token: &str) -> ClientResult<Vec<Order>> {
        let mut envelope = self
            .get(&Query::Orders {
                token: token.to_string(),
            })
            .await?;
        take_field(&mut envelope, "orders")
    }

    /// Public single-order lookup; a success envelope without an order is
    /// reported as not found.
    pub async fn fetch_order(&self, order_id: &str) -> ClientResult<Order> {
        let mut envelope = self
            .get(&Query::Order {
                id: order_id.to_string(),
            })
            .await?;
        match take_field(&mut envelope, "order") {
            Err(ClientError::MalformedResponse(msg)) if msg.starts_with("missing") => {
                Err(ClientError::Rejected("Order not found".to_string()))
            }
            other => other,
        }
    }

    pub async fn fetch_config(&self) -> ClientResult<StoreConfig> {
        let mut envelope = self.get(&Query::Config).await?;
        take_field(&mut envelope, "config")
    }

    /// Place an order; returns the server-assigned order id.
    pub async fn create_order(&self, order: NewOrder) -> ClientResult<String> {
        let envelope = self.post(&Request::CreateOrder(order)).await?;
        match envelope.get("order_id") {
            Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.trim().to_string()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(ClientError::MalformedResponse("missing `order_id`".to_string())),
        }
    }

    pub async fn update_order(
        &self,
        token: &str,
        order_id: &str,
        edit: &OrderEdit,
    ) -> ClientResult<()> {
        self.post(&Request::UpdateOrder {
            token: token.to_string(),
            order_id: order_id.to_string(),
            edit: edit.clone(),
        })
        .await?;
        Ok(())
    }

    /// `menu/create` when the draft has no id, `menu/update` otherwise.
    pub async fn save_menu_item(&self, token: &str, item: &MenuItemDraft) -> ClientResult<()> {
        let request = if item.id.is_some() {
            Request::UpdateMenuItem {
                token: token.to_string(),
                item: item.clone(),
            }
        } else {
            Request::CreateMenuItem {
                token: token.to_string(),
                item: item.clone(),
            }
        };
        self.post(&request).await?;
        Ok(())
    }

    pub async fn delete_menu_item(&self, token: &str, item_id: i64) -> ClientResult<()> {
        self.post(&Request::DeleteMenuItem {
            token: token.to_string(),
            item_id,
        })
        .await?;
        Ok(())
    }

    pub async fn update_config(&self, token: &str, updates: Map<String, Value>) -> ClientResult<()> {
        self.post(&Request::UpdateConfig {
            token: token.to_string(),
            updates,
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderStatus;
    use serde_json::json;

    #[test]
    fn normalize_adds_scheme_and_trims() {
        assert_eq!(
            normalize_api_url(" script.example.com/macros/exec/ "),
            "https://script.example.com/macros/exec"
        );
        assert_eq!(normalize_api_url("localhost:3000/"), "http://localhost:3000");
        assert_eq!(
            normalize_api_url("http://127.0.0.1:9000"),
            "http://127.0.0.1:9000"
        );
    }

    #[test]
    fn envelope_success_and_rejections() {
        let ok = parse_envelope(r#"{"success":true,"token":"abc"}"#).unwrap();
        assert_eq!(ok["token"], "abc");

        let err = parse_envelope(r#"{"success":false,"error":"Invalid password"}"#).unwrap_err();
        assert!(matches!(err, ClientError::Rejected(ref m) if m == "Invalid password"));

        let err = parse_envelope(r#"{"success":false}"#).unwrap_err();
        assert!(matches!(err, ClientError::Rejected(ref m) if m == "Unknown error"));

        let err = parse_envelope(r#"{"success":false,"error":"Unauthorized"}"#).unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[test]
    fn envelope_non_json_is_distinct() {
        let html = "<!DOCTYPE html><html><head><title>Error</title></head><body>Script function not found</body></html>";
        match parse_envelope(html).unwrap_err() {
            ClientError::MalformedResponse(preview) => {
                assert_eq!(preview.chars().count(), 50);
                assert!(preview.starts_with("<!DOCTYPE html>"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn query_params_carry_path_and_arguments() {
        let q = Query::Orders {
            token: "tok".into(),
        };
        assert_eq!(
            q.params(),
            vec![("path", "orders".to_string()), ("token", "tok".to_string())]
        );
        assert_eq!(Query::Menu.params(), vec![("path", "menu".to_string())]);
    }

    #[test]
    fn request_envelopes_serialize_with_path_tag() {
        let login = serde_json::to_value(Request::AdminLogin {
            password: "hunter2".into(),
        })
        .unwrap();
        assert_eq!(login, json!({ "path": "admin/login", "password": "hunter2" }));

        let update = serde_json::to_value(Request::UpdateOrder {
            token: "tok".into(),
            order_id: "ORD-7".into(),
            edit: OrderEdit::status(OrderStatus::Delivered),
        })
        .unwrap();
        assert_eq!(
            update,
            json!({
                "path": "order/update",
                "token": "tok",
                "order_id": "ORD-7",
                "status": "delivered"
            })
        );

        let delete = serde_json::to_value(Request::DeleteMenuItem {
            token: "tok".into(),
            item_id: 4,
        })
        .unwrap();
        assert_eq!(
            delete,
            json!({ "path": "menu/delete", "token": "tok", "itemId": 4 })
        );
    }

    #[test]
    fn create_order_envelope_omits_missing_location() {
        let order = NewOrder {
            customer_name: "Amina".into(),
            customer_phone: "0712".into(),
            delivery_address: "Msasani".into(),
            notes: String::new(),
            items: vec![CartLine {
                id: 1,
                name: "Burger".into(),
                price: 5000.0,
                quantity: 2,
            }],
            total_amount: 10000.0,
            latitude: None,
            longitude: None,
        };
        let value = serde_json::to_value(Request::CreateOrder(order)).unwrap();
        assert_eq!(value["path"], "order/create");
        assert_eq!(value["items"][0]["quantity"], 2);
        assert!(value.get("latitude").is_none());
    }

    #[test]
    fn menu_draft_picks_create_or_update_fields() {
        let draft = MenuItemDraft {
            id: None,
            name: "Chai".into(),
            description: "Spiced tea".into(),
            price: 1500.0,
            category: "drinks".into(),
            image_url: String::new(),
            available: true,
        };
        let value = serde_json::to_value(Request::CreateMenuItem {
            token: "tok".into(),
            item: draft,
        })
        .unwrap();
        assert_eq!(value["path"], "menu/create");
        assert!(value.get("id").is_none());
        assert_eq!(value["available"], true);
    }

    #[test]
    fn take_field_reports_missing_and_invalid() {
        let mut envelope = json!({ "success": true, "items": "nope" });
        let err = take_field::<Vec<MenuItem>>(&mut envelope, "items").unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse(ref m) if m.starts_with("invalid")));

        let mut envelope = json!({ "success": true });
        let err = take_field::<Vec<MenuItem>>(&mut envelope, "items").unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse(ref m) if m.starts_with("missing")));
    }
}
