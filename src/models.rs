//! Records exchanged with the remote ordering endpoint.
//!
//! Everything here is server-owned: the client deserialises it, projects it
//! into view models and sends edits back through the API client. Decoding is
//! lenient (missing optional fields default, ids may arrive as numbers or
//! strings) because the endpoint is a spreadsheet-backed script that does not
//! keep a strict schema.

use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Fallback image when a menu item has no `image_url`.
pub const PLACEHOLDER_IMAGE_URL: &str = "https://via.placeholder.com/400x200?text=No+Image";

// ---------------------------------------------------------------------------
// Menu
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub available: bool,
}

impl MenuItem {
    pub fn image_or_placeholder(&self) -> &str {
        self.image_url.as_deref().unwrap_or(PLACEHOLDER_IMAGE_URL)
    }
}

/// Admin form payload for `menu/create` and `menu/update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItemDraft {
    /// `None` creates a new item, `Some` updates the existing one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub image_url: String,
    pub available: bool,
}

impl From<&MenuItem> for MenuItemDraft {
    fn from(item: &MenuItem) -> Self {
        Self {
            id: Some(item.id),
            name: item.name.clone(),
            description: item.description.clone(),
            price: item.price,
            category: item.category.clone(),
            image_url: item.image_url.clone().unwrap_or_default(),
            available: item.available,
        }
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Order lifecycle status.
///
/// The server accepts any string and does not enforce forward-only
/// transitions, so unknown values are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    OutForDelivery,
    Delivered,
    Other(String),
}

impl OrderStatus {
    /// The five statuses the UI knows, in stepper order.
    pub const KNOWN: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Other(raw) => raw,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "pending" => OrderStatus::Pending,
            "preparing" => OrderStatus::Preparing,
            "ready" => OrderStatus::Ready,
            "out_for_delivery" => OrderStatus::OutForDelivery,
            "delivered" => OrderStatus::Delivered,
            other => OrderStatus::Other(other.to_string()),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, OrderStatus::Delivered)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl From<String> for OrderStatus {
    fn from(raw: String) -> Self {
        OrderStatus::parse(&raw)
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

impl OrderItem {
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
    #[serde(default)]
    pub order_date: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub customer_phone: String,
    #[serde(default)]
    pub delivery_address: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub status: OrderStatus,
}

/// Admin edit of an existing order (`order/update`). Fields left `None` are
/// not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl OrderEdit {
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Apply the edit to a locally cached copy of the order.
    pub fn apply_to(&self, order: &mut Order) {
        if let Some(status) = &self.status {
            order.status = status.clone();
        }
        if let Some(name) = &self.customer_name {
            order.customer_name = name.clone();
        }
        if let Some(phone) = &self.customer_phone {
            order.customer_phone = phone.clone();
        }
        if let Some(address) = &self.delivery_address {
            order.delivery_address = address.clone();
        }
        if let Some(notes) = &self.notes {
            order.notes = Some(notes.clone()).filter(|n| !n.trim().is_empty());
        }
    }
}

/// A resolved latitude/longitude pair pinned at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

// ---------------------------------------------------------------------------
// Store settings
// ---------------------------------------------------------------------------

/// Remote store settings (`?path=config`). Unknown keys are kept in `extra`
/// so a save round-trips them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Editable subset of [`StoreConfig`] sent by the admin settings form.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreSettings {
    pub restaurant_name: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub address: String,
    pub logo_url: String,
}

impl From<&StoreConfig> for StoreSettings {
    fn from(config: &StoreConfig) -> Self {
        Self {
            restaurant_name: config.restaurant_name.clone().unwrap_or_default(),
            contact_phone: config.contact_phone.clone().unwrap_or_default(),
            contact_email: config.contact_email.clone().unwrap_or_default(),
            address: config.address.clone().unwrap_or_default(),
            logo_url: config.logo_url.clone().unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Format an amount with the currency symbol and two decimals (`Tzs12.50`).
pub fn format_money(symbol: &str, amount: f64) -> String {
    format!("{symbol}{amount:.2}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    /// `Jan 5, 2025, 03:04 PM` (tracking page).
    Long,
    /// `Jan 5, 03:04 PM` (admin table).
    Short,
}

/// Render a server timestamp in local time. Unparseable input is returned
/// unchanged.
pub fn format_order_date(raw: &str, style: DateStyle) -> String {
    let parsed = DateTime::parse_from_rfc3339(raw.trim());
    match parsed {
        Ok(dt) => {
            let local = dt.with_timezone(&Local);
            match style {
                DateStyle::Long => local.format("%b %-d, %Y, %I:%M %p").to_string(),
                DateStyle::Short => local.format("%b %-d, %I:%M %p").to_string(),
            }
        }
        Err(_) => raw.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_quantity() -> u32 {
    1
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
