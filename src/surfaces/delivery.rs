//! Delivery agent scanner: look up an order by QR payload or typed id, open
//! its address in maps and mark it delivered.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::models::{Order, OrderEdit, OrderStatus};
use crate::session::{Session, SessionRole};
use crate::storage::TokenStore;
use crate::surfaces::{order_lines, OrderLineView};

const PIN_PREFIX: &str = "Pinned Location";
const MAPS_PIN_URL: &str = "https://www.google.com/maps";
const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapLink {
    pub url: String,
    pub label: &'static str,
    /// True when the link points at pinned coordinates rather than a search.
    pub exact: bool,
}

/// Maps link for an order's delivery address.
///
/// An address carrying `[Pinned Location: lat, lng]` links straight to the
/// coordinates. An address that mentions the marker without coordinates gets
/// no link at all; anything else becomes an address search.
pub fn map_link(order: &Order) -> Option<MapLink> {
    let address = order.delivery_address.as_str();
    if address.contains(PIN_PREFIX) {
        let coords = pinned_coordinates(address)?;
        let url = reqwest::Url::parse_with_params(MAPS_PIN_URL, &[("q", coords)]).ok()?;
        return Some(MapLink {
            url: url.to_string(),
            label: "📍 Open Exact Location in Maps",
            exact: true,
        });
    }
    let url =
        reqwest::Url::parse_with_params(MAPS_SEARCH_URL, &[("api", "1"), ("query", address)])
            .ok()?;
    Some(MapLink {
        url: url.to_string(),
        label: "📍 Search Address in Maps",
        exact: false,
    })
}

/// Text after `Pinned Location: ` up to the closing bracket (or the end).
fn pinned_coordinates(address: &str) -> Option<&str> {
    let marker = format!("{PIN_PREFIX}: ");
    let start = address.find(&marker)? + marker.len();
    let rest = &address[start..];
    let end = rest.find(']').unwrap_or(rest.len());
    Some(rest[..end].trim()).filter(|c| !c.is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryOrderView {
    pub order_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub status: String,
    pub items: Vec<OrderLineView>,
    pub map_link: Option<MapLink>,
    pub can_mark_delivered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryView {
    pub logged_in: bool,
    pub order: Option<DeliveryOrderView>,
    pub error: Option<String>,
    pub notice: Option<String>,
}

pub struct DeliveryScanner {
    api: ApiClient,
    session: Session,
    order: Option<Order>,
    error: Option<String>,
    notice: Option<String>,
    currency_symbol: String,
}

impl DeliveryScanner {
    pub fn new(api: ApiClient, tokens: TokenStore, currency_symbol: impl Into<String>) -> Self {
        Self {
            api,
            session: Session::restore(SessionRole::Delivery, tokens),
            order: None,
            error: None,
            notice: None,
            currency_symbol: currency_symbol.into(),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_logged_in()
    }

    pub fn current_order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    /// Re-read the stored delivery token.
    pub fn restore_session(&mut self) -> bool {
        self.session = Session::restore(SessionRole::Delivery, self.session.store().clone());
        self.is_logged_in()
    }

    pub async fn login(&mut self, password: String) -> ClientResult<()> {
        self.notice = None;
        match self.session.login(&self.api, password).await {
            Ok(()) => {
                self.error = None;
                Ok(())
            }
            Err(ClientError::Rejected(reason)) => {
                warn!("delivery login rejected: {reason}");
                let err = ClientError::Rejected("Invalid Password".to_string());
                self.error = Some(err.user_message());
                Err(err)
            }
            Err(e) => {
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    pub fn logout(&mut self) {
        self.session.logout();
        self.order = None;
        self.error = None;
        self.notice = None;
    }

    /// Look up an order from a scanned QR payload or a typed id. Blank input
    /// is ignored.
    pub async fn lookup(&mut self, raw_order_id: &str) -> ClientResult<Option<Order>> {
        let order_id = raw_order_id.trim();
        if order_id.is_empty() {
            return Ok(None);
        }
        self.notice = None;
        match self.api.fetch_order(order_id).await {
            Ok(order) => {
                info!(order_id = %order.order_id, status = %order.status, "delivery lookup");
                self.order = Some(order.clone());
                self.error = None;
                Ok(Some(order))
            }
            Err(e) => {
                self.order = None;
                self.error = Some(match &e {
                    ClientError::Rejected(m) => m.clone(),
                    _ => "Error fetching order".to_string(),
                });
                Err(e)
            }
        }
    }

    /// Mark the displayed order delivered, then reload it. Once the update is
    /// accepted the call succeeds; a failed reload keeps the local copy with
    /// the new status applied.
    pub async fn mark_delivered(&mut self) -> ClientResult<Order> {
        let mut order = self
            .order
            .clone()
            .ok_or_else(|| ClientError::Validation("No order selected".to_string()))?;
        let token = self.session.require_token()?;

        let edit = OrderEdit::status(OrderStatus::Delivered);
        if let Err(e) = self.api.update_order(&token, &order.order_id, &edit).await {
            if e.is_unauthorized() {
                warn!("delivery session rejected by server, logging out");
                self.logout();
            }
            self.error = Some(match &e {
                ClientError::Rejected(m) => format!("Failed: {m}"),
                ClientError::Unauthorized => e.user_message(),
                _ => "Error updating status".to_string(),
            });
            return Err(e);
        }

        info!(order_id = %order.order_id, "order marked delivered");
        self.notice = Some("Order marked as DELIVERED!".to_string());
        self.error = None;

        match self.api.fetch_order(&order.order_id).await {
            Ok(refreshed) => order = refreshed,
            Err(e) => {
                debug!(order_id = %order.order_id, "reload after delivery failed: {e}");
                edit.apply_to(&mut order);
            }
        }
        self.order = Some(order.clone());
        Ok(order)
    }

    pub fn map_link(&self) -> Option<MapLink> {
        self.order.as_ref().and_then(map_link)
    }

    /// Open the displayed order's map link in the system browser.
    pub fn open_map(&self) -> ClientResult<()> {
        let link = self
            .map_link()
            .ok_or_else(|| ClientError::Validation("No map location for this order".to_string()))?;
        webbrowser::open(&link.url)
            .map_err(|e| ClientError::System(format!("Failed to open maps: {e}")))?;
        info!(exact = link.exact, "opened order location in maps");
        Ok(())
    }

    pub fn view(&self) -> DeliveryView {
        DeliveryView {
            logged_in: self.session.is_logged_in(),
            order: self.order.as_ref().map(|order| DeliveryOrderView {
                order_id: order.order_id.clone(),
                customer_name: order.customer_name.clone(),
                customer_phone: order.customer_phone.clone(),
                delivery_address: order.delivery_address.clone(),
                status: order.status.as_str().to_string(),
                items: order_lines(&order.items, &self.currency_symbol),
                map_link: map_link(order),
                can_mark_delivered: !order.status.is_delivered(),
            }),
            error: self.error.clone(),
            notice: self.notice.clone(),
        }
    }
}
