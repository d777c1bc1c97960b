//! The four client surfaces.
//!
//! Each surface owns its state and exposes mutation methods plus a `view()`
//! that derives a serialisable view model for the presentation layer.

pub mod admin;
pub mod delivery;
pub mod storefront;
pub mod tracker;

use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use crate::db::{self, DbState};
use crate::models::{format_money, OrderItem};

const STOREFRONT_CATEGORY: &str = "storefront";
const LAST_ORDER_ID_KEY: &str = "last_order_id";

/// Last order id placed from this device, used to pre-fill the tracker.
pub fn read_last_order_id(db: &DbState) -> Option<String> {
    let conn = db.conn.lock().ok()?;
    db::get_setting(&conn, STOREFRONT_CATEGORY, LAST_ORDER_ID_KEY).filter(|s| !s.trim().is_empty())
}

pub(crate) fn write_last_order_id(db: &DbState, order_id: &str) {
    match db.conn.lock() {
        Ok(conn) => {
            if let Err(e) = db::set_setting(&conn, STOREFRONT_CATEGORY, LAST_ORDER_ID_KEY, order_id)
            {
                warn!("last order id not persisted: {e}");
            }
        }
        Err(e) => warn!("last order id lock failed: {e}"),
    }
}

/// Lock shared surface state. A poisoned lock still holds consistent data
/// (every mutation is a single assignment), so it is recovered.
pub(crate) fn lock_state<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One line of a placed order as shown on the tracker, admin detail and
/// delivery screens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLineView {
    pub quantity: u32,
    pub name: String,
    pub line_total: String,
}

pub(crate) fn order_lines(items: &[OrderItem], currency_symbol: &str) -> Vec<OrderLineView> {
    items
        .iter()
        .map(|item| OrderLineView {
            quantity: item.quantity,
            name: item.name.clone(),
            line_total: format_money(currency_symbol, item.line_total()),
        })
        .collect()
}
