//! Customer cart with write-through persistence.
//!
//! The cart is an ordered list of lines keyed by menu item id. Every mutation
//! rewrites the full snapshot to the local settings table before returning,
//! so a reload (or process restart) always sees the last mutation. The total
//! is recomputed from the lines on every call and never cached.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::db::{self, DbState};
use crate::models::MenuItem;

const CART_CATEGORY: &str = "storefront";
const CART_KEY: &str = "cart";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

pub struct CartStore {
    lines: Vec<CartLine>,
    db: Arc<DbState>,
}

impl CartStore {
    /// Load the persisted cart. A missing or unreadable snapshot yields an
    /// empty cart; lines with a zero quantity are dropped.
    pub fn open(db: Arc<DbState>) -> Self {
        let lines = load_snapshot(&db);
        debug!(lines = lines.len(), "cart loaded");
        Self { lines, db }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Σ quantity, shown on the cart badge.
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn total(&self) -> f64 {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn quantity_of(&self, item_id: i64) -> u32 {
        self.lines
            .iter()
            .find(|l| l.id == item_id)
            .map(|l| l.quantity)
            .unwrap_or(0)
    }

    /// Add one unit of `item`. An existing line is incremented, never
    /// duplicated.
    pub fn add(&mut self, item: &MenuItem) {
        match self.lines.iter_mut().find(|l| l.id == item.id) {
            Some(line) => line.quantity += 1,
            None => self.lines.push(CartLine {
                id: item.id,
                name: item.name.clone(),
                price: item.price,
                quantity: 1,
            }),
        }
        self.persist();
    }

    pub fn remove(&mut self, item_id: i64) {
        let before = self.lines.len();
        self.lines.retain(|l| l.id != item_id);
        if self.lines.len() != before {
            self.persist();
        }
    }

    /// Shift a line's quantity by `delta`; reaching zero or below removes the
    /// line. Absent ids are ignored.
    pub fn update_quantity(&mut self, item_id: i64, delta: i64) {
        let Some(pos) = self.lines.iter().position(|l| l.id == item_id) else {
            return;
        };
        let next = i64::from(self.lines[pos].quantity).saturating_add(delta);
        if next <= 0 {
            self.lines.remove(pos);
        } else {
            self.lines[pos].quantity = u32::try_from(next).unwrap_or(u32::MAX);
        }
        self.persist();
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.persist();
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.lines) {
            Ok(j) => j,
            Err(e) => {
                error!("cart serialize failed: {e}");
                return;
            }
        };
        let conn = match self.db.conn.lock() {
            Ok(c) => c,
            Err(e) => {
                error!("cart lock failed: {e}");
                return;
            }
        };
        if let Err(e) = db::set_setting(&conn, CART_CATEGORY, CART_KEY, &json) {
            error!("cart persist failed: {e}");
        }
    }
}

fn load_snapshot(db: &DbState) -> Vec<CartLine> {
    let raw = match db.conn.lock() {
        Ok(conn) => db::get_setting(&conn, CART_CATEGORY, CART_KEY),
        Err(e) => {
            error!("cart lock failed: {e}");
            None
        }
    };
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<CartLine>>(&raw) {
        Ok(lines) => {
            let total = lines.len();
            let kept: Vec<CartLine> = lines.into_iter().filter(|l| l.quantity >= 1).collect();
            if kept.len() != total {
                warn!(dropped = total - kept.len(), "cart snapshot had empty lines");
            }
            kept
        }
        Err(e) => {
            warn!("cart snapshot unreadable, starting empty: {e}");
            Vec::new()
        }
    }
}
