//! Customer storefront: menu browsing, cart and checkout.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{ApiClient, NewOrder};
use crate::cart::{CartLine, CartStore};
use crate::db::DbState;
use crate::error::{ClientError, ClientResult};
use crate::menu::{self, CategoryFilter, MenuCard};
use crate::models::{format_money, GeoPoint, MenuItem, StoreConfig};
use crate::surfaces::write_last_order_id;

const PIN_MARKER: &str = "Pinned Location";
const EMPTY_MENU_MESSAGE: &str = "No menu items available";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum MenuState {
    Loading,
    Ready,
    Failed(String),
}

/// Checkout form as filled in by the customer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckoutForm {
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub notes: String,
    pub location: Option<GeoPoint>,
}

impl CheckoutForm {
    /// Attach a resolved location and append `[Pinned Location: lat, lng]`
    /// to the address unless one is already there.
    pub fn pin_location(&mut self, point: GeoPoint) {
        self.location = Some(point);
        if self.delivery_address.contains(PIN_MARKER) {
            return;
        }
        let pin = format!("[{PIN_MARKER}: {}, {}]", point.latitude, point.longitude);
        if self.delivery_address.is_empty() {
            self.delivery_address = pin;
        } else {
            self.delivery_address = format!("{}\n{pin}", self.delivery_address);
        }
    }

    fn validate(&self) -> ClientResult<()> {
        let required = [
            (&self.customer_name, "Please enter your name"),
            (&self.customer_phone, "Please enter your phone number"),
            (&self.delivery_address, "Please enter a delivery address"),
        ];
        for (value, message) in required {
            if value.trim().is_empty() {
                return Err(ClientError::Validation(message.to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLineView {
    pub id: i64,
    pub name: String,
    pub quantity: u32,
    pub line_total: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorefrontView {
    pub restaurant_name: Option<String>,
    pub menu_state: MenuState,
    pub category: String,
    pub categories: Vec<String>,
    pub menu: Vec<MenuCard>,
    /// Set when the menu loaded and has no items at all.
    pub empty_message: Option<&'static str>,
    pub cart: Vec<CartLineView>,
    pub cart_count: u32,
    pub cart_total: String,
    pub can_checkout: bool,
}

pub struct Storefront {
    api: ApiClient,
    db: Arc<DbState>,
    cart: CartStore,
    menu: Vec<MenuItem>,
    menu_state: MenuState,
    category: CategoryFilter,
    config: StoreConfig,
    currency_symbol: String,
}

impl Storefront {
    /// Open the storefront with the persisted cart.
    pub fn new(api: ApiClient, db: Arc<DbState>, currency_symbol: impl Into<String>) -> Self {
        let cart = CartStore::open(db.clone());
        Self {
            api,
            db,
            cart,
            menu: Vec::new(),
            menu_state: MenuState::Loading,
            category: CategoryFilter::All,
            config: StoreConfig::default(),
            currency_symbol: currency_symbol.into(),
        }
    }

    pub fn cart(&self) -> &CartStore {
        &self.cart
    }

    pub fn menu_items(&self) -> &[MenuItem] {
        &self.menu
    }

    pub fn menu_state(&self) -> &MenuState {
        &self.menu_state
    }

    pub fn currency_symbol(&self) -> &str {
        &self.currency_symbol
    }

    /// Apply remote branding and currency. Failure keeps the defaults.
    pub async fn load_config(&mut self) -> ClientResult<()> {
        match self.api.fetch_config().await {
            Ok(config) => {
                if let Some(symbol) = config
                    .currency_symbol
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                {
                    self.currency_symbol = symbol.to_string();
                }
                self.config = config;
                Ok(())
            }
            Err(e) => {
                warn!("store config not loaded: {e}");
                Err(e)
            }
        }
    }

    /// Replace the menu wholesale. On failure the previous items stay
    /// visible behind the error state.
    pub async fn load_menu(&mut self) -> ClientResult<()> {
        self.menu_state = MenuState::Loading;
        match self.api.fetch_menu().await {
            Ok(items) => {
                self.menu = items;
                self.menu_state = MenuState::Ready;
                Ok(())
            }
            Err(e) => {
                let message = match &e {
                    ClientError::Network(_) => e.user_message(),
                    _ => "Failed to load menu items".to_string(),
                };
                self.menu_state = MenuState::Failed(message);
                Err(e)
            }
        }
    }

    pub fn set_category(&mut self, raw: &str) {
        self.category = CategoryFilter::parse(raw);
    }

    pub fn categories(&self) -> Vec<String> {
        menu::categories(&self.menu)
    }

    /// Add one unit of a menu item by id. Unknown or unavailable items are
    /// ignored.
    pub fn add_to_cart(&mut self, item_id: i64) {
        match menu::find_item(&self.menu, item_id) {
            Some(item) if item.available => self.cart.add(item),
            Some(_) => warn!(item_id, "ignoring add of unavailable item"),
            None => {}
        }
    }

    pub fn remove_from_cart(&mut self, item_id: i64) {
        self.cart.remove(item_id);
    }

    pub fn update_quantity(&mut self, item_id: i64, delta: i64) {
        self.cart.update_quantity(item_id, delta);
    }

    /// Submit the cart as an order. On success the order id is remembered
    /// for tracking and the cart is cleared; on failure the cart is kept.
    pub async fn place_order(&mut self, form: &CheckoutForm) -> ClientResult<String> {
        if self.cart.is_empty() {
            return Err(ClientError::Validation("Your cart is empty".to_string()));
        }
        form.validate()?;

        let order = NewOrder {
            customer_name: form.customer_name.trim().to_string(),
            customer_phone: form.customer_phone.trim().to_string(),
            delivery_address: form.delivery_address.trim().to_string(),
            notes: form.notes.trim().to_string(),
            items: self.cart.lines().to_vec(),
            total_amount: self.cart.total(),
            latitude: form.location.map(|p| p.latitude),
            longitude: form.location.map(|p| p.longitude),
        };
        let lines = order.items.len();

        let order_id = self.api.create_order(order).await?;
        info!(order_id = %order_id, lines, "order placed");
        write_last_order_id(&self.db, &order_id);
        self.cart.clear();
        Ok(order_id)
    }

    pub fn view(&self) -> StorefrontView {
        let symbol = self.currency_symbol.as_str();
        // A failed load replaces the grid with the error.
        let cards: Vec<MenuCard> = match self.menu_state {
            MenuState::Failed(_) => Vec::new(),
            _ => menu::filter_by_category(&self.menu, &self.category)
                .map(|item| MenuCard::from_item(item, symbol))
                .collect(),
        };
        let empty_message = (self.menu_state == MenuState::Ready && self.menu.is_empty())
            .then_some(EMPTY_MENU_MESSAGE);
        StorefrontView {
            restaurant_name: self.config.restaurant_name.clone(),
            menu_state: self.menu_state.clone(),
            category: self.category.as_str().to_string(),
            categories: self.categories(),
            menu: cards,
            empty_message,
            cart: self
                .cart
                .lines()
                .iter()
                .map(|line: &CartLine| CartLineView {
                    id: line.id,
                    name: line.name.clone(),
                    quantity: line.quantity,
                    line_total: format_money(symbol, line.line_total()),
                })
                .collect(),
            cart_count: self.cart.item_count(),
            cart_total: format_money(symbol, self.cart.total()),
            can_checkout: !self.cart.is_empty(),
        }
    }
}
