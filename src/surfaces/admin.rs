//! Admin panel: order management, menu CRUD and store settings.
//!
//! Every authenticated call goes through [`AdminPanel::guard`], which turns an
//! `Unauthorized` answer into a logout (token cleared, order cache dropped,
//! auto refresh stopped) before handing the error back.

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::api::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::menu::MenuCard;
use crate::models::{
    format_money, format_order_date, DateStyle, MenuItem, MenuItemDraft, Order, OrderEdit,
    OrderStatus, StoreConfig, StoreSettings,
};
use crate::poller::{spawn_poller, PollControl, PollerHandle, RequestGeneration};
use crate::progress;
use crate::session::{Session, SessionRole};
use crate::storage::TokenStore;
use crate::surfaces::{lock_state, order_lines, OrderLineView};

const MIN_PASSWORD_LEN: usize = 4;
const PREVIEW_ITEMS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminTab {
    #[default]
    Orders,
    Menu,
    Settings,
}

impl AdminTab {
    pub fn title(self) -> &'static str {
        match self {
            AdminTab::Orders => "Orders Management",
            AdminTab::Menu => "Menu Management",
            AdminTab::Settings => "Settings",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OrderFilter {
    #[default]
    All,
    Status(OrderStatus),
}

impl OrderFilter {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "all" => OrderFilter::All,
            other => OrderFilter::Status(OrderStatus::parse(other)),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OrderFilter::All => "all",
            OrderFilter::Status(s) => s.as_str(),
        }
    }

    fn matches(&self, order: &Order) -> bool {
        match self {
            OrderFilter::All => true,
            OrderFilter::Status(s) => order.status == *s,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderCounts {
    pub all: usize,
    pub pending: usize,
    pub preparing: usize,
    pub ready: usize,
    pub out_for_delivery: usize,
    pub delivered: usize,
}

impl OrderCounts {
    /// Orders with an unrecognised status count toward `all` only.
    pub fn tally(orders: &[Order]) -> Self {
        let mut counts = OrderCounts {
            all: orders.len(),
            ..OrderCounts::default()
        };
        for order in orders {
            match order.status {
                OrderStatus::Pending => counts.pending += 1,
                OrderStatus::Preparing => counts.preparing += 1,
                OrderStatus::Ready => counts.ready += 1,
                OrderStatus::OutForDelivery => counts.out_for_delivery += 1,
                OrderStatus::Delivered => counts.delivered += 1,
                OrderStatus::Other(_) => {}
            }
        }
        counts
    }
}

/// `2× Burger, 1× Fries, +3 more`.
pub fn items_preview(order: &Order) -> String {
    if order.items.is_empty() {
        return "No items".to_string();
    }
    let preview = order
        .items
        .iter()
        .take(PREVIEW_ITEMS)
        .map(|item| format!("{}× {}", item.quantity, item.name))
        .collect::<Vec<_>>()
        .join(", ");
    if order.items.len() > PREVIEW_ITEMS {
        format!("{preview}, +{} more", order.items.len() - PREVIEW_ITEMS)
    } else {
        preview
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRow {
    pub order_id: String,
    pub order_date: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub items_preview: String,
    pub total: String,
    pub status: String,
    pub status_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetailView {
    pub order_id: String,
    pub order_date: String,
    pub status: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub items: Vec<OrderLineView>,
    pub total: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminView {
    pub logged_in: bool,
    pub tab: AdminTab,
    pub title: &'static str,
    pub filter: String,
    pub counts: OrderCounts,
    pub orders: Vec<OrderRow>,
    pub menu: Vec<MenuCard>,
    pub auto_refreshing: bool,
}

struct AdminState {
    session: Session,
    orders: Vec<Order>,
    menu: Vec<MenuItem>,
    settings: Option<StoreConfig>,
    filter: OrderFilter,
    tab: AdminTab,
}

impl AdminState {
    fn force_logout(&mut self) {
        warn!("admin session rejected by server, logging out");
        self.session.logout();
        self.orders.clear();
    }
}

pub struct AdminPanel {
    api: ApiClient,
    shared: Arc<Mutex<AdminState>>,
    orders_generation: RequestGeneration,
    refresh_interval: Duration,
    currency_symbol: String,
    poller: Option<PollerHandle>,
}

impl AdminPanel {
    /// Open the panel, resuming a stored session if there is one.
    pub fn new(
        api: ApiClient,
        tokens: TokenStore,
        refresh_interval: Duration,
        currency_symbol: impl Into<String>,
    ) -> Self {
        let state = AdminState {
            session: Session::restore(SessionRole::Admin, tokens),
            orders: Vec::new(),
            menu: Vec::new(),
            settings: None,
            filter: OrderFilter::All,
            tab: AdminTab::Orders,
        };
        Self {
            api,
            shared: Arc::new(Mutex::new(state)),
            orders_generation: RequestGeneration::new(),
            refresh_interval,
            currency_symbol: currency_symbol.into(),
            poller: None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        lock_state(&self.shared).session.is_logged_in()
    }

    pub fn is_auto_refreshing(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.is_finished())
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Re-read the stored token (another window may have logged in or out)
    /// and load the dashboard when a session exists.
    pub async fn restore_session(&mut self) -> bool {
        let session = Session::restore(SessionRole::Admin, self.token_store());
        lock_state(&self.shared).session = session;
        self.open_dashboard().await;
        self.is_logged_in()
    }

    /// Log in and load the dashboard (orders, menu, auto refresh).
    pub async fn login(&mut self, password: String) -> ClientResult<()> {
        let mut session = Session::restore(SessionRole::Admin, self.token_store());
        session.login(&self.api, password).await?;
        lock_state(&self.shared).session = session;
        self.open_dashboard().await;
        Ok(())
    }

    /// Load the dashboard for a restored session. A stale stored token is
    /// detected here and logs the panel out.
    pub async fn open_dashboard(&mut self) {
        if !self.is_logged_in() {
            return;
        }
        if let Err(e) = self.refresh_orders().await {
            debug!("initial order load failed: {e}");
        }
        if !self.is_logged_in() {
            return;
        }
        if let Err(e) = self.refresh_menu().await {
            debug!("initial menu load failed: {e}");
        }
        self.start_auto_refresh();
    }

    pub fn logout(&mut self) {
        self.stop_auto_refresh();
        self.orders_generation.invalidate();
        let mut state = lock_state(&self.shared);
        state.session.logout();
        state.orders.clear();
        state.settings = None;
    }

    fn token_store(&self) -> TokenStore {
        lock_state(&self.shared).session.store().clone()
    }

    fn require_token(&self) -> ClientResult<String> {
        lock_state(&self.shared).session.require_token()
    }

    /// Log out on `Unauthorized`, pass every result through.
    fn guard<T>(&mut self, result: ClientResult<T>) -> ClientResult<T> {
        if let Err(e) = &result {
            if e.is_unauthorized() {
                self.stop_auto_refresh();
                self.orders_generation.invalidate();
                lock_state(&self.shared).force_logout();
            }
        }
        result
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Switch tab, loading the data the tab shows.
    pub async fn select_tab(&mut self, tab: AdminTab) -> ClientResult<()> {
        lock_state(&self.shared).tab = tab;
        match tab {
            AdminTab::Orders => Ok(()),
            AdminTab::Menu => self.refresh_menu().await,
            AdminTab::Settings => self.load_settings().await.map(|_| ()),
        }
    }

    /// Manual refresh of whatever the current tab lists.
    pub async fn refresh(&mut self) -> ClientResult<()> {
        let tab = lock_state(&self.shared).tab;
        match tab {
            AdminTab::Orders => self.refresh_orders().await,
            AdminTab::Menu => self.refresh_menu().await,
            AdminTab::Settings => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    pub async fn refresh_orders(&mut self) -> ClientResult<()> {
        let result =
            fetch_orders_into(&self.api, &self.shared, &self.orders_generation).await;
        self.guard(result)
    }

    pub fn orders(&self) -> Vec<Order> {
        lock_state(&self.shared).orders.clone()
    }

    pub fn set_filter(&mut self, raw: &str) {
        lock_state(&self.shared).filter = OrderFilter::parse(raw);
    }

    pub fn order_counts(&self) -> OrderCounts {
        OrderCounts::tally(&lock_state(&self.shared).orders)
    }

    /// Change one order's status. The cached row is updated on success; on a
    /// business rejection the list is reloaded so it reflects the server.
    pub async fn update_status(&mut self, order_id: &str, status: OrderStatus) -> ClientResult<()> {
        let edit = OrderEdit::status(status);
        let token = self.require_token()?;
        let result = self.api.update_order(&token, order_id, &edit).await;
        match self.guard(result) {
            Ok(()) => {
                let mut state = lock_state(&self.shared);
                if let Some(order) = state.orders.iter_mut().find(|o| o.order_id == order_id) {
                    edit.apply_to(order);
                }
                info!(order_id, status = ?edit.status, "order status updated");
                Ok(())
            }
            Err(e @ ClientError::Rejected(_)) => {
                if let Err(reload) = self.refresh_orders().await {
                    debug!("reload after rejected status change failed: {reload}");
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub fn order(&self, order_id: &str) -> Option<OrderDetailView> {
        let state = lock_state(&self.shared);
        let order = state.orders.iter().find(|o| o.order_id == order_id)?;
        Some(OrderDetailView {
            order_id: order.order_id.clone(),
            order_date: format_order_date(&order.order_date, DateStyle::Short),
            status: order.status.as_str().to_string(),
            customer_name: order.customer_name.clone(),
            customer_phone: order.customer_phone.clone(),
            delivery_address: order.delivery_address.clone(),
            items: order_lines(&order.items, &self.currency_symbol),
            total: format_money(&self.currency_symbol, order.total_amount),
            notes: order.notes.clone(),
        })
    }

    /// Submit edits made in the order detail dialog, then reload the list.
    pub async fn save_order_edit(&mut self, order_id: &str, edit: OrderEdit) -> ClientResult<()> {
        let token = self.require_token()?;
        let result = self.api.update_order(&token, order_id, &edit).await;
        self.guard(result)?;
        info!(order_id, "order edited");
        if let Err(e) = self.refresh_orders().await {
            debug!("reload after order edit failed: {e}");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Menu
    // ------------------------------------------------------------------

    pub async fn refresh_menu(&mut self) -> ClientResult<()> {
        let items = self.api.fetch_menu().await?;
        lock_state(&self.shared).menu = items;
        Ok(())
    }

    pub fn menu_items(&self) -> Vec<MenuItem> {
        lock_state(&self.shared).menu.clone()
    }

    /// Draft for the edit dialog of an existing item.
    pub fn edit_draft(&self, item_id: i64) -> Option<MenuItemDraft> {
        lock_state(&self.shared)
            .menu
            .iter()
            .find(|i| i.id == item_id)
            .map(MenuItemDraft::from)
    }

    /// Create (no id) or update (id) a menu item, then reload the menu.
    pub async fn save_menu_item(&mut self, draft: MenuItemDraft) -> ClientResult<()> {
        if draft.name.trim().is_empty() {
            return Err(ClientError::Validation("Item name is required".to_string()));
        }
        if !draft.price.is_finite() || draft.price < 0.0 {
            return Err(ClientError::Validation("Price must be a positive number".to_string()));
        }
        let token = self.require_token()?;
        let result = self.api.save_menu_item(&token, &draft).await;
        self.guard(result)?;
        info!(item_id = ?draft.id, name = %draft.name, "menu item saved");
        self.refresh_menu().await
    }

    pub async fn delete_menu_item(&mut self, item_id: i64) -> ClientResult<()> {
        let token = self.require_token()?;
        let result = self.api.delete_menu_item(&token, item_id).await;
        self.guard(result)?;
        info!(item_id, "menu item deleted");
        self.refresh_menu().await
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub async fn load_settings(&mut self) -> ClientResult<StoreSettings> {
        let config = self.api.fetch_config().await?;
        let settings = StoreSettings::from(&config);
        lock_state(&self.shared).settings = Some(config);
        Ok(settings)
    }

    pub async fn save_settings(&mut self, settings: &StoreSettings) -> ClientResult<()> {
        let updates = match serde_json::to_value(settings) {
            Ok(Value::Object(map)) => map,
            _ => return Err(ClientError::Validation("Invalid settings".to_string())),
        };
        let token = self.require_token()?;
        let result = self.api.update_config(&token, updates).await;
        self.guard(result)?;
        info!("store settings saved");
        Ok(())
    }

    /// Change the shared admin password. The current password is verified
    /// first; success ends the session so the new password is used next.
    pub async fn change_password(
        &mut self,
        mut current: String,
        mut new_password: String,
        mut confirm: String,
    ) -> ClientResult<()> {
        let result = self
            .change_password_inner(&current, &new_password, &confirm)
            .await;
        current.zeroize();
        new_password.zeroize();
        confirm.zeroize();
        result
    }

    async fn change_password_inner(
        &mut self,
        current: &str,
        new_password: &str,
        confirm: &str,
    ) -> ClientResult<()> {
        if new_password != confirm {
            return Err(ClientError::Validation("New passwords do not match!".to_string()));
        }
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ClientError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters long!"
            )));
        }
        let token = self.require_token()?;

        match self.api.login(current).await {
            Ok(_) => {}
            Err(ClientError::Rejected(_)) => {
                return Err(ClientError::Validation(
                    "Current password is incorrect!".to_string(),
                ))
            }
            Err(e) => return Err(e),
        }

        let mut updates = Map::new();
        updates.insert(
            "admin_password".to_string(),
            Value::String(new_password.to_string()),
        );
        let result = self.api.update_config(&token, updates).await;
        self.guard(result)?;
        info!("admin password changed, ending session");
        self.logout();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Auto refresh
    // ------------------------------------------------------------------

    /// Refresh the order list every interval while the orders tab is open.
    /// The loop ends on logout or when the server rejects the token.
    pub fn start_auto_refresh(&mut self) {
        self.stop_auto_refresh();
        let api = self.api.clone();
        let shared = self.shared.clone();
        let generation = self.orders_generation.clone();

        self.poller = Some(spawn_poller(
            "admin-orders",
            self.refresh_interval,
            move || {
                let api = api.clone();
                let shared = shared.clone();
                let generation = generation.clone();
                async move {
                    let (logged_in, tab) = {
                        let state = lock_state(&shared);
                        (state.session.is_logged_in(), state.tab)
                    };
                    if !logged_in {
                        return PollControl::Stop;
                    }
                    if tab != AdminTab::Orders {
                        return PollControl::Continue;
                    }
                    match fetch_orders_into(&api, &shared, &generation).await {
                        Ok(()) => PollControl::Continue,
                        Err(ClientError::Unauthorized) => {
                            lock_state(&shared).force_logout();
                            PollControl::Stop
                        }
                        Err(ClientError::NotLoggedIn) => PollControl::Stop,
                        Err(e) => {
                            debug!("order auto refresh failed: {e}");
                            PollControl::Continue
                        }
                    }
                }
            },
        ));
    }

    pub fn stop_auto_refresh(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
    }

    // ------------------------------------------------------------------
    // View
    // ------------------------------------------------------------------

    pub fn view(&self) -> AdminView {
        let state = lock_state(&self.shared);
        let symbol = self.currency_symbol.as_str();
        AdminView {
            logged_in: state.session.is_logged_in(),
            tab: state.tab,
            title: state.tab.title(),
            filter: state.filter.as_str().to_string(),
            counts: OrderCounts::tally(&state.orders),
            orders: state
                .orders
                .iter()
                .filter(|o| state.filter.matches(o))
                .map(|order| OrderRow {
                    order_id: order.order_id.clone(),
                    order_date: format_order_date(&order.order_date, DateStyle::Short),
                    customer_name: order.customer_name.clone(),
                    customer_phone: order.customer_phone.clone(),
                    items_preview: items_preview(order),
                    total: format_money(symbol, order.total_amount),
                    status: order.status.as_str().to_string(),
                    status_label: progress::status_label(&order.status),
                })
                .collect(),
            menu: state
                .menu
                .iter()
                .map(|item| MenuCard::from_item(item, symbol))
                .collect(),
            auto_refreshing: self.is_auto_refreshing(),
        }
    }
}

/// Fetch the order list and replace the cache wholesale, unless a newer
/// fetch started meanwhile.
async fn fetch_orders_into(
    api: &ApiClient,
    shared: &Arc<Mutex<AdminState>>,
    generation: &RequestGeneration,
) -> ClientResult<()> {
    let token = lock_state(shared).session.require_token()?;
    let ticket = generation.begin();
    let orders = api.fetch_orders(&token).await?;
    if generation.is_current(ticket) {
        lock_state(shared).orders = orders;
    } else {
        debug!("discarding superseded order list");
    }
    Ok(())
}
