//! Order tracking page.
//!
//! Looks an order up by id, renders its progress and keeps it fresh until
//! the order is delivered.

use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::db::DbState;
use crate::error::{ClientError, ClientResult};
use crate::models::{format_money, format_order_date, DateStyle, Order};
use crate::poller::{spawn_poller, PollControl, PollerHandle, RequestGeneration};
use crate::progress::{self, ProgressStep};
use crate::surfaces::{lock_state, order_lines, read_last_order_id, OrderLineView};

const QR_SERVICE_URL: &str = "https://api.qrserver.com/v1/create-qr-code/";

#[derive(Default)]
struct TrackerState {
    order_id: Option<String>,
    order: Option<Order>,
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedOrderView {
    pub order_id: String,
    pub order_date: String,
    pub status: String,
    pub status_label: String,
    pub badge_class: String,
    pub step_index: usize,
    pub steps: Vec<ProgressStep>,
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub items: Vec<OrderLineView>,
    pub total: String,
    pub notes: Option<String>,
    pub qr_code_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerView {
    pub order: Option<TrackedOrderView>,
    pub error: Option<String>,
    pub auto_refreshing: bool,
}

pub struct OrderTracker {
    api: ApiClient,
    db: Arc<DbState>,
    shared: Arc<Mutex<TrackerState>>,
    generation: RequestGeneration,
    refresh_interval: Duration,
    currency_symbol: String,
    poller: Option<PollerHandle>,
}

impl OrderTracker {
    pub fn new(
        api: ApiClient,
        db: Arc<DbState>,
        refresh_interval: Duration,
        currency_symbol: impl Into<String>,
    ) -> Self {
        Self {
            api,
            db,
            shared: Arc::new(Mutex::new(TrackerState::default())),
            generation: RequestGeneration::new(),
            refresh_interval,
            currency_symbol: currency_symbol.into(),
            poller: None,
        }
    }

    /// Id to pre-fill: an explicit (link) id wins over the last order placed
    /// on this device.
    pub fn initial_order_id(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .or_else(|| read_last_order_id(&self.db))
    }

    pub fn current_order(&self) -> Option<Order> {
        lock_state(&self.shared).order.clone()
    }

    pub fn is_auto_refreshing(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.is_finished())
    }

    /// Look up an order and start refreshing it until delivered.
    pub async fn track(&mut self, raw_order_id: &str) -> ClientResult<Order> {
        let order_id = raw_order_id.trim().to_string();
        if order_id.is_empty() {
            let err = ClientError::Validation("Please enter an order ID".to_string());
            lock_state(&self.shared).error = Some(err.user_message());
            return Err(err);
        }

        self.stop_auto_refresh();
        let generation = self.generation.begin();
        let result = self.api.fetch_order(&order_id).await;

        if !self.generation.is_current(generation) {
            debug!(order_id = %order_id, "discarding superseded tracking response");
            return result;
        }

        match result {
            Ok(order) => {
                {
                    let mut state = lock_state(&self.shared);
                    state.order_id = Some(order_id.clone());
                    state.order = Some(order.clone());
                    state.error = None;
                }
                info!(order_id = %order_id, status = %order.status, "tracking order");
                if !order.status.is_delivered() {
                    self.start_auto_refresh(order_id);
                }
                Ok(order)
            }
            Err(e) => {
                let message = match &e {
                    ClientError::Rejected(m) => m.clone(),
                    other => other.user_message(),
                };
                let mut state = lock_state(&self.shared);
                state.order_id = None;
                state.order = None;
                state.error = Some(message);
                Err(e)
            }
        }
    }

    fn start_auto_refresh(&mut self, order_id: String) {
        let api = self.api.clone();
        let shared = self.shared.clone();
        let generation = self.generation.clone();

        self.poller = Some(spawn_poller(
            "tracker",
            self.refresh_interval,
            move || {
                let api = api.clone();
                let shared = shared.clone();
                let generation = generation.clone();
                let order_id = order_id.clone();
                async move {
                    let ticket = generation.begin();
                    match api.fetch_order(&order_id).await {
                        Ok(order) if generation.is_current(ticket) => {
                            let delivered = order.status.is_delivered();
                            lock_state(&shared).order = Some(order);
                            if delivered {
                                info!(order_id = %order_id, "order delivered, tracking refresh stopped");
                                PollControl::Stop
                            } else {
                                PollControl::Continue
                            }
                        }
                        Ok(_) => PollControl::Stop,
                        Err(e) => {
                            debug!(order_id = %order_id, "tracking refresh failed: {e}");
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

    /// Back to the empty lookup form.
    pub fn reset(&mut self) {
        self.stop_auto_refresh();
        self.generation.invalidate();
        *lock_state(&self.shared) = TrackerState::default();
    }

    pub fn view(&self) -> TrackerView {
        let state = lock_state(&self.shared);
        TrackerView {
            order: state
                .order
                .as_ref()
                .map(|order| tracked_order_view(order, &self.currency_symbol)),
            error: state.error.clone(),
            auto_refreshing: self.is_auto_refreshing(),
        }
    }
}

fn tracked_order_view(order: &Order, currency_symbol: &str) -> TrackedOrderView {
    let qr_code_url = reqwest::Url::parse_with_params(
        QR_SERVICE_URL,
        &[("size", "200x200"), ("data", order.order_id.as_str())],
    )
    .map(|u| u.to_string())
    .unwrap_or_default();

    TrackedOrderView {
        order_id: order.order_id.clone(),
        order_date: format_order_date(&order.order_date, DateStyle::Long),
        status: order.status.as_str().to_string(),
        status_label: progress::status_label(&order.status),
        badge_class: progress::badge_class(&order.status),
        step_index: progress::step_index(&order.status),
        steps: progress::progress_steps(&order.status),
        customer_name: order.customer_name.clone(),
        customer_phone: order.customer_phone.clone(),
        delivery_address: order.delivery_address.clone(),
        items: order_lines(&order.items, currency_symbol),
        total: format_money(currency_symbol, order.total_amount),
        notes: order.notes.clone(),
        qr_code_url,
    }
}
