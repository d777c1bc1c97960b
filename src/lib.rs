//! FoodHub client library.
//!
//! Client side of a small food-ordering service: a persisted cart, a typed
//! client for the remote JSON endpoint, order status projection and a
//! polling refresher, driven by four surfaces (storefront, admin panel,
//! delivery scanner, order tracker). Surfaces expose mutation methods plus
//! serialisable view models; rendering is left to the host.

pub mod api;
pub mod app;
pub mod cart;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod menu;
pub mod models;
pub mod poller;
pub mod progress;
pub mod session;
pub mod storage;
pub mod surfaces;

pub use api::ApiClient;
pub use app::FoodHub;
pub use cart::{CartLine, CartStore};
pub use config::{ClientConfig, TokenBackend};
pub use error::{ClientError, ClientResult};
pub use logging::{init_logging, LogConfig};
pub use models::{MenuItem, Order, OrderItem, OrderStatus, StoreConfig};
pub use surfaces::admin::AdminPanel;
pub use surfaces::delivery::DeliveryScanner;
pub use surfaces::storefront::Storefront;
pub use surfaces::tracker::OrderTracker;
