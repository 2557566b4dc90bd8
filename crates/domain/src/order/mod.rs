//! Order aggregate: model, status machine, store, and service.

pub mod model;
pub mod service;
pub mod status;
pub mod store;

pub use model::{Order, OrderLineItem};
pub use service::OrderService;
pub use status::OrderStatus;
pub use store::{InMemoryOrderStore, OrderStore};
