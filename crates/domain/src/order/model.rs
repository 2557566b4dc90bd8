//! Order model.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

use super::status::OrderStatus;

/// A line item within an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    /// Human-readable product name.
    pub product_name: String,

    /// Quantity ordered. Must be at least 1.
    pub quantity: u32,

    /// Price per unit in cents. Must not be negative.
    pub unit_price: Money,
}

impl OrderLineItem {
    /// Creates a new line item.
    pub fn new(product_name: impl Into<String>, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_name: product_name.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns the total price for this item (quantity * unit_price).
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// An order with its line items.
///
/// The total value is always derived from the items and never stored
/// independently of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier, generated at creation.
    pub id: OrderId,

    /// The customer who owns the order.
    pub customer_id: CustomerId,

    /// Current lifecycle status.
    pub status: OrderStatus,

    /// When the order was created.
    pub created_at: DateTime<Utc>,

    /// Ordered sequence of line items.
    pub items: Vec<OrderLineItem>,
}

impl Order {
    /// Creates a new pending order after validating its items.
    ///
    /// Fails with `Validation` if `items` is empty, any quantity is
    /// zero, or any unit price is negative.
    pub fn new(customer_id: CustomerId, items: Vec<OrderLineItem>) -> Result<Self, DomainError> {
        validate_items(&items)?;
        Ok(Self {
            id: OrderId::new(),
            customer_id,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            items,
        })
    }

    /// Returns the derived order total: Σ(quantity × unit price).
    pub fn total(&self) -> Money {
        self.items.iter().map(|item| item.total_price()).sum()
    }
}

fn validate_items(items: &[OrderLineItem]) -> Result<(), DomainError> {
    if items.is_empty() {
        return Err(DomainError::Validation(
            "order must contain at least one item".to_string(),
        ));
    }
    for item in items {
        if item.product_name.trim().is_empty() {
            return Err(DomainError::Validation(
                "item product name must not be empty".to_string(),
            ));
        }
        if item.quantity < 1 {
            return Err(DomainError::Validation(format!(
                "item '{}' quantity must be at least 1",
                item.product_name
            )));
        }
        if item.unit_price.is_negative() {
            return Err(DomainError::Validation(format!(
                "item '{}' price must not be negative",
                item.product_name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(quantity: u32, cents: i64) -> OrderLineItem {
        OrderLineItem::new("Widget", quantity, Money::from_cents(cents))
    }

    #[test]
    fn test_new_order_is_pending() {
        let order = Order::new(CustomerId::new(), vec![widget(1, 100)]).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 1);
    }

    #[test]
    fn test_total_is_derived_from_items() {
        let order = Order::new(
            CustomerId::new(),
            vec![widget(2, 2550), OrderLineItem::new("Gadget", 1, Money::from_cents(999))],
        )
        .unwrap();
        assert_eq!(order.total().cents(), 2 * 2550 + 999);
    }

    #[test]
    fn test_empty_items_rejected() {
        let result = Order::new(CustomerId::new(), vec![]);
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let result = Order::new(CustomerId::new(), vec![widget(0, 100)]);
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_negative_price_rejected() {
        let result = Order::new(CustomerId::new(), vec![widget(1, -1)]);
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_zero_price_allowed() {
        let order = Order::new(CustomerId::new(), vec![widget(1, 0)]).unwrap();
        assert_eq!(order.total().cents(), 0);
    }

    #[test]
    fn test_blank_product_name_rejected() {
        let item = OrderLineItem::new("  ", 1, Money::from_cents(100));
        let result = Order::new(CustomerId::new(), vec![item]);
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_line_item_total_price() {
        assert_eq!(widget(3, 1000).total_price().cents(), 3000);
    }

    #[test]
    fn test_order_serialization_roundtrip() {
        let order = Order::new(CustomerId::new(), vec![widget(2, 2550)]).unwrap();
        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, deserialized);
    }
}
