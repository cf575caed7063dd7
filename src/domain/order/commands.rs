use super::errors::OrderError;

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

impl OrderItemRequest {
    pub fn new(product_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub customer_id: String,
    pub items: Vec<OrderItemRequest>,
}

impl CreateOrder {
    pub fn new(customer_id: impl Into<String>, items: Vec<OrderItemRequest>) -> Self {
        Self {
            customer_id: customer_id.into(),
            items,
        }
    }

    /// Shape checks that need no catalog or ledger access.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.customer_id.trim().is_empty() {
            return Err(OrderError::InvalidRequest("Customer id cannot be blank".to_string()));
        }

        if self.items.is_empty() {
            return Err(OrderError::InvalidRequest("Order items cannot be empty".to_string()));
        }

        for item in &self.items {
            if item.product_id.trim().is_empty() {
                return Err(OrderError::InvalidRequest("Product id cannot be blank".to_string()));
            }
            if item.quantity == 0 {
                return Err(OrderError::InvalidRequest(format!(
                    "Invalid item quantity for {}: must be at least 1",
                    item.product_id
                )));
            }
        }

        Ok(())
    }
}
