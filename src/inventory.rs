use dashmap::DashMap;

use crate::domain::order::OrderError;

// ============================================================================
// Stock Ledger - authoritative available quantity per product
// ============================================================================
//
// DashMap shards act as a striped lock keyed by product id. reserve() does
// its check and its decrement under a single `get_mut` guard, so two
// reservations of the same product are serialized and the quantity can never
// drop below zero. Different products only contend on shard collisions.
//
// ============================================================================

#[derive(Debug, Default)]
pub struct StockLedger {
    stock: DashMap<String, u32>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from startup seed data.
    pub fn from_seed<I, K>(seed: I) -> Self
    where
        I: IntoIterator<Item = (K, u32)>,
        K: Into<String>,
    {
        let ledger = Self::new();
        for (product_id, quantity) in seed {
            ledger.seed(product_id, quantity);
        }
        ledger
    }

    /// Set the starting quantity of a product. Startup only.
    pub fn seed(&self, product_id: impl Into<String>, quantity: u32) {
        self.stock.insert(product_id.into(), quantity);
    }

    /// Unknown products have no stock.
    pub fn has_stock(&self, product_id: &str, quantity: u32) -> bool {
        self.stock
            .get(product_id)
            .map(|available| *available >= quantity)
            .unwrap_or(false)
    }

    pub fn reserve(&self, product_id: &str, quantity: u32) -> Result<(), OrderError> {
        let mut available = self
            .stock
            .get_mut(product_id)
            .ok_or_else(|| OrderError::StockNotFound(product_id.to_string()))?;

        if *available < quantity {
            return Err(OrderError::InsufficientStock(format!(
                "Insufficient stock for: {}",
                product_id
            )));
        }

        *available -= quantity;

        tracing::debug!(
            product_id = %product_id,
            quantity = quantity,
            remaining = *available,
            "Reserved stock"
        );

        Ok(())
    }

    /// Releasing stock for a product the ledger does not know is dropped.
    pub fn release(&self, product_id: &str, quantity: u32) {
        match self.stock.get_mut(product_id) {
            Some(mut available) => {
                *available = available.saturating_add(quantity);
                tracing::debug!(
                    product_id = %product_id,
                    quantity = quantity,
                    remaining = *available,
                    "Released stock"
                );
            }
            None => {
                tracing::warn!(
                    product_id = %product_id,
                    quantity = quantity,
                    "Release for unknown product ignored"
                );
            }
        }
    }

    pub fn available(&self, product_id: &str) -> Option<u32> {
        self.stock.get(product_id).map(|available| *available)
    }
}
