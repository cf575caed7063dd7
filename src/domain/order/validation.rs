use std::sync::Arc;

use crate::inventory::StockLedger;

use super::commands::OrderItemRequest;
use super::errors::OrderError;
use super::value_objects::Product;

// ============================================================================
// Validator Chain
// ============================================================================
//
// Per-item checks run after the product is resolved and before its stock is
// reserved. New checks are added by pushing another validator into the chain
// at startup; the lifecycle manager does not change.
//
// ============================================================================

pub trait OrderValidator: Send + Sync {
    fn name(&self) -> &'static str;

    fn validate(&self, item: &OrderItemRequest, product: &Product) -> Result<(), OrderError>;
}

/// Ordered list of validators. The first failure wins.
#[derive(Default)]
pub struct ValidatorChain {
    validators: Vec<Box<dyn OrderValidator>>,
}

impl ValidatorChain {
    pub fn new(validators: Vec<Box<dyn OrderValidator>>) -> Self {
        Self { validators }
    }

    /// The shipped chain: stock sufficiency only.
    pub fn default_for(ledger: Arc<StockLedger>) -> Self {
        Self::new(Vec::new()).with(StockValidator::new(ledger))
    }

    pub fn with(mut self, validator: impl OrderValidator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn validate(&self, item: &OrderItemRequest, product: &Product) -> Result<(), OrderError> {
        for validator in &self.validators {
            if let Err(err) = validator.validate(item, product) {
                tracing::debug!(
                    validator = validator.name(),
                    product_id = %product.id,
                    code = err.code(),
                    "Order item rejected"
                );
                return Err(err);
            }
        }
        Ok(())
    }
}

/// Rejects an item when the ledger cannot cover its quantity.
pub struct StockValidator {
    ledger: Arc<StockLedger>,
}

impl StockValidator {
    pub fn new(ledger: Arc<StockLedger>) -> Self {
        Self { ledger }
    }
}

impl OrderValidator for StockValidator {
    fn name(&self) -> &'static str {
        "stock"
    }

    fn validate(&self, item: &OrderItemRequest, product: &Product) -> Result<(), OrderError> {
        if !self.ledger.has_stock(&item.product_id, item.quantity) {
            return Err(OrderError::InsufficientStock(format!(
                "Insufficient stock for '{}'.",
                product.name
            )));
        }
        Ok(())
    }
}
