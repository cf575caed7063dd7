use dashmap::DashMap;

use crate::domain::order::{OrderError, Product};

// ============================================================================
// Catalog Lookup
// ============================================================================

/// Read access to product metadata.
pub trait Catalog: Send + Sync {
    fn get_product(&self, product_id: &str) -> Result<Product, OrderError>;
}

/// Catalog held in memory and seeded at startup.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: DashMap<String, Product>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_products(products: impl IntoIterator<Item = Product>) -> Self {
        let catalog = Self::new();
        for product in products {
            catalog.upsert(product);
        }
        catalog
    }

    /// Insert or replace a product. Existing orders keep the price they
    /// captured at creation.
    pub fn upsert(&self, product: Product) {
        self.products.insert(product.id.clone(), product);
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }
}

impl Catalog for InMemoryCatalog {
    fn get_product(&self, product_id: &str) -> Result<Product, OrderError> {
        self.products
            .get(product_id)
            .map(|product| product.clone())
            .ok_or_else(|| OrderError::ProductNotFound(product_id.to_string()))
    }
}
