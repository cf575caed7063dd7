// ============================================================================
// Order Repository - persistence boundary
// ============================================================================
//
// The lifecycle manager and the promoter only see this trait. `save` is the
// single write path and performs an optimistic version check: the order's
// `version` must equal the stored one (0 for a new order), and the stored copy
// gets `version + 1`. A stale writer gets `VersionConflict` and nothing is
// written.
//
// ============================================================================

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::order::{Order, OrderError, OrderStatus};

pub use memory::InMemoryOrderRepository;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Concurrent modification of order {id}: expected version {expected}, found {actual}")]
    VersionConflict { id: Uuid, expected: i64, actual: i64 },

    #[error("Storage failure: {0}")]
    Storage(String),
}

/// Anything the caller cannot act on surfaces as an internal error.
impl From<RepositoryError> for OrderError {
    fn from(err: RepositoryError) -> Self {
        OrderError::Internal(err.to_string())
    }
}

/// Zero-based page index and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize).saturating_mul(self.size as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
    pub last: bool,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        let total_pages = if request.size == 0 {
            0
        } else {
            total_elements.div_ceil(request.size as u64) as u32
        };

        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages,
            last: request.page.saturating_add(1) >= total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            last: self.last,
        }
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert or update, returning the stored copy with its new version.
    async fn save(&self, order: Order) -> Result<Order, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, RepositoryError>;

    /// Orders of one customer, newest `created_at` first.
    async fn find_by_customer(
        &self,
        customer_id: &str,
        status: Option<OrderStatus>,
        request: PageRequest,
    ) -> Result<Page<Order>, RepositoryError>;

    /// PENDING orders created strictly before `cutoff`, oldest first.
    async fn find_pending_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>, RepositoryError>;
}
