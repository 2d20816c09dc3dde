//! Storage collaborator interface
//!
//! The workflow services only read through these traits and write through
//! [`WorkflowStore::commit`], which applies a whole [`Changeset`] atomically.
//! Backends: [`MemoryStore`] here and `SqliteStore` in `crate::database`.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::workflow::types::{Role, SparepartRequest, User, WorkOrder, WorkOrderStatus};

pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} {id} does not exist")]
    MissingRecord { entity: &'static str, id: Uuid },

    #[error("{entity} {id} already exists")]
    Duplicate { entity: &'static str, id: Uuid },

    /// Another non-completed work order already uses this title
    #[error("an active work order is already titled \"{title}\"")]
    ActiveTitleTaken { title: String },

    #[error("corrupt record: {reason}")]
    Corrupt { reason: String },
}

/// A single mutation inside a [`Changeset`]
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    InsertWorkOrder(WorkOrder),
    /// Rewrites every mutable column of the work order
    UpdateWorkOrder(WorkOrder),
    SetWorkOrderStatus { id: Uuid, status: WorkOrderStatus },
    /// Inserts the request together with its items
    InsertSparepartRequest(SparepartRequest),
    /// Rewrites status and approver; items are immutable
    UpdateSparepartRequest(SparepartRequest),
}

/// Ordered batch of changes that commit together or not at all
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset {
    changes: Vec<Change>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, change: Change) -> Self {
        self.changes.push(change);
        self
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }
}

impl IntoIterator for Changeset {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn work_order(&self, id: Uuid) -> StoreResult<Option<WorkOrder>>;

    /// All work orders in creation order
    async fn work_orders(&self) -> StoreResult<Vec<WorkOrder>>;

    /// A work order with this exact title whose status is not COMPLETED
    async fn active_work_order_by_title(&self, title: &str) -> StoreResult<Option<WorkOrder>>;

    /// Request with its items
    async fn sparepart_request(&self, id: Uuid) -> StoreResult<Option<SparepartRequest>>;

    async fn sparepart_requests_for(&self, work_order_id: Uuid) -> StoreResult<Vec<SparepartRequest>>;

    /// Apply every change in one transaction
    async fn commit(&self, changes: Changeset) -> StoreResult<()>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Users in provisioning order, optionally restricted to one role
    async fn users(&self, role: Option<Role>) -> StoreResult<Vec<User>>;

    async fn insert_user(&self, user: &User) -> StoreResult<()>;
}
