// In-process store used by tests and when no database is configured

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Change, Changeset, StoreError, StoreResult, UserDirectory, WorkflowStore};
use crate::workflow::types::{Role, SparepartRequest, User, WorkOrder};

#[derive(Debug, Clone, Default)]
struct Tables {
    work_orders: Vec<WorkOrder>,
    sparepart_requests: Vec<SparepartRequest>,
    users: Vec<User>,
}

impl Tables {
    fn work_order_mut(&mut self, id: Uuid) -> StoreResult<&mut WorkOrder> {
        self.work_orders
            .iter_mut()
            .find(|wo| wo.id == id)
            .ok_or(StoreError::MissingRecord {
                entity: "work order",
                id,
            })
    }

    /// Same rule as the partial unique index on the SQLite backend
    fn ensure_title_free(&self, work_order: &WorkOrder) -> StoreResult<()> {
        let taken = work_order.status.is_active()
            && self
                .work_orders
                .iter()
                .any(|wo| wo.id != work_order.id && wo.title == work_order.title && wo.status.is_active());
        if taken {
            return Err(StoreError::ActiveTitleTaken {
                title: work_order.title.clone(),
            });
        }
        Ok(())
    }

    fn apply(&mut self, change: Change) -> StoreResult<()> {
        match change {
            Change::InsertWorkOrder(work_order) => {
                if self.work_orders.iter().any(|wo| wo.id == work_order.id) {
                    return Err(StoreError::Duplicate {
                        entity: "work order",
                        id: work_order.id,
                    });
                }
                self.ensure_title_free(&work_order)?;
                self.work_orders.push(work_order);
            }
            Change::UpdateWorkOrder(work_order) => {
                self.ensure_title_free(&work_order)?;
                let existing = self.work_order_mut(work_order.id)?;
                *existing = work_order;
            }
            Change::SetWorkOrderStatus { id, status } => {
                self.work_order_mut(id)?.status = status;
            }
            Change::InsertSparepartRequest(request) => {
                // mirrors the foreign key a relational backend would enforce
                self.work_order_mut(request.work_order_id)?;
                if self.sparepart_requests.iter().any(|r| r.id == request.id) {
                    return Err(StoreError::Duplicate {
                        entity: "sparepart request",
                        id: request.id,
                    });
                }
                self.sparepart_requests.push(request);
            }
            Change::UpdateSparepartRequest(request) => {
                let existing = self
                    .sparepart_requests
                    .iter_mut()
                    .find(|r| r.id == request.id)
                    .ok_or(StoreError::MissingRecord {
                        entity: "sparepart request",
                        id: request.id,
                    })?;
                existing.status = request.status;
                existing.approved_by = request.approved_by;
            }
        }
        Ok(())
    }
}

/// Tables behind one lock; a commit is staged on a copy and swapped in whole.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn work_order(&self, id: Uuid) -> StoreResult<Option<WorkOrder>> {
        let tables = self.tables.read().await;
        Ok(tables.work_orders.iter().find(|wo| wo.id == id).cloned())
    }

    async fn work_orders(&self) -> StoreResult<Vec<WorkOrder>> {
        Ok(self.tables.read().await.work_orders.clone())
    }

    async fn active_work_order_by_title(&self, title: &str) -> StoreResult<Option<WorkOrder>> {
        let tables = self.tables.read().await;
        Ok(tables
            .work_orders
            .iter()
            .find(|wo| wo.title == title && wo.status.is_active())
            .cloned())
    }

    async fn sparepart_request(&self, id: Uuid) -> StoreResult<Option<SparepartRequest>> {
        let tables = self.tables.read().await;
        Ok(tables.sparepart_requests.iter().find(|r| r.id == id).cloned())
    }

    async fn sparepart_requests_for(&self, work_order_id: Uuid) -> StoreResult<Vec<SparepartRequest>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sparepart_requests
            .iter()
            .filter(|r| r.work_order_id == work_order_id)
            .cloned()
            .collect())
    }

    async fn commit(&self, changes: Changeset) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();
        for change in changes {
            staged.apply(change)?;
        }
        *tables = staged;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn users(&self, role: Option<Role>) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| role.map_or(true, |role| u.role == role))
            .cloned()
            .collect())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.id == user.id) {
            return Err(StoreError::Duplicate {
                entity: "user",
                id: user.id,
            });
        }
        tables.users.push(user.clone());
        Ok(())
    }
}
