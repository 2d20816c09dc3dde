//! Shared harness for workflow integration tests
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use work_order_flow::clock::FixedClock;
use work_order_flow::store::{MemoryStore, UserDirectory, WorkflowStore};
use work_order_flow::workflow::types::{
    CreateSparepartRequest, CreateWorkOrder, NewSparepartItem, SparepartRequest, WorkOrder,
    WorkOrderStatus,
};
use work_order_flow::{Caller, Role, SparepartRequestService, UserService, WorkOrderService};

/// Creation time of every work order made through the harness
pub fn created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
}

pub struct Harness {
    pub store: Arc<dyn WorkflowStore>,
    pub clock: Arc<FixedClock>,
    pub work_orders: WorkOrderService,
    pub spareparts: SparepartRequestService,
    pub users: UserService,
    pub admin: Caller,
    pub spv: Caller,
    pub mechanic: Caller,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_backend(Arc::new(MemoryStore::new()))
    }

    pub fn with_backend<S>(backend: Arc<S>) -> Self
    where
        S: WorkflowStore + UserDirectory + 'static,
    {
        let clock = Arc::new(FixedClock::new(created_at()));
        let store: Arc<dyn WorkflowStore> = backend.clone();
        Self {
            work_orders: WorkOrderService::new(store.clone(), clock.clone()),
            spareparts: SparepartRequestService::new(store.clone(), clock.clone()),
            users: UserService::new(backend),
            store,
            clock,
            admin: Caller::new(Uuid::new_v4(), Role::Admin),
            spv: Caller::new(Uuid::new_v4(), Role::Spv),
            mechanic: Caller::new(Uuid::new_v4(), Role::Mechanic),
        }
    }

    /// Caller with the given role and a fresh user id
    pub fn caller(role: Role) -> Caller {
        Caller::new(Uuid::new_v4(), role)
    }

    pub async fn create(&self, title: &str) -> WorkOrder {
        self.work_orders
            .create(
                &self.admin,
                CreateWorkOrder {
                    title: title.to_string(),
                    description: Some("desc".to_string()),
                },
            )
            .await
            .unwrap()
    }

    pub async fn request_spareparts(&self, work_order_id: Uuid, items: &[(&str, i64)]) -> SparepartRequest {
        self.spareparts
            .create(&self.admin, sparepart_input(work_order_id, self.admin.user_id, items))
            .await
            .unwrap()
    }

    /// Drive a new work order to `status` using only legal operations
    pub async fn work_order_in(&self, title: &str, status: WorkOrderStatus) -> WorkOrder {
        let wo = self.create(title).await;
        if status == WorkOrderStatus::Open {
            return wo;
        }

        self.work_orders.submit(&self.admin, wo.id).await.unwrap();
        if status == WorkOrderStatus::Submitted {
            return self.reload(wo.id).await;
        }

        self.work_orders
            .assign(&self.spv, wo.id, self.mechanic.user_id)
            .await
            .unwrap();
        match status {
            WorkOrderStatus::Assigned => return self.reload(wo.id).await,
            WorkOrderStatus::WaitingSparepart => {
                self.request_spareparts(wo.id, &[("Filter", 1)]).await;
                return self.reload(wo.id).await;
            }
            _ => {}
        }

        self.work_orders
            .start_working(&self.mechanic, wo.id)
            .await
            .unwrap();
        if status == WorkOrderStatus::Working {
            return self.reload(wo.id).await;
        }

        self.work_orders
            .complete(&self.admin, wo.id, None)
            .await
            .unwrap()
    }

    pub async fn reload(&self, id: Uuid) -> WorkOrder {
        self.work_orders.find_by_id(id).await.unwrap().work_order
    }
}

pub fn sparepart_input(work_order_id: Uuid, requested_by: Uuid, items: &[(&str, i64)]) -> CreateSparepartRequest {
    CreateSparepartRequest {
        work_order_id,
        requested_by,
        items: items
            .iter()
            .map(|(name, qty)| NewSparepartItem {
                name: name.to_string(),
                qty: *qty,
            })
            .collect(),
    }
}
