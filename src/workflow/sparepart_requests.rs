use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::authorize;
use super::errors::{Entity, WorkflowError, WorkflowResult};
use super::transitions::Transition;
use super::types::{
    Caller, CreateSparepartRequest, NewSparepartItem, SparepartItem, SparepartRequest,
    SparepartRequestStatus,
};
use super::work_orders::WorkOrderService;
use crate::clock::Clock;
use crate::store::{Change, Changeset, WorkflowStore};

/// Sparepart requests and their coupling to the parent work order status.
///
/// Both mutations here write the request and the work order in one
/// changeset, so storage never sees one without the other.
#[derive(Clone)]
pub struct SparepartRequestService {
    work_orders: WorkOrderService,
    store: Arc<dyn WorkflowStore>,
    clock: Arc<dyn Clock>,
}

impl SparepartRequestService {
    pub fn new(store: Arc<dyn WorkflowStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            work_orders: WorkOrderService::new(store.clone(), clock.clone()),
            store,
            clock,
        }
    }

    /// Raise a request and move the work order to WAITING_SPAREPART
    pub async fn create(
        &self,
        caller: &Caller,
        input: CreateSparepartRequest,
    ) -> WorkflowResult<SparepartRequest> {
        let transition = Transition::RequestSparepart;
        authorize(caller, transition.required_role(), transition.action())?;

        let work_order = self.work_orders.load(input.work_order_id).await?;
        let Some(next) = work_order.status.apply(transition) else {
            warn!(
                work_order.id = %work_order.id,
                status = %work_order.status,
                "Rejected sparepart request for ineligible work order"
            );
            return Err(WorkflowError::illegal_transition(transition, work_order.status));
        };

        let id = Uuid::new_v4();
        let items = validate_items(id, &input.items)?;
        let request = SparepartRequest {
            id,
            status: SparepartRequestStatus::Pending,
            work_order_id: work_order.id,
            requested_by: input.requested_by,
            approved_by: None,
            created_at: self.clock.now(),
            items,
        };

        self.store
            .commit(
                Changeset::new()
                    .with(Change::InsertSparepartRequest(request.clone()))
                    .with(Change::SetWorkOrderStatus {
                        id: work_order.id,
                        status: next,
                    }),
            )
            .await?;

        info!(
            request.id = %request.id,
            work_order.id = %work_order.id,
            items = request.items.len(),
            from = %work_order.status,
            to = %next,
            "Sparepart request created"
        );
        Ok(request)
    }

    /// Approve a pending request and put the work order back to ASSIGNED
    pub async fn approve(
        &self,
        caller: &Caller,
        request_id: Uuid,
        approver_id: Uuid,
    ) -> WorkflowResult<SparepartRequest> {
        let transition = Transition::SparepartApproved;
        authorize(caller, transition.required_role(), transition.action())?;

        let mut request = self.load(request_id).await?;
        let Some(approved) = request.status.approve() else {
            warn!(request.id = %request_id, status = %request.status, "Rejected approval of settled request");
            return Err(WorkflowError::invalid(format!(
                "Sparepart Request must be PENDING to approve (current status: {})",
                request.status
            )));
        };

        let work_order = self.work_orders.load(request.work_order_id).await?;
        let Some(next) = work_order.status.apply(transition) else {
            warn!(
                request.id = %request_id,
                work_order.id = %work_order.id,
                status = %work_order.status,
                "Rejected approval for settled work order"
            );
            return Err(WorkflowError::illegal_transition(transition, work_order.status));
        };

        request.status = approved;
        request.approved_by = Some(approver_id);

        self.store
            .commit(
                Changeset::new()
                    .with(Change::UpdateSparepartRequest(request.clone()))
                    .with(Change::SetWorkOrderStatus {
                        id: work_order.id,
                        status: next,
                    }),
            )
            .await?;

        info!(
            request.id = %request.id,
            work_order.id = %work_order.id,
            approved_by = %approver_id,
            from = %work_order.status,
            to = %next,
            "Sparepart request approved"
        );
        Ok(request)
    }

    pub async fn find_by_id(&self, id: Uuid) -> WorkflowResult<SparepartRequest> {
        self.load(id).await
    }

    /// Requests raised against one work order, oldest first
    pub async fn find_for_work_order(&self, work_order_id: Uuid) -> WorkflowResult<Vec<SparepartRequest>> {
        self.work_orders.load(work_order_id).await?;
        Ok(self.store.sparepart_requests_for(work_order_id).await?)
    }

    async fn load(&self, id: Uuid) -> WorkflowResult<SparepartRequest> {
        self.store
            .sparepart_request(id)
            .await?
            .ok_or(WorkflowError::NotFound {
                entity: Entity::SparepartRequest,
                id,
            })
    }
}

fn validate_items(request_id: Uuid, items: &[NewSparepartItem]) -> WorkflowResult<Vec<SparepartItem>> {
    if items.is_empty() {
        return Err(WorkflowError::invalid("A sparepart request needs at least one item"));
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let name = item.name.trim();
            if name.is_empty() {
                return Err(WorkflowError::invalid(format!(
                    "Sparepart item #{} has an empty name",
                    index + 1
                )));
            }
            let qty = u32::try_from(item.qty)
                .ok()
                .filter(|qty| *qty >= 1)
                .ok_or_else(|| {
                    WorkflowError::invalid(format!(
                        "Sparepart item \"{}\" must have a quantity of at least 1 (got {})",
                        name, item.qty
                    ))
                })?;
            Ok(SparepartItem {
                id: Uuid::new_v4(),
                request_id,
                name: name.to_string(),
                qty,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::{MemoryStore, MockWorkflowStore, StoreError};
    use crate::workflow::errors::ErrorKind;
    use crate::workflow::types::{Role, WorkOrder, WorkOrderStatus};
    use chrono::{TimeZone, Utc};

    fn work_order(status: WorkOrderStatus) -> WorkOrder {
        WorkOrder {
            id: Uuid::new_v4(),
            title: "Excavator Brake".to_string(),
            description: None,
            status,
            created_by: Uuid::new_v4(),
            assigned_mechanic_id: Some(Uuid::new_v4()),
            start_date: None,
            end_date: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
        }
    }

    async fn seeded(status: WorkOrderStatus) -> (SparepartRequestService, Arc<MemoryStore>, WorkOrder) {
        let store = Arc::new(MemoryStore::new());
        let wo = work_order(status);
        store
            .commit(Changeset::new().with(Change::InsertWorkOrder(wo.clone())))
            .await
            .unwrap();
        let clock = Arc::new(FixedClock::new(wo.created_at));
        (SparepartRequestService::new(store.clone(), clock), store, wo)
    }

    fn items(list: &[(&str, i64)]) -> Vec<NewSparepartItem> {
        list.iter()
            .map(|(name, qty)| NewSparepartItem {
                name: name.to_string(),
                qty: *qty,
            })
            .collect()
    }

    fn admin() -> Caller {
        Caller::new(Uuid::new_v4(), Role::Admin)
    }

    fn spv() -> Caller {
        Caller::new(Uuid::new_v4(), Role::Spv)
    }

    #[test]
    fn test_item_validation() {
        let id = Uuid::new_v4();
        assert!(validate_items(id, &[]).is_err());
        assert!(validate_items(id, &items(&[(" ", 1)])).is_err());
        assert!(validate_items(id, &items(&[("Pad", 0)])).is_err());
        assert!(validate_items(id, &items(&[("Pad", -3)])).is_err());

        let valid = validate_items(id, &items(&[(" Pad ", 2), ("Caliper", 1)])).unwrap();
        assert_eq!(valid[0].name, "Pad");
        assert_eq!(valid[0].request_id, id);
        assert_eq!(valid.iter().map(|i| i.qty).sum::<u32>(), 3);
    }

    #[tokio::test]
    async fn test_create_flips_work_order_to_waiting() {
        let (service, store, wo) = seeded(WorkOrderStatus::Working).await;
        let requestor = Uuid::new_v4();
        let request = service
            .create(
                &admin(),
                CreateSparepartRequest {
                    work_order_id: wo.id,
                    requested_by: requestor,
                    items: items(&[("Pad", 2)]),
                },
            )
            .await
            .unwrap();

        assert_eq!(request.status, SparepartRequestStatus::Pending);
        assert_eq!(request.requested_by, requestor);
        let stored = store.work_order(wo.id).await.unwrap().unwrap();
        assert_eq!(stored.status, WorkOrderStatus::WaitingSparepart);
    }

    #[tokio::test]
    async fn test_invalid_items_leave_work_order_untouched() {
        let (service, store, wo) = seeded(WorkOrderStatus::Assigned).await;
        let err = service
            .create(
                &admin(),
                CreateSparepartRequest {
                    work_order_id: wo.id,
                    requested_by: Uuid::new_v4(),
                    items: Vec::new(),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let stored = store.work_order(wo.id).await.unwrap().unwrap();
        assert_eq!(stored.status, WorkOrderStatus::Assigned);
    }

    #[tokio::test]
    async fn test_approve_twice_fails() {
        let (service, store, wo) = seeded(WorkOrderStatus::Assigned).await;
        let request = service
            .create(
                &admin(),
                CreateSparepartRequest {
                    work_order_id: wo.id,
                    requested_by: Uuid::new_v4(),
                    items: items(&[("Filter", 1)]),
                },
            )
            .await
            .unwrap();

        let approver = Uuid::new_v4();
        let approved = service.approve(&spv(), request.id, approver).await.unwrap();
        assert_eq!(approved.status, SparepartRequestStatus::Approved);
        assert_eq!(approved.approved_by, Some(approver));
        assert_eq!(
            store.work_order(wo.id).await.unwrap().unwrap().status,
            WorkOrderStatus::Assigned
        );

        let err = service.approve(&spv(), request.id, approver).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(err.to_string().contains("APPROVED"));
    }

    #[tokio::test]
    async fn test_approve_unknown_request_is_not_found() {
        let (service, _, _) = seeded(WorkOrderStatus::Assigned).await;
        let err = service
            .approve(&spv(), Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_find_for_missing_work_order() {
        let (service, _, _) = seeded(WorkOrderStatus::Assigned).await;
        let err = service.find_for_work_order(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_create_commits_request_and_status_together() {
        let wo = work_order(WorkOrderStatus::Assigned);
        let found = wo.clone();
        let mut store = MockWorkflowStore::new();
        store
            .expect_work_order()
            .returning(move |_| Ok(Some(found.clone())));
        let wo_id = wo.id;
        store
            .expect_commit()
            .withf(move |changes| {
                matches!(
                    changes.changes(),
                    [
                        Change::InsertSparepartRequest(request),
                        Change::SetWorkOrderStatus { id, status: WorkOrderStatus::WaitingSparepart },
                    ] if request.work_order_id == wo_id && *id == wo_id
                )
            })
            .times(1)
            .returning(|_| {
                Err(StoreError::Corrupt {
                    reason: "constraint failed".to_string(),
                })
            });

        let service = SparepartRequestService::new(Arc::new(store), Arc::new(FixedClock::new(wo.created_at)));
        let err = service
            .create(
                &admin(),
                CreateSparepartRequest {
                    work_order_id: wo.id,
                    requested_by: Uuid::new_v4(),
                    items: items(&[("Pad", 2)]),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
