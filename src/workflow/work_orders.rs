use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::errors::{Entity, WorkflowError, WorkflowResult};
use super::transitions::Transition;
use super::types::{
    Caller, CreateWorkOrder, Role, UpdateWorkOrder, WorkOrder, WorkOrderDetail, WorkOrderStatus,
};
use super::authorize;
use crate::clock::Clock;
use crate::store::{Change, Changeset, WorkflowStore};

/// Work order lifecycle: creation, the status transitions and read projections
#[derive(Clone)]
pub struct WorkOrderService {
    store: Arc<dyn WorkflowStore>,
    clock: Arc<dyn Clock>,
}

impl WorkOrderService {
    pub fn new(store: Arc<dyn WorkflowStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn create(&self, caller: &Caller, input: CreateWorkOrder) -> WorkflowResult<WorkOrder> {
        authorize(caller, Role::Admin, "create work orders")?;

        let title = validate_title(&input.title)?;
        self.ensure_title_free(&title, None).await?;

        let work_order = WorkOrder {
            id: Uuid::new_v4(),
            title,
            description: input.description,
            status: WorkOrderStatus::Open,
            created_by: caller.user_id,
            assigned_mechanic_id: None,
            start_date: None,
            end_date: None,
            created_at: self.clock.now(),
        };

        self.store
            .commit(Changeset::new().with(Change::InsertWorkOrder(work_order.clone())))
            .await?;

        info!(
            work_order.id = %work_order.id,
            title = %work_order.title,
            created_by = %caller.user_id,
            "Created work order"
        );
        Ok(work_order)
    }

    pub async fn submit(&self, caller: &Caller, id: Uuid) -> WorkflowResult<WorkOrder> {
        self.transition(caller, id, Transition::Submit, |_, _| Ok(()))
            .await
    }

    pub async fn assign(&self, caller: &Caller, id: Uuid, mechanic_id: Uuid) -> WorkflowResult<WorkOrder> {
        self.transition(caller, id, Transition::Assign, |wo, _| {
            wo.assigned_mechanic_id = Some(mechanic_id);
            Ok(())
        })
        .await
    }

    /// Resuming from WAITING_SPAREPART keeps the first start time
    pub async fn start_working(&self, caller: &Caller, id: Uuid) -> WorkflowResult<WorkOrder> {
        self.transition(caller, id, Transition::StartWorking, |wo, now| {
            wo.start_date.get_or_insert(now);
            Ok(())
        })
        .await
    }

    /// Rewrites title and/or description. Status is never touched.
    pub async fn update(&self, caller: &Caller, id: Uuid, input: UpdateWorkOrder) -> WorkflowResult<WorkOrder> {
        authorize(caller, Role::Admin, "update work orders")?;
        let mut work_order = self.load(id).await?;

        if let Some(title) = input.title {
            let title = validate_title(&title)?;
            // a completed order never holds its title
            if work_order.status.is_active() && title != work_order.title {
                self.ensure_title_free(&title, Some(id)).await?;
            }
            work_order.title = title;
        }
        if let Some(description) = input.description {
            work_order.description = Some(description);
        }

        self.store
            .commit(Changeset::new().with(Change::UpdateWorkOrder(work_order.clone())))
            .await?;

        info!(work_order.id = %id, "Updated work order details");
        Ok(work_order)
    }

    /// Completes the order at `end_date`, or now when omitted
    pub async fn complete(
        &self,
        caller: &Caller,
        id: Uuid,
        end_date: Option<DateTime<Utc>>,
    ) -> WorkflowResult<WorkOrder> {
        self.transition(caller, id, Transition::Complete, |wo, now| {
            let end = end_date.unwrap_or(now);
            if end < wo.created_at {
                return Err(WorkflowError::invalid(format!(
                    "End date {} cannot be before the creation date {}",
                    end.to_rfc3339(),
                    wo.created_at.to_rfc3339()
                )));
            }
            wo.end_date = Some(end);
            Ok(())
        })
        .await
    }

    pub async fn find_by_id(&self, id: Uuid) -> WorkflowResult<WorkOrderDetail> {
        let work_order = self.load(id).await?;
        self.detail(work_order).await
    }

    pub async fn find_all(&self) -> WorkflowResult<Vec<WorkOrderDetail>> {
        let work_orders = self.store.work_orders().await?;
        let mut details = Vec::with_capacity(work_orders.len());
        for work_order in work_orders {
            details.push(self.detail(work_order).await?);
        }
        Ok(details)
    }

    pub(crate) async fn load(&self, id: Uuid) -> WorkflowResult<WorkOrder> {
        self.store
            .work_order(id)
            .await?
            .ok_or(WorkflowError::NotFound {
                entity: Entity::WorkOrder,
                id,
            })
    }

    async fn detail(&self, work_order: WorkOrder) -> WorkflowResult<WorkOrderDetail> {
        let sparepart_requests = self.store.sparepart_requests_for(work_order.id).await?;
        Ok(WorkOrderDetail {
            work_order,
            sparepart_requests,
        })
    }

    async fn ensure_title_free(&self, title: &str, except: Option<Uuid>) -> WorkflowResult<()> {
        match self.store.active_work_order_by_title(title).await? {
            Some(existing) if Some(existing.id) != except => {
                warn!(
                    title = %title,
                    existing.id = %existing.id,
                    status = %existing.status,
                    "Rejected duplicate active title"
                );
                Err(WorkflowError::invalid(format!(
                    "A work order titled \"{}\" is still active (status: {})",
                    title, existing.status
                )))
            }
            _ => Ok(()),
        }
    }

    /// Role gate, load, table lookup, field edits, then a single commit
    async fn transition<F>(
        &self,
        caller: &Caller,
        id: Uuid,
        transition: Transition,
        edit: F,
    ) -> WorkflowResult<WorkOrder>
    where
        F: FnOnce(&mut WorkOrder, DateTime<Utc>) -> WorkflowResult<()>,
    {
        authorize(caller, transition.required_role(), transition.action())?;
        let mut work_order = self.load(id).await?;

        let from = work_order.status;
        let Some(to) = from.apply(transition) else {
            warn!(
                work_order.id = %id,
                status = %from,
                transition = ?transition,
                "Rejected illegal transition"
            );
            return Err(WorkflowError::illegal_transition(transition, from));
        };

        edit(&mut work_order, self.clock.now())?;
        work_order.status = to;

        self.store
            .commit(Changeset::new().with(Change::UpdateWorkOrder(work_order.clone())))
            .await?;

        info!(
            work_order.id = %id,
            from = %from,
            to = %to,
            role = %caller.authority,
            "Work order transitioned"
        );
        Ok(work_order)
    }
}

fn validate_title(title: &str) -> WorkflowResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(WorkflowError::invalid("Work order title cannot be empty"));
    }
    Ok(title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::{MemoryStore, MockWorkflowStore, StoreError};
    use crate::workflow::errors::ErrorKind;
    use chrono::TimeZone;

    fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
    }

    fn setup() -> (WorkOrderService, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(created_at()));
        let service = WorkOrderService::new(Arc::new(MemoryStore::new()), clock.clone());
        (service, clock)
    }

    fn admin() -> Caller {
        Caller::new(Uuid::new_v4(), Role::Admin)
    }

    fn input(title: &str) -> CreateWorkOrder {
        CreateWorkOrder {
            title: title.to_string(),
            description: Some("desc".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_opens_order() {
        let (service, _) = setup();
        let caller = admin();
        let wo = service.create(&caller, input("  Excavator Brake ")).await.unwrap();

        assert_eq!(wo.title, "Excavator Brake");
        assert_eq!(wo.status, WorkOrderStatus::Open);
        assert_eq!(wo.created_by, caller.user_id);
        assert_eq!(wo.created_at, created_at());
        assert!(wo.start_date.is_none() && wo.end_date.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title() {
        let (service, _) = setup();
        let err = service.create(&admin(), input("   ")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_start_working_keeps_first_start_date() {
        let (service, clock) = setup();
        let wo = service.create(&admin(), input("Loader")).await.unwrap();
        service.submit(&admin(), wo.id).await.unwrap();
        let spv = Caller::new(Uuid::new_v4(), Role::Spv);
        service.assign(&spv, wo.id, Uuid::new_v4()).await.unwrap();

        clock.advance(chrono::Duration::hours(1));
        let mechanic = Caller::new(Uuid::new_v4(), Role::Mechanic);
        let started = service.start_working(&mechanic, wo.id).await.unwrap();
        let first_start = started.start_date.unwrap();

        // bounce through the sparepart branch directly in storage
        service
            .store
            .commit(Changeset::new().with(Change::SetWorkOrderStatus {
                id: wo.id,
                status: WorkOrderStatus::WaitingSparepart,
            }))
            .await
            .unwrap();

        clock.advance(chrono::Duration::hours(3));
        let resumed = service.start_working(&mechanic, wo.id).await.unwrap();
        assert_eq!(resumed.status, WorkOrderStatus::Working);
        assert_eq!(resumed.start_date, Some(first_start));
    }

    #[tokio::test]
    async fn test_update_keeps_status_and_allows_same_title() {
        let (service, _) = setup();
        let wo = service.create(&admin(), input("Crane Winch")).await.unwrap();
        service.submit(&admin(), wo.id).await.unwrap();

        let updated = service
            .update(
                &admin(),
                wo.id,
                UpdateWorkOrder {
                    title: Some("Crane Winch".to_string()),
                    description: Some("cable frayed".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, WorkOrderStatus::Submitted);
        assert_eq!(updated.description.as_deref(), Some("cable frayed"));
    }

    #[tokio::test]
    async fn test_update_rejects_title_of_other_active_order() {
        let (service, _) = setup();
        service.create(&admin(), input("Dozer Track")).await.unwrap();
        let other = service.create(&admin(), input("Dozer Blade")).await.unwrap();

        let err = service
            .update(
                &admin(),
                other.id,
                UpdateWorkOrder {
                    title: Some("Dozer Track".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_complete_defaults_end_date_to_now() {
        let (service, clock) = setup();
        let wo = service.create(&admin(), input("Grader")).await.unwrap();
        service
            .store
            .commit(Changeset::new().with(Change::SetWorkOrderStatus {
                id: wo.id,
                status: WorkOrderStatus::Working,
            }))
            .await
            .unwrap();

        clock.advance(chrono::Duration::days(2));
        let done = service.complete(&admin(), wo.id, None).await.unwrap();
        assert_eq!(done.status, WorkOrderStatus::Completed);
        assert_eq!(done.end_date, Some(clock.now()));
    }

    #[tokio::test]
    async fn test_role_is_checked_before_lookup() {
        let (service, _) = setup();
        let mechanic = Caller::new(Uuid::new_v4(), Role::Mechanic);
        let err = service.submit(&mechanic, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = service.submit(&admin(), Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces_as_storage_error() {
        let mut store = MockWorkflowStore::new();
        store.expect_active_work_order_by_title().returning(|_| Ok(None));
        store.expect_commit().times(1).returning(|_| {
            Err(StoreError::Corrupt {
                reason: "disk full".to_string(),
            })
        });

        let service = WorkOrderService::new(Arc::new(store), Arc::new(FixedClock::new(created_at())));
        let err = service.create(&admin(), input("Excavator Brake")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_title_conflict_at_commit_is_invalid_state() {
        let mut store = MockWorkflowStore::new();
        store.expect_active_work_order_by_title().returning(|_| Ok(None));
        store.expect_commit().times(1).returning(|_| {
            Err(StoreError::ActiveTitleTaken {
                title: "Excavator Brake".to_string(),
            })
        });

        let service = WorkOrderService::new(Arc::new(store), Arc::new(FixedClock::new(created_at())));
        let err = service.create(&admin(), input("Excavator Brake")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_concurrent_creates_keep_one_active_title() {
        let (service, _) = setup();
        let caller = admin();
        let (a, b) = tokio::join!(
            service.create(&caller, input("Excavator Brake")),
            service.create(&caller, input("Excavator Brake")),
        );

        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        let active = service
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .filter(|d| d.work_order.title == "Excavator Brake" && d.work_order.status.is_active())
            .count();
        assert_eq!(active, 1);
    }

    #[tokio::test]
    async fn test_illegal_transition_does_not_commit() {
        let mut store = MockWorkflowStore::new();
        let wo = WorkOrder {
            id: Uuid::new_v4(),
            title: "Compactor".to_string(),
            description: None,
            status: WorkOrderStatus::Open,
            created_by: Uuid::new_v4(),
            assigned_mechanic_id: None,
            start_date: None,
            end_date: None,
            created_at: created_at(),
        };
        let found = wo.clone();
        store
            .expect_work_order()
            .returning(move |_| Ok(Some(found.clone())));
        store.expect_commit().never();

        let service = WorkOrderService::new(Arc::new(store), Arc::new(FixedClock::new(created_at())));
        let err = service
            .complete(&admin(), wo.id, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be WORKING"));
    }
}
