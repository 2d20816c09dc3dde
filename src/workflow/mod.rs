//! Work order and sparepart request workflow engine
//!
//! Every mutating operation takes a [`Caller`], checks its authority
//! against the operation's required role, loads the target, consults the
//! transition table and writes the result through one store commit.

pub mod errors;
pub mod sparepart_requests;
pub mod transitions;
pub mod types;
pub mod work_orders;

pub use errors::{Entity, ErrorKind, WorkflowError, WorkflowResult};
pub use sparepart_requests::SparepartRequestService;
pub use transitions::Transition;
pub use types::{
    Authority, Caller, CreateSparepartRequest, CreateWorkOrder, NewSparepartItem, Role,
    SparepartItem, SparepartRequest, SparepartRequestStatus, UpdateWorkOrder, User, WorkOrder,
    WorkOrderDetail, WorkOrderStatus,
};
pub use work_orders::WorkOrderService;

/// Role gate shared by both services
pub(crate) fn authorize(caller: &Caller, required: Role, action: &'static str) -> WorkflowResult<()> {
    if caller.authority.permits(required) {
        return Ok(());
    }
    tracing::warn!(
        user.id = %caller.user_id,
        role = %caller.authority,
        required = %required,
        "Rejected caller without required role"
    );
    Err(WorkflowError::Forbidden { required, action })
}
