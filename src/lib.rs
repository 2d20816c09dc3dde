// Work Order Flow Library - maintenance work order workflow engine
// This exposes the core components for testing and integration

pub mod cli;
pub mod clock;
pub mod config;
#[cfg(feature = "database")]
pub mod database;
pub mod store;
pub mod telemetry;
pub mod users;
pub mod workflow;

// Re-export key types for easy access
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{config, init_config, WorkOrderFlowConfig};
#[cfg(feature = "database")]
pub use database::{init_database, SqliteStore};
pub use store::{Change, Changeset, MemoryStore, StoreError, UserDirectory, WorkflowStore};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
pub use users::UserService;
pub use workflow::{
    Authority, Caller, ErrorKind, Role, SparepartRequestService, WorkOrderService, WorkflowError,
    WorkflowResult,
};
