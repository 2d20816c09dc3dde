use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use super::transitions::{describe_sources, Transition};
use super::types::{Role, WorkOrderStatus};
use crate::store::StoreError;

pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    WorkOrder,
    SparepartRequest,
    User,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::WorkOrder => "Work Order",
            Entity::SparepartRequest => "Sparepart Request",
            Entity::User => "User",
        })
    }
}

/// Failures surfaced to the transport layer
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Only {required} can {action}")]
    Forbidden { required: Role, action: &'static str },

    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: Uuid },

    #[error("{reason}")]
    InvalidState { reason: String },

    #[error("Storage failure: {0}")]
    Storage(#[source] StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            // the backend caught a title race the pre-commit lookup missed
            StoreError::ActiveTitleTaken { title } => WorkflowError::InvalidState {
                reason: format!("A work order titled \"{title}\" is still active"),
            },
            other => WorkflowError::Storage(other),
        }
    }
}

/// Coarse classification so transports can pick a response code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Forbidden,
    NotFound,
    InvalidState,
    Storage,
}

impl WorkflowError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        WorkflowError::InvalidState {
            reason: reason.into(),
        }
    }

    pub(crate) fn illegal_transition(transition: Transition, current: WorkOrderStatus) -> Self {
        let reason = match current {
            WorkOrderStatus::Completed => {
                format!("Work Order is already COMPLETED and cannot {}", transition.action())
            }
            _ => format!(
                "Work Order must be {} to {} (current status: {})",
                describe_sources(transition),
                transition.action(),
                current
            ),
        };
        WorkflowError::InvalidState { reason }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Forbidden { .. } => ErrorKind::Forbidden,
            WorkflowError::NotFound { .. } => ErrorKind::NotFound,
            WorkflowError::InvalidState { .. } => ErrorKind::InvalidState,
            WorkflowError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// HTTP-style status for the error kind
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::InvalidState => 400,
            ErrorKind::Storage => 500,
        }
    }
}
