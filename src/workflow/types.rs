// Core types for the work order and sparepart request workflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Roles a provisioned user can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Administrator: creates, submits, updates and completes work orders
    Admin,
    /// Supervisor: assigns mechanics and approves sparepart requests
    Spv,
    /// Mechanic: performs the work
    Mechanic,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Spv, Role::Mechanic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Spv => "SPV",
            Role::Mechanic => "MECHANIC",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError::new("role", s))
    }
}

/// The authority a caller asserts when invoking a workflow operation.
///
/// `System` is reserved for trusted internal callers and passes every role
/// gate. Only the transport layer should construct it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Authority {
    Role(Role),
    System,
}

impl Authority {
    pub fn permits(&self, required: Role) -> bool {
        match self {
            Authority::System => true,
            Authority::Role(role) => *role == required,
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authority::Role(role) => fmt::Display::fmt(role, f),
            Authority::System => f.write_str("SYSTEM"),
        }
    }
}

impl FromStr for Authority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("SYSTEM") {
            return Ok(Authority::System);
        }
        s.parse::<Role>()
            .map(Authority::Role)
            .map_err(|_| ParseEnumError::new("authority", s))
    }
}

/// Identity asserted by whoever calls into the workflow. Trusted as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub authority: Authority,
}

impl Caller {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            authority: Authority::Role(role),
        }
    }

    pub fn system(user_id: Uuid) -> Self {
        Self {
            user_id,
            authority: Authority::System,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderStatus {
    Open,
    Submitted,
    Assigned,
    WaitingSparepart,
    Working,
    Completed,
}

impl WorkOrderStatus {
    pub const ALL: [WorkOrderStatus; 6] = [
        WorkOrderStatus::Open,
        WorkOrderStatus::Submitted,
        WorkOrderStatus::Assigned,
        WorkOrderStatus::WaitingSparepart,
        WorkOrderStatus::Working,
        WorkOrderStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::Open => "OPEN",
            WorkOrderStatus::Submitted => "SUBMITTED",
            WorkOrderStatus::Assigned => "ASSIGNED",
            WorkOrderStatus::WaitingSparepart => "WAITING_SPAREPART",
            WorkOrderStatus::Working => "WORKING",
            WorkOrderStatus::Completed => "COMPLETED",
        }
    }

    /// Anything short of COMPLETED holds its title
    pub fn is_active(&self) -> bool {
        !matches!(self, WorkOrderStatus::Completed)
    }
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkOrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkOrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("work order status", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SparepartRequestStatus {
    Pending,
    Approved,
    /// Modeled but not reachable through any operation yet
    Rejected,
}

impl SparepartRequestStatus {
    pub const ALL: [SparepartRequestStatus; 3] = [
        SparepartRequestStatus::Pending,
        SparepartRequestStatus::Approved,
        SparepartRequestStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SparepartRequestStatus::Pending => "PENDING",
            SparepartRequestStatus::Approved => "APPROVED",
            SparepartRequestStatus::Rejected => "REJECTED",
        }
    }

    pub fn approve(self) -> Option<SparepartRequestStatus> {
        match self {
            SparepartRequestStatus::Pending => Some(SparepartRequestStatus::Approved),
            SparepartRequestStatus::Approved | SparepartRequestStatus::Rejected => None,
        }
    }
}

impl fmt::Display for SparepartRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SparepartRequestStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SparepartRequestStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("sparepart request status", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: WorkOrderStatus,
    pub created_by: Uuid,
    pub assigned_mechanic_id: Option<Uuid>,
    /// Set the first time the order moves to WORKING
    pub start_date: Option<DateTime<Utc>>,
    /// Set only on completion
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparepartItem {
    pub id: Uuid,
    pub request_id: Uuid,
    pub name: String,
    pub qty: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparepartRequest {
    pub id: Uuid,
    pub status: SparepartRequestStatus,
    pub work_order_id: Uuid,
    pub requested_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<SparepartItem>,
}

/// Read projection of a work order together with its sparepart requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderDetail {
    #[serde(flatten)]
    pub work_order: WorkOrder,
    pub sparepart_requests: Vec<SparepartRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWorkOrder {
    pub title: String,
    pub description: Option<String>,
}

/// Fields left as `None` are not touched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateWorkOrder {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Line item as supplied by the caller, before validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSparepartItem {
    pub name: String,
    pub qty: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSparepartRequest {
    pub work_order_id: Uuid,
    pub requested_by: Uuid,
    pub items: Vec<NewSparepartItem>,
}
