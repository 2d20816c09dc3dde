// Work order transition table
//
// Every status change a work order can go through is named here, together
// with the role allowed to trigger it. Services never assign a status
// directly; they ask the table for the successor.

use super::types::{Role, WorkOrderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Submit,
    Assign,
    StartWorking,
    Complete,
    /// A sparepart request was raised against the order
    RequestSparepart,
    /// A pending sparepart request for the order was approved
    SparepartApproved,
}

impl Transition {
    pub const ALL: [Transition; 6] = [
        Transition::Submit,
        Transition::Assign,
        Transition::StartWorking,
        Transition::Complete,
        Transition::RequestSparepart,
        Transition::SparepartApproved,
    ];

    pub fn required_role(&self) -> Role {
        match self {
            Transition::Submit | Transition::Complete | Transition::RequestSparepart => Role::Admin,
            Transition::Assign | Transition::SparepartApproved => Role::Spv,
            Transition::StartWorking => Role::Mechanic,
        }
    }

    /// Verb phrase used in user-facing messages
    pub fn action(&self) -> &'static str {
        match self {
            Transition::Submit => "submit work orders",
            Transition::Assign => "assign mechanics",
            Transition::StartWorking => "start working",
            Transition::Complete => "complete work orders",
            Transition::RequestSparepart => "request spareparts",
            Transition::SparepartApproved => "approve spareparts",
        }
    }

    /// Statuses from which this transition is legal, in lifecycle order
    pub fn sources(&self) -> Vec<WorkOrderStatus> {
        WorkOrderStatus::ALL
            .into_iter()
            .filter(|status| status.apply(*self).is_some())
            .collect()
    }
}

impl WorkOrderStatus {
    /// Successor status for `transition`, or `None` if it is not legal from here.
    pub fn apply(self, transition: Transition) -> Option<WorkOrderStatus> {
        use Transition::*;
        use WorkOrderStatus::*;

        match self {
            Open => match transition {
                Submit => Some(Submitted),
                _ => None,
            },
            Submitted => match transition {
                Assign => Some(Assigned),
                _ => None,
            },
            Assigned => match transition {
                StartWorking => Some(Working),
                RequestSparepart => Some(WaitingSparepart),
                SparepartApproved => Some(Assigned),
                _ => None,
            },
            WaitingSparepart => match transition {
                StartWorking => Some(Working),
                SparepartApproved => Some(Assigned),
                _ => None,
            },
            // approval regresses a running order back to ASSIGNED
            Working => match transition {
                Complete => Some(Completed),
                RequestSparepart => Some(WaitingSparepart),
                SparepartApproved => Some(Assigned),
                _ => None,
            },
            Completed => None,
        }
    }
}

/// Human readable list such as "ASSIGNED or WAITING_SPAREPART"
pub fn describe_sources(transition: Transition) -> String {
    let names: Vec<&str> = transition.sources().iter().map(|s| s.as_str()).collect();
    match names.as_slice() {
        [] => "never".to_string(),
        [only] => only.to_string(),
        [init @ .., last] => format!("{} or {}", init.join(", "), last),
    }
}
