use anyhow::Result;
use clap::Subcommand;
use uuid::Uuid;

use super::{parse_item, print_json, AppContext, Command};
use crate::workflow::types::{CreateSparepartRequest, NewSparepartItem};

#[derive(Subcommand)]
pub enum SparepartCommand {
    /// Request spareparts for an ASSIGNED or WORKING work order (ADMIN)
    Request {
        #[arg(long = "work-order")]
        work_order: Uuid,
        /// Defaults to --user
        #[arg(long)]
        requestor: Option<Uuid>,
        #[arg(long = "item", value_name = "NAME:QTY", value_parser = parse_item, required = true)]
        items: Vec<NewSparepartItem>,
    },
    /// Approve a PENDING request (SPV)
    Approve {
        id: Uuid,
        /// Defaults to --user
        #[arg(long)]
        approver: Option<Uuid>,
    },
    /// Show one sparepart request with its items
    Show { id: Uuid },
    /// List the requests raised against a work order
    List {
        #[arg(long = "work-order")]
        work_order: Uuid,
    },
}

impl SparepartCommand {
    pub fn operation(&self) -> &'static str {
        match self {
            SparepartCommand::Request { .. } => "sparepart.request",
            SparepartCommand::Approve { .. } => "sparepart.approve",
            SparepartCommand::Show { .. } => "sparepart.show",
            SparepartCommand::List { .. } => "sparepart.list",
        }
    }

    /// Request id, or the work order for commands scoped to one
    pub fn target_id(&self) -> Option<Uuid> {
        match self {
            SparepartCommand::Request { work_order, .. } | SparepartCommand::List { work_order } => Some(*work_order),
            SparepartCommand::Approve { id, .. } | SparepartCommand::Show { id } => Some(*id),
        }
    }
}

impl Command for SparepartCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let service = &ctx.spareparts;
        match self {
            SparepartCommand::Request {
                work_order,
                requestor,
                items,
            } => {
                let caller = ctx.caller()?;
                let input = CreateSparepartRequest {
                    work_order_id: *work_order,
                    requested_by: requestor.unwrap_or(caller.user_id),
                    items: items.clone(),
                };
                print_json(&service.create(&caller, input).await?)
            }
            SparepartCommand::Approve { id, approver } => {
                let caller = ctx.caller()?;
                let approver = approver.unwrap_or(caller.user_id);
                print_json(&service.approve(&caller, *id, approver).await?)
            }
            SparepartCommand::Show { id } => print_json(&service.find_by_id(*id).await?),
            SparepartCommand::List { work_order } => {
                print_json(&service.find_for_work_order(*work_order).await?)
            }
        }
    }
}
