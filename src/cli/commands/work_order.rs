use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use uuid::Uuid;

use super::{parse_end_date, print_json, AppContext, Command};
use crate::workflow::types::{CreateWorkOrder, UpdateWorkOrder};

#[derive(Subcommand)]
pub enum WorkOrderCommand {
    /// Open a new work order (ADMIN)
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Submit an OPEN work order for assignment (ADMIN)
    Submit { id: Uuid },
    /// Assign a mechanic to a SUBMITTED work order (SPV)
    Assign {
        id: Uuid,
        #[arg(long, help = "Id of the mechanic taking the job")]
        mechanic: Uuid,
    },
    /// Start or resume work (MECHANIC)
    Start { id: Uuid },
    /// Change title or description without touching the status (ADMIN)
    Update {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Complete a WORKING work order (ADMIN)
    Complete {
        id: Uuid,
        #[arg(long, value_parser = parse_end_date, help = "YYYY-MM-DD or RFC 3339, defaults to now")]
        end_date: Option<DateTime<Utc>>,
    },
    /// Show one work order with its sparepart requests
    Show { id: Uuid },
    /// List every work order with its sparepart requests
    List,
}

impl WorkOrderCommand {
    pub fn operation(&self) -> &'static str {
        match self {
            WorkOrderCommand::Create { .. } => "work_order.create",
            WorkOrderCommand::Submit { .. } => "work_order.submit",
            WorkOrderCommand::Assign { .. } => "work_order.assign",
            WorkOrderCommand::Start { .. } => "work_order.start",
            WorkOrderCommand::Update { .. } => "work_order.update",
            WorkOrderCommand::Complete { .. } => "work_order.complete",
            WorkOrderCommand::Show { .. } => "work_order.show",
            WorkOrderCommand::List => "work_order.list",
        }
    }

    pub fn target_id(&self) -> Option<Uuid> {
        match self {
            WorkOrderCommand::Submit { id }
            | WorkOrderCommand::Assign { id, .. }
            | WorkOrderCommand::Start { id }
            | WorkOrderCommand::Update { id, .. }
            | WorkOrderCommand::Complete { id, .. }
            | WorkOrderCommand::Show { id } => Some(*id),
            WorkOrderCommand::Create { .. } | WorkOrderCommand::List => None,
        }
    }
}

impl Command for WorkOrderCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let service = &ctx.work_orders;
        match self {
            WorkOrderCommand::Create { title, description } => {
                let input = CreateWorkOrder {
                    title: title.clone(),
                    description: description.clone(),
                };
                print_json(&service.create(&ctx.caller()?, input).await?)
            }
            WorkOrderCommand::Submit { id } => print_json(&service.submit(&ctx.caller()?, *id).await?),
            WorkOrderCommand::Assign { id, mechanic } => {
                print_json(&service.assign(&ctx.caller()?, *id, *mechanic).await?)
            }
            WorkOrderCommand::Start { id } => print_json(&service.start_working(&ctx.caller()?, *id).await?),
            WorkOrderCommand::Update { id, title, description } => {
                let input = UpdateWorkOrder {
                    title: title.clone(),
                    description: description.clone(),
                };
                print_json(&service.update(&ctx.caller()?, *id, input).await?)
            }
            WorkOrderCommand::Complete { id, end_date } => {
                print_json(&service.complete(&ctx.caller()?, *id, *end_date).await?)
            }
            WorkOrderCommand::Show { id } => print_json(&service.find_by_id(*id).await?),
            WorkOrderCommand::List => print_json(&service.find_all().await?),
        }
    }
}
