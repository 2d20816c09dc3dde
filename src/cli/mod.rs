use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::workflow::types::Authority;

pub mod commands;

pub use commands::{AppContext, Command};
use commands::sparepart::SparepartCommand;
use commands::users::UsersCommand;
use commands::work_order::WorkOrderCommand;

#[derive(Parser)]
#[command(name = "work-order-flow")]
#[command(about = "Heavy equipment maintenance work orders and sparepart approvals")]
#[command(long_about = "Tracks maintenance work orders from creation through submission, mechanic \
                       assignment, sparepart approval and completion. Every change is checked against \
                       the role passed with --role. Run 'work-order-flow seed' once to provision users.")]
pub struct Cli {
    /// Role asserted by the caller (ADMIN, SPV, MECHANIC or SYSTEM)
    #[arg(long, global = true)]
    pub role: Option<Authority>,

    /// Id of the calling user
    #[arg(long, global = true)]
    pub user: Option<Uuid>,

    /// Use a throwaway in-memory store instead of the configured database
    #[arg(long, global = true)]
    pub in_memory: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create, move through the lifecycle, and inspect work orders
    #[command(name = "work-order", subcommand)]
    WorkOrder(WorkOrderCommand),
    /// Raise and approve sparepart requests
    #[command(subcommand)]
    Sparepart(SparepartCommand),
    /// Browse provisioned users
    #[command(subcommand)]
    Users(UsersCommand),
    /// Provision the default users when none exist yet
    Seed,
}

impl Commands {
    pub async fn execute(&self, ctx: &AppContext) -> anyhow::Result<()> {
        match self {
            Commands::WorkOrder(cmd) => cmd.execute(ctx).await,
            Commands::Sparepart(cmd) => cmd.execute(ctx).await,
            Commands::Users(cmd) => cmd.execute(ctx).await,
            Commands::Seed => commands::seed::SeedCommand.execute(ctx).await,
        }
    }

    /// Short operation name for log spans
    pub fn operation(&self) -> &'static str {
        match self {
            Commands::WorkOrder(cmd) => cmd.operation(),
            Commands::Sparepart(cmd) => cmd.operation(),
            Commands::Users(_) => "users",
            Commands::Seed => "seed",
        }
    }

    /// Id of the record the command acts on, if it names one
    pub fn target_id(&self) -> Option<Uuid> {
        match self {
            Commands::WorkOrder(cmd) => cmd.target_id(),
            Commands::Sparepart(cmd) => cmd.target_id(),
            Commands::Users(cmd) => cmd.target_id(),
            Commands::Seed => None,
        }
    }
}
