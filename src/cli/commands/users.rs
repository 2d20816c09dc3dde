use anyhow::Result;
use clap::Subcommand;
use uuid::Uuid;

use super::{print_json, AppContext, Command};
use crate::workflow::types::Role;

#[derive(Subcommand)]
pub enum UsersCommand {
    /// List users, optionally only one role
    List {
        #[arg(long, value_name = "ROLE")]
        with_role: Option<Role>,
    },
    /// Show a single user
    Show { id: Uuid },
}

impl UsersCommand {
    pub fn target_id(&self) -> Option<Uuid> {
        match self {
            UsersCommand::Show { id } => Some(*id),
            UsersCommand::List { .. } => None,
        }
    }
}

impl Command for UsersCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        match self {
            UsersCommand::List { with_role } => print_json(&ctx.users.list(*with_role).await?),
            UsersCommand::Show { id } => print_json(&ctx.users.find(*id).await?),
        }
    }
}
