use anyhow::Result;

use super::{print_json, AppContext, Command};

pub struct SeedCommand;

impl Command for SeedCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let created = ctx.users.seed_defaults().await?;
        if created.is_empty() {
            eprintln!("Users already provisioned, nothing to seed");
            return print_json(&ctx.users.list(None).await?);
        }
        print_json(&created)
    }
}
