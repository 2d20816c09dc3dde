use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::store::UserDirectory;
use crate::workflow::errors::{Entity, WorkflowError, WorkflowResult};
use crate::workflow::types::{Role, User};

/// Accounts provisioned on an empty directory
pub const DEFAULT_USERS: [(&str, Role); 3] = [
    ("Super Admin", Role::Admin),
    ("Supervisor John", Role::Spv),
    ("Mechanic Mike", Role::Mechanic),
];

/// Read access to the provisioned users plus initial seeding
#[derive(Clone)]
pub struct UserService {
    directory: Arc<dyn UserDirectory>,
}

impl UserService {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    pub async fn list(&self, role: Option<Role>) -> WorkflowResult<Vec<User>> {
        Ok(self.directory.users(role).await?)
    }

    pub async fn find(&self, id: Uuid) -> WorkflowResult<User> {
        self.directory
            .user(id)
            .await?
            .ok_or(WorkflowError::NotFound {
                entity: Entity::User,
                id,
            })
    }

    /// Provision [`DEFAULT_USERS`] unless someone already exists.
    /// Returns the users created, empty when nothing was done.
    pub async fn seed_defaults(&self) -> WorkflowResult<Vec<User>> {
        if !self.directory.users(None).await?.is_empty() {
            info!("User directory already populated, skipping seed");
            return Ok(Vec::new());
        }

        let mut created = Vec::with_capacity(DEFAULT_USERS.len());
        for (name, role) in DEFAULT_USERS {
            let user = User {
                id: Uuid::new_v4(),
                name: name.to_string(),
                role,
            };
            self.directory.insert_user(&user).await?;
            info!(user.id = %user.id, role = %user.role, "Seeded user {}", user.name);
            created.push(user);
        }
        Ok(created)
    }
}
