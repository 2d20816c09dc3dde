use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::WorkOrderFlowConfig;
#[cfg(feature = "database")]
use crate::database::SqliteStore;
use crate::store::{MemoryStore, UserDirectory, WorkflowStore};
use crate::users::UserService;
use crate::workflow::types::{Authority, Caller, NewSparepartItem};
use crate::workflow::{SparepartRequestService, WorkOrderService};

pub mod seed;
pub mod sparepart;
pub mod users;
pub mod work_order;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self, ctx: &AppContext) -> Result<()>;
}

/// Services wired to one backend, plus the identity asserted on the command line
pub struct AppContext {
    pub work_orders: WorkOrderService,
    pub spareparts: SparepartRequestService,
    pub users: UserService,
    role: Option<Authority>,
    user: Option<Uuid>,
    #[cfg(feature = "database")]
    database: Option<Arc<SqliteStore>>,
}

impl AppContext {
    pub fn with_backend<S>(store: Arc<S>, clock: Arc<dyn Clock>) -> Self
    where
        S: WorkflowStore + UserDirectory + 'static,
    {
        let workflow: Arc<dyn WorkflowStore> = store.clone();
        let directory: Arc<dyn UserDirectory> = store;
        Self {
            work_orders: WorkOrderService::new(workflow.clone(), clock.clone()),
            spareparts: SparepartRequestService::new(workflow, clock),
            users: UserService::new(directory),
            role: None,
            user: None,
            #[cfg(feature = "database")]
            database: None,
        }
    }

    /// Pick the backend from configuration
    pub async fn bootstrap(config: &WorkOrderFlowConfig, in_memory: bool) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        #[cfg(feature = "database")]
        if let (Some(db_config), false) = (&config.database, in_memory) {
            let store = Arc::new(crate::database::init_database(db_config).await?);
            let mut ctx = Self::with_backend(store.clone(), clock);
            ctx.database = Some(store);
            return Ok(ctx);
        }

        #[cfg(not(feature = "database"))]
        let _ = (config, in_memory);

        info!("Using in-memory store, nothing will persist after exit");
        Ok(Self::with_backend(Arc::new(MemoryStore::new()), clock))
    }

    pub fn with_identity(mut self, role: Option<Authority>, user: Option<Uuid>) -> Self {
        self.role = role;
        self.user = user;
        self
    }

    /// Identity for mutating commands; both flags are required
    pub fn caller(&self) -> Result<Caller> {
        match (self.role, self.user) {
            (Some(authority), Some(user_id)) => Ok(Caller { user_id, authority }),
            (None, _) => Err(anyhow!("--role is required for this command")),
            (_, None) => Err(anyhow!("--user is required for this command")),
        }
    }

    pub async fn shutdown(&self) {
        #[cfg(feature = "database")]
        if let Some(database) = &self.database {
            database.shutdown().await;
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `NAME:QTY`, split on the last colon so names may contain one
pub fn parse_item(value: &str) -> Result<NewSparepartItem, String> {
    let (name, qty) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("expected NAME:QTY, got '{value}'"))?;
    let qty = qty
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid quantity '{qty}': {e}"))?;
    Ok(NewSparepartItem {
        name: name.to_string(),
        qty,
    })
}

/// `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp
pub fn parse_end_date(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| format!("expected YYYY-MM-DD or RFC 3339, got '{value}'"))
}
