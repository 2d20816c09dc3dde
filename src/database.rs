use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::store::{Change, Changeset, StoreError, StoreResult, UserDirectory, WorkflowStore};
use crate::workflow::types::{
    Role, SparepartItem, SparepartRequest, SparepartRequestStatus, User, WorkOrder, WorkOrderStatus,
};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed workflow store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (and create if missing) the database, running migrations when enabled
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        ensure_parent_dir(&config.url)?;

        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        info!("Opening database at {}", config.url);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        if config.auto_migrate {
            info!("Running database migrations...");
            MIGRATOR.run(&pool).await?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    /// Private in-memory database, migrated and ready
    pub async fn in_memory() -> Result<Self> {
        // every pooled connection would otherwise get its own empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
            .await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }

    async fn load_items(&self, request_id: Uuid) -> StoreResult<Vec<SparepartItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, request_id, name, qty
            FROM sparepart_items
            WHERE request_id = ?1
            ORDER BY position ASC
            "#,
        )
        .bind(request_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    async fn hydrate_request(&self, row: &SqliteRow) -> StoreResult<SparepartRequest> {
        let mut request = request_from_row(row)?;
        request.items = self.load_items(request.id).await?;
        Ok(request)
    }
}

/// sqlite will not create missing directories for a file database
fn ensure_parent_dir(url: &str) -> Result<()> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn format_time(time: &DateTime<Utc>) -> String {
    // fixed width keeps lexical and chronological order identical
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Violations of `idx_work_orders_active_title` become a title conflict
fn title_conflict(err: sqlx::Error, title: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() && db.message().contains("work_orders.title") => {
            StoreError::ActiveTitleTaken {
                title: title.to_string(),
            }
        }
        _ => StoreError::Database(err),
    }
}

fn parse_time(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            reason: format!("invalid timestamp '{value}': {e}"),
        })
}

fn parse_uuid(value: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| StoreError::Corrupt {
        reason: format!("invalid id '{value}': {e}"),
    })
}

fn parse_enum<T>(value: &str) -> StoreResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| StoreError::Corrupt {
        reason: e.to_string(),
    })
}

fn opt_uuid(value: Option<String>) -> StoreResult<Option<Uuid>> {
    value.as_deref().map(parse_uuid).transpose()
}

fn opt_time(value: Option<String>) -> StoreResult<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_time).transpose()
}

fn work_order_from_row(row: &SqliteRow) -> StoreResult<WorkOrder> {
    Ok(WorkOrder {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: parse_enum::<WorkOrderStatus>(&row.try_get::<String, _>("status")?)?,
        created_by: parse_uuid(&row.try_get::<String, _>("created_by")?)?,
        assigned_mechanic_id: opt_uuid(row.try_get("assigned_mechanic_id")?)?,
        start_date: opt_time(row.try_get("start_date")?)?,
        end_date: opt_time(row.try_get("end_date")?)?,
        created_at: parse_time(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn request_from_row(row: &SqliteRow) -> StoreResult<SparepartRequest> {
    Ok(SparepartRequest {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        status: parse_enum::<SparepartRequestStatus>(&row.try_get::<String, _>("status")?)?,
        work_order_id: parse_uuid(&row.try_get::<String, _>("work_order_id")?)?,
        requested_by: parse_uuid(&row.try_get::<String, _>("requested_by")?)?,
        approved_by: opt_uuid(row.try_get("approved_by")?)?,
        created_at: parse_time(&row.try_get::<String, _>("created_at")?)?,
        items: Vec::new(),
    })
}

fn item_from_row(row: &SqliteRow) -> StoreResult<SparepartItem> {
    let qty: i64 = row.try_get("qty")?;
    Ok(SparepartItem {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        request_id: parse_uuid(&row.try_get::<String, _>("request_id")?)?,
        name: row.try_get("name")?,
        qty: u32::try_from(qty).map_err(|_| StoreError::Corrupt {
            reason: format!("invalid item quantity {qty}"),
        })?,
    })
}

fn user_from_row(row: &SqliteRow) -> StoreResult<User> {
    Ok(User {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        name: row.try_get("name")?,
        role: parse_enum::<Role>(&row.try_get::<String, _>("role")?)?,
    })
}

#[async_trait]
impl WorkflowStore for SqliteStore {
    async fn work_order(&self, id: Uuid) -> StoreResult<Option<WorkOrder>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, description, status, created_by, assigned_mechanic_id,
                   start_date, end_date, created_at
            FROM work_orders
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(work_order_from_row).transpose()
    }

    async fn work_orders(&self) -> StoreResult<Vec<WorkOrder>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, description, status, created_by, assigned_mechanic_id,
                   start_date, end_date, created_at
            FROM work_orders
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(work_order_from_row).collect()
    }

    async fn active_work_order_by_title(&self, title: &str) -> StoreResult<Option<WorkOrder>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, description, status, created_by, assigned_mechanic_id,
                   start_date, end_date, created_at
            FROM work_orders
            WHERE title = ?1 AND status != ?2
            LIMIT 1
            "#,
        )
        .bind(title)
        .bind(WorkOrderStatus::Completed.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(work_order_from_row).transpose()
    }

    async fn sparepart_request(&self, id: Uuid) -> StoreResult<Option<SparepartRequest>> {
        let row = sqlx::query(
            r#"
            SELECT id, status, work_order_id, requested_by, approved_by, created_at
            FROM sparepart_requests
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_request(&row).await?)),
            None => Ok(None),
        }
    }

    async fn sparepart_requests_for(&self, work_order_id: Uuid) -> StoreResult<Vec<SparepartRequest>> {
        let rows = sqlx::query(
            r#"
            SELECT id, status, work_order_id, requested_by, approved_by, created_at
            FROM sparepart_requests
            WHERE work_order_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(work_order_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut requests = Vec::with_capacity(rows.len());
        for row in &rows {
            requests.push(self.hydrate_request(row).await?);
        }
        Ok(requests)
    }

    async fn commit(&self, changes: Changeset) -> StoreResult<()> {
        // dropping the transaction on any early return rolls it back
        let mut tx = self.pool.begin().await?;

        for change in changes {
            match change {
                Change::InsertWorkOrder(wo) => {
                    sqlx::query(
                        r#"
                        INSERT INTO work_orders
                            (id, title, description, status, created_by, assigned_mechanic_id,
                             start_date, end_date, created_at)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                        "#,
                    )
                    .bind(wo.id.to_string())
                    .bind(wo.title.as_str())
                    .bind(wo.description.as_deref())
                    .bind(wo.status.as_str())
                    .bind(wo.created_by.to_string())
                    .bind(wo.assigned_mechanic_id.map(|id| id.to_string()))
                    .bind(wo.start_date.as_ref().map(format_time))
                    .bind(wo.end_date.as_ref().map(format_time))
                    .bind(format_time(&wo.created_at))
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| title_conflict(e, &wo.title))?;
                }
                Change::UpdateWorkOrder(wo) => {
                    let result = sqlx::query(
                        r#"
                        UPDATE work_orders
                        SET title = ?2, description = ?3, status = ?4, assigned_mechanic_id = ?5,
                            start_date = ?6, end_date = ?7
                        WHERE id = ?1
                        "#,
                    )
                    .bind(wo.id.to_string())
                    .bind(wo.title.as_str())
                    .bind(wo.description.as_deref())
                    .bind(wo.status.as_str())
                    .bind(wo.assigned_mechanic_id.map(|id| id.to_string()))
                    .bind(wo.start_date.as_ref().map(format_time))
                    .bind(wo.end_date.as_ref().map(format_time))
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| title_conflict(e, &wo.title))?;

                    if result.rows_affected() == 0 {
                        return Err(StoreError::MissingRecord {
                            entity: "work order",
                            id: wo.id,
                        });
                    }
                }
                Change::SetWorkOrderStatus { id, status } => {
                    let result = sqlx::query("UPDATE work_orders SET status = ?2 WHERE id = ?1")
                        .bind(id.to_string())
                        .bind(status.as_str())
                        .execute(&mut *tx)
                        .await?;

                    if result.rows_affected() == 0 {
                        return Err(StoreError::MissingRecord {
                            entity: "work order",
                            id,
                        });
                    }
                }
                Change::InsertSparepartRequest(request) => {
                    sqlx::query(
                        r#"
                        INSERT INTO sparepart_requests
                            (id, status, work_order_id, requested_by, approved_by, created_at)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                        "#,
                    )
                    .bind(request.id.to_string())
                    .bind(request.status.as_str())
                    .bind(request.work_order_id.to_string())
                    .bind(request.requested_by.to_string())
                    .bind(request.approved_by.map(|id| id.to_string()))
                    .bind(format_time(&request.created_at))
                    .execute(&mut *tx)
                    .await?;

                    for (position, item) in request.items.iter().enumerate() {
                        sqlx::query(
                            r#"
                            INSERT INTO sparepart_items (id, request_id, position, name, qty)
                            VALUES (?1, ?2, ?3, ?4, ?5)
                            "#,
                        )
                        .bind(item.id.to_string())
                        .bind(request.id.to_string())
                        .bind(position as i64)
                        .bind(item.name.as_str())
                        .bind(i64::from(item.qty))
                        .execute(&mut *tx)
                        .await?;
                    }
                }
                Change::UpdateSparepartRequest(request) => {
                    let result = sqlx::query(
                        "UPDATE sparepart_requests SET status = ?2, approved_by = ?3 WHERE id = ?1",
                    )
                    .bind(request.id.to_string())
                    .bind(request.status.as_str())
                    .bind(request.approved_by.map(|id| id.to_string()))
                    .execute(&mut *tx)
                    .await?;

                    if result.rows_affected() == 0 {
                        return Err(StoreError::MissingRecord {
                            entity: "sparepart request",
                            id: request.id,
                        });
                    }
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for SqliteStore {
    async fn user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT id, name, role FROM users WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn users(&self, role: Option<Role>) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, role
            FROM users
            WHERE ?1 IS NULL OR role = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(role.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query("INSERT INTO users (id, name, role) VALUES (?1, ?2, ?3)")
            .bind(user.id.to_string())
            .bind(user.name.as_str())
            .bind(user.role.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Open the configured database
pub async fn init_database(config: &DatabaseConfig) -> Result<SqliteStore> {
    let store = SqliteStore::connect(config).await?;
    info!("Database store initialized successfully");
    Ok(store)
}
