//! Store (4.C): typed CRUD over switches with user-scoping, state-machine
//! enforcement via the caller-supplied status, and codec integration.

use std::time::Duration;

use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use crate::crypto::{self, Codec};
use crate::domain::{PushSubscription, Status, Switch};
use crate::error::{Error, Result};

pub type DbPool = sqlx::Pool<sqlx::Sqlite>;

const DEFAULT_POOL_SIZE: u32 = 5;
const BUSY_TIMEOUT_MS: u64 = 5_000;
const PING_BUDGET: Duration = Duration::from_secs(2);

/// Opens the SQLite pool with WAL journaling and foreign keys on, matching
/// the single-writer concurrency model in §5.
pub async fn init_pool(database_url: &str) -> Result<DbPool> {
    let connect_options: SqliteConnectOptions = database_url
        .parse::<SqliteConnectOptions>()
        .map_err(Error::Store)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(DEFAULT_POOL_SIZE)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await?;

    tracing::info!("database pool initialized (WAL mode, {DEFAULT_POOL_SIZE} max connections)");
    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct SwitchRow {
    id: i64,
    user_id: String,
    message: String,
    notifiers: String,
    check_in_interval: String,
    trigger_at: i64,
    status: String,
    delete_after_triggered: bool,
    encrypted: bool,
    push_subscription: Option<String>,
    reminder_threshold: Option<String>,
    reminder_enabled: bool,
    reminder_sent: bool,
    failure_reason: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl SwitchRow {
    fn into_switch(self) -> Result<Switch> {
        Ok(Switch {
            id: self.id,
            user_id: self.user_id,
            message: self.message,
            notifiers: serde_json::from_str(&self.notifiers)?,
            check_in_interval: self.check_in_interval,
            trigger_at: self.trigger_at,
            status: Status::parse(&self.status)
                .ok_or_else(|| Error::Store(sqlx::Error::Decode(format!("unknown status '{}'", self.status).into())))?,
            delete_after_triggered: self.delete_after_triggered,
            encrypted: self.encrypted,
            push_subscription: self
                .push_subscription
                .map(|s| serde_json::from_str::<PushSubscription>(&s))
                .transpose()?,
            reminder_threshold: self.reminder_threshold,
            reminder_enabled: self.reminder_enabled,
            reminder_sent: self.reminder_sent,
            failure_reason: self.failure_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub struct Store {
    pool: DbPool,
    codec: Codec,
}

impl Store {
    pub fn new(pool: DbPool, codec: Codec) -> Self {
        Self { pool, codec }
    }

    /// Idempotent DDL — runs the migration set.
    pub async fn init(&self) -> Result<()> {
        run_migrations(&self.pool).await
    }

    /// Inserts `sw`, defaulting `user_id` to `"admin"` and applying
    /// `encrypt_switch` first. Returns the row as stored (still ciphertext
    /// in the sensitive fields when `encrypted`).
    pub async fn create(&self, mut sw: Switch) -> Result<Switch> {
        if sw.user_id.trim().is_empty() {
            sw.user_id = "admin".to_string();
        }
        crypto::encrypt_switch(&self.codec, &mut sw)?;

        let ts = now();
        sw.created_at = ts;
        sw.updated_at = ts;

        let notifiers_json = serde_json::to_string(&sw.notifiers)?;
        let push_json = sw.push_subscription.as_ref().map(serde_json::to_string).transpose()?;

        let id: i64 = sqlx::query(
            r#"
            INSERT INTO switches (
                user_id, message, notifiers, check_in_interval, trigger_at, status,
                delete_after_triggered, encrypted, push_subscription, reminder_threshold,
                reminder_enabled, reminder_sent, failure_reason, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&sw.user_id)
        .bind(&sw.message)
        .bind(&notifiers_json)
        .bind(&sw.check_in_interval)
        .bind(sw.trigger_at)
        .bind(sw.status.as_str())
        .bind(sw.delete_after_triggered)
        .bind(sw.encrypted)
        .bind(&push_json)
        .bind(&sw.reminder_threshold)
        .bind(sw.reminder_enabled)
        .bind(sw.reminder_sent)
        .bind(&sw.failure_reason)
        .bind(sw.created_at)
        .bind(sw.updated_at)
        .fetch_one(&self.pool)
        .await?
        .try_get("id")?;

        sw.id = id;
        Ok(sw)
    }

    /// Lists switches owned by `principal`, newest-first. `limit < 0` means
    /// "all".
    pub async fn get_all(&self, principal: &str, limit: i64) -> Result<Vec<Switch>> {
        let rows: Vec<SwitchRow> = if limit < 0 {
            sqlx::query_as(
                "SELECT * FROM switches WHERE user_id = ? ORDER BY id DESC",
            )
            .bind(principal)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as(
                "SELECT * FROM switches WHERE user_id = ? ORDER BY id DESC LIMIT ?",
            )
            .bind(principal)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(SwitchRow::into_switch).collect()
    }

    /// Returns `NotFound` both when the row is absent and when it belongs
    /// to another principal — the two cases are indistinguishable to the
    /// caller, preserving tenant isolation.
    pub async fn get_by_id(&self, principal: &str, id: i64) -> Result<Switch> {
        let row: Option<SwitchRow> =
            sqlx::query_as("SELECT * FROM switches WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(principal)
                .fetch_optional(&self.pool)
                .await?;
        row.ok_or(Error::NotFound)?.into_switch()
    }

    /// Same scoping as [`Store::get_by_id`], but decrypted. Callers that
    /// mutate only a few fields of the row and then round-trip the whole
    /// thing back through [`Store::update`] (which unconditionally
    /// re-encrypts) must start from plaintext, or the already-ciphertext
    /// fields get encrypted a second time.
    pub async fn get_by_id_decrypted(&self, principal: &str, id: i64) -> Result<Switch> {
        let mut sw = self.get_by_id(principal, id).await?;
        crypto::decrypt_switch(&self.codec, &mut sw)?;
        Ok(sw)
    }

    /// Full-row replacement, scoped by id + user_id. This is the sole path
    /// for status transitions — the service layer computes the new row.
    pub async fn update(&self, id: i64, mut sw: Switch) -> Result<Switch> {
        crypto::encrypt_switch(&self.codec, &mut sw)?;
        sw.updated_at = now();

        let notifiers_json = serde_json::to_string(&sw.notifiers)?;
        let push_json = sw.push_subscription.as_ref().map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE switches SET
                user_id = ?, message = ?, notifiers = ?, check_in_interval = ?, trigger_at = ?,
                status = ?, delete_after_triggered = ?, encrypted = ?, push_subscription = ?,
                reminder_threshold = ?, reminder_enabled = ?, reminder_sent = ?,
                failure_reason = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&sw.user_id)
        .bind(&sw.message)
        .bind(&notifiers_json)
        .bind(&sw.check_in_interval)
        .bind(sw.trigger_at)
        .bind(sw.status.as_str())
        .bind(sw.delete_after_triggered)
        .bind(sw.encrypted)
        .bind(&push_json)
        .bind(&sw.reminder_threshold)
        .bind(sw.reminder_enabled)
        .bind(sw.reminder_sent)
        .bind(&sw.failure_reason)
        .bind(sw.updated_at)
        .bind(id)
        .bind(&sw.user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        sw.id = id;
        Ok(sw)
    }

    /// Idempotent: deleting a row that does not exist (or is not owned by
    /// `principal`) is not an error.
    pub async fn delete(&self, principal: &str, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM switches WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(principal)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Switches with `status = active` and `trigger_at <= now`, up to
    /// `limit`, decrypted.
    pub async fn get_expired(&self, limit: i64) -> Result<Vec<Switch>> {
        let rows: Vec<SwitchRow> = sqlx::query_as(
            "SELECT * FROM switches WHERE status = ? AND trigger_at <= ? ORDER BY id ASC LIMIT ?",
        )
        .bind(Status::Active.as_str())
        .bind(now())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        self.decrypt_rows(rows)
    }

    /// Switches eligible for a reminder (`active`, `reminder_enabled`, not
    /// yet `reminder_sent`, with a threshold set), up to `limit`, decrypted.
    /// The "within threshold" time-window test is applied by the worker.
    pub async fn get_eligible_reminders(&self, limit: i64) -> Result<Vec<Switch>> {
        let rows: Vec<SwitchRow> = sqlx::query_as(
            r#"
            SELECT * FROM switches
            WHERE status = ? AND reminder_enabled = TRUE AND reminder_sent = FALSE
              AND reminder_threshold IS NOT NULL
            ORDER BY id ASC LIMIT ?
            "#,
        )
        .bind(Status::Active.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        self.decrypt_rows(rows)
    }

    fn decrypt_rows(&self, rows: Vec<SwitchRow>) -> Result<Vec<Switch>> {
        rows.into_iter()
            .map(|row| {
                let mut sw = row.into_switch()?;
                crypto::decrypt_switch(&self.codec, &mut sw)?;
                Ok(sw)
            })
            .collect()
    }

    /// Connectivity probe with a 2-second budget.
    pub async fn ping(&self) -> Result<()> {
        tokio::time::timeout(PING_BUDGET, sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map_err(|_| Error::Store(sqlx::Error::PoolTimedOut))??;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// The underlying pool, for callers (integration tests chief among
    /// them) that need to inspect a row's on-disk shape directly.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}
