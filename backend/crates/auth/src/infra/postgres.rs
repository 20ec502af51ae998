//! PostgreSQL Repository Implementations

use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::id::{LineageId, SessionId};
use platform::password::HashedPassword;
use platform::rate_limit::RateLimitCounter;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::application::config::to_chrono;
use crate::domain::entity::{
    account::Account,
    audit_event::{AuditEvent, AuditEventType},
    login_failures::{LockState, LockoutPolicy, LoginFailures},
    session::Session,
};
use crate::domain::repository::{
    AccountRepository, AuditRepository, LockoutRepository, RateLimitRepository,
    SessionRepository,
};
use crate::domain::value_object::user_name::UserName;
use crate::error::{AuthError, AuthResult};

/// PostgreSQL-backed auth repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ACCOUNT_COLUMNS: &str = r#"
    username,
    password_hash,
    is_admin,
    created_at,
    updated_at
"#;

const SESSION_COLUMNS: &str = r#"
    session_id,
    lineage_id,
    username,
    refresh_token_hash,
    issued_at,
    expires_at,
    client_ip,
    user_agent,
    remember_me,
    revoked
"#;

// ============================================================================
// Account Repository Implementation
// ============================================================================

impl AccountRepository for PgAuthRepository {
    async fn insert_account(&self, account: &Account) -> AuthResult<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO accounts (
                username_canonical,
                username,
                password_hash,
                is_admin,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(account.username.canonical())
        .bind(account.username.original())
        .bind(account.password_hash.as_phc_string())
        .bind(account.is_admin)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AuthError::UserNameTaken)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_account(&self, username: &UserName) -> AuthResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username_canonical = $1"
        ))
        .bind(username.canonical())
        .fetch_optional(&self.pool)
        .await?;

        row.map(AccountRow::into_account).transpose()
    }

    async fn update_password(
        &self,
        username: &UserName,
        password_hash: &HashedPassword,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $2, updated_at = $3
            WHERE username_canonical = $1
            "#,
        )
        .bind(username.canonical())
        .bind(password_hash.as_phc_string())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Lockout Repository Implementation
// ============================================================================

const LOGIN_FAILURE_COLUMNS: &str = "key, failed_attempts, locked_until, updated_at";

impl LockoutRepository for PgAuthRepository {
    async fn find_login_failures(&self, key: &str) -> AuthResult<Option<LoginFailures>> {
        let row = sqlx::query_as::<_, LoginFailuresRow>(&format!(
            "SELECT {LOGIN_FAILURE_COLUMNS} FROM login_failures WHERE key = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(LoginFailuresRow::into_login_failures))
    }

    async fn record_failed_login(
        &self,
        key: &str,
        now: DateTime<Utc>,
        policy: &LockoutPolicy,
    ) -> AuthResult<LockState> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO login_failures (key, failed_attempts, locked_until, updated_at)
            VALUES ($1, 0, NULL, $2)
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // Row lock serializes concurrent failures for the same key
        let mut failures = sqlx::query_as::<_, LoginFailuresRow>(&format!(
            "SELECT {LOGIN_FAILURE_COLUMNS} FROM login_failures WHERE key = $1 FOR UPDATE"
        ))
        .bind(key)
        .fetch_one(&mut *tx)
        .await?
        .into_login_failures();

        let state = failures.record_failure(now, policy);
        sqlx::query(
            r#"
            UPDATE login_failures
            SET failed_attempts = $2, locked_until = $3, updated_at = $4
            WHERE key = $1
            "#,
        )
        .bind(key)
        .bind(failures.failed_attempts as i32)
        .bind(failures.locked_until)
        .bind(failures.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(state)
    }

    async fn clear_failed_logins(&self, key: &str) -> AuthResult<()> {
        sqlx::query("DELETE FROM login_failures WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_stale_login_failures(&self, before: DateTime<Utc>) -> AuthResult<u64> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM login_failures
            WHERE updated_at < $1
              AND (locked_until IS NULL OR locked_until <= $1)
            "#,
        )
        .bind(before)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

impl SessionRepository for PgAuthRepository {
    async fn insert_session(
        &self,
        session: &Session,
        max_active: usize,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Session>> {
        let mut tx = self.pool.begin().await?;
        lock_account(&mut tx, &session.username).await?;
        let evicted = insert_with_eviction(&mut tx, session, max_active, now).await?;
        tx.commit().await?;
        Ok(evicted)
    }

    async fn rotate_session(
        &self,
        current: SessionId,
        successor: &Session,
        max_active: usize,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<Vec<Session>>> {
        let mut tx = self.pool.begin().await?;
        lock_account(&mut tx, &successor.username).await?;

        let flipped = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET revoked = TRUE
            WHERE session_id = $1 AND NOT revoked AND expires_at >= $2
            "#,
        )
        .bind(current.into_uuid())
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if flipped != 1 {
            tx.rollback().await?;
            return Ok(None);
        }

        let evicted = insert_with_eviction(&mut tx, successor, max_active, now).await?;
        tx.commit().await?;
        Ok(Some(evicted))
    }

    async fn find_session_by_refresh_hash(&self, hash: &str) -> AuthResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM auth_sessions WHERE refresh_token_hash = $1"
        ))
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SessionRow::into_session))
    }

    async fn list_active_sessions(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM auth_sessions
            WHERE username = $1 AND NOT revoked AND expires_at >= $2
            ORDER BY issued_at DESC, session_id DESC
            "#
        ))
        .bind(username)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SessionRow::into_session).collect())
    }

    async fn revoke_session_if_active(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET revoked = TRUE
            WHERE session_id = $1 AND NOT revoked AND expires_at >= $2
            "#,
        )
        .bind(session_id.into_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_lineage(&self, lineage_id: LineageId) -> AuthResult<u64> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<String> =
            sqlx::query_scalar("SELECT username FROM auth_sessions WHERE lineage_id = $1 LIMIT 1")
                .bind(lineage_id.into_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let Some(owner) = owner else {
            return Ok(0);
        };
        // Waits out an in-flight rotation so its successor is revoked too
        lock_account(&mut tx, &owner).await?;

        let result = sqlx::query(
            "UPDATE auth_sessions SET revoked = TRUE WHERE lineage_id = $1 AND NOT revoked",
        )
        .bind(lineage_id.into_uuid())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn revoke_account_sessions(
        &self,
        username: &str,
        except: Option<LineageId>,
    ) -> AuthResult<u64> {
        let mut tx = self.pool.begin().await?;
        lock_account(&mut tx, username).await?;

        let result = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET revoked = TRUE
            WHERE username = $1
              AND NOT revoked
              AND ($2::uuid IS NULL OR lineage_id <> $2)
            "#,
        )
        .bind(username)
        .bind(except.map(LineageId::into_uuid))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired_sessions(&self, before: DateTime<Utc>) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM auth_sessions WHERE expires_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(sessions_deleted = deleted, "Cleaned up expired auth sessions");
        Ok(deleted)
    }
}

/// Session writes of one account serialize on its account row
async fn lock_account(tx: &mut Transaction<'_, Postgres>, username: &str) -> AuthResult<()> {
    sqlx::query("SELECT 1 FROM accounts WHERE username_canonical = $1 FOR UPDATE")
        .bind(username)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Revoke the oldest active sessions past `max_active`, then insert
async fn insert_with_eviction(
    tx: &mut Transaction<'_, Postgres>,
    session: &Session,
    max_active: usize,
    now: DateTime<Utc>,
) -> AuthResult<Vec<Session>> {
    let active = sqlx::query_as::<_, SessionRow>(&format!(
        r#"
        SELECT {SESSION_COLUMNS}
        FROM auth_sessions
        WHERE username = $1 AND NOT revoked AND expires_at >= $2
        ORDER BY issued_at ASC, session_id ASC
        "#
    ))
    .bind(&session.username)
    .bind(now)
    .fetch_all(&mut **tx)
    .await?;

    let excess = (active.len() + 1).saturating_sub(max_active.max(1));
    let evicted: Vec<Session> = active
        .into_iter()
        .take(excess)
        .map(|row| {
            let mut s = row.into_session();
            s.revoked = true;
            s
        })
        .collect();

    if !evicted.is_empty() {
        let ids: Vec<Uuid> = evicted.iter().map(|s| s.session_id.into_uuid()).collect();
        sqlx::query("UPDATE auth_sessions SET revoked = TRUE WHERE session_id = ANY($1)")
            .bind(&ids)
            .execute(&mut **tx)
            .await?;
    }

    sqlx::query(&format!(
        "INSERT INTO auth_sessions ({SESSION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
    ))
    .bind(session.session_id.into_uuid())
    .bind(session.lineage_id.into_uuid())
    .bind(&session.username)
    .bind(&session.refresh_token_hash)
    .bind(session.issued_at)
    .bind(session.expires_at)
    .bind(&session.client_ip)
    .bind(&session.user_agent)
    .bind(session.remember_me)
    .bind(session.revoked)
    .execute(&mut **tx)
    .await?;

    Ok(evicted)
}

// ============================================================================
// Rate Limit Repository Implementation
// ============================================================================

impl RateLimitRepository for PgAuthRepository {
    async fn hit_rate_limit(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> AuthResult<RateLimitCounter> {
        // Windows that started at or before this instant have elapsed
        let stale_at = now - to_chrono(window);

        let row: (DateTime<Utc>, i64) = sqlx::query_as(
            r#"
            INSERT INTO rate_limit_counters (key, window_start, count)
            VALUES ($1, $2, 1)
            ON CONFLICT (key) DO UPDATE SET
                window_start = CASE
                    WHEN rate_limit_counters.window_start <= $3 THEN EXCLUDED.window_start
                    ELSE rate_limit_counters.window_start
                END,
                count = CASE
                    WHEN rate_limit_counters.window_start <= $3 THEN 1
                    ELSE rate_limit_counters.count + 1
                END
            RETURNING window_start, count
            "#,
        )
        .bind(key)
        .bind(now)
        .bind(stale_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(RateLimitCounter {
            window_start: row.0,
            count: row.1,
        })
    }

    async fn delete_stale_rate_limits(&self, before: DateTime<Utc>) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM rate_limit_counters WHERE window_start < $1")
            .bind(before)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Audit Repository Implementation
// ============================================================================

impl AuditRepository for PgAuthRepository {
    async fn append_audit_event(&self, event: &AuditEvent) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (
                id,
                event_type,
                client_ip,
                username,
                path,
                occurred_at,
                metadata
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.id.into_uuid())
        .bind(event.event_type.to_string())
        .bind(&event.client_ip)
        .bind(&event.username)
        .bind(&event.path)
        .bind(event.timestamp)
        .bind(&event.metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_audit_events(&self, limit: u32) -> AuthResult<Vec<AuditEvent>> {
        let rows = sqlx::query_as::<_, AuditEventRow>(
            r#"
            SELECT id, event_type, client_ip, username, path, occurred_at, metadata
            FROM audit_events
            ORDER BY occurred_at DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditEventRow::into_event).collect()
    }

    async fn prune_audit_events(&self, before: DateTime<Utc>) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM audit_events WHERE occurred_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct AccountRow {
    username: String,
    password_hash: String,
    is_admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_account(self) -> AuthResult<Account> {
        let password_hash = HashedPassword::from_phc_string(self.password_hash)
            .map_err(|e| AuthError::Store(format!("Invalid password hash: {}", e)))?;

        Ok(Account {
            username: UserName::from_db(&self.username),
            password_hash,
            is_admin: self.is_admin,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LoginFailuresRow {
    key: String,
    failed_attempts: i32,
    locked_until: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl LoginFailuresRow {
    fn into_login_failures(self) -> LoginFailures {
        LoginFailures {
            key: self.key,
            failed_attempts: self.failed_attempts.max(0) as u32,
            locked_until: self.locked_until,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: Uuid,
    lineage_id: Uuid,
    username: String,
    refresh_token_hash: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    client_ip: Option<String>,
    user_agent: Option<String>,
    remember_me: bool,
    revoked: bool,
}

impl SessionRow {
    fn into_session(self) -> Session {
        Session {
            session_id: SessionId::from_uuid(self.session_id),
            lineage_id: LineageId::from_uuid(self.lineage_id),
            username: self.username,
            refresh_token_hash: self.refresh_token_hash,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            client_ip: self.client_ip,
            user_agent: self.user_agent,
            remember_me: self.remember_me,
            revoked: self.revoked,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AuditEventRow {
    id: Uuid,
    event_type: String,
    client_ip: String,
    username: Option<String>,
    path: Option<String>,
    occurred_at: DateTime<Utc>,
    metadata: serde_json::Value,
}

impl AuditEventRow {
    fn into_event(self) -> AuthResult<AuditEvent> {
        let event_type = self
            .event_type
            .parse::<AuditEventType>()
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(AuditEvent {
            id: self.id.into(),
            event_type,
            client_ip: self.client_ip,
            username: self.username,
            path: self.path,
            timestamp: self.occurred_at,
            metadata: self.metadata,
        })
    }
}
