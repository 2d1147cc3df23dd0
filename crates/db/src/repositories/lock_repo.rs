//! Repository for the `canvas_locks` table.
//!
//! One live lock per workspace, enforced by a partial unique index on
//! active rows. There is no background sweeper: expired locks are reclaimed
//! inline when the next acquire attempt comes in.

use ideaflow_core::types::DbId;
use sqlx::PgPool;

use crate::models::lock::CanvasLock;

/// Default lock duration in seconds (10 minutes).
pub const DEFAULT_LOCK_TTL_SECS: i64 = 600;

/// Maximum allowed lock duration in seconds (1 hour).
pub const MAX_LOCK_TTL_SECS: i64 = 3_600;

/// Minimum lock duration in seconds.
pub const MIN_LOCK_TTL_SECS: i64 = 30;

/// Validate a lock duration in seconds.
pub fn validate_lock_ttl(secs: i64) -> Result<(), String> {
    if secs < MIN_LOCK_TTL_SECS {
        return Err(format!(
            "Lock duration must be at least {MIN_LOCK_TTL_SECS} second(s), got {secs}"
        ));
    }
    if secs > MAX_LOCK_TTL_SECS {
        return Err(format!(
            "Lock duration must be at most {MAX_LOCK_TTL_SECS} seconds, got {secs}"
        ));
    }
    Ok(())
}

/// Column list for `canvas_locks` queries.
const COLUMNS: &str = "\
    id, workspace_id, holder_id, acquired_at, expires_at, released_at, \
    is_active, created_at, updated_at";

/// Provides data access for the workspace-scoped canvas lock.
pub struct CanvasLockRepo;

impl CanvasLockRepo {
    /// Attempt to acquire the lock on a workspace.
    ///
    /// Reclaims an expired lock first, then inserts against the partial
    /// unique index on active rows. If the insert is a no-op (a live lock
    /// exists), `None` is returned; use [`Self::get_active`] to report the
    /// holder.
    pub async fn acquire(
        pool: &PgPool,
        workspace_id: DbId,
        holder_id: DbId,
        ttl_secs: i64,
    ) -> Result<Option<CanvasLock>, sqlx::Error> {
        Self::release_expired(pool, workspace_id).await?;

        let query = format!(
            "INSERT INTO canvas_locks (workspace_id, holder_id, expires_at) \
             VALUES ($1, $2, NOW() + make_interval(secs => $3)) \
             ON CONFLICT (workspace_id) WHERE is_active \
             DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CanvasLock>(&query)
            .bind(workspace_id)
            .bind(holder_id)
            .bind(ttl_secs as f64)
            .fetch_optional(pool)
            .await
    }

    /// Release the lock. Only the holder can release.
    ///
    /// Returns `true` if a lock was released.
    pub async fn release(
        pool: &PgPool,
        workspace_id: DbId,
        holder_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE canvas_locks \
             SET is_active = FALSE, released_at = NOW(), updated_at = NOW() \
             WHERE workspace_id = $1 AND holder_id = $2 AND is_active",
        )
        .bind(workspace_id)
        .bind(holder_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Extend the holder's lock. Returns the updated lock, or `None` if the
    /// caller does not hold it.
    pub async fn extend(
        pool: &PgPool,
        workspace_id: DbId,
        holder_id: DbId,
        ttl_secs: i64,
    ) -> Result<Option<CanvasLock>, sqlx::Error> {
        let query = format!(
            "UPDATE canvas_locks \
             SET expires_at = NOW() + make_interval(secs => $3), updated_at = NOW() \
             WHERE workspace_id = $1 AND holder_id = $2 AND is_active \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CanvasLock>(&query)
            .bind(workspace_id)
            .bind(holder_id)
            .bind(ttl_secs as f64)
            .fetch_optional(pool)
            .await
    }

    /// The currently active lock row for a workspace, if any.
    ///
    /// The row may already be past its expiry; callers check with
    /// [`CanvasLock::is_live`].
    pub async fn get_active(
        pool: &PgPool,
        workspace_id: DbId,
    ) -> Result<Option<CanvasLock>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM canvas_locks \
             WHERE workspace_id = $1 AND is_active"
        );
        sqlx::query_as::<_, CanvasLock>(&query)
            .bind(workspace_id)
            .fetch_optional(pool)
            .await
    }

    /// Deactivate an expired lock for a workspace. Returns the number of
    /// rows reclaimed (0 or 1).
    pub async fn release_expired(
        pool: &PgPool,
        workspace_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE canvas_locks \
             SET is_active = FALSE, released_at = NOW(), updated_at = NOW() \
             WHERE workspace_id = $1 AND is_active AND expires_at < NOW()",
        )
        .bind(workspace_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
