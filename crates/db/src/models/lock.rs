//! Canvas lock model.

use ideaflow_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `canvas_locks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CanvasLock {
    pub id: DbId,
    pub workspace_id: DbId,
    pub holder_id: DbId,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
    pub released_at: Option<Timestamp>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CanvasLock {
    /// A lock is live while active and unexpired.
    pub fn is_live(&self, now: Timestamp) -> bool {
        self.is_active && self.expires_at > now
    }
}
