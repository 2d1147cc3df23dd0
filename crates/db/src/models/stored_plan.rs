//! Stored plan (bounded history) model.

use ideaflow_core::plan::{InversePlan, Mutation};
use ideaflow_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `stored_plans` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StoredPlan {
    pub id: DbId,
    pub workspace_id: DbId,
    pub description: String,
    pub mutations_json: serde_json::Value,
    pub inverse_json: serde_json::Value,
    pub is_reversible: bool,
    pub irreversibility_reasons: serde_json::Value,
    pub executed_by: DbId,
    pub executed_at: Timestamp,
}

impl StoredPlan {
    /// Deserialize the recorded inverse mutations.
    pub fn inverse_mutations(&self) -> Result<Vec<Mutation>, serde_json::Error> {
        serde_json::from_value(self.inverse_json.clone())
    }

    /// Deserialize the irreversibility reasons.
    pub fn reasons(&self) -> Vec<String> {
        serde_json::from_value(self.irreversibility_reasons.clone()).unwrap_or_default()
    }
}

/// Insert payload for a newly executed plan.
#[derive(Debug, Clone)]
pub struct NewStoredPlan {
    pub workspace_id: DbId,
    pub description: String,
    pub mutations: Vec<Mutation>,
    pub inverse: InversePlan,
    pub executed_by: DbId,
}
