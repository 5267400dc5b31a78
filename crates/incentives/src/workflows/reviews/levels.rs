use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Globally known incentive level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncentiveLevel {
    pub code: String,
    pub name: String,
    pub sequence: i32,
    pub active: bool,
}

/// Configuration of one level at one prison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrisonIncentiveLevel {
    pub prison_id: String,
    pub level_code: String,
    pub active: bool,
    #[serde(default)]
    pub default_on_admission: bool,
    #[serde(default)]
    pub remand_transfer_limit_in_pence: i32,
    #[serde(default)]
    pub remand_spend_limit_in_pence: i32,
    #[serde(default)]
    pub convicted_transfer_limit_in_pence: i32,
    #[serde(default)]
    pub convicted_spend_limit_in_pence: i32,
    #[serde(default)]
    pub visit_orders: i32,
    #[serde(default)]
    pub privileged_visit_orders: i32,
}

/// Read-only view over global and per-prison level configuration.
#[async_trait]
pub trait LevelCatalog: Send + Sync {
    /// All levels, active or not, ordered by ascending `sequence`.
    async fn global_levels(&self) -> Result<Vec<IncentiveLevel>, CatalogError>;

    /// Levels active at the given prison.
    async fn prison_levels(&self, prison_id: &str)
        -> Result<Vec<PrisonIncentiveLevel>, CatalogError>;

    /// The level new arrivals are placed on at the given prison.
    async fn default_level(&self, prison_id: &str) -> Result<String, CatalogError> {
        let levels = self.prison_levels(prison_id).await?;
        levels
            .into_iter()
            .find(|level| level.active && level.default_on_admission)
            .map(|level| level.level_code)
            .ok_or_else(|| CatalogError::NoDefaultLevel {
                prison_id: prison_id.to_string(),
            })
    }

    /// Looks up one level by code, active or not.
    async fn level(&self, code: &str) -> Result<IncentiveLevel, CatalogError> {
        self.global_levels()
            .await?
            .into_iter()
            .find(|level| level.code == code)
            .ok_or_else(|| CatalogError::UnknownLevel {
                code: code.to_string(),
            })
    }
}

/// Catalog failures.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("prison {prison_id} has no active default level for new admissions")]
    NoDefaultLevel { prison_id: String },
    #[error("incentive level {code} not found")]
    UnknownLevel { code: String },
    #[error("level catalog unavailable: {0}")]
    Unavailable(String),
}
