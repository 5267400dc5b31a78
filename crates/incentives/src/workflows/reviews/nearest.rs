use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use super::levels::{CatalogError, IncentiveLevel, LevelCatalog, PrisonIncentiveLevel};

/// Chooses the level a transferred prisoner lands on when their level is not offered at the
/// destination prison.
#[derive(Clone)]
pub struct NearestLevelResolver {
    catalog: Arc<dyn LevelCatalog>,
}

impl NearestLevelResolver {
    pub fn new(catalog: Arc<dyn LevelCatalog>) -> Self {
        Self { catalog }
    }

    /// Same-or-higher available level first, then same-or-lower, then the prison default.
    pub async fn resolve(&self, prison_id: &str, target_code: &str) -> Result<String, CatalogError> {
        let global = self.catalog.global_levels().await?;
        let prison = self.catalog.prison_levels(prison_id).await?;

        if let Some(code) = nearest_available(&global, &prison, target_code) {
            return Ok(code.to_string());
        }

        debug!(
            prison_id,
            target_code, "no equivalent level available, using prison default"
        );
        self.catalog.default_level(prison_id).await
    }
}

/// Pure part of the resolution. `global` must be ordered by ascending sequence.
pub fn nearest_available<'a>(
    global: &'a [IncentiveLevel],
    prison: &[PrisonIncentiveLevel],
    target_code: &str,
) -> Option<&'a str> {
    let active_in_prison: BTreeSet<&str> = prison
        .iter()
        .filter(|level| level.active)
        .map(|level| level.level_code.as_str())
        .collect();
    let available = |level: &IncentiveLevel| level.active && active_in_prison.contains(level.code.as_str());

    let target = global.iter().position(|level| level.code == target_code)?;

    global[target..]
        .iter()
        .find(|level| available(level))
        .or_else(|| global[..=target].iter().rev().find(|level| available(level)))
        .map(|level| level.code.as_str())
}
