//! In-memory implementations of the review engine's collaborators.
//!
//! Each store keeps its state behind a single lock, which makes every trait method atomic
//! with respect to the others.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, RwLock};

use async_trait::async_trait;

use super::directory::{DirectoryError, PrisonerDetails, PrisonerDirectory};
use super::domain::{sort_most_recent_first, BookingId, NewReview, NextReviewDate, Review, ReviewId};
use super::levels::{CatalogError, IncentiveLevel, LevelCatalog, PrisonIncentiveLevel};
use super::repository::{
    MergeBatch, MergeOutcome, NextReviewDateRepository, RepositoryError, ReviewRepository,
};

fn poisoned(store: &str) -> RepositoryError {
    RepositoryError::Unavailable(format!("{store} lock poisoned"))
}

#[derive(Debug, Default)]
struct ReviewTable {
    last_id: i64,
    rows: BTreeMap<ReviewId, Review>,
}

impl ReviewTable {
    fn next_id(&mut self) -> ReviewId {
        self.last_id += 1;
        ReviewId(self.last_id)
    }

    fn select(&self, predicate: impl Fn(&Review) -> bool) -> Vec<Review> {
        let mut reviews: Vec<Review> = self
            .rows
            .values()
            .filter(|review| predicate(review))
            .cloned()
            .collect();
        sort_most_recent_first(&mut reviews);
        reviews
    }

    fn clear_current(&mut self, booking_id: BookingId, except: Option<ReviewId>) {
        for review in self.rows.values_mut() {
            if review.booking_id == booking_id && review.current && Some(review.id) != except {
                review.current = false;
            }
        }
    }

    fn insert(&mut self, review: NewReview) -> Review {
        if review.current {
            self.clear_current(review.booking_id, None);
        }
        let id = self.next_id();
        let stored = review.with_id(id);
        self.rows.insert(id, stored.clone());
        stored
    }

    /// Keeps only the most recent current review of a booking flagged as current.
    fn normalize_current(&mut self, booking_id: BookingId) {
        let keep = self
            .select(|review| review.booking_id == booking_id && review.current)
            .first()
            .map(|review| review.id);
        if let Some(keep) = keep {
            self.clear_current(booking_id, Some(keep));
        }
    }
}

/// Review history held in process memory.
#[derive(Debug, Default)]
pub struct MemoryReviewRepository {
    table: Mutex<ReviewTable>,
}

impl MemoryReviewRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> Result<MutexGuard<'_, ReviewTable>, RepositoryError> {
        self.table.lock().map_err(|_| poisoned("review store"))
    }

    /// Snapshot of every stored review, most recent first.
    pub fn all(&self) -> Result<Vec<Review>, RepositoryError> {
        Ok(self.table()?.select(|_| true))
    }
}

#[async_trait]
impl ReviewRepository for MemoryReviewRepository {
    async fn insert(&self, review: NewReview) -> Result<Review, RepositoryError> {
        Ok(self.table()?.insert(review))
    }

    async fn update(&self, review: Review) -> Result<Review, RepositoryError> {
        let mut table = self.table()?;
        if !table.rows.contains_key(&review.id) {
            return Err(RepositoryError::ReviewNotFound(review.id));
        }
        if review.current {
            table.clear_current(review.booking_id, Some(review.id));
        }
        table.rows.insert(review.id, review.clone());
        Ok(review)
    }

    async fn delete(&self, id: ReviewId) -> Result<Review, RepositoryError> {
        let mut table = self.table()?;
        let removed = table
            .rows
            .remove(&id)
            .ok_or(RepositoryError::ReviewNotFound(id))?;

        if removed.current {
            let latest = table
                .select(|review| review.booking_id == removed.booking_id)
                .first()
                .map(|review| review.id);
            if let Some(row) = latest.and_then(|latest| table.rows.get_mut(&latest)) {
                row.current = true;
            }
        }
        Ok(removed)
    }

    async fn fetch(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        Ok(self.table()?.rows.get(&id).cloned())
    }

    async fn for_booking(&self, booking_id: BookingId) -> Result<Vec<Review>, RepositoryError> {
        Ok(self.table()?.select(|review| review.booking_id == booking_id))
    }

    async fn for_bookings(
        &self,
        booking_ids: &[BookingId],
    ) -> Result<Vec<Review>, RepositoryError> {
        Ok(self
            .table()?
            .select(|review| booking_ids.contains(&review.booking_id)))
    }

    async fn for_prisoner(&self, prisoner_number: &str) -> Result<Vec<Review>, RepositoryError> {
        Ok(self
            .table()?
            .select(|review| review.prisoner_number == prisoner_number))
    }

    async fn current_for_bookings(
        &self,
        booking_ids: &[BookingId],
    ) -> Result<Vec<Review>, RepositoryError> {
        Ok(self
            .table()?
            .select(|review| review.current && booking_ids.contains(&review.booking_id)))
    }

    async fn apply_merge(&self, batch: MergeBatch) -> Result<MergeOutcome, RepositoryError> {
        let mut table = self.table()?;

        let missing = batch
            .relabeled
            .iter()
            .map(|review| review.id)
            .chain(batch.rebooked.iter().map(|(id, _)| *id))
            .find(|id| !table.rows.contains_key(id));
        if let Some(id) = missing {
            return Err(RepositoryError::ReviewNotFound(id));
        }

        let mut touched = BTreeSet::new();
        let mut vacated = BTreeSet::new();
        let mut written = Vec::with_capacity(batch.len());

        for review in batch.relabeled {
            touched.insert(review.booking_id);
            table.rows.insert(review.id, review.clone());
            written.push(review);
        }
        for (original, replacement) in batch.rebooked {
            if let Some(removed) = table.rows.remove(&original) {
                touched.insert(removed.booking_id);
                vacated.insert(removed.booking_id);
            }
            touched.insert(replacement.booking_id);
            let id = table.next_id();
            let stored = replacement.with_id(id);
            table.rows.insert(id, stored.clone());
            written.push(stored);
        }
        for booking_id in touched {
            table.normalize_current(booking_id);
        }
        let emptied = vacated
            .into_iter()
            .filter(|booking_id| {
                table
                    .rows
                    .values()
                    .all(|review| review.booking_id != *booking_id)
            })
            .collect();

        // reflect any current flags cleared by normalisation
        let written = written
            .into_iter()
            .filter_map(|review| table.rows.get(&review.id).cloned())
            .collect::<Vec<_>>();
        Ok(MergeOutcome { written, emptied })
    }

    async fn reassign_prisoner(
        &self,
        booking_id: BookingId,
        from: &str,
        to: &str,
    ) -> Result<Vec<Review>, RepositoryError> {
        let mut table = self.table()?;
        let mut rewritten = Vec::new();
        for review in table.rows.values_mut() {
            if review.booking_id == booking_id && review.prisoner_number == from {
                review.prisoner_number = to.to_string();
                rewritten.push(review.clone());
            }
        }
        sort_most_recent_first(&mut rewritten);
        Ok(rewritten)
    }
}

/// Next review date cache held in process memory.
#[derive(Debug, Default)]
pub struct MemoryNextReviewDateRepository {
    records: Mutex<BTreeMap<BookingId, NextReviewDate>>,
}

impl MemoryNextReviewDateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NextReviewDateRepository for MemoryNextReviewDateRepository {
    async fn fetch_many(
        &self,
        booking_ids: &[BookingId],
    ) -> Result<BTreeMap<BookingId, NextReviewDate>, RepositoryError> {
        let records = self
            .records
            .lock()
            .map_err(|_| poisoned("next review date store"))?;
        Ok(booking_ids
            .iter()
            .filter_map(|booking_id| records.get(booking_id).map(|record| (*booking_id, record.clone())))
            .collect())
    }

    async fn save_many(&self, batch: Vec<NextReviewDate>) -> Result<(), RepositoryError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| poisoned("next review date store"))?;
        for record in batch {
            records.insert(record.booking_id, record);
        }
        Ok(())
    }

    async fn delete_many(&self, booking_ids: &[BookingId]) -> Result<(), RepositoryError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| poisoned("next review date store"))?;
        for booking_id in booking_ids {
            records.remove(booking_id);
        }
        Ok(())
    }
}

/// Level configuration loaded up front.
#[derive(Debug, Default)]
pub struct MemoryLevelCatalog {
    levels: RwLock<Vec<IncentiveLevel>>,
    prison_levels: RwLock<Vec<PrisonIncentiveLevel>>,
}

impl MemoryLevelCatalog {
    pub fn new(levels: Vec<IncentiveLevel>, prison_levels: Vec<PrisonIncentiveLevel>) -> Self {
        Self {
            levels: RwLock::new(levels),
            prison_levels: RwLock::new(prison_levels),
        }
    }

    /// Inserts or replaces the configuration of one level at one prison.
    pub fn configure_prison_level(&self, level: PrisonIncentiveLevel) -> Result<(), CatalogError> {
        let mut prison_levels = self
            .prison_levels
            .write()
            .map_err(|_| CatalogError::Unavailable("level catalog lock poisoned".to_string()))?;
        prison_levels.retain(|existing| {
            !(existing.prison_id == level.prison_id && existing.level_code == level.level_code)
        });
        prison_levels.push(level);
        Ok(())
    }
}

#[async_trait]
impl LevelCatalog for MemoryLevelCatalog {
    async fn global_levels(&self) -> Result<Vec<IncentiveLevel>, CatalogError> {
        let mut levels = self
            .levels
            .read()
            .map_err(|_| CatalogError::Unavailable("level catalog lock poisoned".to_string()))?
            .clone();
        levels.sort_by_key(|level| level.sequence);
        Ok(levels)
    }

    async fn prison_levels(
        &self,
        prison_id: &str,
    ) -> Result<Vec<PrisonIncentiveLevel>, CatalogError> {
        let prison_levels = self
            .prison_levels
            .read()
            .map_err(|_| CatalogError::Unavailable("level catalog lock poisoned".to_string()))?;
        Ok(prison_levels
            .iter()
            .filter(|level| level.prison_id == prison_id && level.active)
            .cloned()
            .collect())
    }
}

/// Prisoner directory backed by a fixed set of prisoners.
#[derive(Debug, Default)]
pub struct MemoryPrisonerDirectory {
    prisoners: RwLock<BTreeMap<String, PrisonerDetails>>,
}

impl MemoryPrisonerDirectory {
    pub fn new(prisoners: impl IntoIterator<Item = PrisonerDetails>) -> Self {
        let directory = Self::default();
        if let Ok(mut map) = directory.prisoners.write() {
            for prisoner in prisoners {
                map.insert(prisoner.prisoner_number.clone(), prisoner);
            }
        }
        directory
    }

    pub fn upsert(&self, prisoner: PrisonerDetails) -> Result<(), DirectoryError> {
        self.prisoners
            .write()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?
            .insert(prisoner.prisoner_number.clone(), prisoner);
        Ok(())
    }

    pub fn remove(&self, prisoner_number: &str) -> Result<(), DirectoryError> {
        self.prisoners
            .write()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?
            .remove(prisoner_number);
        Ok(())
    }
}

#[async_trait]
impl PrisonerDirectory for MemoryPrisonerDirectory {
    async fn by_number(&self, prisoner_number: &str) -> Result<PrisonerDetails, DirectoryError> {
        self.prisoners
            .read()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?
            .get(prisoner_number)
            .cloned()
            .ok_or_else(|| DirectoryError::PrisonerNotFound(prisoner_number.to_string()))
    }

    async fn by_booking(&self, booking_id: BookingId) -> Result<PrisonerDetails, DirectoryError> {
        self.prisoners
            .read()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?
            .values()
            .find(|prisoner| prisoner.booking_id == booking_id)
            .cloned()
            .ok_or(DirectoryError::BookingNotFound(booking_id))
    }
}
