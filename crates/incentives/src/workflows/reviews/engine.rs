use std::sync::Arc;

use super::audited::{AuditedProcessor, AuditedReviewService, Notifier};
use super::cache::ScheduleCache;
use super::directory::PrisonerDirectory;
use super::history::ReviewHistoryStore;
use super::levels::LevelCatalog;
use super::locks::BookingLocks;
use super::processor::ReviewLifecycleProcessor;
use super::repository::{NextReviewDateRepository, ReviewRepository};
use super::schedule::ReviewScheduler;
use super::service::ReviewService;
use crate::config::PolicyConfig;

/// External collaborators injected into the engine.
#[derive(Clone)]
pub struct Collaborators {
    pub reviews: Arc<dyn ReviewRepository>,
    pub next_review_dates: Arc<dyn NextReviewDateRepository>,
    pub catalog: Arc<dyn LevelCatalog>,
    pub directory: Arc<dyn PrisonerDirectory>,
}

/// Processor and service sharing one history store, schedule cache and lock table.
pub struct ReviewEngine {
    processor: Arc<ReviewLifecycleProcessor>,
    service: Arc<ReviewService>,
    history: Arc<ReviewHistoryStore>,
    locks: Arc<BookingLocks>,
    policy: PolicyConfig,
}

impl ReviewEngine {
    pub fn new(collaborators: Collaborators, policy: PolicyConfig) -> Self {
        let Collaborators {
            reviews,
            next_review_dates,
            catalog,
            directory,
        } = collaborators;

        let scheduler = ReviewScheduler::new(policy.basic_level_code.clone());
        let cache = Arc::new(ScheduleCache::new(
            Arc::clone(&reviews),
            next_review_dates,
            Arc::clone(&directory),
            scheduler,
        ));
        let history = Arc::new(ReviewHistoryStore::new(reviews, cache));
        let locks = Arc::new(BookingLocks::new());

        let processor = Arc::new(ReviewLifecycleProcessor::new(
            Arc::clone(&directory),
            Arc::clone(&catalog),
            Arc::clone(&history),
            Arc::clone(&locks),
            policy.clone(),
        ));
        let service = Arc::new(ReviewService::new(
            directory,
            catalog,
            Arc::clone(&history),
            Arc::clone(&locks),
        ));

        Self {
            processor,
            service,
            history,
            locks,
            policy,
        }
    }

    pub fn processor(&self) -> Arc<ReviewLifecycleProcessor> {
        Arc::clone(&self.processor)
    }

    pub fn service(&self) -> Arc<ReviewService> {
        Arc::clone(&self.service)
    }

    pub fn history(&self) -> Arc<ReviewHistoryStore> {
        Arc::clone(&self.history)
    }

    pub fn locks(&self) -> Arc<BookingLocks> {
        Arc::clone(&self.locks)
    }

    /// Wraps the processor and service so committed transitions are announced.
    pub fn audited(&self, notifier: Notifier) -> (AuditedProcessor, AuditedReviewService) {
        (
            AuditedProcessor::new(self.processor(), notifier.clone()),
            AuditedReviewService::new(
                self.service(),
                notifier,
                self.policy.system_username.clone(),
            ),
        )
    }
}
