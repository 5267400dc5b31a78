use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::domain::BookingId;

/// Keyed async lock serialising writes per booking.
///
/// Several bookings are always acquired in ascending id order so two writers touching
/// overlapping sets cannot deadlock.
#[derive(Debug, Default)]
pub struct BookingLocks {
    slots: Mutex<HashMap<BookingId, Arc<AsyncMutex<()>>>>,
}

/// Held locks; dropping it releases every booking.
#[derive(Debug)]
pub struct BookingGuard {
    bookings: Vec<BookingId>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl BookingGuard {
    pub fn bookings(&self) -> &[BookingId] {
        &self.bookings
    }
}

impl BookingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, booking_id: BookingId) -> BookingGuard {
        self.lock_all(&[booking_id]).await
    }

    pub async fn lock_all(&self, booking_ids: &[BookingId]) -> BookingGuard {
        let mut bookings = booking_ids.to_vec();
        bookings.sort();
        bookings.dedup();

        let mut guards = Vec::with_capacity(bookings.len());
        for booking_id in &bookings {
            let slot = self.slot(*booking_id);
            guards.push(slot.lock_owned().await);
        }

        BookingGuard {
            bookings,
            _guards: guards,
        }
    }

    fn slot(&self, booking_id: BookingId) -> Arc<AsyncMutex<()>> {
        let mut slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        // slots nobody holds or waits on can be dropped
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        slots.entry(booking_id).or_default().clone()
    }

    /// Number of bookings currently locked or awaited.
    pub fn active(&self) -> usize {
        match self.slots.lock() {
            Ok(slots) => slots.values().filter(|slot| Arc::strong_count(slot) > 1).count(),
            Err(poisoned) => poisoned
                .into_inner()
                .values()
                .filter(|slot| Arc::strong_count(slot) > 1)
                .count(),
        }
    }
}
