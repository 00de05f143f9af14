//! Admission control: cap the number of in-flight conversions.
//!
//! A counting semaphore hands out one [`Permit`] per admitted conversion. The
//! permit travels with the conversion task and is returned when it is dropped,
//! so a slot is freed on success, on failure and on panic alike.
//!
//! Tokio's semaphore is fair: waiters are served in the order they called
//! [`AdmissionGate::admit`], which keeps admission in arrival order.

use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// A bounded admission gate.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

/// One admitted conversion. Dropping it frees the slot.
#[derive(Debug)]
pub struct Permit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    /// Gate admitting at most `limit` holders at once (`limit` is clamped to ≥ 1).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Wait for a free slot.
    ///
    /// Fails only if the gate has been closed.
    pub async fn admit(&self) -> Result<Permit, AcquireError> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await?;
        Ok(Permit { _permit: permit })
    }

    /// Stop admitting. Pending and future `admit` calls fail; permits already
    /// handed out stay valid until dropped.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of permits currently held.
    pub fn in_flight(&self) -> usize {
        self.limit - self.semaphore.available_permits()
    }
}
