//! Single-job admission.
//!
//! The renderer runs one encode at a time. A second request is turned away
//! immediately with [`StoryreelError::Busy`]; there is no queue.

use std::sync::Arc;

use storyreel_common::error::{StoryreelError, StoryreelResult};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub struct AdmissionGate {
    slots: Arc<Semaphore>,
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionGate {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Semaphore::new(1)),
        }
    }

    /// Take the slot or fail with `Busy`.
    pub fn try_admit(&self) -> StoryreelResult<AdmissionPermit> {
        self.slots
            .clone()
            .try_acquire_owned()
            .map(|permit| AdmissionPermit { _permit: permit })
            .map_err(|_| StoryreelError::Busy)
    }

    pub fn is_busy(&self) -> bool {
        self.slots.available_permits() == 0
    }
}

/// Held for the lifetime of a job; dropping it frees the slot.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_job_is_busy() {
        let gate = AdmissionGate::new();
        let permit = gate.try_admit().unwrap();
        assert!(gate.is_busy());

        let err = gate.try_admit().unwrap_err();
        assert!(matches!(err, StoryreelError::Busy));
        assert!(err.is_retryable());

        drop(permit);
        assert!(!gate.is_busy());
        assert!(gate.clone().try_admit().is_ok());
    }
}
