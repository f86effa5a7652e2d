//! Process-wide admission shutter.
//!
//! Starts open. The first time a store reports saturation it trips, and from
//! then on only GET parts are admitted. It never reopens.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use obatch_domain::model::HttpMethod;
use tracing::warn;

use super::types::PartErrorKind;

#[derive(Debug, Default)]
pub struct AdmissionShutter {
    tripped: AtomicBool,
}

impl AdmissionShutter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Whether a part with `method` may run.
    pub fn accept(&self, method: HttpMethod) -> bool {
        !self.is_tripped() || method.is_read_only()
    }

    /// Records the error kind of a failed part; saturation trips the shutter.
    pub fn observe(&self, kind: PartErrorKind) {
        if kind != PartErrorKind::TooManyConcurrentRequests {
            return;
        }
        if self
            .tripped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            warn!("admission shutter tripped, only GET requests will be accepted");
            metrics::counter!("obatch_shutter_trips_total").increment(1);
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }
}
