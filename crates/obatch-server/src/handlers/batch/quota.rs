//! Whole-batch checks run after parsing and before any part executes.

use obatch_domain::model::HttpMethod;
use obatch_domain::Envelope;

use super::types::{BatchError, BatchLimits, BatchResult};

/// Cross-part counters of one envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchAggregate {
    /// Sum of `$top` over GET parts; unparseable values count as 0.
    pub top_sum: u64,
}

impl BatchAggregate {
    pub fn from_envelope(envelope: &Envelope) -> Self {
        let top_sum = envelope
            .parts
            .iter()
            .filter(|p| p.method == HttpMethod::Get)
            .map(|p| p.query.top_hint())
            .fold(0u64, u64::saturating_add);
        Self { top_sum }
    }
}

/// Rejects envelopes over the part-count or aggregate `$top` ceilings.
pub fn pre_validate(envelope: &Envelope, limits: &BatchLimits) -> BatchResult<BatchAggregate> {
    if envelope.len() > limits.max_parts {
        return Err(BatchError::TooManyParts {
            count: envelope.len(),
            max: limits.max_parts,
        });
    }
    let aggregate = BatchAggregate::from_envelope(envelope);
    if aggregate.top_sum > limits.top_sum_max {
        return Err(BatchError::AggregateTopExceeded {
            sum: aggregate.top_sum,
            max: limits.top_sum_max,
        });
    }
    Ok(aggregate)
}
