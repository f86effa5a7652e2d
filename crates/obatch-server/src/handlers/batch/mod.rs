//! `$batch` handler.
//!
//! A batch goes through two phases:
//!
//! 1. **Admission**: the envelope is parsed and the whole-batch ceilings
//!    (part count, aggregate `$top`) are checked. Any failure rejects the
//!    batch before a single part runs.
//! 2. **Execution**: parts run one at a time in source order. Every part
//!    yields exactly one [`PartResult`]; a failing part never stops or undoes
//!    its siblings.
//!
//! Per part, the dispatcher consults the process-wide [`AdmissionShutter`],
//! routes the method/path combination, validates the part's own query
//! options, and runs the [`LinkGuard`] before anything that creates a link.
//!
//! Client changesets are flattened on ingress. Each mutating part commits on
//! its own and is answered inside its own single-member changeset.

mod assembler;
mod handler;
mod link_guard;
mod quota;
mod shutter;
mod types;

pub use assembler::{assemble, reason_phrase};
pub use handler::BatchHandler;
pub use link_guard::LinkGuard;
pub use quota::{pre_validate, BatchAggregate};
pub use shutter::AdmissionShutter;
pub use types::{
    error_codes, error_envelope, BatchError, BatchLimits, BatchRequest, BatchResponse,
    BatchResult, PartError, PartErrorKind, PartResult,
};
