//! Deterministic fold of the committed replicated log into the approval
//! key-value view, and the vote-tally rules that finalize an approval.
//!
//! Pinned to a single task in production (see `hyperraft-node`'s task
//! layout) so `apply` calls never race each other.

mod emitter;
mod error;
mod metrics;
mod payload;
mod pending;
mod projector;

pub use emitter::{ApprovalFinalized, FinalityEmitter, NullEmitter};
pub use error::{ProjectorError, ProjectorResult};
pub use metrics::ProjectorMetrics;
pub use payload::{ApprovalCreatePayload, VotePayload};
pub use projector::{Projector, DEFAULT_PENDING_VOTE_RETENTION};
