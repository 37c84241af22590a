//! Domain model for the four relationship-management collections.
//!
//! # Responsibility
//! - Define records, create drafts and partial-update patches per kind.
//! - Describe per-kind metadata the controllers and stores rely on.
//!
//! # Invariants
//! - Every record carries an immutable id, its owner and two timestamps.
//! - Drafts never carry id, owner or timestamps; the store assigns them.
//! - Patches enumerate exactly the fields that may change.

pub mod client;
pub mod common;
pub mod interaction;
pub mod opportunity;
pub mod task;

use crate::model::common::{EntityId, FetchOrder, OwnerId, Validate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Per-kind contract shared by every cached collection.
pub trait Entity: Debug + Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Create input, validated locally before it reaches the store.
    type Draft: Validate + Debug + Clone + Send + Sync + 'static;
    /// Partial update input; absent fields are left untouched.
    type Patch: Validate + Debug + Clone + Send + Sync + 'static;

    /// Store table holding this kind.
    const TABLE: &'static str;
    /// Ordering used by the full collection fetch.
    const DEFAULT_ORDER: FetchOrder;

    fn id(&self) -> EntityId;
    fn owner_id(&self) -> &OwnerId;

    /// Rewrites a draft right before it is sent to the store.
    fn prepare_draft(draft: Self::Draft, _now_ms: i64) -> Self::Draft {
        draft
    }

    /// Rewrites a patch right before it is sent to the store.
    ///
    /// `current` is the cached row being patched, when the controller holds it.
    fn prepare_patch(patch: Self::Patch, _current: Option<&Self>, _now_ms: i64) -> Self::Patch {
        patch
    }
}
