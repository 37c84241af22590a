//! Core data layer for ClientBook.
//! Owner-scoped caches of clients, opportunities, tasks and interactions,
//! kept consistent with a persistent store through write-through operations.

pub mod db;
pub mod identity;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError};
pub use identity::{IdentityProvider, IdentityState, IdentityWatcher};
pub use logging::{
    default_log_level, init_logging, init_logging_with, logging_status, LogSettings, LoggingError,
};
pub use model::client::{Client, ClientDraft, ClientPatch, ClientStatus};
pub use model::common::{
    now_epoch_ms, EntityId, FetchOrder, NullsPosition, OwnerId, SortDirection, Validate,
    ValidationError,
};
pub use model::interaction::{Interaction, InteractionDraft, InteractionPatch, InteractionType};
pub use model::opportunity::{Opportunity, OpportunityDraft, OpportunityPatch, OpportunityStage};
pub use model::task::{Task, TaskDraft, TaskPatch, TaskPriority, TaskStatus, TaskType};
pub use model::Entity;
pub use repo::sqlite_store::SqliteStore;
pub use repo::{EntityStore, RepoError, RepoResult, TextFilter};
pub use service::controller::{
    ClientController, ControllerError, ControllerResult, ControllerStatus, EntityController,
    InteractionController, OpportunityController, TaskController,
};
pub use service::session::{CrmSession, CrmStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
