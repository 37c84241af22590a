//! Store contract consumed by the entity controllers.
//!
//! # Responsibility
//! - Define the owner-scoped CRUD and search capabilities the core needs.
//! - Provide the SQLite-backed implementation of that contract.
//!
//! # Invariants
//! - Every read and write is scoped to one owner id.
//! - `update`/`delete` against a missing or foreign row yield `NotFound`.
//! - Ownership is enforced by the store, never by the caller.

pub mod sqlite_store;

use crate::db::DbError;
use crate::model::common::{EntityId, FetchOrder, OwnerId};
use crate::model::Entity;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Failure surfaced by a store collaborator.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Row does not exist or belongs to another owner.
    NotFound(EntityId),
    InvalidData(String),
    /// Transport-level failure of a remote store.
    Unavailable(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "row not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted row data: {message}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Case-insensitive substring match OR-ed across several text columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFilter {
    pub fields: &'static [&'static str],
    pub needle: String,
}

impl TextFilter {
    pub fn any_of(fields: &'static [&'static str], needle: impl Into<String>) -> Self {
        Self {
            fields,
            needle: needle.into(),
        }
    }

    /// Returns whether the filter would match every row.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() || self.needle.trim().is_empty()
    }
}

/// Owner-scoped persistence for one entity kind.
///
/// Every method is an asynchronous suspension point for the caller.
#[async_trait]
pub trait EntityStore<E: Entity>: Send + Sync {
    /// Returns all rows owned by `owner` in the requested order.
    async fn fetch_all(&self, owner: &OwnerId, order: FetchOrder) -> RepoResult<Vec<E>>;

    /// Returns the owner's rows matching `filter`, in the requested order.
    async fn fetch_filtered(
        &self,
        owner: &OwnerId,
        filter: &TextFilter,
        order: FetchOrder,
    ) -> RepoResult<Vec<E>>;

    /// Persists a new row; the store assigns id and timestamps.
    async fn insert(&self, owner: &OwnerId, draft: &E::Draft) -> RepoResult<E>;

    /// Applies a partial update and returns the fresh row.
    async fn update(&self, id: EntityId, owner: &OwnerId, patch: &E::Patch) -> RepoResult<E>;

    async fn delete(&self, id: EntityId, owner: &OwnerId) -> RepoResult<()>;
}
