//! Entity controllers: cached, owner-scoped collections with write-through CRUD.
//!
//! # Responsibility
//! - Fetch an owner's ordered snapshot and keep it as the cache.
//! - Patch the cache after confirmed store writes, without re-fetching.
//! - Compute aggregates over the cache on demand.
//!
//! # Invariants
//! - The cache is mutated only after the store confirms a write.
//! - Created rows are prepended; updated rows keep their position.
//! - The cache never holds rows of an owner other than the bound one.
//! - The state lock is never held across a store call, so concurrent writes
//!   interleave and the last response to resolve wins.

use crate::model::client::{Client, ClientStatus};
use crate::model::common::{now_epoch_ms, EntityId, OwnerId, Validate, ValidationError};
use crate::model::interaction::{Interaction, InteractionType};
use crate::model::opportunity::{Opportunity, OpportunityStage};
use crate::model::task::{Task, TaskPriority, TaskStatus};
use crate::model::Entity;
use crate::repo::{EntityStore, RepoError, TextFilter};
use crate::service::collection::Collection;
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Columns matched by client search.
pub const CLIENT_SEARCH_FIELDS: &[&str] = &["name", "email", "company"];

pub type ControllerResult<T> = Result<T, ControllerError>;

/// Load state of a controller's cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerStatus {
    /// No owner bound, or the first fetch failed.
    Uninitialized,
    /// A full fetch is in flight.
    Loading,
    /// The cache holds a confirmed snapshot.
    Ready,
}

/// Error surfaced by controller operations and mirrored into controller state.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// A write was attempted with no bound owner.
    NotAuthenticated,
    /// Draft or patch failed local shape checks.
    Validation(ValidationError),
    /// Store failure; the reason is preserved verbatim.
    Store { reason: String },
    /// Target row is missing or belongs to another owner.
    NotFound(EntityId),
}

impl ControllerError {
    /// Stable machine-readable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "not_authenticated",
            Self::Validation(_) => "validation",
            Self::Store { .. } => "store",
            Self::NotFound(_) => "not_found",
        }
    }
}

impl Display for ControllerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "no authenticated owner"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store { reason } => write!(f, "store error: {reason}"),
            Self::NotFound(id) => write!(f, "row not found: {id}"),
        }
    }
}

impl Error for ControllerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for ControllerError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ControllerError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Store {
                reason: other.to_string(),
            },
        }
    }
}

struct ControllerState<E: Entity> {
    owner: Option<OwnerId>,
    collection: Collection<E>,
    status: ControllerStatus,
    last_error: Option<ControllerError>,
    /// Whether the cache holds a confirmed snapshot for `owner`.
    loaded: bool,
}

/// Cached collection of one entity kind for one owner.
pub struct EntityController<E: Entity, S: EntityStore<E>> {
    store: Arc<S>,
    state: Mutex<ControllerState<E>>,
}

pub type ClientController<S> = EntityController<Client, S>;
pub type OpportunityController<S> = EntityController<Opportunity, S>;
pub type TaskController<S> = EntityController<Task, S>;
pub type InteractionController<S> = EntityController<Interaction, S>;

impl<E: Entity, S: EntityStore<E>> EntityController<E, S> {
    /// Creates an empty controller waiting for its first owner.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            state: Mutex::new(ControllerState {
                owner: None,
                collection: Collection::new(),
                status: ControllerStatus::Loading,
                last_error: None,
                loaded: false,
            }),
        }
    }

    /// Binds `owner` and replaces the cache with its full, ordered snapshot.
    ///
    /// Failures are recorded in [`Self::last_error`]; the previous snapshot of
    /// the same owner stays visible.
    pub async fn initialize(&self, owner: OwnerId) {
        self.begin_load(&owner);
        let started_at = Instant::now();
        let result = self.store.fetch_all(&owner, E::DEFAULT_ORDER).await;
        self.finish_load(&owner, result, "controller_initialize", started_at);
    }

    /// Re-runs the full fetch for the bound owner.
    pub async fn refetch(&self) {
        match self.owner() {
            Some(owner) => self.initialize(owner).await,
            None => {
                self.fail("controller_initialize", ControllerError::NotAuthenticated);
            }
        }
    }

    /// Drops the owner binding and the cache.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.owner = None;
        state.collection.clear();
        state.status = ControllerStatus::Uninitialized;
        state.last_error = None;
        state.loaded = false;
        debug!("event=controller_reset module=controller table={}", E::TABLE);
    }

    /// Persists a new row and prepends the store's echo to the cache.
    pub async fn create(&self, draft: E::Draft) -> ControllerResult<E> {
        let owner = self.require_owner("controller_create")?;
        if let Err(err) = draft.validate() {
            return Err(self.fail("controller_create", err.into()));
        }
        let draft = E::prepare_draft(draft, now_epoch_ms());

        let started_at = Instant::now();
        match self.store.insert(&owner, &draft).await {
            Ok(created) => {
                let mut state = self.lock();
                if state.owner.as_ref() == Some(&owner) {
                    state.collection.prepend(created.clone());
                }
                info!(
                    "event=controller_create module=controller status=ok table={} duration_ms={} rows={}",
                    E::TABLE,
                    started_at.elapsed().as_millis(),
                    state.collection.len()
                );
                Ok(created)
            }
            Err(err) => Err(self.fail("controller_create", err.into())),
        }
    }

    /// Applies a partial update and swaps the store's echo in place.
    pub async fn update(&self, id: EntityId, patch: E::Patch) -> ControllerResult<E> {
        let owner = self.require_owner("controller_update")?;
        if let Err(err) = patch.validate() {
            return Err(self.fail("controller_update", err.into()));
        }
        let current = self.get(id);
        let patch = E::prepare_patch(patch, current.as_ref(), now_epoch_ms());

        let started_at = Instant::now();
        match self.store.update(id, &owner, &patch).await {
            Ok(updated) => {
                let mut state = self.lock();
                let cached = state.owner.as_ref() == Some(&owner)
                    && state.collection.replace(updated.clone());
                info!(
                    "event=controller_update module=controller status=ok table={} duration_ms={} cached={}",
                    E::TABLE,
                    started_at.elapsed().as_millis(),
                    cached
                );
                Ok(updated)
            }
            Err(err) => Err(self.fail("controller_update", err.into())),
        }
    }

    /// Deletes a row and drops it from the cache.
    pub async fn remove(&self, id: EntityId) -> ControllerResult<()> {
        let owner = self.require_owner("controller_remove")?;

        let started_at = Instant::now();
        match self.store.delete(id, &owner).await {
            Ok(()) => {
                let mut state = self.lock();
                if state.owner.as_ref() == Some(&owner) {
                    state.collection.remove(id);
                }
                info!(
                    "event=controller_remove module=controller status=ok table={} duration_ms={} rows={}",
                    E::TABLE,
                    started_at.elapsed().as_millis(),
                    state.collection.len()
                );
                Ok(())
            }
            Err(err) => Err(self.fail("controller_remove", err.into())),
        }
    }

    /// Returns a copy of the cached rows in display order.
    pub fn snapshot(&self) -> Vec<E> {
        self.lock().collection.as_slice().to_vec()
    }

    pub fn get(&self, id: EntityId) -> Option<E> {
        self.lock().collection.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().collection.is_empty()
    }

    pub fn status(&self) -> ControllerStatus {
        self.lock().status
    }

    /// Latest recorded failure of any operation.
    pub fn last_error(&self) -> Option<ControllerError> {
        self.lock().last_error.clone()
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.lock().owner.clone()
    }

    /// Groups cached rows by `key`, keeping display order inside each group.
    ///
    /// Keys with no rows are absent from the map.
    pub fn group_by<K: Ord>(&self, key: impl Fn(&E) -> K) -> BTreeMap<K, Vec<E>> {
        let state = self.lock();
        let mut groups: BTreeMap<K, Vec<E>> = BTreeMap::new();
        for item in state.collection.iter() {
            groups.entry(key(item)).or_default().push(item.clone());
        }
        groups
    }

    /// Returns cached rows matching `predicate`, in display order.
    pub fn filter(&self, predicate: impl Fn(&E) -> bool) -> Vec<E> {
        self.lock()
            .collection
            .iter()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }

    fn begin_load(&self, owner: &OwnerId) {
        let mut state = self.lock();
        if state.owner.as_ref() != Some(owner) {
            state.collection.clear();
            state.loaded = false;
        }
        state.owner = Some(owner.clone());
        state.status = ControllerStatus::Loading;
        debug!(
            "event=controller_load module=controller status=start table={}",
            E::TABLE
        );
    }

    fn finish_load(
        &self,
        owner: &OwnerId,
        result: Result<Vec<E>, RepoError>,
        event: &'static str,
        started_at: Instant,
    ) {
        let mut state = self.lock();
        if state.owner.as_ref() != Some(owner) {
            warn!(
                "event={event} module=controller status=stale table={} duration_ms={}",
                E::TABLE,
                started_at.elapsed().as_millis()
            );
            return;
        }

        match result {
            Ok(mut rows) => {
                let fetched = rows.len();
                rows.retain(|row| row.owner_id() == owner);
                if rows.len() != fetched {
                    warn!(
                        "event={event} module=controller status=foreign_rows table={} dropped={}",
                        E::TABLE,
                        fetched - rows.len()
                    );
                }
                state.collection.replace_all(rows);
                state.status = ControllerStatus::Ready;
                state.last_error = None;
                state.loaded = true;
                info!(
                    "event={event} module=controller status=ok table={} duration_ms={} rows={}",
                    E::TABLE,
                    started_at.elapsed().as_millis(),
                    state.collection.len()
                );
            }
            Err(err) => {
                let err = ControllerError::from(err);
                state.status = if state.loaded {
                    ControllerStatus::Ready
                } else {
                    ControllerStatus::Uninitialized
                };
                error!(
                    "event={event} module=controller status=error table={} duration_ms={} error_code={} error={}",
                    E::TABLE,
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                state.last_error = Some(err);
            }
        }
    }

    fn require_owner(&self, event: &'static str) -> ControllerResult<OwnerId> {
        match self.owner() {
            Some(owner) => Ok(owner),
            None => Err(self.fail(event, ControllerError::NotAuthenticated)),
        }
    }

    fn fail(&self, event: &'static str, err: ControllerError) -> ControllerError {
        let owner_present = self.lock().owner.is_some();
        error!(
            "event={event} module=controller status=error table={} owner_present={} error_code={} error={}",
            E::TABLE,
            owner_present,
            err.code(),
            err
        );
        self.record_error(err)
    }

    fn record_error(&self, err: ControllerError) -> ControllerError {
        self.lock().last_error = Some(err.clone());
        err
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: EntityStore<Client>> EntityController<Client, S> {
    /// Replaces the cache with clients whose name, email or company contains
    /// `query`, case-insensitively.
    ///
    /// A blank query is a full fetch.
    pub async fn search(&self, query: &str) {
        let Some(owner) = self.owner() else {
            self.fail("controller_search", ControllerError::NotAuthenticated);
            return;
        };
        if query.trim().is_empty() {
            self.initialize(owner).await;
            return;
        }

        self.begin_load(&owner);
        let started_at = Instant::now();
        let filter = TextFilter::any_of(CLIENT_SEARCH_FIELDS, query.trim());
        let result = self
            .store
            .fetch_filtered(&owner, &filter, Client::DEFAULT_ORDER)
            .await;
        self.finish_load(&owner, result, "controller_search", started_at);
    }

    pub fn by_status(&self) -> BTreeMap<ClientStatus, Vec<Client>> {
        self.group_by(|client| client.status)
    }

    /// Number of distinct company names among cached clients.
    pub fn unique_company_count(&self) -> usize {
        let state = self.lock();
        state
            .collection
            .iter()
            .map(|client| client.company.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Clients created at or after `since_ms`.
    pub fn created_since(&self, since_ms: i64) -> Vec<Client> {
        self.filter(|client| client.created_at >= since_ms)
    }
}

impl<S: EntityStore<Opportunity>> EntityController<Opportunity, S> {
    pub fn by_stage(&self) -> BTreeMap<OpportunityStage, Vec<Opportunity>> {
        self.group_by(|opportunity| opportunity.stage)
    }

    /// Sum of `value` over cached opportunities; missing values count as 0.
    pub fn total_value(&self) -> f64 {
        self.lock()
            .collection
            .iter()
            .map(|opportunity| opportunity.value.unwrap_or(0.0))
            .sum()
    }

    /// Value summed per stage present in the cache.
    pub fn stage_totals(&self) -> BTreeMap<OpportunityStage, f64> {
        let state = self.lock();
        let mut totals = BTreeMap::new();
        for opportunity in state.collection.iter() {
            *totals.entry(opportunity.stage).or_insert(0.0) += opportunity.value.unwrap_or(0.0);
        }
        totals
    }

    pub fn count_in_stage(&self, stage: OpportunityStage) -> usize {
        self.lock()
            .collection
            .iter()
            .filter(|opportunity| opportunity.stage == stage)
            .count()
    }
}

impl<S: EntityStore<Task>> EntityController<Task, S> {
    pub fn by_status(&self) -> BTreeMap<TaskStatus, Vec<Task>> {
        self.group_by(|task| task.status)
    }

    pub fn by_priority(&self) -> BTreeMap<TaskPriority, Vec<Task>> {
        self.group_by(|task| task.priority)
    }

    /// Open tasks whose due date has passed, against the wall clock.
    ///
    /// Not cached: two calls may differ without any intervening write.
    pub fn overdue(&self) -> Vec<Task> {
        self.overdue_at(now_epoch_ms())
    }

    pub fn overdue_at(&self, now_ms: i64) -> Vec<Task> {
        self.filter(|task| task.is_overdue_at(now_ms))
    }
}

impl<S: EntityStore<Interaction>> EntityController<Interaction, S> {
    pub fn by_type(&self) -> BTreeMap<InteractionType, Vec<Interaction>> {
        self.group_by(|interaction| interaction.kind)
    }

    /// Sum of durations in minutes; missing durations count as 0.
    pub fn total_duration(&self) -> u64 {
        self.lock()
            .collection
            .iter()
            .map(|interaction| u64::from(interaction.duration_minutes.unwrap_or(0)))
            .sum()
    }

    pub fn by_client(&self, client_id: EntityId) -> Vec<Interaction> {
        self.filter(|interaction| interaction.client_id == Some(client_id))
    }

    pub fn by_opportunity(&self, opportunity_id: EntityId) -> Vec<Interaction> {
        self.filter(|interaction| interaction.opportunity_id == Some(opportunity_id))
    }
}

#[cfg(test)]
mod tests {
    use super::ControllerError;
    use crate::model::common::ValidationError;
    use crate::repo::RepoError;
    use uuid::Uuid;

    #[test]
    fn repo_not_found_maps_to_not_found() {
        let id = Uuid::new_v4();
        assert_eq!(
            ControllerError::from(RepoError::NotFound(id)),
            ControllerError::NotFound(id)
        );
    }

    #[test]
    fn other_repo_errors_keep_their_reason() {
        let err = ControllerError::from(RepoError::Unavailable("timeout".to_string()));
        assert_eq!(
            err,
            ControllerError::Store {
                reason: "store unavailable: timeout".to_string()
            }
        );
        assert_eq!(err.code(), "store");
    }

    #[test]
    fn validation_error_is_exposed_as_source() {
        use std::error::Error;
        let err = ControllerError::from(ValidationError::MissingField("title"));
        assert!(err.source().is_some());
    }
}
