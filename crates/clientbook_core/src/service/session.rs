//! Binds the four entity controllers to the identity lifecycle.
//!
//! # Invariants
//! - Controllers are (re)initialized only when the owner goes from absent to
//!   present or changes to a different id.
//! - Sign-out resets every controller, so no rows of the previous owner
//!   remain observable.
//! - `Resolving` leaves the controllers untouched.

use crate::identity::{IdentityState, IdentityWatcher};
use crate::model::client::Client;
use crate::model::common::OwnerId;
use crate::model::interaction::Interaction;
use crate::model::opportunity::Opportunity;
use crate::model::task::Task;
use crate::repo::EntityStore;
use crate::service::controller::{
    ClientController, InteractionController, OpportunityController, TaskController,
};
use log::info;
use std::sync::Arc;

/// Store able to persist every entity kind.
pub trait CrmStore:
    EntityStore<Client> + EntityStore<Opportunity> + EntityStore<Task> + EntityStore<Interaction>
{
}

impl<S> CrmStore for S where
    S: EntityStore<Client>
        + EntityStore<Opportunity>
        + EntityStore<Task>
        + EntityStore<Interaction>
{
}

/// The four controllers over one shared store.
///
/// Cloning is cheap and shares the same controllers.
pub struct CrmSession<S: CrmStore> {
    clients: Arc<ClientController<S>>,
    opportunities: Arc<OpportunityController<S>>,
    tasks: Arc<TaskController<S>>,
    interactions: Arc<InteractionController<S>>,
}

impl<S: CrmStore> Clone for CrmSession<S> {
    fn clone(&self) -> Self {
        Self {
            clients: Arc::clone(&self.clients),
            opportunities: Arc::clone(&self.opportunities),
            tasks: Arc::clone(&self.tasks),
            interactions: Arc::clone(&self.interactions),
        }
    }
}

impl<S: CrmStore> CrmSession<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            clients: Arc::new(ClientController::new(Arc::clone(&store))),
            opportunities: Arc::new(OpportunityController::new(Arc::clone(&store))),
            tasks: Arc::new(TaskController::new(Arc::clone(&store))),
            interactions: Arc::new(InteractionController::new(store)),
        }
    }

    pub fn clients(&self) -> &ClientController<S> {
        &self.clients
    }

    pub fn opportunities(&self) -> &OpportunityController<S> {
        &self.opportunities
    }

    pub fn tasks(&self) -> &TaskController<S> {
        &self.tasks
    }

    pub fn interactions(&self) -> &InteractionController<S> {
        &self.interactions
    }

    /// Applies one identity state to every controller.
    pub async fn sync_identity(&self, identity: &IdentityState) {
        match identity {
            IdentityState::Resolving => {}
            IdentityState::SignedIn(owner) => {
                if self.is_bound_to(owner) {
                    return;
                }
                info!("event=session_bind module=session status=start");
                tokio::join!(
                    self.clients.initialize(owner.clone()),
                    self.opportunities.initialize(owner.clone()),
                    self.tasks.initialize(owner.clone()),
                    self.interactions.initialize(owner.clone()),
                );
                info!("event=session_bind module=session status=ok");
            }
            IdentityState::SignedOut => {
                self.clients.reset();
                self.opportunities.reset();
                self.tasks.reset();
                self.interactions.reset();
                info!("event=session_reset module=session status=ok");
            }
        }
    }

    /// Follows `watcher` until its provider is dropped.
    pub async fn run(&self, mut watcher: IdentityWatcher) {
        self.sync_identity(&watcher.current()).await;
        while let Some(identity) = watcher.changed().await {
            self.sync_identity(&identity).await;
        }
        info!("event=session_run module=session status=closed");
    }

    fn is_bound_to(&self, owner: &OwnerId) -> bool {
        let expected = Some(owner);
        self.clients.owner().as_ref() == expected
            && self.opportunities.owner().as_ref() == expected
            && self.tasks.owner().as_ref() == expected
            && self.interactions.owner().as_ref() == expected
    }
}
