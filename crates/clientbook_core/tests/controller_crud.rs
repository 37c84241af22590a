use clientbook_core::{
    Client, ClientController, ClientDraft, ClientPatch, ClientStatus, ControllerError,
    ControllerStatus, EntityStore, FetchOrder, OwnerId, SqliteStore, ValidationError,
};
use std::sync::Arc;

fn owner(id: &str) -> OwnerId {
    OwnerId::new(id).unwrap()
}

fn draft(name: &str, company: &str) -> ClientDraft {
    ClientDraft::new(
        name,
        format!("{}@example.com", name.to_lowercase()),
        "5550001111",
        company,
    )
}

fn new_controller() -> (Arc<SqliteStore>, ClientController<SqliteStore>) {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let controller = ClientController::new(Arc::clone(&store));
    (store, controller)
}

async fn seed(store: &SqliteStore, owner: &OwnerId, name: &str) {
    EntityStore::<Client>::insert(store, owner, &draft(name, "Acme"))
        .await
        .unwrap();
}

#[tokio::test]
async fn controller_starts_loading_and_becomes_ready() {
    let (_store, clients) = new_controller();
    assert_eq!(clients.status(), ControllerStatus::Loading);
    assert!(clients.is_empty());

    clients.initialize(owner("user-a")).await;
    assert_eq!(clients.status(), ControllerStatus::Ready);
    assert_eq!(clients.last_error(), None);
    assert_eq!(clients.owner(), Some(owner("user-a")));
}

#[tokio::test]
async fn initialize_loads_only_the_owners_rows_newest_first() {
    let (store, clients) = new_controller();
    seed(&store, &owner("user-a"), "Ana").await;
    seed(&store, &owner("user-b"), "Bruno").await;
    seed(&store, &owner("user-a"), "Carla").await;

    clients.initialize(owner("user-a")).await;

    let names = clients
        .snapshot()
        .into_iter()
        .map(|client| client.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Carla".to_string(), "Ana".to_string()]);
    assert!(clients
        .snapshot()
        .iter()
        .all(|client| client.owner_id == owner("user-a")));
}

#[tokio::test]
async fn re_initialize_with_same_owner_replaces_instead_of_appending() {
    let (store, clients) = new_controller();
    seed(&store, &owner("user-a"), "Ana").await;
    seed(&store, &owner("user-a"), "Bia").await;

    clients.initialize(owner("user-a")).await;
    let first = clients.snapshot();
    clients.initialize(owner("user-a")).await;

    assert_eq!(clients.snapshot(), first);
    assert_eq!(clients.len(), 2);
}

#[tokio::test]
async fn switching_owner_drops_previous_owners_rows() {
    let (store, clients) = new_controller();
    seed(&store, &owner("user-a"), "Ana").await;

    clients.initialize(owner("user-a")).await;
    assert_eq!(clients.len(), 1);

    clients.initialize(owner("user-b")).await;
    assert!(clients.is_empty());
    assert_eq!(clients.owner(), Some(owner("user-b")));
}

#[tokio::test]
async fn create_prepends_store_echo() {
    let (store, clients) = new_controller();
    seed(&store, &owner("user-a"), "Ana").await;
    clients.initialize(owner("user-a")).await;

    let created = clients.create(draft("Bia", "Globex")).await.unwrap();

    assert_eq!(clients.len(), 2);
    assert_eq!(clients.snapshot()[0].id, created.id);
    assert_eq!(created.owner_id, owner("user-a"));
    assert_eq!(created.status, ClientStatus::Prospect);
    assert_eq!(created.created_at, created.updated_at);
}

#[tokio::test]
async fn create_without_owner_is_not_authenticated() {
    let (_store, clients) = new_controller();

    let err = clients.create(draft("Ana", "Acme")).await.unwrap_err();

    assert_eq!(err, ControllerError::NotAuthenticated);
    assert_eq!(clients.last_error(), Some(ControllerError::NotAuthenticated));
    assert!(clients.is_empty());
}

#[tokio::test]
async fn create_rejects_invalid_draft_before_reaching_store() {
    let (store, clients) = new_controller();
    clients.initialize(owner("user-a")).await;

    let mut bad = draft("Ana", "Acme");
    bad.email = "not-an-email".to_string();
    let err = clients.create(bad).await.unwrap_err();

    assert_eq!(err, ControllerError::Validation(ValidationError::InvalidEmail));
    assert_eq!(clients.last_error(), Some(err));
    let persisted = EntityStore::<Client>::fetch_all(
        store.as_ref(),
        &owner("user-a"),
        FetchOrder::newest_first(),
    )
    .await
    .unwrap();
    assert!(persisted.is_empty());
}

#[tokio::test]
async fn update_replaces_row_in_place() {
    let (store, clients) = new_controller();
    for name in ["Ana", "Bia", "Carla"] {
        seed(&store, &owner("user-a"), name).await;
    }
    clients.initialize(owner("user-a")).await;
    let before = clients.snapshot();
    let target = before[1].clone();

    let updated = clients
        .update(
            target.id,
            ClientPatch {
                status: Some(ClientStatus::Client),
                notes: Some(Some("signed".to_string())),
                ..ClientPatch::default()
            },
        )
        .await
        .unwrap();

    let after = clients.snapshot();
    assert_eq!(after.len(), before.len());
    assert_eq!(after[1].id, target.id);
    assert_eq!(after[1].status, ClientStatus::Client);
    assert_eq!(after[1].notes.as_deref(), Some("signed"));
    assert_eq!(after[1].name, target.name);
    assert!(updated.updated_at > target.updated_at);
    assert_eq!(after[0], before[0]);
    assert_eq!(after[2], before[2]);
}

#[tokio::test]
async fn update_can_clear_nullable_field() {
    let (_store, clients) = new_controller();
    clients.initialize(owner("user-a")).await;
    let mut with_notes = draft("Ana", "Acme");
    with_notes.notes = Some("call back".to_string());
    let created = clients.create(with_notes).await.unwrap();

    let updated = clients
        .update(
            created.id,
            ClientPatch {
                notes: Some(None),
                ..ClientPatch::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.notes, None);
    assert_eq!(clients.get(created.id).unwrap().notes, None);
}

#[tokio::test]
async fn update_of_foreign_row_is_not_found_and_leaves_cache() {
    let (store, clients) = new_controller();
    let foreign = EntityStore::<Client>::insert(
        store.as_ref(),
        &owner("user-b"),
        &draft("Bruno", "Initech"),
    )
    .await
    .unwrap();
    seed(&store, &owner("user-a"), "Ana").await;
    clients.initialize(owner("user-a")).await;
    let before = clients.snapshot();

    let err = clients
        .update(
            foreign.id,
            ClientPatch {
                name: Some("Hijacked".to_string()),
                ..ClientPatch::default()
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err, ControllerError::NotFound(foreign.id));
    assert_eq!(clients.snapshot(), before);
    assert_eq!(clients.last_error(), Some(err));
}

#[tokio::test]
async fn remove_drops_exactly_one_and_second_remove_is_not_found() {
    let (store, clients) = new_controller();
    seed(&store, &owner("user-a"), "Ana").await;
    seed(&store, &owner("user-a"), "Bia").await;
    clients.initialize(owner("user-a")).await;
    let target = clients.snapshot()[0].id;

    clients.remove(target).await.unwrap();
    assert_eq!(clients.len(), 1);
    assert!(clients.get(target).is_none());

    let err = clients.remove(target).await.unwrap_err();
    assert_eq!(err, ControllerError::NotFound(target));
    assert_eq!(clients.len(), 1);
}

#[tokio::test]
async fn reset_clears_owner_and_cache() {
    let (store, clients) = new_controller();
    seed(&store, &owner("user-a"), "Ana").await;
    clients.initialize(owner("user-a")).await;

    clients.reset();

    assert_eq!(clients.status(), ControllerStatus::Uninitialized);
    assert_eq!(clients.owner(), None);
    assert!(clients.is_empty());
    assert_eq!(
        clients.create(draft("Bia", "Acme")).await.unwrap_err(),
        ControllerError::NotAuthenticated
    );
}

#[tokio::test]
async fn refetch_picks_up_rows_written_elsewhere() {
    let (store, clients) = new_controller();
    clients.initialize(owner("user-a")).await;
    seed(&store, &owner("user-a"), "Ana").await;
    assert!(clients.is_empty());

    clients.refetch().await;
    assert_eq!(clients.len(), 1);
}

#[tokio::test]
async fn refetch_without_owner_records_not_authenticated() {
    let (_store, clients) = new_controller();
    clients.refetch().await;
    assert_eq!(clients.last_error(), Some(ControllerError::NotAuthenticated));
}
