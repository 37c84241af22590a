use clientbook_core::{
    Client, ClientDraft, EntityStore, FetchOrder, Interaction, InteractionDraft, InteractionType,
    NullsPosition, Opportunity, OpportunityDraft, OwnerId, RepoError, SortDirection, SqliteStore,
    Task, TaskDraft, TaskPatch, TaskType, TextFilter,
};

fn owner(id: &str) -> OwnerId {
    OwnerId::new(id).unwrap()
}

async fn insert_client(
    store: &SqliteStore,
    owner: &OwnerId,
    name: &str,
    company: &str,
) -> Client {
    let draft = ClientDraft::new(name, format!("{name}@example.com"), "5550001111", company);
    EntityStore::<Client>::insert(store, owner, &draft).await.unwrap()
}

async fn search(store: &SqliteStore, owner: &OwnerId, needle: &str) -> Vec<Client> {
    let filter = TextFilter::any_of(&["name", "email", "company"], needle);
    EntityStore::<Client>::fetch_filtered(store, owner, &filter, FetchOrder::newest_first())
        .await
        .unwrap()
}

#[tokio::test]
async fn insert_assigns_identity_owner_and_timestamps() {
    let store = SqliteStore::open_in_memory().unwrap();
    let first = insert_client(&store, &owner("user-a"), "ana", "Acme").await;
    let second = insert_client(&store, &owner("user-a"), "bia", "Acme").await;

    assert_ne!(first.id, second.id);
    assert_eq!(first.owner_id, owner("user-a"));
    assert_eq!(first.created_at, first.updated_at);
    assert!(second.created_at > first.created_at);
}

#[tokio::test]
async fn update_and_delete_are_scoped_by_owner() {
    let store = SqliteStore::open_in_memory().unwrap();
    let task = EntityStore::<Task>::insert(
        &store,
        &owner("user-a"),
        &TaskDraft::new("call back", TaskType::Call),
    )
    .await
    .unwrap();

    let patch = TaskPatch {
        title: Some("stolen".to_string()),
        ..TaskPatch::default()
    };
    let err = EntityStore::<Task>::update(&store, task.id, &owner("user-b"), &patch)
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == task.id));

    let err = EntityStore::<Task>::delete(&store, task.id, &owner("user-b"))
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));

    EntityStore::<Task>::delete(&store, task.id, &owner("user-a"))
        .await
        .unwrap();
    let remaining =
        EntityStore::<Task>::fetch_all(&store, &owner("user-a"), FetchOrder::newest_first())
            .await
            .unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn fetch_all_honors_direction_and_nulls_placement() {
    let store = SqliteStore::open_in_memory().unwrap();
    let owner = owner("user-a");
    for (title, due) in [("late", Some(300)), ("undated", None), ("early", Some(100))] {
        let mut draft = TaskDraft::new(title, TaskType::Other);
        draft.due_date = due;
        EntityStore::<Task>::insert(&store, &owner, &draft)
            .await
            .unwrap();
    }

    let titles = |tasks: Vec<Task>| tasks.into_iter().map(|task| task.title).collect::<Vec<_>>();
    let nulls_last = FetchOrder {
        field: "due_date",
        direction: SortDirection::Ascending,
        nulls: NullsPosition::Last,
    };
    let nulls_first_desc = FetchOrder {
        field: "due_date",
        direction: SortDirection::Descending,
        nulls: NullsPosition::First,
    };

    let ascending = EntityStore::<Task>::fetch_all(&store, &owner, nulls_last)
        .await
        .unwrap();
    assert_eq!(titles(ascending), vec!["early", "late", "undated"]);

    let descending = EntityStore::<Task>::fetch_all(&store, &owner, nulls_first_desc)
        .await
        .unwrap();
    assert_eq!(titles(descending), vec!["undated", "late", "early"]);
}

#[tokio::test]
async fn fetch_all_rejects_unknown_order_column() {
    let store = SqliteStore::open_in_memory().unwrap();
    let order = FetchOrder {
        field: "name; DROP TABLE clients",
        direction: SortDirection::Ascending,
        nulls: NullsPosition::Last,
    };

    let err = EntityStore::<Client>::fetch_all(&store, &owner("user-a"), order)
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[tokio::test]
async fn filtered_fetch_matches_any_field_case_insensitively() {
    let store = SqliteStore::open_in_memory().unwrap();
    let owner_a = owner("user-a");
    insert_client(&store, &owner_a, "ana", "Acme").await;
    insert_client(&store, &owner_a, "bia", "Globex").await;
    insert_client(&store, &owner_a, "caio", "Initech").await;
    insert_client(&store, &owner("user-b"), "acme-fan", "Other").await;

    let matched = search(&store, &owner_a, "ACME").await;
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].name, "ana");

    let by_email = search(&store, &owner_a, "bia@").await;
    assert_eq!(by_email.len(), 1);

    assert_eq!(search(&store, &owner_a, "").await.len(), 3);
}

#[tokio::test]
async fn filtered_fetch_folds_accented_capitals() {
    let store = SqliteStore::open_in_memory().unwrap();
    let owner = owner("user-a");
    insert_client(&store, &owner, "Émile Ángel", "Óptica").await;
    insert_client(&store, &owner, "emilio", "Acme").await;

    let by_name = search(&store, &owner, "émile").await;
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].company, "Óptica");

    let by_company = search(&store, &owner, "ÓPTICA").await;
    assert_eq!(by_company.len(), 1);
    assert_eq!(by_company[0].name, "Émile Ángel");
}

#[tokio::test]
async fn filtered_fetch_treats_wildcards_literally() {
    let store = SqliteStore::open_in_memory().unwrap();
    let owner = owner("user-a");
    insert_client(&store, &owner, "percent", "100% Corp").await;
    insert_client(&store, &owner, "plain", "Hundred Corp").await;
    insert_client(&store, &owner, "under", "snake_case Ltd").await;

    let percent = search(&store, &owner, "%").await;
    assert_eq!(percent.len(), 1);
    assert_eq!(percent[0].name, "percent");

    let underscore = search(&store, &owner, "_").await;
    assert_eq!(underscore.len(), 1);
    assert_eq!(underscore[0].name, "under");
}

#[tokio::test]
async fn deleting_client_cascades_opportunities_and_detaches_interactions() {
    let store = SqliteStore::open_in_memory().unwrap();
    let owner = owner("user-a");
    let client = insert_client(&store, &owner, "ana", "Acme").await;

    EntityStore::<Opportunity>::insert(&store, &owner, &OpportunityDraft::new(client.id, "deal"))
        .await
        .unwrap();
    let mut draft = InteractionDraft::new(InteractionType::Email, "intro");
    draft.client_id = Some(client.id);
    let interaction = EntityStore::<Interaction>::insert(&store, &owner, &draft)
        .await
        .unwrap();
    assert_eq!(interaction.client_id, Some(client.id));
    assert_eq!(interaction.occurred_at, interaction.created_at);

    EntityStore::<Client>::delete(&store, client.id, &owner)
        .await
        .unwrap();

    let opportunities =
        EntityStore::<Opportunity>::fetch_all(&store, &owner, FetchOrder::newest_first())
            .await
            .unwrap();
    assert!(opportunities.is_empty());

    let interactions =
        EntityStore::<Interaction>::fetch_all(&store, &owner, FetchOrder::newest_first())
            .await
            .unwrap();
    assert_eq!(interactions.len(), 1);
    assert_eq!(interactions[0].client_id, None);
}

#[tokio::test]
async fn opportunity_requires_existing_client() {
    let store = SqliteStore::open_in_memory().unwrap();
    let draft = OpportunityDraft::new(uuid::Uuid::new_v4(), "orphan");

    let err = EntityStore::<Opportunity>::insert(&store, &owner("user-a"), &draft)
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));
}
