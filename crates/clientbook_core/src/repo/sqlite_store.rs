//! SQLite implementation of the owner-scoped store contract.
//!
//! # Responsibility
//! - Map the four entity kinds onto their tables.
//! - Assign ids and timestamps on insert, bump `updated_at` on update.
//! - Keep SQL details inside the store boundary.
//!
//! # Invariants
//! - Every statement filters by `user_id`.
//! - Write timestamps are strictly increasing per store instance.
//! - Read paths reject invalid persisted values instead of masking them.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::model::client::{Client, ClientStatus};
use crate::model::common::{
    now_epoch_ms, EntityId, FetchOrder, NullsPosition, OwnerId, SortDirection,
};
use crate::model::interaction::{Interaction, InteractionType};
use crate::model::opportunity::{Opportunity, OpportunityStage};
use crate::model::task::{Task, TaskPriority, TaskStatus, TaskType};
use crate::model::Entity;
use crate::repo::{EntityStore, RepoError, RepoResult, TextFilter};
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Column mapping for one entity kind.
pub trait SqlRow: Entity {
    /// Selected columns, in table order.
    const COLUMNS: &'static [&'static str];

    /// Caller-supplied insert columns; id, owner and timestamps are added by the store.
    fn draft_columns(draft: &Self::Draft, stamp_ms: i64) -> Vec<(&'static str, Value)>;
    /// Columns touched by a patch; absent fields are omitted.
    fn patch_columns(patch: &Self::Patch) -> Vec<(&'static str, Value)>;
    fn from_row(row: &Row<'_>) -> RepoResult<Self>;
}

/// SQLite-backed store shared by all four controllers.
pub struct SqliteStore {
    state: Mutex<StoreState>,
}

struct StoreState {
    conn: Connection,
    last_stamp_ms: i64,
}

impl StoreState {
    fn next_stamp(&mut self) -> i64 {
        self.last_stamp_ms = now_epoch_ms().max(self.last_stamp_ms + 1);
        self.last_stamp_ms
    }
}

impl SqliteStore {
    /// Wraps a connection obtained from [`open_db`] or [`open_db_in_memory`].
    pub fn new(conn: Connection) -> Self {
        Self {
            state: Mutex::new(StoreState {
                conn,
                last_stamp_ms: 0,
            }),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<E: SqlRow> EntityStore<E> for SqliteStore {
    async fn fetch_all(&self, owner: &OwnerId, order: FetchOrder) -> RepoResult<Vec<E>> {
        let sql = format!(
            "{} WHERE user_id = ?1{}",
            select_sql::<E>(),
            order_clause::<E>(order)?
        );
        let state = self.lock();
        query_rows(&state.conn, &sql, vec![owner_value(owner)])
    }

    async fn fetch_filtered(
        &self,
        owner: &OwnerId,
        filter: &TextFilter,
        order: FetchOrder,
    ) -> RepoResult<Vec<E>> {
        let mut sql = format!("{} WHERE user_id = ?1", select_sql::<E>());
        let mut values = vec![owner_value(owner)];

        if !filter.is_empty() {
            let pattern = format!("%{}%", escape_like(&filter.needle.trim().to_lowercase()));
            let mut clauses = Vec::with_capacity(filter.fields.len());
            for field in filter.fields {
                ensure_column::<E>(field)?;
                values.push(Value::Text(pattern.clone()));
                clauses.push(format!("unicode_lower({field}) LIKE ?{} ESCAPE '\\'", values.len()));
            }
            sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
        }

        sql.push_str(&order_clause::<E>(order)?);
        let state = self.lock();
        query_rows(&state.conn, &sql, values)
    }

    async fn insert(&self, owner: &OwnerId, draft: &E::Draft) -> RepoResult<E> {
        let mut state = self.lock();
        let stamp = state.next_stamp();
        let id = Uuid::new_v4();

        let mut columns = vec![("id", id_value(id)), ("user_id", owner_value(owner))];
        columns.extend(E::draft_columns(draft, stamp));
        columns.push(("created_at", Value::Integer(stamp)));
        columns.push(("updated_at", Value::Integer(stamp)));

        let names = columns
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|slot| format!("?{slot}"))
            .collect::<Vec<_>>()
            .join(", ");
        state.conn.execute(
            &format!("INSERT INTO {} ({names}) VALUES ({placeholders});", E::TABLE),
            params_from_iter(columns.into_iter().map(|(_, value)| value)),
        )?;

        fetch_one::<E>(&state.conn, id, owner)?.ok_or_else(|| {
            RepoError::InvalidData(format!("inserted row {id} missing in {}", E::TABLE))
        })
    }

    async fn update(&self, id: EntityId, owner: &OwnerId, patch: &E::Patch) -> RepoResult<E> {
        let mut state = self.lock();
        let stamp = state.next_stamp();

        let mut columns = E::patch_columns(patch);
        columns.push(("updated_at", Value::Integer(stamp)));
        let assignments = columns
            .iter()
            .enumerate()
            .map(|(index, (name, _))| format!("{name} = ?{}", index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let id_slot = columns.len() + 1;
        let owner_slot = columns.len() + 2;

        let mut values = columns
            .into_iter()
            .map(|(_, value)| value)
            .collect::<Vec<_>>();
        values.push(id_value(id));
        values.push(owner_value(owner));

        let changed = state.conn.execute(
            &format!(
                "UPDATE {} SET {assignments} WHERE id = ?{id_slot} AND user_id = ?{owner_slot};",
                E::TABLE
            ),
            params_from_iter(values),
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        fetch_one::<E>(&state.conn, id, owner)?.ok_or(RepoError::NotFound(id))
    }

    async fn delete(&self, id: EntityId, owner: &OwnerId) -> RepoResult<()> {
        let state = self.lock();
        let changed = state.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1 AND user_id = ?2;", E::TABLE),
            params_from_iter([id_value(id), owner_value(owner)]),
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

fn select_sql<E: SqlRow>() -> String {
    format!("SELECT {} FROM {}", E::COLUMNS.join(", "), E::TABLE)
}

fn ensure_column<E: SqlRow>(field: &str) -> RepoResult<()> {
    if E::COLUMNS.iter().any(|column| *column == field) {
        Ok(())
    } else {
        Err(RepoError::InvalidData(format!(
            "unknown column `{field}` for {}",
            E::TABLE
        )))
    }
}

fn order_clause<E: SqlRow>(order: FetchOrder) -> RepoResult<String> {
    ensure_column::<E>(order.field)?;
    let direction = match order.direction {
        SortDirection::Ascending => "ASC",
        SortDirection::Descending => "DESC",
    };
    let nulls = match order.nulls {
        NullsPosition::First => "NULLS FIRST",
        NullsPosition::Last => "NULLS LAST",
    };
    Ok(format!(
        " ORDER BY {} {direction} {nulls}, id ASC",
        order.field
    ))
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn query_rows<E: SqlRow>(conn: &Connection, sql: &str, values: Vec<Value>) -> RepoResult<Vec<E>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(values))?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(E::from_row(row)?);
    }
    Ok(items)
}

fn fetch_one<E: SqlRow>(conn: &Connection, id: EntityId, owner: &OwnerId) -> RepoResult<Option<E>> {
    let sql = format!("{} WHERE id = ?1 AND user_id = ?2;", select_sql::<E>());
    let mut items = query_rows::<E>(conn, &sql, vec![id_value(id), owner_value(owner)])?;
    Ok(items.pop())
}

fn owner_value(owner: &OwnerId) -> Value {
    Value::Text(owner.as_str().to_string())
}

fn id_value(id: EntityId) -> Value {
    Value::Text(id.to_string())
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn opt_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, text)
}

fn opt_int(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

fn opt_id(value: Option<EntityId>) -> Value {
    value.map_or(Value::Null, id_value)
}

fn opt_real(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::Real)
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<EntityId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn get_id(row: &Row<'_>, column: &str) -> RepoResult<EntityId> {
    let value: String = row.get(column)?;
    parse_uuid(&value, column)
}

fn get_opt_id(row: &Row<'_>, column: &str) -> RepoResult<Option<EntityId>> {
    match row.get::<_, Option<String>>(column)? {
        Some(value) => Ok(Some(parse_uuid(&value, column)?)),
        None => Ok(None),
    }
}

fn get_owner(row: &Row<'_>) -> RepoResult<OwnerId> {
    let value: String = row.get("user_id")?;
    OwnerId::new(value).ok_or_else(|| RepoError::InvalidData("blank user_id".to_string()))
}

fn get_enum<T>(row: &Row<'_>, column: &str, parse: fn(&str) -> Option<T>) -> RepoResult<T> {
    let value: String = row.get(column)?;
    parse(&value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid value `{value}` in {column}")))
}

fn get_opt_narrow<T: TryFrom<i64>>(row: &Row<'_>, column: &str) -> RepoResult<Option<T>> {
    match row.get::<_, Option<i64>>(column)? {
        Some(value) => T::try_from(value)
            .map(Some)
            .map_err(|_| RepoError::InvalidData(format!("value {value} out of range in {column}"))),
        None => Ok(None),
    }
}

impl SqlRow for Client {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "name",
        "email",
        "phone",
        "company",
        "position",
        "status",
        "notes",
        "last_contact",
        "created_at",
        "updated_at",
    ];

    fn draft_columns(draft: &Self::Draft, _stamp_ms: i64) -> Vec<(&'static str, Value)> {
        vec![
            ("name", text(&draft.name)),
            ("email", text(&draft.email)),
            ("phone", text(&draft.phone)),
            ("company", text(&draft.company)),
            ("position", opt_text(draft.position.as_deref())),
            ("status", text(draft.status.as_str())),
            ("notes", opt_text(draft.notes.as_deref())),
            ("last_contact", opt_int(draft.last_contact)),
        ]
    }

    fn patch_columns(patch: &Self::Patch) -> Vec<(&'static str, Value)> {
        let mut columns = Vec::new();
        if let Some(name) = patch.name.as_deref() {
            columns.push(("name", text(name)));
        }
        if let Some(email) = patch.email.as_deref() {
            columns.push(("email", text(email)));
        }
        if let Some(phone) = patch.phone.as_deref() {
            columns.push(("phone", text(phone)));
        }
        if let Some(company) = patch.company.as_deref() {
            columns.push(("company", text(company)));
        }
        if let Some(position) = &patch.position {
            columns.push(("position", opt_text(position.as_deref())));
        }
        if let Some(status) = patch.status {
            columns.push(("status", text(status.as_str())));
        }
        if let Some(notes) = &patch.notes {
            columns.push(("notes", opt_text(notes.as_deref())));
        }
        if let Some(last_contact) = patch.last_contact {
            columns.push(("last_contact", opt_int(last_contact)));
        }
        columns
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: get_id(row, "id")?,
            owner_id: get_owner(row)?,
            name: row.get("name")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            company: row.get("company")?,
            position: row.get("position")?,
            status: get_enum(row, "status", ClientStatus::from_db_value)?,
            notes: row.get("notes")?,
            last_contact: row.get("last_contact")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

impl SqlRow for Opportunity {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "client_id",
        "title",
        "description",
        "value",
        "stage",
        "probability",
        "expected_close_date",
        "actual_close_date",
        "created_at",
        "updated_at",
    ];

    fn draft_columns(draft: &Self::Draft, _stamp_ms: i64) -> Vec<(&'static str, Value)> {
        vec![
            ("client_id", id_value(draft.client_id)),
            ("title", text(&draft.title)),
            ("description", opt_text(draft.description.as_deref())),
            ("value", opt_real(draft.value)),
            ("stage", text(draft.stage.as_str())),
            ("probability", opt_int(draft.probability.map(i64::from))),
            ("expected_close_date", opt_int(draft.expected_close_date)),
            ("actual_close_date", opt_int(draft.actual_close_date)),
        ]
    }

    fn patch_columns(patch: &Self::Patch) -> Vec<(&'static str, Value)> {
        let mut columns = Vec::new();
        if let Some(client_id) = patch.client_id {
            columns.push(("client_id", id_value(client_id)));
        }
        if let Some(title) = patch.title.as_deref() {
            columns.push(("title", text(title)));
        }
        if let Some(description) = &patch.description {
            columns.push(("description", opt_text(description.as_deref())));
        }
        if let Some(value) = patch.value {
            columns.push(("value", opt_real(value)));
        }
        if let Some(stage) = patch.stage {
            columns.push(("stage", text(stage.as_str())));
        }
        if let Some(probability) = patch.probability {
            columns.push(("probability", opt_int(probability.map(i64::from))));
        }
        if let Some(date) = patch.expected_close_date {
            columns.push(("expected_close_date", opt_int(date)));
        }
        if let Some(date) = patch.actual_close_date {
            columns.push(("actual_close_date", opt_int(date)));
        }
        columns
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: get_id(row, "id")?,
            owner_id: get_owner(row)?,
            client_id: get_id(row, "client_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            value: row.get("value")?,
            stage: get_enum(row, "stage", OpportunityStage::from_db_value)?,
            probability: get_opt_narrow(row, "probability")?,
            expected_close_date: row.get("expected_close_date")?,
            actual_close_date: row.get("actual_close_date")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

impl SqlRow for Task {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "client_id",
        "opportunity_id",
        "title",
        "description",
        "type",
        "priority",
        "status",
        "due_date",
        "completed_at",
        "created_at",
        "updated_at",
    ];

    fn draft_columns(draft: &Self::Draft, _stamp_ms: i64) -> Vec<(&'static str, Value)> {
        vec![
            ("client_id", opt_id(draft.client_id)),
            ("opportunity_id", opt_id(draft.opportunity_id)),
            ("title", text(&draft.title)),
            ("description", opt_text(draft.description.as_deref())),
            ("type", text(draft.kind.as_str())),
            ("priority", text(draft.priority.as_str())),
            ("status", text(draft.status.as_str())),
            ("due_date", opt_int(draft.due_date)),
            ("completed_at", opt_int(draft.completed_at)),
        ]
    }

    fn patch_columns(patch: &Self::Patch) -> Vec<(&'static str, Value)> {
        let mut columns = Vec::new();
        if let Some(client_id) = patch.client_id {
            columns.push(("client_id", opt_id(client_id)));
        }
        if let Some(opportunity_id) = patch.opportunity_id {
            columns.push(("opportunity_id", opt_id(opportunity_id)));
        }
        if let Some(title) = patch.title.as_deref() {
            columns.push(("title", text(title)));
        }
        if let Some(description) = &patch.description {
            columns.push(("description", opt_text(description.as_deref())));
        }
        if let Some(kind) = patch.kind {
            columns.push(("type", text(kind.as_str())));
        }
        if let Some(priority) = patch.priority {
            columns.push(("priority", text(priority.as_str())));
        }
        if let Some(status) = patch.status {
            columns.push(("status", text(status.as_str())));
        }
        if let Some(due_date) = patch.due_date {
            columns.push(("due_date", opt_int(due_date)));
        }
        if let Some(completed_at) = patch.completed_at {
            columns.push(("completed_at", opt_int(completed_at)));
        }
        columns
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: get_id(row, "id")?,
            owner_id: get_owner(row)?,
            client_id: get_opt_id(row, "client_id")?,
            opportunity_id: get_opt_id(row, "opportunity_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            kind: get_enum(row, "type", TaskType::from_db_value)?,
            priority: get_enum(row, "priority", TaskPriority::from_db_value)?,
            status: get_enum(row, "status", TaskStatus::from_db_value)?,
            due_date: row.get("due_date")?,
            completed_at: row.get("completed_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

impl SqlRow for Interaction {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "client_id",
        "opportunity_id",
        "type",
        "subject",
        "description",
        "occurred_at",
        "duration_minutes",
        "outcome",
        "created_at",
        "updated_at",
    ];

    fn draft_columns(draft: &Self::Draft, stamp_ms: i64) -> Vec<(&'static str, Value)> {
        vec![
            ("client_id", opt_id(draft.client_id)),
            ("opportunity_id", opt_id(draft.opportunity_id)),
            ("type", text(draft.kind.as_str())),
            ("subject", text(&draft.subject)),
            ("description", opt_text(draft.description.as_deref())),
            ("occurred_at", Value::Integer(draft.occurred_at.unwrap_or(stamp_ms))),
            (
                "duration_minutes",
                opt_int(draft.duration_minutes.map(i64::from)),
            ),
            ("outcome", opt_text(draft.outcome.as_deref())),
        ]
    }

    fn patch_columns(patch: &Self::Patch) -> Vec<(&'static str, Value)> {
        let mut columns = Vec::new();
        if let Some(client_id) = patch.client_id {
            columns.push(("client_id", opt_id(client_id)));
        }
        if let Some(opportunity_id) = patch.opportunity_id {
            columns.push(("opportunity_id", opt_id(opportunity_id)));
        }
        if let Some(kind) = patch.kind {
            columns.push(("type", text(kind.as_str())));
        }
        if let Some(subject) = patch.subject.as_deref() {
            columns.push(("subject", text(subject)));
        }
        if let Some(description) = &patch.description {
            columns.push(("description", opt_text(description.as_deref())));
        }
        if let Some(occurred_at) = patch.occurred_at {
            columns.push(("occurred_at", Value::Integer(occurred_at)));
        }
        if let Some(duration) = patch.duration_minutes {
            columns.push(("duration_minutes", opt_int(duration.map(i64::from))));
        }
        if let Some(outcome) = &patch.outcome {
            columns.push(("outcome", opt_text(outcome.as_deref())));
        }
        columns
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: get_id(row, "id")?,
            owner_id: get_owner(row)?,
            client_id: get_opt_id(row, "client_id")?,
            opportunity_id: get_opt_id(row, "opportunity_id")?,
            kind: get_enum(row, "type", InteractionType::from_db_value)?,
            subject: row.get("subject")?,
            description: row.get("description")?,
            occurred_at: row.get("occurred_at")?,
            duration_minutes: get_opt_narrow(row, "duration_minutes")?,
            outcome: row.get("outcome")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}
