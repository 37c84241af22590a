//! Task domain model.
//!
//! # Responsibility
//! - Define the task record, draft and patch.
//! - Stamp `completed_at` when a task is marked done without one.
//!
//! # Invariants
//! - Client and opportunity references are optional, unvalidated foreign keys.
//! - A write that sets `status = done` always carries a completion instant.
//! - A task already done keeps its recorded completion instant.

use crate::model::common::{
    double_option, require_text, EntityId, FetchOrder, NullsPosition, OwnerId, SortDirection,
    Validate, ValidationError,
};
use crate::model::Entity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Call,
    Email,
    Meeting,
    FollowUp,
    Demo,
    Other,
}

impl TaskType {
    pub const ALL: [Self; 6] = [
        Self::Call,
        Self::Email,
        Self::Meeting,
        Self::FollowUp,
        Self::Demo,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Email => "email",
            Self::Meeting => "meeting",
            Self::FollowUp => "follow_up",
            Self::Demo => "demo",
            Self::Other => "other",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|priority| priority.as_str() == value)
    }
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [Self; 4] = [Self::Pending, Self::InProgress, Self::Done, Self::Cancelled];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: EntityId,
    #[serde(rename = "user_id")]
    pub owner_id: OwnerId,
    pub client_id: Option<EntityId>,
    pub opportunity_id: Option<EntityId>,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: TaskType,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: Option<i64>,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// Returns whether the task is past due at `now_ms` and still open.
    ///
    /// Cancelled tasks count as open; only `done` clears the flag.
    pub fn is_overdue_at(&self, now_ms: i64) -> bool {
        matches!(self.due_date, Some(due) if due < now_ms) && self.status != TaskStatus::Done
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: TaskType,
    #[serde(default = "default_priority")]
    pub priority: TaskPriority,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
    #[serde(default)]
    pub due_date: Option<i64>,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub client_id: Option<EntityId>,
    #[serde(default)]
    pub opportunity_id: Option<EntityId>,
}

fn default_priority() -> TaskPriority {
    TaskPriority::Medium
}

fn default_status() -> TaskStatus {
    TaskStatus::Pending
}

impl TaskDraft {
    /// Creates a pending, medium-priority task draft.
    pub fn new(title: impl Into<String>, kind: TaskType) -> Self {
        Self {
            title: title.into(),
            description: None,
            kind,
            priority: default_priority(),
            status: default_status(),
            due_date: None,
            completed_at: None,
            client_id: None,
            opportunity_id: None,
        }
    }
}

impl Validate for TaskDraft {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TaskType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_id: Option<Option<EntityId>>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub opportunity_id: Option<Option<EntityId>>,
}

impl Validate for TaskPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = self.title.as_deref() {
            require_text("title", title)?;
        }
        Ok(())
    }
}

impl Entity for Task {
    type Draft = TaskDraft;
    type Patch = TaskPatch;

    const TABLE: &'static str = "tasks";
    const DEFAULT_ORDER: FetchOrder = FetchOrder {
        field: "due_date",
        direction: SortDirection::Ascending,
        nulls: NullsPosition::Last,
    };

    fn id(&self) -> EntityId {
        self.id
    }

    fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    fn prepare_draft(mut draft: TaskDraft, now_ms: i64) -> TaskDraft {
        if draft.status == TaskStatus::Done && draft.completed_at.is_none() {
            draft.completed_at = Some(now_ms);
        }
        draft
    }

    // An explicit `null` completion is treated like an absent one.
    fn prepare_patch(mut patch: TaskPatch, current: Option<&Task>, now_ms: i64) -> TaskPatch {
        if patch.status != Some(TaskStatus::Done) || matches!(patch.completed_at, Some(Some(_))) {
            return patch;
        }
        let recorded = current
            .filter(|task| task.status == TaskStatus::Done)
            .and_then(|task| task.completed_at);
        patch.completed_at = match recorded {
            Some(_) => None,
            None => Some(Some(now_ms)),
        };
        patch
    }
}
