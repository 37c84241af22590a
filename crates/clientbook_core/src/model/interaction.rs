//! Logged interaction domain model.
//!
//! # Responsibility
//! - Define the interaction record, draft and patch.
//!
//! # Invariants
//! - `occurred_at` is always set on persisted rows; the store fills an absent one with `created_at`.
//! - `duration_minutes` is non-negative by construction.

use crate::model::common::{
    double_option, require_text, EntityId, FetchOrder, OwnerId, Validate, ValidationError,
};
use crate::model::Entity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    Call,
    Email,
    Meeting,
    Note,
    Demo,
    Proposal,
}

impl InteractionType {
    pub const ALL: [Self; 6] = [
        Self::Call,
        Self::Email,
        Self::Meeting,
        Self::Note,
        Self::Demo,
        Self::Proposal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Email => "email",
            Self::Meeting => "meeting",
            Self::Note => "note",
            Self::Demo => "demo",
            Self::Proposal => "proposal",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: EntityId,
    #[serde(rename = "user_id")]
    pub owner_id: OwnerId,
    pub client_id: Option<EntityId>,
    pub opportunity_id: Option<EntityId>,
    #[serde(rename = "type")]
    pub kind: InteractionType,
    pub subject: String,
    pub description: Option<String>,
    pub occurred_at: i64,
    pub duration_minutes: Option<u32>,
    pub outcome: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InteractionDraft {
    #[serde(rename = "type")]
    pub kind: InteractionType,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Falls back to the row's `created_at` when absent.
    #[serde(default)]
    pub occurred_at: Option<i64>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub client_id: Option<EntityId>,
    #[serde(default)]
    pub opportunity_id: Option<EntityId>,
}

impl InteractionDraft {
    pub fn new(kind: InteractionType, subject: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            description: None,
            occurred_at: None,
            duration_minutes: None,
            outcome: None,
            client_id: None,
            opportunity_id: None,
        }
    }
}

impl Validate for InteractionDraft {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("subject", &self.subject)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InteractionPatch {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<InteractionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<i64>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_minutes: Option<Option<u32>>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub outcome: Option<Option<String>>,
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

impl Validate for InteractionPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(subject) = self.subject.as_deref() {
            require_text("subject", subject)?;
        }
        Ok(())
    }
}

impl Entity for Interaction {
    type Draft = InteractionDraft;
    type Patch = InteractionPatch;

    const TABLE: &'static str = "interactions";
    const DEFAULT_ORDER: FetchOrder = FetchOrder::newest_first();

    fn id(&self) -> EntityId {
        self.id
    }

    fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }
}

#[cfg(test)]
mod tests {
    use super::{InteractionDraft, InteractionPatch, InteractionType};

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let patch: InteractionPatch =
            serde_json::from_str(r#"{"outcome": null, "type": "meeting"}"#).unwrap();
        assert_eq!(patch.outcome, Some(None));
        assert_eq!(patch.kind, Some(InteractionType::Meeting));
        assert_eq!(patch.duration_minutes, None);
    }

    #[test]
    fn draft_rejects_store_assigned_fields() {
        let result = serde_json::from_str::<InteractionDraft>(
            r#"{"type": "call", "subject": "intro", "user_id": "someone"}"#,
        );
        assert!(result.is_err());

        let draft: InteractionDraft =
            serde_json::from_str(r#"{"type": "call", "subject": "intro"}"#).unwrap();
        assert_eq!(draft.occurred_at, None);
    }

    #[test]
    fn patch_rejects_unknown_fields() {
        let result = serde_json::from_str::<InteractionPatch>(r#"{"user_id": "someone"}"#);
        assert!(result.is_err());
    }
}
