//! Sales opportunity domain model.
//!
//! # Responsibility
//! - Define the opportunity record, draft and patch.
//!
//! # Invariants
//! - Every opportunity references exactly one client.
//! - `value` is finite and non-negative when present.
//! - `probability` stays within 0..=100 when present.

use crate::model::common::{
    double_option, require_amount, require_range, require_text, EntityId, FetchOrder, OwnerId,
    Validate, ValidationError,
};
use crate::model::Entity;
use serde::{Deserialize, Serialize};

/// Pipeline stage of an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityStage {
    Prospect,
    Qualified,
    Proposal,
    Negotiation,
    Won,
    Lost,
}

impl OpportunityStage {
    /// Board order, left to right.
    pub const ALL: [Self; 6] = [
        Self::Prospect,
        Self::Qualified,
        Self::Proposal,
        Self::Negotiation,
        Self::Won,
        Self::Lost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prospect => "prospect",
            Self::Qualified => "qualified",
            Self::Proposal => "proposal",
            Self::Negotiation => "negotiation",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.as_str() == value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: EntityId,
    #[serde(rename = "user_id")]
    pub owner_id: OwnerId,
    pub client_id: EntityId,
    pub title: String,
    pub description: Option<String>,
    pub value: Option<f64>,
    pub stage: OpportunityStage,
    /// Win probability percentage.
    pub probability: Option<u8>,
    pub expected_close_date: Option<i64>,
    pub actual_close_date: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpportunityDraft {
    pub client_id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default = "default_stage")]
    pub stage: OpportunityStage,
    #[serde(default)]
    pub probability: Option<u8>,
    #[serde(default)]
    pub expected_close_date: Option<i64>,
    #[serde(default)]
    pub actual_close_date: Option<i64>,
}

fn default_stage() -> OpportunityStage {
    OpportunityStage::Prospect
}

impl OpportunityDraft {
    pub fn new(client_id: EntityId, title: impl Into<String>) -> Self {
        Self {
            client_id,
            title: title.into(),
            description: None,
            value: None,
            stage: default_stage(),
            probability: None,
            expected_close_date: None,
            actual_close_date: None,
        }
    }
}

impl Validate for OpportunityDraft {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        if let Some(value) = self.value {
            require_amount("value", value)?;
        }
        if let Some(probability) = self.probability {
            require_range("probability", i64::from(probability), 0, 100)?;
        }
        Ok(())
    }
}

/// Partial update for an opportunity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpportunityPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<OpportunityStage>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub probability: Option<Option<u8>>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub expected_close_date: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub actual_close_date: Option<Option<i64>>,
}

impl Validate for OpportunityPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = self.title.as_deref() {
            require_text("title", title)?;
        }
        if let Some(Some(value)) = self.value {
            require_amount("value", value)?;
        }
        if let Some(Some(probability)) = self.probability {
            require_range("probability", i64::from(probability), 0, 100)?;
        }
        Ok(())
    }
}

impl Entity for Opportunity {
    type Draft = OpportunityDraft;
    type Patch = OpportunityPatch;

    const TABLE: &'static str = "opportunities";
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
    use super::{OpportunityDraft, OpportunityPatch, OpportunityStage};
    use crate::model::common::{Validate, ValidationError};
    use uuid::Uuid;

    #[test]
    fn draft_rejects_negative_value_and_wild_probability() {
        let mut draft = OpportunityDraft::new(Uuid::new_v4(), "Renewal");
        draft.value = Some(-5.0);
        assert_eq!(
            draft.validate(),
            Err(ValidationError::InvalidAmount { field: "value" })
        );

        draft.value = Some(10.0);
        draft.probability = Some(101);
        assert!(matches!(
            draft.validate(),
            Err(ValidationError::OutOfRange {
                field: "probability",
                ..
            })
        ));
    }

    #[test]
    fn clearing_value_is_a_valid_patch() {
        let patch = OpportunityPatch {
            value: Some(None),
            ..OpportunityPatch::default()
        };
        assert!(patch.validate().is_ok());
    }

    #[test]
    fn stage_parser_covers_every_variant() {
        for stage in OpportunityStage::ALL {
            assert_eq!(OpportunityStage::from_db_value(stage.as_str()), Some(stage));
        }
    }
}
