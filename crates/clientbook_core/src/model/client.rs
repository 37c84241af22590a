//! Client domain model.
//!
//! # Responsibility
//! - Define the client record, its create draft and its update patch.
//!
//! # Invariants
//! - `name`, `email`, `phone` and `company` are never blank.
//! - `status` defaults to `prospect` for new drafts.

use crate::model::common::{
    double_option, require_email, require_text, EntityId, FetchOrder, OwnerId, Validate,
    ValidationError,
};
use crate::model::Entity;
use serde::{Deserialize, Serialize};

/// Relationship state of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Prospect,
    Client,
    Inactive,
}

impl ClientStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prospect => "prospect",
            Self::Client => "client",
            Self::Inactive => "inactive",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "prospect" => Some(Self::Prospect),
            "client" => Some(Self::Client),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// Persisted client row as echoed back by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: EntityId,
    #[serde(rename = "user_id")]
    pub owner_id: OwnerId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub position: Option<String>,
    pub status: ClientStatus,
    pub notes: Option<String>,
    /// Epoch milliseconds of the last recorded contact.
    pub last_contact: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create input for a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientDraft {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default = "default_status")]
    pub status: ClientStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub last_contact: Option<i64>,
}

fn default_status() -> ClientStatus {
    ClientStatus::Prospect
}

impl ClientDraft {
    /// Creates a prospect draft with the required contact fields.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        company: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            company: company.into(),
            position: None,
            status: default_status(),
            notes: None,
            last_contact: None,
        }
    }
}

impl Validate for ClientDraft {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_email(&self.email)?;
        require_text("phone", &self.phone)?;
        require_text("company", &self.company)?;
        Ok(())
    }
}

/// Partial update for a client.
///
/// Nullable columns use `Option<Option<_>>`: `None` leaves the column alone,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub position: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ClientStatus>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_contact: Option<Option<i64>>,
}

impl Validate for ClientPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = self.name.as_deref() {
            require_text("name", name)?;
        }
        if let Some(email) = self.email.as_deref() {
            require_email(email)?;
        }
        if let Some(phone) = self.phone.as_deref() {
            require_text("phone", phone)?;
        }
        if let Some(company) = self.company.as_deref() {
            require_text("company", company)?;
        }
        Ok(())
    }
}

impl Entity for Client {
    type Draft = ClientDraft;
    type Patch = ClientPatch;

    const TABLE: &'static str = "clients";
    const DEFAULT_ORDER: FetchOrder = FetchOrder::newest_first();

    fn id(&self) -> EntityId {
        self.id
    }

    fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }
}
