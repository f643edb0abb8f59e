use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::modules::appointment::model::AppointmentStatus;
use crate::modules::session::model::CredentialStatus;

/// Opaque identifier of the remote entity being watched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn appointment(appointment_id: &str) -> Self {
        Self(format!("appointment/{appointment_id}"))
    }

    /// The session credential is a singleton resource.
    pub fn session_token() -> Self {
        Self("session/token".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bare appointment id, when this resource is an appointment watch.
    pub fn appointment_key(&self) -> Option<&str> {
        self.0.strip_prefix("appointment/")
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed status union across the two watched resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum ResourceStatus {
    Appointment(AppointmentStatus),
    Credential(CredentialStatus),
}

impl ResourceStatus {
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Appointment(status) => status.is_terminal(),
            Self::Credential(status) => status.is_terminal(),
        }
    }

    /// Cross-kind transitions are always illegal.
    pub fn can_transition_to(&self, next: &ResourceStatus) -> bool {
        match (self, next) {
            (Self::Appointment(from), Self::Appointment(to)) => from.can_transition_to(*to),
            (Self::Credential(from), Self::Credential(to)) => from.can_transition_to(*to),
            _ => false,
        }
    }
}

/// Locally cached view of one server-side mutable entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollableResource {
    pub id: ResourceId,
    pub status: ResourceStatus,
    /// Set on every successful reconciliation; a `not_found` lookup does not
    /// count as one.
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Opaque server-provided data (doctor notes, rejection reason, token
    /// pair).
    pub payload: Value,
}

impl PollableResource {
    pub fn new(id: ResourceId, status: ResourceStatus) -> Self {
        Self {
            id,
            status,
            last_checked_at: None,
            payload: Value::Null,
        }
    }
}
