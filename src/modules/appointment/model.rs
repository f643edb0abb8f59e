use serde::{Deserialize, Serialize};

/// Appointment approval status as reported by the portal backend.
///
/// Transitions are monotonic: a pending appointment may become approved or
/// rejected, and a terminal status never moves again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Terminal statuses need no further polling.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// A same-status update is a no-op, not a transition.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        *self == next || matches!((self, next), (Self::Pending, Self::Approved | Self::Rejected))
    }
}

/// Booking details carried alongside the status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub date: String,
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}
