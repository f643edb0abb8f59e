use serde::{Deserialize, Serialize};

use crate::modules::appointment::model::{AppointmentDetails, AppointmentStatus};

/// Response body of the appointment status lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentStatusReport {
    pub status: AppointmentStatus,
    #[serde(default)]
    pub appointment_details: Option<AppointmentDetails>,
    #[serde(default)]
    pub doctor_notes: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

/// Outcome of one status lookup. `NotFound` covers the race between request
/// creation and the first poll and is never terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum AppointmentLookup {
    Found(AppointmentStatusReport),
    NotFound,
}
