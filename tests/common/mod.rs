use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use reqwest::StatusCode;

use telecare_sync::modules::appointment::model::{AppointmentDetails, AppointmentStatus};
use telecare_sync::modules::appointment::schema::{AppointmentLookup, AppointmentStatusReport};
use telecare_sync::modules::session::model::{CurrentUser, TokenPair, UserRole};
use telecare_sync::services::mirror::ScopedStore;
use telecare_sync::services::portal::{ApiError, PortalApi};
use telecare_sync::services::sync::engine::SyncEngine;
use telecare_sync::services::sync::retry::PollPolicy;

// Allow dead_code for utilities used by other test files
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum ScriptedStatus {
    Report(AppointmentStatusReport),
    NotFound,
    TransientError,
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum ScriptedRefresh {
    Pair(TokenPair),
    Invalid,
    TransientError,
}

/// Scripted portal backend. Each call consumes the next scripted response;
/// the final entry repeats once the script is exhausted. Tracks call and
/// concurrency counts so tests can assert the sequencing properties.
pub struct MockPortal {
    statuses: Mutex<VecDeque<ScriptedStatus>>,
    refreshes: Mutex<VecDeque<ScriptedRefresh>>,
    pub status_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    latency: Mutex<Duration>,
}

#[allow(dead_code)]
impl MockPortal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(VecDeque::new()),
            refreshes: Mutex::new(VecDeque::new()),
            status_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            latency: Mutex::new(Duration::ZERO),
        })
    }

    pub fn script_statuses(&self, script: impl IntoIterator<Item = ScriptedStatus>) {
        self.statuses.lock().unwrap().extend(script);
    }

    pub fn script_refreshes(&self, script: impl IntoIterator<Item = ScriptedRefresh>) {
        self.refreshes.lock().unwrap().extend(script);
    }

    /// Per-fetch latency, to widen the window in which overlapping requests
    /// would be observable.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    fn next_status(&self) -> ScriptedStatus {
        let mut script = self.statuses.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap_or(ScriptedStatus::NotFound)
        }
    }

    fn next_refresh(&self) -> ScriptedRefresh {
        let mut script = self.refreshes.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script
                .front()
                .cloned()
                .unwrap_or(ScriptedRefresh::TransientError)
        }
    }

    async fn enter(&self) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PortalApi for MockPortal {
    async fn check_appointment_status(
        &self,
        _appointment_id: &str,
    ) -> Result<AppointmentLookup, ApiError> {
        self.enter().await;
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.next_status();
        self.leave();
        match scripted {
            ScriptedStatus::Report(report) => Ok(AppointmentLookup::Found(report)),
            ScriptedStatus::NotFound => Ok(AppointmentLookup::NotFound),
            ScriptedStatus::TransientError => Err(ApiError::Api(StatusCode::INTERNAL_SERVER_ERROR)),
        }
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenPair, ApiError> {
        self.enter().await;
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.next_refresh();
        self.leave();
        match scripted {
            ScriptedRefresh::Pair(pair) => Ok(pair),
            ScriptedRefresh::Invalid => Err(ApiError::InvalidRefreshToken),
            ScriptedRefresh::TransientError => {
                Err(ApiError::Api(StatusCode::INTERNAL_SERVER_ERROR))
            }
        }
    }
}

/// Deterministic policy: canonical 15s cadence, no jitter.
#[allow(dead_code)]
pub fn test_policy() -> PollPolicy {
    PollPolicy {
        jitter_factor: 0.0,
        ..PollPolicy::default()
    }
}

#[allow(dead_code)]
pub fn test_engine(api: Arc<MockPortal>) -> SyncEngine {
    test_engine_with_mirror(api, Arc::new(ScopedStore::in_memory()))
}

#[allow(dead_code)]
pub fn test_engine_with_mirror(api: Arc<MockPortal>, mirror: Arc<ScopedStore>) -> SyncEngine {
    telecare_sync::build_engine(api, mirror, test_policy())
}

#[allow(dead_code)]
pub fn test_engine_with_policy(api: Arc<MockPortal>, policy: PollPolicy) -> SyncEngine {
    telecare_sync::build_engine(api, Arc::new(ScopedStore::in_memory()), policy)
}

/// A structurally valid JWT whose payload carries `exp`; the signature is
/// garbage, which is fine because the client never verifies it.
#[allow(dead_code)]
pub fn unsigned_token(ttl_secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let exp = Utc::now().timestamp() + ttl_secs;
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"u-1","exp":{exp}}}"#));
    format!("{header}.{payload}.sig")
}

#[allow(dead_code)]
pub fn token_pair(ttl_secs: i64) -> TokenPair {
    TokenPair {
        access_token: unsigned_token(ttl_secs),
        refresh_token: format!("refresh-{}", uuid::Uuid::new_v4()),
    }
}

#[allow(dead_code)]
pub fn test_user() -> CurrentUser {
    CurrentUser {
        id: "u-1".to_string(),
        email: "patient@example.com".to_string(),
        role: UserRole::Patient,
    }
}

#[allow(dead_code)]
pub fn pending_report() -> AppointmentStatusReport {
    AppointmentStatusReport {
        status: AppointmentStatus::Pending,
        appointment_details: None,
        doctor_notes: None,
        rejection_reason: None,
    }
}

#[allow(dead_code)]
pub fn approved_report(notes: &str) -> AppointmentStatusReport {
    AppointmentStatusReport {
        status: AppointmentStatus::Approved,
        appointment_details: Some(AppointmentDetails {
            id: None,
            date: "2026-03-14".to_string(),
            time: "10:30".to_string(),
            doctor_name: Some("Dr. Okafor".to_string()),
            department: Some("Cardiology".to_string()),
        }),
        doctor_notes: Some(notes.to_string()),
        rejection_reason: None,
    }
}

#[allow(dead_code)]
pub fn rejected_report(reason: &str) -> AppointmentStatusReport {
    AppointmentStatusReport {
        status: AppointmentStatus::Rejected,
        appointment_details: None,
        doctor_notes: None,
        rejection_reason: Some(reason.to_string()),
    }
}
