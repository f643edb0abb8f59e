use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::time::timeout;

use crate::modules::appointment::model::AppointmentStatus;
use crate::modules::appointment::schema::AppointmentLookup;
use crate::modules::resource::model::{PollableResource, ResourceId, ResourceStatus};
use crate::modules::session::model::{CredentialStatus, CurrentUser, StorageScope, TokenPair};
use crate::modules::session::token;
use crate::services::mirror::{
    ScopedStore, APPOINTMENT_DETAILS, APPOINTMENT_REQUESTED, APPOINTMENT_STATUS, AUTH_TOKEN,
    CURRENT_USER, REFRESH_TOKEN,
};
use crate::services::portal::PortalApi;
use crate::services::publisher::StatePublisher;
use crate::services::sync::retry::PollPolicy;
use crate::services::sync::timer::TimerController;
use crate::services::sync::types::{SyncError, TickFlow};

/// Ties the timer controller, the reconciliation fetches and the state
/// publisher together into the two watch operations the portal needs:
/// recurring appointment-status polls and the single-shot token refresh
/// chain. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct SyncEngine {
    api: Arc<dyn PortalApi>,
    mirror: Arc<ScopedStore>,
    publisher: Arc<StatePublisher>,
    timers: TimerController,
    policy: PollPolicy,
}

impl SyncEngine {
    pub fn new(
        api: Arc<dyn PortalApi>,
        mirror: Arc<ScopedStore>,
        publisher: Arc<StatePublisher>,
        timers: TimerController,
        policy: PollPolicy,
    ) -> Self {
        Self {
            api,
            mirror,
            publisher,
            timers,
            policy,
        }
    }

    pub fn publisher(&self) -> &Arc<StatePublisher> {
        &self.publisher
    }

    pub fn mirror(&self) -> &Arc<ScopedStore> {
        &self.mirror
    }

    pub fn timers(&self) -> &TimerController {
        &self.timers
    }

    /// Start watching an appointment the user just requested. Idempotent:
    /// a watch that is already live stays untouched.
    pub async fn watch_appointment(&self, appointment_id: &str) -> Result<(), SyncError> {
        let id = ResourceId::appointment(appointment_id);

        self.publisher
            .track(PollableResource::new(
                id.clone(),
                ResourceStatus::Appointment(AppointmentStatus::Pending),
            ))
            .await;

        if let Err(e) = self.mirror.set(APPOINTMENT_REQUESTED, "true") {
            tracing::warn!(error = %e, "mirror write failed");
        }
        // Seed the persisted details with the id so a reload can resume the
        // watch before the first successful poll.
        if self.mirror.get(APPOINTMENT_DETAILS).is_none() {
            let seeded = json!({ "id": appointment_id }).to_string();
            if let Err(e) = self.mirror.set(APPOINTMENT_DETAILS, &seeded) {
                tracing::warn!(error = %e, "mirror write failed");
            }
        }

        self.start_appointment_timer(id, appointment_id.to_string())
            .await;
        Ok(())
    }

    async fn start_appointment_timer(&self, id: ResourceId, appointment_id: String) {
        let engine = self.clone();
        self.timers
            .start(id, move || {
                let engine = engine.clone();
                let appointment_id = appointment_id.clone();
                async move { engine.reconcile_appointment(&appointment_id).await }
            })
            .await;
    }

    /// One reconciliation attempt for an appointment watch.
    pub async fn reconcile_appointment(&self, appointment_id: &str) -> Result<TickFlow, SyncError> {
        let id = ResourceId::appointment(appointment_id);

        let lookup = timeout(
            self.policy.fetch_timeout(),
            self.api.check_appointment_status(appointment_id),
        )
        .await
        .map_err(|_| SyncError::Timeout)?
        .map_err(SyncError::from)?;

        let report = match lookup {
            AppointmentLookup::NotFound => {
                // Race between request creation and the first poll. Retry
                // later without touching last_checked_at.
                tracing::debug!(resource = %id, "appointment not visible upstream yet");
                return Ok(TickFlow::Continue);
            }
            AppointmentLookup::Found(report) => report,
        };

        // Only carry the parts the server actually sent; an all-empty report
        // must not read as a payload change.
        let mut payload = serde_json::Map::new();
        if let Some(details) = &report.appointment_details {
            payload.insert(
                "appointmentDetails".to_string(),
                serde_json::to_value(details).unwrap_or(Value::Null),
            );
        }
        if let Some(notes) = &report.doctor_notes {
            payload.insert("doctorNotes".to_string(), Value::String(notes.clone()));
        }
        if let Some(reason) = &report.rejection_reason {
            payload.insert("rejectionReason".to_string(), Value::String(reason.clone()));
        }
        let payload = if payload.is_empty() {
            Value::Null
        } else {
            Value::Object(payload)
        };

        self.publisher
            .update(
                &id,
                ResourceStatus::Appointment(report.status),
                payload,
                Utc::now(),
            )
            .await?;

        if report.status.is_terminal() {
            tracing::info!(
                resource = %id,
                status = report.status.as_str(),
                "appointment reached terminal status"
            );
            Ok(TickFlow::Stop)
        } else {
            Ok(TickFlow::Continue)
        }
    }

    /// Resolve the storage scope from the remember-me flag and install a
    /// fresh session: credentials persisted into exactly one scope, the
    /// credential resource replaced, the refresh chain armed.
    pub async fn install_session(
        &self,
        tokens: TokenPair,
        user: CurrentUser,
        remember_me: bool,
    ) -> Result<(), SyncError> {
        let scope = if remember_me {
            StorageScope::Persistent
        } else {
            StorageScope::Session
        };
        self.mirror.set_active_scope(scope);

        let payload = json!({
            "accessToken": tokens.access_token,
            "refreshToken": tokens.refresh_token,
            "currentUser": user,
        });
        self.publisher
            .install(PollableResource {
                id: ResourceId::session_token(),
                status: ResourceStatus::Credential(CredentialStatus::Valid),
                last_checked_at: Some(Utc::now()),
                payload,
            })
            .await;

        self.schedule_token_refresh().await
    }

    /// Arm the single-shot refresh for the currently stored access token.
    pub async fn schedule_token_refresh(&self) -> Result<(), SyncError> {
        let access = self.mirror.get(AUTH_TOKEN).ok_or(SyncError::AuthExpired)?;
        let expiry = token::token_expiry(&access)?;
        let fire_at = token::refresh_at(expiry, self.policy.refresh_lead_secs);

        let engine = self.clone();
        self.timers
            .schedule_at(ResourceId::session_token(), fire_at, move || {
                let engine = engine.clone();
                async move { engine.reconcile_token().await }
            })
            .await;
        Ok(())
    }

    /// One refresh attempt. Success installs the new pair and chains the
    /// next refresh relative to the new expiry; a rejected refresh token is
    /// fatal and tears the whole session down.
    pub async fn reconcile_token(&self) -> Result<TickFlow, SyncError> {
        let Some(refresh) = self.mirror.get(REFRESH_TOKEN) else {
            self.expire_session().await;
            return Ok(TickFlow::Stop);
        };

        let result = timeout(self.policy.fetch_timeout(), self.api.refresh_token(&refresh))
            .await
            .map_err(|_| SyncError::Timeout)
            .and_then(|r| r.map_err(SyncError::from));

        let pair = match result {
            Ok(pair) => pair,
            Err(e) if e.is_transient() => return Err(e),
            Err(_) => {
                tracing::warn!("refresh token rejected upstream");
                self.expire_session().await;
                return Ok(TickFlow::Stop);
            }
        };

        let expiry = token::token_expiry(&pair.access_token)?;

        // The signed-in user survives refreshes untouched.
        let user = self
            .mirror
            .get(CURRENT_USER)
            .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
            .unwrap_or(Value::Null);
        let payload = json!({
            "accessToken": pair.access_token,
            "refreshToken": pair.refresh_token,
            "currentUser": user,
        });
        self.publisher
            .install(PollableResource {
                id: ResourceId::session_token(),
                status: ResourceStatus::Credential(CredentialStatus::Valid),
                last_checked_at: Some(Utc::now()),
                payload,
            })
            .await;

        Ok(TickFlow::Reschedule(token::refresh_at(
            expiry,
            self.policy.refresh_lead_secs,
        )))
    }

    /// Explicit sign-out: purge both scopes, notify, stop everything.
    /// Timers go down last — `stop_all` aborts the calling tick's own task,
    /// so subscribers must already have been notified by then.
    pub async fn clear_session(&self) {
        self.mirror.clear_contract_keys();
        self.publisher.expire_session().await;
        self.timers.stop_all().await;
    }

    async fn expire_session(&self) {
        tracing::warn!("session expired, clearing credentials from both scopes");
        self.clear_session().await;
    }

    /// Page-reload semantics: pick up whatever the mirror still holds — a
    /// remembered session re-arms its refresh chain, an in-flight
    /// appointment watch resumes polling.
    pub async fn resume_from_mirror(&self) -> Result<(), SyncError> {
        if let Some(access) = self.mirror.get(AUTH_TOKEN) {
            let user = self
                .mirror
                .get(CURRENT_USER)
                .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
                .unwrap_or(Value::Null);
            let payload = json!({
                "accessToken": access,
                "refreshToken": self.mirror.get(REFRESH_TOKEN),
                "currentUser": user,
            });
            self.publisher
                .install(PollableResource {
                    id: ResourceId::session_token(),
                    status: ResourceStatus::Credential(CredentialStatus::Valid),
                    last_checked_at: None,
                    payload,
                })
                .await;
            self.schedule_token_refresh().await?;
        }

        if self.mirror.get(APPOINTMENT_REQUESTED).as_deref() == Some("true") {
            let status = self
                .mirror
                .get(APPOINTMENT_STATUS)
                .and_then(|raw| AppointmentStatus::parse(&raw))
                .unwrap_or(AppointmentStatus::Pending);
            if status.is_terminal() {
                return Ok(());
            }

            let details = self
                .mirror
                .get(APPOINTMENT_DETAILS)
                .and_then(|raw| serde_json::from_str::<Value>(&raw).ok());
            let appointment_id = details
                .as_ref()
                .and_then(|d| d.get("id"))
                .and_then(Value::as_str)
                .map(str::to_string);

            match appointment_id {
                Some(appointment_id) => {
                    let id = ResourceId::appointment(&appointment_id);
                    self.publisher
                        .track(PollableResource {
                            id: id.clone(),
                            status: ResourceStatus::Appointment(status),
                            last_checked_at: None,
                            payload: json!({ "appointmentDetails": details }),
                        })
                        .await;
                    self.start_appointment_timer(id, appointment_id).await;
                }
                None => {
                    tracing::debug!("appointment watch persisted without an id, cannot resume");
                }
            }
        }

        Ok(())
    }
}
