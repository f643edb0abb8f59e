use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::modules::appointment::model::AppointmentStatus;
use crate::modules::resource::model::{PollableResource, ResourceId, ResourceStatus};
use crate::services::mirror::{
    MirrorError, ScopedStore, APPOINTMENT_DETAILS, APPOINTMENT_STATUS, AUTH_TOKEN, CURRENT_USER,
    REFRESH_TOKEN,
};
use crate::services::sync::types::SyncError;

/// Notification delivered to subscribers of a watched resource.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    Updated { resource: PollableResource },
    Degraded { id: ResourceId },
    Recovered { id: ResourceId },
    Removed { id: ResourceId },
    SessionExpired,
}

struct Subscriber {
    id: Uuid,
    resource: ResourceId,
    tx: mpsc::UnboundedSender<StateEvent>,
}

/// Consumer handle; drop the receiver and call `unsubscribe` on teardown.
pub struct StateSubscription {
    pub id: Uuid,
    pub events: mpsc::UnboundedReceiver<StateEvent>,
}

/// Holds the canonical in-memory resource set, gates status transitions,
/// writes through to the durable mirror and fans events out to subscribers.
pub struct StatePublisher {
    resources: RwLock<HashMap<ResourceId, PollableResource>>,
    subscribers: RwLock<Vec<Subscriber>>,
    mirror: Arc<ScopedStore>,
}

impl StatePublisher {
    pub fn new(mirror: Arc<ScopedStore>) -> Self {
        Self {
            resources: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(Vec::new()),
            mirror,
        }
    }

    pub async fn subscribe(&self, resource: &ResourceId) -> StateSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.subscribers.write().await.push(Subscriber {
            id,
            resource: resource.clone(),
            tx,
        });
        StateSubscription { id, events: rx }
    }

    pub async fn unsubscribe(&self, subscription_id: Uuid) {
        self.subscribers
            .write()
            .await
            .retain(|s| s.id != subscription_id);
    }

    pub async fn get(&self, id: &ResourceId) -> Option<PollableResource> {
        self.resources.read().await.get(id).cloned()
    }

    /// Register a resource the client just learned about. Keeps any existing
    /// entry untouched.
    pub async fn track(&self, resource: PollableResource) {
        self.resources
            .write()
            .await
            .entry(resource.id.clone())
            .or_insert(resource);
    }

    /// Install a brand-new resource generation, bypassing transition
    /// validation. Login and token refresh replace the credential resource
    /// outright instead of mutating an expired one back to valid.
    pub async fn install(&self, resource: PollableResource) {
        let id = resource.id.clone();
        self.resources
            .write()
            .await
            .insert(id.clone(), resource.clone());
        self.persist(&resource);
        self.notify(&id, StateEvent::Updated { resource }).await;
    }

    /// Merge a reconciled observation into the canonical state. Returns
    /// whether the visible state changed; a same-status tick only bumps
    /// `last_checked_at` and wakes nobody.
    pub async fn update(
        &self,
        id: &ResourceId,
        status: ResourceStatus,
        payload: Value,
        checked_at: DateTime<Utc>,
    ) -> Result<bool, SyncError> {
        let snapshot = {
            let mut resources = self.resources.write().await;
            let entry = resources
                .entry(id.clone())
                .or_insert_with(|| PollableResource::new(id.clone(), status));

            if !entry.status.can_transition_to(&status) {
                tracing::warn!(
                    resource = %id,
                    from = ?entry.status,
                    to = ?status,
                    "rejected illegal status transition"
                );
                return Err(SyncError::InvalidStateTransition {
                    from: entry.status,
                    to: status,
                });
            }

            let changed =
                entry.status != status || (!payload.is_null() && entry.payload != payload);
            entry.status = status;
            if !payload.is_null() {
                entry.payload = payload;
            }
            entry.last_checked_at = Some(checked_at);
            (entry.clone(), changed)
        };

        let (resource, changed) = snapshot;
        self.persist(&resource);
        if changed {
            self.notify(id, StateEvent::Updated { resource }).await;
        }
        Ok(changed)
    }

    /// Drop a resource outright (explicit clear, not terminal completion).
    pub async fn remove(&self, id: &ResourceId) {
        if self.resources.write().await.remove(id).is_some() {
            self.notify(id, StateEvent::Removed { id: id.clone() }).await;
        }
    }

    pub async fn mark_degraded(&self, id: &ResourceId) {
        tracing::warn!(resource = %id, "reconciliation degraded");
        self.notify(id, StateEvent::Degraded { id: id.clone() }).await;
    }

    pub async fn mark_recovered(&self, id: &ResourceId) {
        tracing::info!(resource = %id, "reconciliation recovered");
        self.notify(id, StateEvent::Recovered { id: id.clone() })
            .await;
    }

    /// Fatal session teardown: every subscriber hears this one, whatever
    /// resource it watches, so the UI can redirect to re-authentication.
    pub async fn expire_session(&self) {
        self.resources.write().await.clear();
        let subscribers = self.subscribers.read().await;
        for sub in subscribers.iter() {
            let _ = sub.tx.send(StateEvent::SessionExpired);
        }
    }

    /// Write-through to the durable mirror. Best effort: the in-memory view
    /// stays authoritative when persistence fails.
    fn persist(&self, resource: &PollableResource) {
        let result = match &resource.status {
            ResourceStatus::Appointment(status) => self.persist_appointment(resource, *status),
            ResourceStatus::Credential(_) => self.persist_credentials(&resource.payload),
        };
        if let Err(e) = result {
            tracing::warn!(resource = %resource.id, error = %e, "mirror write failed");
        }
    }

    fn persist_appointment(
        &self,
        resource: &PollableResource,
        status: AppointmentStatus,
    ) -> Result<(), MirrorError> {
        self.mirror.set(APPOINTMENT_STATUS, status.as_str())?;
        if let Some(details) = resource
            .payload
            .get("appointmentDetails")
            .filter(|d| !d.is_null())
        {
            // Stamp the appointment id into the persisted details so a reload
            // can resume the watch.
            let mut details = details.clone();
            if let (Some(object), Some(key)) =
                (details.as_object_mut(), resource.id.appointment_key())
            {
                object
                    .entry("id")
                    .or_insert_with(|| Value::String(key.to_string()));
            }
            self.mirror.set(APPOINTMENT_DETAILS, &details.to_string())?;
        }
        Ok(())
    }

    fn persist_credentials(&self, payload: &Value) -> Result<(), MirrorError> {
        if let Some(token) = payload.get("accessToken").and_then(Value::as_str) {
            self.mirror.set(AUTH_TOKEN, token)?;
        }
        if let Some(token) = payload.get("refreshToken").and_then(Value::as_str) {
            self.mirror.set(REFRESH_TOKEN, token)?;
        }
        if let Some(user) = payload.get("currentUser").filter(|u| !u.is_null()) {
            self.mirror.set(CURRENT_USER, &user.to_string())?;
        }
        Ok(())
    }

    pub fn mirror(&self) -> &ScopedStore {
        &self.mirror
    }

    async fn notify(&self, id: &ResourceId, event: StateEvent) {
        let subscribers = self.subscribers.read().await;
        for sub in subscribers.iter().filter(|s| &s.resource == id) {
            let _ = sub.tx.send(event.clone());
        }
    }
}
