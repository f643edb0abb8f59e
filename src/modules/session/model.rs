use serde::{Deserialize, Serialize};

/// Health of the cached access token. A refresh installs a new `Valid`
/// resource; an expired credential never becomes valid again in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Valid,
    Expiring,
    Expired,
}

impl CredentialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Expiring => "expiring",
            Self::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired)
    }

    /// Credentials only move toward expiry.
    pub fn can_transition_to(&self, next: CredentialStatus) -> bool {
        *self == next
            || matches!(
                (self, next),
                (Self::Valid, Self::Expiring | Self::Expired) | (Self::Expiring, Self::Expired)
            )
    }
}

/// Access/refresh token pair issued by the portal backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Patient,
    Doctor,
    Admin,
}

/// The signed-in identity mirrored under `currentUser`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub role: UserRole,
}

/// Which of the two storage scopes a login writes to. Resolved once per
/// login from the remember-me flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageScope {
    /// In-memory, dies with the process. The no-remember-me default.
    Session,
    /// On-disk, survives reloads.
    Persistent,
}

impl StorageScope {
    pub fn other(&self) -> StorageScope {
        match self {
            Self::Session => Self::Persistent,
            Self::Persistent => Self::Session,
        }
    }
}
