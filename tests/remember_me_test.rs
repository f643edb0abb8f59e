// =============================================================================
// INTEGRATION TESTS - STORAGE SCOPE RESOLUTION (REMEMBER ME)
// One scope per login, no stale copies, reload restores the remembered scope
// =============================================================================

#[path = "common/mod.rs"]
mod common;

use std::sync::Arc;

use common::{test_engine, test_engine_with_mirror, test_user, token_pair, MockPortal};
use telecare_sync::modules::resource::model::{ResourceId, ResourceStatus};
use telecare_sync::modules::session::model::{CredentialStatus, StorageScope};
use telecare_sync::services::mirror::{ScopedStore, AUTH_TOKEN, CURRENT_USER, REFRESH_TOKEN};

#[tokio::test(start_paused = true)]
async fn test_remember_me_writes_persistent_scope_only() {
    let api = MockPortal::new();
    let engine = test_engine(Arc::clone(&api));

    let pair = token_pair(600);
    engine
        .install_session(pair.clone(), test_user(), true)
        .await
        .unwrap();

    assert_eq!(
        engine
            .mirror()
            .get_from(StorageScope::Persistent, AUTH_TOKEN),
        Some(pair.access_token)
    );
    assert_eq!(
        engine.mirror().get_from(StorageScope::Session, AUTH_TOKEN),
        None
    );
    assert_eq!(
        engine.mirror().get_from(StorageScope::Session, REFRESH_TOKEN),
        None
    );
}

#[tokio::test(start_paused = true)]
async fn test_plain_login_writes_session_scope_and_purges_stale_copy() {
    let api = MockPortal::new();
    let engine = test_engine(Arc::clone(&api));

    // First login remembered, second one not: the persistent copy must go.
    engine
        .install_session(token_pair(600), test_user(), true)
        .await
        .unwrap();
    engine.timers().stop_all().await;

    let pair = token_pair(600);
    engine
        .install_session(pair.clone(), test_user(), false)
        .await
        .unwrap();

    assert_eq!(
        engine.mirror().get_from(StorageScope::Session, AUTH_TOKEN),
        Some(pair.access_token)
    );
    assert_eq!(
        engine
            .mirror()
            .get_from(StorageScope::Persistent, AUTH_TOKEN),
        None
    );
    assert_eq!(
        engine
            .mirror()
            .get_from(StorageScope::Persistent, CURRENT_USER),
        None
    );
}

#[tokio::test(start_paused = true)]
async fn test_resume_restores_remembered_session() {
    // A remembered session left its credentials in the persistent scope.
    let mirror = Arc::new(ScopedStore::in_memory());
    mirror.set_active_scope(StorageScope::Persistent);
    let pair = token_pair(600);
    mirror.set(AUTH_TOKEN, &pair.access_token).unwrap();
    mirror.set(REFRESH_TOKEN, &pair.refresh_token).unwrap();
    mirror
        .set(
            CURRENT_USER,
            r#"{"id":"u-1","email":"patient@example.com","role":"patient"}"#,
        )
        .unwrap();

    let api = MockPortal::new();
    let engine = test_engine_with_mirror(Arc::clone(&api), mirror);

    engine.resume_from_mirror().await.unwrap();

    let resource = engine
        .publisher()
        .get(&ResourceId::session_token())
        .await
        .expect("restored credential resource");
    assert_eq!(
        resource.status,
        ResourceStatus::Credential(CredentialStatus::Valid)
    );
    assert_eq!(resource.payload["currentUser"]["email"], "patient@example.com");
    // Refresh chain re-armed for the restored token.
    assert_eq!(engine.timers().live_timers().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_resume_without_session_is_a_no_op() {
    let api = MockPortal::new();
    let engine = test_engine(Arc::clone(&api));

    engine.resume_from_mirror().await.unwrap();
    assert_eq!(engine.timers().live_timers().await, 0);
    assert_eq!(
        engine.publisher().get(&ResourceId::session_token()).await,
        None
    );
}
