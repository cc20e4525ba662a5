mod common;

use std::collections::HashSet;

use common::{ADMIN_KEY, TOKEN_TTL, init_tracing, memory_service, now_secs};
use grpc_auth::{AppStore, Claims, Error, StorageError, UserStore};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use uuid::Uuid;

const APP_SECRET: &str = "billing-signing-secret";

fn decode_claims(token: &str, secret: &str) -> Claims {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .expect("Token should verify with the app secret")
    .claims
}

#[tokio::test]
async fn register_then_login_issues_app_scoped_token() {
    init_tracing();
    let (service, _store) = memory_service();

    let user_id = service
        .register_new_user("a@b.com", "secret123")
        .await
        .expect("Registration should succeed");
    assert!(!user_id.is_empty());
    Uuid::parse_str(&user_id).expect("User id should be a UUID");

    let app_id = service
        .register_new_app("billing", APP_SECRET, ADMIN_KEY)
        .await
        .expect("App registration should succeed");

    let before = now_secs();
    let token = service
        .login("a@b.com", "secret123", &app_id)
        .await
        .expect("Login should succeed");
    let after = now_secs();

    assert!(!token.is_empty());
    assert_eq!(token.split('.').count(), 3);

    let claims = decode_claims(&token, APP_SECRET);
    assert_eq!(claims.sub, user_id);
    assert_eq!(claims.email, "a@b.com");
    assert_eq!(claims.app_id, app_id);

    let ttl = TOKEN_TTL.as_secs();
    assert!(claims.exp >= before + ttl && claims.exp <= after + ttl + 1);
}

#[tokio::test]
async fn registering_same_email_twice_conflicts() {
    let (service, store) = memory_service();

    service.register_new_user("dup@b.com", "pw-one").await.unwrap();
    let err = service
        .register_new_user("dup@b.com", "pw-two")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AlreadyExists));
    assert_eq!(store.user_count().await, 1);
}

#[tokio::test]
async fn email_match_ignores_case() {
    let (service, _store) = memory_service();
    let app_id = service
        .register_new_app("billing", APP_SECRET, ADMIN_KEY)
        .await
        .unwrap();

    service
        .register_new_user("Mixed@Case.com", "secret123")
        .await
        .unwrap();

    let err = service
        .register_new_user("mixed@case.COM", "other")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyExists));

    let token = service
        .login("MIXED@case.com", "secret123", &app_id)
        .await
        .unwrap();
    assert_eq!(decode_claims(&token, APP_SECRET).email, "mixed@case.com");
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_indistinguishable() {
    let (service, _store) = memory_service();
    let app_id = service
        .register_new_app("billing", APP_SECRET, ADMIN_KEY)
        .await
        .unwrap();
    service.register_new_user("a@b.com", "secret123").await.unwrap();

    let wrong_password = service
        .login("a@b.com", "not-the-password", &app_id)
        .await
        .unwrap_err();
    let unknown_email = service
        .login("nobody@b.com", "secret123", &app_id)
        .await
        .unwrap_err();

    assert!(matches!(wrong_password, Error::InvalidCredentials));
    assert!(matches!(unknown_email, Error::InvalidCredentials));
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
}

#[tokio::test]
async fn login_with_unknown_app_is_invalid_data() {
    let (service, _store) = memory_service();
    service.register_new_user("a@b.com", "secret123").await.unwrap();

    let err = service
        .login("a@b.com", "secret123", &Uuid::new_v4().to_string())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidData));
}

#[tokio::test]
async fn login_does_not_change_stored_state() {
    let (service, store) = memory_service();
    let app_id = service
        .register_new_app("billing", APP_SECRET, ADMIN_KEY)
        .await
        .unwrap();
    service.register_new_user("a@b.com", "secret123").await.unwrap();

    let before = UserStore::get(&store, "a@b.com").await.unwrap();
    service.login("a@b.com", "secret123", &app_id).await.unwrap();
    service.login("a@b.com", "secret123", &app_id).await.unwrap();
    let after = UserStore::get(&store, "a@b.com").await.unwrap();

    assert_eq!(before.id, after.id);
    assert_eq!(before.password_hash, after.password_hash);
    assert_eq!(before.salt, after.salt);
    assert_eq!(store.user_count().await, 1);
}

#[tokio::test]
async fn password_is_never_stored_in_plaintext() {
    let (service, store) = memory_service();
    service.register_new_user("a@b.com", "secret123").await.unwrap();

    let user = UserStore::get(&store, "a@b.com").await.unwrap();
    assert!(!user.password_hash.as_str().is_empty());
    assert!(!user.password_hash.as_str().contains("secret123"));
    assert!(!user.salt.contains("secret123"));
}

#[tokio::test]
async fn duplicate_app_name_is_invalid_data() {
    let (service, store) = memory_service();

    service
        .register_new_app("billing", APP_SECRET, ADMIN_KEY)
        .await
        .unwrap();
    let err = service
        .register_new_app("billing", "another-secret", ADMIN_KEY)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidData));
    assert_eq!(store.app_count().await, 1);
}

#[tokio::test]
async fn app_registration_requires_admin_key() {
    let (service, store) = memory_service();

    for key in ["", "wrong", "integration-admin-key-012345678"] {
        let err = service
            .register_new_app("billing", APP_SECRET, key)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied), "key {key:?}");
    }

    assert_eq!(store.app_count().await, 0);
}

#[tokio::test]
async fn delete_app_then_lookup_is_not_found() {
    let (service, store) = memory_service();
    let app_id = service
        .register_new_app("billing", APP_SECRET, ADMIN_KEY)
        .await
        .unwrap();

    service.delete_app(&app_id).await.expect("Delete should succeed");

    let id = Uuid::parse_str(&app_id).unwrap();
    assert!(matches!(
        AppStore::get(&store, id).await,
        Err(StorageError::AppNotFound { .. })
    ));

    let err = service.delete_app(&app_id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound));
}

#[tokio::test]
async fn delete_unknown_app_is_not_found() {
    let (service, _store) = memory_service();

    let err = service
        .delete_app(&Uuid::new_v4().to_string())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound));
}

#[tokio::test]
async fn login_after_app_deletion_is_invalid_data() {
    let (service, _store) = memory_service();
    let app_id = service
        .register_new_app("billing", APP_SECRET, ADMIN_KEY)
        .await
        .unwrap();
    service.register_new_user("a@b.com", "secret123").await.unwrap();

    service.delete_app(&app_id).await.unwrap();

    let err = service
        .login("a@b.com", "secret123", &app_id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidData));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registration_of_one_email_has_one_winner() {
    let (service, store) = memory_service();

    let attempts = (0..8).map(|i| {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .register_new_user("race@b.com", &format!("password-{i}"))
                .await
        })
    });

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in attempts.collect::<Vec<_>>() {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(Error::AlreadyExists) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(store.user_count().await, 1);
}

#[tokio::test]
async fn tokens_for_different_apps_use_different_keys() {
    let (service, _store) = memory_service();
    service.register_new_user("a@b.com", "secret123").await.unwrap();
    let billing = service
        .register_new_app("billing", "billing-secret", ADMIN_KEY)
        .await
        .unwrap();
    let reports = service
        .register_new_app("reports", "reports-secret", ADMIN_KEY)
        .await
        .unwrap();

    let billing_token = service.login("a@b.com", "secret123", &billing).await.unwrap();
    let reports_token = service.login("a@b.com", "secret123", &reports).await.unwrap();

    assert_eq!(decode_claims(&billing_token, "billing-secret").app_id, billing);
    assert_eq!(decode_claims(&reports_token, "reports-secret").app_id, reports);

    let cross = decode::<Claims>(
        &billing_token,
        &DecodingKey::from_secret(b"reports-secret"),
        &Validation::new(Algorithm::HS256),
    );
    assert!(cross.is_err(), "A token must not verify under another app's secret");
}

#[tokio::test]
async fn user_ids_are_unique() {
    let (service, _store) = memory_service();

    let mut ids = HashSet::new();
    for i in 0..5 {
        let id = service
            .register_new_user(&format!("user{i}@b.com"), "pw")
            .await
            .unwrap();
        assert!(ids.insert(id));
    }
}
