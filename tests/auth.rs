use plotdash::error::AppError;
use plotdash::login::{self, UserRegistry};

fn open_registry(dir: &tempfile::TempDir) -> UserRegistry {
    UserRegistry::open(dir.path().join("users.json")).unwrap()
}

#[test]
fn register_then_verify() {
    let dir = tempfile::tempdir().unwrap();
    let registry = open_registry(&dir);

    let user = registry
        .register("ana@example.com", "long-enough-password")
        .unwrap();
    assert_eq!(user.username, "ana@example.com");

    // Hash, not the password, is stored
    assert_ne!(user.password_hash, "long-enough-password");

    let verified = registry
        .verify("ana@example.com", "long-enough-password")
        .unwrap();
    assert_eq!(verified.id, user.id);

    let err = registry
        .verify("ana@example.com", "wrong-password")
        .unwrap_err();
    assert!(matches!(err, AppError::Auth(_)));
}

#[test]
fn unknown_user_fails_authentication() {
    let dir = tempfile::tempdir().unwrap();
    let registry = open_registry(&dir);

    let err = registry
        .verify("ghost@example.com", "whatever-it-is")
        .unwrap_err();
    assert!(matches!(err, AppError::Auth(_)));
}

#[test]
fn duplicate_registration_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let registry = open_registry(&dir);

    registry
        .register("ana@example.com", "long-enough-password")
        .unwrap();
    let err = registry
        .register("ana@example.com", "another-password")
        .unwrap_err();
    assert!(matches!(err, AppError::Auth(_)));
}

#[test]
fn malformed_registrations_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let registry = open_registry(&dir);

    // Not email-shaped
    assert!(registry.register("not-an-email", "long-enough-password").is_err());

    // Too short a password
    assert!(registry.register("ana@example.com", "short").is_err());

    // Empty fields
    assert!(registry.register("", "long-enough-password").is_err());
    assert!(registry.register("ana@example.com", "").is_err());
}

#[test]
fn registry_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let registry = open_registry(&dir);
        registry
            .register("ana@example.com", "long-enough-password")
            .unwrap();
    }

    // A fresh instance reads the flushed index back
    let registry = open_registry(&dir);
    assert!(registry.contains("ana@example.com"));
    assert!(
        registry
            .verify("ana@example.com", "long-enough-password")
            .is_ok()
    );
}

#[test]
fn user_ids_increase_per_registration() {
    let dir = tempfile::tempdir().unwrap();
    let registry = open_registry(&dir);

    let first = registry
        .register("ana@example.com", "long-enough-password")
        .unwrap();
    let second = registry
        .register("bob@example.com", "long-enough-password")
        .unwrap();
    assert!(second.id > first.id);
}

#[test]
fn session_tokens_resolve_back_to_their_user() {
    let token = login::create_session("ana@example.com");
    assert_eq!(
        login::validate_session(&token),
        Some("ana@example.com".to_string())
    );

    assert_eq!(login::validate_session("not-a-token"), None);
}
