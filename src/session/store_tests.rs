use super::*;

fn creds(token: &str) -> Credentials {
    Credentials {
        access_token: token.to_string(),
        refresh_token: "refresh-1".to_string(),
        role: Role::User,
        user_id: "42".to_string(),
    }
}

#[test]
fn establish_and_clear_in_memory() {
    let store = SessionStore::in_memory();
    assert!(!store.is_authenticated());
    assert_eq!(store.role(), None);
    let g = store.establish(creds("a1")).unwrap();
    assert!(store.is_authenticated());
    assert_eq!(store.access_token().as_deref(), Some("a1"));
    assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));
    assert_eq!(store.role(), Some(Role::User));
    assert_eq!(store.user_id().as_deref(), Some("42"));
    assert!(store.generation() == g);
    assert!(store.clear());
    assert!(!store.clear());
    assert_eq!(store.access_token(), None);
    assert_eq!(store.refresh_token(), None);
}

#[test]
fn refreshed_token_replaces_access_token_only() {
    let store = SessionStore::in_memory();
    let g = store.establish(creds("old")).unwrap();
    store.apply_refreshed_token(g, "new".into()).unwrap();
    let snap = store.snapshot().unwrap();
    assert_eq!(snap.access_token, "new");
    assert_eq!(snap.refresh_token, "refresh-1");
    assert_eq!(store.generation(), g);
}

#[test]
fn stale_refresh_cannot_resurrect_cleared_session() {
    let store = SessionStore::in_memory();
    let g = store.establish(creds("old")).unwrap();
    store.clear();
    let err = store.apply_refreshed_token(g, "late".into()).unwrap_err();
    assert!(matches!(err, SessionError::RefreshFailed { .. }));
    assert!(!store.is_authenticated());

    // a new login in between also invalidates the old refresh
    let g1 = store.establish(creds("one")).unwrap();
    let _g2 = store.establish(creds("two")).unwrap();
    assert!(store.apply_refreshed_token(g1, "late".into()).is_err());
    assert_eq!(store.access_token().as_deref(), Some("two"));
}

#[test]
fn file_backed_store_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("session.json");
    {
        let store = SessionStore::open(&path).unwrap();
        let g = store.establish(creds("persisted")).unwrap();
        store.apply_refreshed_token(g, "renewed".into()).unwrap();
    }
    let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["accessToken"], "renewed");
    assert_eq!(raw["refreshToken"], "refresh-1");
    assert_eq!(raw["role"], "user");
    assert_eq!(raw["userId"], "42");

    let reopened = SessionStore::open(&path).unwrap();
    assert_eq!(reopened.access_token().as_deref(), Some("renewed"));
    assert!(reopened.clear());
    assert!(!path.exists());
}

#[test]
fn partial_file_loads_anonymous_and_is_removed() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("session.json");
    std::fs::write(&path, r#"{"accessToken":"a","role":"admin","userId":"1"}"#).unwrap();
    let store = SessionStore::open(&path).unwrap();
    assert!(!store.is_authenticated());
    assert!(!path.exists());

    std::fs::write(&path, b"not json").unwrap();
    let store = SessionStore::open(&path).unwrap();
    assert!(!store.is_authenticated());
}

#[test]
fn failed_write_keeps_the_previous_token() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("session.json");
    let store = SessionStore::open(&path).unwrap();
    let g = store.establish(creds("old")).unwrap();
    std::fs::create_dir(tmp.path().join("session.json.tmp")).unwrap();

    let err = store.apply_refreshed_token(g, "new".into()).unwrap_err();
    assert!(matches!(err, SessionError::Storage { .. }));
    assert_eq!(store.access_token().as_deref(), Some("old"));
    let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["accessToken"], "old");
}

#[test]
fn clear_generation_only_clears_the_expected_session() {
    let store = SessionStore::in_memory();
    let g1 = store.establish(creds("one")).unwrap();
    let g2 = store.establish(creds("two")).unwrap();
    assert_eq!(store.clear_generation(Some(g1)), None);
    assert_eq!(store.access_token().as_deref(), Some("two"));
    assert_eq!(store.clear_generation(Some(g2)), Some((true, g2 + 1)));
    assert_eq!(store.access_token_at(), (None, g2 + 1));
}
