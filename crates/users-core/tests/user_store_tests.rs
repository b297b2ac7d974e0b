//! Tests for the user store and authentication service

use skyrelay_users_core::{
    CreateUserRequest, Error, SqliteUserStore, UserStore, UserSummary, UsersConfig,
};
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (SqliteUserStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let store = SqliteUserStore::new(&db_url)
        .await
        .expect("Failed to create test database");

    (store, temp_dir)
}

#[tokio::test]
async fn test_create_user() {
    let (store, _temp_dir) = create_test_db().await;

    let user = store.create_user("alice", "phc").await.unwrap();
    assert_eq!(user.username, "alice");
    assert!(user.id > 0);

    let fetched = store.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(fetched.username, "alice");
    assert_eq!(fetched.password_hash, "phc");
}

#[tokio::test]
async fn test_duplicate_username_error() {
    let (store, _temp_dir) = create_test_db().await;

    store.create_user("bob", "phc").await.unwrap();
    let result = store.create_user("bob", "phc").await;
    assert!(matches!(result, Err(Error::UserAlreadyExists(name)) if name == "bob"));
}

#[tokio::test]
async fn test_ids_are_sequential_integers() {
    let (store, _temp_dir) = create_test_db().await;

    let first = store.create_user("one", "phc").await.unwrap();
    let second = store.create_user("two", "phc").await.unwrap();
    assert_eq!(second.id, first.id + 1);
}

#[tokio::test]
async fn test_search_is_case_insensitive_prefix() {
    let (store, _temp_dir) = create_test_db().await;
    for name in ["Alice", "alfred", "bob", "xalice"] {
        store.create_user(name, "phc").await.unwrap();
    }

    let names: Vec<String> = store
        .search_users("AL", 20)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.username)
        .collect();
    assert_eq!(names, vec!["Alice", "alfred"]);
}

#[tokio::test]
async fn test_search_respects_limit() {
    let (store, _temp_dir) = create_test_db().await;
    for i in 0..25 {
        store.create_user(&format!("user{:02}", i), "phc").await.unwrap();
    }

    assert_eq!(store.search_users("user", 20).await.unwrap().len(), 20);
    assert_eq!(store.count_users().await.unwrap(), 25);
}

#[tokio::test]
async fn test_register_login_search_round_trip() {
    let auth = skyrelay_users_core::init(UsersConfig::in_memory()).await.unwrap();

    let registered = auth
        .register(CreateUserRequest::new("  carol ", " pw "))
        .await
        .unwrap();
    assert_eq!(registered.username, "carol");

    let logged_in = auth.login("carol", "pw").await.unwrap();
    assert_eq!(logged_in, registered);

    let found = auth.search("CA").await.unwrap();
    assert_eq!(found, vec![UserSummary { id: registered.id, username: "carol".into() }]);
    assert!(auth.search("   ").await.unwrap().is_empty());

    let dup = auth.register(CreateUserRequest::new("carol", "other")).await;
    assert!(matches!(dup, Err(Error::UserAlreadyExists(_))));
}

#[tokio::test]
async fn test_concurrent_registrations_of_one_name() {
    let auth = skyrelay_users_core::init(UsersConfig::in_memory()).await.unwrap();

    let attempts = (0..8).map(|_| {
        let auth = auth.clone();
        tokio::spawn(async move { auth.register(CreateUserRequest::new("dave", "pw")).await })
    });
    let results = futures::future::join_all(attempts).await;

    let created = results
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();
    assert_eq!(created, 1);
}
