//! Repository-level tests for the database crate

use chrono::{Duration, Utc};
use relay_config::DatabaseConfig;
use relay_database::{initialize_database, MembershipRepository, MessageRepository};
use relay_realtime::{
    CoreError, MembershipView, MessageKind, MessageStatus, MessageStore, MessageTarget, NewMessage,
};
use sqlx::SqlitePool;

/// Helper to bring up a fresh in-memory database with the full schema.
async fn create_test_database() -> SqlitePool {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    };
    initialize_database(&config)
        .await
        .expect("Failed to create test database")
}

fn private_message(sender: i64, receiver: i64, content: &str) -> NewMessage {
    NewMessage {
        sender_id: sender,
        target: MessageTarget::Private {
            receiver_id: receiver,
        },
        content: content.to_string(),
        kind: MessageKind::Text,
        reply_to_id: None,
    }
}

#[tokio::test]
async fn test_create_and_find_message() {
    let pool = create_test_database().await;
    let repo = MessageRepository::new(pool);

    let created = repo.create(private_message(1, 2, "hello")).await.unwrap();
    assert!(created.id > 0);
    assert_eq!(created.status, MessageStatus::Sent);
    assert!(!created.revoked);

    let found = repo.find(created.id).await.unwrap().unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.sender_id, 1);
    assert_eq!(
        found.target,
        MessageTarget::Private { receiver_id: 2 }
    );
    assert_eq!(found.content, "hello");
    assert_eq!(found.kind, MessageKind::Text);
    assert_eq!(found.status, MessageStatus::Sent);
}

#[tokio::test]
async fn test_find_missing_message_returns_none() {
    let pool = create_test_database().await;
    let repo = MessageRepository::new(pool);

    assert!(repo.find(9999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_raise_status_is_monotonic() {
    let pool = create_test_database().await;
    let repo = MessageRepository::new(pool);

    let created = repo.create(private_message(1, 2, "hi")).await.unwrap();

    repo.raise_status(created.id, MessageStatus::Read)
        .await
        .unwrap();
    // a late delivery ack must not demote the already-read message
    repo.raise_status(created.id, MessageStatus::Delivered)
        .await
        .unwrap();

    let found = repo.find(created.id).await.unwrap().unwrap();
    assert_eq!(found.status, MessageStatus::Read);
}

#[tokio::test]
async fn test_raise_status_unknown_message() {
    let pool = create_test_database().await;
    let repo = MessageRepository::new(pool);

    let err = repo
        .raise_status(42, MessageStatus::Delivered)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_mark_revoked_keeps_record() {
    let pool = create_test_database().await;
    let repo = MessageRepository::new(pool);

    let created = repo.create(private_message(1, 2, "oops")).await.unwrap();
    let revoked_at = Utc::now();
    repo.mark_revoked(created.id, revoked_at).await.unwrap();

    let found = repo.find(created.id).await.unwrap().unwrap();
    assert!(found.revoked);
    let stored_at = found.revoked_at.unwrap();
    assert!((stored_at - revoked_at).abs() < Duration::seconds(1));
    assert_eq!(found.content, "oops");
}

#[tokio::test]
async fn test_schema_rejects_ambiguous_target() {
    let pool = create_test_database().await;

    // both receiver_id and group_id set violates the table CHECK
    let result = sqlx::query(
        "INSERT INTO messages (sender_id, receiver_id, group_id, content, kind, status, \
         is_revoked, created_at)
         VALUES (1, 2, 3, 'bad', 'text', 0, 0, ?)",
    )
    .bind(Utc::now().to_rfc3339())
    .execute(&pool)
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_private_history_both_directions() {
    let pool = create_test_database().await;
    let repo = MessageRepository::new(pool);

    repo.create(private_message(1, 2, "from 1")).await.unwrap();
    repo.create(private_message(2, 1, "from 2")).await.unwrap();
    repo.create(private_message(1, 3, "unrelated")).await.unwrap();

    let history = repo.private_history(1, 2, 50, 0).await.unwrap();
    assert_eq!(history.len(), 2);
    // newest first
    assert_eq!(history[0].content, "from 2");
    assert_eq!(history[1].content, "from 1");
}

#[tokio::test]
async fn test_group_history_and_pagination() {
    let pool = create_test_database().await;
    let repo = MessageRepository::new(pool);

    for i in 0..5 {
        repo.create(NewMessage {
            sender_id: 1,
            target: MessageTarget::Group { group_id: 10 },
            content: format!("msg {i}"),
            kind: MessageKind::Text,
            reply_to_id: None,
        })
        .await
        .unwrap();
    }

    let first_page = repo.group_history(10, 2, 0).await.unwrap();
    assert_eq!(first_page.len(), 2);
    assert_eq!(first_page[0].content, "msg 4");

    let second_page = repo.group_history(10, 2, 2).await.unwrap();
    assert_eq!(second_page.len(), 2);
    assert_eq!(second_page[0].content, "msg 2");
}

#[tokio::test]
async fn test_unread_count_skips_read_and_revoked() {
    let pool = create_test_database().await;
    let repo = MessageRepository::new(pool);

    let a = repo.create(private_message(1, 2, "a")).await.unwrap();
    let b = repo.create(private_message(1, 2, "b")).await.unwrap();
    repo.create(private_message(1, 2, "c")).await.unwrap();

    repo.raise_status(a.id, MessageStatus::Read).await.unwrap();
    repo.mark_revoked(b.id, Utc::now()).await.unwrap();

    assert_eq!(repo.unread_private_count(2).await.unwrap(), 1);
    assert_eq!(repo.unread_private_count(1).await.unwrap(), 0);
}

#[tokio::test]
async fn test_membership_active_set() {
    let pool = create_test_database().await;
    let repo = MembershipRepository::new(pool);

    repo.add_member(10, 1, "owner").await.unwrap();
    repo.add_member(10, 2, "member").await.unwrap();
    repo.add_member(10, 3, "member").await.unwrap();
    repo.add_member(99, 4, "member").await.unwrap();

    let members = repo.active_members(10).await.unwrap();
    assert_eq!(members, vec![1, 2, 3]);

    assert!(repo.is_active_member(10, 2).await.unwrap());
    assert!(!repo.is_active_member(10, 4).await.unwrap());
}

#[tokio::test]
async fn test_kicked_member_leaves_active_set() {
    let pool = create_test_database().await;
    let repo = MembershipRepository::new(pool);

    repo.add_member(10, 1, "owner").await.unwrap();
    repo.add_member(10, 2, "member").await.unwrap();

    repo.set_join_status(10, 2, "kicked").await.unwrap();
    assert!(!repo.is_active_member(10, 2).await.unwrap());
    assert_eq!(repo.active_members(10).await.unwrap(), vec![1]);

    // re-approval flips the same row back to active
    repo.add_member(10, 2, "member").await.unwrap();
    assert!(repo.is_active_member(10, 2).await.unwrap());
}

#[tokio::test]
async fn test_set_join_status_unknown_member() {
    let pool = create_test_database().await;
    let repo = MembershipRepository::new(pool);

    let err = repo.set_join_status(10, 7, "kicked").await.unwrap_err();
    assert!(matches!(err, CoreError::Membership { .. }));
}

#[tokio::test]
async fn test_remove_member() {
    let pool = create_test_database().await;
    let repo = MembershipRepository::new(pool);

    repo.add_member(10, 1, "member").await.unwrap();
    repo.remove_member(10, 1).await.unwrap();

    assert!(repo.active_members(10).await.unwrap().is_empty());
}
