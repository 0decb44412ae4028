use std::time::Duration;

use super::*;
use crate::journal::Mood;

fn creds(email: &str) -> Credentials {
    Credentials::new(email, "hunter22")
}

async fn signed_in(backend: &MemoryBackend, email: &str) -> Owner {
    backend.sign_up(&creds(email)).await.expect("sign up");
    let grant = backend.sign_in_with_password(&creds(email)).await.expect("sign in");
    Owner { user_id: grant.user.id, access_token: grant.access_token }
}

#[tokio::test]
async fn sign_in_rejects_wrong_password_and_unknown_user() {
    let backend = MemoryBackend::new(true);
    backend.sign_up(&creds("a@example.com")).await.unwrap();

    let wrong = backend.sign_in_with_password(&Credentials::new("a@example.com", "nope-nope")).await;
    assert!(matches!(wrong, Err(BackendError::InvalidCredentials(_))));

    let unknown = backend.sign_in_with_password(&creds("b@example.com")).await;
    assert!(matches!(unknown, Err(BackendError::InvalidCredentials(_))));

    let ok = backend.sign_in_with_password(&creds("A@Example.com")).await.unwrap();
    assert_eq!(ok.user.email, "a@example.com");
    assert!(ok.access_token.is_some());
}

#[tokio::test]
async fn unconfirmed_accounts_cannot_sign_in_until_confirmed() {
    let backend = MemoryBackend::new(false);
    let receipt = backend.sign_up(&creds("c@example.com")).await.unwrap();
    assert!(receipt.confirmation_pending);

    match backend.sign_in_with_password(&creds("c@example.com")).await {
        Err(BackendError::Rejected { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "Email not confirmed");
        }
        other => panic!("expected rejection, got {:?}", other),
    }

    assert!(backend.confirm_email("c@example.com"));
    assert!(backend.sign_in_with_password(&creds("c@example.com")).await.is_ok());
}

#[tokio::test]
async fn sign_up_validates_like_the_hosted_service() {
    let backend = MemoryBackend::default();
    let bad_email = backend.sign_up(&Credentials::new("not-an-email", "hunter22")).await;
    assert!(matches!(bad_email, Err(BackendError::Rejected { status: 422, .. })));

    let short = backend.sign_up(&Credentials::new("d@example.com", "123")).await;
    assert!(matches!(short, Err(BackendError::Rejected { status: 422, .. })));

    backend.sign_up(&creds("d@example.com")).await.unwrap();
    let dup = backend.sign_up(&creds("D@example.com")).await;
    assert!(matches!(dup, Err(BackendError::Rejected { ref message, .. }) if message == "User already registered"));
}

#[tokio::test]
async fn rows_are_scoped_to_their_owner_and_newest_first() {
    let backend = MemoryBackend::default();
    let u = signed_in(&backend, "u@example.com").await;
    let v = signed_in(&backend, "v@example.com").await;

    let first = backend.insert(&u, &NewEntry::new("Day 1", "ok", Mood::Happy)).await.unwrap();
    let second = backend.insert(&u, &NewEntry::new("Day 2", "meh", Mood::Neutral)).await.unwrap();
    backend.insert(&v, &NewEntry::new("Other", "x", Mood::Sad)).await.unwrap();

    let mine = backend.select_by_owner(&u).await.unwrap();
    assert_eq!(mine.iter().map(|e| e.id).collect::<Vec<_>>(), vec![second.id, first.id]);
    assert!(mine.iter().all(|e| e.user_id == u.user_id));

    let theirs = backend.select_by_owner(&v).await.unwrap();
    assert_eq!(theirs.len(), 1);
    assert_eq!(theirs[0].title, "Other");
}

#[tokio::test]
async fn update_and_delete_require_ownership() {
    let backend = MemoryBackend::default();
    let u = signed_in(&backend, "u@example.com").await;
    let v = signed_in(&backend, "v@example.com").await;
    let row = backend.insert(&u, &NewEntry::new("Day 1", "ok", Mood::Happy)).await.unwrap();

    let patch = EntryPatch { content: Some("edited".into()), ..Default::default() };
    let foreign = backend.update_by_id(&v, row.id, &patch).await;
    assert!(matches!(foreign, Err(BackendError::NotFound(_))));
    assert!(matches!(backend.delete_by_id(&v, row.id).await, Err(BackendError::NotFound(_))));

    let updated = backend.update_by_id(&u, row.id, &patch).await.unwrap();
    assert_eq!(updated.content, "edited");
    assert_eq!(updated.title, "Day 1");
    assert_eq!(updated.created_at, row.created_at);

    backend.delete_by_id(&u, row.id).await.unwrap();
    assert_eq!(backend.row_count(), 0);
    assert!(matches!(backend.delete_by_id(&u, row.id).await, Err(BackendError::NotFound(_))));
}

#[tokio::test]
async fn foreign_or_unknown_tokens_are_unauthorized() {
    let backend = MemoryBackend::default();
    let u = signed_in(&backend, "u@example.com").await;
    let v = signed_in(&backend, "v@example.com").await;

    let spoofed = Owner { user_id: u.user_id.clone(), access_token: v.access_token.clone() };
    assert!(matches!(backend.select_by_owner(&spoofed).await, Err(BackendError::Unauthorized(_))));

    let bogus = Owner { user_id: u.user_id.clone(), access_token: Some("forged".into()) };
    assert!(matches!(backend.select_by_owner(&bogus).await, Err(BackendError::Unauthorized(_))));
}

#[tokio::test]
async fn expired_tokens_are_rejected_and_pruned() {
    let backend = MemoryBackend::new(true).with_token_ttl(Duration::ZERO);
    let u = signed_in(&backend, "u@example.com").await;
    match backend.select_by_owner(&u).await {
        Err(BackendError::Unauthorized(msg)) => assert_eq!(msg, "JWT expired"),
        other => panic!("expected expiry, got {:?}", other),
    }

    for _ in 0..3 {
        backend.sign_in_with_password(&creds("u@example.com")).await.unwrap();
    }
    assert_eq!(backend.token_count(), 1);
}

#[tokio::test]
async fn live_tokens_from_several_sign_ins_stay_valid() {
    let backend = MemoryBackend::default();
    let first = signed_in(&backend, "u@example.com").await;
    let grant = backend.sign_in_with_password(&creds("u@example.com")).await.unwrap();
    let second = Owner { user_id: grant.user.id, access_token: grant.access_token };

    assert_eq!(backend.token_count(), 2);
    assert!(backend.select_by_owner(&first).await.is_ok());
    assert!(backend.select_by_owner(&second).await.is_ok());
}
