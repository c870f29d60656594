//! Postgres token store and membership directory integration tests
//!
//! These need a real database: set `TEST_DATABASE_URL`. Without it every test
//! returns early so the suite stays runnable on a laptop.

mod common;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use memberlink_common::generate_token;
use memberlink_verification::{
    ClaimOutcome, MembershipDirectory, PendingVerification, PgMembershipDirectory, PgTokenStore,
    TokenStore, MIGRATOR,
};
use sqlx::PgPool;

use crate::common::TestConfig;

async fn pool() -> Option<PgPool> {
    let database_url = TestConfig::from_env().database_url?;
    let pool = PgPool::connect(&database_url)
        .await
        .expect("connect to TEST_DATABASE_URL");
    MIGRATOR.run(&pool).await.expect("run migrations");
    Some(pool)
}

// Postgres stores microseconds
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn lease() -> Duration {
    Duration::seconds(120)
}

fn entry(user_id: &str, at: DateTime<Utc>) -> PendingVerification {
    PendingVerification::new(
        "a@x.com".to_string(),
        user_id.to_string(),
        at,
        Duration::hours(24),
    )
    .unwrap()
}

#[tokio::test]
async fn test_insert_get_delete() {
    let Some(pool) = pool().await else { return };
    let store = PgTokenStore::new(pool);
    let token = generate_token().unwrap();
    let t0 = now();

    store.insert(&token, &entry("user-1", t0)).await.unwrap();
    assert!(store.insert(&token, &entry("user-2", t0)).await.is_err());

    let found = store.get(&token, t0).await.unwrap().unwrap();
    assert_eq!(found, entry("user-1", t0));

    assert!(store.delete(&token).await.unwrap());
    assert!(store.get(&token, t0).await.unwrap().is_none());
    assert!(!store.delete(&token).await.unwrap());
}

#[tokio::test]
async fn test_claim_outcomes() {
    let Some(pool) = pool().await else { return };
    let store = PgTokenStore::new(pool);
    let token = generate_token().unwrap();
    let t0 = now();
    store.insert(&token, &entry("user-1", t0)).await.unwrap();

    assert_eq!(
        store.claim("no-such-token", "user-1", t0, lease()).await.unwrap(),
        ClaimOutcome::NotFound
    );
    assert_eq!(
        store.claim(&token, "user-2", t0, lease()).await.unwrap(),
        ClaimOutcome::IdentityMismatch
    );
    assert!(matches!(
        store.claim(&token, "user-1", t0, lease()).await.unwrap(),
        ClaimOutcome::Claimed(_)
    ));
    assert_eq!(
        store.claim(&token, "user-1", t0, lease()).await.unwrap(),
        ClaimOutcome::InFlight
    );

    // Stale claims can be taken over
    let later = t0 + lease() + Duration::seconds(1);
    assert!(matches!(
        store.claim(&token, "user-1", later, lease()).await.unwrap(),
        ClaimOutcome::Claimed(_)
    ));

    // The lapsed claim can no longer touch the entry
    assert!(!store.release(&token, t0).await.unwrap());
    assert!(!store.redeem(&token, t0).await.unwrap());
    assert_eq!(
        store.get(&token, t0).await.unwrap().unwrap().claimed_at,
        Some(later)
    );

    assert!(store.release(&token, later).await.unwrap());
    assert!(store.get(&token, t0).await.unwrap().unwrap().claimed_at.is_none());

    store.delete(&token).await.unwrap();
}

#[tokio::test]
async fn test_redeem_removes_entry_for_current_claim() {
    let Some(pool) = pool().await else { return };
    let store = PgTokenStore::new(pool);
    let token = generate_token().unwrap();
    let t0 = now();
    store.insert(&token, &entry("user-1", t0)).await.unwrap();

    let ClaimOutcome::Claimed(claimed) = store.claim(&token, "user-1", t0, lease()).await.unwrap()
    else {
        panic!("expected the owner to claim the token");
    };
    let claimed_at = claimed.claimed_at.unwrap();

    assert!(store.redeem(&token, claimed_at).await.unwrap());
    assert!(store.get(&token, t0).await.unwrap().is_none());
    assert!(!store.redeem(&token, claimed_at).await.unwrap());
}

#[tokio::test]
async fn test_claim_after_expiry_purges_entry() {
    let Some(pool) = pool().await else { return };
    let store = PgTokenStore::new(pool);
    let token = generate_token().unwrap();
    let t0 = now();
    store.insert(&token, &entry("user-1", t0)).await.unwrap();

    let outcome = store
        .claim(&token, "user-1", t0 + Duration::days(2), lease())
        .await
        .unwrap();

    assert_eq!(outcome, ClaimOutcome::Expired);
    assert!(!store.delete(&token).await.unwrap());
}

#[tokio::test]
async fn test_concurrent_claims_admit_one() {
    let Some(pool) = pool().await else { return };
    let store = PgTokenStore::new(pool);
    let token = generate_token().unwrap();
    let t0 = now();
    store.insert(&token, &entry("user-1", t0)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            store.claim(&token, "user-1", t0, lease()).await.unwrap()
        }));
    }

    let mut claimed = 0;
    for handle in handles {
        if let ClaimOutcome::Claimed(_) = handle.await.unwrap() {
            claimed += 1;
        }
    }
    assert_eq!(claimed, 1);

    store.delete(&token).await.unwrap();
}

#[tokio::test]
async fn test_purge_expired() {
    let Some(pool) = pool().await else { return };
    let store = PgTokenStore::new(pool);
    let fresh = generate_token().unwrap();
    let stale = generate_token().unwrap();
    let t0 = now();

    store.insert(&fresh, &entry("user-1", t0)).await.unwrap();
    store
        .insert(&stale, &entry("user-2", t0 - Duration::days(2)))
        .await
        .unwrap();

    assert!(store.purge_expired(t0).await.unwrap() >= 1);
    assert!(store.get(&fresh, t0).await.unwrap().is_some());
    assert!(!store.delete(&stale).await.unwrap());

    store.delete(&fresh).await.unwrap();
}

#[tokio::test]
async fn test_membership_directory_finds_active_members() {
    let Some(pool) = pool().await else { return };

    // The members table belongs to the membership system; create a minimal one
    sqlx::query("CREATE TABLE IF NOT EXISTS members (email TEXT NOT NULL, end_date TIMESTAMPTZ NOT NULL)")
        .execute(&pool)
        .await
        .unwrap();

    let suffix = generate_token().unwrap().to_lowercase().replace(['-', '_'], "");
    let active = format!("active-{}@x.com", &suffix[..12]);
    let lapsed = format!("lapsed-{}@x.com", &suffix[..12]);
    let end_date: DateTime<Utc> = "2999-06-01T00:00:00Z".parse().unwrap();

    sqlx::query("INSERT INTO members (email, end_date) VALUES ($1, $2), ($3, $4)")
        .bind(&active)
        .bind(end_date)
        .bind(&lapsed)
        .bind(Utc::now() - Duration::days(30))
        .execute(&pool)
        .await
        .unwrap();

    let directory = PgMembershipDirectory::new(pool.clone());

    let record = directory
        .find_active_member(&active.to_uppercase())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.end_date, "2999-06-01T00:00:00.000Z");
    assert!(directory.find_active_member(&lapsed).await.unwrap().is_none());
    assert!(directory
        .find_active_member("nobody@x.com")
        .await
        .unwrap()
        .is_none());

    sqlx::query("DELETE FROM members WHERE email = $1 OR email = $2")
        .bind(&active)
        .bind(&lapsed)
        .execute(&pool)
        .await
        .unwrap();
}
