//! Runs the admission script against a live Redis. Skipped when `REDIS_URL` is unset.

use std::sync::Arc;

use relay_bot::{
    cache::{RedisWindowStore, WindowStore},
    clock::{Clock, ManualClock},
    config::Config,
    middleware::RateLimiter,
};

fn redis_url() -> Option<String> {
    let url = std::env::var("REDIS_URL").ok().filter(|u| !u.trim().is_empty());
    if url.is_none() {
        eprintln!("REDIS_URL not set, skipping shared store test");
    }
    url
}

fn fresh_key(name: &str) -> String {
    format!("relay-bot-test:{}:{}", name, uuid::Uuid::new_v4())
}

async fn pttl(url: &str, key: &str) -> i64 {
    let client = redis::Client::open(url).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    redis::cmd("PTTL").arg(key).query_async(&mut conn).await.unwrap()
}

#[tokio::test]
async fn thirty_per_minute_against_shared_store() {
    let Some(url) = redis_url() else { return };
    let store = Arc::new(RedisWindowStore::connect(&url).await.unwrap());
    let clock = ManualClock::new(0);
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let config = Config {
        redis_key_prefix: fresh_key("scenario"),
        ..Config::default()
    };
    let limiter = RateLimiter::new(store, shared, &config);

    for t in 0..30 {
        clock.set(t);
        let decision = limiter.check_limit("A", "message").await;
        assert!(decision.allowed, "event at t={t} should pass");
        assert_eq!(decision.remaining, 29 - t as u32);
    }

    clock.set(30);
    let denied = limiter.check_limit("A", "message").await;
    assert!(!denied.allowed);
    assert_eq!(denied.remaining, 0);

    clock.set(60_001);
    assert!(limiter.check_limit("A", "message").await.allowed);

    clock.set(120_100);
    let decision = limiter.check_limit("A", "message").await;
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 29);
}

#[tokio::test]
async fn entry_exactly_one_window_old_still_counts() {
    let Some(url) = redis_url() else { return };
    let store = RedisWindowStore::connect(&url).await.unwrap();
    let key = fresh_key("edge");

    assert!(store.admit(&key, 0, 1_000, 1).await.unwrap().admitted);
    let at_edge = store.admit(&key, 1_000, 1_000, 1).await.unwrap();
    assert!(!at_edge.admitted);
    assert_eq!(at_edge.count_before, 1);
    assert!(store.admit(&key, 1_001, 1_000, 1).await.unwrap().admitted);
}

#[tokio::test]
async fn denied_attempt_is_not_recorded_and_expiry_is_kept() {
    let Some(url) = redis_url() else { return };
    let store = RedisWindowStore::connect(&url).await.unwrap();
    let key = fresh_key("expiry");

    store.admit(&key, 0, 60_000, 2).await.unwrap();
    store.admit(&key, 1, 60_000, 2).await.unwrap();
    let denied = store.admit(&key, 2, 60_000, 2).await.unwrap();
    assert!(!denied.admitted);
    assert_eq!(store.admit(&key, 3, 60_000, 2).await.unwrap().count_before, 2);

    let ttl = pttl(&url, &key).await;
    assert!(ttl > 0 && ttl <= 60_000, "unexpected PTTL {ttl}");
}

#[tokio::test]
async fn two_connections_racing_for_the_last_slot_admit_one() {
    let Some(url) = redis_url() else { return };
    let first = RedisWindowStore::connect(&url).await.unwrap();
    let second = RedisWindowStore::connect(&url).await.unwrap();

    for round in 0..20 {
        let key = fresh_key(&format!("race-{round}"));
        for t in 0..4 {
            assert!(first.admit(&key, t, 60_000, 5).await.unwrap().admitted);
        }

        let (a, b) = tokio::join!(
            first.admit(&key, 10, 60_000, 5),
            second.admit(&key, 10, 60_000, 5),
        );
        let admitted = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|admission| admission.admitted)
            .count();
        assert_eq!(admitted, 1, "round {round}");
    }
}
