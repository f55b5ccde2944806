//! Background work: stale purges and expiry warnings.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use vigil::jobs::{
    check_all_expirations, dispatch_expiration_checks, ChannelNotifier, ExpiringNotifier,
    PurgeStaleSecretsJob,
};
use vigil::storage::SecretQuery;

async fn stored_count(context: &vigil::AppContext, owner: &vigil::domain::OwnerRef) -> i64 {
    let query = SecretQuery::all().for_owner(&owner.owner_type, owner.id().unwrap());
    context.engine.repository().count(&query).await.unwrap()
}

#[tokio::test]
async fn purge_keeps_the_history_window() {
    let context = test_context(vec![password_type()]).await;
    let owner = user("1");

    let mut inserted = Vec::new();
    for (index, age) in (15..=20).rev().enumerate() {
        let value = format!("PurgeCandidate{}A", index);
        inserted.push(insert_at(&context, &owner, "password", &value, days_ago(age)).await);
    }
    assert_eq!(stored_count(&context, &owner).await, 6);

    let purged = context.engine.purge_stale_secrets(&owner).await.unwrap();
    assert_eq!(purged, 2);
    assert_eq!(stored_count(&context, &owner).await, 4);

    // The two oldest are gone; the newest is still the active one.
    let repository = context.engine.repository();
    assert!(repository.find_by_uuid(&inserted[0].uuid, true).await.unwrap().is_none());
    assert!(repository.find_by_uuid(&inserted[1].uuid, true).await.unwrap().is_none());
    let active = context.engine.get_active_secret(&owner, "password", true, false).await.unwrap().unwrap();
    assert_eq!(active.id, inserted[5].id);

    assert_eq!(context.engine.purge_stale_secrets(&owner).await.unwrap(), 0);
}

#[tokio::test]
async fn purge_backfills_the_window_with_stale_records() {
    let context = test_context(vec![password_type()]).await;
    let owner = user("2");

    // Two expired records and one active one: all fit inside a window of four.
    insert_at(&context, &owner, "password", "ExpiredValue1A", days_ago(120)).await;
    insert_at(&context, &owner, "password", "ExpiredValue2B", days_ago(100)).await;
    insert_at(&context, &owner, "password", STRONG_PASSWORD, days_ago(1)).await;

    assert_eq!(context.engine.purge_stale_secrets(&owner).await.unwrap(), 0);
    assert_eq!(stored_count(&context, &owner).await, 3);

    let trashed = insert_at(&context, &owner, "password", "TrashedValue3C", days_ago(110)).await;
    context.engine.repository().soft_delete(trashed.id, chrono::Utc::now()).await.unwrap();
    insert_at(&context, &owner, "password", "ExpiredValue4D", days_ago(95)).await;

    // Five records, window of four: the oldest one by id goes.
    assert_eq!(context.engine.purge_stale_secrets(&owner).await.unwrap(), 1);
    assert_eq!(stored_count(&context, &owner).await, 4);
}

#[tokio::test]
async fn purge_never_touches_other_owners() {
    let context = test_context(vec![pin_type()]).await;
    let owner = user("3");
    let neighbour = user("4");

    for (index, age) in (1..=6).rev().enumerate() {
        insert_at(&context, &owner, "pin", &format!("10{:02}", index), days_ago(age)).await;
        insert_at(&context, &neighbour, "pin", &format!("20{:02}", index), days_ago(age)).await;
    }

    assert_eq!(context.engine.purge_stale_secrets(&owner).await.unwrap(), 2);
    assert_eq!(stored_count(&context, &neighbour).await, 6);
}

#[tokio::test]
async fn purge_skips_types_without_a_retention_window() {
    let mut pin = pin_type();
    pin.max_active_count = Some(0);
    pin.max_history_count = None;
    let context = test_context(vec![pin]).await;
    let owner = user("8");

    store(&context, &owner, "pin", "4821").await;
    assert_eq!(context.engine.purge_stale_secrets(&owner).await.unwrap(), 0);
    assert_eq!(stored_count(&context, &owner).await, 1);
}

#[tokio::test]
async fn scheduled_purge_runs_once_per_owner() {
    let mut config = test_config(vec![password_type()]);
    config.purge_stale_after = Some("0s".to_string());
    let context = context_with(config).await;
    let owner = user("5");

    for (index, age) in (10..=15).rev().enumerate() {
        insert_at(&context, &owner, "password", &format!("ScheduledValue{}A", index), days_ago(age)).await;
    }

    assert!(context.engine.purge_user_stale_secrets(&owner));
    assert!(!context.engine.purge_user_stale_secrets(&owner));

    for _ in 0..100 {
        if stored_count(&context, &owner).await == 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(stored_count(&context, &owner).await, 4);
    context.scheduler.shutdown().await;
}

#[tokio::test]
async fn purge_scheduling_is_off_without_a_grace_period() {
    let mut config = test_config(vec![password_type()]);
    config.purge_stale_after = None;
    let context = context_with(config).await;

    assert!(!context.engine.purge_user_stale_secrets(&user("6")));
    assert_eq!(context.scheduler.pending_count(), 0);
}

#[tokio::test]
async fn purge_job_runs_inline() {
    let context = test_context(vec![pin_type()]).await;
    let owner = user("7");
    for (index, age) in (1..=5).rev().enumerate() {
        insert_at(&context, &owner, "pin", &format!("55{:02}", index), days_ago(age)).await;
    }

    let job = PurgeStaleSecretsJob::new(Arc::clone(&context.engine), owner.clone());
    context.scheduler.run_now(&job).await.unwrap();
    assert_eq!(stored_count(&context, &owner).await, 4);
}

#[tokio::test]
async fn expiring_secrets_inside_the_window_are_notified() {
    let context = test_context(vec![password_type(), pin_type()]).await;
    let (notifier, mut events) = ChannelNotifier::new();
    let notifier: Arc<dyn ExpiringNotifier> = Arc::new(notifier);

    let soon = insert_at(&context, &user("1"), "password", "ExpiringSoon81", days_ago(81)).await;
    insert_at(&context, &user("2"), "password", "AlreadyExpired100", days_ago(100)).await;
    insert_at(&context, &user("3"), "password", "StillFresh10Days", days_ago(10)).await;

    let results = check_all_expirations(&context.engine, &notifier).await.unwrap();
    assert_eq!(results, vec![("password".to_string(), 1)]);

    let event = events.try_recv().expect("one notification");
    assert_eq!(event.uuid, soon.uuid);
    assert_eq!(event.owner, user("1"));
    assert_eq!(event.type_key, "password");
    assert!(events.try_recv().is_err());

    // The expired record is not active any more.
    assert!(context
        .engine
        .get_active_secrets(&user("2"), "password", false, false)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn expiration_checks_are_queued_per_type() {
    let context = test_context(vec![password_type(), pin_type()]).await;
    let (notifier, mut events) = ChannelNotifier::new();
    let notifier: Arc<dyn ExpiringNotifier> = Arc::new(notifier);

    insert_at(&context, &user("1"), "password", "ExpiringSoon85", days_ago(85)).await;

    // Only `password` warns before expiry.
    assert_eq!(dispatch_expiration_checks(&context.scheduler, &context.engine, &notifier), 1);

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("notification in time")
        .expect("channel open");
    assert_eq!(event.owner, user("1"));
    context.scheduler.shutdown().await;
}
