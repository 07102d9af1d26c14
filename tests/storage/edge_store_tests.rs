//! Edge store primitive tests.
//!
//! Every test seeds its own users, so all of them can share one database.

use uuid::Uuid;

use socialgraph::graph::EdgeState;
use socialgraph::storage::SqliteEdgeStore;
use socialgraph::test_utils::seed_user;

async fn user(store: &SqliteEdgeStore, handle: &str) -> Uuid {
    let handle = format!("{}-{}", handle, Uuid::new_v4());
    seed_user(store, &handle, None)
        .await
        .expect("seed user should succeed")
}

async fn user_with_external_id(store: &SqliteEdgeStore, external_id: &str) -> Uuid {
    let handle = format!("user-{}", Uuid::new_v4());
    seed_user(store, &handle, Some(external_id))
        .await
        .expect("seed user should succeed")
}

// =============================================================================
// Users
// =============================================================================

pub async fn test_find_user_id_by_handle(store: &SqliteEdgeStore) {
    let handle = format!("handle-{}", Uuid::new_v4());
    let id = seed_user(store, &handle, None).await.unwrap();
    let mut conn = store.pool().acquire().await.unwrap();

    assert_eq!(
        store.find_user_id_by_handle(&mut conn, &handle).await.unwrap(),
        Some(id)
    );
    assert_eq!(
        store
            .find_user_id_by_handle(&mut conn, "no-such-handle")
            .await
            .unwrap(),
        None
    );
    assert!(store.user_exists(&mut conn, id).await.unwrap());
    assert!(!store.user_exists(&mut conn, Uuid::new_v4()).await.unwrap());
}

pub async fn test_lookup_users_by_external_ids(store: &SqliteEdgeStore) {
    let suffix = Uuid::new_v4();
    let a = user_with_external_id(store, &format!("ext-a-{}", suffix)).await;
    let b = user_with_external_id(store, &format!("ext-b-{}", suffix)).await;
    let mut conn = store.pool().acquire().await.unwrap();

    let mut found = store
        .lookup_users_by_external_ids(
            &mut conn,
            &[
                format!("ext-a-{}", suffix),
                format!("ext-b-{}", suffix),
                format!("ext-a-{}", suffix),
                format!("ext-missing-{}", suffix),
            ],
        )
        .await
        .unwrap();
    found.sort();
    let mut expected = vec![a, b];
    expected.sort();

    assert_eq!(found, expected, "unmatched ids dropped, duplicates collapsed");
    assert!(store
        .lookup_users_by_external_ids(&mut conn, &[])
        .await
        .unwrap()
        .is_empty());
}

// =============================================================================
// Edges
// =============================================================================

pub async fn test_insert_edge_if_absent(store: &SqliteEdgeStore) {
    let a = user(store, "a").await;
    let b = user(store, "b").await;
    let mut conn = store.pool().acquire().await.unwrap();

    assert!(store.insert_edge_if_absent(&mut conn, a, b, 10).await.unwrap());
    assert!(!store.insert_edge_if_absent(&mut conn, a, b, 20).await.unwrap());

    let edge = store.get_edge(&mut conn, a, b).await.unwrap().unwrap();
    assert_eq!(edge.position, 10, "existing row untouched");
    assert_eq!(edge.state, EdgeState::Connected);
    assert!(store.get_edge(&mut conn, b, a).await.unwrap().is_none());
}

pub async fn test_insert_mirrored_edges(store: &SqliteEdgeStore) {
    let a = user(store, "a").await;
    let b = user(store, "b").await;
    let c = user(store, "c").await;
    let mut conn = store.pool().acquire().await.unwrap();

    store
        .insert_mirrored_edges(&mut conn, a, &[b, c], 5)
        .await
        .unwrap();

    for peer in [b, c] {
        assert!(store.get_edge(&mut conn, a, peer).await.unwrap().is_some());
        assert!(store.get_edge(&mut conn, peer, a).await.unwrap().is_some());
    }

    let again = store.insert_mirrored_edges(&mut conn, a, &[b], 6).await;
    assert!(again.is_err(), "duplicate pair violates the primary key");
}

pub async fn test_delete_edge_unless_blocked(store: &SqliteEdgeStore) {
    let a = user(store, "a").await;
    let b = user(store, "b").await;
    let c = user(store, "c").await;
    let mut conn = store.pool().acquire().await.unwrap();

    store.insert_edge_if_absent(&mut conn, a, b, 1).await.unwrap();
    store.insert_edge_if_absent(&mut conn, a, c, 1).await.unwrap();
    assert!(store
        .set_state(&mut conn, a, c, EdgeState::Blocked, 2)
        .await
        .unwrap());

    assert!(store.delete_edge_unless_blocked(&mut conn, a, b).await.unwrap());
    assert!(!store.delete_edge_unless_blocked(&mut conn, a, c).await.unwrap());
    assert!(!store.delete_edge_unless_blocked(&mut conn, a, b).await.unwrap());

    let blocked = store.get_edge(&mut conn, a, c).await.unwrap().unwrap();
    assert_eq!(blocked.state, EdgeState::Blocked);
    assert_eq!(blocked.updated_at, 2);
    assert_eq!(blocked.position, 1);

    assert!(store.delete_edge(&mut conn, a, c).await.unwrap());
    assert!(!store.delete_edge(&mut conn, a, c).await.unwrap());
}

pub async fn test_set_state_missing_row(store: &SqliteEdgeStore) {
    let a = user(store, "a").await;
    let b = user(store, "b").await;
    let mut conn = store.pool().acquire().await.unwrap();

    assert!(!store
        .set_state(&mut conn, a, b, EdgeState::Blocked, 1)
        .await
        .unwrap());
    assert!(store.get_edge(&mut conn, a, b).await.unwrap().is_none());
}

pub async fn test_related_peers(store: &SqliteEdgeStore) {
    let a = user(store, "a").await;
    let outgoing = user(store, "out").await;
    let incoming = user(store, "in").await;
    let blocked_by = user(store, "blocker").await;
    let stranger = user(store, "stranger").await;
    let mut conn = store.pool().acquire().await.unwrap();

    store.insert_edge_if_absent(&mut conn, a, outgoing, 1).await.unwrap();
    store.insert_edge_if_absent(&mut conn, incoming, a, 1).await.unwrap();
    store.insert_edge_if_absent(&mut conn, blocked_by, a, 1).await.unwrap();
    store
        .set_state(&mut conn, blocked_by, a, EdgeState::Blocked, 1)
        .await
        .unwrap();

    let related = store
        .related_peers(&mut conn, a, &[outgoing, incoming, blocked_by, stranger])
        .await
        .unwrap();

    assert_eq!(related.len(), 3);
    assert!(related.contains(&outgoing));
    assert!(related.contains(&incoming));
    assert!(related.contains(&blocked_by));
    assert!(!related.contains(&stranger));
}

// =============================================================================
// Counters
// =============================================================================

pub async fn test_counters(store: &SqliteEdgeStore) {
    let a = user(store, "a").await;
    let b = user(store, "b").await;
    let mut conn = store.pool().acquire().await.unwrap();

    assert_eq!(store.edge_count(&mut conn, a).await.unwrap(), 0);
    assert!(store.get_edge_metadata(&mut conn, a).await.unwrap().is_none());

    store.increment_counts(&mut conn, &[a, b], 1, 1).await.unwrap();
    store.increment_counts(&mut conn, &[a], 3, 2).await.unwrap();
    assert_eq!(store.edge_count(&mut conn, a).await.unwrap(), 4);
    assert_eq!(store.edge_count(&mut conn, b).await.unwrap(), 1);
    let metadata = store.get_edge_metadata(&mut conn, a).await.unwrap().unwrap();
    assert_eq!(metadata.count, 4);
    assert_eq!(metadata.updated_at, 2, "upsert refreshes updated_at");

    store.decrement_counts(&mut conn, &[a, b], 3).await.unwrap();
    store.decrement_count(&mut conn, a, 4).await.unwrap();
    assert_eq!(store.edge_count(&mut conn, a).await.unwrap(), 2);
    assert_eq!(store.edge_count(&mut conn, b).await.unwrap(), 0);
}

// =============================================================================
// Transactions and listing
// =============================================================================

pub async fn test_uncommitted_transaction_discarded(store: &SqliteEdgeStore) {
    let a = user(store, "a").await;
    let b = user(store, "b").await;

    {
        let mut tx = store.begin().await.unwrap();
        store.insert_edge_if_absent(&mut tx, a, b, 1).await.unwrap();
        store.increment_counts(&mut tx, &[a], 1, 1).await.unwrap();
        tx.rollback().await.unwrap();
    }

    let mut conn = store.pool().acquire().await.unwrap();
    assert!(store.get_edge(&mut conn, a, b).await.unwrap().is_none());
    assert_eq!(store.edge_count(&mut conn, a).await.unwrap(), 0);
}

pub async fn test_list_friends_order(store: &SqliteEdgeStore) {
    let a = user(store, "a").await;
    let first = user(store, "first").await;
    let second = user(store, "second").await;
    let third = user(store, "third").await;

    {
        let mut conn = store.pool().acquire().await.unwrap();
        store.insert_edge_if_absent(&mut conn, a, second, 20).await.unwrap();
        store.insert_edge_if_absent(&mut conn, a, first, 10).await.unwrap();
        store.insert_edge_if_absent(&mut conn, a, third, 20).await.unwrap();
        store
            .set_state(&mut conn, a, third, EdgeState::Blocked, 30)
            .await
            .unwrap();
    }

    let friends = store.list_friends(a).await.unwrap();
    let ids: Vec<Uuid> = friends.iter().map(|f| f.user.id).collect();

    assert_eq!(ids, vec![first, second, third], "position, then insertion");
    assert_eq!(friends[2].state, EdgeState::Blocked);
    assert!(friends[0].user.handle.starts_with("first-"));
    assert!(friends[0].user.fullname.ends_with(" fullname"));
}

#[macro_export]
macro_rules! run_edge_store_tests {
    ($store:expr) => {
        use $crate::storage::edge_store_tests::*;

        test_find_user_id_by_handle($store).await;
        println!("  test_find_user_id_by_handle: PASSED");

        test_lookup_users_by_external_ids($store).await;
        println!("  test_lookup_users_by_external_ids: PASSED");

        test_insert_edge_if_absent($store).await;
        println!("  test_insert_edge_if_absent: PASSED");

        test_insert_mirrored_edges($store).await;
        println!("  test_insert_mirrored_edges: PASSED");

        test_delete_edge_unless_blocked($store).await;
        println!("  test_delete_edge_unless_blocked: PASSED");

        test_set_state_missing_row($store).await;
        println!("  test_set_state_missing_row: PASSED");

        test_related_peers($store).await;
        println!("  test_related_peers: PASSED");

        test_counters($store).await;
        println!("  test_counters: PASSED");

        test_uncommitted_transaction_discarded($store).await;
        println!("  test_uncommitted_transaction_discarded: PASSED");

        test_list_friends_order($store).await;
        println!("  test_list_friends_order: PASSED");
    };
}
