// tests/session_tests.rs
mod common;

use cartsync::{
  AuthEdge, AuthState, CartConfig, CartPhase, CartSession, InMemoryRemoteCart, LocalCartAdapter, MemoryStorage,
  MutationOrdering, RemoteOp, UserIdentity,
};
use common::*;
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

fn signed_in() -> AuthState {
  AuthState::signed_in(UserIdentity::new("user-42"))
}

struct GatedHarness {
  session: Arc<CartSession>,
  gated: Arc<GatedRemote>,
  remote: Arc<InMemoryRemoteCart>,
}

fn gated_harness(ordering: MutationOrdering) -> GatedHarness {
  let remote = catalogue_remote();
  let gated = Arc::new(GatedRemote::new(remote.clone()));
  let config = CartConfig::default().with_mutation_ordering(ordering);
  let session = Arc::new(CartSession::new(config, Arc::new(MemoryStorage::new()), gated.clone()));
  GatedHarness { session, gated, remote }
}

// --- Lifecycle ---

#[tokio::test]
async fn test_first_guest_signal_activates_guest_phase() {
  setup_tracing();
  let h = harness();
  assert_eq!(h.session.phase(), CartPhase::Uninitialized);

  let edge = h.session.handle_auth_change(&AuthState::guest()).await.unwrap();

  assert_eq!(edge, AuthEdge::Unchanged);
  assert_eq!(h.session.phase(), CartPhase::GuestActive);
  assert!(h.remote.journal().is_empty());
}

#[tokio::test]
async fn test_session_starts_from_persisted_guest_cart() {
  setup_tracing();
  let storage = Arc::new(MemoryStorage::new());
  let first = CartSession::new(CartConfig::default(), storage.clone(), catalogue_remote());
  first.add_item(concert_full(), 2).await.unwrap();
  drop(first);

  let second = CartSession::new(CartConfig::default(), storage, catalogue_remote());

  assert_eq!(quantities(&second.store().snapshot()), vec![line("concert-1", "Full", 2)]);
}

#[tokio::test]
async fn test_already_authenticated_at_start_reconciles() {
  setup_tracing();
  let h = harness();
  h.remote.seed_line(theatre_vip(), 1);

  let edge = h.session.handle_auth_change(&signed_in()).await.unwrap();

  assert_eq!(edge, AuthEdge::SignedIn);
  assert_eq!(h.session.phase(), CartPhase::AuthenticatedActive);
  assert_eq!(h.session.user(), Some(UserIdentity::new("user-42")));
  assert_eq!(quantities(&h.session.store().snapshot()), vec![line("theatre-7", "VIP", 1)]);
}

#[tokio::test]
async fn test_repeated_sign_in_signals_reconcile_once() {
  setup_tracing();
  let h = harness();
  h.session.add_item(concert_full(), 1).await.unwrap();

  h.session.handle_auth_change(&signed_in()).await.unwrap();
  for _ in 0..3 {
    let edge = h.session.handle_auth_change(&signed_in()).await.unwrap();
    assert_eq!(edge, AuthEdge::Unchanged);
  }

  assert_eq!(h.remote.call_count(RemoteOp::Add), 1);
  assert_eq!(h.remote.call_count(RemoteOp::Fetch), 2);
}

#[tokio::test]
async fn test_concurrent_sign_in_signals_reconcile_once() {
  setup_tracing();
  let h = harness();
  h.session.add_item(concert_full(), 2).await.unwrap();
  let auth = signed_in();

  let (first, second) = tokio::join!(
    h.session.handle_auth_change(&auth),
    h.session.handle_auth_change(&auth)
  );

  let mut edges = vec![first.unwrap(), second.unwrap()];
  edges.sort_by_key(|edge| *edge == AuthEdge::Unchanged);
  assert_eq!(edges, vec![AuthEdge::SignedIn, AuthEdge::Unchanged]);
  assert_eq!(h.remote.call_count(RemoteOp::Add), 1);
  assert_eq!(remote_quantities(&h.remote), vec![line("concert-1", "Full", 2)]);
}

#[tokio::test]
async fn test_identity_switch_without_sign_out_is_ignored() {
  setup_tracing();
  let h = harness();
  h.session.handle_auth_change(&signed_in()).await.unwrap();
  h.remote.clear_journal();

  let other = AuthState::signed_in(UserIdentity::new("user-7"));
  let edge = h.session.handle_auth_change(&other).await.unwrap();

  assert_eq!(edge, AuthEdge::Unchanged);
  assert_eq!(h.session.user(), Some(UserIdentity::new("user-42")));
  assert!(h.remote.journal().is_empty());
}

#[tokio::test]
async fn test_sign_out_restarts_empty_guest_cart() {
  setup_tracing();
  let h = harness();
  h.session.add_item(concert_full(), 2).await.unwrap();
  h.session.handle_auth_change(&signed_in()).await.unwrap();
  let account_lines = h.remote.lines();

  let edge = h.session.handle_auth_change(&AuthState::guest()).await.unwrap();

  assert_eq!(edge, AuthEdge::SignedOut);
  assert_eq!(h.session.phase(), CartPhase::GuestActive);
  assert_eq!(h.session.user(), None);
  assert!(h.session.store().snapshot().is_empty());
  assert_eq!(h.storage.raw("cart"), None);
  assert_eq!(h.remote.lines(), account_lines, "sign-out must not touch the account cart");
}

#[tokio::test]
async fn test_sign_in_after_sign_out_reconciles_again() {
  setup_tracing();
  let h = harness();
  h.session.add_item(concert_full(), 2).await.unwrap();
  h.session.handle_auth_change(&signed_in()).await.unwrap();
  h.session.handle_auth_change(&AuthState::guest()).await.unwrap();

  h.session.add_item(theatre_vip(), 1).await.unwrap();
  assert!(h.remote.lines().iter().all(|item| item.event_id != "theatre-7"));
  let edge = h.session.handle_auth_change(&signed_in()).await.unwrap();

  assert_eq!(edge, AuthEdge::SignedIn);
  let expected = vec![line("concert-1", "Full", 2), line("theatre-7", "VIP", 1)];
  assert_eq!(quantities(&h.session.store().snapshot()), expected);
  assert_eq!(remote_quantities(&h.remote), expected);
  assert_eq!(h.remote.call_count(RemoteOp::Add), 2);
}

#[tokio::test]
async fn test_sign_out_drops_pending_retry() {
  setup_tracing();
  let h = harness();
  h.session.add_item(concert_full(), 1).await.unwrap();
  h.remote.set_unavailable(true);
  assert!(h.session.handle_auth_change(&signed_in()).await.is_err());
  assert!(h.session.retry_pending());

  h.session.handle_auth_change(&AuthState::guest()).await.unwrap();
  h.remote.set_unavailable(false);

  assert!(!h.session.retry_pending());
  assert_eq!(h.session.retry_reconciliation().await.unwrap(), None);
  assert!(h.session.store().snapshot().is_empty());
}

#[tokio::test]
async fn test_mutation_before_any_auth_signal_runs_as_guest() {
  setup_tracing();
  let h = harness();

  h.session.add_item(concert_half(), 1).await.unwrap();

  assert_eq!(h.session.phase(), CartPhase::GuestActive);
  assert!(h.storage.raw("cart").is_some());
  assert!(h.remote.journal().is_empty());
}

// --- Ordering against the network boundary ---

#[tokio::test]
#[serial]
async fn test_mutation_waits_for_reconciliation() {
  setup_tracing();
  let h = gated_harness(MutationOrdering::Overlapping);
  h.session.add_item(concert_full(), 1).await.unwrap();
  h.gated.hold(RemoteOp::Fetch);

  let signing_in = {
    let session = Arc::clone(&h.session);
    tokio::spawn(async move { session.handle_auth_change(&signed_in()).await })
  };
  wait_until(|| h.gated.entered(RemoteOp::Fetch) == 1).await;
  assert!(h.session.store().is_loading());
  assert_eq!(h.session.phase(), CartPhase::AuthenticatedActive);

  let adding = {
    let session = Arc::clone(&h.session);
    tokio::spawn(async move { session.add_item(theatre_vip(), 1).await })
  };
  tokio::time::sleep(Duration::from_millis(50)).await;
  assert_eq!(h.gated.entered(RemoteOp::Add), 0, "mutation must wait behind the reconciliation");

  h.gated.release(RemoteOp::Fetch, 10);
  assert_eq!(signing_in.await.unwrap().unwrap(), AuthEdge::SignedIn);
  adding.await.unwrap().unwrap();

  // The add ran after the merge, against the account cart.
  let expected = vec![line("concert-1", "Full", 1), line("theatre-7", "VIP", 1)];
  assert_eq!(remote_quantities(&h.remote), expected);
  assert_eq!(quantities(&h.session.store().snapshot()), expected);
  assert!(!h.session.store().is_loading());
}

#[tokio::test]
#[serial]
async fn test_overlapping_mutations_reach_remote_concurrently() {
  setup_tracing();
  let h = gated_harness(MutationOrdering::Overlapping);
  h.session.handle_auth_change(&signed_in()).await.unwrap();
  h.gated.hold(RemoteOp::Add);

  let first = {
    let session = Arc::clone(&h.session);
    tokio::spawn(async move { session.add_item(concert_full(), 1).await })
  };
  let second = {
    let session = Arc::clone(&h.session);
    tokio::spawn(async move { session.add_item(theatre_vip(), 1).await })
  };
  wait_until(|| h.gated.entered(RemoteOp::Add) == 2).await;
  assert!(h.session.store().is_loading());

  h.gated.release(RemoteOp::Add, 2);
  first.await.unwrap().unwrap();
  second.await.unwrap().unwrap();

  assert!(!h.session.store().is_loading());
  let expected = vec![line("concert-1", "Full", 1), line("theatre-7", "VIP", 1)];
  assert_eq!(remote_quantities(&h.remote), expected);
  // Whichever refetch landed last saw both adds.
  assert_eq!(quantities(&h.session.store().snapshot()), expected);
}

#[tokio::test]
#[serial]
async fn test_sequenced_mutations_run_one_at_a_time() {
  setup_tracing();
  let h = gated_harness(MutationOrdering::Sequenced);
  h.session.handle_auth_change(&signed_in()).await.unwrap();
  h.gated.hold(RemoteOp::Add);

  let first = {
    let session = Arc::clone(&h.session);
    tokio::spawn(async move { session.add_item(concert_full(), 1).await })
  };
  wait_until(|| h.gated.entered(RemoteOp::Add) == 1).await;
  let second = {
    let session = Arc::clone(&h.session);
    tokio::spawn(async move { session.add_item(theatre_vip(), 1).await })
  };
  tokio::time::sleep(Duration::from_millis(50)).await;
  assert_eq!(h.gated.entered(RemoteOp::Add), 1, "second mutation must wait for the first");

  h.gated.release(RemoteOp::Add, 2);
  first.await.unwrap().unwrap();
  second.await.unwrap().unwrap();

  assert_eq!(h.gated.entered(RemoteOp::Add), 2);
  assert_eq!(
    quantities(&h.session.store().snapshot()),
    vec![line("concert-1", "Full", 1), line("theatre-7", "VIP", 1)]
  );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_guest_edits_are_all_kept() {
  setup_tracing();
  let h = harness();
  h.session.handle_auth_change(&AuthState::guest()).await.unwrap();

  let mut tasks = Vec::new();
  for round in 0..4 {
    for i in 0..8 {
      let session = Arc::clone(&h.session);
      let ticket = listing(&format!("ev{}-{}", round, i), "Full", 10);
      tasks.push(tokio::spawn(async move { session.add_item(ticket, 1).await }));
    }
  }
  for task in tasks {
    task.await.unwrap().unwrap();
  }

  let snapshot = h.session.store().snapshot();
  assert_eq!(snapshot.len(), 32);
  assert_eq!(snapshot.total_item_count(), 32);
  let persisted = LocalCartAdapter::new(h.storage.clone(), "cart").load();
  assert_eq!(persisted, *snapshot, "persisted guest cart matches the published one");
}
