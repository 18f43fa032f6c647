//! Gateway notifications and the subscription lifetime.

use super::harness::*;
use crate::AuthStatus;

#[tokio::test]
async fn test_replay_on_construction_sets_user_only() {
    let gateway = MockGateway::new();
    gateway.set_replay(Some(alice()));
    let h = TestHarness::with_gateway(gateway);

    let state = h.machine.snapshot();
    assert!(state.is_authenticated());
    assert_eq!(state.user().unwrap().id, "u1");
    assert_eq!(state.status(), AuthStatus::Idle);
}

#[tokio::test]
async fn test_no_identity_notification_keeps_status() {
    let h = TestHarness::signed_in_as(alice());
    h.machine.initialize().await.unwrap();

    h.gateway.emit(None);

    let state = h.machine.snapshot();
    assert!(!state.is_authenticated());
    assert_eq!(state.status(), AuthStatus::Success);
}

#[tokio::test]
async fn test_identity_notification_keeps_status_and_error() {
    let h = TestHarness::new();
    h.machine.initialize().await.unwrap();
    let error = h.machine.snapshot().error().map(str::to_string);

    h.gateway.emit(Some(bob()));

    let state = h.machine.snapshot();
    assert_eq!(state.user().unwrap().id, "u2");
    assert_eq!(state.status(), AuthStatus::Error);
    assert_eq!(state.error().map(str::to_string), error);
}

#[tokio::test]
async fn test_repeated_notification_wakes_readers_once() {
    let h = TestHarness::new();
    let mut rx = h.machine.subscribe();

    h.gateway.emit(Some(alice()));
    assert!(rx.has_changed().unwrap());
    let first = rx.borrow_and_update().clone();

    h.gateway.emit(Some(alice()));
    assert!(!rx.has_changed().unwrap());
    assert_eq!(h.machine.snapshot(), first);
}

#[tokio::test]
async fn test_identity_replaced_wholesale() {
    let h = TestHarness::new();
    h.gateway.emit(Some(alice()));
    h.gateway.emit(Some(bob()));

    let state = h.machine.snapshot();
    let user = state.user().unwrap();
    assert_eq!((user.id.as_str(), user.email.as_str()), ("u2", "b@x.com"));
}

#[tokio::test]
async fn test_clear_error_without_error_does_not_wake() {
    let h = TestHarness::new();
    let mut rx = h.machine.subscribe();

    h.machine.clear_error();

    assert!(!rx.has_changed().unwrap());
    let _ = rx.borrow_and_update();
}

#[tokio::test]
async fn test_shutdown_releases_subscription_once() {
    let h = TestHarness::new();
    assert_eq!(h.gateway.observer_count(), 1);

    h.machine.shutdown();
    h.machine.shutdown();

    assert_eq!(h.gateway.releases(), 1);
    assert_eq!(h.gateway.observer_count(), 0);

    let TestHarness { gateway, machine } = h;
    drop(machine);
    assert_eq!(gateway.releases(), 1);
}

#[tokio::test]
async fn test_drop_releases_subscription() {
    let TestHarness { gateway, machine } = TestHarness::new();

    drop(machine);

    assert_eq!(gateway.releases(), 1);
    assert_eq!(gateway.observer_count(), 0);
}

#[tokio::test]
async fn test_notifications_ignored_after_shutdown() {
    let h = TestHarness::new();
    h.machine.shutdown();

    h.gateway.emit(Some(alice()));

    assert!(!h.machine.snapshot().is_authenticated());
}
