use std::sync::{atomic::Ordering, Arc};

use futures::future::join_all;

use super::*;
use crate::test_support::{client, identity_for, FakeIdentity, FakeWorld, RECOVERY_TOKEN};

fn bootstrap(world: &FakeWorld, identity: &Arc<FakeIdentity>) -> AdminBootstrap {
    AdminBootstrap::new(client(world, identity), identity.clone())
}

fn principal(name: &str) -> Principal {
    identity_for(name).principal
}

fn snapshot() -> BootstrapSnapshot {
    BootstrapSnapshot {
        identity_initializing: false,
        principal: Some(principal("alice")),
        admin_exists: QueryState::Ready(true),
        caller_is_admin: QueryState::Ready(true),
        latch: ClaimLatch::NotAttempted,
        pending: None,
        login_error: None,
        signing_in: false,
        notice: None,
    }
}

#[test]
fn screen_priority_follows_loading_then_identity() {
    let initializing = BootstrapSnapshot {
        identity_initializing: true,
        ..snapshot()
    };
    assert_eq!(
        initializing.screen(),
        AdminScreen::Checking(CheckingReason::Loading)
    );

    let resetting = BootstrapSnapshot {
        pending: Some(PendingMutation::Reset),
        ..snapshot()
    };
    assert_eq!(
        resetting.screen(),
        AdminScreen::Checking(CheckingReason::Resetting)
    );

    let loading_role = BootstrapSnapshot {
        caller_is_admin: QueryState::Loading,
        ..snapshot()
    };
    assert_eq!(
        loading_role.screen(),
        AdminScreen::Checking(CheckingReason::Loading)
    );

    let due = BootstrapSnapshot {
        admin_exists: QueryState::Ready(false),
        caller_is_admin: QueryState::Ready(false),
        ..snapshot()
    };
    assert!(due.should_auto_claim());
    assert_eq!(
        due.screen(),
        AdminScreen::Checking(CheckingReason::SettingUpAdmin)
    );

    assert_eq!(
        snapshot().screen(),
        AdminScreen::Dashboard {
            principal: principal("alice")
        }
    );
}

#[test]
fn failed_claim_outranks_dashboard() {
    let failed = BootstrapSnapshot {
        latch: ClaimLatch::Failed("Invalid admin token".into()),
        ..snapshot()
    };
    let screen = failed.screen();
    assert_eq!(
        screen,
        AdminScreen::ClaimFailed {
            message: "Invalid admin token".into(),
            notice: None
        }
    );
    assert!(screen.can_reset());
    assert!(!snapshot().screen().can_reset());
}

#[tokio::test]
async fn signed_out_visitor_sees_sign_in() {
    let world = FakeWorld::new();
    let identity = FakeIdentity::signed_out();
    let admin = bootstrap(&world, &identity);

    assert_eq!(
        admin.refresh().await,
        AdminScreen::SignIn {
            login_error: None,
            signing_in: false
        }
    );
    assert_eq!(world.0.lock().await.claim_calls, 0);
}

#[tokio::test]
async fn first_visitor_claims_empty_slot_once() {
    let world = FakeWorld::new();
    let identity = FakeIdentity::signed_in("alice");
    let admin = bootstrap(&world, &identity);

    assert_eq!(
        admin.refresh().await,
        AdminScreen::Dashboard {
            principal: principal("alice")
        }
    );
    assert!(!admin.refresh().await.can_reset());
    let state = world.0.lock().await;
    assert_eq!(state.claim_calls, 1);
    assert_eq!(state.admin, Some(principal("alice")));
}

#[tokio::test]
async fn concurrent_refreshes_claim_at_most_once() {
    let world = FakeWorld::new();
    let identity = FakeIdentity::signed_in("alice");
    let admin = bootstrap(&world, &identity);

    join_all((0..5).map(|_| admin.refresh())).await;
    assert_eq!(world.0.lock().await.claim_calls, 1);
    assert_eq!(
        admin.refresh().await,
        AdminScreen::Dashboard {
            principal: principal("alice")
        }
    );
}

#[tokio::test]
async fn second_visitor_is_denied_without_claiming() {
    let world = FakeWorld::new();
    world.0.lock().await.admin = Some(principal("alice"));
    let identity = FakeIdentity::signed_in("bob");
    let admin = bootstrap(&world, &identity);

    let screen = admin.refresh().await;
    assert_eq!(screen, AdminScreen::Denied { notice: None });
    assert!(screen.can_reset());
    assert_eq!(world.0.lock().await.claim_calls, 0);
}

#[tokio::test]
async fn rejected_claim_is_not_retried_until_asked() {
    let world = FakeWorld::new();
    world.0.lock().await.reject_claims = Some("Invalid admin token".into());
    let identity = FakeIdentity::signed_in("alice");
    let admin = bootstrap(&world, &identity);

    let failed = AdminScreen::ClaimFailed {
        message: "Invalid admin token".into(),
        notice: None,
    };
    assert_eq!(admin.refresh().await, failed);
    assert_eq!(admin.refresh().await, failed);
    assert_eq!(world.0.lock().await.claim_calls, 1);

    world.0.lock().await.reject_claims = None;
    assert_eq!(
        admin.retry().await,
        AdminScreen::Dashboard {
            principal: principal("alice")
        }
    );
    assert_eq!(world.0.lock().await.claim_calls, 2);
}

#[tokio::test]
async fn recovery_token_lets_denied_user_take_over() {
    let world = FakeWorld::new();
    world.0.lock().await.admin = Some(principal("alice"));
    let identity = FakeIdentity::signed_in("bob");
    let admin = bootstrap(&world, &identity);
    admin.refresh().await;

    let screen = admin
        .reset_and_reclaim(Some(RECOVERY_TOKEN))
        .await
        .expect("reset");
    assert_eq!(
        screen,
        AdminScreen::Dashboard {
            principal: principal("bob")
        }
    );
    assert_eq!(world.0.lock().await.admin, Some(principal("bob")));
}

#[tokio::test]
async fn refused_reset_is_shown_as_notice() {
    let world = FakeWorld::new();
    world.0.lock().await.admin = Some(principal("alice"));
    let identity = FakeIdentity::signed_in("bob");
    let admin = bootstrap(&world, &identity);
    admin.refresh().await;

    let screen = admin.reset_and_reclaim(None).await.expect("reset");
    let AdminScreen::Denied {
        notice: Some(notice),
    } = screen
    else {
        panic!("expected denied screen with notice, got {screen:?}");
    };
    assert!(notice.contains("recovery token"));
    assert_eq!(world.0.lock().await.admin, Some(principal("alice")));
}

#[tokio::test]
async fn reset_requires_sign_in() {
    let world = FakeWorld::new();
    let identity = FakeIdentity::signed_out();
    let admin = bootstrap(&world, &identity);

    assert!(matches!(
        admin.reset_and_reclaim(None).await,
        Err(ClientError::NotAuthenticated)
    ));
    assert_eq!(world.0.lock().await.reset_calls, 0);
}

#[tokio::test]
async fn blocked_popup_is_reported_on_sign_in_screen() {
    let world = FakeWorld::new();
    let identity = FakeIdentity::signed_out();
    identity.queue_login(Err(LoginError::PopupBlocked)).await;
    let admin = bootstrap(&world, &identity);

    assert_eq!(
        admin.sign_in().await,
        AdminScreen::SignIn {
            login_error: Some(POPUP_BLOCKED_MESSAGE.to_string()),
            signing_in: false
        }
    );
}

#[tokio::test(start_paused = true)]
async fn stale_session_is_cleared_and_login_retried() {
    let world = FakeWorld::new();
    let identity = FakeIdentity::signed_in("alice");
    identity.queue_login(Ok(identity_for("alice"))).await;
    let admin = bootstrap(&world, &identity);

    assert_eq!(
        admin.sign_in().await,
        AdminScreen::Dashboard {
            principal: principal("alice")
        }
    );
    assert_eq!(identity.clears.load(Ordering::SeqCst), 1);
    assert_eq!(identity.logins_attempted.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn new_identity_gets_a_fresh_claim_attempt() {
    let world = FakeWorld::new();
    world.0.lock().await.reject_claims = Some("Invalid admin token".into());
    let identity = FakeIdentity::signed_in("alice");
    let admin = bootstrap(&world, &identity);
    assert!(matches!(
        admin.refresh().await,
        AdminScreen::ClaimFailed { .. }
    ));

    world.0.lock().await.reject_claims = None;
    identity.switch_to(Some("bob")).await;
    assert_eq!(
        admin.refresh().await,
        AdminScreen::Dashboard {
            principal: principal("bob")
        }
    );
    assert_eq!(world.0.lock().await.claim_calls, 2);
}

#[tokio::test]
async fn unreachable_backend_shows_unavailable() {
    let world = FakeWorld::new();
    world.0.lock().await.offline = true;
    let identity = FakeIdentity::signed_in("alice");
    let admin = bootstrap(&world, &identity);

    assert!(matches!(
        admin.refresh().await,
        AdminScreen::Unavailable { .. }
    ));
    assert_eq!(world.0.lock().await.claim_calls, 0);
}

#[tokio::test]
async fn sign_out_returns_to_sign_in() {
    let world = FakeWorld::new();
    let identity = FakeIdentity::signed_in("alice");
    let admin = bootstrap(&world, &identity);
    admin.refresh().await;

    assert_eq!(
        admin.sign_out().await,
        AdminScreen::SignIn {
            login_error: None,
            signing_in: false
        }
    );
    assert!(identity.identity().await.is_none());
}

#[tokio::test]
async fn takeover_scenario_moves_dashboard_between_users() {
    let world = FakeWorld::new();
    let alice_identity = FakeIdentity::signed_in("alice");
    let bob_identity = FakeIdentity::signed_in("bob");
    let alice = bootstrap(&world, &alice_identity);
    let bob = bootstrap(&world, &bob_identity);

    assert_eq!(
        alice.refresh().await,
        AdminScreen::Dashboard {
            principal: principal("alice")
        }
    );
    assert_eq!(bob.refresh().await, AdminScreen::Denied { notice: None });

    assert_eq!(
        bob.reset_and_reclaim(Some(RECOVERY_TOKEN))
            .await
            .expect("reset"),
        AdminScreen::Dashboard {
            principal: principal("bob")
        }
    );
    assert_eq!(alice.refresh().await, AdminScreen::Denied { notice: None });
    assert_eq!(world.0.lock().await.claim_calls, 2);
}
