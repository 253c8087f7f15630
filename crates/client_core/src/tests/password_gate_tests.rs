use shared::domain::Principal;

use super::*;
use crate::test_support::{client, FakeIdentity, FakeWorld};

fn secret(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

async fn protected_world(password: &str) -> FakeWorld {
    let world = FakeWorld::new();
    {
        let mut state = world.0.lock().await;
        state.admin = Some(Principal::new("alice-principal"));
        state.password = Some(password.to_string());
    }
    world
}

#[tokio::test]
async fn unprotected_press_kit_is_open() {
    let world = FakeWorld::new();
    let gate = PasswordGate::new(client(&world, &FakeIdentity::signed_out()));
    assert_eq!(gate.state().await, GateState::Open);
}

#[tokio::test]
async fn correct_password_unlocks_for_the_session() {
    let world = protected_world("p1").await;
    let gate = PasswordGate::new(client(&world, &FakeIdentity::signed_out()));
    assert_eq!(gate.state().await, GateState::Locked { error: None });

    assert_eq!(gate.verify(&secret("p1")).await, GateState::Open);
    assert!(gate.is_verified());
    assert_eq!(gate.state().await, GateState::Open);
}

#[tokio::test]
async fn wrong_password_stays_locked_with_message() {
    let world = protected_world("p1").await;
    let gate = PasswordGate::new(client(&world, &FakeIdentity::signed_out()));

    assert_eq!(
        gate.verify(&secret("p2")).await,
        GateState::Locked {
            error: Some(INCORRECT_PASSWORD_MESSAGE.to_string())
        }
    );
    assert!(!gate.is_verified());
}

#[tokio::test]
async fn new_gate_starts_locked_again() {
    let world = protected_world("p1").await;
    let first = PasswordGate::new(client(&world, &FakeIdentity::signed_out()));
    first.verify(&secret("p1")).await;

    let second = PasswordGate::new(client(&world, &FakeIdentity::signed_out()));
    assert_eq!(second.state().await, GateState::Locked { error: None });
}

#[tokio::test]
async fn failed_protection_check_keeps_the_gate_closed() {
    let world = protected_world("p1").await;
    world.0.lock().await.offline = true;
    let gate = PasswordGate::new(client(&world, &FakeIdentity::signed_out()));

    assert_eq!(
        gate.state().await,
        GateState::Locked {
            error: Some(CHECK_FAILED_MESSAGE.to_string())
        }
    );
    assert_eq!(
        gate.verify(&secret("p1")).await,
        GateState::Locked {
            error: Some(VERIFY_FAILED_MESSAGE.to_string())
        }
    );
}
