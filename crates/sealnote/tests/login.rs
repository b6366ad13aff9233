//! Registration and challenge-response login, end to end.

mod common;

use std::sync::Arc;

use chrono::Duration;
use sealnote::store::Store;
use sealnote::{Clock, ErrorKind, LoginRequest, ServiceError};
use sealnote_testkit::fixtures::TestUser;

use common::{for_each_store, Env};

for_each_store!(
    login_then_replay_fails,
    expired_challenge_rejected_with_valid_signature,
    bad_signature_keeps_challenge,
    decoy_challenge_has_same_shape,
    duplicate_email_rejected,
    racing_logins_yield_one_session,
    sweep_races_with_consume,
    deleted_account_cannot_log_in,
);

async fn login_then_replay_fails<S: Store + 'static>(env: Env<S>) {
    let ada = TestUser::new(1, "Ada@Example.com");
    let registered = env.register(&ada).await;
    assert_eq!(registered.email, "ada@example.com");

    let issued = env.service.issue_challenge("ada@example.com").await.unwrap();
    assert_eq!(issued.login_salt, ada.login_salt());
    let request = ada.login_request(&issued.challenge);

    let outcome = env.service.complete_login(&request).await.unwrap();
    assert_eq!(outcome.user, registered);
    assert_eq!(
        env.service.resolve_session(&outcome.session.token).unwrap(),
        registered.id
    );
    assert_eq!(
        outcome.session.expires_at,
        env.clock.now() + env.service.config().session_ttl
    );

    let replay = env.service.complete_login(&request).await.unwrap_err();
    assert!(matches!(replay, ServiceError::ChallengeNotFound));
    assert_eq!(replay.kind(), ErrorKind::Unauthorized);
}

async fn expired_challenge_rejected_with_valid_signature<S: Store + 'static>(env: Env<S>) {
    let ada = TestUser::new(1, "ada@example.com");
    env.register(&ada).await;

    let issued = env.service.issue_challenge(&ada.email).await.unwrap();
    let request = ada.login_request(&issued.challenge);

    env.clock.set(issued.expires_at + Duration::seconds(1));
    assert!(matches!(
        env.service.complete_login(&request).await,
        Err(ServiceError::ChallengeExpired)
    ));
}

async fn bad_signature_keeps_challenge<S: Store + 'static>(env: Env<S>) {
    let ada = TestUser::new(1, "ada@example.com");
    let eve = TestUser::new(2, "eve@example.com");
    env.register(&ada).await;

    let issued = env.service.issue_challenge(&ada.email).await.unwrap();
    let forged = LoginRequest {
        email: ada.email.clone(),
        ..eve.login_request(&issued.challenge)
    };
    assert!(matches!(
        env.service.complete_login(&forged).await,
        Err(ServiceError::SignatureInvalid)
    ));

    // Undecodable signature of the right length
    let garbage = LoginRequest {
        signature: "!".repeat(88),
        ..ada.login_request(&issued.challenge)
    };
    assert!(matches!(
        env.service.complete_login(&garbage).await,
        Err(ServiceError::SignatureInvalid)
    ));

    env.service
        .complete_login(&ada.login_request(&issued.challenge))
        .await
        .unwrap();
}

async fn decoy_challenge_has_same_shape<S: Store + 'static>(env: Env<S>) {
    let ada = TestUser::new(1, "ada@example.com");
    env.register(&ada).await;

    let real = env.service.issue_challenge(&ada.email).await.unwrap();
    let decoy = env.service.issue_challenge("ghost@example.com").await.unwrap();

    let real_json = serde_json::to_value(&real).unwrap();
    let decoy_json = serde_json::to_value(&decoy).unwrap();
    for field in ["challenge", "login_salt", "expires_at"] {
        assert_eq!(
            real_json[field].as_str().unwrap().len(),
            decoy_json[field].as_str().unwrap().len(),
            "{field}"
        );
    }
    assert_ne!(decoy.login_salt, real.login_salt);

    // Nothing to log in with
    let ghost = TestUser::new(9, "ghost@example.com");
    assert!(matches!(
        env.service
            .complete_login(&ghost.login_request(&decoy.challenge))
            .await,
        Err(ServiceError::ChallengeNotFound)
    ));
}

async fn duplicate_email_rejected<S: Store + 'static>(env: Env<S>) {
    let ada = TestUser::new(1, "ada@example.com");
    env.register(&ada).await;

    let shouting = TestUser::new(2, " ADA@example.com ");
    let err = env
        .service
        .register_user(&shouting.registration())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateEmail));
}

async fn racing_logins_yield_one_session<S: Store + 'static>(env: Env<S>) {
    let ada = TestUser::new(1, "ada@example.com");
    env.register(&ada).await;

    let issued = env.service.issue_challenge(&ada.email).await.unwrap();
    let request = Arc::new(ada.login_request(&issued.challenge));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = env.service.clone();
            let request = request.clone();
            tokio::spawn(async move { service.complete_login(&request).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(ServiceError::ChallengeNotFound | ServiceError::ChallengeAlreadyUsed) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(successes, 1);
}

async fn sweep_races_with_consume<S: Store + 'static>(env: Env<S>) {
    let ada = TestUser::new(1, "ada@example.com");
    env.register(&ada).await;

    let stale = env.service.issue_challenge(&ada.email).await.unwrap();
    env.clock.advance(Duration::minutes(6));
    let live = env.service.issue_challenge(&ada.email).await.unwrap();

    let login = {
        let service = env.service.clone();
        let request = ada.login_request(&live.challenge);
        tokio::spawn(async move { service.complete_login(&request).await })
    };
    let sweeps: Vec<_> = (0..4)
        .map(|_| {
            let service = env.service.clone();
            tokio::spawn(async move { service.sweep_expired().await })
        })
        .collect();

    login.await.unwrap().unwrap();
    let mut swept = 0;
    for sweep in sweeps {
        swept += sweep.await.unwrap().unwrap();
    }
    assert_eq!(swept, 1);

    assert!(matches!(
        env.service
            .complete_login(&ada.login_request(&stale.challenge))
            .await,
        Err(ServiceError::ChallengeNotFound)
    ));
}

async fn deleted_account_cannot_log_in<S: Store + 'static>(env: Env<S>) {
    let ada = TestUser::new(1, "ada@example.com");
    let user = env.register(&ada).await;
    let issued = env.service.issue_challenge(&ada.email).await.unwrap();

    env.service.delete_account(user.id).await.unwrap();
    assert!(matches!(
        env.service.delete_account(user.id).await,
        Err(ServiceError::UserNotFound(_))
    ));
    assert!(matches!(
        env.service
            .complete_login(&ada.login_request(&issued.challenge))
            .await,
        Err(ServiceError::ChallengeNotFound)
    ));

    // The email is free again
    env.register(&ada).await;
}
