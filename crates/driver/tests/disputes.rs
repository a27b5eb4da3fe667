//! End to end dispute scenarios, played by the drivers against a local settlement layer.

mod common;

use common::{assert_resolved, TestContext, TEST_CHALLENGE_PERIOD, TEST_TIMEOUT};
use exec_challenger_driver::{DisputeOutcome, DisputeScheduler, Driver};
use exec_challenger_solvers::execution::{
    Actor, ChallengeError, FixedSegmentStrategy, MoveAction, MoveKind, Role,
};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn honest_asserter_wins_by_timeout() {
    let ctx = TestContext::new(500, None).await;
    let id = ctx.dispute.id();
    let mut scheduler = DisputeScheduler::new();
    scheduler
        .start(id, Role::Asserter, ctx.asserter_driver())
        .unwrap();
    scheduler
        .start(id, Role::Challenger, ctx.challenger_driver())
        .unwrap();

    let challenger = timeout(TEST_TIMEOUT, scheduler.join(id, Role::Challenger))
        .await
        .unwrap();
    assert_eq!(
        challenger.unwrap_err().downcast_ref::<ChallengeError>(),
        Some(&ChallengeError::DisagreementNotFound)
    );

    let asserter = timeout(TEST_TIMEOUT, scheduler.join(id, Role::Asserter))
        .await
        .unwrap();
    assert_resolved(asserter, Role::Asserter);

    let log = ctx.log().await;
    let kinds = log.iter().map(|m| m.action.kind()).collect::<Vec<_>>();
    assert_eq!(kinds, vec![MoveKind::Bisect, MoveKind::Timeout]);
    assert_eq!(log[1].actor, Actor::Party(Role::Asserter));
    assert!(log[1].block_number > log[0].block_number + TEST_CHALLENGE_PERIOD);
    assert_eq!(ctx.winner().await, Some(Role::Asserter));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn faulty_asserter_is_caught_at_the_faulty_step() {
    let ctx = TestContext::new(500, Some(250)).await;
    let id = ctx.dispute.id();
    let mut scheduler = DisputeScheduler::new();
    scheduler
        .start(id, Role::Asserter, ctx.asserter_driver())
        .unwrap();
    scheduler
        .start(id, Role::Challenger, ctx.challenger_driver())
        .unwrap();

    for role in [Role::Asserter, Role::Challenger] {
        let outcome = timeout(TEST_TIMEOUT, scheduler.join(id, role))
            .await
            .unwrap();
        assert_resolved(outcome, Role::Challenger);
    }

    let state = ctx.settlement.state(id).await.unwrap();
    assert_eq!(state.segment.start.step_count, 249);
    assert_eq!(state.segment.end.step_count, 250);
    // ceil(log_4(500))
    assert!(state.rounds <= 5);

    let log = ctx.log().await;
    let verdict = log.last().unwrap();
    assert_eq!(verdict.actor, Actor::Anchor);
    assert_eq!(verdict.action, MoveAction::Adjudicated(Role::Challenger));
    assert!(matches!(
        log[log.len() - 2].action,
        MoveAction::OneStepProof {
            segment_index: Some(_),
            ..
        }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn idle_asserter_is_timed_out() {
    let ctx = TestContext::new(500, None).await;
    let outcome = timeout(
        TEST_TIMEOUT,
        ctx.challenger_driver().start_loop(CancellationToken::new()),
    )
    .await
    .unwrap();
    assert_resolved(outcome, Role::Challenger);

    let log = ctx.log().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].actor, Actor::Party(Role::Challenger));
    assert_eq!(log[0].action, MoveAction::Timeout);
    assert!(log[0].block_number > ctx.dispute.opened_at + TEST_CHALLENGE_PERIOD);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn contrarian_challenger_loses_the_one_step_proof() {
    let ctx = TestContext::new(500, None).await;
    let id = ctx.dispute.id();
    let mut scheduler = DisputeScheduler::new();
    scheduler
        .start(id, Role::Asserter, ctx.asserter_driver())
        .unwrap();
    scheduler
        .start(
            id,
            Role::Challenger,
            ctx.challenger_with(FixedSegmentStrategy { index: 0 }),
        )
        .unwrap();

    for role in [Role::Asserter, Role::Challenger] {
        let outcome = timeout(TEST_TIMEOUT, scheduler.join(id, role))
            .await
            .unwrap();
        assert_resolved(outcome, Role::Asserter);
    }

    let state = ctx.settlement.state(id).await.unwrap();
    assert_eq!(state.segment.start.step_count, 0);
    assert_eq!(state.segment.end.step_count, 1);
    assert_eq!(
        ctx.log().await.last().unwrap().action,
        MoveAction::Adjudicated(Role::Asserter)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_challenger_resumes_from_the_log() {
    let ctx = TestContext::new(500, Some(250)).await;
    let id = ctx.dispute.id();
    let mut scheduler = DisputeScheduler::new();
    scheduler
        .start(id, Role::Asserter, ctx.asserter_driver())
        .unwrap();
    scheduler
        .start(id, Role::Challenger, ctx.challenger_driver())
        .unwrap();

    timeout(TEST_TIMEOUT, async {
        while ctx.log().await.len() < 3 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
    assert!(scheduler.stop(id, Role::Challenger));
    let stopped = scheduler.join(id, Role::Challenger).await.unwrap();
    assert_eq!(stopped, DisputeOutcome::Cancelled);

    // A fresh driver knows nothing but the dispute and rebuilds its state from the log.
    scheduler
        .start(id, Role::Challenger, ctx.challenger_driver())
        .unwrap();
    for role in [Role::Asserter, Role::Challenger] {
        let outcome = timeout(TEST_TIMEOUT, scheduler.join(id, role))
            .await
            .unwrap();
        assert_resolved(outcome, Role::Challenger);
    }
}

#[tokio::test]
async fn cancelled_drivers_stop_before_moving() {
    let ctx = TestContext::new(100, None).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = ctx.asserter_driver().start_loop(cancel).await.unwrap();
    assert_eq!(outcome, DisputeOutcome::Cancelled);
    assert!(ctx.log().await.is_empty());
}
