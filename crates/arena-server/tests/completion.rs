mod common;

use arena_core::SessionState;
use arena_server::{completion, matchmaker};

use common::test_app;

#[tokio::test]
async fn second_finish_is_rejected_without_a_second_stat() {
    let t = test_app().await;
    matchmaker::join_or_create(&t.state, 7).await.unwrap();
    let s = matchmaker::join_or_create(&t.state, 9).await.unwrap();

    completion::finish_session(&t.state, s.id, 2, 5, 9)
        .await
        .unwrap();
    let err = completion::finish_session(&t.state, s.id, 5, 2, 7)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "FAILED_PRECONDITION");

    let s = matchmaker::get_session(&t.state, s.id).await.unwrap();
    assert_eq!(s.state, SessionState::FinishedB);
    assert_eq!((s.points_a, s.points_b), (2, 5));

    let stats = t.memory.stat.records();
    assert_eq!(stats.len(), 1);
    assert_eq!((stats[0].winner_id, stats[0].loser_id), (9, 7));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_finishes_commit_once() {
    let t = test_app().await;
    let s = matchmaker::create_friend_session(&t.state, 1, 2).await.unwrap();

    let mut handles = Vec::new();
    for winner in [1, 2, 1, 2] {
        let state = t.state.clone();
        handles.push(tokio::spawn(async move {
            completion::finish_session(&state, s.id, 1, 0, winner).await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(e) => assert_eq!(e.code(), "FAILED_PRECONDITION"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(t.memory.stat.records().len(), 1);
}

#[tokio::test]
async fn draw_records_no_stat() {
    let t = test_app().await;
    let s = matchmaker::create_friend_session(&t.state, 1, 2).await.unwrap();

    let done = completion::finish_session(&t.state, s.id, 3, 3, 0)
        .await
        .unwrap();
    assert_eq!(done.state, SessionState::Draw);
    assert!(done.finished);
    assert!(t.memory.stat.records().is_empty());
}

#[tokio::test]
async fn lone_player_session_cannot_finish() {
    let t = test_app().await;
    let s = matchmaker::join_or_create(&t.state, 4).await.unwrap();

    for winner in [4, 0] {
        let err = completion::finish_session(&t.state, s.id, 1, 0, winner)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FAILED_PRECONDITION");
    }

    let stored = matchmaker::get_session(&t.state, s.id).await.unwrap();
    assert_eq!(stored.state, SessionState::Waiting);
    assert!(!stored.finished);
    assert_eq!(stored.version, s.version);
    assert!(t.memory.stat.records().is_empty());

    let paired = matchmaker::join_or_create(&t.state, 5).await.unwrap();
    assert_eq!(paired.id, s.id);
    assert_eq!(paired.state, SessionState::Ready);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let t = test_app().await;
    let err = completion::finish_session(&t.state, 31337, 0, 0, 0)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn stat_outage_does_not_undo_the_finish() {
    let t = test_app().await;
    t.memory.stat.set_failing(true);
    let s = matchmaker::create_friend_session(&t.state, 1, 2).await.unwrap();

    let done = completion::finish_session(&t.state, s.id, 4, 1, 1)
        .await
        .unwrap();
    assert!(done.finished);
    assert!(t.memory.stat.records().is_empty());

    let s = matchmaker::get_session(&t.state, s.id).await.unwrap();
    assert_eq!(s.state, SessionState::FinishedA);
}

#[tokio::test]
async fn finish_tears_down_the_session_chat() {
    let t = test_app().await;
    let s = matchmaker::invite_friend(&t.state, 1, 2).await.unwrap();
    let other = matchmaker::invite_friend(&t.state, 3, 4).await.unwrap();
    let rooms = t.memory.chat.rooms();
    let room = rooms.iter().find(|r| r.game_id == s.id).unwrap();
    let other_room = rooms.iter().find(|r| r.game_id == other.id).unwrap();

    completion::finish_session(&t.state, s.id, 0, 0, 0)
        .await
        .unwrap();

    assert_eq!(t.memory.chat.destroyed(), vec![room.id]);
    let left: Vec<i64> = t.memory.chat.rooms().iter().map(|r| r.id).collect();
    assert_eq!(left, vec![other_room.id]);
}

#[tokio::test]
async fn finish_cancels_a_pending_watchdog() {
    let t = test_app().await;
    let s = matchmaker::create_friend_session(&t.state, 1, 2).await.unwrap();
    matchmaker::update_state(&t.state, s.id, SessionState::Active)
        .await
        .unwrap();
    matchmaker::update_state(&t.state, s.id, SessionState::Disconnected)
        .await
        .unwrap();
    assert!(t.state.watchdog.is_watching(s.id));

    let done = completion::finish_session(&t.state, s.id, 0, 9, 2)
        .await
        .unwrap();
    assert_eq!(done.state, SessionState::FinishedB);
    assert!(!t.state.watchdog.is_watching(s.id));
}
