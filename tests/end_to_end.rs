//! End-to-end scenarios from spec §8, driven through the real session loop
//! and match controller over an in-memory duplex pipe (no TCP socket).

use hascill::game::Phase;
use hascill::net::{ClientMessage, ServerMessage};
use hascill::test_support::{answer_one_block, test_controller, TestClient};
use hascill::turn::RotatePolicy;

async fn answer_tpw_tmsg(client: &mut TestClient) {
    let step = client.recv_until(|m| matches!(m, ServerMessage::Step { .. })).await;
    let ServerMessage::Step { phase, block, .. } = step else { unreachable!() };
    assert_eq!(phase, Phase::Tpw);
    client
        .send(&ClientMessage::StepAnswer { phase, block, vector: vec![80, 65, 90, 57] })
        .await;
    client.recv_until(|m| matches!(m, ServerMessage::Ok { .. })).await;

    let step = client.recv_until(|m| matches!(m, ServerMessage::Step { .. })).await;
    let ServerMessage::Step { phase, block, .. } = step else { unreachable!() };
    assert_eq!(phase, Phase::Tmsg);
    client
        .send(&ClientMessage::StepAnswer { phase, block, vector: vec![72, 105, 108, 115] })
        .await;
    client.recv_until(|m| matches!(m, ServerMessage::Ok { .. })).await;
}

async fn ready_and_wait_for_start(client: &mut TestClient) {
    client.ready().await;
    for _ in 0..3 {
        client.recv_until(|m| matches!(m, ServerMessage::Countdown { .. })).await;
    }
    client.recv_until(|m| matches!(m, ServerMessage::Start { .. })).await;
}

/// Scenario 1: single team, single player, happy path. Password `PAZ9`,
/// message `Hils`, rotate `phase`; `Hils` pads to length 6 with n=2, giving
/// three blocks. Expect a 3/3 finish with zero errors and `winner == 1`.
#[tokio::test]
async fn single_team_single_player_happy_path() {
    let controller = test_controller("PAZ9", "Hils", RotatePolicy::Phase);
    let mut client = TestClient::connect(controller.clone());
    client.join_team(1).await;
    ready_and_wait_for_start(&mut client).await;
    answer_tpw_tmsg(&mut client).await;

    for _ in 0..3 {
        answer_one_block(&mut client, 2).await;
    }

    let scoreboard = client.recv_until(|m| matches!(m, ServerMessage::Scoreboard { .. })).await;
    let ServerMessage::Scoreboard { winner, rows } = scoreboard else { unreachable!() };
    assert_eq!(winner, Some(1));
    let row = rows.iter().find(|r| r.team == 1).expect("team 1 row present");
    assert!(row.finished);
    assert_eq!(row.blocks_done, 3);
    assert_eq!(row.total_blocks, 3);
    assert_eq!(row.errors, 0);

    let game_over = client.recv_until(|m| matches!(m, ServerMessage::GameOver { .. })).await;
    assert!(matches!(game_over, ServerMessage::GameOver { winner: 1 }));

    let snap = controller.status();
    assert!(snap.game_over);
    assert_eq!(snap.winner_team, Some(1));
}

/// Scenario 2: a wrong phase-A answer is rejected, counts as one error, and
/// the re-pushed step carries identical inputs to the one that was rejected.
#[tokio::test]
async fn wrong_phase_a_answer_increments_errors_and_represses_identical_step() {
    let controller = test_controller("PAZ9", "Hils", RotatePolicy::Phase);
    let mut client = TestClient::connect(controller.clone());
    client.join_team(1).await;
    ready_and_wait_for_start(&mut client).await;
    answer_tpw_tmsg(&mut client).await;

    let step = client.recv_until(|m| matches!(m, ServerMessage::Step { .. })).await;
    let ServerMessage::Step { phase, block, inputs: inputs_before, .. } = step else { unreachable!() };
    assert_eq!(phase, Phase::A);

    client
        .send(&ClientMessage::StepAnswer { phase, block, vector: vec![0, 0] })
        .await;
    let err = client.recv_until(|m| matches!(m, ServerMessage::Error { .. })).await;
    assert!(matches!(err, ServerMessage::Error { .. }));

    let repushed = client.recv_until(|m| matches!(m, ServerMessage::Step { .. })).await;
    let ServerMessage::Step { phase: phase2, block: block2, inputs: inputs_after, .. } = repushed else {
        unreachable!()
    };
    assert_eq!(phase2, Phase::A);
    assert_eq!(block2, block);
    assert_eq!(inputs_after, inputs_before);

    let snap = controller.status();
    let team1 = snap.teams.iter().find(|t| t.team_id == 1).unwrap();
    assert_eq!(team1.errors, 1);
}

/// Scenario 3: with two clients in one team, the client that is not
/// `current_player` gets `error: "not your turn"` and nothing mutates.
#[tokio::test]
async fn not_your_turn_is_rejected_without_mutating_state() {
    let controller = test_controller("PAZ9", "Hils", RotatePolicy::Phase);
    let mut c1 = TestClient::connect(controller.clone());
    let cid1 = c1.join_team(1).await;
    let mut c2 = TestClient::connect(controller.clone());
    let _cid2 = c2.join_team(1).await;

    c1.ready().await;
    c2.ready().await;
    for _ in 0..3 {
        c1.recv_until(|m| matches!(m, ServerMessage::Countdown { .. })).await;
    }
    c1.recv_until(|m| matches!(m, ServerMessage::Start { .. })).await;
    for _ in 0..3 {
        c2.recv_until(|m| matches!(m, ServerMessage::Countdown { .. })).await;
    }
    c2.recv_until(|m| matches!(m, ServerMessage::Start { .. })).await;

    let step1 = c1.recv_until(|m| matches!(m, ServerMessage::Step { .. })).await;
    let _step2 = c2.recv_until(|m| matches!(m, ServerMessage::Step { .. })).await;
    let ServerMessage::Step { phase, block, turn_cid, you_turn, .. } = step1 else { unreachable!() };
    assert!(you_turn);
    assert_eq!(turn_cid, cid1);

    c2.send(&ClientMessage::StepAnswer { phase, block, vector: vec![0, 0, 0, 0] }).await;
    let err = c2.recv_until(|m| matches!(m, ServerMessage::Error { .. })).await;
    let ServerMessage::Error { msg } = err else { unreachable!() };
    assert!(msg.contains("not your turn"), "unexpected error message: {msg}");

    let snap = controller.status();
    let team1 = snap.teams.iter().find(|t| t.team_id == 1).unwrap();
    assert_eq!(team1.errors, 0);
    assert_eq!(team1.turn_order.first().copied(), Some(cid1));
}

/// Scenario 4: the global start gate only fires once every connected team is
/// fully READY; a team with zero connections is ignored; a partially-ready
/// team blocks every other team's start.
#[tokio::test]
async fn global_start_gate_waits_for_every_connected_team() {
    let controller = test_controller("PAZ9", "Hils", RotatePolicy::Phase);

    let mut t1a = TestClient::connect(controller.clone());
    t1a.join_team(1).await;
    let mut t1b = TestClient::connect(controller.clone());
    t1b.join_team(1).await;
    let mut t2a = TestClient::connect(controller.clone());
    t2a.join_team(2).await;
    let mut t2b = TestClient::connect(controller.clone());
    t2b.join_team(2).await;

    t1a.ready().await;
    t1b.ready().await;

    // Only team 1 is fully ready; team 2 still has an un-readied client, so
    // no countdown should be in flight. Poll status instead of racing a
    // timeout against an absence.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!controller.status().start_flag);

    t2a.ready().await;
    t2b.ready().await;

    for c in [&mut t1a, &mut t1b, &mut t2a, &mut t2b] {
        for seconds in [3u32, 2, 1] {
            let msg = c.recv_until(|m| matches!(m, ServerMessage::Countdown { .. })).await;
            assert!(matches!(msg, ServerMessage::Countdown { seconds: s } if s == seconds));
        }
        c.recv_until(|m| matches!(m, ServerMessage::Start { .. })).await;
    }

    assert!(controller.status().start_flag);
}

/// Scenario 5 (abbreviated): once a team finishes, the match freezes —
/// `game_over` is set exactly once and subsequent `step_answer` messages
/// from any team are refused with "match frozen".
#[tokio::test]
async fn winner_freezes_the_match_for_every_other_team() {
    let controller = test_controller("PAZ9", "Hils", RotatePolicy::Phase);
    let mut fast = TestClient::connect(controller.clone());
    fast.join_team(1).await;
    let mut slow = TestClient::connect(controller.clone());
    slow.join_team(2).await;

    fast.ready().await;
    slow.ready().await;
    for c in [&mut fast, &mut slow] {
        for _ in 0..3 {
            c.recv_until(|m| matches!(m, ServerMessage::Countdown { .. })).await;
        }
        c.recv_until(|m| matches!(m, ServerMessage::Start { .. })).await;
    }

    answer_tpw_tmsg(&mut fast).await;
    for _ in 0..3 {
        answer_one_block(&mut fast, 2).await;
    }
    let scoreboard = fast.recv_until(|m| matches!(m, ServerMessage::Scoreboard { .. })).await;
    let ServerMessage::Scoreboard { winner, .. } = scoreboard else { unreachable!() };
    assert_eq!(winner, Some(1));
    fast.recv_until(|m| matches!(m, ServerMessage::GameOver { .. })).await;

    let snap = controller.status();
    assert!(snap.game_over);
    assert_eq!(snap.winner_team, Some(1));

    // the slow team's turn holder tries to answer after the freeze.
    let step = slow.recv_until(|m| matches!(m, ServerMessage::Step { .. })).await;
    let ServerMessage::Step { phase, block, .. } = step else { unreachable!() };
    slow.send(&ClientMessage::StepAnswer { phase, block, vector: vec![80, 65, 90, 57] })
        .await;
    let err = slow.recv_until(|m| matches!(m, ServerMessage::Error { .. })).await;
    let ServerMessage::Error { msg } = err else { unreachable!() };
    assert!(msg.contains("frozen"), "unexpected error message: {msg}");
}
