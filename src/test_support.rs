//! Deterministic two-client harness for driving [`crate::session::run_session`]
//! and [`crate::coordinator::MatchController`] end to end without a real TCP
//! socket, in the teacher's `ledger::test_support` style: a fixture module
//! that is part of the crate (not `#[cfg(test)]`-gated) so both inline unit
//! tests and the `tests/` integration suite can use it.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{split, DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::coordinator::MatchController;
use crate::net::{read_frame, write_frame, ClientMessage, ServerMessage};
use crate::session::run_session;
use crate::turn::RotatePolicy;

const DUPLEX_BUF: usize = 64 * 1024;

/// One simulated client: the in-memory pipe halves facing the session task,
/// plus a handle to that task so tests can join it after disconnecting.
pub struct TestClient {
    reader: ReadHalf<DuplexStream>,
    writer: WriteHalf<DuplexStream>,
    pub session_task: JoinHandle<()>,
}

impl TestClient {
    /// Spawn a fresh session against `controller`, wired to this client
    /// through an in-memory duplex pipe.
    pub fn connect(controller: Arc<MatchController>) -> Self {
        let (client_side, server_side) = tokio::io::duplex(DUPLEX_BUF);
        let (server_read, server_write) = split(server_side);
        let session_task = tokio::spawn(run_session(server_read, server_write, controller));
        let (client_read, client_write) = split(client_side);
        Self {
            reader: client_read,
            writer: client_write,
            session_task,
        }
    }

    pub async fn send(&mut self, msg: &ClientMessage) {
        write_frame(&mut self.writer, msg).await.expect("client write must succeed");
    }

    pub async fn recv(&mut self) -> ServerMessage {
        read_frame(&mut self.reader).await.expect("client read must succeed")
    }

    /// Drain server messages until one matching `pred` arrives, returning it.
    /// Used to skip past `team_status`/`turn` chatter to the message a test
    /// actually cares about.
    pub async fn recv_until(&mut self, pred: impl Fn(&ServerMessage) -> bool) -> ServerMessage {
        loop {
            let msg = self.recv().await;
            if pred(&msg) {
                return msg;
            }
        }
    }

    /// Join a team and drain up to (and including) `joined`, returning the
    /// assigned `client_id`. `joined` is not necessarily the first frame
    /// after `hello` — a `team_status` broadcast triggered by this same join
    /// may be queued ahead of it — so this drains with `recv_until` rather
    /// than asserting an exact sequence.
    pub async fn join_team(&mut self, team: u32) -> u64 {
        let hello = self.recv().await;
        assert!(matches!(hello, ServerMessage::Hello { .. }), "expected hello, got {hello:?}");
        self.send(&ClientMessage::Join { team }).await;
        match self.recv_until(|m| matches!(m, ServerMessage::Joined { .. })).await {
            ServerMessage::Joined { your_id, .. } => your_id,
            other => unreachable!("recv_until guarantees Joined, got {other:?}"),
        }
    }

    pub async fn ready(&mut self) {
        self.send(&ClientMessage::Ready {}).await;
    }
}

/// A `ServerConfig` bound to an address that is never actually listened on
/// (the harness never touches a socket), preset with the spec's canonical
/// worked example (`PAZ9`/`Hils`).
pub fn test_controller(password: &str, message: &str, rotate: RotatePolicy) -> Arc<MatchController> {
    let bind: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let config = ServerConfig::new(bind, password.to_string(), message.to_string(), rotate);
    Arc::new(MatchController::new(&config))
}

/// Run `step_a` through the four cipher phases of the *current* block for a
/// single-client team, assuming `client`'s turn throughout (phase rotation
/// off, i.e. rotate mode irrelevant with one player). Returns once block D
/// has been accepted.
pub async fn answer_one_block(client: &mut TestClient, n: usize) {
    for _ in 0..4 {
        let step = client
            .recv_until(|m| matches!(m, ServerMessage::Step { .. }))
            .await;
        let ServerMessage::Step { phase, inputs, block, .. } = step else {
            unreachable!()
        };
        let vector = compute_answer(phase, &inputs, n);
        client
            .send(&ClientMessage::StepAnswer { phase, block, vector })
            .await;
        let _ = client.recv_until(|m| matches!(m, ServerMessage::Ok { .. })).await;
    }
}

fn compute_answer(phase: crate::game::Phase, inputs: &serde_json::Value, n: usize) -> Vec<i64> {
    use crate::cipher::engine::{phase_a, phase_b, phase_c, phase_d};
    use crate::game::Phase;

    let as_vec = |key: &str| -> Vec<i64> {
        inputs[key]
            .as_array()
            .unwrap_or_else(|| panic!("missing '{key}' in step inputs"))
            .iter()
            .map(|v| v.as_i64().unwrap())
            .collect()
    };
    let m = inputs["m"].as_i64().expect("step inputs must carry m");

    match phase {
        Phase::A => {
            let v = as_vec("v");
            let prev = as_vec("prev");
            let t = as_vec("t");
            phase_a(&v, &prev, &t, m)
        }
        Phase::B => {
            let u = as_vec("u");
            phase_b(&u, m)
        }
        Phase::C => {
            let u_prime = as_vec("u_prime");
            let matrix: Vec<Vec<i64>> = inputs["M"]
                .as_array()
                .unwrap()
                .iter()
                .map(|row| row.as_array().unwrap().iter().map(|v| v.as_i64().unwrap()).collect())
                .collect();
            phase_c(&u_prime, &matrix, m)
        }
        Phase::D => {
            let w = as_vec("w");
            let b = as_vec("b");
            let t = as_vec("t");
            phase_d(&w, &b, &t, m)
        }
        other => panic!("compute_answer called for non-cipher phase {other:?} (n={n})"),
    }
}
