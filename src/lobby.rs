//! C8 — LobbyCoordinator: per-team connection/readiness bookkeeping and the
//! global start gate. The actual mutation lives on [`crate::coordinator::MatchController`]
//! (all of it needs the teams map and the global flags together); this
//! module holds the data each team carries and the pure gate predicate.

use std::collections::{HashSet, VecDeque};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::game::GameState;
use crate::net::ServerMessage;
use crate::turn::TurnScheduler;

/// One connected client within a team: its outbound channel (the writer
/// task drains this independently of the match lock), its rate-limit
/// sliding window, and a cancellation handle the admin console uses to
/// force-close it on `kick`.
pub struct ConnHandle {
    pub client_id: u64,
    pub tx: mpsc::UnboundedSender<ServerMessage>,
    pub submit_times: VecDeque<Instant>,
    pub kill: CancellationToken,
}

impl ConnHandle {
    pub fn new(client_id: u64, tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            client_id,
            tx,
            submit_times: VecDeque::new(),
            kill: CancellationToken::new(),
        }
    }

    pub fn send(&self, msg: ServerMessage) {
        // The receiving writer task may already be gone if the connection
        // raced a disconnect; a dropped receiver here is not an error for
        // the sender, just a message that will never be delivered.
        let _ = self.tx.send(msg);
    }

    /// Record `now` in the sliding window, purge anything older than
    /// `window`, and return whether this submission is within the limit.
    pub fn check_and_record(&mut self, now: Instant, window: std::time::Duration, max: usize) -> bool {
        while let Some(&front) = self.submit_times.front() {
            if now.duration_since(front) > window {
                self.submit_times.pop_front();
            } else {
                break;
            }
        }
        if self.submit_times.len() >= max {
            return false;
        }
        self.submit_times.push_back(now);
        true
    }
}

/// Per-team state: connections, readiness, turn order, and the team's
/// cipher progression once a match is live.
pub struct TeamSrvState {
    pub team_id: u32,
    pub conns: std::collections::HashMap<u64, ConnHandle>,
    pub join_order: Vec<u64>,
    pub ready: HashSet<u64>,
    pub turn_order: TurnScheduler,
    pub game: Option<GameState>,
    pub win_time: Option<f64>,
}

impl TeamSrvState {
    pub fn new(team_id: u32) -> Self {
        Self {
            team_id,
            conns: std::collections::HashMap::new(),
            join_order: Vec::new(),
            ready: HashSet::new(),
            turn_order: TurnScheduler::new(),
            game: None,
            win_time: None,
        }
    }

    pub fn connected(&self) -> usize {
        self.conns.len()
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    pub fn ready_all(&self) -> bool {
        self.connected() > 0 && self.ready.len() == self.connected()
    }

    pub fn broadcast(&self, msg: ServerMessage) {
        for conn in self.conns.values() {
            conn.send(msg.clone());
        }
    }

    pub fn in_match(&self) -> bool {
        self.game.is_some()
    }
}

/// The global start gate from §4.7: among teams with at least one connected
/// client, every one of them must have `ready == connected`. An empty set of
/// eligible teams never triggers a start.
pub fn ready_gate_satisfied(teams: &std::collections::HashMap<u32, TeamSrvState>) -> bool {
    let eligible: Vec<&TeamSrvState> = teams.values().filter(|t| t.connected() > 0).collect();
    !eligible.is_empty() && eligible.iter().all(|t| t.ready_all())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn team_with(connected: usize, ready: usize) -> TeamSrvState {
        let mut t = TeamSrvState::new(1);
        for cid in 0..connected as u64 {
            let (tx, _rx) = mpsc::unbounded_channel();
            t.conns.insert(cid, ConnHandle::new(cid, tx));
            t.join_order.push(cid);
            if (cid as usize) < ready {
                t.ready.insert(cid);
            }
        }
        t
    }

    #[test]
    fn gate_ignores_teams_with_zero_connections() {
        let mut teams = HashMap::new();
        teams.insert(1, team_with(2, 2));
        teams.insert(2, TeamSrvState::new(2));
        assert!(ready_gate_satisfied(&teams));
    }

    #[test]
    fn gate_blocks_until_every_connected_team_is_fully_ready() {
        let mut teams = HashMap::new();
        teams.insert(1, team_with(2, 2));
        teams.insert(2, team_with(2, 1));
        assert!(!ready_gate_satisfied(&teams));
    }

    #[test]
    fn gate_is_false_with_no_eligible_teams_at_all() {
        let teams: HashMap<u32, TeamSrvState> = HashMap::new();
        assert!(!ready_gate_satisfied(&teams));
    }

    #[test]
    fn rate_limit_allows_six_then_rejects_seventh() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut conn = ConnHandle::new(1, tx);
        let window = std::time::Duration::from_millis(2000);
        let now = Instant::now();
        for _ in 0..6 {
            assert!(conn.check_and_record(now, window, 6));
        }
        assert!(!conn.check_and_record(now, window, 6));
    }

    #[test]
    fn rate_limit_window_ages_out_old_entries() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut conn = ConnHandle::new(1, tx);
        let window = std::time::Duration::from_millis(10);
        let t0 = Instant::now();
        for _ in 0..6 {
            assert!(conn.check_and_record(t0, window, 6));
        }
        let later = t0 + std::time::Duration::from_millis(50);
        assert!(conn.check_and_record(later, window, 6));
    }
}
