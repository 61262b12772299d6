//! C10 — MatchController: owns the challenge, the teams map, and the global
//! flags. Every session task and the admin console mutate state only
//! through this type's methods, which serialize all of it under one
//! `parking_lot::Mutex` (§5: "one match-wide exclusive critical section
//! around each message-handling step"). Sends to connections are
//! non-blocking `mpsc` pushes, so they are safe to issue while the lock is
//! held; the actual socket write happens later in each connection's writer
//! task, outside this lock entirely.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{
    Disclosure, ServerConfig, ADMIN_COUNTDOWN_SECONDS, COUNTDOWN_SECONDS, MAX_TEAMS, PROTO_VERSION,
    RATE_LIMIT_MAX, RATE_LIMIT_WINDOW,
};
use crate::game::{GameState, Phase, ValidationOutcome};
use crate::lobby::{ready_gate_satisfied, ConnHandle, TeamSrvState};
use crate::net::{JoinedInfo, ScoreRow, ServerMessage};
use crate::turn::RotatePolicy;

const LOG_TARGET: &str = "hascill::coordinator";

#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error("team must be between 1 and {0}")]
    BadTeam(u32),
}

/// Admin errors are reported to the operator only (§7); they never reach
/// the wire, so a plain enum with a `Display` impl is enough.
#[derive(Debug)]
pub enum AdminError {
    MatchActive,
    UnknownTeam(u32),
    BadArgs(String),
}

impl std::fmt::Display for AdminError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdminError::MatchActive => write!(f, "not allowed while a match is active"),
            AdminError::UnknownTeam(t) => write!(f, "no such team: {t}"),
            AdminError::BadArgs(s) => write!(f, "bad arguments: {s}"),
        }
    }
}

pub struct JoinOutcome {
    pub client_id: u64,
    pub info: JoinedInfo,
}

#[derive(Debug, Clone)]
pub struct TeamSummary {
    pub team_id: u32,
    pub connected: usize,
    pub ready_count: usize,
    pub in_match: bool,
    pub blocks_done: usize,
    pub total_blocks: usize,
    pub phase: String,
    pub errors: u64,
    pub turn_order: Vec<u64>,
}

#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub start_flag: bool,
    pub paused: bool,
    pub game_over: bool,
    pub winner_team: Option<u32>,
    pub rotate: RotatePolicy,
    pub password: String,
    pub message: String,
    pub teams: Vec<TeamSummary>,
}

struct MatchState {
    password: String,
    message: String,
    rotate: RotatePolicy,
    n: usize,
    disclosure: Disclosure,
    start_flag: bool,
    paused: bool,
    game_over: bool,
    winner_team: Option<u32>,
    start_time: Option<Instant>,
    teams: HashMap<u32, TeamSrvState>,
    next_client_id: u64,
    countdown_running: bool,
}

pub struct MatchController {
    state: Mutex<MatchState>,
    pub shutdown: CancellationToken,
}

impl MatchController {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            state: Mutex::new(MatchState {
                password: config.password.clone(),
                message: config.message.clone(),
                rotate: config.rotate,
                n: config.n,
                disclosure: config.disclosure,
                start_flag: false,
                paused: false,
                game_over: false,
                winner_team: None,
                start_time: None,
                teams: HashMap::new(),
                next_client_id: 1,
                countdown_running: false,
            }),
            shutdown: CancellationToken::new(),
        }
    }

    // ---- connection lifecycle -------------------------------------------------

    pub fn join(
        &self,
        team_id: u32,
        tx: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<(JoinOutcome, CancellationToken), JoinError> {
        let mut st = self.state.lock();
        if team_id < 1 || team_id > MAX_TEAMS {
            return Err(JoinError::BadTeam(MAX_TEAMS));
        }
        let cid = st.next_client_id;
        st.next_client_id += 1;

        let rotate = st.rotate;
        let password = st.password.clone();
        let message = st.message.clone();

        let entry = st.teams.entry(team_id).or_insert_with(|| TeamSrvState::new(team_id));
        let in_match = entry.in_match();
        let conn = ConnHandle::new(cid, tx);
        let kill = conn.kill.clone();
        entry.conns.insert(cid, conn);
        entry.join_order.push(cid);
        if !in_match {
            entry.turn_order.append(cid);
        }

        info!(target: LOG_TARGET, team = team_id, client_id = cid, "client joined");

        let info = JoinedInfo {
            password,
            message,
            note: "educational disclosure: password and message are visible to every player".to_string(),
            rotate,
        };

        drop(st);
        // Per §4.8, `joined` goes to the new client before `team_status` is
        // broadcast to the team (including itself); the caller sends
        // `joined` and only then calls `announce_join`.
        Ok((JoinOutcome { client_id: cid, info }, kill))
    }

    /// Broadcast the team's updated `(connected, ready)` counts. Called by
    /// the session loop immediately after it has sent `joined` to the new
    /// client, so wire order matches §4.8 steps 4-5.
    pub fn announce_join(&self, team_id: u32) {
        self.broadcast_team_status(team_id);
    }

    pub fn mark_ready(self: &Arc<Self>, team_id: u32, cid: u64) {
        let should_start;
        {
            let mut st = self.state.lock();
            if let Some(team) = st.teams.get_mut(&team_id) {
                team.ready.insert(cid);
            }
            should_start = !st.start_flag && !st.countdown_running && ready_gate_satisfied(&st.teams);
            if should_start {
                st.countdown_running = true;
            }
        }
        self.broadcast_team_status(team_id);
        if should_start {
            info!(target: LOG_TARGET, "ready gate satisfied, starting countdown");
            self.spawn_countdown(COUNTDOWN_SECONDS);
        }
    }

    pub fn step_answer(&self, team_id: u32, cid: u64, phase: Phase, block: usize, vector: Vec<i64>) {
        let mut st = self.state.lock();

        if st.game_over || st.paused {
            send_to(&st, team_id, cid, ServerMessage::error("match frozen"));
            return;
        }

        let disclosure = st.disclosure;
        let rotate_policy = st.rotate;
        let now = Instant::now();

        let Some(team) = st.teams.get_mut(&team_id) else {
            return;
        };

        let rate_ok = team
            .conns
            .get_mut(&cid)
            .map(|c| c.check_and_record(now, RATE_LIMIT_WINDOW, RATE_LIMIT_MAX))
            .unwrap_or(false);
        if !rate_ok {
            if let Some(conn) = team.conns.get(&cid) {
                conn.send(ServerMessage::error("rate limit exceeded: at most 6 submissions per 2.0s"));
            }
            return;
        }

        if team.turn_order.current() != Some(cid) {
            if let Some(conn) = team.conns.get(&cid) {
                conn.send(ServerMessage::error("not your turn"));
            }
            return;
        }

        let Some(game) = team.game.as_mut() else {
            if let Some(conn) = team.conns.get(&cid) {
                conn.send(ServerMessage::error("match has not started"));
            }
            return;
        };

        let outcome = crate::game::validate(game, phase, Some(block), &vector);
        let current_block = game.current_block;
        let mut just_won = false;

        match outcome {
            ValidationOutcome::Rejected { expected, errors_total } => {
                let msg = rejection_message(phase, current_block, disclosure, expected, errors_total);
                if let Some(conn) = team.conns.get(&cid) {
                    conn.send(msg);
                }
                push_step_to(team, disclosure, cid);
            }
            ValidationOutcome::GateNotReady { reason } => {
                if let Some(conn) = team.conns.get(&cid) {
                    conn.send(ServerMessage::error(reason));
                }
            }
            ValidationOutcome::Accepted {
                label,
                block_completed,
                finished,
                ..
            } => {
                if let Some(conn) = team.conns.get(&cid) {
                    conn.send(ServerMessage::ok_for(label));
                }
                let should_rotate = match rotate_policy {
                    RotatePolicy::Phase => true,
                    RotatePolicy::Block => block_completed,
                };
                if should_rotate {
                    team.turn_order.rotate();
                }
                if finished {
                    team.win_time = st.start_time.map(|t0| t0.elapsed().as_secs_f64());
                    just_won = true;
                } else {
                    push_step(team, disclosure);
                    push_turn(team);
                }
            }
        }

        if just_won {
            if st.winner_team.is_none() {
                st.winner_team = Some(team_id);
                st.game_over = true;
                info!(target: LOG_TARGET, team = team_id, "winner decided");
            }
            let rows = build_scoreboard(&st);
            let winner = st.winner_team;
            broadcast_all(&st, ServerMessage::Scoreboard { winner, rows });
            broadcast_all(&st, ServerMessage::GameOver { winner: winner.unwrap_or(team_id) });
        }
    }

    pub fn pong(&self, _team_id: u32, _cid: u64) {
        // Heartbeat keepalive only; nothing to validate or mutate.
    }

    /// Send the `ready` task prompt to one newly joined connection.
    pub fn send_ready_task(&self, team_id: u32, cid: u64) {
        let st = self.state.lock();
        send_to(
            &st,
            team_id,
            cid,
            ServerMessage::Task {
                task: "ready".into(),
                msg: "send ready when you are set".into(),
            },
        );
    }

    /// Broadcast the team's current turn order, used right after join
    /// (§4.8 step 5: "send turn status").
    pub fn send_turn_status(&self, team_id: u32) {
        let st = self.state.lock();
        if let Some(team) = st.teams.get(&team_id) {
            push_turn(team);
        }
    }

    pub fn disconnect(&self, team_id: u32, cid: u64) {
        let mut st = self.state.lock();
        let was_current = st
            .teams
            .get(&team_id)
            .map(|t| t.turn_order.current() == Some(cid))
            .unwrap_or(false);

        if let Some(team) = st.teams.get_mut(&team_id) {
            team.conns.remove(&cid);
            team.join_order.retain(|&c| c != cid);
            team.ready.remove(&cid);
            team.turn_order.remove(cid);
        }

        let disclosure = st.disclosure;
        let in_match = st.teams.get(&team_id).map(|t| t.in_match()).unwrap_or(false);
        drop(st);

        self.broadcast_team_status(team_id);
        if was_current && in_match {
            let st = self.state.lock();
            if let Some(team) = st.teams.get(&team_id) {
                push_step(team, disclosure);
                push_turn(team);
            }
        }
    }

    pub fn heartbeat_tick(&self) {
        let st = self.state.lock();
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        broadcast_all(&st, ServerMessage::Ping { ts, proto: PROTO_VERSION });
    }

    // ---- admin control plane ---------------------------------------------------

    pub fn kick(&self, team_id: u32, client_id: Option<u64>) -> Result<(), AdminError> {
        let mut st = self.state.lock();
        let disclosure = st.disclosure;
        let Some(team) = st.teams.get_mut(&team_id) else {
            return Err(AdminError::UnknownTeam(team_id));
        };
        let targets: Vec<u64> = match client_id {
            Some(cid) => team.conns.contains_key(&cid).then_some(cid).into_iter().collect(),
            None => team.conns.keys().copied().collect(),
        };
        for cid in &targets {
            team.ready.remove(cid);
            team.join_order.retain(|c| c != cid);
            team.turn_order.remove(*cid);
            if let Some(conn) = team.conns.remove(cid) {
                conn.send(ServerMessage::error("kicked by admin"));
                conn.kill.cancel();
            }
        }
        let in_match = team.in_match();
        drop(st);

        self.broadcast_team_status(team_id);
        if in_match {
            let st = self.state.lock();
            if let Some(team) = st.teams.get(&team_id) {
                push_step(team, disclosure);
                push_turn(team);
            }
        }
        Ok(())
    }

    pub fn start_now(self: &Arc<Self>) {
        let team_ids: Vec<u32>;
        {
            let mut st = self.state.lock();
            if st.start_flag || st.countdown_running {
                return;
            }
            for team in st.teams.values_mut() {
                if team.connected() > 0 {
                    let ids: Vec<u64> = team.conns.keys().copied().collect();
                    team.ready.extend(ids);
                }
            }
            st.countdown_running = true;
            team_ids = st.teams.keys().copied().collect();
        }
        for team_id in team_ids {
            self.broadcast_team_status(team_id);
        }
        info!(target: LOG_TARGET, "admin forced start-now, ignoring ready gate");
        self.spawn_countdown(ADMIN_COUNTDOWN_SECONDS);
    }

    pub fn set_message(&self, message: String) {
        let mut st = self.state.lock();
        st.message = message;
        reset_match(&mut st);
        broadcast_all(&st, ServerMessage::Info { msg: "challenge message updated; match reset".into() });
        broadcast_all(
            &st,
            ServerMessage::Task {
                task: "ready".into(),
                msg: "send ready when you are set".into(),
            },
        );
    }

    pub fn set_password(&self, password: String) {
        let mut st = self.state.lock();
        st.password = password;
        reset_match(&mut st);
        broadcast_all(&st, ServerMessage::Info { msg: "challenge password updated; match reset".into() });
        broadcast_all(
            &st,
            ServerMessage::Task {
                task: "ready".into(),
                msg: "send ready when you are set".into(),
            },
        );
    }

    pub fn pause(&self) {
        self.state.lock().paused = true;
    }

    pub fn resume(&self) {
        let st = self.state.lock();
        let disclosure = st.disclosure;
        for team in st.teams.values() {
            if team.in_match() {
                push_step(team, disclosure);
                push_turn(team);
            }
        }
        drop(st);
        self.state.lock().paused = false;
    }

    pub fn reset(&self) {
        let mut st = self.state.lock();
        reset_match(&mut st);
        broadcast_all(
            &st,
            ServerMessage::Task {
                task: "ready".into(),
                msg: "match reset; send ready to begin again".into(),
            },
        );
    }

    pub fn set_rotate(&self, policy: RotatePolicy) -> Result<(), AdminError> {
        let mut st = self.state.lock();
        if st.start_flag {
            return Err(AdminError::MatchActive);
        }
        st.rotate = policy;
        Ok(())
    }

    pub fn broadcast_text(&self, text: String) {
        let st = self.state.lock();
        broadcast_all(&st, ServerMessage::Info { msg: text });
    }

    pub fn status(&self) -> StatusSnapshot {
        let st = self.state.lock();
        StatusSnapshot {
            start_flag: st.start_flag,
            paused: st.paused,
            game_over: st.game_over,
            winner_team: st.winner_team,
            rotate: st.rotate,
            password: st.password.clone(),
            message: st.message.clone(),
            teams: st.teams.values().map(team_summary).collect(),
        }
    }

    pub fn team_info(&self, team_id: u32) -> Result<TeamSummary, AdminError> {
        let st = self.state.lock();
        st.teams.get(&team_id).map(team_summary).ok_or(AdminError::UnknownTeam(team_id))
    }

    /// Build the final scoreboard, broadcast it to every connection, then
    /// close every connection (§5: "On quit, the server publishes a final
    /// scoreboard, closes all connections, and exits"). Returns the rows so
    /// the admin REPL can also print them locally before the process exits.
    pub fn quit(&self) -> Vec<ScoreRow> {
        let st = self.state.lock();
        let rows = build_scoreboard(&st);
        let winner = st.winner_team;
        broadcast_all(&st, ServerMessage::Scoreboard { winner, rows: rows.clone() });
        for team in st.teams.values() {
            for conn in team.conns.values() {
                conn.kill.cancel();
            }
        }
        rows
    }

    // ---- internals --------------------------------------------------------------

    fn spawn_countdown(self: &Arc<Self>, seconds: u32) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            for remaining in (1..=seconds).rev() {
                {
                    let st = this.state.lock();
                    broadcast_all(&st, ServerMessage::Countdown { seconds: remaining });
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            this.begin_match();
        });
    }

    fn begin_match(&self) {
        let mut st = self.state.lock();
        st.countdown_running = false;
        st.start_flag = true;
        st.start_time = Some(Instant::now());
        st.game_over = false;
        st.winner_team = None;

        let n = st.n;
        let password = st.password.clone();
        let message = st.message.clone();
        let mut started_teams = Vec::new();

        for (&team_id, team) in st.teams.iter_mut() {
            if team.connected() == 0 {
                continue;
            }
            match GameState::new(&password, &message, n) {
                Ok(gs) => {
                    team.game = Some(gs);
                    team.win_time = None;
                    team.turn_order.seed(team.join_order.iter().copied());
                    started_teams.push(team_id);
                }
                Err(e) => {
                    warn!(target: LOG_TARGET, team = team_id, error = %e, "key derivation failed at match start");
                }
            }
        }

        broadcast_all(&st, ServerMessage::Start { msg: "the match has begun".into() });

        let disclosure = st.disclosure;
        for team_id in started_teams {
            if let Some(team) = st.teams.get(&team_id) {
                push_step(team, disclosure);
                push_turn(team);
            }
        }
    }

    fn broadcast_team_status(&self, team_id: u32) {
        let st = self.state.lock();
        if let Some(team) = st.teams.get(&team_id) {
            team.broadcast(ServerMessage::TeamStatus {
                team: team_id,
                connected: team.connected(),
                ready_count: team.ready_count(),
                ready_all: team.ready_all(),
            });
        }
    }
}

fn team_summary(team: &TeamSrvState) -> TeamSummary {
    let (blocks_done, total_blocks, phase, errors) = match &team.game {
        Some(game) => (
            game.blocks_done(),
            game.total_blocks(),
            game.current_phase.label(game.current_block),
            game.errors,
        ),
        None => (0, 0, "LOBBY".to_string(), 0),
    };
    TeamSummary {
        team_id: team.team_id,
        connected: team.connected(),
        ready_count: team.ready_count(),
        in_match: team.in_match(),
        blocks_done,
        total_blocks,
        phase,
        errors,
        turn_order: team.turn_order.order(),
    }
}

fn reset_match(st: &mut MatchState) {
    st.start_flag = false;
    st.game_over = false;
    st.winner_team = None;
    st.start_time = None;
    st.countdown_running = false;
    for team in st.teams.values_mut() {
        team.game = None;
        team.win_time = None;
        team.ready.clear();
    }
}

fn send_to(st: &MatchState, team_id: u32, cid: u64, msg: ServerMessage) {
    if let Some(conn) = st.teams.get(&team_id).and_then(|t| t.conns.get(&cid)) {
        conn.send(msg);
    }
}

fn broadcast_all(st: &MatchState, msg: ServerMessage) {
    for team in st.teams.values() {
        team.broadcast(msg.clone());
    }
}

fn rejection_message(
    phase: Phase,
    block: usize,
    disclosure: Disclosure,
    expected: Option<Vec<i64>>,
    errors_total: u64,
) -> ServerMessage {
    match disclosure {
        Disclosure::Full => ServerMessage::error(format!(
            "incorrect vector for {}; expected {:?} (team errors: {errors_total})",
            phase.label(block),
            expected
        )),
        Disclosure::Redacted => ServerMessage::error(format!(
            "incorrect vector for {} (team errors: {errors_total})",
            phase.label(block)
        )),
    }
}

fn step_payload(game: &GameState, disclosure: Disclosure) -> (String, String, serde_json::Value) {
    let i = game.current_block;
    match game.current_phase {
        Phase::Tpw => {
            let hint = match disclosure {
                Disclosure::Full => game.password.clone(),
                Disclosure::Redacted => "*".repeat(game.password.len()),
            };
            ("ascii".to_string(), "password_ascii".to_string(), json!({"password_hint": hint, "len": 4}))
        }
        Phase::Tmsg => {
            let hint = match disclosure {
                Disclosure::Full => game.message.clone(),
                Disclosure::Redacted => "*".repeat(game.message.len()),
            };
            ("ascii".to_string(), "message_ascii".to_string(), json!({"message_hint": hint, "len": 4}))
        }
        Phase::A => {
            let tweak = game.current_tweak();
            (
                "add".to_string(),
                "u".to_string(),
                json!({"v": game.v_blocks[i], "prev": game.prev_vec, "t": tweak, "m": game.params.m}),
            )
        }
        Phase::B => {
            let u = game.u.clone().unwrap_or_default();
            ("sbox".to_string(), "u_prime".to_string(), json!({"u": u, "m": game.params.m, "sbox": "x^3 mod m"}))
        }
        Phase::C => {
            let u_prime = game.u_prime.clone().unwrap_or_default();
            (
                "matmul".to_string(),
                "w".to_string(),
                json!({"M": game.params.matrix, "u_prime": u_prime, "m": game.params.m}),
            )
        }
        Phase::D => {
            let w = game.w.clone().unwrap_or_default();
            let tweak = game.current_tweak();
            (
                "add".to_string(),
                "c".to_string(),
                json!({"w": w, "b": game.params.bias, "t": tweak, "m": game.params.m}),
            )
        }
        Phase::Done => ("done".to_string(), "none".to_string(), json!({})),
    }
}

/// Broadcast the current step to every connection in `team`, annotating
/// `you_turn` per-recipient.
fn push_step(team: &TeamSrvState, disclosure: Disclosure) {
    let Some(game) = &team.game else { return };
    if game.finished {
        return;
    }
    let Some(turn_cid) = team.turn_order.current() else { return };
    let (op, output_name, inputs) = step_payload(game, disclosure);
    for (&cid, conn) in &team.conns {
        conn.send(ServerMessage::Step {
            block: game.current_block,
            phase: game.current_phase,
            inputs: inputs.clone(),
            op: op.clone(),
            output_name: output_name.clone(),
            turn_cid,
            you_turn: cid == turn_cid,
        });
    }
}

/// Re-push the current step to a single client only (used after a rejected
/// submission: nothing changed, so the rest of the team has nothing new to
/// see).
fn push_step_to(team: &TeamSrvState, disclosure: Disclosure, cid: u64) {
    let Some(game) = &team.game else { return };
    if game.finished {
        return;
    }
    let turn_cid = team.turn_order.current().unwrap_or(cid);
    let (op, output_name, inputs) = step_payload(game, disclosure);
    if let Some(conn) = team.conns.get(&cid) {
        conn.send(ServerMessage::Step {
            block: game.current_block,
            phase: game.current_phase,
            inputs,
            op,
            output_name,
            turn_cid,
            you_turn: turn_cid == cid,
        });
    }
}

fn push_turn(team: &TeamSrvState) {
    let current = team.turn_order.current();
    let order = team.turn_order.order();
    for (&cid, conn) in &team.conns {
        conn.send(ServerMessage::Turn {
            current,
            you_turn: current == Some(cid),
            order: order.clone(),
        });
    }
}

fn build_scoreboard(st: &MatchState) -> Vec<ScoreRow> {
    let mut rows: Vec<ScoreRow> = st
        .teams
        .values()
        .map(|team| {
            let (finished, blocks_done, total_blocks, phase, errors) = match &team.game {
                Some(game) => (
                    game.finished,
                    game.blocks_done(),
                    game.total_blocks(),
                    game.current_phase.label(game.current_block),
                    game.errors,
                ),
                None => (false, 0, 0, "LOBBY".to_string(), 0),
            };
            ScoreRow {
                team: team.team_id,
                finished,
                blocks_done,
                total_blocks,
                phase,
                errors,
                time_sec: team.win_time.map(|t| (t * 1000.0).round() / 1000.0),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.finished
            .cmp(&a.finished)
            .then_with(|| match (a.time_sec, b.time_sec) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| b.blocks_done.cmp(&a.blocks_done))
            .then_with(|| a.team.cmp(&b.team))
    });
    rows
}
