//! Wire message shapes (§6 "EXTERNAL INTERFACES"). Each enum carries its own
//! `type` discriminant via `#[serde(tag = "type")]`, the same pattern used
//! by every other message-bus protocol in the retrieval pack.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::game::Phase;
use crate::turn::RotatePolicy;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Hello {
        proto: u32,
        msg: String,
    },
    Joined {
        team: u32,
        your_id: u64,
        info: JoinedInfo,
    },
    TeamStatus {
        team: u32,
        connected: usize,
        ready_count: usize,
        ready_all: bool,
    },
    Task {
        task: String,
        msg: String,
    },
    Turn {
        current: Option<u64>,
        you_turn: bool,
        order: Vec<u64>,
    },
    Countdown {
        seconds: u32,
    },
    Start {
        msg: String,
    },
    Step {
        block: usize,
        phase: Phase,
        inputs: Value,
        op: String,
        output_name: String,
        turn_cid: u64,
        you_turn: bool,
    },
    Ok {
        #[serde(rename = "for")]
        r#for: String,
    },
    Error {
        msg: String,
    },
    Hint {
        msg: String,
    },
    Info {
        msg: String,
    },
    GameOver {
        winner: u32,
    },
    Scoreboard {
        winner: Option<u32>,
        rows: Vec<ScoreRow>,
    },
    Ping {
        ts: i64,
        proto: u32,
    },
}

impl ServerMessage {
    pub fn error(msg: impl Into<String>) -> Self {
        ServerMessage::Error { msg: msg.into() }
    }

    pub fn hint(msg: impl Into<String>) -> Self {
        ServerMessage::Hint { msg: msg.into() }
    }

    pub fn ok_for(label: impl Into<String>) -> Self {
        ServerMessage::Ok { r#for: label.into() }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JoinedInfo {
    pub password: String,
    pub message: String,
    pub note: String,
    pub rotate: RotatePolicy,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoreRow {
    pub team: u32,
    pub finished: bool,
    pub blocks_done: usize,
    pub total_blocks: usize,
    pub phase: String,
    pub errors: u64,
    pub time_sec: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join { team: u32 },
    Ready {},
    StepAnswer { phase: Phase, block: usize, vector: Vec<i64> },
    Pong { ts: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_round_trips_through_json() {
        let msg = ClientMessage::Join { team: 3 };
        let s = serde_json::to_string(&msg).unwrap();
        assert!(s.contains("\"type\":\"join\""));
        let back: ClientMessage = serde_json::from_str(&s).unwrap();
        matches!(back, ClientMessage::Join { team: 3 });
    }

    #[test]
    fn ok_message_serializes_for_as_a_bare_keyword() {
        let msg = ServerMessage::ok_for("TPW");
        let s = serde_json::to_string(&msg).unwrap();
        assert!(s.contains("\"for\":\"TPW\""));
    }

    #[test]
    fn step_answer_deserializes_with_phase_and_vector() {
        let raw = r#"{"type":"step_answer","phase":"A","block":0,"vector":[1,2]}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::StepAnswer { phase, block, vector } => {
                assert_eq!(phase, Phase::A);
                assert_eq!(block, 0);
                assert_eq!(vector, vec![1, 2]);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }
}
