//! The `Phase` sum type a team's progress is dispatched on (§9: "model phase
//! as a sum type ... dispatch the validator and `next_step` as a table keyed
//! by phase"). No inheritance, no trait objects — a `match` per operation.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "TPW")]
    Tpw,
    #[serde(rename = "TMSG")]
    Tmsg,
    A,
    B,
    C,
    D,
    #[serde(rename = "DONE")]
    Done,
}

impl Phase {
    /// The vector length a correct submission for this phase must have.
    /// TPW/TMSG expect a fixed 4-ASCII-character vector; A..D expect `n`.
    pub fn expected_arity(self, n: usize) -> usize {
        match self {
            Phase::Tpw | Phase::Tmsg => 4,
            Phase::A | Phase::B | Phase::C | Phase::D | Phase::Done => n,
        }
    }

    pub fn next_cipher_phase(self) -> Phase {
        match self {
            Phase::A => Phase::B,
            Phase::B => Phase::C,
            Phase::C => Phase::D,
            Phase::D => Phase::A,
            other => other,
        }
    }

    /// Label used in `ok.for` and in scoreboard/turn diagnostics.
    pub fn label(self, block: usize) -> String {
        match self {
            Phase::Tpw => "TPW".to_string(),
            Phase::Tmsg => "TMSG".to_string(),
            Phase::Done => "DONE".to_string(),
            Phase::A | Phase::B | Phase::C | Phase::D => {
                format!("block{}_phase{}", block, self.letter())
            }
        }
    }

    fn letter(self) -> &'static str {
        match self {
            Phase::A => "A",
            Phase::B => "B",
            Phase::C => "C",
            Phase::D => "D",
            Phase::Tpw => "TPW",
            Phase::Tmsg => "TMSG",
            Phase::Done => "DONE",
        }
    }
}
