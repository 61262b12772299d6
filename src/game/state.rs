//! C4 — GameState: one team's progression through the challenge. Built once
//! at match start (or rekey/reset) and mutated only by
//! [`crate::game::validator::validate`].

use crate::cipher::keyderive::{block_tweak, derive_params, CipherParams};
use crate::cipher::pkcs7::{into_blocks, pad};
use crate::cipher::DerivationError;

use super::phase::Phase;

/// Per-team cipher progression. See spec §3 "GameState" for the invariants
/// this type's fields uphold; [`crate::game::validator`] is the only code
/// permitted to mutate the four lines after `c_blocks`.
#[derive(Clone, Debug)]
pub struct GameState {
    pub password: String,
    pub message: String,

    pub params: CipherParams,
    pub v_blocks: Vec<Vec<i64>>,

    pub expected_pwd_ascii: Vec<i64>,
    pub expected_msg_ascii: Vec<i64>,
    pub ascii_pw_done: bool,
    pub ascii_msg_done: bool,

    pub current_block: usize,
    pub current_phase: Phase,
    pub prev_vec: Vec<i64>,

    pub u: Option<Vec<i64>>,
    pub u_prime: Option<Vec<i64>>,
    pub w: Option<Vec<i64>>,

    pub c_blocks: Vec<Vec<i64>>,
    pub errors: u64,
    pub finished: bool,
}

impl GameState {
    /// Construct a fresh `GameState` for `password`/`message` at block width
    /// `n`. Fails only if key derivation cannot find an invertible matrix
    /// within its attempt budget (`DerivationError::DerivationExhausted`).
    pub fn new(password: &str, message: &str, n: usize) -> Result<Self, DerivationError> {
        let params = derive_params(password.as_bytes(), n)?;
        let padded = pad(message.as_bytes(), n);
        let v_blocks = into_blocks(&padded, n);

        let expected_pwd_ascii = ascii_codepoints(password);
        let expected_msg_ascii = ascii_codepoints(message);

        Ok(Self {
            password: password.to_string(),
            message: message.to_string(),
            prev_vec: params.iv.clone(),
            params,
            v_blocks,
            expected_pwd_ascii,
            expected_msg_ascii,
            ascii_pw_done: false,
            ascii_msg_done: false,
            current_block: 0,
            current_phase: Phase::Tpw,
            u: None,
            u_prime: None,
            w: None,
            c_blocks: Vec::new(),
            errors: 0,
            finished: false,
        })
    }

    pub fn total_blocks(&self) -> usize {
        self.v_blocks.len()
    }

    pub fn blocks_done(&self) -> usize {
        self.c_blocks.len()
    }

    /// Tweak vector for the block currently in progress.
    pub fn current_tweak(&self) -> Vec<i64> {
        block_tweak(self.params.key_sum, self.params.m, self.current_block, self.params.n)
    }
}

fn ascii_codepoints(s: &str) -> Vec<i64> {
    s.bytes().map(|b| b as i64).collect()
}
