//! C5 — StepValidator: the authoritative step oracle. `validate` is the only
//! function in the crate allowed to mutate a [`GameState`] once the match
//! has started, and it does so atomically: a rejected submission touches
//! nothing but `errors`.

use crate::cipher::engine::{phase_a, phase_b, phase_c, phase_d};

use super::phase::Phase;
use super::state::GameState;

/// Outcome of one `validate` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The submitted vector was correct and state advanced.
    Accepted {
        phase_completed: Phase,
        /// Set when this acceptance was a phase-D success that appended a
        /// completed block to `c_blocks`.
        block_completed: bool,
        finished: bool,
        label: String,
    },
    /// The submitted vector was incorrect (or had the right arity but wrong
    /// values). Counts against the team's error tally.
    Rejected {
        expected: Option<Vec<i64>>,
        errors_total: u64,
    },
    /// The call was well-formed but out of sequence (wrong phase, wrong
    /// block, or a prerequisite phase not yet completed). Not expected in
    /// correct protocol flow; handled idempotently, does not touch `errors`.
    GateNotReady { reason: &'static str },
}

/// Validate `vector` as an answer for `phase` at `block` against `game`,
/// mutating `game` on both acceptance and rejection per spec §4.4.
pub fn validate(game: &mut GameState, phase: Phase, block: Option<usize>, vector: &[i64]) -> ValidationOutcome {
    let arity = phase.expected_arity(game.params.n);
    if vector.len() != arity {
        game.errors += 1;
        return ValidationOutcome::Rejected {
            expected: None,
            errors_total: game.errors,
        };
    }

    if game.finished {
        return ValidationOutcome::GateNotReady {
            reason: "match already finished",
        };
    }

    match phase {
        Phase::Tpw => validate_tpw(game, vector),
        Phase::Tmsg => validate_tmsg(game, vector),
        Phase::A | Phase::B | Phase::C | Phase::D => {
            if let Some(b) = block {
                if b != game.current_block {
                    return ValidationOutcome::GateNotReady {
                        reason: "stale block index",
                    };
                }
            }
            match phase {
                Phase::A => validate_a(game, vector),
                Phase::B => validate_b(game, vector),
                Phase::C => validate_c(game, vector),
                Phase::D => validate_d(game, vector),
                _ => unreachable!(),
            }
        }
        Phase::Done => ValidationOutcome::GateNotReady {
            reason: "match already finished",
        },
    }
}

fn validate_tpw(game: &mut GameState, vector: &[i64]) -> ValidationOutcome {
    if game.ascii_pw_done {
        return ValidationOutcome::GateNotReady {
            reason: "password phase already completed",
        };
    }
    if vector == game.expected_pwd_ascii.as_slice() {
        game.ascii_pw_done = true;
        ValidationOutcome::Accepted {
            phase_completed: Phase::Tpw,
            block_completed: false,
            finished: false,
            label: Phase::Tpw.label(0),
        }
    } else {
        game.errors += 1;
        ValidationOutcome::Rejected {
            expected: Some(game.expected_pwd_ascii.clone()),
            errors_total: game.errors,
        }
    }
}

fn validate_tmsg(game: &mut GameState, vector: &[i64]) -> ValidationOutcome {
    if !game.ascii_pw_done {
        return ValidationOutcome::GateNotReady {
            reason: "complete TPW first",
        };
    }
    if game.ascii_msg_done {
        return ValidationOutcome::GateNotReady {
            reason: "message phase already completed",
        };
    }
    if vector == game.expected_msg_ascii.as_slice() {
        game.ascii_msg_done = true;
        game.current_phase = Phase::A;
        ValidationOutcome::Accepted {
            phase_completed: Phase::Tmsg,
            block_completed: false,
            finished: false,
            label: Phase::Tmsg.label(0),
        }
    } else {
        game.errors += 1;
        ValidationOutcome::Rejected {
            expected: Some(game.expected_msg_ascii.clone()),
            errors_total: game.errors,
        }
    }
}

fn validate_a(game: &mut GameState, vector: &[i64]) -> ValidationOutcome {
    if game.current_phase != Phase::A {
        return ValidationOutcome::GateNotReady {
            reason: "not phase A",
        };
    }
    let i = game.current_block;
    let tweak = game.current_tweak();
    let expected = phase_a(&game.v_blocks[i], &game.prev_vec, &tweak, game.params.m);

    if vector == expected.as_slice() {
        game.u = Some(expected);
        game.current_phase = Phase::B;
        ValidationOutcome::Accepted {
            phase_completed: Phase::A,
            block_completed: false,
            finished: false,
            label: Phase::A.label(i),
        }
    } else {
        game.errors += 1;
        ValidationOutcome::Rejected {
            expected: Some(expected),
            errors_total: game.errors,
        }
    }
}

fn validate_b(game: &mut GameState, vector: &[i64]) -> ValidationOutcome {
    if game.current_phase != Phase::B {
        return ValidationOutcome::GateNotReady {
            reason: "not phase B",
        };
    }
    let Some(u) = game.u.clone() else {
        return ValidationOutcome::GateNotReady {
            reason: "complete phase A first",
        };
    };
    let i = game.current_block;
    let expected = phase_b(&u, game.params.m);

    if vector == expected.as_slice() {
        game.u_prime = Some(expected);
        game.current_phase = Phase::C;
        ValidationOutcome::Accepted {
            phase_completed: Phase::B,
            block_completed: false,
            finished: false,
            label: Phase::B.label(i),
        }
    } else {
        game.errors += 1;
        ValidationOutcome::Rejected {
            expected: Some(expected),
            errors_total: game.errors,
        }
    }
}

fn validate_c(game: &mut GameState, vector: &[i64]) -> ValidationOutcome {
    if game.current_phase != Phase::C {
        return ValidationOutcome::GateNotReady {
            reason: "not phase C",
        };
    }
    let Some(u_prime) = game.u_prime.clone() else {
        return ValidationOutcome::GateNotReady {
            reason: "complete phase B first",
        };
    };
    let i = game.current_block;
    let expected = phase_c(&u_prime, &game.params.matrix, game.params.m);

    if vector == expected.as_slice() {
        game.w = Some(expected);
        game.current_phase = Phase::D;
        ValidationOutcome::Accepted {
            phase_completed: Phase::C,
            block_completed: false,
            finished: false,
            label: Phase::C.label(i),
        }
    } else {
        game.errors += 1;
        ValidationOutcome::Rejected {
            expected: Some(expected),
            errors_total: game.errors,
        }
    }
}

fn validate_d(game: &mut GameState, vector: &[i64]) -> ValidationOutcome {
    if game.current_phase != Phase::D {
        return ValidationOutcome::GateNotReady {
            reason: "not phase D",
        };
    }
    let Some(w) = game.w.clone() else {
        return ValidationOutcome::GateNotReady {
            reason: "complete phase C first",
        };
    };
    let i = game.current_block;
    let tweak = game.current_tweak();
    let expected = phase_d(&w, &game.params.bias, &tweak, game.params.m);

    if vector == expected.as_slice() {
        game.c_blocks.push(expected.clone());
        game.prev_vec = expected;
        game.u = None;
        game.u_prime = None;
        game.w = None;
        game.current_block += 1;
        game.current_phase = Phase::A;
        game.finished = game.current_block == game.total_blocks();
        if game.finished {
            game.current_phase = Phase::Done;
        }
        ValidationOutcome::Accepted {
            phase_completed: Phase::D,
            block_completed: true,
            finished: game.finished,
            label: Phase::D.label(i),
        }
    } else {
        game.errors += 1;
        ValidationOutcome::Rejected {
            expected: Some(expected),
            errors_total: game.errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_game() -> GameState {
        GameState::new("PAZ9", "Hils", 2).unwrap()
    }

    #[test]
    fn happy_path_single_team_completes_all_blocks() {
        let mut game = sample_game();

        let out = validate(&mut game, Phase::Tpw, None, &[80, 65, 90, 57]);
        assert!(matches!(out, ValidationOutcome::Accepted { .. }));

        let out = validate(&mut game, Phase::Tmsg, None, &[72, 105, 108, 115]);
        assert!(matches!(out, ValidationOutcome::Accepted { .. }));
        assert_eq!(game.current_phase, Phase::A);

        for block in 0..game.total_blocks() {
            let tweak = game.current_tweak();
            let v = game.v_blocks[block].clone();
            let u = phase_a(&v, &game.prev_vec, &tweak, game.params.m);
            let out = validate(&mut game, Phase::A, Some(block), &u);
            assert!(matches!(out, ValidationOutcome::Accepted { .. }));

            let u_prime = phase_b(&u, game.params.m);
            let out = validate(&mut game, Phase::B, Some(block), &u_prime);
            assert!(matches!(out, ValidationOutcome::Accepted { .. }));

            let w = phase_c(&u_prime, &game.params.matrix, game.params.m);
            let out = validate(&mut game, Phase::C, Some(block), &w);
            assert!(matches!(out, ValidationOutcome::Accepted { .. }));

            let c = phase_d(&w, &game.params.bias, &tweak, game.params.m);
            let out = validate(&mut game, Phase::D, Some(block), &c);
            assert!(matches!(out, ValidationOutcome::Accepted { .. }));
        }

        assert!(game.finished);
        assert_eq!(game.errors, 0);
        assert_eq!(game.blocks_done(), 3);
    }

    #[test]
    fn wrong_phase_a_answer_increments_errors_and_leaves_state() {
        let mut game = sample_game();
        validate(&mut game, Phase::Tpw, None, &[80, 65, 90, 57]);
        validate(&mut game, Phase::Tmsg, None, &[72, 105, 108, 115]);

        let before = game.clone_for_test();
        let out = validate(&mut game, Phase::A, Some(0), &[0, 0]);
        match out {
            ValidationOutcome::Rejected { errors_total, .. } => assert_eq!(errors_total, 1),
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(game.errors, 1);
        assert_eq!(game.current_phase, before.current_phase);
        assert_eq!(game.current_block, before.current_block);
        assert_eq!(game.u, before.u);
    }

    #[test]
    fn submitting_correct_tpw_twice_rejects_the_second() {
        let mut game = sample_game();
        let out1 = validate(&mut game, Phase::Tpw, None, &[80, 65, 90, 57]);
        assert!(matches!(out1, ValidationOutcome::Accepted { .. }));
        let out2 = validate(&mut game, Phase::Tpw, None, &[80, 65, 90, 57]);
        assert!(matches!(out2, ValidationOutcome::GateNotReady { .. }));
    }

    #[test]
    fn phase_b_before_a_is_a_gate_failure_not_an_error() {
        let mut game = sample_game();
        validate(&mut game, Phase::Tpw, None, &[80, 65, 90, 57]);
        validate(&mut game, Phase::Tmsg, None, &[72, 105, 108, 115]);
        game.current_phase = Phase::B; // simulate desync: shouldn't happen via validate alone
        let out = validate(&mut game, Phase::B, Some(0), &[0, 0]);
        assert!(matches!(out, ValidationOutcome::GateNotReady { .. }));
        assert_eq!(game.errors, 0);
    }

    #[test]
    fn arity_mismatch_on_tpw_counts_as_error() {
        let mut game = sample_game();
        let out = validate(&mut game, Phase::Tpw, None, &[1, 2, 3]);
        match out {
            ValidationOutcome::Rejected { expected, errors_total } => {
                assert!(expected.is_none());
                assert_eq!(errors_total, 1);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn repushed_step_has_identical_inputs_after_rejection() {
        let mut game = sample_game();
        validate(&mut game, Phase::Tpw, None, &[80, 65, 90, 57]);
        validate(&mut game, Phase::Tmsg, None, &[72, 105, 108, 115]);
        let tweak_before = game.current_tweak();
        let v_before = game.v_blocks[0].clone();
        let prev_before = game.prev_vec.clone();

        validate(&mut game, Phase::A, Some(0), &[1, 1]); // wrong

        assert_eq!(game.current_tweak(), tweak_before);
        assert_eq!(game.v_blocks[0], v_before);
        assert_eq!(game.prev_vec, prev_before);
    }

    impl GameState {
        fn clone_for_test(&self) -> GameState {
            self.clone()
        }
    }
}
