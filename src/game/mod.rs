//! Per-team game progression: the `Phase` sum type (C4), `GameState` (C4),
//! and the `StepValidator` that is the sole writer of state (C5).

pub mod phase;
pub mod state;
pub mod validator;

pub use phase::Phase;
pub use state::GameState;
pub use validator::{validate, ValidationOutcome};
