//! The HASCILL reference cipher: modular arithmetic (C1), deterministic key
//! derivation (C2), and the four-phase block cipher (C3). Everything in
//! this module is a pure function — no I/O, no shared state, no locks.

pub mod engine;
pub mod error;
pub mod keyderive;
pub mod modarith;
pub mod pkcs7;

pub use error::{DerivationError, ModArithError};
pub use keyderive::{derive_params, CipherParams};
