//! Error types for the field-arithmetic and key-derivation layers.

#[derive(Debug, thiserror::Error)]
pub enum ModArithError {
    #[error("no inverse of {a} modulo {m}")]
    NoInverse { a: i64, m: i64 },
    #[error("matrix is singular modulo {m}")]
    Singular { m: i64 },
    #[error("{0} is not prime")]
    NotPrime(i64),
}

#[derive(Debug, thiserror::Error)]
pub enum DerivationError {
    #[error("failed to derive invertible cipher parameters within the attempt budget")]
    DerivationExhausted,
    #[error(transparent)]
    ModArith(#[from] ModArithError),
}
