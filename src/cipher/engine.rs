//! C3 — CipherEngine: the four pure phase functions (pre-whitening, S-box,
//! linear mixing, post-whitening) plus their inverses, and the CBC-like
//! chaining rule used between blocks.
//!
//! Nothing here holds state — [`crate::game::state::GameState`] is the only
//! place a block index or chaining vector is remembered across calls.

use super::keyderive::CipherParams;
use super::modarith::{mat_inverse_mod, mat_vec_mul, sbox, sbox_inv};

fn elementwise_add(a: &[i64], b: &[i64], m: i64) -> Vec<i64> {
    a.iter().zip(b.iter()).map(|(x, y)| (x + y).rem_euclid(m)).collect()
}

fn elementwise_sub(a: &[i64], b: &[i64], m: i64) -> Vec<i64> {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).rem_euclid(m)).collect()
}

/// Phase A: `u = (v_i + prev + t_i) mod m`.
pub fn phase_a(v: &[i64], prev: &[i64], tweak: &[i64], m: i64) -> Vec<i64> {
    elementwise_add(&elementwise_add(v, prev, m), tweak, m)
}

/// Phase A inverse: recover `v_i` from `u`.
pub fn phase_a_inv(u: &[i64], prev: &[i64], tweak: &[i64], m: i64) -> Vec<i64> {
    elementwise_sub(&elementwise_sub(u, prev, m), tweak, m)
}

/// Phase B: elementwise S-box.
pub fn phase_b(u: &[i64], m: i64) -> Vec<i64> {
    u.iter().map(|&x| sbox(x, m)).collect()
}

/// Phase B inverse: elementwise cube-root via the derived exponent.
pub fn phase_b_inv(u_prime: &[i64], m: i64) -> Vec<i64> {
    u_prime.iter().map(|&y| sbox_inv(y, m).expect("m chosen invertible by derivation")).collect()
}

/// Phase C: `w = M . u' mod m`.
pub fn phase_c(u_prime: &[i64], matrix: &[Vec<i64>], m: i64) -> Vec<i64> {
    mat_vec_mul(matrix, u_prime, m)
}

/// Phase C inverse: `u' = M^-1 . w mod m`.
pub fn phase_c_inv(w: &[i64], matrix: &[Vec<i64>], m: i64) -> Vec<i64> {
    let inv = mat_inverse_mod(matrix, m).expect("matrix chosen invertible by derivation");
    mat_vec_mul(&inv, w, m)
}

/// Phase D: `c_i = (w + b + t_i) mod m`.
pub fn phase_d(w: &[i64], bias: &[i64], tweak: &[i64], m: i64) -> Vec<i64> {
    elementwise_add(&elementwise_add(w, bias, m), tweak, m)
}

/// Phase D inverse: recover `w` from `c_i`.
pub fn phase_d_inv(c: &[i64], bias: &[i64], tweak: &[i64], m: i64) -> Vec<i64> {
    elementwise_sub(&elementwise_sub(c, bias, m), tweak, m)
}

/// Encrypt every block of `v_blocks`, chaining `prev` from `IV` through each
/// block's post-whitened ciphertext. Used by tests and the inverse-roundtrip
/// checks; the live game never calls this directly — it walks the same
/// phases one step at a time through [`crate::game::validator`].
pub fn encrypt_blocks(params: &CipherParams, v_blocks: &[Vec<i64>]) -> Vec<Vec<i64>> {
    let mut prev = params.iv.clone();
    let mut out = Vec::with_capacity(v_blocks.len());
    for (i, v) in v_blocks.iter().enumerate() {
        let tweak = super::keyderive::block_tweak(params.key_sum, params.m, i, params.n);
        let u = phase_a(v, &prev, &tweak, params.m);
        let u_prime = phase_b(&u, params.m);
        let w = phase_c(&u_prime, &params.matrix, params.m);
        let c = phase_d(&w, &params.bias, &tweak, params.m);
        out.push(c.clone());
        prev = c;
    }
    out
}

/// Inverse of [`encrypt_blocks`].
pub fn decrypt_blocks(params: &CipherParams, c_blocks: &[Vec<i64>]) -> Vec<Vec<i64>> {
    let mut prev = params.iv.clone();
    let mut out = Vec::with_capacity(c_blocks.len());
    for (i, c) in c_blocks.iter().enumerate() {
        let tweak = super::keyderive::block_tweak(params.key_sum, params.m, i, params.n);
        let w = phase_d_inv(c, &params.bias, &tweak, params.m);
        let u_prime = phase_c_inv(&w, &params.matrix, params.m);
        let u = phase_b_inv(&u_prime, params.m);
        let v = phase_a_inv(&u, &prev, &tweak, params.m);
        out.push(v);
        prev = c.clone();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::keyderive::derive_params;
    use crate::cipher::pkcs7::{into_blocks, pad, unpad};

    #[test]
    fn encrypt_decrypt_round_trips_with_iv_chaining() {
        let params = derive_params(b"PAZ9", 2).unwrap();
        let padded = pad(b"Hils", 2);
        let v_blocks = into_blocks(&padded, 2);

        let c_blocks = encrypt_blocks(&params, &v_blocks);
        assert_eq!(c_blocks.len(), v_blocks.len());

        let recovered_blocks = decrypt_blocks(&params, &c_blocks);
        assert_eq!(recovered_blocks, v_blocks);

        let flat: Vec<u8> = recovered_blocks
            .into_iter()
            .flatten()
            .map(|x| x as u8)
            .collect();
        let plain = unpad(&flat, 2).unwrap();
        assert_eq!(plain, b"Hils");
    }

    #[test]
    fn chaining_uses_iv_then_previous_ciphertext() {
        let params = derive_params(b"ABCD", 2).unwrap();
        let v_blocks = vec![vec![1, 2], vec![3, 4], vec![5, 6]];
        let c_blocks = encrypt_blocks(&params, &v_blocks);

        let tweak0 = super::super::keyderive::block_tweak(params.key_sum, params.m, 0, params.n);
        let expected_u0 = phase_a(&v_blocks[0], &params.iv, &tweak0, params.m);
        let expected_u0_prime = phase_b(&expected_u0, params.m);
        let expected_w0 = phase_c(&expected_u0_prime, &params.matrix, params.m);
        let expected_c0 = phase_d(&expected_w0, &params.bias, &tweak0, params.m);
        assert_eq!(c_blocks[0], expected_c0);

        let tweak1 = super::super::keyderive::block_tweak(params.key_sum, params.m, 1, params.n);
        let expected_u1 = phase_a(&v_blocks[1], &c_blocks[0], &tweak1, params.m);
        let expected_u1_prime = phase_b(&expected_u1, params.m);
        let expected_w1 = phase_c(&expected_u1_prime, &params.matrix, params.m);
        let expected_c1 = phase_d(&expected_w1, &params.bias, &tweak1, params.m);
        assert_eq!(c_blocks[1], expected_c1);
    }
}
