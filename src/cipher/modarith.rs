//! C1 — ModArith: modular arithmetic primitives the rest of the cipher
//! engine is built from. Everything here is a pure function over `i64`;
//! nothing allocates beyond the matrices/vectors it is handed.

use super::error::ModArithError;

/// Reduce `a` into `[0, m)`, tolerating negative inputs.
pub fn rem_euclid_i64(a: i64, m: i64) -> i64 {
    a.rem_euclid(m)
}

/// Extended-Euclidean modular inverse of `a` modulo `m`.
///
/// Fails with [`ModArithError::NoInverse`] when `gcd(a, m) != 1`.
pub fn inv_int(a: i64, m: i64) -> Result<i64, ModArithError> {
    let (mut old_r, mut r) = (a.rem_euclid(m), m);
    let (mut old_s, mut s) = (1i64, 0i64);

    while r != 0 {
        let q = old_r / r;
        let (new_r, new_s) = (old_r - q * r, old_s - q * s);
        old_r = r;
        r = new_r;
        old_s = s;
        s = new_s;
    }

    if old_r != 1 {
        return Err(ModArithError::NoInverse { a, m });
    }
    Ok(old_s.rem_euclid(m))
}

/// Trial-division primality test. `p < 2` is never prime.
pub fn is_prime(p: i64) -> bool {
    if p < 2 {
        return false;
    }
    if p < 4 {
        return true;
    }
    if p % 2 == 0 {
        return false;
    }
    let mut d = 3i64;
    while d * d <= p {
        if p % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// Smallest prime `p >= max(2, start)` for which `pred(p)` holds.
pub fn next_prime_with(start: i64, pred: impl Fn(i64) -> bool) -> i64 {
    let mut p = start.max(2);
    loop {
        if is_prime(p) && pred(p) {
            return p;
        }
        p += 1;
    }
}

/// `x^3 mod m`, the cipher's S-box.
pub fn sbox(x: i64, m: i64) -> i64 {
    let x = x.rem_euclid(m);
    mod_pow(x, 3, m)
}

/// Inverse S-box: `y^e mod m` with `e = inv_int(3, m - 1)`.
///
/// Requires `gcd(3, m - 1) = 1`, which the key-derivation layer guarantees
/// by construction for every prime it accepts.
pub fn sbox_inv(y: i64, m: i64) -> Result<i64, ModArithError> {
    let e = inv_int(3, m - 1)?;
    Ok(mod_pow(y.rem_euclid(m), e, m))
}

fn mod_pow(mut base: i64, mut exp: i64, m: i64) -> i64 {
    if m == 1 {
        return 0;
    }
    let mut result = 1i64;
    base = base.rem_euclid(m);
    while exp > 0 {
        if exp & 1 == 1 {
            result = (result * base).rem_euclid(m);
        }
        exp >>= 1;
        base = (base * base).rem_euclid(m);
    }
    result
}

/// `M * v mod m`, row by row, reducing after each row's dot product.
pub fn mat_vec_mul(mat: &[Vec<i64>], v: &[i64], m: i64) -> Vec<i64> {
    mat.iter()
        .map(|row| {
            row.iter()
                .zip(v.iter())
                .fold(0i64, |acc, (a, b)| acc + a * b)
                .rem_euclid(m)
        })
        .collect()
}

/// Determinant mod `m` via cofactor expansion along the first row.
pub fn det_mod(mat: &[Vec<i64>], m: i64) -> i64 {
    let n = mat.len();
    if n == 1 {
        return mat[0][0].rem_euclid(m);
    }
    let mut det = 0i64;
    for j in 0..n {
        let minor = minor_matrix(mat, 0, j);
        let cofactor = det_mod(&minor, m) * mat[0][j];
        let sign = if j % 2 == 0 { 1 } else { -1 };
        det = (det + sign * cofactor).rem_euclid(m);
    }
    det
}

fn minor_matrix(mat: &[Vec<i64>], skip_row: usize, skip_col: usize) -> Vec<Vec<i64>> {
    mat.iter()
        .enumerate()
        .filter(|(i, _)| *i != skip_row)
        .map(|(_, row)| {
            row.iter()
                .enumerate()
                .filter(|(j, _)| *j != skip_col)
                .map(|(_, v)| *v)
                .collect()
        })
        .collect()
}

/// Adjugate (transpose of the cofactor matrix) mod `m`.
pub fn adjugate_mod(mat: &[Vec<i64>], m: i64) -> Vec<Vec<i64>> {
    let n = mat.len();
    let mut cofactors = vec![vec![0i64; n]; n];
    for i in 0..n {
        for j in 0..n {
            let minor = minor_matrix(mat, i, j);
            let sign = if (i + j) % 2 == 0 { 1 } else { -1 };
            cofactors[i][j] = (sign * det_mod(&minor, m)).rem_euclid(m);
        }
    }
    // transpose
    let mut adj = vec![vec![0i64; n]; n];
    for i in 0..n {
        for j in 0..n {
            adj[j][i] = cofactors[i][j];
        }
    }
    adj
}

/// `M^-1 mod m` via `adjugate(M) * inv(det(M))`.
///
/// Fails with [`ModArithError::Singular`] when `det(M) == 0 mod m`.
pub fn mat_inverse_mod(mat: &[Vec<i64>], m: i64) -> Result<Vec<Vec<i64>>, ModArithError> {
    let det = det_mod(mat, m);
    if det == 0 {
        return Err(ModArithError::Singular { m });
    }
    let det_inv = inv_int(det, m)?;
    let adj = adjugate_mod(mat, m);
    Ok(adj
        .into_iter()
        .map(|row| row.into_iter().map(|v| (v * det_inv).rem_euclid(m)).collect())
        .collect())
}
