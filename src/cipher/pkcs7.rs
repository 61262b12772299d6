//! PKCS#7 padding of the ASCII plaintext into `n`-wide blocks.

/// Pad `data` with PKCS#7 to a multiple of `block_size`. A full pad block of
/// `block_size` bytes (value `block_size`) is appended when `data.len()` is
/// already a multiple of `block_size`, per the standard PKCS#7 rule.
pub fn pad(data: &[u8], block_size: usize) -> Vec<u8> {
    assert!(block_size > 0 && block_size <= 255);
    let pad_len = block_size - (data.len() % block_size);
    let mut out = data.to_vec();
    out.extend(std::iter::repeat(pad_len as u8).take(pad_len));
    out
}

/// Inverse of [`pad`]. Returns `None` if the padding is malformed.
pub fn unpad(data: &[u8], block_size: usize) -> Option<Vec<u8>> {
    if data.is_empty() || data.len() % block_size != 0 {
        return None;
    }
    let pad_len = *data.last()? as usize;
    if pad_len == 0 || pad_len > block_size || pad_len > data.len() {
        return None;
    }
    let boundary = data.len() - pad_len;
    if data[boundary..].iter().any(|&b| b as usize != pad_len) {
        return None;
    }
    Some(data[..boundary].to_vec())
}

/// Split padded bytes into `n`-wide `i64` blocks.
pub fn into_blocks(data: &[u8], n: usize) -> Vec<Vec<i64>> {
    data.chunks(n).map(|c| c.iter().map(|&b| b as i64).collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_then_unpad_round_trips() {
        for msg in ["Hils", "", "a", "abcdef", "12345678"] {
            let bytes = msg.as_bytes();
            for n in [2usize, 4, 6, 8] {
                let padded = pad(bytes, n);
                assert_eq!(padded.len() % n, 0);
                let unpadded = unpad(&padded, n).expect("valid padding");
                assert_eq!(unpadded, bytes);
            }
        }
    }

    #[test]
    fn hils_pads_to_six_with_n_two() {
        let padded = pad(b"Hils", 2);
        assert_eq!(padded, vec![72, 105, 108, 115, 2, 2]);
    }
}
