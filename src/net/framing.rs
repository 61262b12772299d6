//! C6 — Framing: `uint32 big-endian length` ∥ UTF-8 JSON object over any
//! async byte stream. Every frame boundary is explicit; there is no
//! delimiter-scanning.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::MAX_FRAME_LEN;

#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("connection closed")]
    Eof,
    #[error("frame length {0} is zero")]
    ZeroLength(u32),
    #[error("frame length {0} exceeds maximum {MAX_FRAME_LEN}")]
    TooLarge(u32),
    #[error("frame was not valid UTF-8")]
    NotUtf8,
    #[error("frame was not valid JSON: {0}")]
    BadJson(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FramingError {
    /// Per §4.5/§7: short reads, bad length prefixes, and parse errors are
    /// all fail-closed — the session loop treats every one of them as a
    /// disconnect, never a recoverable protocol error.
    pub fn is_disconnect(&self) -> bool {
        true
    }
}

/// Read one length-prefixed JSON frame and deserialize it as `T`.
pub async fn read_frame<T, R>(reader: &mut R) -> Result<T, FramingError>
where
    T: DeserializeOwned,
    R: tokio::io::AsyncRead + Unpin,
{
    let bytes = read_frame_bytes(reader).await?;
    let value = serde_json::from_slice(&bytes)?;
    Ok(value)
}

/// Read one length-prefixed frame's raw bytes, validating length and UTF-8.
pub async fn read_frame_bytes<R>(reader: &mut R) -> Result<Vec<u8>, FramingError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(FramingError::Eof),
        Err(e) => return Err(FramingError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf);
    if len == 0 {
        return Err(FramingError::ZeroLength(len));
    }
    if len > MAX_FRAME_LEN {
        return Err(FramingError::TooLarge(len));
    }

    let mut body = vec![0u8; len as usize];
    match reader.read_exact(&mut body).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(FramingError::Eof),
        Err(e) => return Err(FramingError::Io(e)),
    }
    if std::str::from_utf8(&body).is_err() {
        return Err(FramingError::NotUtf8);
    }
    Ok(body)
}

/// Serialize `value` as JSON and write it as one length-prefixed frame.
pub async fn write_frame<T, W>(writer: &mut W, value: &T) -> Result<(), FramingError>
where
    T: Serialize,
    W: tokio::io::AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value)?;
    let len = u32::try_from(body.len()).map_err(|_| FramingError::TooLarge(u32::MAX))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ping {
        n: u32,
    }

    #[tokio::test]
    async fn round_trips_a_frame() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, &Ping { n: 7 }).await.unwrap();
        let got: Ping = read_frame(&mut server).await.unwrap();
        assert_eq!(got, Ping { n: 7 });
    }

    #[tokio::test]
    async fn zero_length_prefix_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(&0u32.to_be_bytes()).await.unwrap();
        let err = read_frame_bytes(&mut server).await.unwrap_err();
        assert!(matches!(err, FramingError::ZeroLength(0)));
    }

    #[tokio::test]
    async fn oversized_prefix_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(&(MAX_FRAME_LEN + 1).to_be_bytes()).await.unwrap();
        let err = read_frame_bytes(&mut server).await.unwrap_err();
        assert!(matches!(err, FramingError::TooLarge(_)));
    }

    #[tokio::test]
    async fn short_read_mid_frame_reports_eof() {
        let (client, mut server) = tokio::io::duplex(1024);
        drop(client);
        let err = read_frame_bytes(&mut server).await.unwrap_err();
        assert!(matches!(err, FramingError::Eof));
    }

    #[tokio::test]
    async fn malformed_json_body_reports_bad_json() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let body = b"not json".to_vec();
        client.write_all(&(body.len() as u32).to_be_bytes()).await.unwrap();
        client.write_all(&body).await.unwrap();
        let res: Result<serde_json::Value, FramingError> = read_frame(&mut server).await;
        assert!(matches!(res, Err(FramingError::BadJson(_))));
    }

    #[test]
    fn framing_errors_are_always_treated_as_disconnects() {
        assert!(FramingError::Eof.is_disconnect());
        assert!(FramingError::ZeroLength(0).is_disconnect());
    }
}
