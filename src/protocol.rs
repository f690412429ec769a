//! Wire format between client and server.
//!
//! One request and one response per TCP connection. Each message is a
//! frame: a 4-byte big-endian length followed by that many bytes of JSON.

use crate::config::Project;
use crate::error::ProtocolError;
use crate::types::Action;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame accepted in either direction.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// A search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// What kind of search (sent as its integer code)
    pub action: Action,
    /// Location descriptor: `proj:all`, `proj:loc:<path>` or `proj:<language>`
    #[serde(rename = "where", default)]
    pub location: String,
    /// Search target: a regex, a file name or a language element
    #[serde(rename = "what", default)]
    pub target: String,
}

impl Request {
    #[must_use]
    pub fn new(action: Action, location: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            action,
            location: location.into(),
            target: target.into(),
        }
    }

    /// A request for one of the server control actions.
    #[must_use]
    pub fn control(action: Action) -> Self {
        Self::new(action, "", "")
    }
}

/// One matching line of a regex search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMatch {
    pub path: PathBuf,
    /// 1-based line number
    pub line: u64,
    /// 1-based byte column of the first match on the line
    #[serde(default)]
    pub column: u64,
    /// Content of the line, without the trailing newline
    pub text: String,
}

/// The server's answer to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    /// Matching lines, grouped by file
    Matches {
        matches: Vec<LineMatch>,
        /// Whether the match cap cut the result short
        #[serde(default)]
        truncated: bool,
    },
    /// A resolved file or directory, with the definition line when known
    Located {
        path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line: Option<u64>,
    },
    /// Snapshot of the server's project configuration
    Projects { projects: Vec<Project> },
    /// Request accepted, nothing to report
    Ack { message: String },
    /// Request failed; the server carries on
    Error { code: String, message: String },
}

impl Response {
    #[must_use]
    pub fn ack(message: impl Into<String>) -> Self {
        Self::Ack {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl From<crate::error::ServerError> for Response {
    fn from(err: crate::error::ServerError) -> Self {
        Self::error(err.code(), err.to_string())
    }
}

/// Reads one frame and decodes it.
///
/// # Errors
///
/// Returns `ProtocolError` if the peer closes early, the frame is larger
/// than [`MAX_FRAME_BYTES`], or the payload is not valid JSON for `T`.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: for<'de> Deserialize<'de>,
{
    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            limit: MAX_FRAME_BYTES,
        });
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(serde_json::from_slice(&buf)?)
}

/// Encodes `value` and writes it as one frame.
///
/// # Errors
///
/// Returns `ProtocolError` if encoding fails, the encoded value is larger
/// than [`MAX_FRAME_BYTES`], or the write fails.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(value)?;
    if payload.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge {
            size: payload.len(),
            limit: MAX_FRAME_BYTES,
        });
    }
    // Bounded by MAX_FRAME_BYTES above
    let len = payload.len() as u32;
    writer.write_u32(len).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let req = Request::new(Action::GoFunction, "camli:go", "Serve");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["action"], 10);
        assert_eq!(json["where"], "camli:go");
        assert_eq!(json["what"], "Serve");
    }

    #[test]
    fn test_unknown_action_code_fails_to_decode() {
        let raw = br#"{"action": 42, "where": "p:all", "what": "x"}"#;
        assert!(serde_json::from_slice::<Request>(raw).is_err());
    }

    #[test]
    fn test_response_tagging() {
        let resp = Response::Located {
            path: PathBuf::from("/src/a.go"),
            line: None,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["kind"], "located");
        assert!(json.get("line").is_none());
    }

    #[tokio::test]
    async fn test_frame_through_pipe() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let req = Request::new(Action::Regex, "p:all", "fn main");
        write_frame(&mut a, &req).await.unwrap();
        let got: Request = read_frame(&mut b).await.unwrap();
        assert_eq!(got, req);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32((MAX_FRAME_BYTES + 1) as u32).await.unwrap();
        let err = read_frame::<_, Request>(&mut b).await.unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_truncated_frame_is_eof() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32(10).await.unwrap();
        a.write_all(b"{}").await.unwrap();
        drop(a);
        let err = read_frame::<_, Request>(&mut b).await.unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedEof));
    }
}
