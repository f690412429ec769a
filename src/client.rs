//! Client side of the wire protocol.

use crate::config::Project;
use crate::error::ProtocolError;
use crate::protocol::{read_frame, write_frame, Request, Response};
use crate::types::Action;
use std::time::Duration;
use tokio::net::TcpStream;

/// How long to wait for the server to accept a connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends requests to a running server, one connection per request.
#[derive(Debug, Clone)]
pub struct Client {
    addr: String,
}

impl Client {
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Sends `request` and waits for the server's answer.
    ///
    /// There is no timeout on the answer itself: a regex search over a
    /// large project may legitimately take a while.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Timeout` if the connection is not accepted in
    /// time, or any I/O or framing error.
    pub async fn send(&self, request: &Request) -> Result<Response, ProtocolError> {
        let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| ProtocolError::Timeout)??;
        write_frame(&mut stream, request).await?;
        read_frame(&mut stream).await
    }

    /// Fetches the server's projects, in configuration order.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Rejected` if the server answers with an
    /// error, or any error of [`Client::send`].
    pub async fn projects(&self) -> Result<Vec<Project>, ProtocolError> {
        match self.send(&Request::control(Action::ListProjects)).await? {
            Response::Projects { projects } => Ok(projects),
            Response::Error { code, message } => Err(ProtocolError::Rejected { code, message }),
            other => Err(ProtocolError::UnexpectedResponse(format!("{other:?}"))),
        }
    }
}
