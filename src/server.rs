//! TCP search server.
//!
//! One connection carries one request frame and one response frame. Each
//! connection runs on its own task; searches run on the blocking pool and
//! are limited by a semaphore (`max_concurrent_searches`, 1 by default so
//! that at most one search walks the disk at a time). Server control
//! actions bypass the semaphore.
//!
//! Every search gets a child of the server's cancellation token. `Kill`
//! cancels that parent token and installs a fresh one, so searches that
//! are running or waiting for a permit stop, and later ones are unaffected.

use crate::config::ConfigStore;
use crate::dispatch::Dispatcher;
use crate::error::{ProtocolError, SearchError, ServerError};
use crate::protocol::{read_frame, write_frame, Request, Response};
use crate::services::{GrepConfig, GrepService, Opener};
use crate::types::Action;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 2020;

/// Server tuning knobs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Searches allowed to run at the same time
    pub max_concurrent_searches: usize,
    /// How long a client may take to send its request frame
    pub read_timeout: Duration,
    pub grep: GrepConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_searches: 1,
            read_timeout: Duration::from_secs(30),
            grep: GrepConfig::default(),
        }
    }
}

struct Shared {
    store: ConfigStore,
    dispatcher: Dispatcher,
    searches: Semaphore,
    cancel: Mutex<CancellationToken>,
    read_timeout: Duration,
}

/// The search server. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Server {
    shared: Arc<Shared>,
}

impl Server {
    #[must_use]
    pub fn new(store: ConfigStore, config: ServerConfig, opener: Arc<dyn Opener>) -> Self {
        let dispatcher = Dispatcher::new(GrepService::with_config(config.grep), opener);
        Self {
            shared: Arc::new(Shared {
                store,
                dispatcher,
                searches: Semaphore::new(config.max_concurrent_searches.max(1)),
                cancel: Mutex::new(CancellationToken::new()),
                read_timeout: config.read_timeout,
            }),
        }
    }

    /// Binds a listener on `addr`.
    ///
    /// # Errors
    ///
    /// Returns the bind error.
    pub async fn bind(addr: impl ToSocketAddrs) -> std::io::Result<TcpListener> {
        let listener = TcpListener::bind(addr).await?;
        if let Ok(local) = listener.local_addr() {
            tracing::info!("Listening on {local}");
        }
        Ok(listener)
    }

    /// Accepts connections until `shutdown` fires.
    ///
    /// Accept errors are logged and the loop carries on.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("Shutting down");
                    self.cancel_searches();
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let server = self.clone();
                        tokio::spawn(async move { server.handle_connection(stream, peer).await });
                    }
                    Err(e) => tracing::warn!("Accept failed: {e}"),
                },
            }
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) {
        let read = tokio::time::timeout(
            self.shared.read_timeout,
            read_frame::<_, Request>(&mut stream),
        )
        .await;

        let response = match read {
            Ok(Ok(request)) => {
                tracing::debug!("{peer}: {request:?}");
                self.respond(request).await
            }
            Ok(Err(e)) => {
                tracing::warn!("{peer}: bad request: {e}");
                ServerError::from(e).into()
            }
            Err(_) => {
                tracing::warn!("{peer}: timed out waiting for request");
                ServerError::from(ProtocolError::Timeout).into()
            }
        };

        if let Err(e) = write_frame(&mut stream, &response).await {
            tracing::warn!("{peer}: cannot send response: {e}");
        }
    }

    /// Answers one request. Never fails: errors become `Error` responses.
    pub async fn respond(&self, request: Request) -> Response {
        match request.action {
            Action::ListProjects => Response::Projects {
                projects: self.shared.store.snapshot().to_vec(),
            },
            Action::Reload => self.reload().await,
            Action::Kill => {
                self.cancel_searches();
                Response::ack("cancelled in-flight searches")
            }
            _ => self.search(request).await,
        }
    }

    async fn search(&self, request: Request) -> Response {
        let cancel = self.current_token().child_token();

        let permit = tokio::select! {
            permit = self.shared.searches.acquire() => permit,
            () = cancel.cancelled() => return ServerError::from(SearchError::Cancelled).into(),
        };
        let Ok(_permit) = permit else {
            return Response::error("SHUTTING_DOWN", "server is shutting down");
        };

        let shared = Arc::clone(&self.shared);
        let result = tokio::task::spawn_blocking(move || {
            let projects = shared.store.snapshot();
            shared.dispatcher.handle(&projects, &request, &cancel)
        })
        .await;

        match result {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Search task failed: {e}");
                Response::error("INTERNAL_ERROR", e.to_string())
            }
        }
    }

    async fn reload(&self) -> Response {
        let shared = Arc::clone(&self.shared);
        let result = tokio::task::spawn_blocking(move || shared.store.reload()).await;
        match result {
            Ok(Ok(set)) => {
                if let Some(path) = self.shared.store.path() {
                    tracing::info!("Reloaded {} projects from {}", set.len(), path.display());
                }
                Response::ack(format!("reloaded {} projects", set.len()))
            }
            Ok(Err(e)) => {
                tracing::warn!("Reload failed, keeping previous configuration: {e}");
                ServerError::from(e).into()
            }
            Err(e) => Response::error("INTERNAL_ERROR", e.to_string()),
        }
    }

    fn current_token(&self) -> CancellationToken {
        self.shared
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cancels every running or queued search.
    pub fn cancel_searches(&self) {
        let mut current = self
            .shared
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        current.cancel();
        *current = CancellationToken::new();
        tracing::info!("Cancelled in-flight searches");
    }
}
