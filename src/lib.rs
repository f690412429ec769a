//! chordfind: editor-driven code search daemon.
//!
//! The editor hands the client a chord (`proj:go:func`) and a target
//! (`Serve`); the client turns them into a request and sends it over TCP
//! to a long-running server, which answers with matching lines, a file
//! position, or an error.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          Client (chord → Request)           │
//! └─────────────────┬───────────────────────────┘
//!                   │ length-prefixed JSON over TCP
//! ┌─────────────────▼───────────────────────────┐
//! │                 Server                       │
//! │  task per connection, search semaphore,     │
//! │  Kill / Reload / ListProjects               │
//! └─────────────────┬───────────────────────────┘
//!                   │ spawn_blocking
//! ┌─────────────────▼───────────────────────────┐
//! │     Dispatcher (scope check, strategy)      │
//! └───────┬─────────────┬─────────────┬─────────┘
//!         │             │             │
//!    ┌────▼───┐   ┌─────▼────┐  ┌─────▼─────┐
//!    │  Grep  │   │   Scan   │  │  Resolve  │
//!    │ rayon  │   │ one file │  │ + opener  │
//!    └────────┘   └──────────┘  └───────────┘
//! ```

pub mod chord;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fmt;
pub mod protocol;
pub mod security;
pub mod server;
pub mod services;
pub mod types;

pub use error::{Result, ServerError};
pub use types::{Action, Element, Language};
