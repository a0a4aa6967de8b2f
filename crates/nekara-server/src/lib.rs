//! # nekara-server: Session router for `Nekara`
//!
//! This crate maps session IDs to [`TestingSession`]s and dispatches named
//! operations to them. Requests arrive as [`nekara_wire::Request`]s; every
//! outcome, including panics inside a handler, leaves as a
//! [`nekara_wire::Response`].
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      nekara-server                        │
//! │  ┌───────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │  Request  │ → │ NekaraServer │ → │ TestingSession   │  │
//! │  │  (wire)   │   │ (op table)   │   │ (per session id) │  │
//! │  └───────────┘   └──────────────┘   └──────────────────┘  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! The transport is left to the embedder: anything that can move a
//! `Request` to [`NekaraServer::handle`] and the `Response` back will do.
//! In-process callers use the [`nekara_wire::Service`] impl directly.
//!
//! ## Usage
//!
//! ```ignore
//! use nekara_server::{NekaraServer, ServerOptions};
//!
//! let server = NekaraServer::new(ServerOptions::default());
//! let response = server.handle(request);
//! ```
//!
//! [`TestingSession`]: nekara_core::TestingSession

mod args;
mod error;
mod operations;
mod router;
pub mod summary;

pub use args::Args;
pub use error::{ServerError, ServerResult, error_to_wire};
pub use router::{NekaraServer, ServerOptions, TEARDOWN_REASON};
pub use summary::{SUMMARY_HEADER, SummaryLog};
