//! # Remision Server
//!
//! JSON API over the remision ledger.
//!
//! This crate provides:
//! - The five endpoints of the web front end (sequence, save, update,
//!   history, customers)
//! - Typed handlers usable without any HTTP layer
//! - Mapping from ledger errors to HTTP status codes
//!
//! # Architecture
//!
//! The server owns no socket. An embedding HTTP layer turns each request
//! into an [`ApiRequest`], calls [`ApiServer::handle`] and writes back the
//! [`ApiResponse`]. All state lives in the ledger adapter, so any number of
//! server instances may share one document store.
//!
//! # Endpoints
//!
//! | Path                   | Method | Body             |
//! |------------------------|--------|------------------|
//! | `/api/get-sequence`    | GET    |                  |
//! | `/api/save-remision`   | POST   | draft            |
//! | `/api/update-remision` | POST   | number + deleted |
//! | `/api/get-history`     | GET    |                  |
//! | `/api/get-clientes`    | GET    |                  |

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use handler::{HandlerContext, RequestHandler, SaveResponse, UpdateRequest, UpdateResponse};
pub use server::{ApiRequest, ApiResponse, ApiServer, Method};
