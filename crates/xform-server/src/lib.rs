//! xform server library
//!
//! This crate puts the xform evaluation core behind HTTP:
//! - `POST /api/evaluate` returning the response envelope
//! - `GET /api/engines` and `GET /health`
//! - Layered configuration and logging setup
//! - Server lifecycle management

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;

pub use config::Config;
pub use error::{Result, ServerError};
pub use server::Server;
