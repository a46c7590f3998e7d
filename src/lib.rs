//! # contactd
//!
//! A small, hardened HTTP/1.x server for a static website with a contact
//! form and a password-protected admin view of the submissions.
//!
//! ## Overview
//!
//! Every connection carries exactly one request:
//!
//! - `GET /admin` passes a Basic-Auth gate and renders the stored
//!   submissions as HTML cards inside `admin.html`
//! - any other `GET` is answered from the document root
//! - `POST /contact` decodes a URL-encoded form, appends it to the
//!   submissions file and serves the thank-you page
//! - every other method is answered with 405
//!
//! The connection is then closed.
//!
//! ## Architecture
//!
//! - **[`server`]** - TCP transport, request parsing and the dispatcher
//! - **[`static_files`]** - document-root confined file serving
//! - **[`contact`]** - the `POST /contact` handler
//! - **[`submissions`]** - the append-only submissions store
//! - **[`security`]** - Basic-Auth for the admin view
//! - **[`admin`]** - rendering of the admin page
//! - **[`worker_pool`]** - bounded thread pool for `pool` mode
//! - **[`config`]** / **[`otel`]** / **[`cli`]** - configuration, logging, binary entry
//!
//! ## Quick Start
//!
//! ```no_run
//! use contactd::{AppService, HttpServer, ServerConfig};
//! use std::sync::Arc;
//!
//! let config = ServerConfig::default();
//! let addr = config.bind_addr();
//! let service = AppService::new(Arc::new(config)).expect("service");
//! let handle = HttpServer(Arc::new(service)).start(addr.as_str()).expect("bind");
//! handle.wait_ready().expect("ready");
//! handle.stop();
//! ```
//!
//! ## Limits
//!
//! Header block size, body size and a per-request read deadline are bounded
//! by [`config::Limits`]; violations are answered with 431, 413 and 408.
//! Malformed input is a 400. Handler failures, panics included, become a
//! 500 and never take the process down.

pub mod admin;
pub mod cli;
pub mod config;
pub mod contact;
pub mod error;
pub mod otel;
pub mod security;
pub mod server;
pub mod static_files;
pub mod submissions;
pub mod worker_pool;

pub use config::ServerConfig;
pub use error::{ConfigError, ServerError};
pub use server::{AppService, HttpServer, ServerHandle};
