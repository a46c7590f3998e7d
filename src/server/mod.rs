//! HTTP/1.x plumbing: connection reads under a deadline, request parsing,
//! response serialization, request dispatch and the TCP transport.

pub mod connection;
pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use connection::{Connection, Deadline};
pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_request, read_request, Request};
pub use response::Response;
pub use service::{AppService, ADMIN_PATH};
