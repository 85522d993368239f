//! HTTP client for the hive master.
//!
//! Every request carries the caller's `user` query parameter and the client version header.
//! Statuses the master answers with a response envelope (e.g. `404 JOB_NOT_FOUND` on deploy)
//! are decoded like a `200`; a bare `404` on a lookup means "no such thing" and yields `None`.

mod config;
pub use config::ClientConfig;

mod error;
pub use error::ClientError;

mod client;
pub use client::{
    CLIENT_VERSION, CLIENT_VERSION_HEADER, MasterClient, SERVER_VERSION_HEADER,
    VERSION_STATUS_HEADER,
};
