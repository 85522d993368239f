//! Read-only local status API of the agent.
//!
//! Every endpoint answers from copies taken at request time; nothing here holds a lock on
//! the agent or the model across an await.

mod error;
pub use error::ApiError;

mod handler;
pub use handler::{AgentInfo, ApiHandler, Exposition};

mod adapter;
pub use adapter::AgentApiAdapter;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpApi;

#[cfg(feature = "http")]
pub use axum;
