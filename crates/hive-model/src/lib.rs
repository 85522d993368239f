//! Domain types shared by the hive agent, its local API and the master client.
//!
//! Everything here is plain data: serde-serializable, cheap to clone and free of I/O.

mod error;
pub use error::ModelError;

mod domain;
pub use domain::*;

mod response;
pub use response::*;
