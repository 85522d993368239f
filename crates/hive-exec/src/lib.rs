//! Container runtime backed by the `docker` CLI.

mod error;
pub use error::{ExecError, ExecResult};

mod config;
pub use config::DockerConfig;

mod docker;
pub use docker::DockerRuntime;

mod util;

pub mod prelude {
    pub use crate::DockerRuntime;
    pub use crate::config::DockerConfig;
    pub use crate::error::{ExecError, ExecResult};
}
